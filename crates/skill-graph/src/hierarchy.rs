//! Rooted hierarchy construction
//!
//! Turns a node/edge snapshot into a single tree rooted at the center
//! node. Parents come from the first inbound edge of every node. Any
//! inconsistency (duplicate ids, dangling parents, several roots, a root
//! that is not the center, cycles) is an error; callers decide how to
//! recover.

use crate::types::{Edge, Node, NodeId, NodeType};
use petgraph::graphmap::DiGraphMap;
use petgraph::visit::Bfs;
use std::collections::HashMap;

/// Hierarchy construction failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HierarchyError {
    /// Nothing to lay out
    #[error("graph has no nodes")]
    Empty,

    /// Two nodes share an id
    #[error("duplicate node id: {0}")]
    DuplicateNode(NodeId),

    /// An edge points at a parent that is not in the snapshot
    #[error("node {child} references missing parent {parent}")]
    MissingParent { child: NodeId, parent: NodeId },

    /// Every node has a parent
    #[error("no root node")]
    NoRoot,

    /// More than one node lacks a parent
    #[error("multiple roots: {0:?}")]
    MultipleRoots(Vec<NodeId>),

    /// The only root is not a center node
    #[error("root {0} is not the center node")]
    RootNotCenter(NodeId),

    /// Nodes unreachable from the root sit on a cycle
    #[error("cycle detected: {unreachable} nodes unreachable from root")]
    Cycle { unreachable: usize },
}

/// Single rooted tree over snapshot indices.
///
/// Index `i` refers to `nodes[i]` of the snapshot the hierarchy was built
/// from; children keep snapshot order.
#[derive(Debug, Clone)]
pub struct Hierarchy {
    ids: Vec<NodeId>,
    parent: Vec<Option<usize>>,
    children: Vec<Vec<usize>>,
    depth: Vec<usize>,
    subtree_size: Vec<usize>,
    root: usize,
}

impl Hierarchy {
    /// Build the hierarchy of a snapshot
    pub fn build(nodes: &[Node], edges: &[Edge]) -> Result<Self, HierarchyError> {
        if nodes.is_empty() {
            return Err(HierarchyError::Empty);
        }

        let mut index: HashMap<NodeId, usize> = HashMap::with_capacity(nodes.len());
        for (i, node) in nodes.iter().enumerate() {
            if index.insert(node.id, i).is_some() {
                return Err(HierarchyError::DuplicateNode(node.id));
            }
        }

        let mut parent: Vec<Option<usize>> = vec![None; nodes.len()];
        for edge in edges {
            let Some(&child) = index.get(&edge.to_node_id) else {
                continue;
            };
            if parent[child].is_some() {
                continue;
            }
            let Some(&from) = index.get(&edge.from_node_id) else {
                return Err(HierarchyError::MissingParent {
                    child: edge.to_node_id,
                    parent: edge.from_node_id,
                });
            };
            parent[child] = Some(from);
        }

        let roots: Vec<usize> = (0..nodes.len()).filter(|&i| parent[i].is_none()).collect();
        let root = match roots.as_slice() {
            [] => return Err(HierarchyError::NoRoot),
            [only] => *only,
            many => {
                return Err(HierarchyError::MultipleRoots(
                    many.iter().map(|&i| nodes[i].id).collect(),
                ))
            }
        };
        if nodes[root].node_type != NodeType::Center {
            return Err(HierarchyError::RootNotCenter(nodes[root].id));
        }

        let mut children: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
        let mut tree: DiGraphMap<usize, ()> = DiGraphMap::with_capacity(nodes.len(), nodes.len());
        for i in 0..nodes.len() {
            tree.add_node(i);
        }
        for (i, p) in parent.iter().enumerate() {
            if let Some(p) = *p {
                children[p].push(i);
                tree.add_edge(p, i, ());
            }
        }

        let mut depth = vec![0usize; nodes.len()];
        let mut order = Vec::with_capacity(nodes.len());
        let mut bfs = Bfs::new(&tree, root);
        while let Some(i) = bfs.next(&tree) {
            if let Some(p) = parent[i] {
                depth[i] = depth[p] + 1;
            }
            order.push(i);
        }
        if order.len() != nodes.len() {
            return Err(HierarchyError::Cycle {
                unreachable: nodes.len() - order.len(),
            });
        }

        let mut subtree_size = vec![1usize; nodes.len()];
        for &i in order.iter().rev() {
            if let Some(p) = parent[i] {
                subtree_size[p] += subtree_size[i];
            }
        }

        Ok(Self {
            ids: nodes.iter().map(|n| n.id).collect(),
            parent,
            children,
            depth,
            subtree_size,
            root,
        })
    }

    /// Number of nodes
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Always false for a built hierarchy
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Index of the root
    #[inline]
    #[must_use]
    pub fn root(&self) -> usize {
        self.root
    }

    /// Node id at index
    #[inline]
    #[must_use]
    pub fn id(&self, i: usize) -> NodeId {
        self.ids[i]
    }

    /// Parent index
    #[inline]
    #[must_use]
    pub fn parent(&self, i: usize) -> Option<usize> {
        self.parent[i]
    }

    /// Children indices in snapshot order
    #[inline]
    #[must_use]
    pub fn children(&self, i: usize) -> &[usize] {
        &self.children[i]
    }

    /// Distance from the root
    #[inline]
    #[must_use]
    pub fn depth(&self, i: usize) -> usize {
        self.depth[i]
    }

    /// Size of the subtree rooted at `i`, including `i`
    #[inline]
    #[must_use]
    pub fn subtree_size(&self, i: usize) -> usize {
        self.subtree_size[i]
    }

    /// Deepest level present
    #[must_use]
    pub fn height(&self) -> usize {
        self.depth.iter().copied().max().unwrap_or(0)
    }

    /// Parents before children, siblings left to right
    #[must_use]
    pub fn pre_order(&self) -> Vec<usize> {
        let mut out = Vec::with_capacity(self.len());
        let mut stack = vec![self.root];
        while let Some(i) = stack.pop() {
            out.push(i);
            stack.extend(self.children[i].iter().rev());
        }
        out
    }

    /// Children before parents, siblings left to right
    #[must_use]
    pub fn post_order(&self) -> Vec<usize> {
        let mut out = Vec::with_capacity(self.len());
        let mut stack = vec![self.root];
        while let Some(i) = stack.pop() {
            out.push(i);
            stack.extend(self.children[i].iter());
        }
        out.reverse();
        out
    }
}
