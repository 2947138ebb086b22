//! Subtree traversal over an in-memory snapshot
//!
//! Descendant collection walks the edge set once, breadth first, instead
//! of fetching children level by level from the store.

use crate::types::{Edge, NodeId};
use petgraph::graphmap::DiGraphMap;
use petgraph::visit::{Bfs, Reversed};

fn edge_graph(edges: &[Edge]) -> DiGraphMap<NodeId, ()> {
    let mut graph = DiGraphMap::with_capacity(edges.len() + 1, edges.len());
    for edge in edges {
        graph.add_edge(edge.from_node_id, edge.to_node_id, ());
    }
    graph
}

/// `root` followed by every node reachable from it, in breadth-first order.
///
/// Terminates on cyclic input; each node appears once.
#[must_use]
pub fn subtree(root: NodeId, edges: &[Edge]) -> Vec<NodeId> {
    let mut graph = edge_graph(edges);
    graph.add_node(root);
    let mut bfs = Bfs::new(&graph, root);
    let mut out = Vec::new();
    while let Some(id) = bfs.next(&graph) {
        out.push(id);
    }
    out
}

/// Every node reachable from `root`, excluding `root` itself
#[must_use]
pub fn descendants(root: NodeId, edges: &[Edge]) -> Vec<NodeId> {
    subtree(root, edges).into_iter().filter(|&id| id != root).collect()
}

/// Every node from which `node` is reachable, nearest first
#[must_use]
pub fn ancestors(node: NodeId, edges: &[Edge]) -> Vec<NodeId> {
    let mut graph = edge_graph(edges);
    graph.add_node(node);
    let reversed = Reversed(&graph);
    let mut bfs = Bfs::new(reversed, node);
    let mut out = Vec::new();
    while let Some(id) = bfs.next(reversed) {
        if id != node {
            out.push(id);
        }
    }
    out
}

/// Whether `candidate` lies on the parent chain of `node` (or is `node`)
#[must_use]
pub fn is_ancestor_or_self(candidate: NodeId, node: NodeId, edges: &[Edge]) -> bool {
    candidate == node || ancestors(node, edges).contains(&candidate)
}
