//! Forest consistency checks
//!
//! Reports every way a snapshot departs from the single-center,
//! single-parent shape. Checking never mutates; repairs are left to the
//! caller.

use crate::types::{Edge, Node, NodeId, NodeType};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// One structural problem in a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ForestViolation {
    #[error("graph has no center node")]
    MissingCenter,

    #[error("graph has {count} center nodes")]
    MultipleCenters { count: usize },

    #[error("center node {node} has an inbound edge")]
    CenterHasParent { node: NodeId },

    #[error("node {node} has {count} inbound edges")]
    MultipleParents { node: NodeId, count: usize },

    #[error("node {node} has no parent edge")]
    Orphan { node: NodeId },

    #[error("edge {from} -> {to} references a missing node")]
    DanglingEdge { from: NodeId, to: NodeId },

    #[error("node {node} records parent {recorded:?} but edges say {actual:?}")]
    ParentIdsMismatch {
        node: NodeId,
        recorded: Option<NodeId>,
        actual: Option<NodeId>,
    },
}

/// All violations, in a stable order: centers, edges, then nodes in
/// snapshot order
#[must_use]
pub fn check_forest(nodes: &[Node], edges: &[Edge]) -> Vec<ForestViolation> {
    let mut violations = Vec::new();
    let ids: HashSet<NodeId> = nodes.iter().map(|n| n.id).collect();

    let centers = nodes.iter().filter(|n| n.node_type == NodeType::Center).count();
    match centers {
        0 if !nodes.is_empty() => violations.push(ForestViolation::MissingCenter),
        0 | 1 => {}
        count => violations.push(ForestViolation::MultipleCenters { count }),
    }

    let mut inbound: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
    for edge in edges {
        if !ids.contains(&edge.from_node_id) || !ids.contains(&edge.to_node_id) {
            violations.push(ForestViolation::DanglingEdge {
                from: edge.from_node_id,
                to: edge.to_node_id,
            });
            continue;
        }
        inbound.entry(edge.to_node_id).or_default().push(edge.from_node_id);
    }

    for node in nodes {
        let parents = inbound.get(&node.id).map_or(&[][..], Vec::as_slice);
        match (node.node_type, parents.len()) {
            (NodeType::Center, 0) => {}
            (NodeType::Center, _) => violations.push(ForestViolation::CenterHasParent { node: node.id }),
            (_, 0) => violations.push(ForestViolation::Orphan { node: node.id }),
            (_, 1) => {}
            (_, count) => violations.push(ForestViolation::MultipleParents { node: node.id, count }),
        }

        let actual = parents.first().copied();
        let recorded = node.recorded_parent();
        if !node.parent_ids.is_empty() && recorded != actual {
            violations.push(ForestViolation::ParentIdsMismatch {
                node: node.id,
                recorded,
                actual,
            });
        }
    }

    violations
}
