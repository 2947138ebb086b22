//! Unlock propagation
//!
//! A node is unlocked when it is a center/current node, when it has no
//! parent edge, or when its parent permits it: parents of center/current
//! type always do, any other parent once its progress reaches the
//! threshold (50% by default).
//!
//! The engine is pure. It reports only the nodes whose persisted lock
//! state disagrees with the computed one, so running it twice over the
//! same snapshot yields an empty report the second time.

use crate::types::{Edge, Node, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default parent progress (percent) at which children unlock
pub const UNLOCK_THRESHOLD_PERCENT: f64 = 50.0;

/// A required lock-state change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockUpdate {
    pub node_id: NodeId,
    pub locked: bool,
}

/// Result of one unlock pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnlockReport {
    /// Every node whose persisted state must change
    pub updates: Vec<LockUpdate>,
    /// Previously locked nodes that are now open, in snapshot order
    pub newly_unlocked: Vec<NodeId>,
}

impl UnlockReport {
    /// Whether nothing needs to change
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }
}

/// Computes lock state from parent progress
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnlockEngine {
    threshold_percent: f64,
}

impl UnlockEngine {
    /// Engine with the default threshold
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            threshold_percent: UNLOCK_THRESHOLD_PERCENT,
        }
    }

    /// With custom threshold in percent
    #[inline]
    #[must_use]
    pub fn with_threshold(mut self, percent: f64) -> Self {
        self.threshold_percent = percent;
        self
    }

    /// Threshold in percent
    #[inline]
    #[must_use]
    pub fn threshold_percent(&self) -> f64 {
        self.threshold_percent
    }

    /// Whether `parent` lets its children open
    #[must_use]
    pub fn parent_permits(&self, parent: &Node) -> bool {
        parent.node_type.is_always_unlocked() || parent.progress_percent() >= self.threshold_percent
    }

    /// Target lock state of every node.
    ///
    /// Nodes whose parent edge points at a node missing from `nodes` are
    /// left out: the inconsistency is not corrected here.
    #[must_use]
    pub fn evaluate(&self, nodes: &[Node], edges: &[Edge]) -> HashMap<NodeId, bool> {
        let by_id: HashMap<NodeId, &Node> = nodes.iter().map(|n| (n.id, n)).collect();
        let parents = first_parents(edges);

        nodes
            .iter()
            .filter_map(|node| {
                self.target_locked(node, &by_id, &parents)
                    .map(|locked| (node.id, locked))
            })
            .collect()
    }

    /// Lock-state changes for a snapshot
    #[must_use]
    pub fn compute(&self, nodes: &[Node], edges: &[Edge]) -> UnlockReport {
        let by_id: HashMap<NodeId, &Node> = nodes.iter().map(|n| (n.id, n)).collect();
        let parents = first_parents(edges);
        let mut report = UnlockReport::default();

        for node in nodes {
            let Some(locked) = self.target_locked(node, &by_id, &parents) else {
                tracing::debug!(node = %node.id, "parent missing from snapshot, lock state left as is");
                continue;
            };
            if locked == node.is_locked {
                continue;
            }
            report.updates.push(LockUpdate {
                node_id: node.id,
                locked,
            });
            // Center/current corrections are bookkeeping, not progress
            if !locked && !node.node_type.is_always_unlocked() {
                report.newly_unlocked.push(node.id);
            }
        }

        report
    }

    fn target_locked(
        &self,
        node: &Node,
        by_id: &HashMap<NodeId, &Node>,
        parents: &HashMap<NodeId, NodeId>,
    ) -> Option<bool> {
        if node.node_type.is_always_unlocked() {
            return Some(false);
        }
        let Some(parent_id) = parents.get(&node.id) else {
            // Orphans default open
            return Some(false);
        };
        let parent = by_id.get(parent_id)?;
        Some(!self.parent_permits(parent))
    }
}

impl Default for UnlockEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Lock-state changes using the default threshold
#[must_use]
pub fn compute_lock_updates(nodes: &[Node], edges: &[Edge]) -> UnlockReport {
    UnlockEngine::new().compute(nodes, edges)
}

/// Child to parent map using the first inbound edge of every node
pub(crate) fn first_parents(edges: &[Edge]) -> HashMap<NodeId, NodeId> {
    let mut parents = HashMap::with_capacity(edges.len());
    for edge in edges {
        parents.entry(edge.to_node_id).or_insert(edge.from_node_id);
    }
    parents
}
