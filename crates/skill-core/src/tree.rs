//! Applying proposed trees
//!
//! Shared by onboarding and node expansion. Proposed nodes are created in
//! response order. Each one hangs from its first resolvable parent label,
//! or from the default parent when none resolves. Created nodes join the
//! label index, so later proposals can name them as parents.

use crate::schema::{ProposedNode, TreeProposal};
use crate::store::GraphStore;
use serde_json::Value;
use skill_graph::{GraphId, LabelIndex, NewEdge, NewNode, Node, NodeId, UnlockEngine};
use std::collections::HashMap;

/// What applying a tree actually did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TreeApplication {
    /// Nodes created, in creation order
    pub created: Vec<Node>,
    /// Proposals whose node could not be created
    pub skipped: usize,
    /// Parent edges that could not be created
    pub edges_failed: usize,
}

impl TreeApplication {
    /// Whether anything was dropped
    #[inline]
    #[must_use]
    pub fn is_partial(&self) -> bool {
        self.skipped > 0 || self.edges_failed > 0
    }
}

/// Creates proposed nodes below a default parent
#[derive(Debug)]
pub struct TreeApplier<'a, S: GraphStore + ?Sized> {
    store: &'a S,
    unlock: UnlockEngine,
}

impl<'a, S: GraphStore + ?Sized> TreeApplier<'a, S> {
    /// Create applier
    #[inline]
    #[must_use]
    pub fn new(store: &'a S, unlock: UnlockEngine) -> Self {
        Self { store, unlock }
    }

    /// Apply `proposal` to a graph whose current nodes are `existing`
    pub async fn apply(
        &self,
        graph_id: GraphId,
        default_parent: &Node,
        existing: &[Node],
        proposal: &TreeProposal,
    ) -> TreeApplication {
        let mut index = LabelIndex::from_nodes(existing);
        index.insert(default_parent.label.clone(), default_parent.id);

        let mut known: HashMap<NodeId, Node> = existing.iter().map(|n| (n.id, n.clone())).collect();
        known.insert(default_parent.id, default_parent.clone());

        let mut out = TreeApplication::default();
        for proposed in &proposal.nodes {
            let parent_id = Self::choose_parent(proposed, &index).unwrap_or(default_parent.id);
            let parent = known.get(&parent_id).unwrap_or(default_parent);
            let draft = self.draft(graph_id, proposed, parent);

            let node = match self.store.insert_node(draft).await {
                Ok(node) => node,
                Err(e) => {
                    tracing::warn!("Skipping proposed node {:?}: {}", proposed.label, e);
                    out.skipped += 1;
                    continue;
                }
            };
            if let Err(e) = self.store.insert_edge(NewEdge::new(graph_id, parent_id, node.id)).await {
                tracing::error!("Edge {} -> {} not created: {}", parent_id, node.id, e);
                out.edges_failed += 1;
            }

            index.insert(node.label.clone(), node.id);
            known.insert(node.id, node.clone());
            out.created.push(node);
        }

        tracing::info!(
            "Applied tree under {}: {} created, {} skipped",
            default_parent.label,
            out.created.len(),
            out.skipped
        );
        out
    }

    fn choose_parent(proposed: &ProposedNode, index: &LabelIndex) -> Option<NodeId> {
        let found = proposed.parent_labels.iter().find_map(|label| index.resolve(label));
        if found.is_none() && !proposed.parent_labels.is_empty() {
            tracing::debug!(
                "No parent label of {:?} resolved ({:?}), using default parent",
                proposed.label,
                proposed.parent_labels
            );
        }
        found
    }

    fn draft(&self, graph_id: GraphId, proposed: &ProposedNode, parent: &Node) -> NewNode {
        proposed
            .kind
            .draft(graph_id, proposed.label.clone())
            .with_description(proposed.description.clone())
            .with_required_exp(proposed.required_exp)
            .with_parent(parent.id)
            .with_metadata("suggestedResources", Value::from(proposed.suggested_resources.clone()))
            .locked(!self.unlock.parent_permits(parent))
    }
}
