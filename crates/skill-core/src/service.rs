//! Skill tree service
//!
//! Request-scoped operations over a [`GraphStore`] and a [`NodeOracle`].
//! Every operation loads what it needs, runs the pure engines from
//! `skill_graph`, and writes the result back entity by entity.

use crate::config::EngineConfig;
use crate::error::{Result, SkillTreeError};
use crate::goal::{GoalOutcome, GoalResolver};
use crate::oracle::{Classification, NodeOracle, NodeSummary, OnboardingAnswer, OracleRequest};
use crate::schema::{parse_classifications, GoalProposal, TreeProposal};
use crate::store::{load_snapshot, GraphStore};
use crate::tree::{TreeApplication, TreeApplier};
use futures::future::try_join_all;
use serde::Serialize;
use skill_graph::subtree::subtree;
use skill_graph::{
    check_forest, Edge, ForestViolation, Goal, Graph, GraphId, GraphSnapshot, LayoutOutcome, NewEdge, NewNode, Node, NodeId,
    NodePatch, NodeType, UserId,
};
use std::collections::HashSet;
use std::sync::Arc;

/// Result of an unlock check
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlockCheck {
    /// Lock states written, in either direction
    pub updated_count: usize,
    /// Nodes that went from locked to unlocked, as stored afterwards
    pub unlocked_nodes: Vec<Node>,
}

/// Result of an EXP increment
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpIncrement {
    pub node: Node,
    /// EXP actually added after clamping
    pub exp_gain: u32,
    /// Whether this increment filled the node
    pub reached_max: bool,
}

/// Result of onboarding
#[derive(Debug, Clone, PartialEq)]
pub struct OnboardingOutcome {
    pub graph: Graph,
    pub center: Node,
    /// One current node per classification that produced a tree
    pub current_nodes: Vec<Node>,
    /// Tree nodes created below the current nodes
    pub tree_nodes: usize,
    /// Classifications dropped because their tree could not be built
    pub skipped_classifications: usize,
}

/// Counts removed by a deletion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Deletion {
    pub nodes: usize,
    pub edges: usize,
}

/// Skill tree operations over a store and an oracle
pub struct SkillTreeService<S: GraphStore + ?Sized, O: NodeOracle + ?Sized> {
    store: Arc<S>,
    oracle: Arc<O>,
    config: EngineConfig,
}

impl<S: GraphStore + ?Sized, O: NodeOracle + ?Sized> SkillTreeService<S, O> {
    /// Create service
    #[must_use]
    pub fn new(store: Arc<S>, oracle: Arc<O>, config: EngineConfig) -> Self {
        Self { store, oracle, config }
    }

    #[inline]
    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    #[inline]
    #[must_use]
    pub fn oracle(&self) -> &Arc<O> {
        &self.oracle
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    async fn ask(&self, request: &OracleRequest) -> Result<String> {
        tracing::debug!("Oracle request {}", request.kind());
        self.oracle.propose(request).await.map_err(|e| {
            tracing::warn!("Oracle {} failed: {}", request.kind(), e);
            SkillTreeError::from(e)
        })
    }

    async fn node(&self, id: NodeId) -> Result<Node> {
        self.store.get_node(id).await?.ok_or(SkillTreeError::NodeNotFound(id))
    }

    /// Nodes and edges of an existing graph
    pub async fn snapshot(&self, graph_id: GraphId) -> Result<GraphSnapshot> {
        let (graph, snapshot) = futures::try_join!(self.store.get_graph(graph_id), load_snapshot(&*self.store, graph_id))?;
        graph.ok_or(SkillTreeError::GraphNotFound(graph_id))?;
        Ok(snapshot)
    }

    /// Recompute lock states and write the changes
    pub async fn unlock_check(&self, graph_id: GraphId) -> Result<UnlockCheck> {
        let snapshot = self.snapshot(graph_id).await?;
        let report = self.config.unlock_engine().compute(&snapshot.nodes, &snapshot.edges);
        if report.is_empty() {
            return Ok(UnlockCheck::default());
        }

        let newly: HashSet<NodeId> = report.newly_unlocked.iter().copied().collect();
        let mut check = UnlockCheck {
            updated_count: report.updates.len(),
            unlocked_nodes: Vec::with_capacity(newly.len()),
        };
        for update in report.updates {
            let node = self.store.update_node(update.node_id, NodePatch::lock(update.locked)).await?;
            if newly.contains(&node.id) {
                check.unlocked_nodes.push(node);
            }
        }

        tracing::info!(
            "Unlock check on {}: {} updated, {} newly unlocked",
            graph_id,
            check.updated_count,
            check.unlocked_nodes.len()
        );
        Ok(check)
    }

    /// Add the configured EXP increment to an unlocked node
    pub async fn increment_exp(&self, node_id: NodeId) -> Result<ExpIncrement> {
        let node = self.node(node_id).await?;
        if node.is_locked {
            return Err(SkillTreeError::LockedNode(node_id));
        }

        let before = node.current_exp;
        let after = before.saturating_add(self.config.exp_increment).min(node.required_exp.max(before));
        let node = self.store.update_node(node_id, NodePatch::exp(after)).await?;
        let reached_max = before < node.required_exp && node.is_full();
        tracing::debug!("EXP {} -> {} on {}", before, after, node.label);

        Ok(ExpIncrement {
            exp_gain: after - before,
            reached_max,
            node,
        })
    }

    /// Set a node's EXP back to zero
    pub async fn reset_progress(&self, node_id: NodeId) -> Result<Node> {
        self.node(node_id).await?;
        Ok(self.store.update_node(node_id, NodePatch::exp(0)).await?)
    }

    /// Fill an unlocked node's EXP
    pub async fn complete_node(&self, node_id: NodeId) -> Result<Node> {
        let node = self.node(node_id).await?;
        if node.is_locked {
            return Err(SkillTreeError::LockedNode(node_id));
        }
        Ok(self.store.update_node(node_id, NodePatch::exp(node.required_exp)).await?)
    }

    /// Ask the oracle for a path to `goal_text` and commit it
    pub async fn resolve_goal(&self, user: UserId, graph_id: GraphId, goal_text: &str) -> Result<GoalOutcome> {
        let snapshot = self.snapshot(graph_id).await?;
        if snapshot.nodes.is_empty() {
            return Err(SkillTreeError::GraphNotFound(graph_id));
        }

        let request = OracleRequest::ResolveGoal {
            goal: goal_text.to_string(),
            existing: snapshot.nodes.iter().map(NodeSummary::from).collect(),
        };
        let text = self.ask(&request).await?;
        let proposal = GoalProposal::parse(&text, self.config.default_required_exp)?;

        let outcome = GoalResolver::new(&*self.store)
            .resolve(user, graph_id, goal_text, &proposal, snapshot, &self.config)
            .await?;
        tracing::info!(
            "Resolved goal {:?}: {} new nodes, {} of {} steps skipped",
            goal_text,
            outcome.new_nodes(),
            outcome.skipped_steps,
            outcome.path_steps
        );
        Ok(outcome)
    }

    /// Build a user's first graph from onboarding answers
    pub async fn onboard(&self, user: UserId, answers: Vec<OnboardingAnswer>) -> Result<OnboardingOutcome> {
        let text = self.ask(&OracleRequest::Classify { answers }).await?;
        let classifications = parse_classifications(&text)?;

        let graph = self.store.insert_graph(user).await?;
        let center = self
            .store
            .insert_node(
                NewNode::new(graph.id, NodeType::Center, self.config.center_label.clone())
                    .with_description("Your starting point"),
            )
            .await?;

        let mut outcome = OnboardingOutcome {
            graph,
            center,
            current_nodes: Vec::new(),
            tree_nodes: 0,
            skipped_classifications: 0,
        };
        for position in classifications {
            match self.grow_position(&outcome.center, position).await {
                Ok((current, applied)) => {
                    outcome.tree_nodes += applied.created.len();
                    outcome.current_nodes.push(current);
                }
                Err(e) => {
                    tracing::warn!("Skipping classification: {}", e);
                    outcome.skipped_classifications += 1;
                }
            }
        }

        tracing::info!(
            "Onboarded user {} into graph {}: {} positions, {} tree nodes",
            user,
            outcome.graph.id,
            outcome.current_nodes.len(),
            outcome.tree_nodes
        );
        Ok(outcome)
    }

    async fn grow_position(&self, center: &Node, position: Classification) -> Result<(Node, TreeApplication)> {
        let request = OracleRequest::GenerateTree {
            position: position.clone(),
        };
        let text = self.ask(&request).await?;
        let proposal = TreeProposal::parse(&text, self.config.default_required_exp)?;

        let current = self
            .store
            .insert_node(
                NewNode::new(center.graph_id, NodeType::Current, position.current_position)
                    .with_description(position.reasoning)
                    .with_required_exp(self.config.default_required_exp)
                    .with_parent(center.id)
                    .with_metadata("category", position.category),
            )
            .await?;
        if let Err(e) = self
            .store
            .insert_edge(NewEdge::new(center.graph_id, center.id, current.id))
            .await
        {
            tracing::error!("Edge {} -> {} not created: {}", center.id, current.id, e);
        }

        let existing = [center.clone(), current.clone()];
        let applied = TreeApplier::new(&*self.store, self.config.unlock_engine())
            .apply(center.graph_id, &current, &existing, &proposal)
            .await;
        Ok((current, applied))
    }

    /// Ask the oracle for descendants of `node_id` and create them
    pub async fn expand_node(&self, node_id: NodeId, category: &str) -> Result<TreeApplication> {
        let node = self.node(node_id).await?;
        let snapshot = self.snapshot(node.graph_id).await?;

        let request = OracleRequest::ExpandTree {
            node: NodeSummary::from(&node),
            category: category.to_string(),
        };
        let text = self.ask(&request).await?;
        let proposal = TreeProposal::parse(&text, self.config.default_required_exp)?;

        Ok(TreeApplier::new(&*self.store, self.config.unlock_engine())
            .apply(node.graph_id, &node, &snapshot.nodes, &proposal)
            .await)
    }

    /// Delete a node with all its descendants and every edge touching them
    pub async fn delete_subtree(&self, node_id: NodeId) -> Result<Deletion> {
        let node = self.node(node_id).await?;
        if node.node_type == NodeType::Center {
            return Err(SkillTreeError::Rejected("the center node cannot be deleted".into()));
        }

        let snapshot = load_snapshot(&*self.store, node.graph_id).await?;
        let doomed: HashSet<NodeId> = subtree(node_id, &snapshot.edges).into_iter().collect();
        let edges = self
            .store
            .delete_edges_where(node.graph_id, &|e: &Edge| doomed.contains(&e.from_node_id) || doomed.contains(&e.to_node_id))
            .await?;
        try_join_all(doomed.iter().map(|id| self.store.delete_node(*id))).await?;

        tracing::info!("Deleted subtree of {}: {} nodes, {} edges", node.label, doomed.len(), edges);
        Ok(Deletion {
            nodes: doomed.len(),
            edges,
        })
    }

    /// Delete a graph with its edges and nodes
    pub async fn delete_graph(&self, graph_id: GraphId) -> Result<Deletion> {
        let snapshot = self.snapshot(graph_id).await?;
        let edges = self.store.delete_edges_where(graph_id, &|_: &Edge| true).await?;
        try_join_all(snapshot.nodes.iter().map(|n| self.store.delete_node(n.id))).await?;
        self.store.delete_graph(graph_id).await?;

        tracing::info!("Deleted graph {}: {} nodes, {} edges", graph_id, snapshot.nodes.len(), edges);
        Ok(Deletion {
            nodes: snapshot.nodes.len(),
            edges,
        })
    }

    /// Lay out a graph, optionally writing positions back
    pub async fn layout_graph(&self, graph_id: GraphId, persist: bool) -> Result<LayoutOutcome> {
        let snapshot = self.snapshot(graph_id).await?;
        let outcome = self
            .config
            .layout_engine()
            .layout_with_report(&snapshot.nodes, &snapshot.edges);

        if persist {
            try_join_all(
                outcome
                    .nodes
                    .iter()
                    .map(|n| self.store.update_node(n.id, NodePatch::position(n.position_x, n.position_y))),
            )
            .await?;
        }
        Ok(outcome)
    }

    /// Goals of a user, newest first
    pub async fn goals_for_user(&self, user: UserId) -> Result<Vec<Goal>> {
        let mut goals = self.store.goals_by_user(user).await?;
        goals.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(goals)
    }

    /// Structural problems of a stored graph
    pub async fn check_graph(&self, graph_id: GraphId) -> Result<Vec<ForestViolation>> {
        let snapshot = self.snapshot(graph_id).await?;
        Ok(check_forest(&snapshot.nodes, &snapshot.edges))
    }
}

impl<S: GraphStore + ?Sized, O: NodeOracle + ?Sized> std::fmt::Debug for SkillTreeService<S, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SkillTreeService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
