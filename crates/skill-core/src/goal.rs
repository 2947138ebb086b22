//! Goal resolution
//!
//! Turns a validated [`GoalProposal`] into nodes, edges and a goal record.
//!
//! Resolution runs in two phases:
//! 1. **Plan** (pure): resolve the start node and every reused step
//!    against the snapshot, and draft every node to be created.
//! 2. **Commit** (sequential I/O): fold the planned steps over a
//!    [`GoalCursor`]. Each step receives the previous cursor and returns
//!    the next one, because a step's parent is the id its predecessor got
//!    from the store.
//!
//! A step whose node cannot be created is skipped and the cursor stays
//! where it was, so later steps attach to the last step that did exist.
//! Nothing is rolled back.

use crate::config::EngineConfig;
use crate::error::{Result, SkillTreeError};
use crate::schema::{GoalProposal, PathStep, StartSpec};
use crate::store::GraphStore;
use serde_json::{json, Value};
use skill_graph::label::resolve_label;
use skill_graph::subtree::is_ancestor_or_self;
use skill_graph::types::palette;
use skill_graph::{Edge, Goal, GraphId, GraphSnapshot, NewEdge, NewGoal, NewNode, Node, NodeId, NodeType, UserId};

/// Resolved start of a goal path
#[derive(Debug, Clone, PartialEq)]
pub enum PlannedStart {
    /// Start from a node already in the graph
    Existing(NodeId),
    /// Create a new current node under the center
    NewCurrent { center: NodeId, draft: NewNode },
}

/// One planned path step
#[derive(Debug, Clone, PartialEq)]
pub enum PlannedStep {
    /// Reuse a node already in the graph
    Reuse {
        node: NodeId,
        node_type: NodeType,
        label: String,
    },
    /// Create a node; its parent is filled in at commit time
    Create { draft: NewNode },
}

/// Everything decided before the first write
#[derive(Debug, Clone, PartialEq)]
pub struct GoalPlan {
    pub graph_id: GraphId,
    pub start: PlannedStart,
    pub steps: Vec<PlannedStep>,
    /// Goal node draft; its parent is filled in at commit time
    pub goal_node: NewNode,
    pub reasoning: String,
}

/// Plan a goal against a snapshot.
///
/// Fails when a new current node is requested but the graph has no
/// center, or when the starting label does not resolve.
pub fn plan_goal(
    graph_id: GraphId,
    goal_text: &str,
    proposal: &GoalProposal,
    snapshot: &GraphSnapshot,
    config: &EngineConfig,
) -> Result<GoalPlan> {
    let start = match &proposal.start {
        StartSpec::NewCurrent { label, description } => {
            let center = snapshot.center().ok_or(SkillTreeError::CenterNotFound(graph_id))?;
            let draft = NewNode::new(graph_id, NodeType::Current, label.clone())
                .with_description(description.clone())
                .with_required_exp(config.default_required_exp)
                .with_parent(center.id)
                .with_color(palette::GOAL_ORIGIN)
                .with_metadata("isGoalOriented", true)
                .with_metadata("originalGoal", goal_text)
                .locked(false);
            PlannedStart::NewCurrent { center: center.id, draft }
        }
        StartSpec::Existing { label } => {
            let node = resolve_label(label, &snapshot.nodes)
                .ok_or_else(|| SkillTreeError::start_node_not_found(label.clone(), snapshot.labels()))?;
            PlannedStart::Existing(node.id)
        }
    };

    let steps = proposal
        .steps
        .iter()
        .map(|step| plan_step(graph_id, step, snapshot))
        .collect();

    let goal_node = NewNode::new(graph_id, NodeType::Goal, proposal.goal.label.clone())
        .with_description(proposal.goal.description.clone())
        .with_required_exp(0)
        .with_metadata("reasoning", proposal.goal.reasoning.clone())
        .with_metadata("originalDescription", goal_text)
        .with_metadata("pathReasoning", proposal.reasoning.clone())
        .locked(true);

    Ok(GoalPlan {
        graph_id,
        start,
        steps,
        goal_node,
        reasoning: proposal.reasoning.clone(),
    })
}

fn plan_step(graph_id: GraphId, step: &PathStep, snapshot: &GraphSnapshot) -> PlannedStep {
    if let Some(existing) = &step.existing_label {
        if let Some(node) = resolve_label(existing, &snapshot.nodes) {
            return PlannedStep::Reuse {
                node: node.id,
                node_type: node.node_type,
                label: node.label.clone(),
            };
        }
        tracing::debug!("Existing step label {:?} not found, creating {:?} instead", existing, step.label);
    }

    let step_number = if step.step_number.fract() == 0.0 && step.step_number.abs() < 1e15 {
        json!(step.step_number as i64)
    } else {
        json!(step.step_number)
    };
    let draft = step
        .kind
        .draft(graph_id, step.label.clone())
        .with_description(step.description.clone())
        .with_required_exp(step.required_exp)
        .with_metadata("suggestedResources", Value::from(step.suggested_resources.clone()))
        .with_metadata("stepNumber", step_number)
        .with_metadata("stepDescription", step.step_description.clone())
        .locked(true);
    PlannedStep::Create { draft }
}

/// Fold state of the commit phase
#[derive(Debug, Clone)]
pub struct GoalCursor {
    /// Parent of the next step
    pub parent: NodeId,
    /// Start node through the last committed step, in path order
    pub path: Vec<NodeId>,
    /// Snapshot edges plus edges created so far
    pub edges: Vec<Edge>,
    pub created: Vec<Node>,
    pub reused: usize,
    pub skipped: usize,
}

impl GoalCursor {
    fn new(start: NodeId, edges: Vec<Edge>) -> Self {
        Self {
            parent: start,
            path: vec![start],
            edges,
            created: Vec::new(),
            reused: 0,
            skipped: 0,
        }
    }

    fn has_parent(&self, node: NodeId) -> bool {
        self.edges.iter().any(|e| e.to_node_id == node)
    }
}

/// Result of a committed goal
///
/// Consecutive ids of `goal.recommended_path` are joined by a parent edge
/// except where a reused step already had a parent of its own; the path
/// is the recommended order, not necessarily a walk along edges.
#[derive(Debug, Clone, PartialEq)]
pub struct GoalOutcome {
    pub goal: Goal,
    pub goal_node: Node,
    /// Current node created because the goal needed a new domain
    pub current_node: Option<Node>,
    /// Step nodes that were created
    pub step_nodes: Vec<Node>,
    /// Steps resolved to existing nodes
    pub reused_steps: usize,
    /// Steps dropped because their node could not be created
    pub skipped_steps: usize,
    /// Steps the oracle proposed
    pub path_steps: usize,
    pub reasoning: String,
}

impl GoalOutcome {
    /// Whether a new current node was created
    #[inline]
    #[must_use]
    pub fn created_new_center(&self) -> bool {
        self.current_node.is_some()
    }

    /// All nodes this goal created, the goal node included
    #[must_use]
    pub fn new_nodes(&self) -> usize {
        self.step_nodes.len() + 1 + usize::from(self.current_node.is_some())
    }

    /// Whether some steps were dropped
    #[inline]
    #[must_use]
    pub fn is_partial(&self) -> bool {
        self.skipped_steps > 0
    }
}

/// Commits goal plans through a store
#[derive(Debug)]
pub struct GoalResolver<'a, S: GraphStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: GraphStore + ?Sized> GoalResolver<'a, S> {
    /// Create resolver
    #[inline]
    #[must_use]
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Plan and commit in one call
    pub async fn resolve(
        &self,
        user: UserId,
        graph_id: GraphId,
        goal_text: &str,
        proposal: &GoalProposal,
        snapshot: GraphSnapshot,
        config: &EngineConfig,
    ) -> Result<GoalOutcome> {
        let plan = plan_goal(graph_id, goal_text, proposal, &snapshot, config)?;
        self.commit(user, goal_text, plan, snapshot.edges, proposal.step_count()).await
    }

    /// Write a plan, step by step
    pub async fn commit(
        &self,
        user: UserId,
        goal_text: &str,
        plan: GoalPlan,
        edges: Vec<Edge>,
        path_steps: usize,
    ) -> Result<GoalOutcome> {
        let mut edges = edges;
        let (start, current_node) = match plan.start {
            PlannedStart::Existing(id) => (id, None),
            PlannedStart::NewCurrent { center, draft } => {
                let node = self.store.insert_node(draft).await?;
                tracing::info!("Created goal-oriented current node {} ({})", node.label, node.id);
                if let Some(edge) = self.link(plan.graph_id, center, node.id).await {
                    edges.push(edge);
                }
                (node.id, Some(node))
            }
        };

        let mut cursor = GoalCursor::new(start, edges);
        for step in plan.steps {
            cursor = self.apply_step(plan.graph_id, cursor, step).await;
        }

        let goal_node = self
            .store
            .insert_node(plan.goal_node.with_parent(cursor.parent))
            .await?;
        self.link(plan.graph_id, cursor.parent, goal_node.id).await;
        cursor.path.push(goal_node.id);

        let goal = self
            .store
            .insert_goal(NewGoal {
                user_id: user,
                description: goal_text.to_string(),
                target_node_id: goal_node.id,
                recommended_path: cursor.path,
            })
            .await?;

        tracing::info!(
            "Goal {} committed: {} created, {} reused, {} skipped",
            goal.id,
            cursor.created.len(),
            cursor.reused,
            cursor.skipped
        );

        Ok(GoalOutcome {
            goal,
            goal_node,
            current_node,
            step_nodes: cursor.created,
            reused_steps: cursor.reused,
            skipped_steps: cursor.skipped,
            path_steps,
            reasoning: plan.reasoning,
        })
    }

    /// Apply one step to the cursor and return the next cursor
    pub async fn apply_step(&self, graph_id: GraphId, mut cursor: GoalCursor, step: PlannedStep) -> GoalCursor {
        match step {
            PlannedStep::Reuse { node, node_type, label } => {
                if node_type == NodeType::Center || node == cursor.parent || cursor.path.contains(&node) {
                    tracing::debug!("Step reuses {:?}, the center or already on the path, ignoring", label);
                    return cursor;
                }
                // Current nodes belong under the center; others attach only when
                // parentless and never above the cursor
                let attachable = node_type != NodeType::Current
                    && !cursor.has_parent(node)
                    && !is_ancestor_or_self(node, cursor.parent, &cursor.edges);
                if attachable {
                    if let Some(edge) = self.link(graph_id, cursor.parent, node).await {
                        cursor.edges.push(edge);
                    }
                }
                tracing::debug!("Step reuses {:?} (attached: {})", label, attachable);
                cursor.reused += 1;
                cursor.parent = node;
                cursor.path.push(node);
                cursor
            }
            PlannedStep::Create { draft } => {
                let label = draft.label.clone();
                match self.store.insert_node(draft.with_parent(cursor.parent)).await {
                    Ok(node) => {
                        if let Some(edge) = self.link(graph_id, cursor.parent, node.id).await {
                            cursor.edges.push(edge);
                        }
                        cursor.parent = node.id;
                        cursor.path.push(node.id);
                        cursor.created.push(node);
                    }
                    Err(e) => {
                        tracing::warn!("Skipping step {:?}: node creation failed: {}", label, e);
                        cursor.skipped += 1;
                    }
                }
                cursor
            }
        }
    }

    async fn link(&self, graph_id: GraphId, parent: NodeId, child: NodeId) -> Option<Edge> {
        match self.store.insert_edge(NewEdge::new(graph_id, parent, child)).await {
            Ok(edge) => Some(edge),
            Err(e) => {
                tracing::error!("Edge {} -> {} not created: {}", parent, child, e);
                None
            }
        }
    }
}
