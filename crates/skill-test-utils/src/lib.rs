//! Testing utilities for the skill tree workspace
//!
//! Shared fixtures: a label-addressed snapshot builder, a scripted oracle
//! that records what it was asked, and a store wrapper that injects
//! failures.

#![allow(missing_docs)]

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use skill_core::store::{EdgePredicate, StoreResult};
use skill_core::{GraphStore, MemoryGraphStore, NodeOracle, OracleError, OracleRequest, StoreError};
use skill_graph::{
    Edge, EdgeId, Goal, Graph, GraphId, GraphSnapshot, NewEdge, NewGoal, NewNode, Node, NodeId, NodePatch, NodeType,
    UserId,
};
use std::collections::{HashMap, HashSet, VecDeque};

/// Builds snapshots whose nodes are addressed by label
#[derive(Debug, Clone)]
pub struct SnapshotBuilder {
    graph_id: GraphId,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    ids: HashMap<String, NodeId>,
}

impl Default for SnapshotBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self {
            graph_id: GraphId::new(),
            nodes: Vec::new(),
            edges: Vec::new(),
            ids: HashMap::new(),
        }
    }

    fn push(mut self, draft: NewNode, parent: Option<&str>) -> Self {
        let id = NodeId::new();
        let label = draft.label.clone();
        let draft = match parent {
            Some(p) => draft.with_parent(self.id(p)),
            None => draft,
        };
        if let Some(p) = parent {
            let from = self.id(p);
            self.edges.push(Edge::from_new(EdgeId::new(), NewEdge::new(self.graph_id, from, id)));
        }
        self.nodes.push(Node::from_new(id, draft, Utc::now()));
        self.ids.insert(label, id);
        self
    }

    /// Add the center node
    pub fn center(self, label: &str) -> Self {
        let draft = NewNode::new(self.graph_id, NodeType::Center, label);
        self.push(draft, None)
    }

    /// Add a node under `parent` requiring 100 EXP, unlocked
    pub fn child(self, parent: &str, node_type: NodeType, label: &str) -> Self {
        let draft = NewNode::new(self.graph_id, node_type, label).with_required_exp(100);
        self.push(draft, Some(parent))
    }

    /// Add a node with no parent edge
    pub fn orphan(self, node_type: NodeType, label: &str) -> Self {
        let draft = NewNode::new(self.graph_id, node_type, label).with_required_exp(100);
        self.push(draft, None)
    }

    /// Add an extra edge between existing nodes
    pub fn edge(mut self, from: &str, to: &str) -> Self {
        let edge = NewEdge::new(self.graph_id, self.id(from), self.id(to));
        self.edges.push(Edge::from_new(EdgeId::new(), edge));
        self
    }

    /// Set EXP of a node
    pub fn exp(mut self, label: &str, current: u32, required: u32) -> Self {
        let node = self.node_mut(label);
        node.current_exp = current;
        node.required_exp = required;
        self
    }

    /// Set the stored lock state of a node
    pub fn locked(mut self, label: &str, locked: bool) -> Self {
        self.node_mut(label).is_locked = locked;
        self
    }

    fn node_mut(&mut self, label: &str) -> &mut Node {
        let id = self.id(label);
        self.nodes
            .iter_mut()
            .find(|n| n.id == id)
            .unwrap_or_else(|| panic!("no node {label}"))
    }

    /// Id of a labelled node
    pub fn id(&self, label: &str) -> NodeId {
        *self.ids.get(label).unwrap_or_else(|| panic!("no node labelled {label:?}"))
    }

    pub fn graph_id(&self) -> GraphId {
        self.graph_id
    }

    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot::new(self.nodes.clone(), self.edges.clone())
    }

    /// Graph record owned by `user`
    pub fn graph(&self, user: UserId) -> Graph {
        let now = Utc::now();
        Graph {
            id: self.graph_id,
            user_id: user,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    /// In-memory store holding this snapshot
    pub fn store(&self, user: UserId) -> MemoryGraphStore {
        MemoryGraphStore::from_snapshot(self.graph(user), self.snapshot())
    }
}

/// `center -> current -> skill` chain used by many tests
pub fn create_basic_tree() -> SnapshotBuilder {
    SnapshotBuilder::new()
        .center("You")
        .child("You", NodeType::Current, "Data Analyst")
        .child("Data Analyst", NodeType::Skill, "SQL")
}

/// Oracle replaying scripted results and recording every request
#[derive(Debug, Default)]
pub struct ScriptedOracle {
    script: Mutex<VecDeque<Result<String, OracleError>>>,
    requests: Mutex<Vec<OracleRequest>>,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful response
    pub fn respond(self, text: impl Into<String>) -> Self {
        self.script.lock().push_back(Ok(text.into()));
        self
    }

    /// Queue a failure
    pub fn fail(self, err: OracleError) -> Self {
        self.script.lock().push_back(Err(err));
        self
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<OracleRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl NodeOracle for ScriptedOracle {
    async fn propose(&self, request: &OracleRequest) -> Result<String, OracleError> {
        self.requests.lock().push(request.clone());
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(OracleError::Transport("script exhausted".into())))
    }
}

/// Store wrapper failing selected writes
#[derive(Debug)]
pub struct FailingStore<S> {
    inner: S,
    node_labels: HashSet<String>,
    fail_edges: bool,
    quota_exceeded: bool,
    reverse_goals: bool,
}

impl<S: GraphStore> FailingStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            node_labels: HashSet::new(),
            fail_edges: false,
            quota_exceeded: false,
            reverse_goals: false,
        }
    }

    /// Fail inserts of nodes with this label
    pub fn fail_node(mut self, label: &str) -> Self {
        self.node_labels.insert(label.to_string());
        self
    }

    /// Fail every edge insert
    pub fn fail_edges(mut self) -> Self {
        self.fail_edges = true;
        self
    }

    /// Report quota exhaustion on every read
    pub fn quota_exceeded(mut self) -> Self {
        self.quota_exceeded = true;
        self
    }

    /// List goals in reverse store order
    pub fn reverse_goals(mut self) -> Self {
        self.reverse_goals = true;
        self
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn check_quota(&self) -> StoreResult<()> {
        if self.quota_exceeded {
            Err(StoreError::QuotaExceeded)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl<S: GraphStore> GraphStore for FailingStore<S> {
    async fn insert_graph(&self, user: UserId) -> StoreResult<Graph> {
        self.inner.insert_graph(user).await
    }

    async fn get_graph(&self, id: GraphId) -> StoreResult<Option<Graph>> {
        self.check_quota()?;
        self.inner.get_graph(id).await
    }

    async fn graphs_by_user(&self, user: UserId) -> StoreResult<Vec<Graph>> {
        self.check_quota()?;
        self.inner.graphs_by_user(user).await
    }

    async fn delete_graph(&self, id: GraphId) -> StoreResult<()> {
        self.inner.delete_graph(id).await
    }

    async fn insert_node(&self, node: NewNode) -> StoreResult<Node> {
        if self.node_labels.contains(&node.label) {
            return Err(StoreError::Backend(format!("injected failure for {}", node.label)));
        }
        self.inner.insert_node(node).await
    }

    async fn get_node(&self, id: NodeId) -> StoreResult<Option<Node>> {
        self.check_quota()?;
        self.inner.get_node(id).await
    }

    async fn nodes_by_graph(&self, graph: GraphId) -> StoreResult<Vec<Node>> {
        self.check_quota()?;
        self.inner.nodes_by_graph(graph).await
    }

    async fn update_node(&self, id: NodeId, patch: NodePatch) -> StoreResult<Node> {
        self.inner.update_node(id, patch).await
    }

    async fn delete_node(&self, id: NodeId) -> StoreResult<()> {
        self.inner.delete_node(id).await
    }

    async fn insert_edge(&self, edge: NewEdge) -> StoreResult<Edge> {
        if self.fail_edges {
            return Err(StoreError::Backend("injected edge failure".into()));
        }
        self.inner.insert_edge(edge).await
    }

    async fn edges_by_graph(&self, graph: GraphId) -> StoreResult<Vec<Edge>> {
        self.check_quota()?;
        self.inner.edges_by_graph(graph).await
    }

    async fn delete_edge(&self, id: EdgeId) -> StoreResult<()> {
        self.inner.delete_edge(id).await
    }

    async fn delete_edges_where(&self, graph: GraphId, predicate: EdgePredicate<'_>) -> StoreResult<usize> {
        self.inner.delete_edges_where(graph, predicate).await
    }

    async fn insert_goal(&self, goal: NewGoal) -> StoreResult<Goal> {
        self.inner.insert_goal(goal).await
    }

    async fn goals_by_user(&self, user: UserId) -> StoreResult<Vec<Goal>> {
        self.check_quota()?;
        let mut goals = self.inner.goals_by_user(user).await?;
        if self.reverse_goals {
            goals.reverse();
        }
        Ok(goals)
    }
}
