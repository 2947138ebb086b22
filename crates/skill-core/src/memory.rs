//! In-memory graph store
//!
//! Backs the command-line tool and the test suites. Entities live in
//! concurrent maps; a global sequence number preserves creation order for
//! selections.

use crate::error::StoreError;
use crate::store::{EdgePredicate, GraphStore, StoreResult};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use skill_graph::{
    Edge, EdgeId, Goal, GoalId, Graph, GraphId, GraphSnapshot, NewEdge, NewGoal, NewNode, Node, NodeId, NodePatch,
    UserId,
};
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone)]
struct Stored<T> {
    seq: u64,
    value: T,
}

/// Graph store held in process memory
#[derive(Debug, Default)]
pub struct MemoryGraphStore {
    graphs: DashMap<GraphId, Stored<Graph>>,
    nodes: DashMap<NodeId, Stored<Node>>,
    edges: DashMap<EdgeId, Stored<Edge>>,
    goals: DashMap<GoalId, Stored<Goal>>,
    seq: AtomicU64,
}

impl MemoryGraphStore {
    /// Create empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with one graph's snapshot, keeping its ids
    #[must_use]
    pub fn from_snapshot(graph: Graph, snapshot: GraphSnapshot) -> Self {
        let store = Self::new();
        let seq = store.next_seq();
        store.graphs.insert(graph.id, Stored { seq, value: graph });
        for node in snapshot.nodes {
            let seq = store.next_seq();
            store.nodes.insert(node.id, Stored { seq, value: node });
        }
        for edge in snapshot.edges {
            let seq = store.next_seq();
            store.edges.insert(edge.id, Stored { seq, value: edge });
        }
        store
    }

    /// Number of stored nodes across all graphs
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of stored edges across all graphs
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::Relaxed)
    }

    fn ordered<K, T, F>(map: &DashMap<K, Stored<T>>, keep: F) -> Vec<T>
    where
        K: Eq + std::hash::Hash,
        T: Clone,
        F: Fn(&T) -> bool,
    {
        let mut rows: Vec<(u64, T)> = map
            .iter()
            .filter(|entry| keep(&entry.value().value))
            .map(|entry| (entry.value().seq, entry.value().value.clone()))
            .collect();
        rows.sort_by_key(|(seq, _)| *seq);
        rows.into_iter().map(|(_, value)| value).collect()
    }
}

#[async_trait]
impl GraphStore for MemoryGraphStore {
    async fn insert_graph(&self, user: UserId) -> StoreResult<Graph> {
        let now = Utc::now();
        let graph = Graph {
            id: GraphId::new(),
            user_id: user,
            version: 1,
            created_at: now,
            updated_at: now,
        };
        let seq = self.next_seq();
        self.graphs.insert(graph.id, Stored { seq, value: graph.clone() });
        Ok(graph)
    }

    async fn get_graph(&self, id: GraphId) -> StoreResult<Option<Graph>> {
        Ok(self.graphs.get(&id).map(|g| g.value.clone()))
    }

    async fn graphs_by_user(&self, user: UserId) -> StoreResult<Vec<Graph>> {
        Ok(Self::ordered(&self.graphs, |g| g.user_id == user))
    }

    async fn delete_graph(&self, id: GraphId) -> StoreResult<()> {
        self.graphs
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found("graph", id))
    }

    async fn insert_node(&self, node: NewNode) -> StoreResult<Node> {
        let node = Node::from_new(NodeId::new(), node, Utc::now());
        let seq = self.next_seq();
        self.nodes.insert(node.id, Stored { seq, value: node.clone() });
        Ok(node)
    }

    async fn get_node(&self, id: NodeId) -> StoreResult<Option<Node>> {
        Ok(self.nodes.get(&id).map(|n| n.value.clone()))
    }

    async fn nodes_by_graph(&self, graph: GraphId) -> StoreResult<Vec<Node>> {
        Ok(Self::ordered(&self.nodes, |n| n.graph_id == graph))
    }

    async fn update_node(&self, id: NodeId, patch: NodePatch) -> StoreResult<Node> {
        let mut entry = self.nodes.get_mut(&id).ok_or_else(|| StoreError::not_found("node", id))?;
        entry.value.apply(&patch);
        Ok(entry.value.clone())
    }

    async fn delete_node(&self, id: NodeId) -> StoreResult<()> {
        self.nodes
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found("node", id))
    }

    async fn insert_edge(&self, edge: NewEdge) -> StoreResult<Edge> {
        let edge = Edge::from_new(EdgeId::new(), edge);
        let seq = self.next_seq();
        self.edges.insert(edge.id, Stored { seq, value: edge.clone() });
        Ok(edge)
    }

    async fn edges_by_graph(&self, graph: GraphId) -> StoreResult<Vec<Edge>> {
        Ok(Self::ordered(&self.edges, |e| e.graph_id == graph))
    }

    async fn delete_edge(&self, id: EdgeId) -> StoreResult<()> {
        self.edges
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found("edge", id))
    }

    async fn delete_edges_where(&self, graph: GraphId, predicate: EdgePredicate<'_>) -> StoreResult<usize> {
        let before = self.edges.len();
        self.edges
            .retain(|_, stored| !(stored.value.graph_id == graph && predicate(&stored.value)));
        Ok(before.saturating_sub(self.edges.len()))
    }

    async fn insert_goal(&self, goal: NewGoal) -> StoreResult<Goal> {
        let goal = Goal::from_new(GoalId::new(), goal, Utc::now());
        let seq = self.next_seq();
        self.goals.insert(goal.id, Stored { seq, value: goal.clone() });
        Ok(goal)
    }

    async fn goals_by_user(&self, user: UserId) -> StoreResult<Vec<Goal>> {
        Ok(Self::ordered(&self.goals, |g| g.user_id == user))
    }
}
