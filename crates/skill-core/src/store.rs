//! Graph store seam
//!
//! Per-entity create, read, update and delete, keyed by id or by owning
//! graph/user. There are no multi-entity transactions; every multi-step
//! mutation built on top of this trait tolerates partial completion.

use crate::error::StoreError;
use async_trait::async_trait;
use skill_graph::{
    Edge, EdgeId, Goal, Graph, GraphId, GraphSnapshot, NewEdge, NewGoal, NewNode, Node, NodeId, NodePatch, UserId,
};

/// Result alias for store calls
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Edge filter for bulk deletion
pub type EdgePredicate<'a> = &'a (dyn Fn(&Edge) -> bool + Send + Sync);

/// Persistent storage for graphs, nodes, edges and goals.
///
/// Selections return entities in creation order.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Create graph record (version 1)
    async fn insert_graph(&self, user: UserId) -> StoreResult<Graph>;

    async fn get_graph(&self, id: GraphId) -> StoreResult<Option<Graph>>;

    /// Graphs owned by a user
    async fn graphs_by_user(&self, user: UserId) -> StoreResult<Vec<Graph>>;

    async fn delete_graph(&self, id: GraphId) -> StoreResult<()>;

    async fn insert_node(&self, node: NewNode) -> StoreResult<Node>;

    async fn get_node(&self, id: NodeId) -> StoreResult<Option<Node>>;

    async fn nodes_by_graph(&self, graph: GraphId) -> StoreResult<Vec<Node>>;

    /// Apply a partial update, returning the updated node
    async fn update_node(&self, id: NodeId, patch: NodePatch) -> StoreResult<Node>;

    async fn delete_node(&self, id: NodeId) -> StoreResult<()>;

    async fn insert_edge(&self, edge: NewEdge) -> StoreResult<Edge>;

    async fn edges_by_graph(&self, graph: GraphId) -> StoreResult<Vec<Edge>>;

    async fn delete_edge(&self, id: EdgeId) -> StoreResult<()>;

    /// Delete every edge of `graph` matching `predicate`, returning the count
    async fn delete_edges_where(&self, graph: GraphId, predicate: EdgePredicate<'_>) -> StoreResult<usize>;

    async fn insert_goal(&self, goal: NewGoal) -> StoreResult<Goal>;

    /// Goals of a user, in any order
    async fn goals_by_user(&self, user: UserId) -> StoreResult<Vec<Goal>>;
}

/// Load nodes and edges of a graph concurrently
pub async fn load_snapshot<S: GraphStore + ?Sized>(store: &S, graph: GraphId) -> StoreResult<GraphSnapshot> {
    let (nodes, edges) = futures::try_join!(store.nodes_by_graph(graph), store.edges_by_graph(graph))?;
    Ok(GraphSnapshot::new(nodes, edges))
}
