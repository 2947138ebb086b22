//! Core data model for skill graphs
//!
//! Defines the entities persisted by a graph store:
//! - Nodes (skills, certifications, positions, goals and the roots they hang from)
//! - Parent-to-child edges
//! - Goals with their recommended paths
//! - Graph ownership records
//!
//! Each entity has a matching draft (`New*`) carrying everything but the
//! store-assigned id and timestamps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generate a fresh random id
            #[inline]
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

entity_id!(
    /// Unique node identifier
    NodeId
);
entity_id!(
    /// Unique edge identifier
    EdgeId
);
entity_id!(
    /// Unique graph identifier
    GraphId
);
entity_id!(
    /// Unique goal identifier
    GoalId
);
entity_id!(
    /// Owning user identifier
    UserId
);

/// Node colors by role
pub mod palette {
    /// The single root of a graph
    pub const CENTER: &str = "#FFD700";
    /// Current positions derived from onboarding
    pub const CURRENT: &str = "#4A90E2";
    /// Current positions created to start a goal in a new domain
    pub const GOAL_ORIGIN: &str = "#FF6B6B";
    /// Skills to learn
    pub const SKILL: &str = "#7ED321";
    /// Certifications
    pub const CERT: &str = "#9013FE";
    /// Job positions
    pub const POSITION: &str = "#F5A623";
    /// Goal terminals
    pub const GOAL: &str = "#FF6B9D";
    /// Anything the palette does not know
    pub const FALLBACK: &str = "#4A90E2";
}

/// Role of a node in the skill graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    /// Graph root, one per graph
    Center,
    /// A starting position hanging off the center
    Current,
    /// A skill to acquire
    Skill,
    /// A certification to obtain
    Cert,
    /// A position to reach
    Position,
    /// Terminal node created by goal resolution
    Goal,
}

impl NodeType {
    /// Wire name of this type
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Center => "center",
            NodeType::Current => "current",
            NodeType::Skill => "skill",
            NodeType::Cert => "cert",
            NodeType::Position => "position",
            NodeType::Goal => "goal",
        }
    }

    /// Center and current nodes are unlocked regardless of parent progress
    #[inline]
    #[must_use]
    pub fn is_always_unlocked(&self) -> bool {
        matches!(self, NodeType::Center | NodeType::Current)
    }

    /// Types an oracle may propose as ordinary tree nodes
    #[inline]
    #[must_use]
    pub fn is_proposable(&self) -> bool {
        matches!(self, NodeType::Skill | NodeType::Cert | NodeType::Position)
    }

    /// Palette color for freshly created nodes of this type
    #[must_use]
    pub fn default_color(&self) -> &'static str {
        match self {
            NodeType::Center => palette::CENTER,
            NodeType::Current => palette::CURRENT,
            NodeType::Skill => palette::SKILL,
            NodeType::Cert => palette::CERT,
            NodeType::Position => palette::POSITION,
            NodeType::Goal => palette::GOAL,
        }
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeType {
    type Err = UnknownNodeType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "center" => Ok(NodeType::Center),
            "current" => Ok(NodeType::Current),
            "skill" => Ok(NodeType::Skill),
            "cert" => Ok(NodeType::Cert),
            "position" => Ok(NodeType::Position),
            "goal" => Ok(NodeType::Goal),
            other => Err(UnknownNodeType(other.to_string())),
        }
    }
}

/// Parse failure for [`NodeType`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown node type: {0}")]
pub struct UnknownNodeType(pub String);

/// Free-form node metadata
pub type Metadata = Map<String, Value>;

/// A node of the skill graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: NodeId,
    pub graph_id: GraphId,
    pub node_type: NodeType,
    pub label: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required_exp: u32,
    #[serde(default)]
    pub current_exp: u32,
    /// Advisory copy of the inbound edge; edges are authoritative
    #[serde(default)]
    pub parent_ids: Vec<NodeId>,
    #[serde(default)]
    pub position_x: f64,
    #[serde(default)]
    pub position_y: f64,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub is_locked: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Node {
    /// Materialize a draft with a store-assigned id
    #[must_use]
    pub fn from_new(id: NodeId, new: NewNode, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            graph_id: new.graph_id,
            node_type: new.node_type,
            label: new.label,
            description: new.description,
            required_exp: new.required_exp,
            current_exp: new.current_exp,
            parent_ids: new.parent_ids,
            position_x: new.position_x,
            position_y: new.position_y,
            color: new.color,
            metadata: new.metadata,
            is_locked: new.is_locked,
            created_at,
        }
    }

    /// Progress toward `required_exp` in percent.
    ///
    /// A node that requires no EXP counts as complete.
    #[must_use]
    pub fn progress_percent(&self) -> f64 {
        if self.required_exp == 0 {
            return 100.0;
        }
        f64::from(self.current_exp) / f64::from(self.required_exp) * 100.0
    }

    /// Whether `current_exp` has reached `required_exp`
    #[inline]
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.current_exp >= self.required_exp
    }

    /// Advisory parent recorded on the node itself
    #[inline]
    #[must_use]
    pub fn recorded_parent(&self) -> Option<NodeId> {
        self.parent_ids.first().copied()
    }

    /// Apply a partial update in place
    pub fn apply(&mut self, patch: &NodePatch) {
        if let Some(exp) = patch.current_exp {
            self.current_exp = exp;
        }
        if let Some(locked) = patch.is_locked {
            self.is_locked = locked;
        }
        if let Some((x, y)) = patch.position {
            self.position_x = x;
            self.position_y = y;
        }
    }
}

/// Insert draft for a [`Node`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNode {
    pub graph_id: GraphId,
    pub node_type: NodeType,
    pub label: String,
    pub description: String,
    pub required_exp: u32,
    pub current_exp: u32,
    pub parent_ids: Vec<NodeId>,
    pub position_x: f64,
    pub position_y: f64,
    pub color: String,
    pub metadata: Metadata,
    pub is_locked: bool,
}

impl NewNode {
    /// Create a draft with palette color and no parent
    #[must_use]
    pub fn new(graph_id: GraphId, node_type: NodeType, label: impl Into<String>) -> Self {
        Self {
            graph_id,
            node_type,
            label: label.into(),
            description: String::new(),
            required_exp: 0,
            current_exp: 0,
            parent_ids: Vec::new(),
            position_x: 0.0,
            position_y: 0.0,
            color: node_type.default_color().to_string(),
            metadata: Metadata::new(),
            is_locked: false,
        }
    }

    /// With description
    #[inline]
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// With required EXP
    #[inline]
    #[must_use]
    pub fn with_required_exp(mut self, exp: u32) -> Self {
        self.required_exp = exp;
        self
    }

    /// With current EXP
    #[inline]
    #[must_use]
    pub fn with_current_exp(mut self, exp: u32) -> Self {
        self.current_exp = exp;
        self
    }

    /// With single parent
    #[inline]
    #[must_use]
    pub fn with_parent(mut self, parent: NodeId) -> Self {
        self.parent_ids = vec![parent];
        self
    }

    /// With color override
    #[inline]
    #[must_use]
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }

    /// With a metadata entry
    #[inline]
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// With initial lock state
    #[inline]
    #[must_use]
    pub fn locked(mut self, locked: bool) -> Self {
        self.is_locked = locked;
        self
    }
}

/// Partial node update
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NodePatch {
    pub current_exp: Option<u32>,
    pub is_locked: Option<bool>,
    pub position: Option<(f64, f64)>,
}

impl NodePatch {
    /// Patch setting EXP
    #[inline]
    #[must_use]
    pub fn exp(exp: u32) -> Self {
        Self {
            current_exp: Some(exp),
            ..Self::default()
        }
    }

    /// Patch setting lock state
    #[inline]
    #[must_use]
    pub fn lock(locked: bool) -> Self {
        Self {
            is_locked: Some(locked),
            ..Self::default()
        }
    }

    /// Patch setting position
    #[inline]
    #[must_use]
    pub fn position(x: f64, y: f64) -> Self {
        Self {
            position: Some((x, y)),
            ..Self::default()
        }
    }
}

/// Directed parent-to-child edge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: EdgeId,
    pub graph_id: GraphId,
    pub from_node_id: NodeId,
    pub to_node_id: NodeId,
}

impl Edge {
    /// Materialize a draft with a store-assigned id
    #[must_use]
    pub fn from_new(id: EdgeId, new: NewEdge) -> Self {
        Self {
            id,
            graph_id: new.graph_id,
            from_node_id: new.from_node_id,
            to_node_id: new.to_node_id,
        }
    }

    /// Whether either endpoint is `node`
    #[inline]
    #[must_use]
    pub fn touches(&self, node: NodeId) -> bool {
        self.from_node_id == node || self.to_node_id == node
    }
}

/// Insert draft for an [`Edge`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEdge {
    pub graph_id: GraphId,
    pub from_node_id: NodeId,
    pub to_node_id: NodeId,
}

impl NewEdge {
    /// Edge from `parent` to `child`
    #[inline]
    #[must_use]
    pub fn new(graph_id: GraphId, parent: NodeId, child: NodeId) -> Self {
        Self {
            graph_id,
            from_node_id: parent,
            to_node_id: child,
        }
    }
}

/// A resolved goal and its recommended path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    pub id: GoalId,
    pub user_id: UserId,
    pub description: String,
    pub target_node_id: NodeId,
    /// Start node through goal node, inclusive. A reused node that already
    /// had a parent keeps it, so neighbours here are not always joined by an edge
    pub recommended_path: Vec<NodeId>,
    pub created_at: DateTime<Utc>,
}

impl Goal {
    /// Materialize a draft with a store-assigned id
    #[must_use]
    pub fn from_new(id: GoalId, new: NewGoal, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            user_id: new.user_id,
            description: new.description,
            target_node_id: new.target_node_id,
            recommended_path: new.recommended_path,
            created_at,
        }
    }
}

/// Insert draft for a [`Goal`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGoal {
    pub user_id: UserId,
    pub description: String,
    pub target_node_id: NodeId,
    pub recommended_path: Vec<NodeId>,
}

/// Graph ownership record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Graph {
    pub id: GraphId,
    pub user_id: UserId,
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Point-in-time view of one graph's nodes and edges
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl GraphSnapshot {
    /// Create snapshot
    #[inline]
    #[must_use]
    pub fn new(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        Self { nodes, edges }
    }

    /// Look up a node by id
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// The center node, if present
    #[must_use]
    pub fn center(&self) -> Option<&Node> {
        self.nodes.iter().find(|n| n.node_type == NodeType::Center)
    }

    /// First inbound edge of `node`
    #[must_use]
    pub fn parent_edge(&self, node: NodeId) -> Option<&Edge> {
        self.edges.iter().find(|e| e.to_node_id == node)
    }

    /// Parent of `node` according to the edge set
    #[must_use]
    pub fn parent_of(&self, node: NodeId) -> Option<NodeId> {
        self.parent_edge(node).map(|e| e.from_node_id)
    }

    /// Nodes keyed by id
    #[must_use]
    pub fn index(&self) -> HashMap<NodeId, &Node> {
        self.nodes.iter().map(|n| (n.id, n)).collect()
    }

    /// All node labels in snapshot order
    #[must_use]
    pub fn labels(&self) -> Vec<String> {
        self.nodes.iter().map(|n| n.label.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_type_wire_names() {
        assert_eq!(serde_json::to_string(&NodeType::Cert).unwrap(), "\"cert\"");
        assert_eq!("position".parse::<NodeType>().unwrap(), NodeType::Position);
        assert!("mentor".parse::<NodeType>().is_err());
    }

    #[test]
    fn node_type_roles() {
        assert!(NodeType::Center.is_always_unlocked());
        assert!(NodeType::Current.is_always_unlocked());
        assert!(!NodeType::Skill.is_always_unlocked());
        assert!(NodeType::Skill.is_proposable());
        assert!(!NodeType::Goal.is_proposable());
        assert_eq!(NodeType::Cert.default_color(), palette::CERT);
    }

    #[test]
    fn progress_of_zero_requirement_is_complete() {
        let graph = GraphId::new();
        let node = Node::from_new(NodeId::new(), NewNode::new(graph, NodeType::Goal, "g"), Utc::now());
        assert!((node.progress_percent() - 100.0).abs() < f64::EPSILON);
        assert!(node.is_full());
    }

    #[test]
    fn node_serializes_camel_case() {
        let graph = GraphId::new();
        let node = Node::from_new(
            NodeId::new(),
            NewNode::new(graph, NodeType::Skill, "Rust").with_required_exp(100),
            Utc::now(),
        );
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["nodeType"], "skill");
        assert_eq!(json["requiredExp"], 100);
        assert!(json.get("positionX").is_some());
    }

    #[test]
    fn patch_applies_only_set_fields() {
        let graph = GraphId::new();
        let mut node = Node::from_new(
            NodeId::new(),
            NewNode::new(graph, NodeType::Skill, "Rust").with_current_exp(20).locked(true),
            Utc::now(),
        );
        node.apply(&NodePatch::lock(false));
        assert!(!node.is_locked);
        assert_eq!(node.current_exp, 20);
        node.apply(&NodePatch::position(1.0, -2.0));
        assert_eq!((node.position_x, node.position_y), (1.0, -2.0));
    }
}
