//! Skill Graph (skill-graph)
//!
//! Pure engine behind the skill tree. Nothing here performs I/O; every
//! function works on a point-in-time snapshot of nodes and edges.
//!
//! - **Unlock engine**: lock-state changes driven by parent progress
//! - **Label resolver**: exact label matching with type-suffix cleanup
//! - **Layout engine**: radial tidy-tree placement with collision relaxation
//!   and total fallbacks
//! - **Subtree / validation**: breadth-first traversal and forest checks
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use skill_graph::prelude::*;
//!
//! let report = UnlockEngine::new().compute(&snapshot.nodes, &snapshot.edges);
//! let placed = LayoutEngine::default().layout(&snapshot.nodes, &snapshot.edges);
//! ```

#![allow(missing_docs)]

pub mod hierarchy;
pub mod label;
pub mod layout;
pub mod subtree;
pub mod tidy;
pub mod types;
pub mod unlock;
pub mod validate;

// Re-exports
pub use hierarchy::{Hierarchy, HierarchyError};
pub use label::{resolve_label, strip_type_suffix, LabelIndex};
pub use layout::{layout, LayoutConfig, LayoutEngine, LayoutError, LayoutOutcome, LayoutStrategy};
pub use types::*;
pub use unlock::{compute_lock_updates, LockUpdate, UnlockEngine, UnlockReport, UNLOCK_THRESHOLD_PERCENT};
pub use validate::{check_forest, ForestViolation};

/// Common imports
pub mod prelude {
    pub use crate::label::{resolve_label, LabelIndex};
    pub use crate::layout::{LayoutConfig, LayoutEngine, LayoutStrategy};
    pub use crate::types::{
        Edge, Goal, Graph, GraphId, GraphSnapshot, NewEdge, NewGoal, NewNode, Node, NodeId, NodePatch,
        NodeType, UserId,
    };
    pub use crate::unlock::{LockUpdate, UnlockEngine, UnlockReport};
    pub use crate::validate::{check_forest, ForestViolation};
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
