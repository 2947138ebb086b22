//! Skill Core (skill-core)
//!
//! Service layer of the skill tree. Wraps the pure engines of
//! `skill_graph` in request-scoped operations over two seams:
//!
//! - **[`GraphStore`]**: per-entity persistence, no transactions
//! - **[`NodeOracle`]**: external generator of candidate nodes and paths
//!
//! Oracle text is validated into typed proposals ([`schema`]) before the
//! goal resolver ([`goal`]) or the tree applier ([`tree`]) see it.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use skill_core::prelude::*;
//! use std::sync::Arc;
//!
//! let service = SkillTreeService::new(Arc::new(MemoryGraphStore::new()), oracle, EngineConfig::default());
//! let outcome = service.resolve_goal(user, graph, "Become a data engineer").await?;
//! ```

#![allow(missing_docs)]

pub mod config;
pub mod error;
pub mod goal;
pub mod memory;
pub mod oracle;
pub mod schema;
pub mod service;
pub mod store;
pub mod tree;

// Re-exports
pub use config::EngineConfig;
pub use error::{OracleError, Result, SkillTreeError, StoreError, UserMessage};
pub use goal::{plan_goal, GoalCursor, GoalOutcome, GoalPlan, GoalResolver, PlannedStart, PlannedStep};
pub use memory::MemoryGraphStore;
pub use oracle::{Classification, NodeOracle, NodeSummary, OnboardingAnswer, OracleRequest, ReplayOracle};
pub use schema::{GoalProposal, PathStep, ProposedNode, ProposedType, StartSpec, TreeProposal};
pub use service::{Deletion, ExpIncrement, OnboardingOutcome, SkillTreeService, UnlockCheck};
pub use store::{load_snapshot, GraphStore, StoreResult};
pub use tree::{TreeApplication, TreeApplier};

/// Common imports
pub mod prelude {
    pub use crate::config::EngineConfig;
    pub use crate::error::{Result, SkillTreeError};
    pub use crate::memory::MemoryGraphStore;
    pub use crate::oracle::{NodeOracle, OracleRequest, ReplayOracle};
    pub use crate::service::SkillTreeService;
    pub use crate::store::GraphStore;
    pub use skill_graph::prelude::*;
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
