//! Error types for the skill tree service
//!
//! Three layers:
//! - [`StoreError`] from the graph store seam
//! - [`OracleError`] from the node proposal oracle seam
//! - [`SkillTreeError`], what every service operation returns
//!
//! Callers never show raw internals to users. They use
//! [`SkillTreeError::user_message`], which maps every error onto a small
//! fixed set of messages.

use serde::Serialize;
use skill_graph::{GraphId, NodeId};

/// Graph store failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Entity does not exist
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Backend refused the request for capacity reasons
    #[error("store quota exceeded")]
    QuotaExceeded,

    /// Any other backend failure
    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Not-found error for an entity kind
    #[inline]
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

/// Node proposal oracle failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OracleError {
    /// Upstream quota exhausted
    #[error("oracle rate limited")]
    RateLimited,

    /// Upstream temporarily overloaded
    #[error("oracle overloaded")]
    Overloaded,

    /// Request never produced a response
    #[error("oracle transport error: {0}")]
    Transport(String),

    /// Response arrived but is not usable
    #[error("malformed oracle output: {0}")]
    Malformed(String),
}

/// Main service error type
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SkillTreeError {
    /// Referenced node does not exist
    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    /// Referenced graph does not exist
    #[error("graph not found: {0}")]
    GraphNotFound(GraphId),

    /// Graph has no center node to hang a new current node from
    #[error("center node not found in graph {0}")]
    CenterNotFound(GraphId),

    /// Oracle named a starting node that cannot be resolved
    #[error("starting node not found: {requested_label:?} (available: {available_labels:?})")]
    StartNodeNotFound {
        /// Label as the oracle returned it
        requested_label: String,
        /// Every label present in the graph
        available_labels: Vec<String>,
    },

    /// Oracle output is not valid JSON of the expected shape
    #[error("bad oracle response: {0}")]
    BadOracleResponse(String),

    /// Operation requires an unlocked node
    #[error("node is locked: {0}")]
    LockedNode(NodeId),

    /// Operation refused for structural reasons
    #[error("operation rejected: {0}")]
    Rejected(String),

    /// Oracle rate limited or overloaded; retry later
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Oracle could not be reached
    #[error("oracle failed: {0}")]
    Oracle(String),

    /// Graph store failure
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<OracleError> for SkillTreeError {
    fn from(err: OracleError) -> Self {
        match err {
            OracleError::RateLimited | OracleError::Overloaded => Self::UpstreamUnavailable(err.to_string()),
            OracleError::Transport(msg) => Self::Oracle(msg),
            OracleError::Malformed(msg) => Self::BadOracleResponse(msg),
        }
    }
}

impl SkillTreeError {
    /// Check if a later retry may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::UpstreamUnavailable(_) | Self::Store(StoreError::QuotaExceeded)
        )
    }

    /// Check if error is a not-found condition
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::NodeNotFound(_)
                | Self::GraphNotFound(_)
                | Self::CenterNotFound(_)
                | Self::StartNodeNotFound { .. }
                | Self::Store(StoreError::NotFound { .. })
        )
    }

    /// HTTP-equivalent status code
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            e if e.is_not_found() => 404,
            e if e.is_retryable() => 503,
            Self::LockedNode(_) | Self::Rejected(_) => 400,
            _ => 500,
        }
    }

    /// Bounded message class shown to users
    #[must_use]
    pub fn user_message(&self) -> UserMessage {
        match self {
            e if e.is_retryable() => UserMessage::ServiceBusy,
            e if e.is_not_found() => UserMessage::NotFound,
            Self::LockedNode(_) => UserMessage::LockedNode,
            _ => UserMessage::OperationFailed,
        }
    }

    /// Create start-node diagnostic error
    #[inline]
    pub fn start_node_not_found(requested_label: impl Into<String>, available_labels: Vec<String>) -> Self {
        Self::StartNodeNotFound {
            requested_label: requested_label.into(),
            available_labels,
        }
    }
}

/// User-facing error classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UserMessage {
    ServiceBusy,
    NotFound,
    LockedNode,
    OperationFailed,
}

impl UserMessage {
    /// Fixed human-readable text
    #[must_use]
    pub fn text(&self) -> &'static str {
        match self {
            Self::ServiceBusy => "The service is busy. Please try again in a little while.",
            Self::NotFound => "The requested item could not be found.",
            Self::LockedNode => "This node is still locked. Progress its parent first.",
            Self::OperationFailed => "The operation failed. Please try again.",
        }
    }
}

impl std::fmt::Display for UserMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.text())
    }
}

/// Result alias for service operations
pub type Result<T> = std::result::Result<T, SkillTreeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oracle_errors_map_to_taxonomy() {
        let busy: SkillTreeError = OracleError::RateLimited.into();
        assert!(busy.is_retryable());
        assert_eq!(busy.status_code(), 503);
        assert_eq!(busy.user_message(), UserMessage::ServiceBusy);

        let bad: SkillTreeError = OracleError::Malformed("no json".into()).into();
        assert!(matches!(bad, SkillTreeError::BadOracleResponse(_)));
        assert_eq!(bad.status_code(), 500);

        let down: SkillTreeError = OracleError::Transport("reset".into()).into();
        assert!(!down.is_retryable());
        assert_eq!(down.user_message(), UserMessage::OperationFailed);
    }

    #[test]
    fn quota_is_service_busy() {
        let err = SkillTreeError::from(StoreError::QuotaExceeded);
        assert!(err.is_retryable());
        assert_eq!(err.user_message(), UserMessage::ServiceBusy);
    }

    #[test]
    fn start_label_failure_carries_diagnostics() {
        let err = SkillTreeError::start_node_not_found("Rust (skill)", vec!["Go".into(), "SQL".into()]);
        assert_eq!(err.status_code(), 404);
        let text = err.to_string();
        assert!(text.contains("Rust (skill)"));
        assert!(text.contains("SQL"));
    }

    #[test]
    fn locked_node_is_client_error() {
        let err = SkillTreeError::LockedNode(NodeId::new());
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.user_message(), UserMessage::LockedNode);
    }
}
