//! Node proposal oracle seam
//!
//! The oracle is an external text generator. It receives a plain-text
//! context and returns text that should contain JSON. Prompt wording is
//! the implementation's business. This module owns only the structured
//! request and its context rendering.

use crate::error::OracleError;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use skill_graph::{Node, NodeType};
use std::collections::VecDeque;
use std::fmt::Write as _;

/// One onboarding question and the user's answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingAnswer {
    #[serde(default)]
    pub question_id: String,
    pub question: String,
    /// Free text, a list of choices or a number
    pub answer: Value,
}

/// Compact node description handed to the oracle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSummary {
    pub label: String,
    pub node_type: NodeType,
    pub description: String,
}

impl NodeSummary {
    /// `- {label} ({type}): {description}`
    #[must_use]
    pub fn line(&self) -> String {
        format!("- {} ({}): {}", self.label, self.node_type, self.description)
    }
}

impl From<&Node> for NodeSummary {
    fn from(node: &Node) -> Self {
        Self {
            label: node.label.clone(),
            node_type: node.node_type,
            description: node.description.clone(),
        }
    }
}

/// A current position inferred from onboarding answers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub category: String,
    pub current_position: String,
    #[serde(default)]
    pub reasoning: String,
}

/// What the oracle is asked to do
#[derive(Debug, Clone, PartialEq)]
pub enum OracleRequest {
    /// Classify onboarding answers into current positions
    Classify { answers: Vec<OnboardingAnswer> },
    /// Propose a tree growing from a current position
    GenerateTree { position: Classification },
    /// Propose descendants of an existing node
    ExpandTree { node: NodeSummary, category: String },
    /// Plan a path from the existing graph to a goal
    ResolveGoal { goal: String, existing: Vec<NodeSummary> },
}

impl OracleRequest {
    /// Short request name for logs
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Classify { .. } => "classify",
            Self::GenerateTree { .. } => "generate_tree",
            Self::ExpandTree { .. } => "expand_tree",
            Self::ResolveGoal { .. } => "resolve_goal",
        }
    }

    /// Plain-text context describing the request
    #[must_use]
    pub fn render_context(&self) -> String {
        let mut out = String::new();
        match self {
            Self::Classify { answers } => {
                out.push_str("Onboarding answers:\n");
                for a in answers {
                    let _ = writeln!(out, "Q: {}\nA: {}\n", a.question, a.answer);
                }
            }
            Self::GenerateTree { position } => {
                let _ = writeln!(out, "Category: {}", position.category);
                let _ = writeln!(out, "Current position: {}", position.current_position);
                let _ = writeln!(out, "Reasoning: {}", position.reasoning);
            }
            Self::ExpandTree { node, category } => {
                let _ = writeln!(out, "Selected node:");
                let _ = writeln!(out, "{}", node.line());
                let _ = writeln!(out, "Category: {category}");
            }
            Self::ResolveGoal { goal, existing } => {
                let _ = writeln!(out, "Goal: {goal:?}");
                out.push_str("\nCurrent skill tree nodes:\n");
                for node in existing {
                    let _ = writeln!(out, "{}", node.line());
                }
            }
        }
        out
    }
}

/// External proposal service
#[async_trait]
pub trait NodeOracle: Send + Sync {
    /// Raw oracle text for a request
    async fn propose(&self, request: &OracleRequest) -> Result<String, OracleError>;
}

/// Oracle answering from a fixed queue of recorded responses
#[derive(Debug, Default)]
pub struct ReplayOracle {
    responses: Mutex<VecDeque<String>>,
}

impl ReplayOracle {
    /// Create oracle replaying `responses` in order
    #[must_use]
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
        }
    }

    /// Responses not yet consumed
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.responses.lock().len()
    }
}

#[async_trait]
impl NodeOracle for ReplayOracle {
    async fn propose(&self, request: &OracleRequest) -> Result<String, OracleError> {
        tracing::debug!("Replaying recorded response for {}", request.kind());
        self.responses
            .lock()
            .pop_front()
            .ok_or_else(|| OracleError::Transport("no recorded response left".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn goal_context_lists_nodes() {
        let request = OracleRequest::ResolveGoal {
            goal: "Become a data engineer".into(),
            existing: vec![NodeSummary {
                label: "SQL".into(),
                node_type: NodeType::Skill,
                description: "Querying relational data".into(),
            }],
        };
        let context = request.render_context();
        assert!(context.contains("\"Become a data engineer\""));
        assert!(context.contains("- SQL (skill): Querying relational data"));
        assert_eq!(request.kind(), "resolve_goal");
    }

    #[test]
    fn classify_context_serializes_answers() {
        let request = OracleRequest::Classify {
            answers: vec![OnboardingAnswer {
                question_id: "q1".into(),
                question: "Hobbies?".into(),
                answer: serde_json::json!(["photo", "chess"]),
            }],
        };
        assert!(request.render_context().contains("A: [\"photo\",\"chess\"]"));
    }

    #[tokio::test]
    async fn replay_runs_dry() {
        let oracle = ReplayOracle::new(["{}"]);
        let request = OracleRequest::ExpandTree {
            node: NodeSummary {
                label: "Rust".into(),
                node_type: NodeType::Skill,
                description: String::new(),
            },
            category: "tech".into(),
        };
        assert_eq!(oracle.propose(&request).await.unwrap(), "{}");
        assert_eq!(oracle.remaining(), 0);
        assert!(matches!(oracle.propose(&request).await, Err(OracleError::Transport(_))));
    }
}
