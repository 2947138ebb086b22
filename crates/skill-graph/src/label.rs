//! Label resolution
//!
//! Oracles refer to nodes by label and sometimes decorate the label with
//! the node type, e.g. `"Linear Algebra (skill)"`. Resolution is an exact
//! match, retried once with a trailing type suffix removed. There is no
//! case folding and no edit distance.

use crate::types::{Node, NodeId};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

static TYPE_SUFFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\s*\((?:skill|cert|position)\)\s*$").expect("type suffix pattern compiles")
});

/// Strip a trailing `(skill)`, `(cert)` or `(position)` decoration.
///
/// Returns `None` when the label carries no such suffix.
#[must_use]
pub fn strip_type_suffix(label: &str) -> Option<&str> {
    TYPE_SUFFIX
        .find(label)
        .map(|m| label[..m.start()].trim())
}

/// Resolve `candidate` against a node list.
///
/// The first node with an exactly equal label wins.
#[must_use]
pub fn resolve_label<'a>(candidate: &str, nodes: &'a [Node]) -> Option<&'a Node> {
    nodes
        .iter()
        .find(|n| n.label == candidate)
        .or_else(|| {
            let cleaned = strip_type_suffix(candidate)?;
            nodes.iter().find(|n| n.label == cleaned)
        })
}

/// Label to node id map built once per operation
#[derive(Debug, Clone, Default)]
pub struct LabelIndex {
    by_label: HashMap<String, NodeId>,
}

impl LabelIndex {
    /// Create empty index
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Index a node snapshot; on duplicate labels the earliest node wins
    #[must_use]
    pub fn from_nodes(nodes: &[Node]) -> Self {
        let mut by_label = HashMap::with_capacity(nodes.len());
        for node in nodes {
            by_label.entry(node.label.clone()).or_insert(node.id);
        }
        Self { by_label }
    }

    /// Record a label, replacing any previous owner
    pub fn insert(&mut self, label: impl Into<String>, id: NodeId) {
        self.by_label.insert(label.into(), id);
    }

    /// Resolve a candidate label
    #[must_use]
    pub fn resolve(&self, candidate: &str) -> Option<NodeId> {
        self.by_label.get(candidate).copied().or_else(|| {
            let cleaned = strip_type_suffix(candidate)?;
            self.by_label.get(cleaned).copied()
        })
    }

    /// Number of indexed labels
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_label.len()
    }

    /// Whether the index is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_label.is_empty()
    }

    /// Indexed labels, sorted for stable diagnostics
    #[must_use]
    pub fn labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = self.by_label.keys().cloned().collect();
        labels.sort();
        labels
    }
}
