//! Oracle response validation
//!
//! Oracle text is untrusted. It is reduced to its JSON payload, parsed
//! into loose wire structs, then checked into strongly typed proposals.
//! Anything that fails a check is a [`SkillTreeError::BadOracleResponse`]
//! and nothing downstream ever sees a partial shape.

use crate::error::{Result, SkillTreeError};
use crate::oracle::Classification;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use skill_graph::types::palette;
use skill_graph::{GraphId, NewNode, NodeType};

/// Outermost `{...}` in `text`
#[must_use]
pub fn extract_json_object(text: &str) -> Option<&str> {
    extract_between(text, '{', '}')
}

/// Outermost `[...]` in `text`
#[must_use]
pub fn extract_json_array(text: &str) -> Option<&str> {
    extract_between(text, '[', ']')
}

fn extract_between(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}

fn bad(msg: impl Into<String>) -> SkillTreeError {
    SkillTreeError::BadOracleResponse(msg.into())
}

fn parse_payload<T: DeserializeOwned>(json: &str) -> Result<T> {
    serde_json::from_str(json).map_err(|e| bad(format!("unexpected shape: {e}")))
}

/// Required EXP from an optional oracle number; absent, zero, negative or
/// non-finite values take the default
#[must_use]
pub fn required_exp_or(raw: Option<f64>, default: u32) -> u32 {
    match raw {
        Some(v) if v.is_finite() && v >= 0.5 => {
            let rounded = v.round();
            if rounded >= f64::from(u32::MAX) {
                u32::MAX
            } else {
                // In range by the checks above
                rounded as u32
            }
        }
        _ => default,
    }
}

/// Node type requested by the oracle, mapped onto one the graph can hold
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposedType {
    pub node_type: NodeType,
    pub color: &'static str,
    /// Requested token when it was missing, unknown or not proposable
    pub unrecognised: Option<String>,
}

impl ProposedType {
    /// Map a raw `nodeType`; anything outside skill/cert/position becomes a
    /// fallback-colored skill
    #[must_use]
    pub fn from_raw(raw: Option<&str>) -> Self {
        let token = raw.map(|r| r.trim().to_ascii_lowercase()).unwrap_or_default();
        match token.parse::<NodeType>() {
            Ok(ty) if ty.is_proposable() => Self {
                node_type: ty,
                color: ty.default_color(),
                unrecognised: None,
            },
            _ => Self {
                node_type: NodeType::Skill,
                color: palette::FALLBACK,
                unrecognised: Some(token),
            },
        }
    }

    /// Draft carrying this type and color; the requested token is kept in
    /// `metadata.proposedType` when it was not honoured
    #[must_use]
    pub fn draft(&self, graph_id: GraphId, label: impl Into<String>) -> NewNode {
        let draft = NewNode::new(graph_id, self.node_type, label).with_color(self.color);
        match &self.unrecognised {
            Some(token) => draft.with_metadata("proposedType", token.clone()),
            None => draft,
        }
    }
}

fn required_label(raw: Option<String>, what: &str) -> Result<String> {
    raw.map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| bad(format!("{what}: missing label")))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireNode {
    node_type: Option<String>,
    label: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    required_exp: Option<f64>,
    #[serde(default)]
    parent_labels: Option<Vec<String>>,
    #[serde(default)]
    suggested_resources: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct WireTree {
    nodes: Option<Vec<WireNode>>,
    #[serde(default)]
    reasoning: Option<String>,
}

/// A node the oracle wants created
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposedNode {
    pub kind: ProposedType,
    pub label: String,
    pub description: String,
    pub required_exp: u32,
    /// Candidate parents in preference order
    pub parent_labels: Vec<String>,
    pub suggested_resources: Vec<String>,
}

/// Validated tree generation or expansion response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeProposal {
    pub nodes: Vec<ProposedNode>,
    pub reasoning: String,
}

impl TreeProposal {
    /// Validate oracle text
    pub fn parse(text: &str, default_required_exp: u32) -> Result<Self> {
        let json = extract_json_object(text).ok_or_else(|| bad("no JSON object in response"))?;
        let wire: WireTree = parse_payload(json)?;
        let raw_nodes = wire.nodes.ok_or_else(|| bad("missing nodes"))?;

        let nodes = raw_nodes
            .into_iter()
            .enumerate()
            .map(|(i, n)| {
                let what = format!("nodes[{i}]");
                Ok(ProposedNode {
                    kind: ProposedType::from_raw(n.node_type.as_deref()),
                    label: required_label(n.label, &what)?,
                    description: n.description.unwrap_or_default(),
                    required_exp: required_exp_or(n.required_exp, default_required_exp),
                    parent_labels: n.parent_labels.unwrap_or_default(),
                    suggested_resources: n.suggested_resources.unwrap_or_default(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            nodes,
            reasoning: wire.reasoning.unwrap_or_default(),
        })
    }
}

/// Validate a classification list
pub fn parse_classifications(text: &str) -> Result<Vec<Classification>> {
    let json = extract_json_array(text).ok_or_else(|| bad("no JSON array in response"))?;
    let list: Vec<Classification> = parse_payload(json)?;
    if list.is_empty() {
        return Err(bad("empty classification list"));
    }
    if let Some(i) = list.iter().position(|c| c.current_position.trim().is_empty()) {
        return Err(bad(format!("classifications[{i}]: missing currentPosition")));
    }
    Ok(list)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireLabeled {
    label: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    reasoning: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireStep {
    step_number: Option<f64>,
    #[serde(default)]
    description: Option<String>,
    node_type: Option<String>,
    label: Option<String>,
    #[serde(default)]
    node_description: Option<String>,
    #[serde(default)]
    required_exp: Option<f64>,
    #[serde(default)]
    suggested_resources: Option<Vec<String>>,
    #[serde(default)]
    is_existing_node: Option<bool>,
    #[serde(default)]
    existing_node_label: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireGoal {
    goal_node: Option<WireLabeled>,
    #[serde(default)]
    needs_new_center: Option<bool>,
    #[serde(default)]
    new_current_node: Option<WireLabeled>,
    #[serde(default)]
    starting_node_label: Option<String>,
    #[serde(default)]
    path_steps: Option<Vec<WireStep>>,
    #[serde(default)]
    reasoning: Option<String>,
}

/// Where the goal path starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartSpec {
    /// New current node under the center
    NewCurrent { label: String, description: String },
    /// Existing node, by label
    Existing { label: String },
}

/// One intermediate step of a goal path
#[derive(Debug, Clone, PartialEq)]
pub struct PathStep {
    pub step_number: f64,
    pub kind: ProposedType,
    pub label: String,
    /// Node description (falls back to the step description)
    pub description: String,
    /// What the step achieves
    pub step_description: String,
    pub required_exp: u32,
    pub suggested_resources: Vec<String>,
    /// Label of an existing node to reuse instead of creating one
    pub existing_label: Option<String>,
}

/// Terminal goal node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoalNodeSpec {
    pub label: String,
    pub description: String,
    pub reasoning: String,
}

/// Validated goal resolution response
#[derive(Debug, Clone, PartialEq)]
pub struct GoalProposal {
    pub start: StartSpec,
    /// Sorted by step number; ties keep response order
    pub steps: Vec<PathStep>,
    pub goal: GoalNodeSpec,
    pub reasoning: String,
}

impl GoalProposal {
    /// Validate oracle text
    pub fn parse(text: &str, default_required_exp: u32) -> Result<Self> {
        let json = extract_json_object(text).ok_or_else(|| bad("no JSON object in response"))?;
        let wire: WireGoal = parse_payload(json)?;

        let goal = wire.goal_node.ok_or_else(|| bad("missing goalNode"))?;
        let goal = GoalNodeSpec {
            label: required_label(goal.label, "goalNode")?,
            description: goal.description.unwrap_or_default(),
            reasoning: goal.reasoning.unwrap_or_default(),
        };

        let start = if wire.needs_new_center.unwrap_or(false) {
            let current = wire
                .new_current_node
                .ok_or_else(|| bad("needsNewCenter without newCurrentNode"))?;
            StartSpec::NewCurrent {
                label: required_label(current.label, "newCurrentNode")?,
                description: current.description.unwrap_or_default(),
            }
        } else {
            StartSpec::Existing {
                label: required_label(wire.starting_node_label, "startingNodeLabel")?,
            }
        };

        let mut steps = wire
            .path_steps
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(i, s)| Self::step(i, s, default_required_exp))
            .collect::<Result<Vec<_>>>()?;
        steps.sort_by(|a, b| a.step_number.total_cmp(&b.step_number));

        Ok(Self {
            start,
            steps,
            goal,
            reasoning: wire.reasoning.unwrap_or_default(),
        })
    }

    fn step(i: usize, s: WireStep, default_required_exp: u32) -> Result<PathStep> {
        let what = format!("pathSteps[{i}]");
        let step_number = s
            .step_number
            .filter(|n| n.is_finite())
            .ok_or_else(|| bad(format!("{what}: missing stepNumber")))?;

        let existing_label = if s.is_existing_node.unwrap_or(false) {
            s.existing_node_label
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty())
        } else {
            None
        };

        // Reused steps may omit the label, which is only needed for creation
        let label = match &existing_label {
            Some(existing) => required_label(s.label, &what).unwrap_or_else(|_| existing.clone()),
            None => required_label(s.label, &what)?,
        };

        let step_description = s.description.unwrap_or_default();
        let description = s
            .node_description
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| step_description.clone());

        Ok(PathStep {
            step_number,
            kind: ProposedType::from_raw(s.node_type.as_deref()),
            label,
            description,
            step_description,
            required_exp: required_exp_or(s.required_exp, default_required_exp),
            suggested_resources: s.suggested_resources.unwrap_or_default(),
            existing_label,
        })
    }

    /// Number of steps the oracle proposed
    #[inline]
    #[must_use]
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }
}
