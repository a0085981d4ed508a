//! Codec for the role source-matching rule tree.
//!
//! The tree is a recursive `ANY`/`ALL` predicate over identity sources:
//!
//! ```json
//! {"type":"GROUP","match":"ANY","rules":[{"type":"RULE","source":"<id>","pattern":"^dev-"}]}
//! ```
//!
//! The root is always a group. Blank input decodes to the canonical empty
//! group, and a bare rule (or a bare array of nodes) is wrapped in an
//! implicit `ANY` group. Drift comparison goes through [`structurally_equal`]
//! so key order and whitespace never count as change.

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

/// Canonical serialisation of the empty tree.
pub const EMPTY_RULE_TREE: &str = r#"{"type":"GROUP","match":"ANY","rules":[]}"#;

/// How a group combines its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MatchPolicy {
    /// At least one child matches.
    #[default]
    Any,
    /// Every child matches.
    All,
}

/// One node of the rule tree. Only groups have children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum RuleNode {
    /// Combination of child nodes.
    Group {
        /// Combination policy.
        #[serde(rename = "match", default)]
        matching: MatchPolicy,
        /// Ordered children.
        #[serde(default)]
        rules: Vec<RuleNode>,
    },
    /// Leaf predicate on one identity source.
    Rule {
        /// Identity source identifier.
        source: String,
        /// Pattern applied to the user's attributes in that source.
        pattern: String,
    },
}

impl RuleNode {
    /// The canonical empty group: matches without restriction.
    pub const fn empty() -> Self {
        Self::Group {
            matching: MatchPolicy::Any,
            rules: Vec::new(),
        }
    }

    /// Whether this is a group with no children.
    pub fn is_empty_group(&self) -> bool {
        matches!(self, Self::Group { rules, .. } if rules.is_empty())
    }

    fn validate(&self, depth: usize) -> Result<(), RuleTreeParseError> {
        if depth > MAX_DEPTH {
            return Err(RuleTreeParseError::invalid(format!(
                "rule tree nests deeper than {MAX_DEPTH} levels"
            )));
        }
        match self {
            Self::Group { rules, .. } => rules.iter().try_for_each(|rule| rule.validate(depth + 1)),
            Self::Rule { source, .. } if source.trim().is_empty() => Err(
                RuleTreeParseError::invalid("RULE node requires a non-empty source"),
            ),
            Self::Rule { .. } => Ok(()),
        }
    }
}

impl Default for RuleNode {
    fn default() -> Self {
        Self::empty()
    }
}

const MAX_DEPTH: usize = 32;

/// Failure to read a rule tree.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleTreeParseError {
    /// The text is not JSON.
    #[error("rule tree is not valid JSON: {message}")]
    Malformed { message: String },
    /// The JSON does not describe a valid node.
    #[error("invalid rule tree node: {message}")]
    InvalidNode { message: String },
}

impl RuleTreeParseError {
    fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidNode {
            message: message.into(),
        }
    }
}

/// Parse rule-tree text into a tree whose root is a group.
///
/// # Examples
///
/// ```
/// use provider::domain::rule_tree::{parse, RuleNode};
///
/// assert_eq!(parse("").unwrap(), RuleNode::empty());
/// let wrapped = parse(r#"{"type":"RULE","source":"s1","pattern":".*"}"#).unwrap();
/// assert!(matches!(wrapped, RuleNode::Group { rules, .. } if rules.len() == 1));
/// ```
///
/// # Errors
///
/// Returns [`RuleTreeParseError`] for malformed JSON or invalid node shapes.
pub fn parse(text: &str) -> Result<RuleNode, RuleTreeParseError> {
    if text.trim().is_empty() {
        return Ok(RuleNode::empty());
    }
    let json: Json = serde_json::from_str(text).map_err(|error| RuleTreeParseError::Malformed {
        message: error.to_string(),
    })?;
    from_json(json)
}

/// Build a tree from an already-parsed JSON document.
///
/// # Errors
///
/// Returns [`RuleTreeParseError::InvalidNode`] for invalid node shapes.
pub fn from_json(json: Json) -> Result<RuleNode, RuleTreeParseError> {
    let root = match json {
        Json::Null => RuleNode::empty(),
        Json::Array(items) => RuleNode::Group {
            matching: MatchPolicy::Any,
            rules: items.into_iter().map(node_from_json).collect::<Result<_, _>>()?,
        },
        other => match node_from_json(other)? {
            group @ RuleNode::Group { .. } => group,
            rule @ RuleNode::Rule { .. } => RuleNode::Group {
                matching: MatchPolicy::Any,
                rules: vec![rule],
            },
        },
    };
    root.validate(0)?;
    Ok(root)
}

fn node_from_json(json: Json) -> Result<RuleNode, RuleTreeParseError> {
    if !json.is_object() {
        return Err(RuleTreeParseError::invalid("rule tree nodes must be JSON objects"));
    }
    serde_json::from_value(json).map_err(|error| RuleTreeParseError::invalid(error.to_string()))
}

/// Serialise a tree to its canonical JSON text: `type` first, then the
/// variant fields in declaration order.
///
/// # Errors
///
/// Returns the serde error should the tree fail to serialise.
pub fn serialize(node: &RuleNode) -> Result<String, serde_json::Error> {
    serde_json::to_string(node)
}

/// Compare two rule-tree texts by structure rather than bytes.
///
/// Texts that fail to parse are equal only when identical after trimming.
pub fn structurally_equal(left: &str, right: &str) -> bool {
    match (parse(left), parse(right)) {
        (Ok(a), Ok(b)) => a == b,
        _ => left.trim() == right.trim(),
    }
}
