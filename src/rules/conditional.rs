use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::editor::{Edit, EditResult, Editor, EditorRule};
use crate::state::{DeferredProperty, DeferredTag, EditorState, ValidationRule};
use crate::JsonObject;

const NAME: &str = "conditional";

// ------------------------------- Parsing --------------------------------- //

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp { Eq, Ne, Gt, Lt, Ge, Le }

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    Default,
    /// `?A`: holds when `A` is non-empty.
    Defined(String),
    Compare { left: String, op: CompareOp, right: String },
}

static COMPARE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([^!=<>]*)(!=|>=|<=|=|>|<)([^!=<>]*)$").unwrap());

static DEFINED: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^!=<>]*$").unwrap());

impl Condition {
    /// Parse the text after the leading `?`. Anything from a `#` on is a
    /// comment, so sibling keys can repeat the same condition.
    pub fn parse(text: &str) -> Option<Condition> {
        let text = text.split('#').next().unwrap_or_default().trim();
        if text == "default" {
            return Some(Condition::Default);
        }
        if let Some(caps) = COMPARE.captures(text) {
            let op = match &caps[2] {
                "=" => CompareOp::Eq,
                "!=" => CompareOp::Ne,
                ">" => CompareOp::Gt,
                "<" => CompareOp::Lt,
                ">=" => CompareOp::Ge,
                _ => CompareOp::Le,
            };
            return Some(Condition::Compare {
                left: caps[1].trim().to_string(),
                op,
                right: caps[3].trim().to_string(),
            });
        }
        if DEFINED.is_match(text) {
            return Some(Condition::Defined(text.to_string()));
        }
        None
    }

    pub fn holds(&self) -> bool {
        match self {
            Condition::Default => false,
            Condition::Defined(subject) => !subject.is_empty(),
            Condition::Compare { left, op, right } => {
                let (l, r) = (left.as_str(), right.as_str());
                match op {
                    CompareOp::Eq => l == r,
                    CompareOp::Ne => l != r,
                    CompareOp::Gt => l > r,
                    CompareOp::Lt => l < r,
                    CompareOp::Ge => l >= r,
                    CompareOp::Le => l <= r,
                }
            }
        }
    }
}

// -------------------------------- Rule ----------------------------------- //

/// `?condition` keys select sibling bodies: every matching body is merged,
/// and `?default` bodies only when nothing matched.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConditionalRule;

impl EditorRule for ConditionalRule {
    fn name(&self) -> &'static str { NAME }

    fn edit_property(
        &self,
        _editor: &Editor,
        key: &str,
        value: &Value,
        state: &mut EditorState,
    ) -> EditResult<JsonObject> {
        let Some(text) = key.strip_prefix('?') else {
            return Ok(Edit::Inapplicable);
        };
        let Some(condition) = Condition::parse(text) else {
            return state.fail_validation(
                ValidationRule::InvalidPropertyName,
                format!("malformed condition `{key}`"),
            );
        };
        let Value::Object(body) = value else {
            return state.fail_validation(
                ValidationRule::InvalidPropertyValue,
                format!("condition `{key}` must hold an object"),
            );
        };
        let tag = match condition {
            Condition::Default => DeferredTag::Default,
            c if c.holds() => DeferredTag::Match,
            _ => return Ok(Edit::Ignore),
        };
        Ok(Edit::Deferred(DeferredProperty {
            owner: NAME,
            key: key.to_string(),
            tag,
            body: body.clone(),
        }))
    }

    fn finalize_properties(
        &self,
        _editor: &Editor,
        deferred: &[DeferredProperty],
        _state: &mut EditorState,
    ) -> EditResult<Vec<JsonObject>> {
        let ours: Vec<&DeferredProperty> = deferred.iter().filter(|d| d.owner == NAME).collect();
        if ours.is_empty() {
            return Ok(Edit::Inapplicable);
        }
        let matched = ours.iter().any(|d| d.tag == DeferredTag::Match);
        let keep = if matched { DeferredTag::Match } else { DeferredTag::Default };
        let bodies: Vec<JsonObject> = ours
            .into_iter()
            .filter(|d| d.tag == keep)
            .map(|d| d.body.clone())
            .collect();
        debug!(matched, emitted = bodies.len(), "conditional branches resolved");
        Ok(Edit::Edited(bodies))
    }
}
