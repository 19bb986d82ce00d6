//! Error types shared by the engine, the rules and the context collaborators.
use thiserror::Error;

use crate::state::ValidationRule;

// ————————————————————————————————————————————————————————————————————————————
// COLLABORATORS
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("unclosed template tag at byte {0}")]
    Unclosed(usize),
    #[error("unexpected closing delimiter at byte {0}")]
    StrayClose(usize),
    #[error("empty template tag at byte {0}")]
    EmptyTag(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReferenceError {
    #[error("unknown reference `{0}`")]
    Unknown(String),
    #[error("failed to resolve reference `{name}`: {message}")]
    Failed { name: String, message: String },
}

// ————————————————————————————————————————————————————————————————————————————
// ENGINE
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditErrorKind {
    #[error("cannot merge inherited properties")]
    InheritedProperty,
    #[error("{rule}: {message}")]
    Validation { rule: ValidationRule, message: String },
    #[error("value did not settle after {0} edit rounds")]
    Unsettled(usize),
    #[error("{rule}: {message}")]
    Rule { rule: &'static str, message: String },
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Reference(#[from] ReferenceError),
}

/// An unrecoverable edit failure, qualified by the key path it happened at.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}{kind}", path_prefix(.path))]
pub struct EditError {
    pub path: Vec<String>,
    pub kind: EditErrorKind,
}

pub type Result<T, E = EditError> = std::result::Result<T, E>;

impl EditError {
    pub fn rule(rule: &'static str, message: impl Into<String>) -> Self {
        EditErrorKind::Rule { rule, message: message.into() }.into()
    }
    /// Prefix the path with an enclosing property key.
    pub fn at(mut self, key: &str) -> Self {
        self.path.insert(0, key.to_string());
        self
    }
    /// Prefix the path with an enclosing array index.
    pub fn at_index(mut self, index: usize) -> Self {
        self.path.insert(0, format!("[{index}]"));
        self
    }
}

impl From<EditErrorKind> for EditError {
    fn from(kind: EditErrorKind) -> Self {
        Self { path: Vec::new(), kind }
    }
}

impl From<TemplateError> for EditError {
    fn from(error: TemplateError) -> Self {
        EditErrorKind::from(error).into()
    }
}

impl From<ReferenceError> for EditError {
    fn from(error: ReferenceError) -> Self {
        EditErrorKind::from(error).into()
    }
}

fn path_prefix(path: &[String]) -> String {
    if path.is_empty() {
        return String::new();
    }
    let mut out = String::new();
    for segment in path {
        if !out.is_empty() && !segment.starts_with('[') {
            out.push('.');
        }
        out.push_str(segment);
    }
    out.push_str(": ");
    out
}
