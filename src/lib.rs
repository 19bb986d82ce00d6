//! Rule-driven JSON tree editing.
//!
//! [`clone_json`] walks a JSON value and resolves the directives it carries
//! (templated names and values, `?condition` branches, `[[var]]=` / `*var=`
//! expansions and named references) against an [`EditorContext`]. The result
//! contains no unresolved directives.
//!
//! ```
//! use json_edit::{clone_json, EditorContext};
//! use serde_json::json;
//!
//! let input = json!({"?x=x": {"a": 1}, "?x=y": {"b": 2}, "?default": {"c": 3}});
//! let out = clone_json(&input, &EditorContext::new()).unwrap();
//! assert_eq!(out, json!({"a": 1}));
//! ```
pub mod context;
pub mod editor;
pub mod error;
pub mod path_de;
pub mod rules;
pub mod source;
pub mod state;
pub mod template;

pub type JsonObject = serde_json::Map<String, serde_json::Value>;

pub use context::{
    ContextFile, EditorContext, ReferenceMap, StaticReferenceMap, Variable, Variables,
};
pub use editor::{Edit, EditResult, Editor, EditorOptions, EditorRule, RuleToggles};
pub use error::{EditError, EditErrorKind, ReferenceError, TemplateError};
pub use source::{LayeredObject, ObjectSource, Slot};
pub use state::{
    DeferredProperty, DeferredTag, EditorState, ValidationMode, ValidationPolicy, ValidationRule,
};
pub use template::{MustacheRenderer, TemplateRenderer};

/// Clone `value` with the standard rules and default options.
pub fn clone_json(
    value: &serde_json::Value,
    context: &EditorContext,
) -> Result<serde_json::Value, EditError> {
    Editor::new(EditorOptions::default()).clone_json(value, Some(context))
}

/// Merge `sources` into `target`, in order, with the standard rules and
/// default options.
pub fn merge_json_objects(
    target: &mut JsonObject,
    sources: &[&dyn ObjectSource],
    context: &EditorContext,
) -> Result<(), EditError> {
    Editor::new(EditorOptions::default()).merge_json_objects(target, sources, Some(context))
}
