//! Per-invocation editor state: effective context, deferred properties and
//! the validation policy.
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::context::{EditorContext, ReferenceMap, Variables};
use crate::editor::Edit;
use crate::error::{EditError, EditErrorKind};
use crate::JsonObject;

// ------------------------------- Policy ---------------------------------- //

/// Named validation failures whose outcome the policy decides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationRule {
    InvalidPropertyName,
    InvalidPropertyValue,
    UndefinedPropertyValue,
}

impl fmt::Display for ValidationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ValidationRule::InvalidPropertyName => "invalid property name",
            ValidationRule::InvalidPropertyValue => "invalid property value",
            ValidationRule::UndefinedPropertyValue => "undefined property value",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationMode {
    /// Fail the enclosing merge.
    Strict,
    /// Soften: names pass through untouched, values are dropped.
    Relaxed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ValidationPolicy {
    pub invalid_property_name: ValidationMode,
    pub invalid_property_value: ValidationMode,
    pub undefined_property_value: ValidationMode,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            invalid_property_name: ValidationMode::Strict,
            invalid_property_value: ValidationMode::Strict,
            undefined_property_value: ValidationMode::Relaxed,
        }
    }
}

impl ValidationPolicy {
    pub fn relaxed() -> Self {
        Self {
            invalid_property_name: ValidationMode::Relaxed,
            invalid_property_value: ValidationMode::Relaxed,
            undefined_property_value: ValidationMode::Relaxed,
        }
    }

    pub fn mode(&self, rule: ValidationRule) -> ValidationMode {
        match rule {
            ValidationRule::InvalidPropertyName => self.invalid_property_name,
            ValidationRule::InvalidPropertyValue => self.invalid_property_value,
            ValidationRule::UndefinedPropertyValue => self.undefined_property_value,
        }
    }
}

// ------------------------------ Deferred --------------------------------- //

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferredTag {
    Match,
    Default,
}

/// A property held back until all of its siblings have been scanned.
#[derive(Debug, Clone, PartialEq)]
pub struct DeferredProperty {
    /// Name of the rule that produced the entry.
    pub owner: &'static str,
    pub key: String,
    pub tag: DeferredTag,
    pub body: JsonObject,
}

// -------------------------------- State ---------------------------------- //

pub struct EditorState {
    context: EditorContext,
    deferred: Vec<DeferredProperty>,
    policy: ValidationPolicy,
}

impl EditorState {
    pub fn new(context: EditorContext, policy: ValidationPolicy) -> Self {
        Self { context, deferred: Vec::new(), policy }
    }

    pub fn context(&self) -> &EditorContext { &self.context }
    pub fn vars(&self) -> Option<&Variables> { self.context.vars.as_deref() }
    pub fn refs(&self) -> Option<&Arc<dyn ReferenceMap>> { self.context.refs.as_ref() }
    pub fn policy(&self) -> &ValidationPolicy { &self.policy }

    pub fn defer(&mut self, entry: DeferredProperty) {
        trace!(key = %entry.key, owner = entry.owner, "deferring property");
        self.deferred.push(entry);
    }

    /// Removes and returns the deferred entries of the current scan.
    pub fn take_deferred(&mut self) -> Vec<DeferredProperty> {
        std::mem::take(&mut self.deferred)
    }

    /// Turn a validation failure into an outcome according to the policy.
    pub fn fail_validation<T>(
        &self,
        rule: ValidationRule,
        message: impl Into<String>,
    ) -> Result<Edit<T>, EditError> {
        let message = message.into();
        match self.policy.mode(rule) {
            ValidationMode::Strict => Err(EditErrorKind::Validation { rule, message }.into()),
            ValidationMode::Relaxed => {
                trace!(%rule, %message, "validation softened");
                Ok(match rule {
                    ValidationRule::InvalidPropertyName => Edit::Inapplicable,
                    ValidationRule::InvalidPropertyValue
                    | ValidationRule::UndefinedPropertyValue => Edit::Ignore,
                })
            }
        }
    }

    /// Run `f` in a new frame: the context becomes `overlay` over the
    /// current one and the deferred list starts empty. Both are restored
    /// afterwards, whatever `f` returns.
    pub fn scoped<R>(
        &mut self,
        overlay: Option<&EditorContext>,
        f: impl FnOnce(&mut EditorState) -> R,
    ) -> R {
        let saved_deferred = std::mem::take(&mut self.deferred);
        let saved_context = overlay.map(|o| {
            let next = o.over(&self.context);
            std::mem::replace(&mut self.context, next)
        });
        let out = f(self);
        if let Some(context) = saved_context {
            self.context = context;
        }
        self.deferred = saved_deferred;
        out
    }
}
