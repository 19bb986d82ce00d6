//! Variables, reference maps and the context that pairs them.
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::{Map, Number, Value};

use crate::error::ReferenceError;
use crate::JsonObject;

// ————————————————————————————————————————————————————————————————————————————
// VARIABLES
// ————————————————————————————————————————————————————————————————————————————

pub type Variables = IndexMap<String, Variable>;

/// Computed at render time from the variables in scope.
pub type VariableFn = Arc<dyn Fn(&Variables) -> String + Send + Sync>;

#[derive(Clone)]
pub enum Variable {
    String(String),
    Number(Number),
    Bool(bool),
    Function(VariableFn),
}

impl Variable {
    pub fn function(f: impl Fn(&Variables) -> String + Send + Sync + 'static) -> Self {
        Variable::Function(Arc::new(f))
    }

    /// Scalars map one-to-one; `null` is the empty string and composites
    /// render as their JSON text.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Variable::String(String::new()),
            Value::Bool(b) => Variable::Bool(*b),
            Value::Number(n) => Variable::Number(n.clone()),
            Value::String(s) => Variable::String(s.clone()),
            Value::Array(_) | Value::Object(_) => Variable::String(value.to_string()),
        }
    }

    pub fn render(&self, vars: &Variables) -> String {
        match self {
            Variable::String(s) => s.clone(),
            Variable::Number(n) => n.to_string(),
            Variable::Bool(b) => b.to_string(),
            Variable::Function(f) => f(vars),
        }
    }
}

impl fmt::Debug for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variable::String(s) => f.debug_tuple("String").field(s).finish(),
            Variable::Number(n) => f.debug_tuple("Number").field(n).finish(),
            Variable::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Variable::Function(_) => f.write_str("Function(..)"),
        }
    }
}

impl From<&str> for Variable {
    fn from(s: &str) -> Self { Variable::String(s.to_string()) }
}

impl From<String> for Variable {
    fn from(s: String) -> Self { Variable::String(s) }
}

impl From<bool> for Variable {
    fn from(b: bool) -> Self { Variable::Bool(b) }
}

impl From<i64> for Variable {
    fn from(n: i64) -> Self { Variable::Number(n.into()) }
}

pub fn variables_from_json(map: &Map<String, Value>) -> Variables {
    map.iter()
        .map(|(k, v)| (k.clone(), Variable::from_json(v)))
        .collect()
}

// ————————————————————————————————————————————————————————————————————————————
// REFERENCES
// ————————————————————————————————————————————————————————————————————————————

/// Name → JSON object lookup, optionally parameterized by variables.
pub trait ReferenceMap: Send + Sync {
    fn has(&self, name: &str) -> bool;
    fn resolve(&self, name: &str, vars: Option<&Variables>) -> Result<JsonObject, ReferenceError>;
}

/// A fixed table of named objects.
#[derive(Debug, Clone, Default)]
pub struct StaticReferenceMap {
    entries: IndexMap<String, JsonObject>,
}

impl StaticReferenceMap {
    pub fn new() -> Self { Self::default() }

    pub fn insert(&mut self, name: impl Into<String>, object: JsonObject) {
        self.entries.insert(name.into(), object);
    }

    pub fn with(mut self, name: impl Into<String>, object: JsonObject) -> Self {
        self.insert(name, object);
        self
    }

    /// Every entry of `map` must itself be an object.
    pub fn from_json(map: &Map<String, Value>) -> Result<Self, ReferenceError> {
        let mut out = Self::new();
        for (name, value) in map {
            match value {
                Value::Object(object) => out.insert(name.clone(), object.clone()),
                other => {
                    return Err(ReferenceError::Failed {
                        name: name.clone(),
                        message: format!("expected an object, found {}", kind_name(other)),
                    })
                }
            }
        }
        Ok(out)
    }

    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}

impl ReferenceMap for StaticReferenceMap {
    fn has(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }
    fn resolve(&self, name: &str, _vars: Option<&Variables>) -> Result<JsonObject, ReferenceError> {
        self.entries
            .get(name)
            .cloned()
            .ok_or_else(|| ReferenceError::Unknown(name.to_string()))
    }
}

pub(crate) fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ————————————————————————————————————————————————————————————————————————————
// CONTEXT
// ————————————————————————————————————————————————————————————————————————————

/// Variable bindings and references in scope for one resolution.
#[derive(Clone, Default)]
pub struct EditorContext {
    pub vars: Option<Arc<Variables>>,
    pub refs: Option<Arc<dyn ReferenceMap>>,
}

impl EditorContext {
    pub fn new() -> Self { Self::default() }

    pub fn with_vars(mut self, vars: Variables) -> Self {
        self.vars = Some(Arc::new(vars));
        self
    }

    pub fn with_refs(mut self, refs: impl ReferenceMap + 'static) -> Self {
        self.refs = Some(Arc::new(refs));
        self
    }

    /// Each field comes from `self` when it defines one, otherwise from `base`.
    pub fn over(&self, base: &EditorContext) -> EditorContext {
        EditorContext {
            vars: self.vars.clone().or_else(|| base.vars.clone()),
            refs: self.refs.clone().or_else(|| base.refs.clone()),
        }
    }

    /// A context whose variables are this context's plus `extra` (extra wins).
    pub fn extend_vars<I>(&self, extra: I) -> EditorContext
    where
        I: IntoIterator<Item = (String, Variable)>,
    {
        let mut vars = self.vars.as_deref().cloned().unwrap_or_default();
        vars.extend(extra);
        EditorContext { vars: Some(Arc::new(vars)), refs: self.refs.clone() }
    }
}

impl fmt::Debug for EditorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditorContext")
            .field("vars", &self.vars.as_ref().map(|v| v.keys().collect::<Vec<_>>()))
            .field("refs", &self.refs.is_some())
            .finish()
    }
}

/// On-disk form: `{ "vars": {...}, "refs": { "name": {...} } }`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContextFile {
    pub vars: Option<Map<String, Value>>,
    pub refs: Option<Map<String, Value>>,
}

impl ContextFile {
    pub fn into_context(self) -> Result<EditorContext, ReferenceError> {
        let mut ctx = EditorContext::new();
        if let Some(vars) = &self.vars {
            ctx = ctx.with_vars(variables_from_json(vars));
        }
        if let Some(refs) = &self.refs {
            ctx = ctx.with_refs(StaticReferenceMap::from_json(refs)?);
        }
        Ok(ctx)
    }
}
