use serde_json::{Map, Value};

use crate::context::{kind_name, variables_from_json};
use crate::editor::{Edit, EditResult, Editor, EditorRule};
use crate::error::ReferenceError;
use crate::state::{EditorState, ValidationRule};
use crate::JsonObject;

/// Substitutes named reference objects, both for bare string values and for
/// properties keyed by a reference name.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceRule;

/// Unknown names decline; any other resolver failure is fatal.
fn resolved<T>(result: Result<T, ReferenceError>) -> EditResult<T> {
    match result {
        Ok(object) => Ok(Edit::Edited(object)),
        Err(ReferenceError::Unknown(_)) => Ok(Edit::Inapplicable),
        Err(error) => Err(error.into()),
    }
}

fn select<'a>(object: &'a JsonObject, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = object.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

impl EditorRule for ReferenceRule {
    fn name(&self) -> &'static str { "reference" }

    fn edit_value(
        &self,
        _editor: &Editor,
        value: &Value,
        state: &mut EditorState,
    ) -> EditResult<Value> {
        let Value::String(name) = value else {
            return Ok(Edit::Inapplicable);
        };
        let Some(refs) = state.refs() else {
            return Ok(Edit::Inapplicable);
        };
        if !refs.has(name) {
            return Ok(Edit::Inapplicable);
        }
        Ok(match resolved(refs.resolve(name, state.vars()))? {
            Edit::Edited(object) => Edit::Edited(Value::Object(object)),
            _ => Edit::Inapplicable,
        })
    }

    fn edit_property(
        &self,
        editor: &Editor,
        key: &str,
        value: &Value,
        state: &mut EditorState,
    ) -> EditResult<JsonObject> {
        let Some(refs) = state.refs().cloned() else {
            return Ok(Edit::Inapplicable);
        };
        if !refs.has(key) {
            return Ok(Edit::Inapplicable);
        }
        match value {
            Value::String(mode) if mode == "default" => resolved(refs.resolve(key, state.vars())),
            Value::Object(params) => {
                let overlay = state.context().extend_vars(variables_from_json(params));
                let object = match resolved(refs.resolve(key, overlay.vars.as_deref()))? {
                    Edit::Edited(object) => object,
                    _ => return Ok(Edit::Inapplicable),
                };
                let out = editor.clone_object(&object, Some(&overlay), state)?;
                Ok(Edit::Edited(out))
            }
            Value::String(path) => {
                let object = match resolved(refs.resolve(key, state.vars()))? {
                    Edit::Edited(object) => object,
                    _ => return Ok(Edit::Inapplicable),
                };
                match select(&object, path) {
                    Some(Value::Object(inner)) => Ok(Edit::Edited(inner.clone())),
                    Some(other) => {
                        let mut out = Map::new();
                        out.insert(key.to_string(), other.clone());
                        Ok(Edit::Edited(out))
                    }
                    None => state.fail_validation(
                        ValidationRule::UndefinedPropertyValue,
                        format!("reference `{key}` has nothing at `{path}`"),
                    ),
                }
            }
            other => state.fail_validation(
                ValidationRule::InvalidPropertyValue,
                format!("reference `{key}` cannot be selected by a {}", kind_name(other)),
            ),
        }
    }
}
