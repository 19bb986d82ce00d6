use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::trace;

use crate::context::Variable;
use crate::editor::{Edit, EditResult, Editor, EditorRule};
use crate::state::{EditorState, ValidationRule};
use crate::template::TemplateRenderer;
use crate::JsonObject;

static ARRAY_FORM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^\[\[\s*([A-Za-z_][\w.-]*)\s*\]\]\s*=(.*)$").unwrap());

static OBJECT_FORM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^\*\s*([A-Za-z_][\w.-]*)\s*=(.*)$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    /// `[[var]]=a,b` → `{ var: [body(a), body(b)] }`
    Array,
    /// `*var=a,b` → `{ a: body(a), b: body(b) }`
    Object,
}

/// Expands one property into a body per listed value, with the loop
/// variable bound while each body is cloned.
pub struct MultiValueRule {
    renderer: Arc<dyn TemplateRenderer>,
}

impl MultiValueRule {
    pub fn new(renderer: Arc<dyn TemplateRenderer>) -> Self {
        Self { renderer }
    }
}

fn split_values(list: &str) -> Vec<&str> {
    list.split(',').map(str::trim).filter(|v| !v.is_empty()).collect()
}

impl EditorRule for MultiValueRule {
    fn name(&self) -> &'static str { "multi-value" }

    fn edit_property(
        &self,
        editor: &Editor,
        key: &str,
        value: &Value,
        state: &mut EditorState,
    ) -> EditResult<JsonObject> {
        let (shape, caps) = if key.starts_with("[[") {
            (Shape::Array, ARRAY_FORM.captures(key))
        } else if key.starts_with('*') {
            (Shape::Object, OBJECT_FORM.captures(key))
        } else {
            return Ok(Edit::Inapplicable);
        };
        let Some(caps) = caps else {
            return state.fail_validation(
                ValidationRule::InvalidPropertyName,
                format!("malformed multi-value key `{key}`"),
            );
        };
        let var = caps[1].to_string();
        let mut list = caps[2].to_string();
        if self.renderer.has_template_syntax(&list) {
            if let Some(vars) = state.vars() {
                list = self.renderer.render(&list, vars)?;
            }
            if self.renderer.has_template_syntax(&list) {
                return Ok(Edit::Inapplicable);
            }
        }

        let items = split_values(&list);
        trace!(%var, count = items.len(), "expanding multi-value property");
        let mut bodies = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            let overlay = state
                .context()
                .extend_vars([(var.clone(), Variable::from(*item))]);
            let body = editor
                .clone_value(value, Some(&overlay), state)
                .map_err(|e| match shape {
                    Shape::Array => e.at_index(i),
                    Shape::Object => e.at(item),
                })?;
            if let Some(body) = body {
                bodies.push((*item, body));
            }
        }

        let mut out = Map::new();
        match shape {
            Shape::Array => {
                let array = bodies.into_iter().map(|(_, body)| body).collect();
                out.insert(var, Value::Array(array));
            }
            Shape::Object => {
                for (item, body) in bodies {
                    out.insert(item.to_string(), body);
                }
            }
        }
        Ok(Edit::Edited(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{EditorContext, Variables};
    use crate::editor::EditorOptions;
    use crate::error::EditErrorKind;
    use serde_json::json;

    fn editor() -> Editor {
        Editor::new(EditorOptions::default())
    }

    fn list_ctx() -> EditorContext {
        EditorContext::new().with_vars(Variables::from([
            ("regions".to_string(), Variable::from("eu, us")),
            ("region".to_string(), Variable::from("outer")),
        ]))
    }

    #[test]
    fn array_form_collects_in_order() {
        let out = editor().clone_json(&json!({"[[p]]=x,y": "{{p}}"}), None).unwrap();
        assert_eq!(out, json!({"p": ["x", "y"]}));
    }

    #[test]
    fn object_form_keys_each_body_by_value() {
        let input = json!({"*name=a, b": {"id": "{{name}}", "fixed": 1}});
        let out = editor().clone_json(&input, None).unwrap();
        assert_eq!(out, json!({"a": {"id": "a", "fixed": 1}, "b": {"id": "b", "fixed": 1}}));
    }

    #[test]
    fn list_is_read_after_rendering() {
        let input = json!({"*region={{regions}}": {"name": "{{region}}"}});
        let out = editor().clone_json(&input, Some(&list_ctx())).unwrap();
        assert_eq!(out, json!({"eu": {"name": "eu"}, "us": {"name": "us"}}));
    }

    #[test]
    fn unresolved_list_is_left_alone() {
        let input = json!({"*region={{regions}}": {"name": "x"}});
        let out = editor().clone_json(&input, None).unwrap();
        assert_eq!(out, input);
    }

    #[test]
    fn loop_binding_shadows_outer_variable_only_inside_body() {
        let input = json!({"[[region]]=north": "{{region}}", "after": "{{region}}"});
        let out = editor().clone_json(&input, Some(&list_ctx())).unwrap();
        assert_eq!(out, json!({"region": ["north"], "after": "outer"}));
    }

    #[test]
    fn empty_list_yields_empty_collection() {
        let out = editor().clone_json(&json!({"[[p]]=": 1, "*q= , ": 2}), None).unwrap();
        assert_eq!(out, json!({"p": []}));
    }

    #[test]
    fn conditionals_inside_bodies_see_the_loop_variable() {
        let input = json!({
            "[[tier]]=gold,silver": {
                "?{{tier}}=gold": {"perks": true},
                "?default": {"perks": false},
                "tier": "{{tier}}"
            }
        });
        let out = editor().clone_json(&input, None).unwrap();
        assert_eq!(
            out,
            json!({"tier": [{"tier": "gold", "perks": true}, {"tier": "silver", "perks": false}]})
        );
    }

    #[test]
    fn malformed_keys_are_invalid_names() {
        for key in ["[[p]", "[[]]=a", "*=a", "*p"] {
            let input = json!({ key: 1 });
            let err = editor().clone_json(&input, None).unwrap_err();
            assert!(
                matches!(err.kind, EditErrorKind::Validation { rule: ValidationRule::InvalidPropertyName, .. }),
                "{key}"
            );
        }
    }
}
