use std::sync::Arc;

use serde_json::{Map, Value};

use crate::editor::{Edit, EditResult, Editor, EditorRule};
use crate::state::{EditorState, ValidationRule};
use crate::template::TemplateRenderer;
use crate::JsonObject;

/// Renders template syntax in property names and string values against the
/// variables in scope. Without variables nothing is touched.
pub struct TemplateRule {
    renderer: Arc<dyn TemplateRenderer>,
    names: bool,
    values: bool,
}

impl TemplateRule {
    pub fn new(renderer: Arc<dyn TemplateRenderer>, names: bool, values: bool) -> Self {
        Self { renderer, names, values }
    }
}

impl EditorRule for TemplateRule {
    fn name(&self) -> &'static str { "template" }

    fn edit_property(
        &self,
        _editor: &Editor,
        key: &str,
        value: &Value,
        state: &mut EditorState,
    ) -> EditResult<JsonObject> {
        if !self.names || !self.renderer.has_template_syntax(key) {
            return Ok(Edit::Inapplicable);
        }
        let Some(vars) = state.vars() else {
            return Ok(Edit::Inapplicable);
        };
        let rendered = self.renderer.render(key, vars)?;
        if rendered.is_empty() {
            return state.fail_validation(
                ValidationRule::InvalidPropertyName,
                format!("`{key}` rendered to an empty name"),
            );
        }
        if rendered == key {
            return Ok(Edit::Inapplicable);
        }
        let mut out = Map::new();
        out.insert(rendered, value.clone());
        Ok(Edit::Edited(out))
    }

    fn edit_value(
        &self,
        _editor: &Editor,
        value: &Value,
        state: &mut EditorState,
    ) -> EditResult<Value> {
        let Value::String(text) = value else {
            return Ok(Edit::Inapplicable);
        };
        if !self.values || !self.renderer.has_template_syntax(text) {
            return Ok(Edit::Inapplicable);
        }
        let Some(vars) = state.vars() else {
            return Ok(Edit::Inapplicable);
        };
        Ok(Edit::Edited(Value::String(self.renderer.render(text, vars)?)))
    }
}
