//! `{{name}}` string rendering.
use once_cell::sync::Lazy;
use regex::Regex;

use crate::context::Variables;
use crate::error::TemplateError;

pub trait TemplateRenderer: Send + Sync {
    fn render(&self, template: &str, vars: &Variables) -> Result<String, TemplateError>;

    /// Whether `text` would be touched by [`TemplateRenderer::render`].
    fn has_template_syntax(&self, text: &str) -> bool {
        text.contains("{{")
    }
}

static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{\{([^{}]*)\}\}").unwrap());

/// Logic-less renderer: plain substitution, missing names render empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct MustacheRenderer;

impl TemplateRenderer for MustacheRenderer {
    fn render(&self, template: &str, vars: &Variables) -> Result<String, TemplateError> {
        let mut out = String::with_capacity(template.len());
        let mut last = 0;
        for caps in TAG.captures_iter(template) {
            let whole = caps.get(0).unwrap();
            check_literal(&template[last..whole.start()], last)?;
            out.push_str(&template[last..whole.start()]);
            let name = caps[1].trim();
            if name.is_empty() {
                return Err(TemplateError::EmptyTag(whole.start()));
            }
            if let Some(var) = vars.get(name) {
                out.push_str(&var.render(vars));
            }
            last = whole.end();
        }
        check_literal(&template[last..], last)?;
        out.push_str(&template[last..]);
        Ok(out)
    }
}

/// Literal runs between tags must not carry delimiters of their own.
fn check_literal(text: &str, offset: usize) -> Result<(), TemplateError> {
    if let Some(at) = text.find("{{") {
        return Err(TemplateError::Unclosed(offset + at));
    }
    if let Some(at) = text.find("}}") {
        return Err(TemplateError::StrayClose(offset + at));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Variable;

    fn vars() -> Variables {
        Variables::from([
            ("name".to_string(), Variable::from("world")),
            ("n".to_string(), Variable::from(42i64)),
            (
                "shout".to_string(),
                Variable::function(|vars| vars["name"].render(vars).to_uppercase()),
            ),
        ])
    }

    #[test]
    fn substitutes_names_with_inner_whitespace() {
        let out = MustacheRenderer.render("hello {{ name }} #{{n}}", &vars()).unwrap();
        assert_eq!(out, "hello world #42");
    }

    #[test]
    fn functions_see_the_variable_map() {
        let out = MustacheRenderer.render("{{shout}}!", &vars()).unwrap();
        assert_eq!(out, "WORLD!");
    }

    #[test]
    fn missing_names_render_empty() {
        let out = MustacheRenderer.render("[{{nope}}]", &vars()).unwrap();
        assert_eq!(out, "[]");
    }

    #[test]
    fn malformed_delimiters_fail() {
        assert_eq!(MustacheRenderer.render("a {{name", &vars()), Err(TemplateError::Unclosed(2)));
        assert_eq!(MustacheRenderer.render("a }} b", &vars()), Err(TemplateError::StrayClose(2)));
        assert_eq!(MustacheRenderer.render("{{ }}", &vars()), Err(TemplateError::EmptyTag(0)));
    }

    #[test]
    fn plain_text_has_no_syntax() {
        assert!(!MustacheRenderer.has_template_syntax("plain"));
        assert!(MustacheRenderer.has_template_syntax("x {{y}}"));
    }
}
