//! The clone/merge engine.
//!
//! A value is first *settled*: every rule's `edit_value` is offered the value
//! in order, the first one that claims it replaces it, and this repeats until
//! a full round passes with no claim. Settled objects are then scanned key by
//! key through `edit_property`; claimed keys are merged back (or held as
//! deferred), unclaimed keys are cloned and merged under the value-merge
//! policy. Once a scan finishes, the deferred batch of that object goes
//! through `finalize_properties` and the results are merged in.
//!
//! Each object scan runs in its own [`EditorState::scoped`] frame, so sibling
//! and nested objects never see each other's deferred entries.
use std::borrow::Cow;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::context::EditorContext;
use crate::error::{EditError, EditErrorKind, Result};
use crate::rules::{ConditionalRule, MultiValueRule, ReferenceRule, TemplateRule};
use crate::source::{merge_value, ObjectSource, Slot};
use crate::state::{DeferredProperty, EditorState, ValidationPolicy, ValidationRule};
use crate::template::{MustacheRenderer, TemplateRenderer};
use crate::JsonObject;

/// Upper bound on `edit_value` rounds for a single value.
pub const MAX_SETTLE_ROUNDS: usize = 64;

// ————————————————————————————————————————————————————————————————————————————
// RULE CONTRACT
// ————————————————————————————————————————————————————————————————————————————

/// Outcome of a rule. The `error` case is the `Err` arm of [`EditResult`].
#[derive(Debug, Clone, PartialEq)]
pub enum Edit<T> {
    Edited(T),
    /// Held back until the enclosing object's scan is complete.
    Deferred(DeferredProperty),
    /// Drop the key or element.
    Ignore,
    /// Not claimed; the next rule (or the default behavior) applies.
    Inapplicable,
}

pub type EditResult<T> = Result<Edit<T>>;

pub trait EditorRule: Send + Sync {
    fn name(&self) -> &'static str;

    /// Claim a property. `Edited` payloads are merged into the target and
    /// scanned again, so one key may expand into several.
    fn edit_property(
        &self,
        _editor: &Editor,
        _key: &str,
        _value: &Value,
        _state: &mut EditorState,
    ) -> EditResult<JsonObject> {
        Ok(Edit::Inapplicable)
    }

    fn edit_value(
        &self,
        _editor: &Editor,
        _value: &Value,
        _state: &mut EditorState,
    ) -> EditResult<Value> {
        Ok(Edit::Inapplicable)
    }

    /// Resolve the deferred batch of one object scan into objects to merge.
    fn finalize_properties(
        &self,
        _editor: &Editor,
        _deferred: &[DeferredProperty],
        _state: &mut EditorState,
    ) -> EditResult<Vec<JsonObject>> {
        Ok(Edit::Inapplicable)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// OPTIONS
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RuleToggles {
    pub templates: bool,
    pub references: bool,
    pub conditionals: bool,
    pub multi_values: bool,
}

impl Default for RuleToggles {
    fn default() -> Self {
        Self { templates: true, references: true, conditionals: true, multi_values: true }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EditorOptions {
    pub rules: RuleToggles,
    pub template_names: bool,
    pub template_values: bool,
    pub validation: ValidationPolicy,
}

impl Default for EditorOptions {
    fn default() -> Self {
        Self {
            rules: RuleToggles::default(),
            template_names: true,
            template_values: true,
            validation: ValidationPolicy::default(),
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// EDITOR
// ————————————————————————————————————————————————————————————————————————————

pub struct Editor {
    rules: Vec<Box<dyn EditorRule>>,
    policy: ValidationPolicy,
}

impl Editor {
    /// The standard rule pipeline: templates, references, conditionals,
    /// multi-values.
    pub fn new(options: EditorOptions) -> Self {
        let renderer: Arc<dyn TemplateRenderer> = Arc::new(MustacheRenderer);
        let mut rules: Vec<Box<dyn EditorRule>> = Vec::new();
        if options.rules.templates {
            rules.push(Box::new(TemplateRule::new(
                renderer.clone(),
                options.template_names,
                options.template_values,
            )));
        }
        if options.rules.references {
            rules.push(Box::new(ReferenceRule));
        }
        if options.rules.conditionals {
            rules.push(Box::new(ConditionalRule));
        }
        if options.rules.multi_values {
            rules.push(Box::new(MultiValueRule::new(renderer)));
        }
        Self::with_rules(rules, options.validation)
    }

    pub fn with_rules(rules: Vec<Box<dyn EditorRule>>, policy: ValidationPolicy) -> Self {
        Self { rules, policy }
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    fn new_state(&self, context: Option<&EditorContext>) -> EditorState {
        EditorState::new(context.cloned().unwrap_or_default(), self.policy)
    }

    // ---------------------------- Front API ------------------------------ //

    /// Fully resolve `value`. A value the rules drop altogether comes back
    /// as `null`.
    pub fn clone_json(&self, value: &Value, context: Option<&EditorContext>) -> Result<Value> {
        let mut state = self.new_state(context);
        let out = self.clone_in(value, &mut state)?;
        Ok(out.unwrap_or(Value::Null))
    }

    pub fn merge_object_in_place<S>(
        &self,
        target: &mut JsonObject,
        src: &S,
        context: Option<&EditorContext>,
    ) -> Result<()>
    where
        S: ObjectSource + ?Sized,
    {
        let mut state = self.new_state(context);
        self.merge_scope(target, src, &mut state)
    }

    /// Merge each source into `target` in order, sharing one context.
    pub fn merge_json_objects(
        &self,
        target: &mut JsonObject,
        sources: &[&dyn ObjectSource],
        context: Option<&EditorContext>,
    ) -> Result<()> {
        debug!(sources = sources.len(), rules = ?self.rule_names(), "merging objects");
        let mut state = self.new_state(context);
        for src in sources {
            self.merge_scope(target, *src, &mut state)?;
        }
        Ok(())
    }

    // --------------------------- Rule-facing ----------------------------- //

    /// Clone `value` with `overlay` applied over the current context.
    /// `None` means the value was dropped.
    pub fn clone_value(
        &self,
        value: &Value,
        overlay: Option<&EditorContext>,
        state: &mut EditorState,
    ) -> Result<Option<Value>> {
        state.scoped(overlay, |state| self.clone_in(value, state))
    }

    /// Clone an object's properties with `overlay` applied.
    pub fn clone_object(
        &self,
        object: &JsonObject,
        overlay: Option<&EditorContext>,
        state: &mut EditorState,
    ) -> Result<JsonObject> {
        state.scoped(overlay, |state| -> Result<JsonObject> {
            let mut out = JsonObject::new();
            self.merge_scope(&mut out, object, state)?;
            Ok(out)
        })
    }

    // ---------------------------- Internals ------------------------------ //

    fn clone_in(&self, value: &Value, state: &mut EditorState) -> Result<Option<Value>> {
        let Some(settled) = self.settle(value, state)? else {
            return Ok(None);
        };
        if let Value::Object(map) = &*settled {
            let mut out = JsonObject::new();
            self.merge_scope(&mut out, map, state)?;
            return Ok(Some(Value::Object(out)));
        }
        if let Value::Array(items) = &*settled {
            let mut out = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                if let Some(v) = self.clone_in(item, state).map_err(|e| e.at_index(i))? {
                    out.push(v);
                }
            }
            return Ok(Some(Value::Array(out)));
        }
        Ok(Some(settled.into_owned()))
    }

    /// Offer `value` to `edit_value` until no rule claims it.
    fn settle<'a>(
        &self,
        value: &'a Value,
        state: &mut EditorState,
    ) -> Result<Option<Cow<'a, Value>>> {
        let mut current = Cow::Borrowed(value);
        'rounds: for _ in 0..MAX_SETTLE_ROUNDS {
            for rule in &self.rules {
                match rule.edit_value(self, &current, state)? {
                    Edit::Inapplicable => continue,
                    Edit::Edited(next) => {
                        trace!(rule = rule.name(), "value edited");
                        current = Cow::Owned(next);
                        continue 'rounds;
                    }
                    Edit::Ignore => return Ok(None),
                    Edit::Deferred(_) => {
                        let message = format!("rule `{}` cannot defer a value", rule.name());
                        state.fail_validation::<()>(ValidationRule::InvalidPropertyValue, message)?;
                        return Ok(None);
                    }
                }
            }
            return Ok(Some(current));
        }
        Err(EditErrorKind::Unsettled(MAX_SETTLE_ROUNDS).into())
    }

    /// Scan and finalize one object in a fresh deferred frame.
    fn merge_scope<S>(&self, target: &mut JsonObject, src: &S, state: &mut EditorState) -> Result<()>
    where
        S: ObjectSource + ?Sized,
    {
        state.scoped(None, |state| -> Result<()> {
            self.scan(target, src, state)?;
            self.finalize(target, state)
        })
    }

    fn scan<S>(&self, target: &mut JsonObject, src: &S, state: &mut EditorState) -> Result<()>
    where
        S: ObjectSource + ?Sized,
    {
        for (key, slot) in src.properties() {
            let value = match slot {
                Slot::Own(value) => value,
                Slot::Inherited => {
                    return Err(EditError::from(EditErrorKind::InheritedProperty).at(key));
                }
            };
            self.merge_property(target, key, value, 0, state)
                .map_err(|e| e.at(key))?;
        }
        Ok(())
    }

    /// `depth` counts the edits that led to `key`. Entries of an edited
    /// payload are claimed again, except the one stored under `key` itself,
    /// which is merged as a plain value.
    fn merge_property(
        &self,
        target: &mut JsonObject,
        key: &str,
        value: &Value,
        depth: usize,
        state: &mut EditorState,
    ) -> Result<()> {
        for rule in &self.rules {
            match rule.edit_property(self, key, value, state)? {
                Edit::Inapplicable => continue,
                Edit::Deferred(entry) => {
                    state.defer(entry);
                    return Ok(());
                }
                Edit::Edited(payload) => {
                    trace!(key, rule = rule.name(), keys = payload.len(), "property edited");
                    if depth == MAX_SETTLE_ROUNDS {
                        return Err(EditErrorKind::Unsettled(MAX_SETTLE_ROUNDS).into());
                    }
                    for (next_key, next_value) in &payload {
                        if next_key == key {
                            self.merge_cloned(target, key, next_value, state)?;
                        } else {
                            self.merge_property(target, next_key, next_value, depth + 1, state)?;
                        }
                    }
                    return Ok(());
                }
                Edit::Ignore => {
                    trace!(key, rule = rule.name(), "property dropped");
                    return Ok(());
                }
            }
        }
        self.merge_cloned(target, key, value, state)
    }

    fn merge_cloned(
        &self,
        target: &mut JsonObject,
        key: &str,
        value: &Value,
        state: &mut EditorState,
    ) -> Result<()> {
        if let Some(cloned) = self.clone_in(value, state)? {
            merge_value(target, key, cloned);
        }
        Ok(())
    }

    fn finalize(&self, target: &mut JsonObject, state: &mut EditorState) -> Result<()> {
        let deferred = state.take_deferred();
        if deferred.is_empty() {
            return Ok(());
        }
        for rule in &self.rules {
            match rule.finalize_properties(self, &deferred, state)? {
                Edit::Inapplicable => continue,
                Edit::Edited(objects) => {
                    trace!(rule = rule.name(), emitted = objects.len(), "deferred properties resolved");
                    for object in &objects {
                        self.merge_scope(target, object, state)?;
                    }
                    return Ok(());
                }
                Edit::Ignore => return Ok(()),
                Edit::Deferred(entry) => {
                    return Err(EditError::rule(
                        rule.name(),
                        format!("cannot defer `{}` while finalizing", entry.key),
                    ));
                }
            }
        }
        warn!(count = deferred.len(), "deferred properties left unclaimed");
        Ok(())
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{StaticReferenceMap, Variable, Variables};
    use crate::source::LayeredObject;
    use serde_json::json;

    fn editor() -> Editor {
        Editor::new(EditorOptions::default())
    }

    fn obj(v: Value) -> JsonObject {
        v.as_object().cloned().unwrap()
    }

    fn vars(pairs: &[(&str, &str)]) -> EditorContext {
        EditorContext::new().with_vars(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), Variable::from(*v)))
                .collect::<Variables>(),
        )
    }

    #[test]
    fn plain_values_clone_deep_equal() {
        let input = json!({"a": [1, {"b": null}, "s"], "c": {"d": true, "e": 1.5}});
        let out = editor().clone_json(&input, None).unwrap();
        assert_eq!(out, input);
    }

    #[test]
    fn clone_is_a_fixed_point() {
        let input = json!({
            "name": "{{who}}",
            "?{{env}}=prod": {"debug": false},
            "?default": {"debug": true},
            "[[v]]=a,b": {"id": "{{v}}"}
        });
        let ctx = vars(&[("who", "x"), ("env", "prod")]);
        let once = editor().clone_json(&input, Some(&ctx)).unwrap();
        let twice = editor().clone_json(&once, Some(&ctx)).unwrap();
        assert_eq!(once, twice);
        assert_eq!(once, json!({"name": "x", "debug": false, "v": [{"id": "a"}, {"id": "b"}]}));
    }

    #[test]
    fn literal_templates_survive_without_context() {
        let input = json!({"{{k}}": "{{v}}"});
        assert_eq!(editor().clone_json(&input, None).unwrap(), input);
    }

    #[test]
    fn merge_concatenates_arrays() {
        let mut target = obj(json!({"xs": [1, 2]}));
        let src = obj(json!({"xs": [3]}));
        editor().merge_object_in_place(&mut target, &src, None).unwrap();
        assert_eq!(Value::Object(target), json!({"xs": [1, 2, 3]}));
    }

    #[test]
    fn merge_many_sources_in_order() {
        let a = obj(json!({"a": {"x": 1}, "list": ["a"]}));
        let b = obj(json!({"a": {"y": "{{y}}"}, "list": ["b"]}));
        let mut target = JsonObject::new();
        editor()
            .merge_json_objects(&mut target, &[&a, &b], Some(&vars(&[("y", "2")])))
            .unwrap();
        assert_eq!(Value::Object(target), json!({"a": {"x": 1, "y": "2"}, "list": ["a", "b"]}));
    }

    #[test]
    fn inherited_properties_are_rejected() {
        let proto = LayeredObject::new(obj(json!({"inherited": 1})));
        let src = LayeredObject::new(JsonObject::new()).with_prototype(proto);
        let mut target = JsonObject::new();
        let err = editor().merge_object_in_place(&mut target, &src, None).unwrap_err();
        assert_eq!(err.kind, EditErrorKind::InheritedProperty);
        assert_eq!(err.to_string(), "inherited: cannot merge inherited properties");
    }

    #[test]
    fn errors_carry_the_key_path() {
        let input = json!({"outer": {"list": [0, {"?a=b=c": {}}]}});
        let err = editor().clone_json(&input, None).unwrap_err();
        assert_eq!(err.path, vec!["outer", "list", "[1]", "?a=b=c"]);
        assert!(err.to_string().starts_with("outer.list[1].?a=b=c: invalid property name"));
    }

    #[test]
    fn array_elements_dropped_by_rules_disappear() {
        struct DropMarker;
        impl EditorRule for DropMarker {
            fn name(&self) -> &'static str { "drop" }
            fn edit_value(&self, _: &Editor, value: &Value, _: &mut EditorState) -> EditResult<Value> {
                Ok(if value == "drop-me" { Edit::Ignore } else { Edit::Inapplicable })
            }
        }
        let editor = Editor::with_rules(vec![Box::new(DropMarker)], ValidationPolicy::default());
        let out = editor.clone_json(&json!([1, "drop-me", 2, {"k": "drop-me"}]), None).unwrap();
        assert_eq!(out, json!([1, 2, {}]));
    }

    #[test]
    fn self_referencing_values_do_not_settle() {
        let ctx = EditorContext::new().with_vars(Variables::from([(
            "loop".to_string(),
            Variable::from("{{loop}}"),
        )]));
        let err = editor().clone_json(&json!("{{loop}}"), Some(&ctx)).unwrap_err();
        assert_eq!(err.kind, EditErrorKind::Unsettled(MAX_SETTLE_ROUNDS));
    }

    #[test]
    fn nested_scopes_keep_their_own_defaults() {
        let input = json!({
            "?x=x": {"a": 1, "inner": {"?y=z": {"b": 2}, "?default": {"c": 3}}},
            "?default": {"d": 4}
        });
        let out = editor().clone_json(&input, None).unwrap();
        assert_eq!(out, json!({"a": 1, "inner": {"c": 3}}));
    }

    #[test]
    fn references_expand_inside_multi_values() {
        let refs = StaticReferenceMap::new()
            .with("box", obj(json!({"shape": "square", "label": "{{item}}"})));
        let ctx = EditorContext::new().with_refs(refs);
        let input = json!({"*item=a,b": "box"});
        let out = editor().clone_json(&input, Some(&ctx)).unwrap();
        assert_eq!(
            out,
            json!({"a": {"shape": "square", "label": "a"}, "b": {"shape": "square", "label": "b"}})
        );
    }

    #[test]
    fn edited_entries_under_the_claimed_key_merge_as_values() {
        let refs = StaticReferenceMap::new().with("a", obj(json!({"a": "default", "n": 1})));
        let ctx = EditorContext::new().with_refs(refs);
        let out = editor().clone_json(&json!({"a": "default"}), Some(&ctx)).unwrap();
        assert_eq!(out, json!({"a": "default", "n": 1}));
    }

    #[test]
    fn cyclic_references_are_unsettled() {
        let refs = StaticReferenceMap::new()
            .with("a", obj(json!({"b": "default"})))
            .with("b", obj(json!({"a": "default"})));
        let ctx = EditorContext::new().with_refs(refs);
        let err = editor().clone_json(&json!({"a": "default"}), Some(&ctx)).unwrap_err();
        assert_eq!(err.kind, EditErrorKind::Unsettled(MAX_SETTLE_ROUNDS));
        assert_eq!(err.path, vec!["a"]);
    }

    #[test]
    fn growing_key_templates_are_unsettled() {
        let err = editor()
            .clone_json(&json!({"{{k}}": 1}), Some(&vars(&[("k", "x{{k}}")])))
            .unwrap_err();
        assert_eq!(err.kind, EditErrorKind::Unsettled(MAX_SETTLE_ROUNDS));
        assert_eq!(err.path, vec!["{{k}}"]);
    }

    #[test]
    fn rule_order_is_configurable() {
        let options = EditorOptions {
            rules: RuleToggles { conditionals: false, ..RuleToggles::default() },
            ..EditorOptions::default()
        };
        let editor = Editor::new(options);
        assert_eq!(editor.rule_names(), vec!["template", "reference", "multi-value"]);
        let input = json!({"?a=a": {"x": 1}});
        assert_eq!(editor.clone_json(&input, None).unwrap(), input);
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let options: EditorOptions = serde_json::from_value(json!({
            "templateNames": false,
            "validation": {"invalidPropertyName": "relaxed"}
        }))
        .unwrap();
        assert!(!options.template_names);
        assert!(options.template_values);
        assert!(options.rules.conditionals);
        assert_eq!(options.validation, ValidationPolicy {
            invalid_property_name: crate::state::ValidationMode::Relaxed,
            ..ValidationPolicy::default()
        });
    }
}
