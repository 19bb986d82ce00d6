use std::sync::Arc;

use json_edit::{
    clone_json, merge_json_objects, EditErrorKind, Editor, EditorContext, EditorOptions,
    JsonObject, LayeredObject, ObjectSource, StaticReferenceMap, Variable, Variables,
};
use serde_json::{json, Value};

fn obj(v: Value) -> JsonObject {
    v.as_object().cloned().unwrap()
}

#[test]
fn documented_examples_hold() {
    let ctx = EditorContext::new();
    assert_eq!(
        clone_json(&json!({"?x=x": {"a": 1}, "?x=y": {"b": 2}, "?default": {"c": 3}}), &ctx).unwrap(),
        json!({"a": 1})
    );
    assert_eq!(clone_json(&json!({"?": {"a": 1}}), &ctx).unwrap(), json!({}));
    assert_eq!(clone_json(&json!({"[[p]]=x,y": "{{p}}"}), &ctx).unwrap(), json!({"p": ["x", "y"]}));

    let mut target = obj(json!({"v": [1, 2]}));
    let src = obj(json!({"v": [3]}));
    merge_json_objects(&mut target, &[&src], &ctx).unwrap();
    assert_eq!(target["v"], json!([1, 2, 3]));
}

#[test]
fn inherited_keys_fail_the_merge() {
    let src = LayeredObject::new(JsonObject::new())
        .with_prototype(LayeredObject::new(obj(json!({"hidden": true}))));
    let sources: [&dyn ObjectSource; 1] = [&src];
    let mut target = JsonObject::new();
    let err = merge_json_objects(&mut target, &sources, &EditorContext::new()).unwrap_err();
    assert_eq!(err.kind, EditErrorKind::InheritedProperty);
    assert!(err.to_string().contains("cannot merge inherited properties"));
}

#[test]
fn full_pipeline_composes() {
    let refs = StaticReferenceMap::new()
        .with("probe", obj(json!({"path": "/health", "port": "{{port}}"})));
    let vars = Variables::from([
        ("env".to_string(), Variable::from("prod")),
        ("port".to_string(), Variable::from(8080i64)),
        ("services".to_string(), Variable::from("api, worker")),
        ("stamp".to_string(), Variable::function(|vars| format!("{}-build", vars["env"].render(vars)))),
    ]);
    let ctx = EditorContext::new().with_vars(vars).with_refs(refs);
    let input = json!({
        "*svc={{services}}": {
            "name": "{{svc}}",
            "?{{svc}}=api": {"health": "probe"},
            "?{{env}}=prod": {"replicas": 3},
            "?default": {"replicas": 1}
        },
        "build": "{{stamp}}"
    });
    let out = clone_json(&input, &ctx).unwrap();
    assert_eq!(
        out,
        json!({
            "api": {"name": "api", "health": {"path": "/health", "port": "8080"}, "replicas": 3},
            "worker": {"name": "worker", "replicas": 3},
            "build": "prod-build"
        })
    );
    assert_eq!(clone_json(&out, &ctx).unwrap(), out);
}

#[test]
fn one_editor_serves_many_threads() {
    let editor = Arc::new(Editor::new(EditorOptions::default()));
    let ctx = EditorContext::new()
        .with_vars(Variables::from([("who".to_string(), Variable::from("t"))]));
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let editor = Arc::clone(&editor);
            let ctx = ctx.clone();
            std::thread::spawn(move || {
                editor
                    .clone_json(&json!({"[[n]]=a,b": "{{who}}{{n}}", "i": i}), Some(&ctx))
                    .unwrap()
            })
        })
        .collect();
    for (i, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.join().unwrap(), json!({"n": ["ta", "tb"], "i": i}));
    }
}
