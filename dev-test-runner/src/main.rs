//! Runs JSON fixture cases through the editor.
//!
//! Each fixture file holds an array of cases:
//! `{ "name", "input", "context"?, "options"?, "target"?, "expect" | "expectError" }`.
//! With `target` the input is merged into it instead of cloned.
use std::path::{Path, PathBuf};

use colored::Colorize;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use json_edit::path_de::from_str_with_path;
use json_edit::{ContextFile, Editor, EditorOptions, JsonObject};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct Case {
    name: String,
    input: Value,
    #[serde(default)]
    context: ContextFile,
    #[serde(default)]
    options: EditorOptions,
    target: Option<JsonObject>,
    expect: Option<Value>,
    expect_error: Option<String>,
}

#[derive(Debug, Default)]
struct Summary {
    passed: usize,
    failed: Vec<String>,
}

fn run_case(case: Case) -> Result<(), String> {
    let editor = Editor::new(case.options);
    let context = case.context.into_context().map_err(|e| e.to_string())?;
    let result = match case.target {
        Some(mut target) => {
            let Value::Object(src) = &case.input else {
                return Err("merge input must be an object".to_string());
            };
            editor
                .merge_object_in_place(&mut target, src, Some(&context))
                .map(|()| Value::Object(target))
        }
        None => editor.clone_json(&case.input, Some(&context)),
    };
    match (result, case.expect, case.expect_error) {
        (Ok(actual), Some(expected), None) if actual == expected => Ok(()),
        (Ok(actual), Some(expected), None) => Err(format!(
            "expected {}\n     got {}",
            serde_json::to_string(&expected).unwrap_or_default(),
            serde_json::to_string(&actual).unwrap_or_default(),
        )),
        (Err(error), None, Some(needle)) if error.to_string().contains(&needle) => Ok(()),
        (Err(error), None, Some(needle)) => {
            Err(format!("expected error containing `{needle}`, got `{error}`"))
        }
        (Ok(actual), None, Some(needle)) => Err(format!(
            "expected error containing `{needle}`, got {}",
            serde_json::to_string(&actual).unwrap_or_default(),
        )),
        (Err(error), Some(_), None) => Err(format!("unexpected error: {error}")),
        _ => Err("a case needs exactly one of `expect` / `expectError`".to_string()),
    }
}

fn run_dir(dir: &Path, filter: Option<&Regex>) -> Result<Summary, String> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|e| format!("failed to read {}: {e}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();

    let mut summary = Summary::default();
    for file in files {
        let src = std::fs::read_to_string(&file)
            .map_err(|e| format!("failed to read {}: {e}", file.display()))?;
        let cases: Vec<Case> =
            from_str_with_path(&src).map_err(|e| format!("{}: {e}", file.display()))?;
        let file_name = file.file_name().unwrap_or_default().to_string_lossy().to_string();
        for case in cases {
            if filter.is_some_and(|re| !re.is_match(&case.name)) {
                continue;
            }
            let label = format!("{file_name} › {}", case.name);
            match run_case(case) {
                Ok(()) => {
                    eprintln!("✅ {label}");
                    summary.passed += 1;
                }
                Err(reason) => {
                    eprintln!("❌ {label}\n     {reason}");
                    summary.failed.push(label);
                }
            }
        }
    }
    Ok(summary)
}

fn main() {
    let mut args = std::env::args().skip(1);
    let dir = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures"));
    let filter = match args.next().map(|p| Regex::new(&p)) {
        Some(Ok(re)) => Some(re),
        Some(Err(error)) => {
            eprintln!("{} invalid filter: {error}", "error:".red().bold());
            std::process::exit(2);
        }
        None => None,
    };
    match run_dir(&dir, filter.as_ref()) {
        Ok(summary) => {
            let line = format!("{} passed, {} failed", summary.passed, summary.failed.len());
            if summary.failed.is_empty() {
                eprintln!("{}", line.green());
            } else {
                eprintln!("{}", line.red());
                std::process::exit(1);
            }
        }
        Err(error) => {
            eprintln!("{} {error}", "error:".red().bold());
            std::process::exit(2);
        }
    }
}
