//! Minimal CLI: resolve documents (clone) or fold many into one (merge).
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use rayon::prelude::*;
use serde_json::Value;
use tracing::{debug, info};

use json_edit::path_de::from_file_with_path;
use json_edit::{ContextFile, Editor, EditorContext, EditorOptions, JsonObject, ObjectSource};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// resolve templated / conditional / multi-value JSON documents against a context
#[derive(Parser, Debug)]
pub struct CommandLineInterface {
    /// log engine decisions (same as RUST_LOG=debug)
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// resolve each input document on its own
    Clone(CloneOut),
    /// merge every input object, in order, into a single resolved object
    Merge(MergeOut),
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// treat input as newline-delimited JSON (NDJSON)
    #[arg(long, default_value_t = false)]
    ndjson: bool,

    /// JSON Pointer to select a subnode in each document (e.g. /data/items/0/payload)
    #[arg(long)]
    json_pointer: Option<String>,

    /// context file: { "vars": {...}, "refs": {...} }
    #[arg(long, short)]
    context: Option<PathBuf>,

    /// editor options file (rule toggles, templating, validation policy)
    #[arg(long)]
    config: Option<PathBuf>,

    /// One or more inputs. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

#[derive(clap::Parser, Debug)]
struct CloneOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// output .json file (stdout if omitted); a directory when several documents are produced
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// emit compact JSON instead of pretty-printed
    #[arg(long, default_value_t = false)]
    compact: bool,
}

#[derive(clap::Parser, Debug)]
struct MergeOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// emit compact JSON instead of pretty-printed
    #[arg(long, default_value_t = false)]
    compact: bool,
}

/// One parsed input document and where it came from.
struct Document {
    origin: String,
    value: Value,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl InputSettings {
    fn load_editor(&self) -> Result<Editor> {
        let options = match &self.config {
            Some(path) => from_file_with_path::<EditorOptions>(path).map_err(|e| anyhow!(e))?,
            None => EditorOptions::default(),
        };
        let editor = Editor::new(options);
        debug!(rules = ?editor.rule_names(), "editor ready");
        Ok(editor)
    }

    fn load_context(&self) -> Result<EditorContext> {
        let Some(path) = &self.context else {
            return Ok(EditorContext::new());
        };
        let file = from_file_with_path::<ContextFile>(path).map_err(|e| anyhow!(e))?;
        file.into_context()
            .with_context(|| format!("invalid context file {}", path.display()))
    }

    fn load_documents(&self) -> Result<Vec<Document>> {
        let source_paths = resolve_file_path_patterns(&self.input)
            .map_err(|e| anyhow!("failed to resolve input file paths: {e}"))?;
        let mut out = Vec::new();
        for source_path in source_paths {
            let source_path_str = source_path.to_string_lossy().to_string();
            let source = std::fs::read_to_string(&source_path)
                .with_context(|| format!("failed to read source file {source_path_str}"))?;
            if self.ndjson {
                for (line_no, line) in source.lines().enumerate() {
                    if line.trim().is_empty() {
                        continue;
                    }
                    let origin = format!("{source_path_str}:{}", line_no + 1);
                    let value = serde_json::from_str::<Value>(line)
                        .with_context(|| format!("failed to parse JSON ({origin})"))?;
                    out.push(Document { origin, value });
                }
            } else {
                let value = serde_json::from_str::<Value>(&source)
                    .with_context(|| format!("failed to parse JSON source file ({source_path_str})"))?;
                out.push(Document { origin: source_path_str, value });
            }
        }
        if let Some(pointer) = &self.json_pointer {
            for doc in &mut out {
                doc.value = doc
                    .value
                    .pointer(pointer)
                    .cloned()
                    .ok_or_else(|| anyhow!("JSON pointer {pointer} not found in {}", doc.origin))?;
            }
        }
        info!(documents = out.len(), "inputs loaded");
        Ok(out)
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }
    pub fn run(&self) -> Result<()> {
        match &self.cmd {
            Command::Clone(target) => {
                let settings = &target.input_settings;
                let editor = settings.load_editor()?;
                let context = settings.load_context()?;
                let documents = settings.load_documents()?;

                // documents are independent: one editor state per call
                let results = documents
                    .par_iter()
                    .map(|doc| {
                        editor
                            .clone_json(&doc.value, Some(&context))
                            .with_context(|| format!("failed to edit {}", doc.origin))
                    })
                    .collect::<Result<Vec<_>>>()?;

                match (target.out.as_ref(), results.as_slice()) {
                    (None, _) => {
                        for value in &results {
                            println!("{}", render(value, target.compact)?);
                        }
                    }
                    (Some(out), [single]) => write_output(out, &render(single, target.compact)?)?,
                    (Some(dir), _) => {
                        for (doc, value) in documents.iter().zip(&results) {
                            let path = dir.join(output_file_name(&doc.origin));
                            write_output(&path, &render(value, target.compact)?)?;
                        }
                    }
                }
            }
            Command::Merge(target) => {
                let settings = &target.input_settings;
                let editor = settings.load_editor()?;
                let context = settings.load_context()?;
                let documents = settings.load_documents()?;

                let mut objects = Vec::with_capacity(documents.len());
                for doc in &documents {
                    match &doc.value {
                        Value::Object(object) => objects.push(object),
                        _ => bail!("cannot merge {}: not a JSON object", doc.origin),
                    }
                }
                let sources: Vec<&dyn ObjectSource> =
                    objects.iter().map(|o| *o as &dyn ObjectSource).collect();
                let mut merged = JsonObject::new();
                editor.merge_json_objects(&mut merged, &sources, Some(&context))?;

                let src = render(&Value::Object(merged), target.compact)?;
                match target.out.as_ref() {
                    Some(out) => write_output(out, &src)?,
                    None => println!("{src}"),
                }
            }
        }
        Ok(())
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn render(value: &Value, compact: bool) -> Result<String> {
    Ok(if compact {
        serde_json::to_string(value)?
    } else {
        serde_json::to_string_pretty(value)?
    })
}

fn write_output(out: &Path, src: &str) -> Result<()> {
    if let Some(parent) = out.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(out, src).with_context(|| format!("failed to write {}", out.display()))
}

/// `dir/a.json` → `a.json`; NDJSON origins `a.json:3` → `a.3.json`.
fn output_file_name(origin: &str) -> String {
    let (path, line) = match origin.rsplit_once(':') {
        Some((path, line)) if line.chars().all(|c| c.is_ascii_digit()) => (path, Some(line)),
        _ => (origin, None),
    };
    let stem = Path::new(path)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "out".to_string());
    match line {
        Some(line) => format!("{stem}.{line}.json"),
        None => format!("{stem}.json"),
    }
}

fn resolve_file_path_patterns<I>(patterns: I) -> Result<Vec<PathBuf>, Box<dyn std::error::Error>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        // Minimal glob detection for the `glob` crate syntax.
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{' ))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in glob::glob(pattern)? {
                matched_any = true;
                out.push(entry?);
            }
            if !matched_any {
                return Err(format!("glob pattern matched no files: {pattern}").into());
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}
