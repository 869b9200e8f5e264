//! Parameter resolution: folding answer sources into one context.
//!
//! Sources are folded in increasing precedence: direct CLI flags, a params
//! file, key=value overrides, then an editor bulk edit. Whatever is still
//! missing afterwards is asked interactively in question order, and the
//! descriptor behavior's `build_context` additions are layered last. A
//! cancelled prompt aborts the whole resolution; no partial context escapes.

// Internal imports (std, crate)
use crate::core::behavior::TemplateBehavior;
use crate::core::context::ScaffoldContext;
use crate::core::descriptor::{Question, QuestionKind, TemplateDescriptor};
use crate::core::error::{Error, Result};
use crate::core::prompt::Prompter;
use crate::core::value::Value;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use std::process::Command;

// External imports (alphabetized)
use tracing::{debug, warn};

/// Non-interactive answer sources for one create run, lowest precedence
/// first. `overrides` holds raw `KEY=VALUE` strings from the CLI.
#[derive(Debug, Default)]
pub struct AnswerSources {
    pub flags: BTreeMap<String, Value>,
    pub params_file: Option<std::path::PathBuf>,
    pub overrides: Vec<String>,
    pub edit: bool,
}

/// Parse `KEY=VALUE` pairs; the value side goes through the opportunistic
/// literal parser (bool/number/JSON, falling back to a plain string).
pub fn parse_key_value_params(params: &[String]) -> Result<BTreeMap<String, Value>> {
    let mut parsed = BTreeMap::new();
    for param in params {
        let Some((key, raw_value)) = param.split_once('=') else {
            return Err(Error::input(format!(
                "invalid parameter '{param}', expected KEY=VALUE"
            )));
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(Error::input(format!(
                "invalid parameter '{param}', key must not be empty"
            )));
        }
        parsed.insert(key.to_string(), Value::parse_cli_literal(raw_value));
    }
    Ok(parsed)
}

/// Load a YAML params file. The top level must be a mapping.
pub fn load_params_file(path: &Path) -> Result<BTreeMap<String, Value>> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::input(format!("failed to read params file {}: {e}", path.display()))
    })?;
    parse_params_document(&content, &path.display().to_string())
}

fn parse_params_document(content: &str, source: &str) -> Result<BTreeMap<String, Value>> {
    let document: serde_yaml::Value = serde_yaml::from_str(content)
        .map_err(|e| Error::input(format!("invalid YAML in {source}: {e}")))?;
    if document.is_null() {
        // An empty file is an empty mapping, not an error
        return Ok(BTreeMap::new());
    }
    match Value::from_yaml(document)? {
        Value::Map(map) => Ok(map),
        other => Err(Error::input(format!(
            "params in {source} must be a mapping at the top level, got {}",
            other.type_name()
        ))),
    }
}

/// YAML dump of `{question.name: default}` for every question with a
/// non-null default, in declaration order. Re-loadable as a params file.
pub fn dump_defaults(descriptor: &TemplateDescriptor) -> Result<String> {
    let mut mapping = serde_yaml::Mapping::new();
    for question in &descriptor.questions {
        if let Some(default) = question.effective_default() {
            mapping.insert(
                serde_yaml::Value::String(question.name.clone()),
                default.to_yaml(),
            );
        }
    }
    Ok(serde_yaml::to_string(&serde_yaml::Value::Mapping(mapping))?)
}

/// The editor command for bulk edits: `$EDITOR`, falling back to `vi`.
pub fn editor_command() -> String {
    std::env::var("EDITOR")
        .ok()
        .filter(|editor| !editor.trim().is_empty())
        .unwrap_or_else(|| "vi".to_string())
}

/// Write defaults overlaid with collected answers to a temp YAML file, open
/// `editor` on it, and reload the result as an answer source.
pub fn edit_params_in_editor(
    descriptor: &TemplateDescriptor,
    collected: &BTreeMap<String, Value>,
    editor: &str,
) -> Result<BTreeMap<String, Value>> {
    let mut mapping = serde_yaml::Mapping::new();
    for question in &descriptor.questions {
        let value = collected
            .get(&question.name)
            .cloned()
            .or_else(|| question.effective_default());
        if let Some(value) = value {
            mapping.insert(
                serde_yaml::Value::String(question.name.clone()),
                value.to_yaml(),
            );
        }
    }
    // Answers without a matching question still belong in the edit buffer
    for (key, value) in collected {
        if descriptor.question(key).is_none() {
            mapping.insert(serde_yaml::Value::String(key.clone()), value.to_yaml());
        }
    }

    let body = serde_yaml::to_string(&serde_yaml::Value::Mapping(mapping))?;
    let mut file = tempfile::Builder::new()
        .prefix("dsforge-params-")
        .suffix(".yaml")
        .tempfile()?;
    writeln!(
        file,
        "# Parameters for template '{}'. Save and close to continue.",
        descriptor.name
    )?;
    file.write_all(body.as_bytes())?;
    file.flush()?;

    let status = Command::new("sh")
        .arg("-c")
        .arg(format!("{editor} '{}'", file.path().display()))
        .status()
        .map_err(|e| Error::input(format!("failed to launch editor '{editor}': {e}")))?;
    if !status.success() {
        return Err(Error::input(format!(
            "editor '{editor}' exited with status {status}"
        )));
    }

    load_params_file(file.path())
}

/// Fold the non-interactive sources in precedence order.
pub fn collect_sources(
    descriptor: &TemplateDescriptor,
    sources: &AnswerSources,
    editor: &str,
) -> Result<BTreeMap<String, Value>> {
    let mut collected = sources.flags.clone();

    if let Some(path) = &sources.params_file {
        let from_file = load_params_file(path)?;
        debug!("Loaded {} parameter(s) from {}", from_file.len(), path.display());
        collected.extend(from_file);
    }

    if !sources.overrides.is_empty() {
        let overrides = parse_key_value_params(&sources.overrides)?;
        debug!("Applying {} key=value override(s)", overrides.len());
        collected.extend(overrides);
    }

    if sources.edit {
        let edited = edit_params_in_editor(descriptor, &collected, editor)?;
        debug!("Editor returned {} parameter(s)", edited.len());
        collected.extend(edited);
    }

    Ok(collected)
}

/// Ask every question the collected answers do not cover, in declaration
/// order, then layer the behavior's `build_context` additions.
pub fn complete_with_prompts(
    descriptor: &TemplateDescriptor,
    behavior: &dyn TemplateBehavior,
    collected: BTreeMap<String, Value>,
    prompter: &dyn Prompter,
) -> Result<ScaffoldContext> {
    let mut context = ScaffoldContext::new();
    context.apply_source(collected);

    for question in &descriptor.questions {
        if context.contains_key(&question.name) {
            debug!(question = %question.name, "already answered, not prompting");
            continue;
        }
        let answer = ask(question, prompter)?;
        context.insert(question.name.clone(), answer);
    }

    let additions = behavior.build_context(descriptor, &context)?;
    context.layer_additions(additions);
    Ok(context)
}

/// Fill every unanswered question from its default without prompting. A
/// question with no default is an error so `--yes` never guesses.
pub fn complete_with_defaults(
    descriptor: &TemplateDescriptor,
    behavior: &dyn TemplateBehavior,
    collected: BTreeMap<String, Value>,
) -> Result<ScaffoldContext> {
    let mut context = ScaffoldContext::new();
    context.apply_source(collected);

    for question in &descriptor.questions {
        if context.contains_key(&question.name) {
            continue;
        }
        let answer = match question.effective_default() {
            Some(value) => value,
            None if matches!(question.kind, QuestionKind::Confirm) => Value::Bool(false),
            None => {
                return Err(Error::input(format!(
                    "question '{}' has no default; pass it with --param {}=... or a params file",
                    question.name, question.name
                )));
            }
        };
        context.insert(question.name.clone(), answer);
    }

    let additions = behavior.build_context(descriptor, &context)?;
    context.layer_additions(additions);
    Ok(context)
}

fn ask(question: &Question, prompter: &dyn Prompter) -> Result<Value> {
    match &question.kind {
        QuestionKind::Text => {
            let default = question.default.as_ref().map(Value::to_string);
            let answer = prompter.text(&question.message, default.as_deref())?;
            Ok(coerce_text_answer(question, answer))
        }
        QuestionKind::Select { choices } => {
            let options: Vec<String> = choices.iter().map(|c| c.display()).collect();
            let default_index = question
                .default
                .as_ref()
                .and_then(|default| choices.iter().position(|c| c.value() == default))
                .unwrap_or(0);
            let chosen = prompter.select(&question.message, &options, default_index)?;
            Ok(choices[chosen].value().clone())
        }
        QuestionKind::MultiSelect { choices, checked } => {
            let options: Vec<String> = choices.iter().map(|c| c.display()).collect();
            let preselected: Vec<bool> = choices
                .iter()
                .map(|c| checked.contains(c.value()))
                .collect();
            let chosen = prompter.multi_select(&question.message, &options, &preselected)?;
            Ok(Value::Seq(
                chosen.into_iter().map(|i| choices[i].value().clone()).collect(),
            ))
        }
        QuestionKind::Confirm => {
            let default = question
                .default
                .as_ref()
                .and_then(Value::as_bool)
                .unwrap_or(false);
            Ok(Value::Bool(prompter.confirm(&question.message, default)?))
        }
    }
}

/// Keep a text answer's type aligned with its default: a numeric default
/// makes a numeric-looking answer numeric, everything else stays a string.
fn coerce_text_answer(question: &Question, answer: String) -> Value {
    match question.default {
        Some(Value::Int(_)) => {
            if let Ok(i) = answer.trim().parse::<i64>() {
                return Value::Int(i);
            }
            warn!(
                question = %question.name,
                "answer '{answer}' is not an integer, keeping it as text"
            );
            Value::String(answer)
        }
        Some(Value::Float(_)) => {
            if let Ok(f) = answer.trim().parse::<f64>() {
                return Value::Float(f);
            }
            warn!(
                question = %question.name,
                "answer '{answer}' is not a number, keeping it as text"
            );
            Value::String(answer)
        }
        _ => Value::String(answer),
    }
}
