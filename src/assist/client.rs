//! OpenAI-compatible chat client that proposes questionnaire answers.
//!
//! The assist workflow sends the template's questions plus a free-form
//! project description to a chat-completions endpoint and folds the returned
//! JSON object in as one more answer source. Replies are validated against
//! the questionnaire before use: unknown keys and out-of-set choices are
//! dropped, never trusted. Without an API key the assist features stay off;
//! package selection falls back to a keyword table.

// Internal imports (std, crate)
use crate::core::descriptor::{Question, QuestionKind, TemplateDescriptor};
use crate::core::error::{Error, Result};
use crate::core::value::Value;
use std::collections::BTreeMap;
use std::time::Duration;

// External imports (alphabetized)
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// API key environment variables, checked in order.
pub const API_KEY_ENV: &str = "DSFORGE_ASSIST_API_KEY";
pub const API_KEY_FALLBACK_ENV: &str = "OPENAI_API_KEY";
/// Endpoint and model overrides.
pub const BASE_URL_ENV: &str = "DSFORGE_ASSIST_BASE_URL";
pub const MODEL_ENV: &str = "DSFORGE_ASSIST_MODEL";

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

const SYSTEM_PROMPT: &str = "You are a project scaffolding assistant. \
    Answer with a single JSON object and nothing else. Keys must be taken \
    from the provided question names; values must respect each question's \
    type and allowed choices.";

/// Chat client for an OpenAI-compatible `/chat/completions` endpoint.
pub struct AssistClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

impl AssistClient {
    pub fn new(base_url: &str, api_key: &str, model: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .build()
            .map_err(|e| Error::assist(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }

    /// Build a client from the environment, or fail when no API key is set.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var(API_KEY_ENV)
            .or_else(|_| std::env::var(API_KEY_FALLBACK_ENV))
            .map_err(|_| {
                Error::assist(format!(
                    "no API key configured; set {API_KEY_ENV} or {API_KEY_FALLBACK_ENV}"
                ))
            })?;
        let base_url =
            std::env::var(BASE_URL_ENV).unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let model = std::env::var(MODEL_ENV).unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        Self::new(&base_url, &api_key, &model)
    }

    /// Propose answers for the questions `collected` does not cover yet.
    ///
    /// Returned entries are validated against the questionnaire; the caller
    /// layers them as one more answer source, so prompts still run for
    /// anything the assistant left open.
    pub async fn suggest_answers(
        &self,
        descriptor: &TemplateDescriptor,
        collected: &BTreeMap<String, Value>,
        description: &str,
    ) -> Result<BTreeMap<String, Value>> {
        let prompt = build_questionnaire_prompt(descriptor, collected, description);
        let reply = self.complete(SYSTEM_PROMPT, &prompt).await?;
        debug!("Assist reply: {reply}");
        Ok(parse_assist_answers(&reply, descriptor))
    }

    /// Ask which of the available package templates fit the described
    /// project. Unknown names in the reply are dropped.
    pub async fn propose_packages(
        &self,
        description: &str,
        available: &[String],
    ) -> Result<Vec<String>> {
        let prompt = format!(
            "Project description:\n{description}\n\nAvailable package templates: {}.\n\
             Reply with a JSON array of the template names this project needs.",
            available.join(", ")
        );
        let reply = self.complete(SYSTEM_PROMPT, &prompt).await?;
        let body = extract_json_block(&reply);
        let names: Vec<String> = serde_json::from_str(&body)
            .map_err(|e| Error::assist(format!("package proposal was not a JSON array: {e}")))?;
        Ok(names
            .into_iter()
            .filter(|name| {
                let known = available.iter().any(|a| a == name);
                if !known {
                    warn!("Assist proposed unknown package template '{name}', dropping");
                }
                known
            })
            .collect())
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: 0.2,
        };

        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::assist(format!("request to {url} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::assist(format!(
                "assist endpoint returned HTTP {status}"
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::assist(format!("failed to decode assist response: {e}")))?;
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::assist("assist response contained no choices"))?;
        Ok(choice.message.content)
    }
}

/// The prompt listing every unanswered question with its constraints.
fn build_questionnaire_prompt(
    descriptor: &TemplateDescriptor,
    collected: &BTreeMap<String, Value>,
    description: &str,
) -> String {
    let mut prompt = format!(
        "Template: {} ({})\nProject description:\n{description}\n\nQuestions:\n",
        descriptor.name, descriptor.description
    );
    for question in &descriptor.questions {
        if collected.contains_key(&question.name) {
            continue;
        }
        prompt.push_str(&format!("- {} ({})", question.name, kind_label(question)));
        match &question.kind {
            QuestionKind::Select { choices } | QuestionKind::MultiSelect { choices, .. } => {
                let values: Vec<String> =
                    choices.iter().map(|c| c.value().to_string()).collect();
                prompt.push_str(&format!(", choices: [{}]", values.join(", ")));
            }
            _ => {}
        }
        if let Some(default) = question.effective_default() {
            prompt.push_str(&format!(", default: {default}"));
        }
        prompt.push('\n');
    }
    if !collected.is_empty() {
        prompt.push_str("\nAlready answered (do not repeat):\n");
        for (key, value) in collected {
            prompt.push_str(&format!("- {key}: {value}\n"));
        }
    }
    prompt.push_str("\nReply with a JSON object mapping question names to answers.");
    prompt
}

fn kind_label(question: &Question) -> &'static str {
    match question.kind {
        QuestionKind::Text => "text",
        QuestionKind::Select { .. } => "select",
        QuestionKind::MultiSelect { .. } => "multi_select",
        QuestionKind::Confirm => "confirm",
    }
}

static FENCED_JSON: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"```(?:json)?\s*([\s\S]*?)```").expect("fenced JSON regex must compile")
});

/// Strip a Markdown code fence if present, otherwise return the trimmed
/// reply as-is.
fn extract_json_block(reply: &str) -> String {
    if let Some(captures) = FENCED_JSON.captures(reply) {
        return captures[1].trim().to_string();
    }
    reply.trim().to_string()
}

/// Parse and validate a questionnaire reply. Invalid entries are dropped
/// with a warning; this never fails outright since the prompts can still
/// cover whatever is missing.
fn parse_assist_answers(
    reply: &str,
    descriptor: &TemplateDescriptor,
) -> BTreeMap<String, Value> {
    let body = extract_json_block(reply);
    let parsed: serde_json::Value = match serde_json::from_str(&body) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!("Assist reply was not valid JSON, ignoring: {e}");
            return BTreeMap::new();
        }
    };
    let serde_json::Value::Object(entries) = parsed else {
        warn!("Assist reply was not a JSON object, ignoring");
        return BTreeMap::new();
    };

    let mut answers = BTreeMap::new();
    for (key, raw) in entries {
        let Some(question) = descriptor.question(&key) else {
            debug!("Assist answered unknown question '{key}', dropping");
            continue;
        };
        let value = match Value::from_json(raw) {
            Ok(value) => value,
            Err(e) => {
                warn!("Assist answer for '{key}' rejected: {e}");
                continue;
            }
        };
        match validate_answer(question, value) {
            Some(value) => {
                answers.insert(key, value);
            }
            None => warn!(
                "Assist answer for '{}' does not fit the question, dropping",
                question.name
            ),
        }
    }
    answers
}

fn validate_answer(question: &Question, value: Value) -> Option<Value> {
    match &question.kind {
        QuestionKind::Text => match value {
            Value::String(_) | Value::Int(_) | Value::Float(_) => Some(value),
            Value::Bool(b) => Some(Value::String(b.to_string())),
            _ => None,
        },
        QuestionKind::Confirm => match value {
            Value::Bool(_) => Some(value),
            _ => None,
        },
        QuestionKind::Select { choices } => choices
            .iter()
            .any(|choice| choice.value() == &value)
            .then_some(value),
        QuestionKind::MultiSelect { choices, .. } => {
            let Value::Seq(items) = value else {
                return None;
            };
            let valid: Vec<Value> = items
                .into_iter()
                .filter(|item| {
                    let known = choices.iter().any(|choice| choice.value() == item);
                    if !known {
                        warn!(
                            "Dropping '{item}' from multi-select '{}': not a choice",
                            question.name
                        );
                    }
                    known
                })
                .collect();
            Some(Value::Seq(valid))
        }
    }
}

/// Keyword fallback used when no assist endpoint is configured: pick the
/// package templates whose concern the description obviously mentions.
/// `pkg_core` is always included when available.
pub fn fallback_packages(description: &str, available: &[String]) -> Vec<String> {
    const KEYWORDS: [(&str, &[&str]); 5] = [
        ("pkg_api", &["api", "rest", "fastapi", "endpoint", "service"]),
        ("pkg_cli", &["cli", "command line", "terminal"]),
        (
            "pkg_frontend_streamlit",
            &["dashboard", "streamlit", "frontend", "ui", "visualization"],
        ),
        ("pkg_worker", &["worker", "queue", "batch", "pipeline", "etl"]),
        ("pkg_lib", &["library", "shared code"]),
    ];

    let lowered = description.to_lowercase();
    let mut selected = Vec::new();
    if available.iter().any(|a| a == "pkg_core") {
        selected.push("pkg_core".to_string());
    }
    for (name, keywords) in KEYWORDS {
        if !available.iter().any(|a| a == name) {
            continue;
        }
        if keywords.iter().any(|keyword| lowered.contains(keyword)) {
            selected.push(name.to_string());
        }
    }
    selected
}
