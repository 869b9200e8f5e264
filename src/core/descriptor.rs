//! Template descriptors and their declarative manifests.
//!
//! Every template directory carries a `template.yaml` describing the
//! template: identity, group, ordered questions, conditional directories, and
//! the name of the behavior supplying any custom logic. Descriptors are
//! loaded once at discovery and immutable afterwards; there is no code
//! execution involved in reading one.

// Internal imports (std, crate)
use crate::core::error::{Error, Result};
use crate::core::utils::slugify;
use crate::core::value::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

// External imports (alphabetized)
use serde::{Deserialize, Serialize};
use tracing::debug;

/// File name of the descriptor manifest inside a template directory.
pub const DESCRIPTOR_FILE: &str = "template.yaml";

/// One selectable option of a select/multi-select question: either a bare
/// value or a `{display, value}` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Choice {
    Labeled { display: String, value: Value },
    Bare(Value),
}

impl Choice {
    pub fn value(&self) -> &Value {
        match self {
            Choice::Labeled { value, .. } => value,
            Choice::Bare(value) => value,
        }
    }

    pub fn display(&self) -> String {
        match self {
            Choice::Labeled { display, .. } => display.clone(),
            Choice::Bare(value) => value.to_string(),
        }
    }
}

/// The value domain of a question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestionKind {
    /// Free text answer
    Text,
    /// Single choice from a fixed set
    Select { choices: Vec<Choice> },
    /// Subset of a fixed set; `checked` entries are pre-selected
    MultiSelect {
        choices: Vec<Choice>,
        #[serde(default)]
        checked: Vec<Value>,
    },
    /// Yes/no answer
    Confirm,
}

/// An ordered parameter prompt declared by a descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    /// Context key the answer is stored under; unique per descriptor
    pub name: String,
    /// Human prompt text
    pub message: String,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(flatten)]
    pub kind: QuestionKind,
}

impl Question {
    /// The default that dumps and the editor round-trip should show.
    ///
    /// Multi-select questions without an explicit default fall back to their
    /// checked subset.
    pub fn effective_default(&self) -> Option<Value> {
        if self.default.is_some() {
            return self.default.clone();
        }
        match &self.kind {
            QuestionKind::MultiSelect { checked, .. } if !checked.is_empty() => {
                Some(Value::Seq(checked.clone()))
            }
            _ => None,
        }
    }

    fn validate(&self, location: &str) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::template(format!(
                "template '{location}': question with empty name"
            )));
        }
        if self.message.trim().is_empty() {
            return Err(Error::template(format!(
                "template '{location}': question '{}' has no message",
                self.name
            )));
        }
        match &self.kind {
            QuestionKind::Select { choices } | QuestionKind::MultiSelect { choices, .. }
                if choices.is_empty() =>
            {
                Err(Error::template(format!(
                    "template '{location}': question '{}' declares no choices",
                    self.name
                )))
            }
            _ => Ok(()),
        }
    }
}

/// A conditional-directory rule: the subtree under `prefix` is materialized
/// only when `context[key] == equals`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionalDir {
    pub prefix: String,
    pub key: String,
    pub equals: Value,
}

/// Raw `template.yaml` contents, exactly as template authors write them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescriptorManifest {
    pub name: String,
    pub description: String,
    pub group: String,
    #[serde(default)]
    pub welcome_message: Option<String>,
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(default)]
    pub conditional_dirs: Vec<ConditionalDir>,
    /// Named behavior from the static behavior table; `default` when omitted
    #[serde(default)]
    pub behavior: Option<String>,
}

/// A validated template descriptor, ready for registration.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateDescriptor {
    /// Directory name, the stable registry key
    pub location: String,
    /// Display-safe form of the location (underscores become hyphens)
    pub slug: String,
    pub name: String,
    pub description: String,
    pub group: String,
    pub welcome_message: Option<String>,
    pub questions: Vec<Question>,
    pub conditional_dirs: Vec<ConditionalDir>,
    pub behavior: String,
    /// The template directory this descriptor was loaded from
    pub root: PathBuf,
}

impl TemplateDescriptor {
    /// Validate a manifest into a descriptor.
    ///
    /// `location`, `slug`, `name`, `description` and `group` must be
    /// non-empty and question names unique; anything else is a definition
    /// error that keeps the template out of the registry.
    pub fn from_manifest(
        location: &str,
        root: PathBuf,
        manifest: DescriptorManifest,
    ) -> Result<Self> {
        if location.trim().is_empty() {
            return Err(Error::template("template location must not be empty"));
        }
        for (field, value) in [
            ("name", &manifest.name),
            ("description", &manifest.description),
            ("group", &manifest.group),
        ] {
            if value.trim().is_empty() {
                return Err(Error::template(format!(
                    "template '{location}': '{field}' must not be empty"
                )));
            }
        }

        let mut seen = HashSet::new();
        for question in &manifest.questions {
            question.validate(location)?;
            if !seen.insert(question.name.clone()) {
                return Err(Error::template(format!(
                    "template '{location}': duplicate question name '{}'",
                    question.name
                )));
            }
        }

        Ok(Self {
            location: location.to_string(),
            slug: slugify(location),
            name: manifest.name,
            description: manifest.description,
            group: manifest.group,
            welcome_message: manifest.welcome_message,
            questions: manifest.questions,
            conditional_dirs: manifest.conditional_dirs,
            behavior: manifest.behavior.unwrap_or_else(|| "default".to_string()),
            root,
        })
    }

    /// Load and validate the descriptor of one template directory.
    pub async fn load_from_dir(dir: &Path) -> Result<Self> {
        let manifest_path = dir.join(DESCRIPTOR_FILE);
        debug!("Loading template descriptor from: {}", manifest_path.display());

        let content = tokio::fs::read_to_string(&manifest_path).await.map_err(|e| {
            Error::template(format!(
                "Failed to read descriptor at {}: {}",
                manifest_path.display(),
                e
            ))
        })?;

        let manifest: DescriptorManifest = serde_yaml::from_str(&content).map_err(|e| {
            Error::template(format!(
                "Failed to parse descriptor at {}: {}",
                manifest_path.display(),
                e
            ))
        })?;

        let location = dir
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                Error::template(format!("invalid template directory name: {}", dir.display()))
            })?;

        Self::from_manifest(location, dir.to_path_buf(), manifest)
    }

    /// Find a question by its context key.
    pub fn question(&self, name: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.name == name)
    }

    /// True when `candidate` matches this descriptor's location or slug.
    pub fn matches_name(&self, candidate: &str) -> bool {
        self.location == candidate || self.slug == candidate
    }
}
