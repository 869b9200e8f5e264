//! Interactive prompt seam.
//!
//! The resolver asks questions through this trait so the precedence and
//! cancellation logic can be tested without a TTY. The production
//! implementation wraps `dialoguer`; Ctrl-C and Esc both surface as
//! `Error::Cancelled`, which aborts the whole create operation upstream.

// Internal imports (std, crate)
use crate::core::error::{Error, Result};

// External imports (alphabetized)
use dialoguer::{Confirm, Input, MultiSelect, Select};

pub trait Prompter: Send + Sync {
    fn text(&self, message: &str, default: Option<&str>) -> Result<String>;

    /// Returns the index of the chosen option.
    fn select(&self, message: &str, options: &[String], default_index: usize) -> Result<usize>;

    /// Returns the indices of the chosen options; `checked` marks the
    /// pre-selected entries and must be the same length as `options`.
    fn multi_select(
        &self,
        message: &str,
        options: &[String],
        checked: &[bool],
    ) -> Result<Vec<usize>>;

    fn confirm(&self, message: &str, default: bool) -> Result<bool>;
}

fn map_dialoguer_err(err: dialoguer::Error) -> Error {
    let dialoguer::Error::IO(io_err) = err;
    if io_err.kind() == std::io::ErrorKind::Interrupted {
        Error::Cancelled
    } else {
        Error::Io(io_err)
    }
}

/// Terminal prompter backed by dialoguer.
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn text(&self, message: &str, default: Option<&str>) -> Result<String> {
        let mut input = Input::<String>::new().with_prompt(message);
        if let Some(default) = default {
            input = input.default(default.to_string());
        } else {
            input = input.allow_empty(true);
        }
        input.interact_text().map_err(map_dialoguer_err)
    }

    fn select(&self, message: &str, options: &[String], default_index: usize) -> Result<usize> {
        let chosen = Select::new()
            .with_prompt(message)
            .items(options)
            .default(default_index)
            .interact_opt()
            .map_err(map_dialoguer_err)?;
        chosen.ok_or(Error::Cancelled)
    }

    fn multi_select(
        &self,
        message: &str,
        options: &[String],
        checked: &[bool],
    ) -> Result<Vec<usize>> {
        let items: Vec<(&String, bool)> = options
            .iter()
            .zip(checked.iter().copied())
            .collect();
        let chosen = MultiSelect::new()
            .with_prompt(message)
            .items_checked(&items)
            .interact_opt()
            .map_err(map_dialoguer_err)?;
        chosen.ok_or(Error::Cancelled)
    }

    fn confirm(&self, message: &str, default: bool) -> Result<bool> {
        let answer = Confirm::new()
            .with_prompt(message)
            .default(default)
            .interact_opt()
            .map_err(map_dialoguer_err)?;
        answer.ok_or(Error::Cancelled)
    }
}

/// Scripted prompter for tests: answers are consumed in order, and a
/// `Cancel` entry simulates the user aborting.
#[cfg(test)]
pub struct ScriptedPrompter {
    answers: std::sync::Mutex<std::collections::VecDeque<ScriptedAnswer>>,
}

#[cfg(test)]
#[derive(Debug, Clone)]
pub enum ScriptedAnswer {
    Text(String),
    Index(usize),
    Indices(Vec<usize>),
    Bool(bool),
    Cancel,
}

#[cfg(test)]
impl ScriptedPrompter {
    pub fn new(answers: Vec<ScriptedAnswer>) -> Self {
        Self {
            answers: std::sync::Mutex::new(answers.into()),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    fn next(&self, expected: &str) -> Result<ScriptedAnswer> {
        let answer = self
            .answers
            .lock()
            .expect("prompter poisoned")
            .pop_front()
            .unwrap_or_else(|| panic!("no scripted answer left, expected {expected}"));
        if matches!(answer, ScriptedAnswer::Cancel) {
            return Err(Error::Cancelled);
        }
        Ok(answer)
    }

    pub fn remaining(&self) -> usize {
        self.answers.lock().expect("prompter poisoned").len()
    }
}

#[cfg(test)]
impl Prompter for ScriptedPrompter {
    fn text(&self, _message: &str, default: Option<&str>) -> Result<String> {
        match self.next("text")? {
            ScriptedAnswer::Text(answer) if answer.is_empty() => {
                Ok(default.unwrap_or_default().to_string())
            }
            ScriptedAnswer::Text(answer) => Ok(answer),
            other => panic!("expected text answer, got {other:?}"),
        }
    }

    fn select(&self, _message: &str, options: &[String], _default_index: usize) -> Result<usize> {
        match self.next("select")? {
            ScriptedAnswer::Index(i) => {
                assert!(i < options.len(), "scripted index out of range");
                Ok(i)
            }
            other => panic!("expected select answer, got {other:?}"),
        }
    }

    fn multi_select(
        &self,
        _message: &str,
        options: &[String],
        _checked: &[bool],
    ) -> Result<Vec<usize>> {
        match self.next("multi_select")? {
            ScriptedAnswer::Indices(indices) => {
                assert!(indices.iter().all(|i| *i < options.len()));
                Ok(indices)
            }
            other => panic!("expected multi_select answer, got {other:?}"),
        }
    }

    fn confirm(&self, _message: &str, _default: bool) -> Result<bool> {
        match self.next("confirm")? {
            ScriptedAnswer::Bool(b) => Ok(b),
            other => panic!("expected confirm answer, got {other:?}"),
        }
    }
}
