//! Tool invocation for post-create hooks.
//!
//! Hooks drive workspace tooling (`uv sync`) through the `ToolRunner`
//! trait, so tests can substitute canned outcomes instead of spawning
//! processes. Programs are spawned directly with an argv; no shell is
//! involved, so arguments never need quoting.

// Internal imports (std, crate)
use crate::core::error::{Error, Result};
use std::path::Path;
use std::process::Stdio;

// External imports (alphabetized)
use async_trait::async_trait;
use tokio::process::Command;

/// Runs an external tool and captures its outcome.
#[async_trait]
pub trait ToolRunner: Send + Sync {
    /// Run `program` with `args` in the working directory `cwd`.
    ///
    /// A non-zero exit is reported through [`ToolOutcome`], not as an
    /// error; `Err` means the program could not be spawned at all.
    async fn run(&self, program: &str, args: &[&str], cwd: &Path) -> Result<ToolOutcome>;
}

/// Captured output of one tool invocation.
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    /// Exit code, or `None` when the process died on a signal.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutcome {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    /// One-line failure description: the exit status plus the last
    /// non-empty stderr line.
    pub fn failure_summary(&self) -> String {
        let detail = self
            .stderr
            .lines()
            .rev()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or("no error output");
        match self.status {
            Some(code) => format!("exit status {code} ({detail})"),
            None => format!("killed by signal ({detail})"),
        }
    }
}

/// `ToolRunner` that spawns real processes via `tokio::process`.
#[derive(Default)]
pub struct ProcessToolRunner;

impl ProcessToolRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ToolRunner for ProcessToolRunner {
    async fn run(&self, program: &str, args: &[&str], cwd: &Path) -> Result<ToolOutcome> {
        // stdin is closed so a tool that asks a question fails fast
        // instead of hanging the hook
        let output = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                Error::hook(format!("could not run '{program}' (is it installed?): {e}"))
            })?;

        Ok(ToolOutcome {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Scripted `ToolRunner` keyed by the rendered command line.
#[cfg(test)]
pub struct StubToolRunner {
    outcomes: std::collections::HashMap<String, ToolOutcome>,
}

#[cfg(test)]
impl StubToolRunner {
    pub fn new() -> Self {
        Self {
            outcomes: std::collections::HashMap::new(),
        }
    }

    pub fn on(mut self, command_line: &str, status: i32, stdout: &str, stderr: &str) -> Self {
        self.outcomes.insert(
            command_line.to_string(),
            ToolOutcome {
                status: Some(status),
                stdout: stdout.to_string(),
                stderr: stderr.to_string(),
            },
        );
        self
    }
}

#[cfg(test)]
#[async_trait]
impl ToolRunner for StubToolRunner {
    async fn run(&self, program: &str, args: &[&str], _cwd: &Path) -> Result<ToolOutcome> {
        let command_line = std::iter::once(program)
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ");
        self.outcomes
            .get(&command_line)
            .cloned()
            .ok_or_else(|| Error::hook(format!("no scripted outcome for '{command_line}'")))
    }
}
