//! Error handling for the dsforge scaffolding library.
//!
//! This module defines the main error type `Error` used throughout the
//! library, along with a convenient `Result` type alias. Variants map to
//! the failure surfaces of a scaffolding run: template loading, rendering,
//! user input, workspace manifest edits, assist calls and hooks.
//!
//! # Examples
//!
//! ```
//! use dsforge::core::error::{Error, Result};
//!
//! fn might_fail() -> Result<()> {
//!     // Operations that might fail...
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// Result type for dsforge scaffolding operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for dsforge scaffolding operations
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml_edit::TomlError),

    /// Template error
    #[error("Template error: {0}")]
    Template(String),

    /// Template engine error
    #[error("Template engine error: {0}")]
    Tera(#[from] tera::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid user input (bad key=value pair, malformed params file, ...)
    #[error("Input error: {0}")]
    Input(String),

    /// Workspace manifest error
    #[error("Workspace error: {0}")]
    Workspace(String),

    /// Assist service error
    #[error("Assist error: {0}")]
    Assist(String),

    /// Post-create hook error
    #[error("Hook error: {0}")]
    Hook(String),

    /// The user aborted an interactive prompt
    #[error("operation cancelled by user")]
    Cancelled,
}

impl Error {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new template error
    pub fn template<S: Into<String>>(msg: S) -> Self {
        Self::Template(msg.into())
    }

    /// Create a new input error
    pub fn input<S: Into<String>>(msg: S) -> Self {
        Self::Input(msg.into())
    }

    /// Create a new workspace error
    pub fn workspace<S: Into<String>>(msg: S) -> Self {
        Self::Workspace(msg.into())
    }

    /// Create a new assist error
    pub fn assist<S: Into<String>>(msg: S) -> Self {
        Self::Assist(msg.into())
    }

    /// Create a new hook error
    pub fn hook<S: Into<String>>(msg: S) -> Self {
        Self::Hook(msg.into())
    }

    /// True when the error represents a deliberate user abort
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Self::Config(s.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Self::Config(s)
    }
}
