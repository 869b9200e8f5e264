//! dsforge Core Library
//!
//! This library provides the core functionality for scaffolding Python
//! data-science workspaces from declarative templates.

pub mod behavior;
pub mod context;
pub mod descriptor;
pub mod embedded;
pub mod error;
pub mod hooks;
pub mod merge;
pub mod output;
pub mod prompt;
pub mod registry;
pub mod renderer;
pub mod resolver;
pub mod shell;
pub mod utils;
pub mod value;
pub mod workspace;

pub use error::Error;
