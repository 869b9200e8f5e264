//! AI-assisted parameter suggestion.

pub mod client;

pub use client::{AssistClient, fallback_packages};
