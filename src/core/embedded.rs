//! Embedded built-in templates and templates-root resolution.
//!
//! The builtin template tree under `templates/` is compiled into the binary
//! with `rust-embed`, so dsforge works immediately after `cargo install`
//! without separate template files. Rendering walks a real directory tree,
//! so the embedded copy is synced to a per-user cache directory before use.
//!
//! The templates root is resolved in order: the `--template-dir` flag, the
//! `DSFORGE_TEMPLATE_DIR` environment variable, a `templates/` directory in
//! the current directory, and finally the cache synced from the embedded
//! copy.

// Internal imports (std, crate)
use crate::core::error::{Error, Result};
use std::path::{Path, PathBuf};

// External imports (alphabetized)
use rust_embed::RustEmbed;
use tracing::{debug, info, warn};

/// Container for all templates embedded at compile time.
#[derive(RustEmbed)]
#[folder = "templates/"]
pub struct EmbeddedTemplates;

/// Environment variable overriding the templates root.
pub const TEMPLATE_DIR_ENV: &str = "DSFORGE_TEMPLATE_DIR";

/// Trait for reading the template-dir override, allowing dependency
/// injection for testing
pub trait TemplateLocationReader {
    fn template_dir(&self) -> Option<String>;
}

/// Production implementation that reads from the environment
pub struct EnvTemplateLocation;

impl TemplateLocationReader for EnvTemplateLocation {
    fn template_dir(&self) -> Option<String> {
        std::env::var(TEMPLATE_DIR_ENV).ok()
    }
}

/// Mock implementation for testing with controlled values
#[cfg(test)]
pub struct MockTemplateLocation(Option<String>);

#[cfg(test)]
impl TemplateLocationReader for MockTemplateLocation {
    fn template_dir(&self) -> Option<String> {
        self.0.clone()
    }
}

/// Write every embedded template file under `output_dir`, preserving the
/// tree structure. Existing files are overwritten so the export tracks the
/// installed binary. Returns the number of files written.
pub fn export_embedded_templates(output_dir: &Path) -> Result<usize> {
    let mut count = 0;
    for file_path in EmbeddedTemplates::iter() {
        let path_str = file_path.as_ref();
        let Some(embedded) = EmbeddedTemplates::get(path_str) else {
            continue;
        };
        let target = output_dir.join(path_str);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&target, embedded.data.as_ref())?;
        debug!("Exported embedded template file: {}", target.display());
        count += 1;
    }
    info!(
        "Exported {} embedded template file(s) to {}",
        count,
        output_dir.display()
    );
    Ok(count)
}

/// The per-user cache directory the embedded templates are synced into.
pub fn templates_cache_root() -> Result<PathBuf> {
    dirs::cache_dir()
        .map(|dir| dir.join("dsforge").join("templates"))
        .ok_or_else(|| Error::config("could not determine a cache directory for builtin templates"))
}

/// Resolve the templates root for this invocation.
pub fn resolve_templates_root(custom_dir: Option<&Path>) -> Result<PathBuf> {
    resolve_templates_root_with(&EnvTemplateLocation, custom_dir)
}

fn resolve_templates_root_with(
    reader: &dyn TemplateLocationReader,
    custom_dir: Option<&Path>,
) -> Result<PathBuf> {
    // Explicit flag wins; a missing directory there is the user's mistake
    if let Some(dir) = custom_dir {
        if !dir.is_dir() {
            return Err(Error::config(format!(
                "template directory not found: {}",
                dir.display()
            )));
        }
        debug!("Using custom template directory: {}", dir.display());
        return Ok(dir.to_path_buf());
    }

    if let Some(dir) = reader.template_dir() {
        let path = PathBuf::from(dir);
        if path.is_dir() {
            debug!(
                "Using {} template directory: {}",
                TEMPLATE_DIR_ENV,
                path.display()
            );
            return Ok(path);
        }
        warn!(
            "{} points to a missing directory, ignoring: {}",
            TEMPLATE_DIR_ENV,
            path.display()
        );
    }

    if let Ok(current_dir) = std::env::current_dir() {
        let local = current_dir.join("templates");
        if local.is_dir() {
            debug!("Using local template directory: {}", local.display());
            return Ok(local);
        }
    }

    let cache = templates_cache_root()?;
    export_embedded_templates(&cache)?;
    debug!("Using embedded templates synced to: {}", cache.display());
    Ok(cache)
}
