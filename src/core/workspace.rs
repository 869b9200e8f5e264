//! uv workspace manifest registration.
//!
//! Generated packages announce themselves in the workspace root
//! `pyproject.toml`: workspace member list, project dependency, a
//! `{ workspace = true }` uv source, and ruff's first-party import list.
//! Edits go through `toml_edit` so the rest of the manifest, including
//! comments and formatting, survives byte for byte. Every edit is
//! idempotent.

// Internal imports (std, crate)
use crate::core::error::{Error, Result};
use std::path::{Path, PathBuf};

// External imports (alphabetized)
use toml_edit::{Array, DocumentMut, InlineTable, Item, Table, Value as TomlValue};
use tracing::{debug, info};

/// Manifest file name probed during workspace-root discovery.
pub const WORKSPACE_MANIFEST: &str = "pyproject.toml";

/// One package's identity inside the workspace.
#[derive(Debug, Clone, PartialEq)]
pub struct PackageRegistration<'a> {
    /// Distribution name, e.g. `sales-core`
    pub name: &'a str,
    /// Importable module name, e.g. `sales_core`
    pub module: &'a str,
    /// Workspace-relative directory, e.g. `packages/sales-core`
    pub directory: &'a str,
}

/// Walk up from `start` to the nearest directory whose `pyproject.toml`
/// declares `[tool.uv.workspace]`.
pub fn find_workspace_root(start: &Path) -> Option<PathBuf> {
    let mut current = Some(start);
    while let Some(dir) = current {
        if declares_workspace(&dir.join(WORKSPACE_MANIFEST)) {
            return Some(dir.to_path_buf());
        }
        current = dir.parent();
    }
    None
}

fn declares_workspace(manifest: &Path) -> bool {
    if !manifest.is_file() {
        return false;
    }
    let Ok(content) = std::fs::read_to_string(manifest) else {
        return false;
    };
    match content.parse::<DocumentMut>() {
        Ok(doc) => get_nested(&doc, &["tool", "uv", "workspace"]).is_some(),
        Err(_) => false,
    }
}

/// Register a package in the workspace root manifest.
///
/// Four edits, each skipped when already satisfied:
/// - `tool.uv.workspace.members` gains the package directory, unless an
///   existing entry (or a trailing-`*` glob entry) already covers it
/// - `project.dependencies` gains the distribution name; skipped entirely
///   for virtual workspace roots without a `[project]` table
/// - `tool.uv.sources.<name>` is set to `{ workspace = true }`
/// - `tool.ruff.lint.isort.known-first-party` gains the module name, only
///   when the manifest already configures ruff
///
/// Returns `true` when the manifest was modified.
pub fn register_package(root: &Path, registration: &PackageRegistration) -> Result<bool> {
    let manifest_path = root.join(WORKSPACE_MANIFEST);
    let content = std::fs::read_to_string(&manifest_path).map_err(|e| {
        Error::workspace(format!("failed to read {}: {e}", manifest_path.display()))
    })?;
    let mut doc: DocumentMut = content.parse()?;

    let mut changed = false;
    changed |= add_workspace_member(&mut doc, registration.directory)?;
    changed |= add_project_dependency(&mut doc, registration.name)?;
    changed |= add_uv_source(&mut doc, registration.name)?;
    changed |= add_first_party_module(&mut doc, registration.module)?;

    if changed {
        std::fs::write(&manifest_path, doc.to_string()).map_err(|e| {
            Error::workspace(format!("failed to write {}: {e}", manifest_path.display()))
        })?;
        info!(
            "Registered package '{}' in {}",
            registration.name,
            manifest_path.display()
        );
    } else {
        debug!(
            "Package '{}' already registered in {}",
            registration.name,
            manifest_path.display()
        );
    }
    Ok(changed)
}

fn add_workspace_member(doc: &mut DocumentMut, directory: &str) -> Result<bool> {
    let workspace = nested_table(doc, &["tool", "uv", "workspace"])?;
    let members = array_at(workspace, "members")?;
    if members
        .iter()
        .filter_map(TomlValue::as_str)
        .any(|entry| member_covers(entry, directory))
    {
        return Ok(false);
    }
    members.push(directory);
    Ok(true)
}

/// True when a members entry names the directory, or is a glob like
/// `packages/*` whose single wildcard component covers it.
fn member_covers(entry: &str, directory: &str) -> bool {
    if entry == directory {
        return true;
    }
    if let Some(prefix) = entry.strip_suffix("/*") {
        return directory
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_prefix('/'))
            .is_some_and(|leaf| !leaf.is_empty() && !leaf.contains('/'));
    }
    false
}

fn add_project_dependency(doc: &mut DocumentMut, name: &str) -> Result<bool> {
    if get_nested(doc, &["project"]).is_none() {
        // Virtual workspace roots carry no [project] table
        debug!("No [project] table; skipping dependency entry for '{name}'");
        return Ok(false);
    }
    let project = nested_table(doc, &["project"])?;
    let dependencies = array_at(project, "dependencies")?;
    let wanted = normalize_distribution(name);
    if dependencies
        .iter()
        .filter_map(TomlValue::as_str)
        .any(|entry| normalize_distribution(requirement_name(entry)) == wanted)
    {
        return Ok(false);
    }
    dependencies.push(name);
    Ok(true)
}

/// Leading distribution name of a PEP 508 requirement string.
fn requirement_name(requirement: &str) -> &str {
    let trimmed = requirement.trim_start();
    let end = trimmed
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.'))
        .unwrap_or(trimmed.len());
    &trimmed[..end]
}

/// PEP 503 comparison form: lowercase, underscores and dots collapse to
/// hyphens.
fn normalize_distribution(name: &str) -> String {
    name.to_ascii_lowercase().replace(['_', '.'], "-")
}

fn add_uv_source(doc: &mut DocumentMut, name: &str) -> Result<bool> {
    let sources = nested_table(doc, &["tool", "uv", "sources"])?;
    if sources.contains_key(name) {
        return Ok(false);
    }
    let mut source = InlineTable::new();
    source.insert("workspace", TomlValue::from(true));
    sources.insert(name, Item::Value(TomlValue::InlineTable(source)));
    Ok(true)
}

fn add_first_party_module(doc: &mut DocumentMut, module: &str) -> Result<bool> {
    if get_nested(doc, &["tool", "ruff"]).is_none() {
        // Leave manifests that don't configure ruff alone
        return Ok(false);
    }
    let isort = nested_table(doc, &["tool", "ruff", "lint", "isort"])?;
    let first_party = array_at(isort, "known-first-party")?;
    if first_party
        .iter()
        .filter_map(TomlValue::as_str)
        .any(|entry| entry == module)
    {
        return Ok(false);
    }
    first_party.push(module);
    Ok(true)
}

fn get_nested<'a>(doc: &'a DocumentMut, path: &[&str]) -> Option<&'a Item> {
    let mut item: &Item = doc.as_item();
    for key in path {
        item = item.as_table_like()?.get(key)?;
    }
    Some(item)
}

/// Descend to a table, creating implicit intermediates as needed. Fails if
/// a path segment is occupied by a non-table value.
fn nested_table<'a>(doc: &'a mut DocumentMut, path: &[&str]) -> Result<&'a mut Table> {
    let mut table: &mut Table = doc.as_table_mut();
    for key in path {
        let item = table.entry(key).or_insert_with(|| {
            let mut intermediate = Table::new();
            intermediate.set_implicit(true);
            Item::Table(intermediate)
        });
        table = item.as_table_mut().ok_or_else(|| {
            Error::workspace(format!("'{key}' in pyproject.toml is not a table"))
        })?;
    }
    Ok(table)
}

fn array_at<'a>(table: &'a mut Table, key: &str) -> Result<&'a mut Array> {
    let item = table
        .entry(key)
        .or_insert(Item::Value(TomlValue::Array(Array::new())));
    item.as_array_mut()
        .ok_or_else(|| Error::workspace(format!("'{key}' in pyproject.toml is not an array")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const MANIFEST: &str = r#"# Workspace root manifest
[project]
name = "demo"
version = "0.1.0"
dependencies = [
    "pandas>=2.0",
]

[tool.uv.workspace]
members = ["packages/existing"]

[tool.uv.sources]
existing = { workspace = true }

# Lint configuration
[tool.ruff]
line-length = 100

[tool.ruff.lint.isort]
known-first-party = ["existing"]
"#;

    fn registration() -> PackageRegistration<'static> {
        PackageRegistration {
            name: "sales-core",
            module: "sales_core",
            directory: "packages/sales-core",
        }
    }

    fn write_manifest(dir: &Path, content: &str) {
        std::fs::write(dir.join(WORKSPACE_MANIFEST), content).unwrap();
    }

    #[test]
    fn test_register_adds_all_entries() {
        let dir = tempdir().unwrap();
        write_manifest(dir.path(), MANIFEST);

        let changed = register_package(dir.path(), &registration()).unwrap();
        assert!(changed);

        let content = std::fs::read_to_string(dir.path().join(WORKSPACE_MANIFEST)).unwrap();
        assert!(content.contains("\"packages/sales-core\""));
        assert!(content.contains("\"sales-core\""));
        assert!(content.contains("sales-core = { workspace = true }"));
        assert!(content.contains("\"sales_core\""));
        // Comments and untouched entries survive
        assert!(content.contains("# Workspace root manifest"));
        assert!(content.contains("# Lint configuration"));
        assert!(content.contains("existing = { workspace = true }"));
        assert!(content.contains("\"pandas>=2.0\""));

        // Still valid TOML with the expected structure
        let doc: DocumentMut = content.parse().unwrap();
        let members = get_nested(&doc, &["tool", "uv", "workspace"])
            .unwrap()
            .as_table_like()
            .unwrap()
            .get("members")
            .unwrap()
            .as_array()
            .unwrap();
        assert_eq!(members.len(), 2);
    }

    #[test]
    fn test_register_is_idempotent() {
        let dir = tempdir().unwrap();
        write_manifest(dir.path(), MANIFEST);

        assert!(register_package(dir.path(), &registration()).unwrap());
        let after_first = std::fs::read_to_string(dir.path().join(WORKSPACE_MANIFEST)).unwrap();

        assert!(!register_package(dir.path(), &registration()).unwrap());
        let after_second = std::fs::read_to_string(dir.path().join(WORKSPACE_MANIFEST)).unwrap();
        assert_eq!(after_first, after_second);
    }

    #[test]
    fn test_glob_member_counts_as_listed() {
        let dir = tempdir().unwrap();
        write_manifest(
            dir.path(),
            r#"[project]
name = "demo"
dependencies = []

[tool.uv.workspace]
members = ["packages/*"]
"#,
        );

        let changed = register_package(dir.path(), &registration()).unwrap();
        assert!(changed, "dependency and source entries still added");

        let content = std::fs::read_to_string(dir.path().join(WORKSPACE_MANIFEST)).unwrap();
        assert!(!content.contains("packages/sales-core\""));
        assert!(content.contains("sales-core = { workspace = true }"));
    }

    #[test]
    fn test_member_covers_glob_semantics() {
        assert!(member_covers("packages/sales-core", "packages/sales-core"));
        assert!(member_covers("packages/*", "packages/sales-core"));
        assert!(!member_covers("packages/*", "packages/nested/deep"));
        assert!(!member_covers("packages/*", "packages/"));
        assert!(!member_covers("libs/*", "packages/sales-core"));
    }

    #[test]
    fn test_dependency_name_normalization() {
        let dir = tempdir().unwrap();
        write_manifest(
            dir.path(),
            r#"[project]
name = "demo"
dependencies = ["sales_core>=0.1"]

[tool.uv.workspace]
members = []
"#,
        );

        register_package(dir.path(), &registration()).unwrap();
        let content = std::fs::read_to_string(dir.path().join(WORKSPACE_MANIFEST)).unwrap();
        // The underscore spelling already satisfies the dependency
        assert!(content.contains("sales_core>=0.1"));
        let doc: DocumentMut = content.parse().unwrap();
        let dependencies = get_nested(&doc, &["project"])
            .unwrap()
            .as_table_like()
            .unwrap()
            .get("dependencies")
            .unwrap()
            .as_array()
            .unwrap();
        assert_eq!(dependencies.len(), 1);
    }

    #[test]
    fn test_virtual_root_without_project_table() {
        let dir = tempdir().unwrap();
        write_manifest(
            dir.path(),
            "[tool.uv.workspace]\nmembers = []\n",
        );

        assert!(register_package(dir.path(), &registration()).unwrap());
        let content = std::fs::read_to_string(dir.path().join(WORKSPACE_MANIFEST)).unwrap();
        assert!(content.contains("\"packages/sales-core\""));
        assert!(!content.contains("[project]"));
        assert!(!content.contains("[tool.ruff]"));
    }

    #[test]
    fn test_find_workspace_root_from_nested_dir() {
        let dir = tempdir().unwrap();
        write_manifest(dir.path(), MANIFEST);
        let nested = dir.path().join("packages/existing/src");
        std::fs::create_dir_all(&nested).unwrap();
        // A member manifest without a workspace table must not win
        std::fs::write(
            dir.path().join("packages/existing").join(WORKSPACE_MANIFEST),
            "[project]\nname = \"existing\"\n",
        )
        .unwrap();

        assert_eq!(
            find_workspace_root(&nested),
            Some(dir.path().to_path_buf())
        );
    }

    #[test]
    fn test_find_workspace_root_none() {
        let dir = tempdir().unwrap();
        assert_eq!(find_workspace_root(dir.path()), None);
    }

    #[test]
    fn test_requirement_name_extraction() {
        assert_eq!(requirement_name("pandas>=2.0"), "pandas");
        assert_eq!(requirement_name("scikit-learn"), "scikit-learn");
        assert_eq!(requirement_name("uvicorn[standard]>=0.30"), "uvicorn");
        assert_eq!(requirement_name("  torch == 2.3"), "torch");
    }

    #[test]
    fn test_register_rejects_invalid_manifest() {
        let dir = tempdir().unwrap();
        write_manifest(dir.path(), "not = [valid\n");
        assert!(register_package(dir.path(), &registration()).is_err());
    }
}
