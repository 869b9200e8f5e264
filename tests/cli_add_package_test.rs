//! Integration tests for the add-package command

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn write_package_template(root: &Path) {
    let pkg = root.join("pkg_fixture");
    fs::create_dir_all(pkg.join("src/{{ package_module }}")).unwrap();
    fs::write(
        pkg.join("template.yaml"),
        r#"
name: Fixture Package
description: reusable component
group: package
behavior: package
questions:
  - name: package_name
    message: "Package name"
    type: text
    default: widget
"#,
    )
    .unwrap();
    fs::write(
        pkg.join("pyproject.toml.tera"),
        "[project]\nname = \"{{ package_slug }}\"\nversion = \"0.1.0\"\n",
    )
    .unwrap();
    fs::write(
        pkg.join("src/{{ package_module }}/__init__.py.tera"),
        "\"\"\"{{ package_slug }}\"\"\"\n",
    )
    .unwrap();
}

fn write_workspace(root: &Path) {
    fs::write(
        root.join("pyproject.toml"),
        r#"# Fixture workspace manifest
[project]
name = "fixture-workspace"
version = "0.1.0"
requires-python = ">=3.12"
dependencies = []

[tool.uv.workspace]
members = []

[tool.ruff]
line-length = 100

[tool.ruff.lint.isort]
known-first-party = []
"#,
    )
    .unwrap();
}

#[test]
fn test_add_package_generates_and_registers() {
    let templates = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();
    write_package_template(templates.path());
    write_workspace(workspace.path());

    let mut cmd = Command::cargo_bin("dsforge").unwrap();
    cmd.arg("add-package")
        .arg("pkg_fixture")
        .arg("--yes")
        .arg("--name")
        .arg("data-access")
        .arg("--workspace-root")
        .arg(workspace.path())
        .arg("--template-dir")
        .arg(templates.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Package 'data-access' added"));

    let package_dir = workspace.path().join("packages/data-access");
    let manifest = fs::read_to_string(package_dir.join("pyproject.toml")).unwrap();
    assert!(manifest.contains("name = \"data-access\""));
    assert!(package_dir.join("src/data_access/__init__.py").exists());

    let root_manifest = fs::read_to_string(workspace.path().join("pyproject.toml")).unwrap();
    assert!(root_manifest.starts_with("# Fixture workspace manifest"));
    assert!(root_manifest.contains("\"packages/data-access\""));
    assert!(root_manifest.contains("\"data-access\""));
    assert!(root_manifest.contains("data-access = { workspace = true }"));
    assert!(root_manifest.contains("\"data_access\""));
}

#[test]
fn test_add_package_existing_directory_fails() {
    let templates = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();
    write_package_template(templates.path());
    write_workspace(workspace.path());
    fs::create_dir_all(workspace.path().join("packages/widget")).unwrap();
    fs::write(
        workspace.path().join("packages/widget/pyproject.toml"),
        "[project]\nname = \"widget\"\n",
    )
    .unwrap();

    // The default package_name collides with the existing directory
    let mut cmd = Command::cargo_bin("dsforge").unwrap();
    cmd.arg("add-package")
        .arg("pkg_fixture")
        .arg("--yes")
        .arg("--workspace-root")
        .arg(workspace.path())
        .arg("--template-dir")
        .arg(templates.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn test_add_package_outside_workspace_fails() {
    let templates = TempDir::new().unwrap();
    let elsewhere = TempDir::new().unwrap();
    write_package_template(templates.path());

    let mut cmd = Command::cargo_bin("dsforge").unwrap();
    cmd.arg("add-package")
        .arg("pkg_fixture")
        .arg("--yes")
        .arg("--template-dir")
        .arg(templates.path())
        .current_dir(elsewhere.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("[tool.uv.workspace]"));
}

#[test]
fn test_add_package_is_idempotent_in_manifest() {
    let templates = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();
    write_package_template(templates.path());
    write_workspace(workspace.path());

    let run = |name: &str| {
        let mut cmd = Command::cargo_bin("dsforge").unwrap();
        cmd.arg("add-package")
            .arg("pkg_fixture")
            .arg("--yes")
            .arg("--name")
            .arg(name)
            .arg("--workspace-root")
            .arg(workspace.path())
            .arg("--template-dir")
            .arg(templates.path())
            .assert()
            .success();
    };
    run("first-pkg");
    run("second-pkg");

    let root_manifest = fs::read_to_string(workspace.path().join("pyproject.toml")).unwrap();
    assert!(root_manifest.contains("\"packages/first-pkg\""));
    assert!(root_manifest.contains("\"packages/second-pkg\""));
    // Each member is listed once
    assert_eq!(root_manifest.matches("packages/first-pkg").count(), 1);
}
