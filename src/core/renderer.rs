//! Project materialization.
//!
//! Walks a template tree, decides per-path inclusion (conditional
//! directories first, then the behavior's file filter), renders templated
//! path segments and `.tera` file contents against the context, copies
//! everything else byte-for-byte, and deep-merges docker-compose files on
//! collision instead of overwriting them.

// Internal imports (std, crate)
use crate::core::behavior::TemplateBehavior;
use crate::core::context::ScaffoldContext;
use crate::core::descriptor::{ConditionalDir, DESCRIPTOR_FILE, TemplateDescriptor};
use crate::core::error::{Error, Result};
use crate::core::merge::{is_compose_filename, merge_compose_documents};
use crate::core::output::OutputSink;
use std::io;
use std::path::{Path, PathBuf};

// External imports (alphabetized)
use tera::Tera;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Extension marking a file for rendering; stripped from the target name.
pub const TEMPLATE_EXTENSION: &str = ".tera";

/// Directories the completion report does not descend into.
const REPORT_SKIP_DIRS: [&str; 4] = [".git", "__pycache__", "node_modules", ".venv"];
const REPORT_MAX_DEPTH: usize = 3;

/// Counters for one materialization run.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MaterializeSummary {
    pub rendered: usize,
    pub copied: usize,
    pub merged: usize,
    pub excluded: usize,
}

/// Renders one descriptor's template tree into an output directory.
pub struct ProjectRenderer<'a> {
    descriptor: &'a TemplateDescriptor,
    behavior: &'a dyn TemplateBehavior,
}

impl<'a> ProjectRenderer<'a> {
    pub fn new(descriptor: &'a TemplateDescriptor, behavior: &'a dyn TemplateBehavior) -> Self {
        Self {
            descriptor,
            behavior,
        }
    }

    /// Materialize the template into `output_root`.
    ///
    /// The output directory is created if absent; the caller is responsible
    /// for confirming overwrites beforehand. Failures identify the offending
    /// path. There is no rollback: a failed run leaves the files written so
    /// far.
    pub fn materialize(
        &self,
        output_root: &Path,
        context: &ScaffoldContext,
        sink: &dyn OutputSink,
    ) -> Result<MaterializeSummary> {
        let template_root = &self.descriptor.root;
        info!(
            "Materializing template '{}' into {}",
            self.descriptor.location,
            output_root.display()
        );
        std::fs::create_dir_all(output_root)
            .map_err(|e| io_with_path(e, "failed to create output directory", output_root))?;

        let tera_context = context.to_tera();
        let conditional = self.behavior.conditional_directories(self.descriptor);
        let mut summary = MaterializeSummary::default();

        let mut walker = WalkDir::new(template_root).min_depth(1).into_iter();
        while let Some(entry) = walker.next() {
            let entry = entry.map_err(io::Error::from)?;
            let relative = entry
                .path()
                .strip_prefix(template_root)
                .map_err(|_| {
                    Error::template(format!(
                        "walked path escapes template root: {}",
                        entry.path().display()
                    ))
                })?
                .to_path_buf();

            // The descriptor manifest itself is never materialized
            if relative == Path::new(DESCRIPTOR_FILE) {
                continue;
            }

            if !self.should_include(&relative, &conditional, context) {
                summary.excluded += 1;
                if entry.file_type().is_dir() {
                    debug!("Excluding directory subtree: {}", relative.display());
                    walker.skip_current_dir();
                } else {
                    debug!("Excluding file: {}", relative.display());
                }
                continue;
            }

            let target = output_root.join(self.render_relative_path(&relative, &tera_context)?);
            if entry.file_type().is_dir() {
                std::fs::create_dir_all(&target)
                    .map_err(|e| io_with_path(e, "failed to create directory", &target))?;
            } else {
                self.materialize_file(
                    entry.path(),
                    &relative,
                    &target,
                    &tera_context,
                    &mut summary,
                )?;
            }
        }

        self.report(output_root, &tera_context, sink, &summary);
        Ok(summary)
    }

    /// Conditional-directory rules veto first, then the behavior's filter.
    fn should_include(
        &self,
        relative: &Path,
        conditional: &[ConditionalDir],
        context: &ScaffoldContext,
    ) -> bool {
        for rule in conditional {
            if relative.starts_with(&rule.prefix) {
                let matches = context.get(&rule.key) == Some(&rule.equals);
                if !matches {
                    debug!(
                        "Conditional directory '{}' off: {} != {}",
                        rule.prefix, rule.key, rule.equals
                    );
                    return false;
                }
            }
        }
        self.behavior.should_include_file(relative, context)
    }

    /// Render every path segment that carries template syntax.
    fn render_relative_path(&self, relative: &Path, context: &tera::Context) -> Result<PathBuf> {
        let mut rendered_path = PathBuf::new();
        for component in relative.components() {
            let segment = component.as_os_str().to_str().ok_or_else(|| {
                Error::template(format!(
                    "template path is not valid UTF-8: {}",
                    relative.display()
                ))
            })?;
            if segment.contains("{{") && segment.contains("}}") {
                let rendered = Tera::one_off(segment, context, false).map_err(|e| {
                    Error::template(format!(
                        "failed to render path segment '{segment}': {}",
                        flatten_tera_error(&e)
                    ))
                })?;
                let rendered = rendered.trim();
                if rendered.is_empty() {
                    return Err(Error::template(format!(
                        "path segment '{segment}' rendered to an empty name"
                    )));
                }
                rendered_path.push(rendered);
            } else {
                rendered_path.push(segment);
            }
        }
        Ok(rendered_path)
    }

    fn materialize_file(
        &self,
        source: &Path,
        relative: &Path,
        target: &Path,
        context: &tera::Context,
        summary: &mut MaterializeSummary,
    ) -> Result<()> {
        // Parents exist regardless of enumeration order
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| io_with_path(e, "failed to create directory", parent))?;
        }

        let file_name = target
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
            .to_string();

        if let Some(final_name) = file_name.strip_suffix(TEMPLATE_EXTENSION) {
            let final_target = target.with_file_name(final_name);
            let raw = std::fs::read_to_string(source)
                .map_err(|e| io_with_path(e, "failed to read template file", source))?;
            let rendered = render_content(relative, &raw, context)?;

            if final_target.exists() && is_compose_filename(final_name) {
                let existing = std::fs::read_to_string(&final_target)
                    .map_err(|e| io_with_path(e, "failed to read existing file", &final_target))?;
                match merge_compose_documents(&existing, &rendered) {
                    Ok(merged) => {
                        write_file(&final_target, merged.as_bytes())?;
                        summary.merged += 1;
                        info!("Merged compose file: {}", final_target.display());
                        return Ok(());
                    }
                    Err(e) => {
                        warn!(
                            "Could not merge {}: {e}; overwriting with newly rendered content",
                            final_target.display()
                        );
                    }
                }
            }
            write_file(&final_target, rendered.as_bytes())?;
            summary.rendered += 1;
            debug!("Rendered {} -> {}", relative.display(), final_target.display());
        } else {
            std::fs::copy(source, target)
                .map_err(|e| io_with_path(e, "failed to copy file", source))?;
            summary.copied += 1;
            debug!("Copied {} -> {}", relative.display(), target.display());
        }
        Ok(())
    }

    /// Welcome message, completion line, and a depth-limited tree listing.
    fn report(
        &self,
        output_root: &Path,
        context: &tera::Context,
        sink: &dyn OutputSink,
        summary: &MaterializeSummary,
    ) {
        if let Some(welcome) = &self.descriptor.welcome_message {
            let message = if welcome.contains("{{") {
                Tera::one_off(welcome, context, false).unwrap_or_else(|e| {
                    warn!("Could not render welcome message: {e}");
                    welcome.clone()
                })
            } else {
                welcome.clone()
            };
            sink.blank();
            sink.line(&message);
        }

        sink.blank();
        sink.line(&format!("Project generated at: {}", output_root.display()));
        sink.line(&format!(
            "{} file(s) rendered, {} copied, {} merged",
            summary.rendered, summary.copied, summary.merged
        ));
        sink.blank();
        sink.line("Generated files:");
        print_tree(output_root, sink);
    }
}

fn render_content(relative: &Path, raw: &str, context: &tera::Context) -> Result<String> {
    let name = relative.to_string_lossy();
    let mut tera = Tera::default();
    tera.add_raw_template(&name, raw)
        .map_err(|e| {
            Error::template(format!(
                "invalid template syntax in {}: {}",
                relative.display(),
                flatten_tera_error(&e)
            ))
        })?;
    tera.render(&name, context).map_err(|e| {
        Error::template(format!(
            "failed to render {}: {}",
            relative.display(),
            flatten_tera_error(&e)
        ))
    })
}

/// Tera buries the useful part ("variable not found...") in the source
/// chain; flatten it for user-facing messages.
fn flatten_tera_error(error: &tera::Error) -> String {
    let mut message = error.to_string();
    let mut source = std::error::Error::source(error);
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    message
}

fn write_file(path: &Path, content: &[u8]) -> Result<()> {
    std::fs::write(path, content).map_err(|e| io_with_path(e, "failed to write file", path))
}

fn io_with_path(error: io::Error, action: &str, path: &Path) -> Error {
    Error::Io(io::Error::new(
        error.kind(),
        format!("{action} {}: {error}", path.display()),
    ))
}

fn print_tree(root: &Path, sink: &dyn OutputSink) {
    let walker = WalkDir::new(root)
        .min_depth(1)
        .max_depth(REPORT_MAX_DEPTH)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry
                .file_name()
                .to_str()
                .map(|name| !REPORT_SKIP_DIRS.contains(&name))
                .unwrap_or(true)
        });
    for entry in walker.flatten() {
        let indent = "  ".repeat(entry.depth().saturating_sub(1));
        let name = entry.file_name().to_string_lossy();
        let suffix = if entry.file_type().is_dir() { "/" } else { "" };
        sink.line(&format!("{indent}{name}{suffix}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::behavior::{DefaultBehavior, PackageBehavior};
    use crate::core::output::BufferSink;
    use crate::core::value::Value;
    use tempfile::tempdir;

    const DESCRIPTOR: &str = r#"
name: Demo
description: renderer fixture
group: monorepo
welcome_message: "Welcome to {{ project_name }}!"
questions:
  - name: project_name
    message: "Project name"
    type: text
    default: demo
  - name: use_docker
    message: "Include Docker?"
    type: confirm
    default: false
conditional_dirs:
  - prefix: docker
    key: use_docker
    equals: true
"#;

    fn write(path: &Path, content: &str) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }

    fn fixture_template(root: &Path) -> TemplateDescriptor {
        let template_dir = root.join("demo_template");
        write(&template_dir.join(DESCRIPTOR_FILE), DESCRIPTOR);
        write(
            &template_dir.join("README.md.tera"),
            "# {{ project_name }}\n\nGenerated project.\n",
        );
        write(&template_dir.join("data/raw/.gitkeep"), "");
        write(
            &template_dir.join("docker/docker-compose.yml.tera"),
            "services:\n  api:\n    image: {{ project_name }}:latest\n",
        );
        write(&template_dir.join("docker/Dockerfile"), "FROM python:3.12\n");
        std::fs::create_dir_all(template_dir.join("assets")).unwrap();
        std::fs::write(template_dir.join("assets/logo.bin"), [0u8, 159, 146, 150]).unwrap();
        let manifest = serde_yaml::from_str(DESCRIPTOR).unwrap();
        TemplateDescriptor::from_manifest("demo_template", template_dir, manifest).unwrap()
    }

    fn context(project: &str, docker: bool) -> ScaffoldContext {
        let mut context = ScaffoldContext::new();
        context.insert("project_name", project);
        context.insert("use_docker", docker);
        context
    }

    #[test]
    fn test_materialize_renders_and_strips_marker() {
        let dir = tempdir().unwrap();
        let descriptor = fixture_template(dir.path());
        let output = dir.path().join("out");
        let sink = BufferSink::new();

        let summary = ProjectRenderer::new(&descriptor, &DefaultBehavior)
            .materialize(&output, &context("demo", true), &sink)
            .unwrap();

        let readme = std::fs::read_to_string(output.join("README.md")).unwrap();
        assert_eq!(readme, "# demo\n\nGenerated project.\n");
        assert!(!output.join("README.md.tera").exists());
        // Rendered output has no leftover placeholders for supplied keys
        assert!(!readme.contains("{{"));
        assert!(summary.rendered >= 2);
    }

    #[test]
    fn test_descriptor_file_never_materialized() {
        let dir = tempdir().unwrap();
        let descriptor = fixture_template(dir.path());
        let output = dir.path().join("out");
        ProjectRenderer::new(&descriptor, &DefaultBehavior)
            .materialize(&output, &context("demo", true), &BufferSink::new())
            .unwrap();
        assert!(!output.join(DESCRIPTOR_FILE).exists());
    }

    #[test]
    fn test_conditional_directory_gated_off_produces_nothing() {
        let dir = tempdir().unwrap();
        let descriptor = fixture_template(dir.path());
        let output = dir.path().join("out");
        let summary = ProjectRenderer::new(&descriptor, &DefaultBehavior)
            .materialize(&output, &context("demo", false), &BufferSink::new())
            .unwrap();

        assert!(!output.join("docker").exists());
        assert!(summary.excluded >= 1);
        // The rest of the tree is unaffected
        assert!(output.join("README.md").exists());
        assert!(output.join("data/raw/.gitkeep").exists());
    }

    #[test]
    fn test_conditional_directory_gated_on_is_materialized() {
        let dir = tempdir().unwrap();
        let descriptor = fixture_template(dir.path());
        let output = dir.path().join("out");
        ProjectRenderer::new(&descriptor, &DefaultBehavior)
            .materialize(&output, &context("demo", true), &BufferSink::new())
            .unwrap();

        assert!(output.join("docker/docker-compose.yml").exists());
        assert!(output.join("docker/Dockerfile").exists());
    }

    #[test]
    fn test_copy_only_files_are_byte_identical() {
        let dir = tempdir().unwrap();
        let descriptor = fixture_template(dir.path());
        let output = dir.path().join("out");
        ProjectRenderer::new(&descriptor, &DefaultBehavior)
            .materialize(&output, &context("demo", true), &BufferSink::new())
            .unwrap();

        let copied = std::fs::read(output.join("assets/logo.bin")).unwrap();
        assert_eq!(copied, vec![0u8, 159, 146, 150]);
        let dockerfile = std::fs::read_to_string(output.join("docker/Dockerfile")).unwrap();
        assert_eq!(dockerfile, "FROM python:3.12\n");
    }

    #[test]
    fn test_templated_path_segments_are_rendered() {
        let dir = tempdir().unwrap();
        let template_dir = dir.path().join("pkg_demo");
        write(
            &template_dir.join(DESCRIPTOR_FILE),
            "name: Pkg\ndescription: fixture\ngroup: package\nbehavior: package\n",
        );
        write(
            &template_dir.join("src/{{ package_module }}/__init__.py.tera"),
            "\"\"\"{{ package_name }}\"\"\"\n",
        );
        let manifest = serde_yaml::from_str(
            "name: Pkg\ndescription: fixture\ngroup: package\nbehavior: package\n",
        )
        .unwrap();
        let descriptor =
            TemplateDescriptor::from_manifest("pkg_demo", template_dir, manifest).unwrap();

        let mut context = ScaffoldContext::new();
        context.insert("package_name", "sales-core");
        context.insert("package_module", "sales_core");
        let output = dir.path().join("out");
        ProjectRenderer::new(&descriptor, &PackageBehavior)
            .materialize(&output, &context, &BufferSink::new())
            .unwrap();

        let init = output.join("src/sales_core/__init__.py");
        assert!(init.exists());
        assert_eq!(
            std::fs::read_to_string(init).unwrap(),
            "\"\"\"sales-core\"\"\"\n"
        );
    }

    #[test]
    fn test_compose_collision_is_merged() {
        let dir = tempdir().unwrap();
        let descriptor = fixture_template(dir.path());
        let output = dir.path().join("out");
        write(
            &output.join("docker/docker-compose.yml"),
            "services:\n  db:\n    image: postgres:16\n",
        );

        let summary = ProjectRenderer::new(&descriptor, &DefaultBehavior)
            .materialize(&output, &context("demo", true), &BufferSink::new())
            .unwrap();
        assert_eq!(summary.merged, 1);

        let merged: serde_yaml::Value = serde_yaml::from_str(
            &std::fs::read_to_string(output.join("docker/docker-compose.yml")).unwrap(),
        )
        .unwrap();
        let services = merged.get("services").unwrap();
        assert!(services.get("db").is_some(), "existing service kept");
        assert!(services.get("api").is_some(), "incoming service added");
    }

    #[test]
    fn test_compose_merge_parse_failure_overwrites() {
        let dir = tempdir().unwrap();
        let descriptor = fixture_template(dir.path());
        let output = dir.path().join("out");
        write(&output.join("docker/docker-compose.yml"), "services: [broken\n");

        let summary = ProjectRenderer::new(&descriptor, &DefaultBehavior)
            .materialize(&output, &context("demo", true), &BufferSink::new())
            .unwrap();
        assert_eq!(summary.merged, 0);

        let content =
            std::fs::read_to_string(output.join("docker/docker-compose.yml")).unwrap();
        assert!(content.contains("image: demo:latest"));
        assert!(!content.contains("broken"));
    }

    #[test]
    fn test_non_compose_collision_overwrites() {
        let dir = tempdir().unwrap();
        let descriptor = fixture_template(dir.path());
        let output = dir.path().join("out");
        write(&output.join("README.md"), "stale content\n");

        ProjectRenderer::new(&descriptor, &DefaultBehavior)
            .materialize(&output, &context("demo", false), &BufferSink::new())
            .unwrap();
        let readme = std::fs::read_to_string(output.join("README.md")).unwrap();
        assert_eq!(readme, "# demo\n\nGenerated project.\n");
    }

    #[test]
    fn test_undefined_variable_fails_with_path() {
        let dir = tempdir().unwrap();
        let template_dir = dir.path().join("strict_demo");
        write(
            &template_dir.join(DESCRIPTOR_FILE),
            "name: Strict\ndescription: fixture\ngroup: package\n",
        );
        write(&template_dir.join("broken.txt.tera"), "{{ not_a_key }}\n");
        let manifest =
            serde_yaml::from_str("name: Strict\ndescription: fixture\ngroup: package\n").unwrap();
        let descriptor =
            TemplateDescriptor::from_manifest("strict_demo", template_dir, manifest).unwrap();

        let err = ProjectRenderer::new(&descriptor, &DefaultBehavior)
            .materialize(
                &dir.path().join("out"),
                &ScaffoldContext::new(),
                &BufferSink::new(),
            )
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("broken.txt.tera"), "got: {message}");
        assert!(message.contains("not_a_key"), "got: {message}");
    }

    #[test]
    fn test_behavior_file_filter_vetoes() {
        struct NoMarkdown;
        impl TemplateBehavior for NoMarkdown {
            fn should_include_file(&self, relative: &Path, _: &ScaffoldContext) -> bool {
                relative.extension().and_then(|e| e.to_str()) != Some("md")
                    && relative
                        .file_name()
                        .and_then(|n| n.to_str())
                        .is_none_or(|n| !n.ends_with(".md.tera"))
            }
        }

        let dir = tempdir().unwrap();
        let descriptor = fixture_template(dir.path());
        let output = dir.path().join("out");
        ProjectRenderer::new(&descriptor, &NoMarkdown)
            .materialize(&output, &context("demo", false), &BufferSink::new())
            .unwrap();
        assert!(!output.join("README.md").exists());
        assert!(output.join("data/raw/.gitkeep").exists());
    }

    #[test]
    fn test_welcome_message_and_tree_reported() {
        let dir = tempdir().unwrap();
        let descriptor = fixture_template(dir.path());
        let output = dir.path().join("out");
        let sink = BufferSink::new();
        ProjectRenderer::new(&descriptor, &DefaultBehavior)
            .materialize(&output, &context("demo", false), &sink)
            .unwrap();

        assert!(sink.contains("Welcome to demo!"));
        assert!(sink.contains("Project generated at:"));
        assert!(sink.contains("README.md"));
    }

    #[test]
    fn test_report_tree_skips_noise_dirs() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("out");
        write(&output.join(".git/HEAD"), "ref: refs/heads/main\n");
        write(&output.join("src/app.py"), "");
        let sink = BufferSink::new();
        print_tree(&output, &sink);
        assert!(sink.contains("src/"));
        assert!(sink.contains("app.py"));
        assert!(!sink.contains("HEAD"));
    }
}
