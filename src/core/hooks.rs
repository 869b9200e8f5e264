//! Post-create hooks.
//!
//! After a project is materialized, every registered hook whose filter
//! matches the template runs in registration order. Hook failures are
//! reported and do not undo the generated project; a hook cancelled at a
//! prompt is skipped the same way. The built-in pair generates the selected
//! workspace packages first, then installs dependencies, in that order so
//! the install sees the final member list.

// Internal imports (std, crate)
use crate::core::behavior::lookup_behavior;
use crate::core::context::ScaffoldContext;
use crate::core::descriptor::TemplateDescriptor;
use crate::core::error::{Error, Result};
use crate::core::output::OutputSink;
use crate::core::prompt::Prompter;
use crate::core::registry::TemplateRegistry;
use crate::core::renderer::ProjectRenderer;
use crate::core::shell::ToolRunner;
use crate::core::utils::module_name;
use crate::core::value::Value;
use crate::core::workspace::{self, PackageRegistration};
use std::path::Path;
use std::sync::Arc;

// External imports (alphabetized)
use async_trait::async_trait;
use tracing::{debug, info, warn};

/// Context key a monorepo questionnaire can answer to pre-select the
/// package templates generated by [`GeneratePackagesHook`].
pub const PACKAGES_CONTEXT_KEY: &str = "packages";

/// Template match rules for one hook. Exclusions veto before inclusions are
/// consulted; empty inclusion lists match every template.
#[derive(Debug, Clone, Default)]
pub struct HookFilter {
    pub template_names: Vec<String>,
    pub template_groups: Vec<String>,
    pub exclude_names: Vec<String>,
    pub exclude_groups: Vec<String>,
}

impl HookFilter {
    /// Matches every template.
    pub fn any() -> Self {
        Self::default()
    }

    pub fn for_groups(groups: &[&str]) -> Self {
        Self {
            template_groups: groups.iter().map(|g| g.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn for_templates(names: &[&str]) -> Self {
        Self {
            template_names: names.iter().map(|n| n.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn without_templates(mut self, names: &[&str]) -> Self {
        self.exclude_names
            .extend(names.iter().map(|n| n.to_string()));
        self
    }

    pub fn without_groups(mut self, groups: &[&str]) -> Self {
        self.exclude_groups
            .extend(groups.iter().map(|g| g.to_string()));
        self
    }

    /// Template names match location or slug form; groups match exactly.
    pub fn should_run(&self, descriptor: &TemplateDescriptor) -> bool {
        if self.exclude_names.iter().any(|n| descriptor.matches_name(n)) {
            return false;
        }
        if self.exclude_groups.iter().any(|g| *g == descriptor.group) {
            return false;
        }
        if self.template_names.is_empty() && self.template_groups.is_empty() {
            return true;
        }
        self.template_names.iter().any(|n| descriptor.matches_name(n))
            || self.template_groups.iter().any(|g| *g == descriptor.group)
    }
}

/// A unit of post-create work.
#[async_trait]
pub trait PostCreateHook: Send + Sync {
    fn name(&self) -> &str;

    fn filter(&self) -> &HookFilter;

    async fn run(
        &self,
        project_dir: &Path,
        context: &ScaffoldContext,
        sink: &dyn OutputSink,
    ) -> Result<()>;
}

/// Run every matching hook; returns how many completed successfully.
pub async fn run_post_create_hooks(
    hooks: &[Arc<dyn PostCreateHook>],
    descriptor: &TemplateDescriptor,
    project_dir: &Path,
    context: &ScaffoldContext,
    sink: &dyn OutputSink,
) -> usize {
    let mut completed = 0;
    for hook in hooks {
        if !hook.filter().should_run(descriptor) {
            debug!(
                "Skipping hook '{}' for template '{}'",
                hook.name(),
                descriptor.location
            );
            continue;
        }
        info!("Running post-create hook: {}", hook.name());
        match hook.run(project_dir, context, sink).await {
            Ok(()) => completed += 1,
            Err(e) if e.is_cancelled() => {
                info!("Hook '{}' cancelled, skipping", hook.name());
            }
            Err(e) => {
                warn!("Hook '{}' failed: {e}", hook.name());
                sink.line(&format!(
                    "Warning: hook '{}' failed: {e}. The generated project is unaffected.",
                    hook.name()
                ));
            }
        }
    }
    completed
}

/// Installs workspace dependencies by running `uv sync` in the project
/// directory.
pub struct InstallDependenciesHook {
    runner: Arc<dyn ToolRunner>,
    filter: HookFilter,
}

impl InstallDependenciesHook {
    pub fn new(runner: Arc<dyn ToolRunner>) -> Self {
        Self {
            runner,
            filter: HookFilter::for_groups(&["monorepo"]),
        }
    }
}

#[async_trait]
impl PostCreateHook for InstallDependenciesHook {
    fn name(&self) -> &str {
        "install-dependencies"
    }

    fn filter(&self) -> &HookFilter {
        &self.filter
    }

    async fn run(
        &self,
        project_dir: &Path,
        _context: &ScaffoldContext,
        sink: &dyn OutputSink,
    ) -> Result<()> {
        sink.line("Installing dependencies with 'uv sync'...");
        let outcome = self.runner.run("uv", &["sync"], project_dir).await?;
        if !outcome.success() {
            return Err(Error::hook(format!(
                "'uv sync' failed: {}",
                outcome.failure_summary()
            )));
        }
        debug!("uv sync output: {}", outcome.stdout.trim());
        sink.line("Dependencies installed.");
        Ok(())
    }
}

/// Generates the selected package templates into `packages/` and registers
/// each one in the workspace manifest.
///
/// The selection comes from the `packages` context key when the monorepo
/// questionnaire answered it, otherwise from an interactive multi-select
/// over the registered package-group templates.
pub struct GeneratePackagesHook {
    registry: Arc<TemplateRegistry>,
    prompter: Arc<dyn Prompter>,
    filter: HookFilter,
}

impl GeneratePackagesHook {
    /// Package template pre-checked in the interactive selection.
    const DEFAULT_CHECKED: &'static str = "pkg_core";

    pub fn new(registry: Arc<TemplateRegistry>, prompter: Arc<dyn Prompter>) -> Self {
        Self {
            registry,
            prompter,
            filter: HookFilter::for_groups(&["monorepo"]),
        }
    }

    fn selected_locations(&self, context: &ScaffoldContext) -> Result<Vec<String>> {
        if let Some(value) = context.get(PACKAGES_CONTEXT_KEY) {
            let Value::Seq(items) = value else {
                return Err(Error::hook(format!(
                    "context key '{PACKAGES_CONTEXT_KEY}' must be a list, got {}",
                    value.type_name()
                )));
            };
            return Ok(items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect());
        }

        let candidates = self.registry.list(Some("package"));
        if candidates.is_empty() {
            debug!("No package templates registered; nothing to select");
            return Ok(Vec::new());
        }
        let options: Vec<String> = candidates
            .iter()
            .map(|d| format!("{} ({})", d.location, d.description))
            .collect();
        let checked: Vec<bool> = candidates
            .iter()
            .map(|d| d.location == Self::DEFAULT_CHECKED)
            .collect();
        let chosen =
            self.prompter
                .multi_select("Select packages to generate", &options, &checked)?;
        Ok(chosen
            .into_iter()
            .map(|i| candidates[i].location.clone())
            .collect())
    }

    fn generate_one(
        &self,
        location: &str,
        project_dir: &Path,
        parent: &ScaffoldContext,
        sink: &dyn OutputSink,
    ) -> Result<()> {
        let descriptor = self.registry.get(location).ok_or_else(|| {
            Error::hook(format!("package template '{location}' is not registered"))
        })?;
        let behavior = lookup_behavior(&descriptor.behavior).ok_or_else(|| {
            Error::hook(format!(
                "package template '{location}' names unknown behavior '{}'",
                descriptor.behavior
            ))
        })?;

        let mut context = parent.clone();
        for question in &descriptor.questions {
            if context.contains_key(&question.name) {
                continue;
            }
            match question.effective_default() {
                Some(default) => context.insert(question.name.clone(), default),
                None if question.name == "package_name" => {
                    context.insert(question.name.clone(), location)
                }
                None => {
                    return Err(Error::hook(format!(
                        "package template '{location}': question '{}' has no default; \
                         generate it with 'dsforge add-package' instead",
                        question.name
                    )));
                }
            }
        }
        if !context.contains_key("package_name") {
            context.insert("package_name", location);
        }
        let additions = behavior.build_context(descriptor, &context)?;
        context.layer_additions(additions);

        let dir_name = behavior.project_directory_name(descriptor, &context);
        let target = project_dir.join("packages").join(&dir_name);
        sink.line(&format!("Generating package '{dir_name}' from '{location}'..."));
        ProjectRenderer::new(descriptor, behavior.as_ref()).materialize(&target, &context, sink)?;

        let package_name = context
            .get("package_name")
            .and_then(Value::as_str)
            .unwrap_or(location)
            .to_string();
        let module = context
            .get("package_module")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| module_name(&package_name));
        let directory = format!("packages/{dir_name}");
        workspace::register_package(
            project_dir,
            &PackageRegistration {
                name: &package_name,
                module: &module,
                directory: &directory,
            },
        )?;
        Ok(())
    }
}

#[async_trait]
impl PostCreateHook for GeneratePackagesHook {
    fn name(&self) -> &str {
        "generate-packages"
    }

    fn filter(&self) -> &HookFilter {
        &self.filter
    }

    async fn run(
        &self,
        project_dir: &Path,
        context: &ScaffoldContext,
        sink: &dyn OutputSink,
    ) -> Result<()> {
        let locations = self.selected_locations(context)?;
        if locations.is_empty() {
            sink.line("No packages selected.");
            return Ok(());
        }

        let mut failed = Vec::new();
        for location in &locations {
            if let Err(e) = self.generate_one(location, project_dir, context, sink) {
                warn!("Package '{location}' generation failed: {e}");
                failed.push(location.clone());
            }
        }
        if !failed.is_empty() {
            return Err(Error::hook(format!(
                "failed to generate package(s): {}",
                failed.join(", ")
            )));
        }
        Ok(())
    }
}
