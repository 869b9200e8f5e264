//! dsforge CLI entrypoint
//! Parses command-line arguments and dispatches to the scaffolding core.
#![deny(unsafe_code)]
mod assist;
mod core;

// Internal imports (std, crate)
use assist::{AssistClient, fallback_packages};
use core::{
    Error,
    behavior::{TemplateBehavior, lookup_behavior},
    descriptor::TemplateDescriptor,
    embedded::resolve_templates_root,
    hooks::{
        GeneratePackagesHook, InstallDependenciesHook, PACKAGES_CONTEXT_KEY, PostCreateHook,
        run_post_create_hooks,
    },
    output::ConsoleSink,
    prompt::{Prompter, TerminalPrompter},
    registry::TemplateRegistry,
    renderer::ProjectRenderer,
    resolver::{self, AnswerSources},
    shell::ProcessToolRunner,
    utils::module_name,
    value::Value,
    workspace::{PackageRegistration, find_workspace_root, register_package},
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

// External imports (alphabetized)
use anyhow::{Context, bail};
use clap::Parser;
use tracing::{Level, info, warn};
use tracing_subscriber::EnvFilter;

/// Environment variable naming the parent directory for generated projects.
const OUTPUT_DIR_ENV: &str = "DSFORGE_OUTPUT_DIR";

#[derive(Parser)]
#[command(name = "dsforge")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Generate a project from a template
    Create {
        /// Template to generate (location or slug); prompted for when omitted
        template: Option<String>,
        /// Template group to choose from when no template is named
        #[arg(long, default_value = "monorepo")]
        group: String,
        /// Project name, answering the project_name question up front
        #[arg(long)]
        name: Option<String>,
        /// Parent directory for the generated project
        #[arg(long)]
        output_dir: Option<PathBuf>,
        /// Custom template directory
        #[arg(long)]
        template_dir: Option<PathBuf>,
        /// YAML file with question answers
        #[arg(long)]
        params_file: Option<PathBuf>,
        /// Inline answer as key=value; repeatable
        #[arg(short = 'p', long = "param")]
        params: Vec<String>,
        /// Open $EDITOR on the collected answers before resolving
        #[arg(long, conflicts_with = "yes")]
        edit: bool,
        /// Accept defaults instead of prompting
        #[arg(long)]
        yes: bool,
        /// Pre-fill unanswered questions from an AI assistant
        #[arg(long)]
        assist: bool,
        /// Project description fed to the assistant
        #[arg(long, requires = "assist")]
        describe: Option<String>,
        /// Skip post-create hooks
        #[arg(long)]
        no_hooks: bool,
    },
    /// List available templates
    List {
        /// Only show templates in this group
        group: Option<String>,
        /// Custom template directory
        #[arg(long)]
        template_dir: Option<PathBuf>,
    },
    /// Print a template's default answers as YAML
    #[command(name = "dump-defaults")]
    DumpDefaults {
        /// Template to dump (location or slug)
        template: String,
        /// Write to this file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
        /// Custom template directory
        #[arg(long)]
        template_dir: Option<PathBuf>,
    },
    /// Add a package to an existing workspace
    #[command(name = "add-package")]
    AddPackage {
        /// Package template (location or slug); prompted for when omitted
        template: Option<String>,
        /// Package name, answering the package_name question up front
        #[arg(long)]
        name: Option<String>,
        /// Workspace root; discovered from the working directory when omitted
        #[arg(long)]
        workspace_root: Option<PathBuf>,
        /// Custom template directory
        #[arg(long)]
        template_dir: Option<PathBuf>,
        /// Inline answer as key=value; repeatable
        #[arg(short = 'p', long = "param")]
        params: Vec<String>,
        /// Accept defaults instead of prompting
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging with default level INFO; stdout stays reserved for
    // command output so listings and dumps can be piped
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match &cli.command {
        Commands::Create {
            template,
            group,
            name,
            output_dir,
            template_dir,
            params_file,
            params,
            edit,
            yes,
            assist,
            describe,
            no_hooks,
        } => {
            create_project(CreateParams {
                template: template.as_deref(),
                group,
                name,
                output_dir,
                template_dir,
                params_file,
                params,
                edit: *edit,
                yes: *yes,
                assist: *assist,
                describe,
                no_hooks: *no_hooks,
            })
            .await?
        }
        Commands::List {
            group,
            template_dir,
        } => list_templates(group.as_deref(), template_dir.as_deref()).await?,
        Commands::DumpDefaults {
            template,
            output,
            template_dir,
        } => dump_template_defaults(template, output.as_deref(), template_dir.as_deref()).await?,
        Commands::AddPackage {
            template,
            name,
            workspace_root,
            template_dir,
            params,
            yes,
        } => {
            add_package(AddPackageParams {
                template: template.as_deref(),
                name,
                workspace_root,
                template_dir,
                params,
                yes: *yes,
            })
            .await?
        }
    }
    Ok(())
}

/// Parameters for project generation
struct CreateParams<'a> {
    template: Option<&'a str>,
    group: &'a str,
    name: &'a Option<String>,
    output_dir: &'a Option<PathBuf>,
    template_dir: &'a Option<PathBuf>,
    params_file: &'a Option<PathBuf>,
    params: &'a [String],
    edit: bool,
    yes: bool,
    assist: bool,
    describe: &'a Option<String>,
    no_hooks: bool,
}

/// Generate a project from a template
async fn create_project(params: CreateParams<'_>) -> anyhow::Result<()> {
    let templates_root = resolve_templates_root(params.template_dir.as_deref())?;
    let mut registry = TemplateRegistry::new();
    let registered = registry.discover(&templates_root).await?;
    if registered == 0 {
        bail!("no templates found under {}", templates_root.display());
    }

    let prompter: Arc<dyn Prompter> = Arc::new(TerminalPrompter);
    let selection = select_descriptor(
        &registry,
        params.template,
        params.group,
        params.yes,
        prompter.as_ref(),
    );
    let descriptor = or_abort(selection)?.clone();
    let behavior = lookup_behavior(&descriptor.behavior).ok_or_else(|| {
        anyhow::anyhow!(
            "template '{}' names unknown behavior '{}'",
            descriptor.location,
            descriptor.behavior
        )
    })?;

    let mut sources = AnswerSources {
        params_file: params.params_file.clone(),
        overrides: params.params.to_vec(),
        edit: params.edit,
        ..Default::default()
    };
    if let Some(name) = params.name {
        sources
            .flags
            .insert("project_name".to_string(), Value::from(name.as_str()));
    }
    let mut collected =
        resolver::collect_sources(&descriptor, &sources, &resolver::editor_command())?;

    if params.assist {
        let description = match params.describe {
            Some(text) => text.clone(),
            None if params.yes => bail!("--assist with --yes needs --describe"),
            None => or_abort(
                prompter.text("Describe the project (guides the suggested answers)", None),
            )?,
        };
        assist_fill(&descriptor, &registry, &mut collected, &description).await;
    }

    let resolution = if params.yes {
        resolver::complete_with_defaults(&descriptor, behavior.as_ref(), collected)
    } else {
        resolver::complete_with_prompts(&descriptor, behavior.as_ref(), collected, prompter.as_ref())
    };
    let context = or_abort(resolution)?;

    let project_dir = behavior.project_directory_name(&descriptor, &context);
    let output_root = resolve_output_dir(&project_dir, params.output_dir.as_deref())?;
    if directory_nonempty(&output_root) {
        if params.yes {
            warn!(
                "Output directory {} is not empty; existing files may be overwritten",
                output_root.display()
            );
        } else {
            let question = format!(
                "Directory {} is not empty. Continue and overwrite?",
                output_root.display()
            );
            if !or_abort(prompter.confirm(&question, false))? {
                eprintln!("Aborted.");
                std::process::exit(1);
            }
        }
    }

    let sink = ConsoleSink;
    let renderer = ProjectRenderer::new(&descriptor, behavior.as_ref());
    let summary = renderer.materialize(&output_root, &context, &sink)?;
    info!(
        rendered = summary.rendered,
        copied = summary.copied,
        merged = summary.merged,
        excluded = summary.excluded,
        "Materialization finished"
    );

    if params.no_hooks {
        info!("Skipping post-create hooks (--no-hooks)");
        return Ok(());
    }
    let registry = Arc::new(registry);
    let hooks: Vec<Arc<dyn PostCreateHook>> = vec![
        Arc::new(GeneratePackagesHook::new(registry.clone(), prompter.clone())),
        Arc::new(InstallDependenciesHook::new(Arc::new(
            ProcessToolRunner::new(),
        ))),
    ];
    let completed = run_post_create_hooks(&hooks, &descriptor, &output_root, &context, &sink).await;
    info!("Completed {completed} post-create hook(s)");
    Ok(())
}

/// List registered templates, marking each group's default with `*`
async fn list_templates(group: Option<&str>, template_dir: Option<&Path>) -> anyhow::Result<()> {
    let templates_root = resolve_templates_root(template_dir)?;
    let mut registry = TemplateRegistry::new();
    registry.discover(&templates_root).await?;

    let descriptors = registry.list(group);
    if descriptors.is_empty() {
        match group {
            Some(group) => println!("No templates in group '{group}'."),
            None => println!("No templates found under {}.", templates_root.display()),
        }
        return Ok(());
    }
    println!("Templates under {}:", templates_root.display());
    for descriptor in descriptors {
        let default = registry
            .get_default(&descriptor.group)
            .is_some_and(|d| d.location == descriptor.location);
        let marker = if default { "*" } else { " " };
        println!(
            "{marker} {} ({}) - {}: {}",
            descriptor.location, descriptor.group, descriptor.name, descriptor.description
        );
    }
    Ok(())
}

/// Write a template's defaults as a ready-to-edit params file
async fn dump_template_defaults(
    template: &str,
    output: Option<&Path>,
    template_dir: Option<&Path>,
) -> anyhow::Result<()> {
    let templates_root = resolve_templates_root(template_dir)?;
    let mut registry = TemplateRegistry::new();
    registry.discover(&templates_root).await?;

    let descriptor = registry
        .get(template)
        .ok_or_else(|| anyhow::anyhow!("template '{template}' not found"))?;
    let dumped = resolver::dump_defaults(descriptor)?;
    match output {
        Some(path) => {
            std::fs::write(path, &dumped)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(
                "Wrote defaults for '{}' to {}",
                descriptor.location,
                path.display()
            );
        }
        None => print!("{dumped}"),
    }
    Ok(())
}

/// Parameters for package addition
struct AddPackageParams<'a> {
    template: Option<&'a str>,
    name: &'a Option<String>,
    workspace_root: &'a Option<PathBuf>,
    template_dir: &'a Option<PathBuf>,
    params: &'a [String],
    yes: bool,
}

/// Generate a package template into an existing workspace and register it
async fn add_package(params: AddPackageParams<'_>) -> anyhow::Result<()> {
    let workspace_root = match params.workspace_root {
        Some(root) => root.clone(),
        None => {
            let cwd = std::env::current_dir().context("Failed to determine current directory")?;
            find_workspace_root(&cwd).ok_or_else(|| {
                anyhow::anyhow!(
                    "no pyproject.toml with [tool.uv.workspace] found above {}; \
                     run inside a generated project or pass --workspace-root",
                    cwd.display()
                )
            })?
        }
    };

    let templates_root = resolve_templates_root(params.template_dir.as_deref())?;
    let mut registry = TemplateRegistry::new();
    registry.discover(&templates_root).await?;

    let prompter = TerminalPrompter;
    let selection = select_descriptor(&registry, params.template, "package", params.yes, &prompter);
    let descriptor = or_abort(selection)?.clone();
    let behavior = lookup_behavior(&descriptor.behavior).ok_or_else(|| {
        anyhow::anyhow!(
            "template '{}' names unknown behavior '{}'",
            descriptor.location,
            descriptor.behavior
        )
    })?;

    let mut sources = AnswerSources {
        overrides: params.params.to_vec(),
        ..Default::default()
    };
    if let Some(name) = params.name {
        sources
            .flags
            .insert("package_name".to_string(), Value::from(name.as_str()));
    }
    let collected = resolver::collect_sources(&descriptor, &sources, &resolver::editor_command())?;
    let resolution = if params.yes {
        resolver::complete_with_defaults(&descriptor, behavior.as_ref(), collected)
    } else {
        resolver::complete_with_prompts(&descriptor, behavior.as_ref(), collected, &prompter)
    };
    let context = or_abort(resolution)?;

    let dir_name = behavior.project_directory_name(&descriptor, &context);
    let target = workspace_root.join("packages").join(&dir_name);
    if target.exists() {
        bail!("package directory {} already exists", target.display());
    }

    let sink = ConsoleSink;
    ProjectRenderer::new(&descriptor, behavior.as_ref()).materialize(&target, &context, &sink)?;

    let package_name = context
        .get("package_name")
        .and_then(Value::as_str)
        .unwrap_or(&dir_name)
        .to_string();
    let module = context
        .get("package_module")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| module_name(&package_name));
    let directory = format!("packages/{dir_name}");
    let registration = PackageRegistration {
        name: &package_name,
        module: &module,
        directory: &directory,
    };
    if register_package(&workspace_root, &registration)? {
        info!("Registered '{package_name}' in the workspace manifest");
    } else {
        info!("'{package_name}' was already registered");
    }
    println!("Package '{package_name}' added at {}", target.display());
    Ok(())
}

/// Resolve which template to generate: an explicit name, the group's only
/// member, the group default under `--yes`, or an interactive pick.
fn select_descriptor<'r>(
    registry: &'r TemplateRegistry,
    template: Option<&str>,
    group: &str,
    yes: bool,
    prompter: &dyn Prompter,
) -> Result<&'r TemplateDescriptor, Error> {
    if let Some(name) = template {
        return registry.get(name).ok_or_else(|| {
            let known: Vec<&str> = registry
                .list(None)
                .iter()
                .map(|d| d.location.as_str())
                .collect();
            Error::input(format!(
                "template '{name}' not found (available: {})",
                known.join(", ")
            ))
        });
    }

    let candidates = registry.list(Some(group));
    if candidates.is_empty() {
        return Err(Error::input(format!(
            "no templates registered in group '{group}'"
        )));
    }
    if candidates.len() == 1 {
        info!(
            "Using the only '{group}' template: {}",
            candidates[0].location
        );
        return Ok(candidates[0]);
    }
    if yes {
        // discover() gives every non-empty group a default
        return registry
            .get_default(group)
            .ok_or_else(|| Error::input(format!("no default template for group '{group}'")));
    }

    let options: Vec<String> = candidates
        .iter()
        .map(|d| format!("{} - {}", d.location, d.description))
        .collect();
    let default_index = registry
        .get_default(group)
        .and_then(|d| candidates.iter().position(|c| c.location == d.location))
        .unwrap_or(0);
    let chosen = prompter.select("Select a template", &options, default_index)?;
    Ok(candidates[chosen])
}

/// Pre-fill unanswered questions from the assist endpoint. Failures degrade
/// to the keyword fallback so `--assist` never blocks project creation.
async fn assist_fill(
    descriptor: &TemplateDescriptor,
    registry: &TemplateRegistry,
    collected: &mut BTreeMap<String, Value>,
    description: &str,
) {
    let available: Vec<String> = registry
        .list(Some("package"))
        .iter()
        .map(|d| d.location.clone())
        .collect();

    let client = match AssistClient::from_env() {
        Ok(client) => client,
        Err(e) => {
            warn!("{e}; falling back to keyword matching");
            seed_packages(
                descriptor,
                collected,
                fallback_packages(description, &available),
            );
            return;
        }
    };

    match client
        .suggest_answers(descriptor, collected, description)
        .await
    {
        Ok(suggested) => {
            let count = suggested.len();
            // Explicit answers always beat suggestions
            for (key, value) in suggested {
                collected.entry(key).or_insert(value);
            }
            info!("Assist suggested {count} answer(s)");
        }
        Err(e) => warn!("Assist request failed, continuing with prompts: {e}"),
    }

    if !available.is_empty() && !collected.contains_key(PACKAGES_CONTEXT_KEY) {
        match client.propose_packages(description, &available).await {
            Ok(packages) => seed_packages(descriptor, collected, packages),
            Err(e) => warn!("Assist package proposal failed: {e}"),
        }
    }
}

fn seed_packages(
    descriptor: &TemplateDescriptor,
    collected: &mut BTreeMap<String, Value>,
    packages: Vec<String>,
) {
    if descriptor.group != "monorepo"
        || packages.is_empty()
        || collected.contains_key(PACKAGES_CONTEXT_KEY)
    {
        return;
    }
    info!("Selected package template(s): {}", packages.join(", "));
    collected.insert(
        PACKAGES_CONTEXT_KEY.to_string(),
        Value::Seq(packages.into_iter().map(Value::String).collect()),
    );
}

/// A cancelled prompt aborts the run without an error trace: "Aborted." on
/// stderr and a non-zero exit.
fn or_abort<T>(result: Result<T, Error>) -> anyhow::Result<T> {
    match result {
        Ok(value) => Ok(value),
        Err(e) if e.is_cancelled() => {
            eprintln!("Aborted.");
            std::process::exit(1);
        }
        Err(e) => Err(e.into()),
    }
}

/// Resolve where the project lands: `--output-dir`, then `DSFORGE_OUTPUT_DIR`,
/// then the working directory, each joined with the project directory name.
fn resolve_output_dir(project_dir: &str, custom: Option<&Path>) -> anyhow::Result<PathBuf> {
    let base = match custom {
        Some(dir) => dir.to_path_buf(),
        None => match std::env::var(OUTPUT_DIR_ENV) {
            Ok(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
            _ => std::env::current_dir().context("Failed to determine current directory")?,
        },
    };
    let target = base.join(project_dir);
    if target.is_absolute() {
        Ok(target)
    } else {
        let cwd = std::env::current_dir().context("Failed to determine current directory")?;
        Ok(cwd.join(target))
    }
}

fn directory_nonempty(dir: &Path) -> bool {
    std::fs::read_dir(dir)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}
