//! Per-template behavior: the overridable logic a descriptor can opt into.
//!
//! The original idea of "each template ships code that configures itself" is
//! replaced by a fixed table of named behaviors compiled into the binary. A
//! `template.yaml` names one (`behavior: monorepo`); everything a behavior
//! does not override falls through to the defaults here. Unknown names are a
//! definition error caught at discovery, so no template can pull in logic the
//! host never registered.

// Internal imports (std, crate)
use crate::core::context::ScaffoldContext;
use crate::core::descriptor::{ConditionalDir, TemplateDescriptor};
use crate::core::error::Result;
use crate::core::utils::{module_name, sanitize_directory_name, timestamp_directory_name};
use crate::core::value::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

// External imports (alphabetized)
use once_cell::sync::Lazy;

/// Overridable descriptor logic. All methods have defaults; concrete
/// behaviors implement only what they need.
pub trait TemplateBehavior: Send + Sync {
    /// Derive additional context after all answers are collected. Additions
    /// are layered last and never replace user answers.
    fn build_context(
        &self,
        _descriptor: &TemplateDescriptor,
        _context: &ScaffoldContext,
    ) -> Result<BTreeMap<String, Value>> {
        Ok(BTreeMap::new())
    }

    /// Per-file filter consulted for every path the renderer considers.
    fn should_include_file(&self, _relative_path: &Path, _context: &ScaffoldContext) -> bool {
        true
    }

    /// Conditional-directory rules; the default is whatever the manifest
    /// declares.
    fn conditional_directories(&self, descriptor: &TemplateDescriptor) -> Vec<ConditionalDir> {
        descriptor.conditional_dirs.clone()
    }

    /// Name of the directory the project is generated into.
    ///
    /// Default policy: the `project_name` answer, lower-cased with spaces
    /// replaced by hyphens; without one, the descriptor name plus a UTC
    /// timestamp.
    fn project_directory_name(
        &self,
        descriptor: &TemplateDescriptor,
        context: &ScaffoldContext,
    ) -> String {
        match context.get("project_name").and_then(Value::as_str) {
            Some(name) if !name.trim().is_empty() => sanitize_directory_name(name),
            _ => timestamp_directory_name(&descriptor.name),
        }
    }
}

/// Behavior for templates that need nothing custom.
pub struct DefaultBehavior;

impl TemplateBehavior for DefaultBehavior {}

/// Monorepo templates: derive the slug and module spellings of the project
/// name so generated manifests don't have to re-encode the rules.
pub struct MonorepoBehavior;

impl TemplateBehavior for MonorepoBehavior {
    fn build_context(
        &self,
        _descriptor: &TemplateDescriptor,
        context: &ScaffoldContext,
    ) -> Result<BTreeMap<String, Value>> {
        let mut additions = BTreeMap::new();
        if let Some(name) = context.get("project_name").and_then(Value::as_str) {
            additions.insert(
                "project_slug".to_string(),
                Value::from(sanitize_directory_name(name)),
            );
            additions.insert("project_module".to_string(), Value::from(module_name(name)));
        }
        Ok(additions)
    }
}

/// Package templates: derive the importable module name from the package
/// name (falling back to the project name for standalone generation).
pub struct PackageBehavior;

impl TemplateBehavior for PackageBehavior {
    fn build_context(
        &self,
        _descriptor: &TemplateDescriptor,
        context: &ScaffoldContext,
    ) -> Result<BTreeMap<String, Value>> {
        let mut additions = BTreeMap::new();
        let source = context
            .get("package_name")
            .or_else(|| context.get("project_name"))
            .and_then(Value::as_str);
        if let Some(name) = source {
            additions.insert("package_slug".to_string(), Value::from(sanitize_directory_name(name)));
            additions.insert("package_module".to_string(), Value::from(module_name(name)));
        }
        Ok(additions)
    }

    fn project_directory_name(
        &self,
        descriptor: &TemplateDescriptor,
        context: &ScaffoldContext,
    ) -> String {
        match context.get("package_name").and_then(Value::as_str) {
            Some(name) if !name.trim().is_empty() => sanitize_directory_name(name),
            _ => DefaultBehavior.project_directory_name(descriptor, context),
        }
    }
}

static BEHAVIORS: Lazy<HashMap<&'static str, Arc<dyn TemplateBehavior>>> = Lazy::new(|| {
    let mut table: HashMap<&'static str, Arc<dyn TemplateBehavior>> = HashMap::new();
    table.insert("default", Arc::new(DefaultBehavior));
    table.insert("monorepo", Arc::new(MonorepoBehavior));
    table.insert("package", Arc::new(PackageBehavior));
    table
});

/// Resolve a behavior by its registered name.
pub fn lookup_behavior(name: &str) -> Option<Arc<dyn TemplateBehavior>> {
    BEHAVIORS.get(name).cloned()
}

/// Names of all registered behaviors, for discovery error messages.
pub fn behavior_names() -> Vec<&'static str> {
    let mut names: Vec<_> = BEHAVIORS.keys().copied().collect();
    names.sort_unstable();
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::descriptor::DescriptorManifest;
    use std::path::PathBuf;

    fn descriptor(group: &str) -> TemplateDescriptor {
        let manifest: DescriptorManifest = serde_yaml::from_str(&format!(
            "name: Demo Template\ndescription: test fixture\ngroup: {group}\n"
        ))
        .unwrap();
        TemplateDescriptor::from_manifest("demo_template", PathBuf::from("/tmp/demo"), manifest)
            .unwrap()
    }

    #[test]
    fn test_default_directory_name_from_project_name() {
        let mut context = ScaffoldContext::new();
        context.insert("project_name", "My Sales Project");
        let name = DefaultBehavior.project_directory_name(&descriptor("monorepo"), &context);
        assert_eq!(name, "my-sales-project");
    }

    #[test]
    fn test_default_directory_name_timestamp_fallback() {
        let context = ScaffoldContext::new();
        let name = DefaultBehavior.project_directory_name(&descriptor("monorepo"), &context);
        assert!(name.starts_with("demo-template-"));
    }

    #[test]
    fn test_monorepo_behavior_derives_slug_and_module() {
        let mut context = ScaffoldContext::new();
        context.insert("project_name", "My Sales Project");
        let additions = MonorepoBehavior
            .build_context(&descriptor("monorepo"), &context)
            .unwrap();
        assert_eq!(
            additions.get("project_slug"),
            Some(&Value::String("my-sales-project".into()))
        );
        assert_eq!(
            additions.get("project_module"),
            Some(&Value::String("my_sales_project".into()))
        );
    }

    #[test]
    fn test_package_behavior_prefers_package_name() {
        let mut context = ScaffoldContext::new();
        context.insert("project_name", "host");
        context.insert("package_name", "sales-core");
        let additions = PackageBehavior
            .build_context(&descriptor("package"), &context)
            .unwrap();
        assert_eq!(
            additions.get("package_module"),
            Some(&Value::String("sales_core".into()))
        );
        let dir = PackageBehavior.project_directory_name(&descriptor("package"), &context);
        assert_eq!(dir, "sales-core");
    }

    #[test]
    fn test_lookup_behavior() {
        assert!(lookup_behavior("default").is_some());
        assert!(lookup_behavior("monorepo").is_some());
        assert!(lookup_behavior("package").is_some());
        assert!(lookup_behavior("nonexistent").is_none());
        assert_eq!(behavior_names(), vec!["default", "monorepo", "package"]);
    }

    #[test]
    fn test_default_file_filter_accepts_everything() {
        let context = ScaffoldContext::new();
        assert!(DefaultBehavior.should_include_file(Path::new("src/app.py"), &context));
    }
}
