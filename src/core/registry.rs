//! Template registry: discovery, lookup, and per-group defaults.

// Internal imports (std, crate)
use crate::core::behavior::{behavior_names, lookup_behavior};
use crate::core::descriptor::{DESCRIPTOR_FILE, TemplateDescriptor};
use crate::core::error::{Error, Result};
use std::collections::HashMap;
use std::path::Path;

// External imports (alphabetized)
use tracing::{debug, info, warn};

/// Index of every loaded template descriptor.
///
/// Descriptors are keyed by location; lookup also accepts the slug form.
/// Registration order is preserved so listings are stable, and each group
/// tracks a default descriptor used when the caller names none.
#[derive(Default)]
pub struct TemplateRegistry {
    descriptors: HashMap<String, TemplateDescriptor>,
    order: Vec<String>,
    defaults: HashMap<String, String>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discover templates under `root`.
    ///
    /// Both layouts are accepted: template directories directly under the
    /// root, and template directories nested one level down in group
    /// directories (`<root>/<group>/<location>/`). A directory whose
    /// descriptor fails to load is skipped with a warning; siblings are
    /// unaffected. Returns the number of templates registered.
    pub async fn discover(&mut self, root: &Path) -> Result<usize> {
        if !root.is_dir() {
            return Err(Error::config(format!(
                "templates root not found: {}",
                root.display()
            )));
        }
        info!("Discovering templates under: {}", root.display());

        let mut registered = 0;
        let mut entries = tokio::fs::read_dir(root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            if path.join(DESCRIPTOR_FILE).is_file() {
                registered += self.try_register_dir(&path).await as usize;
                continue;
            }
            // Group directory: scan one level deeper
            let mut nested = tokio::fs::read_dir(&path).await?;
            while let Some(candidate) = nested.next_entry().await? {
                let candidate_path = candidate.path();
                if !candidate_path.is_dir() {
                    continue;
                }
                if candidate_path.join(DESCRIPTOR_FILE).is_file() {
                    registered += self.try_register_dir(&candidate_path).await as usize;
                } else {
                    debug!(
                        "Skipping directory without descriptor: {}",
                        candidate_path.display()
                    );
                }
            }
        }

        self.bootstrap_defaults();
        info!("Registered {} template(s)", registered);
        Ok(registered)
    }

    async fn try_register_dir(&mut self, dir: &Path) -> bool {
        match TemplateDescriptor::load_from_dir(dir).await {
            Ok(descriptor) => {
                if lookup_behavior(&descriptor.behavior).is_none() {
                    warn!(
                        "Skipping template '{}': unknown behavior '{}' (registered: {})",
                        descriptor.location,
                        descriptor.behavior,
                        behavior_names().join(", ")
                    );
                    return false;
                }
                debug!(
                    "Registered template '{}' (group '{}')",
                    descriptor.location, descriptor.group
                );
                self.register(descriptor);
                true
            }
            Err(e) => {
                warn!("Skipping template directory {}: {}", dir.display(), e);
                false
            }
        }
    }

    /// Insert or replace a descriptor by location. A replaced descriptor
    /// keeps its original position in listing order.
    pub fn register(&mut self, descriptor: TemplateDescriptor) {
        let location = descriptor.location.clone();
        if self.descriptors.insert(location.clone(), descriptor).is_none() {
            self.order.push(location);
        }
    }

    /// Look up a descriptor by location or slug.
    pub fn get(&self, name: &str) -> Option<&TemplateDescriptor> {
        self.descriptors.get(name).or_else(|| {
            self.order
                .iter()
                .filter_map(|location| self.descriptors.get(location))
                .find(|descriptor| descriptor.matches_name(name))
        })
    }

    /// All descriptors in registration order, optionally filtered by group.
    pub fn list(&self, group: Option<&str>) -> Vec<&TemplateDescriptor> {
        self.order
            .iter()
            .filter_map(|location| self.descriptors.get(location))
            .filter(|descriptor| group.is_none_or(|g| descriptor.group == g))
            .collect()
    }

    /// Groups present in the registry, in first-seen order.
    pub fn groups(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for location in &self.order {
            if let Some(descriptor) = self.descriptors.get(location) {
                if !seen.contains(&descriptor.group.as_str()) {
                    seen.push(descriptor.group.as_str());
                }
            }
        }
        seen
    }

    /// Set the default descriptor for a group.
    ///
    /// Fails without mutating state when the location is unregistered or
    /// belongs to a different group.
    pub fn set_default(&mut self, group: &str, name: &str) -> Result<()> {
        let descriptor = self.get(name).ok_or_else(|| {
            Error::config(format!(
                "cannot set default for group '{group}': template '{name}' is not registered"
            ))
        })?;
        if descriptor.group != group {
            return Err(Error::config(format!(
                "cannot set default for group '{group}': template '{name}' belongs to group '{}'",
                descriptor.group
            )));
        }
        let location = descriptor.location.clone();
        self.defaults.insert(group.to_string(), location);
        Ok(())
    }

    /// The default descriptor of a group, if one is known.
    pub fn get_default(&self, group: &str) -> Option<&TemplateDescriptor> {
        self.defaults
            .get(group)
            .and_then(|location| self.descriptors.get(location))
    }

    /// Give every group without a default its first-registered descriptor.
    fn bootstrap_defaults(&mut self) {
        for location in &self.order {
            if let Some(descriptor) = self.descriptors.get(location) {
                self.defaults
                    .entry(descriptor.group.clone())
                    .or_insert_with(|| location.clone());
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Drop everything; used before re-discovery.
    pub fn clear(&mut self) {
        self.descriptors.clear();
        self.order.clear();
        self.defaults.clear();
    }
}
