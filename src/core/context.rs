//! Resolved-parameter context handed to the renderer and hooks.

// Internal imports (std, crate)
use crate::core::value::Value;
use std::collections::BTreeMap;

// External imports (alphabetized)
use tracing::debug;

/// The answer set driving one generation run.
///
/// Built incrementally by the resolver (CLI flags, params file, key=value
/// overrides, editor, prompts) and extended last by the descriptor behavior's
/// `build_context`. Keys are prompt names plus behavior-injected extras.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScaffoldContext {
    values: BTreeMap<String, Value>,
}

impl ScaffoldContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Insert or replace a value. Used while folding in answer sources, where
    /// a later source wins.
    pub fn insert<K: Into<String>, V: Into<Value>>(&mut self, key: K, value: V) {
        self.values.insert(key.into(), value.into());
    }

    /// Fold a whole source into the context; its entries override existing
    /// ones key by key.
    pub fn apply_source(&mut self, source: BTreeMap<String, Value>) {
        for (key, value) in source {
            self.values.insert(key, value);
        }
    }

    /// Layer behavior-built additions on top: new keys are added, keys the
    /// user already answered are left untouched.
    pub fn layer_additions(&mut self, additions: BTreeMap<String, Value>) {
        for (key, value) in additions {
            if self.values.contains_key(&key) {
                debug!(key = %key, "build_context addition skipped, key already answered");
            } else {
                self.values.insert(key, value);
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    pub fn as_map(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    /// Build the Tera render context. Every value serializes through serde,
    /// so sequences and mappings arrive as native Tera values.
    pub fn to_tera(&self) -> tera::Context {
        let mut context = tera::Context::new();
        for (key, value) in &self.values {
            context.insert(key, value);
        }
        context
    }
}

impl FromIterator<(String, Value)> for ScaffoldContext {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_source_overrides_existing_keys() {
        let mut context = ScaffoldContext::new();
        context.insert("project_name", "from-file");
        context.insert("port", 8000i64);

        let mut overrides = BTreeMap::new();
        overrides.insert("project_name".to_string(), Value::from("from-flag"));
        context.apply_source(overrides);

        assert_eq!(
            context.get("project_name"),
            Some(&Value::String("from-flag".into()))
        );
        assert_eq!(context.get("port"), Some(&Value::Int(8000)));
    }

    #[test]
    fn test_layer_additions_never_clobbers_answers() {
        let mut context = ScaffoldContext::new();
        context.insert("project_name", "demo");

        let mut additions = BTreeMap::new();
        additions.insert("project_name".to_string(), Value::from("derived"));
        additions.insert("project_slug".to_string(), Value::from("demo"));
        context.layer_additions(additions);

        assert_eq!(
            context.get("project_name"),
            Some(&Value::String("demo".into()))
        );
        assert_eq!(
            context.get("project_slug"),
            Some(&Value::String("demo".into()))
        );
    }

    #[test]
    fn test_to_tera_renders_values() {
        let mut context = ScaffoldContext::new();
        context.insert("project_name", "demo");
        context.insert("use_docker", true);
        context.insert("services", Value::Seq(vec!["api".into(), "db".into()]));

        let rendered = tera::Tera::one_off(
            "{{ project_name }}:{{ use_docker }}:{{ services | join(sep=\",\") }}",
            &context.to_tera(),
            false,
        )
        .unwrap();
        assert_eq!(rendered, "demo:true:api,db");
    }
}
