//! Deep merge for docker-compose manifests.
//!
//! When a rendered file collides with an existing compose file the two
//! documents are merged instead of last-write-wins: nested mappings merge
//! recursively, primitive lists concatenate and de-duplicate preserving
//! first-seen order, and for everything else the incoming value wins.

use crate::core::error::Result;
use serde_yaml::Value;

/// File names that get merge treatment on collision.
pub const COMPOSE_FILENAMES: [&str; 4] = [
    "docker-compose.yml",
    "docker-compose.yaml",
    "compose.yml",
    "compose.yaml",
];

pub fn is_compose_filename(name: &str) -> bool {
    COMPOSE_FILENAMES.contains(&name)
}

fn is_primitive(value: &Value) -> bool {
    !matches!(value, Value::Mapping(_) | Value::Sequence(_) | Value::Tagged(_))
}

/// Merge `incoming` into `existing` per the compose-merge rules.
pub fn deep_merge(existing: Value, incoming: Value) -> Value {
    match (existing, incoming) {
        (Value::Mapping(base), Value::Mapping(new)) => {
            // Existing keys keep their positions; keys only present in the
            // incoming document are appended in its order
            let mut pending: Vec<Option<(Value, Value)>> = new.into_iter().map(Some).collect();
            let mut merged = serde_yaml::Mapping::new();
            for (key, base_value) in base {
                let incoming = pending
                    .iter_mut()
                    .find(|slot| slot.as_ref().is_some_and(|(k, _)| *k == key))
                    .and_then(Option::take);
                match incoming {
                    Some((_, new_value)) => {
                        merged.insert(key, deep_merge(base_value, new_value));
                    }
                    None => {
                        merged.insert(key, base_value);
                    }
                }
            }
            for slot in pending.into_iter().flatten() {
                let (key, new_value) = slot;
                merged.insert(key, new_value);
            }
            Value::Mapping(merged)
        }
        (Value::Sequence(base), Value::Sequence(new)) => {
            let all_primitive =
                base.iter().all(is_primitive) && new.iter().all(is_primitive);
            let mut merged = base;
            if all_primitive {
                for item in new {
                    if !merged.contains(&item) {
                        merged.push(item);
                    }
                }
            } else {
                merged.extend(new);
            }
            Value::Sequence(merged)
        }
        // Type conflict or plain scalar: the incoming value wins
        (_, incoming) => incoming,
    }
}

/// Merge two compose documents given as text. Fails when either side is not
/// valid YAML; the caller decides what to do with an unmergeable pair.
pub fn merge_compose_documents(existing: &str, incoming: &str) -> Result<String> {
    let existing: Value = serde_yaml::from_str(existing)?;
    let incoming: Value = serde_yaml::from_str(incoming)?;
    Ok(serde_yaml::to_string(&deep_merge(existing, incoming))?)
}
