//! Typed parameter values for the scaffolding context.
//!
//! External input (params files, CLI key=value pairs, interactive answers,
//! assist responses) is converted into this closed set of variants at the
//! boundary, so everything downstream of the resolver works with one value
//! shape instead of raw YAML/JSON documents.

// Internal imports (std, crate)
use crate::core::error::{Error, Result};
use std::collections::BTreeMap;
use std::fmt;

// External imports (alphabetized)
use serde::{Deserialize, Serialize};

/// A resolved parameter value.
///
/// Variant order matters: `serde(untagged)` tries variants top to bottom, so
/// scalars must be probed before strings and collections last.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Seq(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Human-readable type name, used in validation errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Seq(_) => "sequence",
            Value::Map(_) => "mapping",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_seq(&self) -> Option<&[Value]> {
        match self {
            Value::Seq(items) => Some(items),
            _ => None,
        }
    }

    /// Parse a raw CLI literal (the right-hand side of `--param key=value`).
    ///
    /// Boolean literals are recognized case-insensitively, then integers and
    /// floats, then JSON for structured values ("[1,2]", "{\"a\": 1}",
    /// "\"quoted\""). Anything else stays a literal string.
    pub fn parse_cli_literal(raw: &str) -> Value {
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case("true") {
            return Value::Bool(true);
        }
        if trimmed.eq_ignore_ascii_case("false") {
            return Value::Bool(false);
        }
        if let Ok(i) = trimmed.parse::<i64>() {
            return Value::Int(i);
        }
        if let Ok(f) = trimmed.parse::<f64>() {
            return Value::Float(f);
        }
        if trimmed.starts_with('[') || trimmed.starts_with('{') || trimmed.starts_with('"') {
            if let Ok(json) = serde_json::from_str::<serde_json::Value>(trimmed) {
                if let Ok(value) = Value::from_json(json) {
                    return value;
                }
            }
        }
        Value::String(raw.to_string())
    }

    /// Convert a JSON document into a typed value.
    ///
    /// `null` has no counterpart in the value domain and is rejected.
    pub fn from_json(json: serde_json::Value) -> Result<Value> {
        match json {
            serde_json::Value::Null => Err(Error::input("null values are not supported")),
            serde_json::Value::Bool(b) => Ok(Value::Bool(b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Value::Int(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(Value::Float(f))
                } else {
                    Err(Error::input(format!("unrepresentable number: {n}")))
                }
            }
            serde_json::Value::String(s) => Ok(Value::String(s)),
            serde_json::Value::Array(items) => Ok(Value::Seq(
                items.into_iter().map(Value::from_json).collect::<Result<_>>()?,
            )),
            serde_json::Value::Object(map) => {
                let mut out = BTreeMap::new();
                for (key, item) in map {
                    out.insert(key, Value::from_json(item)?);
                }
                Ok(Value::Map(out))
            }
        }
    }

    /// Convert a YAML node into a typed value.
    ///
    /// Mapping keys must be strings; nulls and tagged nodes are rejected with
    /// an error naming the offending shape.
    pub fn from_yaml(yaml: serde_yaml::Value) -> Result<Value> {
        match yaml {
            serde_yaml::Value::Null => Err(Error::input("null values are not supported")),
            serde_yaml::Value::Bool(b) => Ok(Value::Bool(b)),
            serde_yaml::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Value::Int(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(Value::Float(f))
                } else {
                    Err(Error::input(format!("unrepresentable number: {n}")))
                }
            }
            serde_yaml::Value::String(s) => Ok(Value::String(s)),
            serde_yaml::Value::Sequence(items) => Ok(Value::Seq(
                items.into_iter().map(Value::from_yaml).collect::<Result<_>>()?,
            )),
            serde_yaml::Value::Mapping(map) => {
                let mut out = BTreeMap::new();
                for (key, item) in map {
                    let key = key
                        .as_str()
                        .ok_or_else(|| Error::input("mapping keys must be strings"))?
                        .to_string();
                    out.insert(key, Value::from_yaml(item)?);
                }
                Ok(Value::Map(out))
            }
            serde_yaml::Value::Tagged(_) => Err(Error::input("tagged YAML values are not supported")),
        }
    }

    /// Render the value back into a YAML node (defaults dump, editor file).
    pub fn to_yaml(&self) -> serde_yaml::Value {
        match self {
            Value::Bool(b) => serde_yaml::Value::Bool(*b),
            Value::Int(i) => serde_yaml::Value::Number((*i).into()),
            Value::Float(f) => serde_yaml::Value::Number((*f).into()),
            Value::String(s) => serde_yaml::Value::String(s.clone()),
            Value::Seq(items) => {
                serde_yaml::Value::Sequence(items.iter().map(Value::to_yaml).collect())
            }
            Value::Map(map) => {
                let mut out = serde_yaml::Mapping::new();
                for (key, item) in map {
                    out.insert(serde_yaml::Value::String(key.clone()), item.to_yaml());
                }
                serde_yaml::Value::Mapping(out)
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(n) => write!(f, "{n}"),
            Value::String(s) => write!(f, "{s}"),
            // Collections only show up in messages, JSON is compact enough
            other => match serde_json::to_string(other) {
                Ok(json) => write!(f, "{json}"),
                Err(_) => write!(f, "<{}>", other.type_name()),
            },
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<Vec<String>> for Value {
    fn from(items: Vec<String>) -> Self {
        Value::Seq(items.into_iter().map(Value::String).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cli_literal_booleans_case_insensitive() {
        assert_eq!(Value::parse_cli_literal("true"), Value::Bool(true));
        assert_eq!(Value::parse_cli_literal("True"), Value::Bool(true));
        assert_eq!(Value::parse_cli_literal("FALSE"), Value::Bool(false));
    }

    #[test]
    fn test_parse_cli_literal_numbers() {
        assert_eq!(Value::parse_cli_literal("42"), Value::Int(42));
        assert_eq!(Value::parse_cli_literal("-7"), Value::Int(-7));
        assert_eq!(Value::parse_cli_literal("3.14"), Value::Float(3.14));
    }

    #[test]
    fn test_parse_cli_literal_structured() {
        assert_eq!(
            Value::parse_cli_literal("[1, 2]"),
            Value::Seq(vec![Value::Int(1), Value::Int(2)])
        );
        let parsed = Value::parse_cli_literal(r#"{"region": "eu"}"#);
        let Value::Map(map) = parsed else {
            panic!("expected mapping");
        };
        assert_eq!(map.get("region"), Some(&Value::String("eu".into())));
    }

    #[test]
    fn test_parse_cli_literal_falls_back_to_string() {
        assert_eq!(
            Value::parse_cli_literal("hello world"),
            Value::String("hello world".into())
        );
        // Broken JSON stays literal rather than erroring
        assert_eq!(
            Value::parse_cli_literal("[1, 2"),
            Value::String("[1, 2".into())
        );
        // JSON null has no typed counterpart, keep the raw text
        assert_eq!(Value::parse_cli_literal("null"), Value::String("null".into()));
    }

    #[test]
    fn test_quoted_json_string_unwraps() {
        assert_eq!(
            Value::parse_cli_literal(r#""3000""#),
            Value::String("3000".into())
        );
    }

    #[test]
    fn test_from_yaml_round_trip() {
        let yaml: serde_yaml::Value =
            serde_yaml::from_str("name: demo\nport: 8000\nuse_docker: true\ntags:\n  - a\n  - b\n")
                .unwrap();
        let value = Value::from_yaml(yaml).unwrap();
        let Value::Map(map) = &value else {
            panic!("expected mapping");
        };
        assert_eq!(map.get("port"), Some(&Value::Int(8000)));
        assert_eq!(map.get("use_docker"), Some(&Value::Bool(true)));
        assert_eq!(
            map.get("tags"),
            Some(&Value::Seq(vec!["a".into(), "b".into()]))
        );

        let back = serde_yaml::to_string(&value.to_yaml()).unwrap();
        let reparsed = Value::from_yaml(serde_yaml::from_str(&back).unwrap()).unwrap();
        assert_eq!(reparsed, value);
    }

    #[test]
    fn test_from_yaml_rejects_null() {
        let yaml: serde_yaml::Value = serde_yaml::from_str("~").unwrap();
        assert!(Value::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_untagged_deserialize_orders_scalars_correctly() {
        let v: Value = serde_yaml::from_str("true").unwrap();
        assert_eq!(v, Value::Bool(true));
        let v: Value = serde_yaml::from_str("12").unwrap();
        assert_eq!(v, Value::Int(12));
        let v: Value = serde_yaml::from_str("\"12\"").unwrap();
        assert_eq!(v, Value::String("12".into()));
    }

    #[test]
    fn test_display_scalars() {
        assert_eq!(Value::Bool(true).to_string(), "true");
        assert_eq!(Value::Int(8000).to_string(), "8000");
        assert_eq!(Value::String("demo".into()).to_string(), "demo");
    }
}
