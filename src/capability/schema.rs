//! Parameter schema for capabilities
//!
//! The schema is the contract between the prompt and the controllers: it is
//! advertised to the model, and every model call is coerced against it
//! before a command leaves the resolver.

use crate::core::error::{AgentError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Declared type of a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    String,
    Number,
    Boolean,
    Object,
    List,
    /// Reference to a target (player name, target spec); the literal string
    /// `"null"` means "explicitly no target"
    Target,
    /// Anything the model sends is accepted as-is
    Any,
}

/// Schema entry for one parameter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamSpec {
    #[serde(rename = "type")]
    pub kind: ParamType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub description: String,
}

impl ParamSpec {
    pub fn new(kind: ParamType) -> Self {
        Self {
            kind,
            required: false,
            default: None,
            description: String::new(),
        }
    }

    /// Whether a value already has the declared shape (null is always allowed)
    pub fn accepts(&self, value: &Value) -> bool {
        if value.is_null() {
            return true;
        }
        match self.kind {
            ParamType::String => value.is_string(),
            ParamType::Number => value.is_number(),
            ParamType::Boolean => value.is_boolean(),
            ParamType::Object => value.is_object(),
            ParamType::List => value.is_array(),
            ParamType::Target | ParamType::Any => true,
        }
    }

    /// Coerce a supplied value toward the declared type
    ///
    /// Fails with `Validation` when the value cannot be made to fit; the
    /// caller falls back to the default in that case.
    pub fn coerce(&self, name: &str, value: Value) -> Result<Value> {
        match self.kind {
            ParamType::Number => coerce_number(&value).ok_or_else(|| {
                AgentError::Validation(format!("{} expects a number, got {}", name, value))
            }),
            ParamType::Boolean => match &value {
                Value::Bool(_) | Value::Null => Ok(value),
                Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(Value::Bool(true)),
                Value::String(s) if s.eq_ignore_ascii_case("false") => Ok(Value::Bool(false)),
                _ => Err(AgentError::Validation(format!(
                    "{} expects a boolean, got {}",
                    name, value
                ))),
            },
            ParamType::String => match value {
                Value::String(_) | Value::Null => Ok(value),
                Value::Number(n) => Ok(Value::String(n.to_string())),
                Value::Bool(b) => Ok(Value::String(b.to_string())),
                other => Err(AgentError::Validation(format!(
                    "{} expects a string, got {}",
                    name, other
                ))),
            },
            ParamType::Target => Ok(normalize_target(value)),
            ParamType::Object | ParamType::List => {
                if self.accepts(&value) {
                    Ok(value)
                } else {
                    Err(AgentError::Validation(format!(
                        "{} expects {:?}, got {}",
                        name, self.kind, value
                    )))
                }
            }
            ParamType::Any => Ok(value),
        }
    }
}

/// Parse numbers sent as strings; integers stay integers
pub fn coerce_number(value: &Value) -> Option<Value> {
    match value {
        Value::Number(_) | Value::Null => Some(value.clone()),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(i) = s.parse::<i64>() {
                Some(Value::from(i))
            } else {
                s.parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
            }
        }
        _ => None,
    }
}

/// `"null"` in a target reference is an explicit "no target"
pub fn normalize_target(value: Value) -> Value {
    match value {
        Value::String(s) if s.trim() == "null" => Value::Null,
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_number_from_string() {
        let spec = ParamSpec::new(ParamType::Number);
        assert_eq!(spec.coerce("distance", json!("3")).unwrap(), json!(3));
        assert_eq!(spec.coerce("distance", json!(" 2.5 ")).unwrap(), json!(2.5));
        assert_eq!(spec.coerce("distance", json!(4)).unwrap(), json!(4));
    }

    #[test]
    fn test_number_rejects_words() {
        let spec = ParamType::Number;
        assert!(ParamSpec::new(spec).coerce("distance", json!("far")).is_err());
        assert!(ParamSpec::new(spec).coerce("distance", json!([1])).is_err());
    }

    #[test]
    fn test_target_null_literal() {
        let spec = ParamSpec::new(ParamType::Target);
        assert_eq!(spec.coerce("playerName", json!("null")).unwrap(), Value::Null);
        assert_eq!(spec.coerce("playerName", json!("Alex")).unwrap(), json!("Alex"));
    }

    #[test]
    fn test_boolean_from_string() {
        let spec = ParamSpec::new(ParamType::Boolean);
        assert_eq!(spec.coerce("flag", json!("TRUE")).unwrap(), json!(true));
        assert!(spec.coerce("flag", json!("maybe")).is_err());
    }

    #[test]
    fn test_string_accepts_numbers() {
        let spec = ParamSpec::new(ParamType::String);
        assert_eq!(spec.coerce("treeType", json!(5)).unwrap(), json!("5"));
    }

    #[test]
    fn test_accepts_null_for_every_type() {
        for kind in [ParamType::String, ParamType::Number, ParamType::Object] {
            assert!(ParamSpec::new(kind).accepts(&Value::Null));
        }
        assert!(!ParamSpec::new(ParamType::List).accepts(&json!("x")));
    }
}
