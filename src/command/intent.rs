//! Result of resolving model text

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Coerced parameters of a command, keyed by schema field name
pub type Parameters = Map<String, Value>;

/// What a piece of model text means
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResolvedIntent {
    /// Plain conversation, carried verbatim
    Conversational { text: String },
    /// A call to a registered capability
    Command(Command),
    /// Nothing usable came back from the model
    Unparsable { reason: String },
}

impl ResolvedIntent {
    pub fn conversational(text: impl Into<String>) -> Self {
        Self::Conversational { text: text.into() }
    }

    pub fn is_command(&self) -> bool {
        matches!(self, Self::Command(_))
    }

    pub fn as_command(&self) -> Option<&Command> {
        match self {
            Self::Command(command) => Some(command),
            _ => None,
        }
    }

    /// Attach the requester's identity to a command
    pub fn issued_by(self, issuer: impl Into<String>) -> Self {
        match self {
            Self::Command(command) => Self::Command(command.with_issuer(issuer)),
            other => other,
        }
    }
}

/// A validated call to a capability
///
/// Every field declared by the capability's schema is present in
/// `parameters`, either as supplied (after coercion) or as its default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub capability: String,
    pub parameters: Parameters,
    pub issuer: Option<String>,
}

impl Command {
    pub fn new(capability: impl Into<String>, parameters: Parameters) -> Self {
        Self {
            capability: capability.into(),
            parameters,
            issuer: None,
        }
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    pub fn param(&self, name: &str) -> Option<&Value> {
        self.parameters.get(name).filter(|v| !v.is_null())
    }

    pub fn param_str(&self, name: &str) -> Option<&str> {
        self.param(name).and_then(Value::as_str)
    }

    pub fn param_f64(&self, name: &str) -> Option<f64> {
        self.param(name).and_then(Value::as_f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_issued_by_only_touches_commands() {
        let cmd = ResolvedIntent::Command(Command::new("stopAction", Parameters::new()));
        let cmd = cmd.issued_by("Alex");
        assert_eq!(cmd.as_command().unwrap().issuer.as_deref(), Some("Alex"));

        let chat = ResolvedIntent::conversational("hi").issued_by("Alex");
        assert_eq!(chat, ResolvedIntent::conversational("hi"));
    }

    #[test]
    fn test_null_params_read_as_absent() {
        let mut params = Parameters::new();
        params.insert("playerName".into(), Value::Null);
        params.insert("distance".into(), json!(3));
        let cmd = Command::new("followPlayer", params);

        assert!(cmd.param("playerName").is_none());
        assert_eq!(cmd.param_f64("distance"), Some(3.0));
    }

    #[test]
    fn test_intent_serialization_is_tagged() {
        let json = serde_json::to_value(ResolvedIntent::conversational("hello")).unwrap();
        assert_eq!(json, json!({"kind": "conversational", "text": "hello"}));
    }
}
