//! Capability registry - the static table of intents advertised to the model
//!
//! Loaded once from the capability document and never mutated afterwards.
//! The prompt builder walks it in document order; the resolver looks
//! capabilities up by name.

use crate::capability::responses::{ResponseKind, ResponseTemplates};
use crate::capability::schema::ParamSpec;
use crate::core::error::{AgentError, Result};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Capability document shipped with the crate
pub const BUILTIN_DOCUMENT: &str = include_str!("../../data/capabilities.toml");

/// Static descriptor of one capability
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capability {
    /// Unique key, also the function name the model calls
    pub name: String,
    pub description: String,
    /// Behavior this capability maps to (`harvest`, `follow`, ...)
    #[serde(default)]
    pub action: Option<String>,
    /// Acknowledgement category
    #[serde(default)]
    pub response: Option<ResponseKind>,
    /// Example phrasings, used for prompt construction only
    #[serde(default)]
    pub examples: Vec<String>,
    #[serde(default)]
    pub params: BTreeMap<String, ParamSpec>,
}

/// Who the agent presents itself as in prompts
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Persona {
    pub name: String,
    pub description: String,
}

#[derive(Deserialize)]
struct CapabilityDocument {
    #[serde(default)]
    persona: Persona,
    #[serde(default)]
    capabilities: Vec<Capability>,
    #[serde(default)]
    responses: BTreeMap<String, Vec<String>>,
}

/// Read-only lookup table of capabilities
#[derive(Debug, Clone)]
pub struct CapabilityRegistry {
    persona: Persona,
    capabilities: Vec<Capability>,
    index: AHashMap<String, usize>,
    responses: ResponseTemplates,
}

impl CapabilityRegistry {
    /// Registry built from the document embedded in the binary
    pub fn builtin() -> Result<Self> {
        Self::from_toml_str(BUILTIN_DOCUMENT)
    }

    /// Load a capability document from disk
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate a capability document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let document: CapabilityDocument = toml::from_str(content)?;

        let mut responses = ResponseTemplates::new();
        for (key, phrases) in document.responses {
            match serde_json::from_value::<ResponseKind>(serde_json::Value::String(key.clone())) {
                Ok(kind) => responses.insert(kind, phrases),
                Err(_) => tracing::warn!("Ignoring unknown response category '{}'", key),
            }
        }

        Self::new(document.persona, document.capabilities, responses)
    }

    /// Build a registry, rejecting duplicate names and ill-typed defaults
    pub fn new(
        persona: Persona,
        capabilities: Vec<Capability>,
        responses: ResponseTemplates,
    ) -> Result<Self> {
        let mut index = AHashMap::new();

        for (i, capability) in capabilities.iter().enumerate() {
            if index.insert(capability.name.clone(), i).is_some() {
                return Err(AgentError::Configuration(format!(
                    "duplicate capability '{}'",
                    capability.name
                )));
            }

            for (param, spec) in &capability.params {
                if let Some(default) = &spec.default {
                    if !spec.accepts(default) {
                        return Err(AgentError::Configuration(format!(
                            "{}.{}: default {} is not a {:?}",
                            capability.name, param, default, spec.kind
                        )));
                    }
                }
            }
        }

        Ok(Self {
            persona,
            capabilities,
            index,
            responses,
        })
    }

    pub fn get(&self, name: &str) -> Option<&Capability> {
        self.index.get(name).map(|&i| &self.capabilities[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// All capabilities in document order
    pub fn iter(&self) -> impl Iterator<Item = &Capability> {
        self.capabilities.iter()
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }

    pub fn persona(&self) -> &Persona {
        &self.persona
    }

    pub fn responses(&self) -> &ResponseTemplates {
        &self.responses
    }

    /// Response category for a capability, `Greetings` when unmapped
    pub fn response_template_kind(&self, name: &str) -> ResponseKind {
        self.get(name)
            .and_then(|c| c.response)
            .unwrap_or(ResponseKind::Greetings)
    }
}
