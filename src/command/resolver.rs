//! Intent resolution - converts model free text into a typed command
//!
//! Resolution never fails: broken arguments degrade to an empty argument
//! object, unknown function names degrade to conversation.

use crate::capability::registry::{Capability, CapabilityRegistry};
use crate::capability::schema::{coerce_number, normalize_target};
use crate::command::intent::{Command, Parameters, ResolvedIntent};
use crate::llm::parser::{find_function_call, parse_arguments};
use serde_json::Value;

/// Fields parsed as numbers wherever they appear in the arguments
const NUMERIC_FIELDS: [&str; 3] = ["distance", "maxCount", "count"];

/// Fields naming a target, where the string `"null"` means "no target"
const TARGET_FIELDS: [&str; 2] = ["target", "playerName"];

/// Resolves model text against the capability registry
pub struct IntentResolver<'a> {
    registry: &'a CapabilityRegistry,
}

impl<'a> IntentResolver<'a> {
    pub fn new(registry: &'a CapabilityRegistry) -> Self {
        Self { registry }
    }

    /// Resolve model text into an intent
    pub fn resolve(&self, model_text: &str) -> ResolvedIntent {
        if model_text.trim().is_empty() {
            return ResolvedIntent::Unparsable {
                reason: "empty model response".into(),
            };
        }

        let Some(call) = find_function_call(model_text) else {
            return ResolvedIntent::conversational(model_text);
        };

        let mut args = match parse_arguments(call.args) {
            Ok(args) => args,
            Err(e) => {
                tracing::warn!(function = call.name, "Could not parse parameters: {}", e);
                Parameters::new()
            }
        };
        coerce_known_fields(&mut args);

        let Some(capability) = self.registry.get(call.name) else {
            tracing::debug!(function = call.name, "Model called an unregistered function");
            return ResolvedIntent::conversational(model_text);
        };

        ResolvedIntent::Command(Command::new(
            capability.name.clone(),
            apply_schema(capability, args),
        ))
    }
}

/// Numeric coercion and target normalization by field name
fn coerce_known_fields(args: &mut Parameters) {
    for (name, value) in args.iter_mut() {
        if NUMERIC_FIELDS.contains(&name.as_str()) {
            if let Some(number) = coerce_number(value) {
                *value = number;
            }
        }
        if TARGET_FIELDS.contains(&name.as_str()) {
            *value = normalize_target(std::mem::take(value));
        }
        if let Value::Object(nested) = value {
            coerce_known_fields(nested);
        }
    }
}

/// Coerce supplied fields against the schema and fill the missing ones
///
/// Fields outside the schema are passed through untouched.
fn apply_schema(capability: &Capability, mut args: Parameters) -> Parameters {
    let mut parameters = Parameters::new();

    for (name, spec) in &capability.params {
        let default = || spec.default.clone().unwrap_or(Value::Null);
        let value = match args.remove(name) {
            Some(supplied) => match spec.coerce(name, supplied) {
                Ok(value) => value,
                Err(e) => {
                    tracing::warn!(capability = %capability.name, "{}; using default", e);
                    default()
                }
            },
            None => {
                if spec.required && spec.default.is_none() {
                    tracing::warn!(
                        capability = %capability.name,
                        "Required parameter '{}' missing",
                        name
                    );
                }
                default()
            }
        };
        parameters.insert(name.clone(), value);
    }

    parameters.extend(args);
    parameters
}
