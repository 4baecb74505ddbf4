//! Prompt construction
//!
//! The prompt advertises every registered capability as a callable function
//! and asks the model to answer with `functionName({...})` when one matches.

use crate::capability::registry::{Capability, CapabilityRegistry};
use crate::llm::context::AgentContext;
use serde_json::{json, Map, Value};

const INSTRUCTIONS: &str = "\
If the user's request matches one of the available functions, respond with a natural message that includes the function call in this format: functionName({\"param\": \"value\"})
Otherwise, respond naturally without any function calls.

Remember:
1. Use the current context when you respond
2. Include the complete function call with parameters if applicable
3. Keep responses short and friendly
4. Stay in character as a helpful bot
5. Use the most specific function for the user's request";

/// A prompt ready to hand to a language model
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
    /// The raw chat message the prompt was built for
    pub message: String,
}

/// Function definition advertised to the model
fn function_definition(capability: &Capability) -> Value {
    let properties: Map<String, Value> = capability
        .params
        .iter()
        .map(|(name, spec)| {
            let mut property = Map::new();
            property.insert("type".into(), json!(spec.kind));
            if !spec.description.is_empty() {
                property.insert("description".into(), json!(spec.description));
            }
            if let Some(default) = &spec.default {
                property.insert("default".into(), default.clone());
            }
            (name.clone(), Value::Object(property))
        })
        .collect();

    let required: Vec<&str> = capability
        .params
        .iter()
        .filter(|(_, spec)| spec.required)
        .map(|(name, _)| name.as_str())
        .collect();

    json!({
        "name": capability.name,
        "description": capability.description,
        "parameters": {
            "type": "object",
            "properties": properties,
            "required": required,
        }
    })
}

/// One example call, arguments taken from the declared defaults
fn example_call(capability: &Capability) -> String {
    let args: Map<String, Value> = capability
        .params
        .iter()
        .map(|(name, spec)| (name.clone(), spec.default.clone().unwrap_or(Value::Null)))
        .collect();
    let example = capability.examples.first().map(String::as_str).unwrap_or("");

    format!(
        "{}({}) - Example: \"{}\"",
        capability.name,
        Value::Object(args),
        example
    )
}

/// Build the prompt for one chat message
pub fn build_prompt(registry: &CapabilityRegistry, context: &AgentContext, message: &str) -> Prompt {
    let persona = registry.persona();
    let definitions: Vec<Value> = registry.iter().map(function_definition).collect();
    let listing =
        serde_json::to_string_pretty(&definitions).unwrap_or_else(|_| "[]".to_string());
    let examples: Vec<String> = registry.iter().map(example_call).collect();

    let system = format!(
        "You are {}, {}.\n\nAvailable functions:\n{}\n\nExample function calls:\n{}\n\n{}",
        persona.name,
        persona.description,
        listing,
        examples.join("\n"),
        INSTRUCTIONS
    );

    let user = format!(
        "Current context:\n{}\nUser message: \"{}\"",
        context.summary(),
        message
    );

    Prompt {
        system,
        user,
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prompt(message: &str) -> Prompt {
        let registry = CapabilityRegistry::builtin().unwrap();
        let mut context = AgentContext::empty("Steward");
        context.speaker = "Alex".into();
        build_prompt(&registry, &context, message)
    }

    #[test]
    fn test_prompt_lists_every_capability() {
        let registry = CapabilityRegistry::builtin().unwrap();
        let prompt = prompt("@Steward chop some trees");
        for capability in registry.iter() {
            assert!(prompt.system.contains(&format!("\"name\": \"{}\"", capability.name)));
        }
        assert!(prompt.system.starts_with("You are Steward,"));
    }

    #[test]
    fn test_example_call_uses_defaults_and_first_example() {
        let prompt = prompt("hi");
        assert!(prompt
            .system
            .contains("followPlayer({\"distance\":2,\"playerName\":null}) - Example: \"follow me\""));
        assert!(prompt.system.contains("stopAction({}) - Example: \"stop\""));
    }

    #[test]
    fn test_user_part_carries_context_and_message() {
        let prompt = prompt("@Steward follow me");
        assert!(prompt.user.contains("Player speaking: Alex"));
        assert!(prompt.user.ends_with("User message: \"@Steward follow me\""));
        assert_eq!(prompt.message, "@Steward follow me");
    }
}
