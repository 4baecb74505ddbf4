//! Typed parameter records per capability
//!
//! The resolver produces a schema-complete parameter map; this module turns
//! that map into the record the matching controller consumes, filling
//! anything still absent from configuration.

use crate::capability::registry::Capability;
use crate::command::intent::Command;
use crate::core::config::AgentConfig;
use crate::core::error::{AgentError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which resource family members a harvest accepts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceFilter {
    Any,
    Kind(String),
}

impl ResourceFilter {
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            None | Some("") => Self::Any,
            Some(kind) if kind.eq_ignore_ascii_case("any") => Self::Any,
            Some(kind) => Self::Kind(kind.to_lowercase()),
        }
    }

    /// Whether `name` is a member of `family` accepted by this filter
    ///
    /// A kind matches the name itself or any name prefixed by `<kind>_`, so
    /// `oak` accepts `oak_log` but not `dark_oak_log`.
    pub fn matches(&self, name: &str, family: &[String]) -> bool {
        if !family.iter().any(|member| member == name) {
            return false;
        }
        match self {
            Self::Any => true,
            Self::Kind(kind) => {
                name == kind
                    || name
                        .strip_prefix(kind.as_str())
                        .is_some_and(|rest| rest.starts_with('_'))
            }
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Any => "any",
            Self::Kind(kind) => kind,
        }
    }
}

impl std::fmt::Display for ResourceFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Names an engagement accepts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NameFilter {
    Any,
    Names(Vec<String>),
}

impl NameFilter {
    /// Whether any of an entity's category names passes the filter
    pub fn accepts<I, S>(&self, categories: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        match self {
            Self::Any => true,
            Self::Names(names) => categories
                .into_iter()
                .any(|c| names.iter().any(|n| n == c.as_ref())),
        }
    }
}

/// What the engager is after
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSpec {
    pub entity_names: NameFilter,
    /// Always at least one
    pub count: u32,
}

impl Default for TargetSpec {
    fn default() -> Self {
        Self {
            entity_names: NameFilter::Any,
            count: 1,
        }
    }
}

impl TargetSpec {
    /// Read a target from the `target` parameter
    ///
    /// Accepts `{entityNames: [..] | "any", count}`, a bare name, a list of
    /// names, or nothing at all (any target, one kill).
    pub fn from_value(value: Option<&Value>) -> Self {
        let mut spec = Self::default();
        match value {
            Some(Value::Object(map)) => {
                let names = map
                    .get("entityNames")
                    .or_else(|| map.get("entityName"))
                    .or_else(|| map.get("names"));
                spec.entity_names = name_filter(names);
                if let Some(count) = map.get("count").and_then(Value::as_f64) {
                    spec.count = clamp_count(count);
                }
            }
            Some(other) => spec.entity_names = name_filter(Some(other)),
            None => {}
        }
        spec
    }

    pub fn describe(&self) -> String {
        match &self.entity_names {
            NameFilter::Any => "anything".into(),
            NameFilter::Names(names) => names.join(", "),
        }
    }
}

fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "_")
}

fn name_filter(value: Option<&Value>) -> NameFilter {
    match value {
        Some(Value::String(s)) if s.trim().eq_ignore_ascii_case("any") || s.trim().is_empty() => {
            NameFilter::Any
        }
        Some(Value::String(s)) => NameFilter::Names(vec![normalize_name(s)]),
        Some(Value::Array(items)) => {
            let names: Vec<String> = items
                .iter()
                .filter_map(Value::as_str)
                .map(normalize_name)
                .collect();
            if names.is_empty() || names.iter().any(|n| n == "any") {
                NameFilter::Any
            } else {
                NameFilter::Names(names)
            }
        }
        _ => NameFilter::Any,
    }
}

fn clamp_count(count: f64) -> u32 {
    if count.is_finite() && count >= 1.0 {
        count.min(u32::MAX as f64) as u32
    } else {
        1
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarvestParams {
    pub target_kind: ResourceFilter,
    pub max_units: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowParams {
    /// Username of the player to follow
    pub target: String,
    pub distance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngageParams {
    pub target: TargetSpec,
    pub tool: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GiveParams {
    pub recipient: String,
    pub item_kind: ResourceFilter,
    /// Cap per stack; `None` gives everything
    pub amount: Option<u32>,
}

/// A command decoded into the record its behavior consumes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Action {
    Harvest(HarvestParams),
    Follow(FollowParams),
    Engage(EngageParams),
    Give(GiveParams),
    Stop,
    Inventory { item_type: Option<String> },
}

impl Action {
    /// Decode a command using its capability's `action` mapping
    pub fn decode(capability: &Capability, command: &Command, config: &AgentConfig) -> Result<Self> {
        let action = capability.action.as_deref().ok_or_else(|| {
            AgentError::Configuration(format!(
                "capability {} has no action mapping",
                capability.name
            ))
        })?;

        match action {
            "harvest" => {
                let max_units = command
                    .param_f64("maxCount")
                    .map(clamp_count)
                    .unwrap_or(config.harvest.max_units);
                Ok(Self::Harvest(HarvestParams {
                    target_kind: ResourceFilter::parse(command.param_str("treeType")),
                    max_units,
                }))
            }
            "follow" => {
                let target = command
                    .param_str("playerName")
                    .or(command.issuer.as_deref())
                    .ok_or_else(|| AgentError::Validation("nobody to follow".into()))?;
                let distance = command
                    .param_f64("distance")
                    .filter(|d| d.is_finite() && *d >= 0.0)
                    .unwrap_or(config.follow.distance);
                Ok(Self::Follow(FollowParams {
                    target: target.to_string(),
                    distance,
                }))
            }
            "engage" => {
                let tool = command
                    .param_str("tool")
                    .filter(|t| !t.trim().is_empty())
                    .unwrap_or(config.engage.default_tool.as_str());
                Ok(Self::Engage(EngageParams {
                    target: TargetSpec::from_value(command.param("target")),
                    tool: tool.to_string(),
                }))
            }
            "give" => {
                let recipient = command
                    .issuer
                    .as_deref()
                    .ok_or_else(|| AgentError::Validation("nobody to give to".into()))?;
                let amount = command.param("amount").and_then(|v| match v {
                    Value::String(s) if s.eq_ignore_ascii_case("all") => None,
                    other => other.as_f64().map(clamp_count),
                });
                Ok(Self::Give(GiveParams {
                    recipient: recipient.to_string(),
                    item_kind: ResourceFilter::parse(command.param_str("woodType")),
                    amount,
                }))
            }
            "stop" => Ok(Self::Stop),
            "inventory" => {
                let item_type = command
                    .param_str("itemType")
                    .map(str::trim)
                    .filter(|t| !t.is_empty() && !t.eq_ignore_ascii_case("all"))
                    .map(str::to_lowercase);
                Ok(Self::Inventory { item_type })
            }
            other => Err(AgentError::Configuration(format!(
                "capability {} maps to unknown action {:?}",
                capability.name, other
            ))),
        }
    }

    /// Whether this action runs as a long-lived controller
    pub fn is_autonomous(&self) -> bool {
        matches!(
            self,
            Self::Harvest(_) | Self::Follow(_) | Self::Engage(_) | Self::Give(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::registry::CapabilityRegistry;
    use crate::command::intent::Parameters;
    use serde_json::json;

    fn decode(name: &str, params: Value, issuer: Option<&str>) -> Result<Action> {
        let registry = CapabilityRegistry::builtin().unwrap();
        let capability = registry.get(name).unwrap();
        let Value::Object(map) = params else {
            panic!("params must be an object");
        };
        let mut command = Command::new(name, map);
        if let Some(issuer) = issuer {
            command = command.with_issuer(issuer);
        }
        Action::decode(capability, &command, &AgentConfig::default())
    }

    #[test]
    fn test_resource_filter_matching() {
        let family = AgentConfig::default().harvest.resource_blocks;
        let oak = ResourceFilter::parse(Some("oak"));
        assert!(oak.matches("oak_log", &family));
        assert!(!oak.matches("dark_oak_log", &family));
        assert!(ResourceFilter::parse(Some("dark_oak")).matches("dark_oak_log", &family));
        assert!(ResourceFilter::Any.matches("birch_log", &family));
        assert!(!ResourceFilter::Any.matches("stone", &family));
        assert_eq!(ResourceFilter::parse(Some("ANY")), ResourceFilter::Any);
    }

    #[test]
    fn test_harvest_defaults_from_config() {
        let action = decode("findTrees", json!({"treeType": "any", "maxCount": null}), None).unwrap();
        assert_eq!(
            action,
            Action::Harvest(HarvestParams {
                target_kind: ResourceFilter::Any,
                max_units: 5,
            })
        );
    }

    #[test]
    fn test_follow_defaults_to_issuer() {
        let action = decode(
            "followPlayer",
            json!({"playerName": null, "distance": 4}),
            Some("Alex"),
        )
        .unwrap();
        assert_eq!(
            action,
            Action::Follow(FollowParams {
                target: "Alex".into(),
                distance: 4.0,
            })
        );

        let err = decode("followPlayer", json!({"playerName": null}), None).unwrap_err();
        assert!(matches!(err, AgentError::Validation(_)));
    }

    #[test]
    fn test_target_spec_shapes() {
        let spec = TargetSpec::from_value(Some(&json!({"entityNames": ["Zombie"], "count": 3})));
        assert_eq!(spec.entity_names, NameFilter::Names(vec!["zombie".into()]));
        assert_eq!(spec.count, 3);

        let spec = TargetSpec::from_value(Some(&json!({"entityNames": "any", "count": 0})));
        assert_eq!(spec.entity_names, NameFilter::Any);
        assert_eq!(spec.count, 1);

        let spec = TargetSpec::from_value(Some(&json!("cave spider")));
        assert_eq!(spec.entity_names, NameFilter::Names(vec!["cave_spider".into()]));

        assert_eq!(TargetSpec::from_value(None), TargetSpec::default());
    }

    #[test]
    fn test_give_amount() {
        let all = decode("giveWood", json!({"woodType": "any", "amount": "all"}), Some("Alex")).unwrap();
        let Action::Give(params) = all else {
            panic!("expected give");
        };
        assert_eq!(params.amount, None);

        let some = decode("giveWood", json!({"woodType": "oak", "amount": 10}), Some("Alex")).unwrap();
        let Action::Give(params) = some else {
            panic!("expected give");
        };
        assert_eq!(params.amount, Some(10));
        assert_eq!(params.item_kind, ResourceFilter::Kind("oak".into()));
    }

    #[test]
    fn test_missing_action_is_configuration_error() {
        let capability = Capability {
            name: "dance".into(),
            description: "Dance".into(),
            action: None,
            response: None,
            examples: vec![],
            params: Default::default(),
        };
        let command = Command::new("dance", Parameters::new());
        let err = Action::decode(&capability, &command, &AgentConfig::default()).unwrap_err();
        assert!(matches!(err, AgentError::Configuration(_)));

        let capability = Capability {
            action: Some("teleport".into()),
            ..capability
        };
        let err = Action::decode(&capability, &command, &AgentConfig::default()).unwrap_err();
        assert!(matches!(err, AgentError::Configuration(_)));
    }

    #[test]
    fn test_inventory_filter() {
        assert_eq!(
            decode("checkInventory", json!({"itemType": "all"}), None).unwrap(),
            Action::Inventory { item_type: None }
        );
        assert_eq!(
            decode("checkInventory", json!({"itemType": "Oak"}), None).unwrap(),
            Action::Inventory {
                item_type: Some("oak".into())
            }
        );
    }
}
