//! Agent configuration with documented constants
//!
//! All tunable numbers live here. Timing is expressed in ticks of the
//! world's physics clock (`tick_rate_hz` ticks per second), so every
//! delay, cooldown and timeout advances with the same clock that drives
//! the controllers.

use crate::core::error::Result;
use serde::Deserialize;
use std::path::Path;

/// Top-level configuration for one agent process
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub agent: AgentSection,
    pub travel: TravelConfig,
    pub harvest: HarvestConfig,
    pub follow: FollowConfig,
    pub engage: EngageConfig,
    pub give: GiveConfig,
    pub llm: LlmConfig,
}

/// Identity and clock settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentSection {
    /// In-world name of the agent, also the `@mention` it answers to
    pub name: String,

    /// Physics ticks per second of the driving clock
    pub tick_rate_hz: u32,
}

/// Shared bounds for travel requests
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TravelConfig {
    /// Ticks a single travel request may take before it is abandoned
    ///
    /// At 20 Hz the default of 200 ticks is ten seconds.
    pub timeout_ticks: u64,
}

/// Harvester search and extraction settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    /// Units harvested when the command does not say how many
    pub max_units: u32,

    /// Horizontal half-extent of the search volume (blocks)
    pub search_radius: i32,

    /// Vertical half-extent of the search volume (blocks)
    ///
    /// Kept much smaller than `search_radius`: resources worth walking to
    /// are near the agent's own level.
    pub vertical_radius: i32,

    /// How close the agent must get to a node before extracting it
    pub travel_tolerance: f64,

    /// Pause after each extraction so loose drops can settle
    pub settle_ticks: u64,

    /// Radius around the agent scanned for freshly spawned drops
    pub pickup_radius: f64,

    /// Block names that count as harvestable resources
    pub resource_blocks: Vec<String>,
}

/// Follower settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FollowConfig {
    /// Distance kept from the followed entity when none is requested
    pub distance: f64,

    /// Extra slack before a new travel request is issued
    ///
    /// A new goal is only set when the target is further than
    /// `distance + hysteresis`, so the agent does not re-path every tick
    /// once it is in range.
    pub hysteresis: f64,
}

/// Courier settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GiveConfig {
    /// How close the agent walks to the recipient before tossing items
    pub approach_distance: f64,
}

/// Language model request settings
///
/// Endpoint, model name and key come from the environment; these only shape
/// each request.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Upper bound on reply length; replies are one short chat line
    pub max_tokens: u32,

    pub temperature: f32,

    /// Whole-request timeout in seconds
    pub timeout_secs: u64,
}

/// Engager scanning and striking settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngageConfig {
    /// Radius scanned for candidate targets
    pub radius: f64,

    /// Minimum ticks between two scans (5 ticks = a quarter second at 20 Hz)
    pub scan_interval_ticks: u64,

    /// Ticks between two strikes
    pub strike_cooldown_ticks: u64,

    /// Travel tolerance when closing in on a target
    pub approach_tolerance: f64,

    /// Consecutive empty scans tolerated before giving up
    pub max_empty_scans: u32,

    /// Tool equipped before striking when the command names none
    pub default_tool: String,

    /// Hostile categories (allow-list)
    pub hostile: Vec<String>,

    /// Prey categories (allow-list)
    pub prey: Vec<String>,

    /// Categories never engaged, even when also allow-listed
    pub dangerous: Vec<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            agent: AgentSection::default(),
            travel: TravelConfig::default(),
            harvest: HarvestConfig::default(),
            follow: FollowConfig::default(),
            engage: EngageConfig::default(),
            give: GiveConfig::default(),
            llm: LlmConfig::default(),
        }
    }
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            name: "Steward".into(),
            tick_rate_hz: 20,
        }
    }
}

impl Default for TravelConfig {
    fn default() -> Self {
        Self { timeout_ticks: 200 }
    }
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            max_units: 5,
            search_radius: 32,
            vertical_radius: 4,
            travel_tolerance: 2.0,
            settle_ticks: 10,
            pickup_radius: 5.0,
            resource_blocks: [
                "oak_log",
                "birch_log",
                "spruce_log",
                "jungle_log",
                "acacia_log",
                "dark_oak_log",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

impl Default for FollowConfig {
    fn default() -> Self {
        Self {
            distance: 2.0,
            hysteresis: 1.0,
        }
    }
}

impl Default for GiveConfig {
    fn default() -> Self {
        Self {
            approach_distance: 2.0,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            max_tokens: 512,
            temperature: 0.7,
            timeout_secs: 30,
        }
    }
}

impl Default for EngageConfig {
    fn default() -> Self {
        let names = |list: &[&str]| list.iter().map(|s| s.to_string()).collect();
        Self {
            radius: 50.0,
            scan_interval_ticks: 5,
            strike_cooldown_ticks: 20,
            approach_tolerance: 1.0,
            max_empty_scans: 40,
            default_tool: "sword".into(),
            hostile: names(&[
                "zombie",
                "husk",
                "drowned",
                "skeleton",
                "stray",
                "spider",
                "cave_spider",
                "slime",
                "witch",
                "pillager",
                "creeper",
            ]),
            prey: names(&["cow", "pig", "sheep", "chicken", "rabbit"]),
            dangerous: names(&[
                "creeper",
                "enderman",
                "warden",
                "wither",
                "ender_dragon",
                "ravager",
                "piglin_brute",
                "elder_guardian",
            ]),
        }
    }
}

impl AgentConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a TOML document; missing sections and keys keep their defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load a TOML file from disk
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.agent.tick_rate_hz == 0 {
            return Err("tick_rate_hz must be positive".into());
        }

        if self.harvest.max_units == 0 {
            return Err("harvest.max_units must be at least 1".into());
        }

        if self.harvest.search_radius <= 0 || self.harvest.vertical_radius < 0 {
            return Err(format!(
                "harvest search volume must be non-empty (radius {}, vertical {})",
                self.harvest.search_radius, self.harvest.vertical_radius
            ));
        }

        // The vertical band is the short axis of the search volume
        if self.harvest.vertical_radius > self.harvest.search_radius {
            return Err(format!(
                "harvest.vertical_radius ({}) should be <= search_radius ({})",
                self.harvest.vertical_radius, self.harvest.search_radius
            ));
        }

        if self.travel.timeout_ticks == 0 {
            return Err("travel.timeout_ticks must be positive".into());
        }

        if self.follow.distance < 0.0 || self.follow.hysteresis < 0.0 {
            return Err("follow distances must not be negative".into());
        }

        if self.give.approach_distance < 0.0 {
            return Err("give.approach_distance must not be negative".into());
        }

        if self.llm.max_tokens == 0 || self.llm.timeout_secs == 0 {
            return Err("llm.max_tokens and llm.timeout_secs must be positive".into());
        }

        if self.engage.scan_interval_ticks == 0 {
            return Err("engage.scan_interval_ticks must be positive".into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(AgentConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AgentConfig::from_toml_str(
            r#"
            [agent]
            name = "Birch"

            [harvest]
            max_units = 12
            "#,
        )
        .unwrap();

        assert_eq!(config.agent.name, "Birch");
        assert_eq!(config.agent.tick_rate_hz, 20);
        assert_eq!(config.harvest.max_units, 12);
        assert_eq!(config.harvest.search_radius, 32);
        assert_eq!(config.follow.distance, 2.0);
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        assert!(AgentConfig::from_toml_str("[harvest\nmax_units = 1").is_err());
    }

    #[test]
    fn test_validate_rejects_tall_search_volume() {
        let mut config = AgentConfig::default();
        config.harvest.vertical_radius = 40;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_creeper_is_both_hostile_and_dangerous() {
        let config = AgentConfig::default();
        assert!(config.engage.hostile.contains(&"creeper".to_string()));
        assert!(config.engage.dangerous.contains(&"creeper".to_string()));
    }
}
