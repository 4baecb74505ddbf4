//! Gather agent context for LLM prompts
//!
//! The model is told who is speaking and where the agent stands so it can
//! resolve "me", "here" and similar references.

use crate::core::types::Vec3;
use crate::world::gateway::WorldGateway;

/// Snapshot of the agent's situation at the moment a message arrives
#[derive(Debug, Clone, PartialEq)]
pub struct AgentContext {
    /// Player who sent the message
    pub speaker: String,
    pub agent_name: String,
    pub position: Vec3,
    pub health: f32,
}

impl AgentContext {
    /// Build a context from the current world state
    pub fn from_world(world: &dyn WorldGateway, agent_name: &str, speaker: &str) -> Self {
        Self {
            speaker: speaker.to_string(),
            agent_name: agent_name.to_string(),
            position: world.current_position(),
            health: world.health(),
        }
    }

    /// Context with no world attached
    pub fn empty(agent_name: &str) -> Self {
        Self {
            speaker: "unknown".into(),
            agent_name: agent_name.to_string(),
            position: Vec3::default(),
            health: 0.0,
        }
    }

    /// Generate a text summary of the context for LLM prompts
    pub fn summary(&self) -> String {
        let mut s = String::new();
        s.push_str(&format!("- Player speaking: {}\n", self.speaker));
        s.push_str(&format!("- Bot name: {}\n", self.agent_name));
        s.push_str(&format!("- Bot position: {}\n", self.position));
        s.push_str(&format!("- Bot health: {}\n", self.health.round() as i64));
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::sandbox::SandboxWorld;

    #[test]
    fn test_context_from_world() {
        let world = SandboxWorld::new("Steward", Vec3::new(10.4, 64.0, -3.6));
        let ctx = AgentContext::from_world(&world, "Steward", "Alex");
        assert_eq!(ctx.speaker, "Alex");
        assert_eq!(ctx.position, Vec3::new(10.4, 64.0, -3.6));
        assert_eq!(ctx.health, 20.0);
    }

    #[test]
    fn test_summary_rounds_position() {
        let mut ctx = AgentContext::empty("Steward");
        ctx.position = Vec3::new(10.4, 64.0, -3.6);
        ctx.health = 19.6;

        let summary = ctx.summary();
        assert!(summary.contains("Player speaking: unknown"));
        assert!(summary.contains("Bot position: 10, 64, -4"));
        assert!(summary.contains("Bot health: 20"));
    }
}
