//! Capability surface of the simulated world
//!
//! Movement, digging, combat and queries are owned by an external
//! collaborator. Long-running actions are issued once and then polled by id
//! from the controllers' tick, so nothing here blocks.

use crate::core::error::Result;
use crate::core::types::{BlockPos, DigId, EntityId, GoalId, Vec3};
use serde::{Deserialize, Serialize};

/// A block returned by a world query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub name: String,
    pub position: BlockPos,
}

/// Broad class of an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Player,
    Mob,
    /// Loose item lying on the ground
    Item,
    Other,
}

/// Point-in-time view of an entity; never cached across ticks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub id: EntityId,
    pub kind: EntityKind,
    /// Registry name (`zombie`, `oak_log`, `player`)
    pub name: String,
    pub display_name: Option<String>,
    pub username: Option<String>,
    pub position: Option<Vec3>,
    pub alive: bool,
}

impl EntitySnapshot {
    /// Lower-case, underscore-separated names this entity is known by
    pub fn categories(&self) -> impl Iterator<Item = String> + '_ {
        std::iter::once(self.name.as_str())
            .chain(self.display_name.as_deref())
            .map(|n| n.trim().to_lowercase().replace(' ', "_"))
    }
}

/// Progress of a travel goal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TravelStatus {
    InProgress,
    Arrived,
    /// A newer goal replaced this one
    Superseded,
    Failed(String),
}

/// Progress of a dig action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DigStatus {
    InProgress,
    Done,
    Failed(String),
}

/// One inventory slot's worth of items
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    pub name: String,
    pub count: u32,
}

/// Everything the controllers may ask of the world
pub trait WorldGateway {
    /// The agent's own entity
    fn agent_id(&self) -> EntityId;

    fn current_position(&self) -> Vec3;

    fn health(&self) -> f32;

    fn block_at(&self, pos: BlockPos) -> Option<Block>;

    fn entities_within_radius(&self, center: Vec3, radius: f64) -> Vec<EntitySnapshot>;

    fn entity_position(&self, id: EntityId) -> Option<Vec3>;

    /// Entity currently embodying a player, if the player is in range
    fn player_entity(&self, username: &str) -> Option<EntityId>;

    /// Set a travel goal, replacing (and superseding) any previous one
    fn travel_near(&mut self, target: Vec3, tolerance: f64) -> GoalId;

    fn travel_status(&self, goal: GoalId) -> TravelStatus;

    fn is_traveling(&self) -> bool;

    /// Drop the current travel goal, if any
    fn clear_goal(&mut self);

    fn dig(&mut self, pos: BlockPos) -> Result<DigId>;

    fn dig_status(&self, dig: DigId) -> DigStatus;

    fn strike(&mut self, target: EntityId) -> Result<()>;

    /// Hold the best item matching `tool`; `Ok(false)` when none is carried
    fn equip(&mut self, tool: &str) -> Result<bool>;

    fn inventory(&self) -> Vec<ItemStack>;

    /// Throw up to `count` of an item toward whoever the agent faces
    fn toss(&mut self, item: &str, count: u32) -> Result<u32>;
}
