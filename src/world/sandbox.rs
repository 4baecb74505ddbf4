//! In-memory world used by the demo binary and the tests
//!
//! Physics is deliberately simple: the agent walks in a straight line at a
//! fixed speed, digs take a fixed number of ticks, dug blocks drop one item
//! that is picked up when the agent walks over it, and strikes deal a fixed
//! amount of damage within reach.

use crate::core::error::{AgentError, Result};
use crate::core::types::{BlockPos, DigId, EntityId, GoalId, Tick, Vec3};
use crate::world::gateway::{
    Block, DigStatus, EntityKind, EntitySnapshot, ItemStack, TravelStatus, WorldGateway,
};
use ahash::{AHashMap, AHashSet};
use std::collections::BTreeMap;

/// Reach for digging and striking
const REACH: f64 = 4.5;

/// Distance at which loose items are picked up
const PICKUP_DISTANCE: f64 = 1.5;

/// Something that happened in the world during a step
#[derive(Debug, Clone, PartialEq)]
pub enum WorldEvent {
    EntityDied(EntityId),
    ItemPickedUp { name: String, count: u32 },
}

/// Side effects requested by the agent, recorded for inspection
#[derive(Debug, Clone, PartialEq)]
pub enum WorldAction {
    Travel { goal: GoalId, target: Vec3 },
    ClearGoal,
    Dig(BlockPos),
    Strike(EntityId),
    Equip(String),
    Toss { item: String, count: u32 },
}

#[derive(Debug, Clone)]
struct SandboxEntity {
    kind: EntityKind,
    name: String,
    display_name: Option<String>,
    username: Option<String>,
    position: Vec3,
    health: f32,
    alive: bool,
}

#[derive(Debug, Clone, Copy)]
struct ActiveGoal {
    id: GoalId,
    target: Vec3,
    tolerance: f64,
}

#[derive(Debug, Clone)]
struct DigJob {
    pos: BlockPos,
    remaining: u64,
    status: DigStatus,
}

/// A small deterministic world
pub struct SandboxWorld {
    pub current_tick: Tick,
    agent: EntityId,
    agent_name: String,
    position: Vec3,
    health: f32,
    /// Blocks per tick
    pub walk_speed: f64,
    /// Ticks needed to dig one block
    pub dig_ticks: u64,
    pub strike_damage: f32,
    blocks: AHashMap<BlockPos, String>,
    entities: BTreeMap<EntityId, SandboxEntity>,
    next_entity: u64,
    goal: Option<ActiveGoal>,
    goal_states: AHashMap<GoalId, TravelStatus>,
    next_goal: u64,
    unreachable: AHashSet<BlockPos>,
    unbreakable: AHashSet<BlockPos>,
    /// Every travel request fails at once (no path)
    travel_failing: bool,
    /// Every fallible request fails with a connection error
    disconnected: bool,
    digs: AHashMap<DigId, DigJob>,
    next_dig: u64,
    inventory: BTreeMap<String, u32>,
    equipped: Option<String>,
    pending_deaths: Vec<EntityId>,
    actions: Vec<WorldAction>,
}

impl SandboxWorld {
    pub fn new(agent_name: impl Into<String>, position: Vec3) -> Self {
        let agent_name = agent_name.into();
        let agent = EntityId(1);
        let mut entities = BTreeMap::new();
        entities.insert(
            agent,
            SandboxEntity {
                kind: EntityKind::Player,
                name: "player".into(),
                display_name: Some(agent_name.clone()),
                username: Some(agent_name.clone()),
                position,
                health: 20.0,
                alive: true,
            },
        );

        Self {
            current_tick: 0,
            agent,
            agent_name,
            position,
            health: 20.0,
            walk_speed: 0.5,
            dig_ticks: 4,
            strike_damage: 4.0,
            blocks: AHashMap::new(),
            entities,
            next_entity: 2,
            goal: None,
            goal_states: AHashMap::new(),
            next_goal: 1,
            unreachable: AHashSet::new(),
            unbreakable: AHashSet::new(),
            travel_failing: false,
            disconnected: false,
            digs: AHashMap::new(),
            next_dig: 1,
            inventory: BTreeMap::new(),
            equipped: None,
            pending_deaths: Vec::new(),
            actions: Vec::new(),
        }
    }

    pub fn agent_name(&self) -> &str {
        &self.agent_name
    }

    pub fn set_block(&mut self, pos: BlockPos, name: impl Into<String>) {
        self.blocks.insert(pos, name.into());
    }

    /// Stack `height` blocks of `name` starting at `base`
    pub fn place_tree(&mut self, base: BlockPos, name: &str, height: i32) {
        for dy in 0..height {
            self.set_block(base.offset(0, dy, 0), name);
        }
    }

    /// Block broken by someone other than the agent; nothing drops
    pub fn remove_block(&mut self, pos: BlockPos) {
        self.blocks.remove(&pos);
    }

    pub fn has_block(&self, pos: BlockPos) -> bool {
        self.blocks.contains_key(&pos)
    }

    /// Travel toward goals at this block never progresses
    pub fn mark_unreachable(&mut self, pos: BlockPos) {
        self.unreachable.insert(pos);
    }

    /// Digging this block is refused
    pub fn mark_unbreakable(&mut self, pos: BlockPos) {
        self.unbreakable.insert(pos);
    }

    /// While set, travel requests fail immediately
    pub fn set_travel_failing(&mut self, failing: bool) {
        self.travel_failing = failing;
    }

    /// Drop the connection: every later dig, strike, equip or toss fails
    pub fn disconnect(&mut self) {
        self.disconnected = true;
    }

    fn check_connected(&self) -> Result<()> {
        if self.disconnected {
            return Err(AgentError::IoError(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "world connection lost",
            )));
        }
        Ok(())
    }

    /// Goal and dig records currently held
    pub fn tracked_requests(&self) -> (usize, usize) {
        (self.goal_states.len(), self.digs.len())
    }

    fn spawn(&mut self, entity: SandboxEntity) -> EntityId {
        let id = EntityId(self.next_entity);
        self.next_entity += 1;
        self.entities.insert(id, entity);
        id
    }

    pub fn spawn_player(&mut self, username: &str, position: Vec3) -> EntityId {
        self.spawn(SandboxEntity {
            kind: EntityKind::Player,
            name: "player".into(),
            display_name: Some(username.into()),
            username: Some(username.into()),
            position,
            health: 20.0,
            alive: true,
        })
    }

    pub fn spawn_mob(&mut self, name: &str, position: Vec3, health: f32) -> EntityId {
        let display = name
            .split('_')
            .map(|w| {
                let mut chars = w.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => String::new(),
                }
            })
            .collect::<Vec<String>>()
            .join(" ");
        self.spawn(SandboxEntity {
            kind: EntityKind::Mob,
            name: name.into(),
            display_name: Some(display),
            username: None,
            position,
            health,
            alive: true,
        })
    }

    pub fn spawn_item(&mut self, name: &str, position: Vec3) -> EntityId {
        self.spawn(SandboxEntity {
            kind: EntityKind::Item,
            name: name.into(),
            display_name: None,
            username: None,
            position,
            health: 1.0,
            alive: true,
        })
    }

    pub fn move_entity(&mut self, id: EntityId, position: Vec3) {
        if let Some(entity) = self.entities.get_mut(&id) {
            entity.position = position;
        }
    }

    /// Remove an entity without a death notification (player logged off)
    pub fn remove_entity(&mut self, id: EntityId) {
        self.entities.remove(&id);
    }

    /// Kill an entity; the death is reported on the next step
    pub fn kill(&mut self, id: EntityId) {
        if let Some(entity) = self.entities.get_mut(&id) {
            if entity.alive {
                entity.alive = false;
                entity.health = 0.0;
                self.pending_deaths.push(id);
            }
        }
    }

    pub fn is_alive(&self, id: EntityId) -> bool {
        self.entities.get(&id).is_some_and(|e| e.alive)
    }

    pub fn give_item(&mut self, name: &str, count: u32) {
        *self.inventory.entry(name.to_string()).or_insert(0) += count;
    }

    pub fn item_count(&self, name: &str) -> u32 {
        self.inventory.get(name).copied().unwrap_or(0)
    }

    pub fn equipped(&self) -> Option<&str> {
        self.equipped.as_deref()
    }

    /// Everything the agent asked the world to do, oldest first
    pub fn actions(&self) -> &[WorldAction] {
        &self.actions
    }

    pub fn travel_requests(&self) -> usize {
        self.actions
            .iter()
            .filter(|a| matches!(a, WorldAction::Travel { .. }))
            .count()
    }

    pub fn clear_actions(&mut self) {
        self.actions.clear();
    }

    fn sync_agent_entity(&mut self) {
        if let Some(entity) = self.entities.get_mut(&self.agent) {
            entity.position = self.position;
        }
    }

    /// Advance the world by one tick
    pub fn step(&mut self) -> Vec<WorldEvent> {
        self.current_tick += 1;
        let mut events = Vec::new();

        self.step_travel();
        self.step_digs();
        self.step_pickups(&mut events);

        for id in self.pending_deaths.drain(..) {
            self.entities.remove(&id);
            events.push(WorldEvent::EntityDied(id));
        }

        events
    }

    fn step_travel(&mut self) {
        let Some(goal) = self.goal else {
            return;
        };
        if self.unreachable.contains(&goal.target.block()) {
            return;
        }

        let to_target = goal.target - self.position;
        let distance = to_target.length();
        if distance > goal.tolerance {
            let step = self.walk_speed.min(distance - goal.tolerance);
            self.position = self.position + to_target.normalize() * step;
            self.sync_agent_entity();
        }

        if self.position.distance(&goal.target) <= goal.tolerance + 1e-6 {
            self.goal_states.insert(goal.id, TravelStatus::Arrived);
            self.goal = None;
        }
    }

    fn step_digs(&mut self) {
        let mut finished = Vec::new();
        for job in self.digs.values_mut() {
            if job.status != DigStatus::InProgress {
                continue;
            }
            job.remaining = job.remaining.saturating_sub(1);
            if job.remaining == 0 {
                finished.push(job.pos);
            }
        }

        for pos in finished {
            let status = match self.blocks.remove(&pos) {
                Some(name) => {
                    self.spawn_item(&name, pos.center().offset(0.0, -0.5, 0.0));
                    DigStatus::Done
                }
                None => DigStatus::Failed("block vanished".into()),
            };
            for job in self.digs.values_mut() {
                if job.pos == pos && job.status == DigStatus::InProgress && job.remaining == 0 {
                    job.status = status.clone();
                }
            }
        }
    }

    fn step_pickups(&mut self, events: &mut Vec<WorldEvent>) {
        let position = self.position;
        let picked: Vec<(EntityId, String)> = self
            .entities
            .iter()
            .filter(|(_, e)| e.kind == EntityKind::Item && e.position.distance(&position) <= PICKUP_DISTANCE)
            .map(|(id, e)| (*id, e.name.clone()))
            .collect();

        for (id, name) in picked {
            self.entities.remove(&id);
            self.give_item(&name, 1);
            events.push(WorldEvent::ItemPickedUp { name, count: 1 });
        }
    }

    fn snapshot(&self, id: EntityId, entity: &SandboxEntity) -> EntitySnapshot {
        EntitySnapshot {
            id,
            kind: entity.kind,
            name: entity.name.clone(),
            display_name: entity.display_name.clone(),
            username: entity.username.clone(),
            position: Some(entity.position),
            alive: entity.alive,
        }
    }
}

impl WorldGateway for SandboxWorld {
    fn agent_id(&self) -> EntityId {
        self.agent
    }

    fn current_position(&self) -> Vec3 {
        self.position
    }

    fn health(&self) -> f32 {
        self.health
    }

    fn block_at(&self, pos: BlockPos) -> Option<Block> {
        self.blocks.get(&pos).map(|name| Block {
            name: name.clone(),
            position: pos,
        })
    }

    fn entities_within_radius(&self, center: Vec3, radius: f64) -> Vec<EntitySnapshot> {
        self.entities
            .iter()
            .filter(|(_, e)| e.position.distance(&center) <= radius)
            .map(|(id, e)| self.snapshot(*id, e))
            .collect()
    }

    fn entity_position(&self, id: EntityId) -> Option<Vec3> {
        self.entities
            .get(&id)
            .filter(|e| e.alive)
            .map(|e| e.position)
    }

    fn player_entity(&self, username: &str) -> Option<EntityId> {
        self.entities
            .iter()
            .find(|(_, e)| e.kind == EntityKind::Player && e.username.as_deref() == Some(username))
            .map(|(id, _)| *id)
    }

    fn travel_near(&mut self, target: Vec3, tolerance: f64) -> GoalId {
        // Only the newest goal is tracked; older ids read as superseded
        self.goal = None;
        self.goal_states.clear();

        let id = GoalId(self.next_goal);
        self.next_goal += 1;
        self.actions.push(WorldAction::Travel { goal: id, target });

        if self.travel_failing {
            self.goal_states.insert(id, TravelStatus::Failed("no path".into()));
        } else if self.position.distance(&target) <= tolerance {
            self.goal_states.insert(id, TravelStatus::Arrived);
        } else {
            self.goal_states.insert(id, TravelStatus::InProgress);
            self.goal = Some(ActiveGoal {
                id,
                target,
                tolerance,
            });
        }
        id
    }

    fn travel_status(&self, goal: GoalId) -> TravelStatus {
        match self.goal_states.get(&goal) {
            Some(status) => status.clone(),
            None if goal.0 < self.next_goal => TravelStatus::Superseded,
            None => TravelStatus::Failed(format!("unknown {}", goal)),
        }
    }

    fn is_traveling(&self) -> bool {
        self.goal.is_some()
    }

    fn clear_goal(&mut self) {
        if let Some(goal) = self.goal.take() {
            self.goal_states.remove(&goal.id);
            self.actions.push(WorldAction::ClearGoal);
        }
    }

    fn dig(&mut self, pos: BlockPos) -> Result<DigId> {
        self.check_connected()?;
        if !self.blocks.contains_key(&pos) {
            return Err(AgentError::ActionFailed(format!("no block at {}", pos)));
        }
        if self.position.distance(&pos.center()) > REACH {
            return Err(AgentError::ActionFailed(format!("{} is out of reach", pos)));
        }
        if self.unbreakable.contains(&pos) {
            return Err(AgentError::ActionFailed(format!("{} cannot be broken", pos)));
        }

        // Finished digs are forgotten once a new one is issued
        self.digs.retain(|_, job| job.status == DigStatus::InProgress);
        let id = DigId(self.next_dig);
        self.next_dig += 1;
        self.digs.insert(
            id,
            DigJob {
                pos,
                remaining: self.dig_ticks.max(1),
                status: DigStatus::InProgress,
            },
        );
        self.actions.push(WorldAction::Dig(pos));
        Ok(id)
    }

    fn dig_status(&self, dig: DigId) -> DigStatus {
        self.digs
            .get(&dig)
            .map(|job| job.status.clone())
            .unwrap_or_else(|| DigStatus::Failed(format!("unknown {}", dig)))
    }

    fn strike(&mut self, target: EntityId) -> Result<()> {
        self.check_connected()?;
        self.actions.push(WorldAction::Strike(target));
        let position = self.position;
        let damage = self.strike_damage;

        let entity = self
            .entities
            .get_mut(&target)
            .filter(|e| e.alive)
            .ok_or(AgentError::EntityNotFound(target))?;
        if entity.position.distance(&position) > REACH {
            return Err(AgentError::ActionFailed(format!("{} is out of reach", target)));
        }

        entity.health -= damage;
        if entity.health <= 0.0 {
            entity.alive = false;
            self.pending_deaths.push(target);
        }
        Ok(())
    }

    fn equip(&mut self, tool: &str) -> Result<bool> {
        self.check_connected()?;
        let held = self
            .inventory
            .iter()
            .find(|(name, count)| **count > 0 && name.contains(tool))
            .map(|(name, _)| name.clone());

        match held {
            Some(name) => {
                self.actions.push(WorldAction::Equip(name.clone()));
                self.equipped = Some(name);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn inventory(&self) -> Vec<ItemStack> {
        self.inventory
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(name, count)| ItemStack {
                name: name.clone(),
                count: *count,
            })
            .collect()
    }

    fn toss(&mut self, item: &str, count: u32) -> Result<u32> {
        self.check_connected()?;
        let held = self.inventory.get_mut(item).filter(|c| **c > 0).ok_or_else(|| {
            AgentError::ActionFailed(format!("not carrying any {}", item))
        })?;

        let tossed = count.min(*held);
        *held -= tossed;
        if *held == 0 {
            self.inventory.remove(item);
        }
        self.actions.push(WorldAction::Toss {
            item: item.to_string(),
            count: tossed,
        });
        Ok(tossed)
    }
}
