//! Engager - fight hostile mobs and hunt prey
//!
//! Target selection is a pure function over an entity snapshot so that the
//! allow/deny rules can be checked in isolation. Kills are counted from the
//! world's death notifications, independently of the scan loop.

use crate::command::action::{EngageParams, TargetSpec};
use crate::command::events::{AgentEvent, EventSink};
use crate::controller::{
    Controller, ControllerKind, ControllerState, EndReason, Outcome, Phase, Report, TickContext,
};
use crate::core::config::EngageConfig;
use crate::core::error::{AgentError, Result};
use crate::core::types::{EntityId, Tick, Vec3};
use crate::world::gateway::EntitySnapshot;
use ordered_float::OrderedFloat;

/// Entities worth engaging, nearest first
///
/// An entity qualifies when it is alive, has a position, is not the agent,
/// lies within `config.radius`, passes the name filter and is allow-listed
/// (hostile or prey). The deny-list wins over the allow-list.
pub fn select_targets(
    entities: &[EntitySnapshot],
    agent: EntityId,
    origin: Vec3,
    spec: &TargetSpec,
    config: &EngageConfig,
) -> Vec<EntitySnapshot> {
    let mut targets: Vec<(OrderedFloat<f64>, &EntitySnapshot)> = entities
        .iter()
        .filter(|e| e.alive && e.id != agent)
        .filter_map(|e| {
            let distance = e.position?.distance(&origin);
            (distance <= config.radius).then_some((OrderedFloat(distance), e))
        })
        .filter(|(_, e)| {
            let categories: Vec<String> = e.categories().collect();
            if listed(&config.dangerous, &categories) {
                return false;
            }
            let allowed = listed(&config.hostile, &categories) || listed(&config.prey, &categories);
            allowed && spec.entity_names.accepts(&categories)
        })
        .collect();

    targets.sort_by_key(|(distance, _)| *distance);
    targets.into_iter().map(|(_, e)| e.clone()).collect()
}

fn listed(list: &[String], categories: &[String]) -> bool {
    categories.iter().any(|c| list.iter().any(|l| l == c))
}

/// Engager controller
#[derive(Default)]
pub struct Engager {
    state: ControllerState,
    params: Option<EngageParams>,
    kills: u32,
    target: Option<EntityId>,
    last_scan: Option<Tick>,
    /// Earliest tick the next strike may be issued
    next_strike: Tick,
    empty_scans: u32,
}

impl Engager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kills(&self) -> u32 {
        self.kills
    }

    pub fn current_target(&self) -> Option<EntityId> {
        self.target
    }

    /// Begin engaging; a finished fight awaiting its report is closed first
    pub fn start(&mut self, params: EngageParams, ctx: &mut TickContext<'_>) -> Result<()> {
        match self.state.phase {
            Phase::Running => {
                return Err(AgentError::AlreadyActive("I'm already in combat!".into()));
            }
            Phase::Stopping => {
                self.stop(ctx);
            }
            Phase::Idle => {}
        }

        tracing::info!(
            targets = %params.target.describe(),
            count = params.target.count,
            tool = %params.tool,
            tick = ctx.tick,
            "Engaging"
        );
        ctx.events.emit(AgentEvent::Started {
            controller: ControllerKind::Engager,
            tick: ctx.tick,
            detail: format!("{} x{}", params.target.describe(), params.target.count),
        });

        self.params = Some(params);
        self.kills = 0;
        self.target = None;
        self.last_scan = None;
        self.next_strike = ctx.tick;
        self.empty_scans = 0;
        self.state.begin(ctx.tick);
        Ok(())
    }

    /// Death notification from the world
    ///
    /// Only the tracked target counts. Reaching the desired count moves the
    /// controller to `Stopping`; the next tick reports success.
    pub fn on_entity_died(&mut self, id: EntityId, events: &EventSink, tick: Tick) -> bool {
        if self.state.phase != Phase::Running || self.target != Some(id) {
            return false;
        }

        self.kills += 1;
        self.target = None;
        let desired = self.desired();
        tracing::info!(entity = %id, kills = self.kills, desired, "Target killed");
        events.emit(AgentEvent::Progress {
            controller: ControllerKind::Engager,
            tick,
            detail: format!("Killed {}/{}", self.kills, desired),
        });

        if self.kills >= desired {
            self.state.phase = Phase::Stopping;
        }
        true
    }

    fn desired(&self) -> u32 {
        self.params.as_ref().map_or(1, |p| p.target.count)
    }

    fn report(&self) -> Report {
        Report::Engage {
            kills: self.kills,
            desired: self.desired(),
        }
    }

    fn success(&self) -> Outcome {
        Outcome::new(true, EndReason::Completed, self.report())
    }
}

impl Controller for Engager {
    fn kind(&self) -> ControllerKind {
        ControllerKind::Engager
    }

    fn phase(&self) -> Phase {
        self.state.phase
    }

    fn step(&mut self, ctx: &mut TickContext<'_>) -> Result<Option<Outcome>> {
        if self.state.phase == Phase::Stopping {
            return Ok(Some(self.success()));
        }

        let config = &ctx.config.engage;
        if let Some(last) = self.last_scan {
            if ctx.tick.saturating_sub(last) < config.scan_interval_ticks {
                return Ok(None);
            }
        }
        self.last_scan = Some(ctx.tick);

        let params = self
            .params
            .as_ref()
            .ok_or_else(|| AgentError::Unexpected("engager running without a target".into()))?;

        let origin = ctx.world.current_position();
        let nearby = ctx.world.entities_within_radius(origin, config.radius);
        let targets = select_targets(&nearby, ctx.world.agent_id(), origin, &params.target, config);

        let Some(target) = targets.first() else {
            self.target = None;
            if self.kills >= params.target.count {
                return Ok(Some(self.success()));
            }
            self.empty_scans += 1;
            if self.empty_scans >= config.max_empty_scans {
                tracing::info!(scans = self.empty_scans, "No valid targets in range");
                return Ok(Some(Outcome::new(false, EndReason::NoTargets, self.report())));
            }
            return Ok(None);
        };

        self.empty_scans = 0;
        self.target = Some(target.id);
        if ctx.tick < self.next_strike {
            return Ok(None);
        }

        match ctx.world.equip(&params.tool) {
            Ok(true) => {}
            Ok(false) => tracing::debug!(tool = %params.tool, "No matching tool, striking bare-handed"),
            Err(e) if !e.is_recoverable() => return Err(e),
            Err(e) => tracing::warn!(tool = %params.tool, error = %e, "Could not equip tool"),
        }

        if let Some(position) = target.position {
            ctx.world.travel_near(position, config.approach_tolerance);
        }
        match ctx.world.strike(target.id) {
            Ok(()) => {}
            Err(e) if !e.is_recoverable() => return Err(e),
            Err(e) => tracing::debug!(target = %target.id, error = %e, "Strike missed"),
        }
        self.next_strike = ctx.tick + config.strike_cooldown_ticks;
        Ok(None)
    }

    fn failure(&self, error: &AgentError) -> Outcome {
        Outcome::new(false, EndReason::Fault(error.to_string()), self.report())
    }

    fn reset(&mut self) {
        *self = Self::default();
    }

    /// A pending success is reported rather than discarded
    fn stop(&mut self, ctx: &mut TickContext<'_>) -> bool {
        match self.state.phase {
            Phase::Idle => false,
            Phase::Stopping => {
                let outcome = self.success();
                ctx.world.clear_goal();
                self.reset();
                ctx.events.emit(AgentEvent::Completed {
                    controller: ControllerKind::Engager,
                    tick: ctx.tick,
                    outcome,
                });
                true
            }
            Phase::Running => {
                ctx.world.clear_goal();
                self.reset();
                ctx.events.emit(AgentEvent::Stopped {
                    controller: ControllerKind::Engager,
                    tick: ctx.tick,
                });
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::action::NameFilter;
    use crate::core::config::AgentConfig;
    use crate::world::gateway::EntityKind;

    fn mob(id: u64, name: &str, x: f64) -> EntitySnapshot {
        EntitySnapshot {
            id: EntityId(id),
            kind: EntityKind::Mob,
            name: name.into(),
            display_name: None,
            username: None,
            position: Some(Vec3::new(x, 64.0, 0.0)),
            alive: true,
        }
    }

    fn ids(targets: &[EntitySnapshot]) -> Vec<u64> {
        targets.iter().map(|t| t.id.0).collect()
    }

    #[test]
    fn test_targets_sorted_by_distance() {
        let config = AgentConfig::default().engage;
        let entities = vec![mob(2, "zombie", 10.0), mob(3, "cow", 3.0), mob(4, "skeleton", 6.0)];
        let targets = select_targets(
            &entities,
            EntityId(1),
            Vec3::new(0.0, 64.0, 0.0),
            &TargetSpec::default(),
            &config,
        );
        assert_eq!(ids(&targets), vec![3, 4, 2]);
    }

    #[test]
    fn test_dangerous_and_unlisted_are_skipped() {
        let config = AgentConfig::default().engage;
        let entities = vec![
            mob(2, "creeper", 1.0),
            mob(3, "enderman", 2.0),
            mob(4, "villager", 3.0),
            mob(5, "zombie", 4.0),
        ];
        let targets = select_targets(
            &entities,
            EntityId(1),
            Vec3::new(0.0, 64.0, 0.0),
            &TargetSpec::default(),
            &config,
        );
        assert_eq!(ids(&targets), vec![5]);
    }

    #[test]
    fn test_filter_self_dead_and_far() {
        let config = AgentConfig::default().engage;
        let mut dead = mob(3, "zombie", 2.0);
        dead.alive = false;
        let mut no_position = mob(4, "zombie", 2.0);
        no_position.position = None;
        let entities = vec![
            mob(1, "zombie", 0.0),
            dead,
            no_position,
            mob(5, "zombie", 80.0),
            mob(6, "pig", 5.0),
            mob(7, "zombie", 7.0),
        ];

        let spec = TargetSpec {
            entity_names: NameFilter::Names(vec!["zombie".into()]),
            count: 1,
        };
        let targets = select_targets(&entities, EntityId(1), Vec3::new(0.0, 64.0, 0.0), &spec, &config);
        assert_eq!(ids(&targets), vec![7]);
    }

    #[test]
    fn test_display_name_is_a_category() {
        let config = AgentConfig::default().engage;
        let mut spider = mob(2, "entity_37", 2.0);
        spider.display_name = Some("Cave Spider".into());
        let spec = TargetSpec {
            entity_names: NameFilter::Names(vec!["cave_spider".into()]),
            count: 1,
        };
        let targets = select_targets(&[spider], EntityId(1), Vec3::new(0.0, 64.0, 0.0), &spec, &config);
        assert_eq!(ids(&targets), vec![2]);
    }

    #[test]
    fn test_death_of_untracked_entity_is_ignored() {
        let (events, _rx) = EventSink::channel();
        let mut engager = Engager::new();
        assert!(!engager.on_entity_died(EntityId(9), &events, 1));
        assert_eq!(engager.kills(), 0);
    }
}
