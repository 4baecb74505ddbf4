//! Harvester - search, travel to and extract resource nodes
//!
//! A node is a resource block plus every block of the same name stacked
//! directly on top of it (a trunk). Each trunk block is extracted, the drops
//! are collected, and the block above is re-checked. A node counts toward
//! the goal only when the agent extracted at least one block of it and no
//! extraction failed; nodes that cannot be reached or extracted are skipped
//! and the search moves on.

use crate::command::action::{HarvestParams, ResourceFilter};
use crate::command::events::AgentEvent;
use crate::controller::{
    Controller, ControllerKind, ControllerState, EndReason, Outcome, Phase, Report, TickContext,
};
use crate::core::error::{AgentError, Result};
use crate::core::types::{BlockPos, DigId, EntityId, GoalId, Tick};
use crate::world::gateway::{DigStatus, EntityKind, TravelStatus};
use ahash::AHashSet;
use std::collections::VecDeque;

/// Deepest descent when looking for the bottom of a trunk
const MAX_TRUNK_HEIGHT: usize = 32;

/// Node currently being worked
#[derive(Debug, Clone, PartialEq)]
struct Node {
    base: BlockPos,
    /// Block name every trunk block must share
    name: String,
    /// Block being extracted right now
    current: BlockPos,
    /// False once any extraction in this node failed
    clean: bool,
    /// Blocks the agent itself extracted
    extracted: u32,
}

#[derive(Debug, Clone, PartialEq)]
enum Stage {
    Searching,
    Traveling {
        base: BlockPos,
        goal: GoalId,
        issued_at: Tick,
    },
    Extracting(Node),
    Digging {
        node: Node,
        dig: DigId,
        issued_at: Tick,
    },
    Settling {
        node: Node,
        until: Tick,
    },
    Collecting {
        node: Node,
        drops: VecDeque<EntityId>,
        active: Option<(GoalId, Tick)>,
    },
}

/// Harvester controller
pub struct Harvester {
    state: ControllerState,
    params: Option<HarvestParams>,
    stage: Stage,
    harvested: u32,
    /// Nodes abandoned during this activation
    skipped: AHashSet<BlockPos>,
}

impl Default for Harvester {
    fn default() -> Self {
        Self::new()
    }
}

impl Harvester {
    pub fn new() -> Self {
        Self {
            state: ControllerState::default(),
            params: None,
            stage: Stage::Searching,
            harvested: 0,
            skipped: AHashSet::new(),
        }
    }

    pub fn harvested(&self) -> u32 {
        self.harvested
    }

    pub fn start(&mut self, params: HarvestParams, ctx: &mut TickContext<'_>) -> Result<()> {
        if self.is_active() {
            return Err(AgentError::AlreadyActive(
                "I'm already harvesting trees!".into(),
            ));
        }

        tracing::info!(
            target_kind = %params.target_kind,
            max_units = params.max_units,
            tick = ctx.tick,
            "Starting harvest"
        );
        ctx.events.emit(AgentEvent::Started {
            controller: ControllerKind::Harvester,
            tick: ctx.tick,
            detail: format!("{} x{}", params.target_kind, params.max_units),
        });

        self.params = Some(params);
        self.harvested = 0;
        self.skipped.clear();
        self.stage = Stage::Searching;
        self.state.begin(ctx.tick);
        Ok(())
    }

    fn params(&self) -> Result<&HarvestParams> {
        self.params
            .as_ref()
            .ok_or_else(|| AgentError::Unexpected("harvester running without parameters".into()))
    }

    fn report(&self) -> Report {
        let (max_units, target_kind) = match &self.params {
            Some(p) => (p.max_units, p.target_kind.label().to_string()),
            None => (0, ResourceFilter::Any.label().to_string()),
        };
        Report::Harvest {
            harvested: self.harvested,
            max_units,
            target_kind,
        }
    }

    /// Nearest matching block in the search volume, as its trunk base
    ///
    /// Exhaustive scan; a later block only wins when strictly closer, so ties
    /// go to scan order. Trunks whose base was abandoned are ignored.
    fn find_nearest(&self, ctx: &TickContext<'_>, filter: &ResourceFilter) -> Option<BlockPos> {
        let config = &ctx.config.harvest;
        let origin = ctx.world.current_position();
        let center = origin.block();
        let radius = config.search_radius;
        let vertical = config.vertical_radius;

        let mut closest = None;
        let mut closest_distance = radius as f64;

        for dx in -radius..=radius {
            for dy in -vertical..=vertical {
                for dz in -radius..=radius {
                    let pos = center.offset(dx, dy, dz);
                    if self.skipped.contains(&pos) {
                        continue;
                    }
                    let Some(block) = ctx.world.block_at(pos) else {
                        continue;
                    };
                    if !filter.matches(&block.name, &config.resource_blocks) {
                        continue;
                    }
                    let distance = origin.distance(&pos.center());
                    if distance >= closest_distance {
                        continue;
                    }
                    let base = trunk_base(ctx, pos, &block.name);
                    if base != pos && self.skipped.contains(&base) {
                        continue;
                    }
                    closest = Some(base);
                    closest_distance = distance;
                }
            }
        }

        closest
    }

    fn abandon(&mut self, pos: BlockPos) {
        self.skipped.insert(pos);
        self.stage = Stage::Searching;
    }

    /// Close out a node; returns the outcome if the goal is now met
    fn finish_node(&mut self, node: Node, ctx: &mut TickContext<'_>) -> Result<Option<Outcome>> {
        let max_units = self.params()?.max_units;

        if node.clean && node.extracted > 0 {
            self.harvested += 1;
            tracing::info!(harvested = self.harvested, max_units, base = %node.base, "Node harvested");
            ctx.events.emit(AgentEvent::Progress {
                controller: ControllerKind::Harvester,
                tick: ctx.tick,
                detail: format!(
                    "Harvested {} tree {}/{}",
                    self.params()?.target_kind,
                    self.harvested,
                    max_units
                ),
            });
        } else if node.clean {
            tracing::debug!(base = %node.base, "Node disappeared before extraction, not counted");
        } else {
            tracing::warn!(base = %node.base, extracted = node.extracted, "Node only partially extracted, not counted");
            self.skipped.insert(node.base);
            self.skipped.insert(node.current);
        }

        self.stage = Stage::Searching;
        if self.harvested >= max_units {
            return Ok(Some(Outcome::new(true, EndReason::Completed, self.report())));
        }
        Ok(None)
    }

    fn next_extraction(&mut self, mut node: Node, ctx: &mut TickContext<'_>) -> Result<Option<Outcome>> {
        let above = node.current.above();
        let continues = ctx
            .world
            .block_at(above)
            .is_some_and(|block| block.name == node.name);

        if continues {
            node.current = above;
            self.stage = Stage::Extracting(node);
            Ok(None)
        } else {
            self.finish_node(node, ctx)
        }
    }
}

/// Lowest block of the same name directly beneath `pos`
fn trunk_base(ctx: &TickContext<'_>, pos: BlockPos, name: &str) -> BlockPos {
    let mut base = pos;
    for _ in 0..MAX_TRUNK_HEIGHT {
        let below = base.offset(0, -1, 0);
        match ctx.world.block_at(below) {
            Some(block) if block.name == name => base = below,
            _ => break,
        }
    }
    base
}

impl Controller for Harvester {
    fn kind(&self) -> ControllerKind {
        ControllerKind::Harvester
    }

    fn phase(&self) -> Phase {
        self.state.phase
    }

    fn step(&mut self, ctx: &mut TickContext<'_>) -> Result<Option<Outcome>> {
        let timeout = ctx.config.travel.timeout_ticks;
        let stage = std::mem::replace(&mut self.stage, Stage::Searching);

        match stage {
            Stage::Searching => {
                let params = self.params()?;
                if self.harvested >= params.max_units {
                    return Ok(Some(Outcome::new(true, EndReason::Completed, self.report())));
                }

                let filter = params.target_kind.clone();
                let Some(base) = self.find_nearest(ctx, &filter) else {
                    tracing::info!(target_kind = %filter, harvested = self.harvested, "No more nodes in range");
                    return Ok(Some(Outcome::new(true, EndReason::Exhausted, self.report())));
                };

                tracing::debug!(base = %base, "Node found");
                let goal = ctx
                    .world
                    .travel_near(base.center(), ctx.config.harvest.travel_tolerance);
                self.stage = Stage::Traveling {
                    base,
                    goal,
                    issued_at: ctx.tick,
                };
            }

            Stage::Traveling {
                base,
                goal,
                issued_at,
            } => match ctx.world.travel_status(goal) {
                TravelStatus::Arrived => {
                    let config = &ctx.config.harvest;
                    let filter = &self.params()?.target_kind;
                    match ctx.world.block_at(base) {
                        Some(block) if filter.matches(&block.name, &config.resource_blocks) => {
                            self.stage = Stage::Extracting(Node {
                                base,
                                name: block.name,
                                current: base,
                                clean: true,
                                extracted: 0,
                            });
                        }
                        other => {
                            tracing::debug!(
                                base = %base,
                                found = other.as_ref().map_or("air", |b| b.name.as_str()),
                                "Node no longer matches on arrival"
                            );
                        }
                    }
                }
                TravelStatus::InProgress if ctx.tick.saturating_sub(issued_at) < timeout => {
                    self.stage = Stage::Traveling {
                        base,
                        goal,
                        issued_at,
                    };
                }
                TravelStatus::InProgress => {
                    ctx.world.clear_goal();
                    let err = AgentError::ActionTimeout {
                        action: format!("travel to {}", base),
                        ticks: timeout,
                    };
                    tracing::warn!(error = %err, "Skipping node");
                    self.abandon(base);
                }
                TravelStatus::Superseded | TravelStatus::Failed(_) => {
                    tracing::warn!(error = %AgentError::Unreachable(base), "Skipping node");
                    self.abandon(base);
                }
            },

            Stage::Extracting(mut node) => {
                let still_there = ctx
                    .world
                    .block_at(node.current)
                    .is_some_and(|block| block.name == node.name);
                if !still_there {
                    return self.finish_node(node, ctx);
                }

                match ctx.world.dig(node.current) {
                    Ok(dig) => {
                        self.stage = Stage::Digging {
                            node,
                            dig,
                            issued_at: ctx.tick,
                        };
                    }
                    Err(e) if !e.is_recoverable() => return Err(e),
                    Err(e) => {
                        tracing::warn!(pos = %node.current, error = %e, "Extraction failed");
                        node.clean = false;
                        return self.finish_node(node, ctx);
                    }
                }
            }

            Stage::Digging {
                mut node,
                dig,
                issued_at,
            } => match ctx.world.dig_status(dig) {
                DigStatus::Done => {
                    node.extracted += 1;
                    self.stage = Stage::Settling {
                        node,
                        until: ctx.tick + ctx.config.harvest.settle_ticks,
                    };
                }
                DigStatus::InProgress if ctx.tick.saturating_sub(issued_at) < timeout => {
                    self.stage = Stage::Digging {
                        node,
                        dig,
                        issued_at,
                    };
                }
                DigStatus::InProgress => {
                    tracing::warn!(pos = %node.current, "Extraction timed out");
                    node.clean = false;
                    return self.finish_node(node, ctx);
                }
                DigStatus::Failed(reason) => {
                    tracing::warn!(pos = %node.current, reason = %reason, "Extraction failed");
                    node.clean = false;
                    return self.finish_node(node, ctx);
                }
            },

            Stage::Settling { node, until } => {
                if ctx.tick < until {
                    self.stage = Stage::Settling { node, until };
                    return Ok(None);
                }

                let config = &ctx.config.harvest;
                let drops: VecDeque<EntityId> = ctx
                    .world
                    .entities_within_radius(ctx.world.current_position(), config.pickup_radius)
                    .into_iter()
                    .filter(|e| e.kind == EntityKind::Item)
                    .filter(|e| config.resource_blocks.iter().any(|r| *r == e.name))
                    .map(|e| e.id)
                    .collect();

                tracing::debug!(count = drops.len(), "Collecting drops");
                self.stage = Stage::Collecting {
                    node,
                    drops,
                    active: None,
                };
            }

            Stage::Collecting {
                node,
                mut drops,
                active,
            } => {
                if let Some((goal, issued_at)) = active {
                    match ctx.world.travel_status(goal) {
                        TravelStatus::InProgress if ctx.tick.saturating_sub(issued_at) < timeout => {
                            self.stage = Stage::Collecting {
                                node,
                                drops,
                                active,
                            };
                            return Ok(None);
                        }
                        TravelStatus::InProgress => {
                            tracing::warn!("Gave up on a drop");
                            ctx.world.clear_goal();
                        }
                        _ => {}
                    }
                }

                while let Some(drop) = drops.pop_front() {
                    if let Some(pos) = ctx.world.entity_position(drop) {
                        let goal = ctx.world.travel_near(pos, 1.0);
                        self.stage = Stage::Collecting {
                            node,
                            drops,
                            active: Some((goal, ctx.tick)),
                        };
                        return Ok(None);
                    }
                }

                return self.next_extraction(node, ctx);
            }
        }

        Ok(None)
    }

    fn failure(&self, error: &AgentError) -> Outcome {
        Outcome::new(false, EndReason::Fault(error.to_string()), self.report())
    }

    fn reset(&mut self) {
        self.state.reset();
        self.params = None;
        self.stage = Stage::Searching;
        self.harvested = 0;
        self.skipped.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::events::{drain, EventSink};
    use crate::core::config::AgentConfig;
    use crate::core::types::Vec3;
    use crate::world::sandbox::SandboxWorld;

    fn params(max_units: u32) -> HarvestParams {
        HarvestParams {
            target_kind: ResourceFilter::Any,
            max_units,
        }
    }

    #[test]
    fn test_nearest_node_wins() {
        let mut world = SandboxWorld::new("Steward", Vec3::new(0.5, 64.0, 0.5));
        world.place_tree(BlockPos::new(6, 64, 0), "oak_log", 3);
        world.place_tree(BlockPos::new(3, 64, 3), "birch_log", 3);
        world.set_block(BlockPos::new(1, 64, 1), "stone");

        let (events, _rx) = EventSink::channel();
        let config = AgentConfig::default();
        let harvester = Harvester::new();
        let ctx = TickContext::new(&mut world, &events, &config, 0);

        assert_eq!(
            harvester.find_nearest(&ctx, &ResourceFilter::Any),
            Some(BlockPos::new(3, 64, 3))
        );
        assert_eq!(
            harvester.find_nearest(&ctx, &ResourceFilter::Kind("oak".into())),
            Some(BlockPos::new(6, 64, 0))
        );
        assert_eq!(
            harvester.find_nearest(&ctx, &ResourceFilter::Kind("spruce".into())),
            None
        );
    }

    #[test]
    fn test_search_resolves_trunk_base() {
        let mut world = SandboxWorld::new("Steward", Vec3::new(3.5, 68.0, 0.5));
        world.place_tree(BlockPos::new(4, 64, 0), "oak_log", 5);

        let (events, _rx) = EventSink::channel();
        let config = AgentConfig::default();
        let harvester = Harvester::new();
        let ctx = TickContext::new(&mut world, &events, &config, 0);
        assert_eq!(
            harvester.find_nearest(&ctx, &ResourceFilter::Any),
            Some(BlockPos::new(4, 64, 0))
        );
    }

    #[test]
    fn test_search_ignores_blocks_outside_vertical_band() {
        let mut world = SandboxWorld::new("Steward", Vec3::new(0.5, 64.0, 0.5));
        world.set_block(BlockPos::new(0, 70, 0), "oak_log");

        let (events, _rx) = EventSink::channel();
        let config = AgentConfig::default();
        let harvester = Harvester::new();
        let ctx = TickContext::new(&mut world, &events, &config, 0);
        assert_eq!(harvester.find_nearest(&ctx, &ResourceFilter::Any), None);
    }

    #[test]
    fn test_start_twice_is_rejected() {
        let mut world = SandboxWorld::new("Steward", Vec3::new(0.5, 64.0, 0.5));
        let (events, mut rx) = EventSink::channel();
        let config = AgentConfig::default();
        let mut harvester = Harvester::new();
        let mut ctx = TickContext::new(&mut world, &events, &config, 0);

        harvester.start(params(2), &mut ctx).unwrap();
        let err = harvester.start(params(3), &mut ctx).unwrap_err();
        assert!(matches!(err, AgentError::AlreadyActive(_)));
        assert_eq!(drain(&mut rx).len(), 1);
    }

    #[test]
    fn test_empty_area_is_exhausted_on_first_tick() {
        let mut world = SandboxWorld::new("Steward", Vec3::new(0.5, 64.0, 0.5));
        let (events, mut rx) = EventSink::channel();
        let config = AgentConfig::default();
        let mut harvester = Harvester::new();
        let mut ctx = TickContext::new(&mut world, &events, &config, 1);

        harvester.start(params(3), &mut ctx).unwrap();
        harvester.tick(&mut ctx);
        assert_eq!(harvester.phase(), Phase::Idle);

        let events = drain(&mut rx);
        let Some(AgentEvent::Completed { outcome, .. }) = events.last() else {
            panic!("expected a completion event");
        };
        assert!(outcome.success);
        assert_eq!(outcome.reason, EndReason::Exhausted);
    }

    #[test]
    fn test_stop_when_idle_is_silent() {
        let mut world = SandboxWorld::new("Steward", Vec3::new(0.5, 64.0, 0.5));
        let (events, mut rx) = EventSink::channel();
        let config = AgentConfig::default();
        let mut harvester = Harvester::new();
        let mut ctx = TickContext::new(&mut world, &events, &config, 1);

        assert!(!harvester.stop(&mut ctx));
        assert!(drain(&mut rx).is_empty());
    }
}
