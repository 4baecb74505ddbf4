//! Courier - walk to a player and hand over resources

use crate::command::action::GiveParams;
use crate::command::events::AgentEvent;
use crate::controller::{
    Controller, ControllerKind, ControllerState, EndReason, Outcome, Phase, Report, TickContext,
};
use crate::core::error::{AgentError, Result};
use crate::core::types::{GoalId, Tick};
use crate::world::gateway::{ItemStack, TravelStatus, WorldGateway};

/// Courier controller
#[derive(Default)]
pub struct Courier {
    state: ControllerState,
    params: Option<GiveParams>,
    goal: Option<(GoalId, Tick)>,
    given: u32,
}

impl Courier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stacks in the inventory matching a give request
    pub fn matching_stacks(
        world: &dyn WorldGateway,
        params: &GiveParams,
        family: &[String],
    ) -> Vec<ItemStack> {
        world
            .inventory()
            .into_iter()
            .filter(|stack| params.item_kind.matches(&stack.name, family))
            .collect()
    }

    pub fn start(&mut self, params: GiveParams, ctx: &mut TickContext<'_>) -> Result<()> {
        if self.is_active() {
            return Err(AgentError::AlreadyActive("I'm already on my way!".into()));
        }

        let family = &ctx.config.harvest.resource_blocks;
        if Self::matching_stacks(&*ctx.world, &params, family).is_empty() {
            return Err(AgentError::ActionFailed(
                "I don't have any wood to give!".into(),
            ));
        }

        let position = ctx
            .world
            .player_entity(&params.recipient)
            .and_then(|id| ctx.world.entity_position(id))
            .ok_or_else(|| AgentError::TargetNotFound("I can't find you!".into()))?;

        tracing::info!(recipient = %params.recipient, item_kind = %params.item_kind, "Delivering");
        ctx.events.emit(AgentEvent::Started {
            controller: ControllerKind::Courier,
            tick: ctx.tick,
            detail: format!("{} wood for {}", params.item_kind, params.recipient),
        });

        let goal = ctx
            .world
            .travel_near(position, ctx.config.give.approach_distance);
        self.goal = Some((goal, ctx.tick));
        self.params = Some(params);
        self.given = 0;
        self.state.begin(ctx.tick);
        Ok(())
    }

    fn report(&self) -> Report {
        Report::Give {
            given: self.given,
            item_kind: self
                .params
                .as_ref()
                .map_or("any", |p| p.item_kind.label())
                .to_string(),
        }
    }

    fn hand_over(&mut self, ctx: &mut TickContext<'_>) -> Result<Outcome> {
        let params = self
            .params
            .clone()
            .ok_or_else(|| AgentError::Unexpected("courier running without parameters".into()))?;

        let stacks = Self::matching_stacks(&*ctx.world, &params, &ctx.config.harvest.resource_blocks);
        for stack in stacks {
            let count = params.amount.map_or(stack.count, |cap| cap.min(stack.count));
            match ctx.world.toss(&stack.name, count) {
                Ok(tossed) => {
                    self.given += tossed;
                    ctx.events.emit(AgentEvent::Progress {
                        controller: ControllerKind::Courier,
                        tick: ctx.tick,
                        detail: format!("Giving {} {}", tossed, stack.name),
                    });
                }
                Err(e) if !e.is_recoverable() => return Err(e),
                Err(e) => {
                    tracing::warn!(item = %stack.name, error = %e, "Toss failed");
                    return Ok(Outcome::new(
                        false,
                        EndReason::Fault(e.to_string()),
                        self.report(),
                    ));
                }
            }
        }

        Ok(Outcome::new(true, EndReason::Completed, self.report()))
    }
}

impl Controller for Courier {
    fn kind(&self) -> ControllerKind {
        ControllerKind::Courier
    }

    fn phase(&self) -> Phase {
        self.state.phase
    }

    fn step(&mut self, ctx: &mut TickContext<'_>) -> Result<Option<Outcome>> {
        let Some((goal, issued_at)) = self.goal else {
            return self.hand_over(ctx).map(Some);
        };

        match ctx.world.travel_status(goal) {
            TravelStatus::Arrived => {
                self.goal = None;
                self.hand_over(ctx).map(Some)
            }
            TravelStatus::InProgress
                if ctx.tick.saturating_sub(issued_at) < ctx.config.travel.timeout_ticks =>
            {
                Ok(None)
            }
            TravelStatus::InProgress | TravelStatus::Superseded => {
                Ok(Some(Outcome::new(false, EndReason::TimedOut, self.report())))
            }
            TravelStatus::Failed(reason) => {
                tracing::warn!(reason = %reason, "Could not reach recipient");
                Ok(Some(Outcome::new(false, EndReason::TargetLost, self.report())))
            }
        }
    }

    fn failure(&self, error: &AgentError) -> Outcome {
        Outcome::new(false, EndReason::Fault(error.to_string()), self.report())
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::action::ResourceFilter;
    use crate::command::events::{drain, EventSink};
    use crate::core::config::AgentConfig;
    use crate::core::types::Vec3;
    use crate::world::sandbox::SandboxWorld;

    fn give(kind: ResourceFilter, amount: Option<u32>) -> GiveParams {
        GiveParams {
            recipient: "Alex".into(),
            item_kind: kind,
            amount,
        }
    }

    #[test]
    fn test_nothing_to_give_is_rejected() {
        let mut world = SandboxWorld::new("Steward", Vec3::new(0.5, 64.0, 0.5));
        world.spawn_player("Alex", Vec3::new(5.5, 64.0, 0.5));
        world.give_item("stick", 4);
        let (events, _rx) = EventSink::channel();
        let config = AgentConfig::default();
        let mut courier = Courier::new();
        let mut ctx = TickContext::new(&mut world, &events, &config, 0);

        let err = courier.start(give(ResourceFilter::Any, None), &mut ctx).unwrap_err();
        assert!(matches!(err, AgentError::ActionFailed(_)));
        assert_eq!(courier.phase(), Phase::Idle);
    }

    #[test]
    fn test_delivers_capped_amount_per_stack() {
        let mut world = SandboxWorld::new("Steward", Vec3::new(0.5, 64.0, 0.5));
        world.spawn_player("Alex", Vec3::new(6.5, 64.0, 0.5));
        world.give_item("oak_log", 7);
        world.give_item("birch_log", 2);
        world.give_item("stick", 3);
        let (events, mut rx) = EventSink::channel();
        let config = AgentConfig::default();
        let mut courier = Courier::new();

        {
            let mut ctx = TickContext::new(&mut world, &events, &config, 0);
            courier.start(give(ResourceFilter::Any, Some(5)), &mut ctx).unwrap();
        }
        for tick in 1..40 {
            world.step();
            let mut ctx = TickContext::new(&mut world, &events, &config, tick);
            courier.tick(&mut ctx);
            if !courier.is_active() {
                break;
            }
        }

        assert_eq!(courier.phase(), Phase::Idle);
        assert_eq!(world.item_count("oak_log"), 2);
        assert_eq!(world.item_count("birch_log"), 0);
        assert_eq!(world.item_count("stick"), 3);

        let events = drain(&mut rx);
        let Some(AgentEvent::Completed { outcome, .. }) = events.last() else {
            panic!("expected completion");
        };
        assert!(outcome.success);
        assert_eq!(
            outcome.report,
            Report::Give {
                given: 7,
                item_kind: "any".into()
            }
        );
    }
}
