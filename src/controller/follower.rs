//! Follower - keep within a distance of a player

use crate::command::action::FollowParams;
use crate::command::events::AgentEvent;
use crate::controller::{
    Controller, ControllerKind, ControllerState, EndReason, Outcome, Phase, Report, TickContext,
};
use crate::core::error::{AgentError, Result};
use crate::core::types::GoalId;
use crate::world::gateway::TravelStatus;

/// Follower controller
#[derive(Default)]
pub struct Follower {
    state: ControllerState,
    params: Option<FollowParams>,
    goal: Option<GoalId>,
    /// Set once a failed goal has been reported, cleared by the next goal
    failure_logged: bool,
}

impl Follower {
    pub fn new() -> Self {
        Self::default()
    }

    /// Player currently followed
    pub fn target(&self) -> Option<&str> {
        self.params.as_ref().map(|p| p.target.as_str())
    }

    /// Begin following; an active follow is replaced by the new target
    pub fn start(&mut self, params: FollowParams, ctx: &mut TickContext<'_>) -> Result<()> {
        let position = ctx
            .world
            .player_entity(&params.target)
            .and_then(|id| ctx.world.entity_position(id))
            .ok_or_else(|| AgentError::TargetNotFound("I can't find you!".into()))?;

        if self.is_active() {
            tracing::debug!(previous = ?self.target(), "Replacing follow target");
        }

        tracing::info!(target = %params.target, distance = params.distance, tick = ctx.tick, "Following");
        ctx.events.emit(AgentEvent::Started {
            controller: ControllerKind::Follower,
            tick: ctx.tick,
            detail: format!(
                "Following {} at distance {} blocks",
                params.target, params.distance
            ),
        });

        self.goal = Some(ctx.world.travel_near(position, params.distance));
        self.failure_logged = false;
        self.params = Some(params);
        self.state.begin(ctx.tick);
        Ok(())
    }
}

impl Controller for Follower {
    fn kind(&self) -> ControllerKind {
        ControllerKind::Follower
    }

    fn phase(&self) -> Phase {
        self.state.phase
    }

    fn step(&mut self, ctx: &mut TickContext<'_>) -> Result<Option<Outcome>> {
        let params = self
            .params
            .as_ref()
            .ok_or_else(|| AgentError::Unexpected("follower running without a target".into()))?;

        let position = ctx
            .world
            .player_entity(&params.target)
            .and_then(|id| ctx.world.entity_position(id));
        let Some(position) = position else {
            tracing::info!(target = %params.target, "Lost follow target");
            return Ok(Some(Outcome::new(
                false,
                EndReason::TargetLost,
                Report::Follow {
                    target: params.target.clone(),
                },
            )));
        };

        if let Some(goal) = self.goal {
            if let TravelStatus::Failed(reason) = ctx.world.travel_status(goal) {
                if !self.failure_logged {
                    tracing::warn!(target = %params.target, reason = %reason, "Trouble following");
                    self.failure_logged = true;
                }
            }
        }

        let distance = ctx.world.current_position().distance(&position);
        let slack = params.distance + ctx.config.follow.hysteresis;
        if !ctx.world.is_traveling() && distance > slack {
            let desired = params.distance;
            self.goal = Some(ctx.world.travel_near(position, desired));
            self.failure_logged = false;
        }

        Ok(None)
    }

    fn failure(&self, error: &AgentError) -> Outcome {
        Outcome::new(
            false,
            EndReason::Fault(error.to_string()),
            Report::Follow {
                target: self.target().unwrap_or_default().to_string(),
            },
        )
    }

    fn reset(&mut self) {
        self.state.reset();
        self.params = None;
        self.goal = None;
        self.failure_logged = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::events::{drain, EventSink};
    use crate::core::config::AgentConfig;
    use crate::core::types::Vec3;
    use crate::world::sandbox::SandboxWorld;

    fn follow(target: &str) -> FollowParams {
        FollowParams {
            target: target.into(),
            distance: 2.0,
        }
    }

    #[test]
    fn test_start_without_target_stays_idle() {
        let mut world = SandboxWorld::new("Steward", Vec3::new(0.5, 64.0, 0.5));
        let (events, mut rx) = EventSink::channel();
        let config = AgentConfig::default();
        let mut follower = Follower::new();
        let mut ctx = TickContext::new(&mut world, &events, &config, 0);

        let err = follower.start(follow("Ghost"), &mut ctx).unwrap_err();
        assert!(matches!(err, AgentError::TargetNotFound(_)));
        assert_eq!(follower.phase(), Phase::Idle);
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_in_range_does_not_repath() {
        let mut world = SandboxWorld::new("Steward", Vec3::new(0.5, 64.0, 0.5));
        world.spawn_player("Alex", Vec3::new(2.5, 64.0, 0.5));
        let (events, _rx) = EventSink::channel();
        let config = AgentConfig::default();
        let mut follower = Follower::new();

        {
            let mut ctx = TickContext::new(&mut world, &events, &config, 0);
            follower.start(follow("Alex"), &mut ctx).unwrap();
        }
        assert_eq!(world.travel_requests(), 1);

        for tick in 1..20 {
            world.step();
            let mut ctx = TickContext::new(&mut world, &events, &config, tick);
            follower.tick(&mut ctx);
        }
        assert_eq!(world.travel_requests(), 1);
        assert_eq!(follower.target(), Some("Alex"));
    }
}
