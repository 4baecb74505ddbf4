//! Autonomous task controllers
//!
//! Each controller is a cooperative state machine advanced once per tick by
//! the dispatcher. Long-running world actions are issued once and then polled
//! on later ticks, so a tick never blocks and a stop is observed at the next
//! checkpoint.

pub mod courier;
pub mod engager;
pub mod follower;
pub mod harvester;

pub use courier::Courier;
pub use engager::{select_targets, Engager};
pub use follower::Follower;
pub use harvester::Harvester;

use crate::command::events::{AgentEvent, EventSink};
use crate::core::config::AgentConfig;
use crate::core::error::{AgentError, Result};
use crate::core::types::Tick;
use crate::world::gateway::WorldGateway;
use serde::{Deserialize, Serialize};

/// Lifecycle phase shared by every controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Phase {
    #[default]
    Idle,
    Running,
    /// Goal reached outside the tick loop; finalized on the next tick
    Stopping,
}

/// Which controller an event or dispatch refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerKind {
    Harvester,
    Follower,
    Engager,
    Courier,
}

impl std::fmt::Display for ControllerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Harvester => "harvester",
            Self::Follower => "follower",
            Self::Engager => "engager",
            Self::Courier => "courier",
        };
        f.write_str(name)
    }
}

/// Phase plus the tick the current activation began
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControllerState {
    pub phase: Phase,
    pub started_at: Tick,
}

impl ControllerState {
    pub fn is_idle(&self) -> bool {
        self.phase == Phase::Idle
    }

    pub fn begin(&mut self, tick: Tick) {
        self.phase = Phase::Running;
        self.started_at = tick;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Why a task ended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// Goal reached
    Completed,
    /// Ran out of matching resources before the goal
    Exhausted,
    TargetLost,
    NoTargets,
    TimedOut,
    Fault(String),
}

/// Controller-specific figures carried by the terminal event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "task", rename_all = "snake_case")]
pub enum Report {
    Harvest {
        harvested: u32,
        max_units: u32,
        target_kind: String,
    },
    Follow {
        target: String,
    },
    Engage {
        kills: u32,
        desired: u32,
    },
    Give {
        given: u32,
        item_kind: String,
    },
}

/// Terminal result of one activation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub success: bool,
    pub reason: EndReason,
    pub report: Report,
}

impl Outcome {
    pub fn new(success: bool, reason: EndReason, report: Report) -> Self {
        Self {
            success,
            reason,
            report,
        }
    }

    /// Short chat line announcing the outcome
    pub fn message(&self) -> String {
        if let EndReason::Fault(detail) = &self.reason {
            return match &self.report {
                Report::Harvest { .. } => "Something went wrong while harvesting trees.".into(),
                Report::Give { .. } => "Sorry, I couldn't give you the wood!".into(),
                _ => format!("Something went wrong: {}", detail),
            };
        }

        match (&self.report, &self.reason) {
            (Report::Harvest { target_kind, .. }, EndReason::Exhausted) => {
                format!("No more {} trees found nearby.", target_kind)
            }
            (Report::Harvest { harvested, .. }, _) => {
                format!("Tree harvesting complete! Harvested {}.", harvested)
            }
            (Report::Follow { .. }, EndReason::TargetLost) => "I lost track of you!".into(),
            (Report::Follow { target }, _) => format!("Stopped following {}.", target),
            (Report::Engage { .. }, EndReason::NoTargets) => {
                "I can't find any valid targets nearby!".into()
            }
            (Report::Engage { .. }, _) => "Killed all targets!".into(),
            (Report::Give { .. }, EndReason::TargetLost) => "I can't find you!".into(),
            (Report::Give { .. }, EndReason::TimedOut) => {
                "I couldn't reach you to hand over the wood.".into()
            }
            (Report::Give { .. }, _) => "Here's your wood!".into(),
        }
    }
}

/// Everything a controller may touch during one step
pub struct TickContext<'a> {
    pub world: &'a mut dyn WorldGateway,
    pub events: &'a EventSink,
    pub config: &'a AgentConfig,
    pub tick: Tick,
}

impl<'a> TickContext<'a> {
    pub fn new(
        world: &'a mut dyn WorldGateway,
        events: &'a EventSink,
        config: &'a AgentConfig,
        tick: Tick,
    ) -> Self {
        Self {
            world,
            events,
            config,
            tick,
        }
    }
}

/// Common surface the dispatcher drives
pub trait Controller {
    fn kind(&self) -> ControllerKind;

    fn phase(&self) -> Phase;

    fn is_active(&self) -> bool {
        self.phase() != Phase::Idle
    }

    /// Advance one step; only called while not Idle
    ///
    /// Returns `Some(outcome)` when the activation ended during this step.
    fn step(&mut self, ctx: &mut TickContext<'_>) -> Result<Option<Outcome>>;

    /// Outcome used when `step` fails with a non-recoverable error
    fn failure(&self, error: &AgentError) -> Outcome;

    /// Drop all per-activation state and return to Idle
    fn reset(&mut self);

    /// Advance one step, converting the activation's end into events
    fn tick(&mut self, ctx: &mut TickContext<'_>) {
        if !self.is_active() {
            return;
        }

        let outcome = match self.step(ctx) {
            Ok(outcome) => outcome,
            Err(e) if e.is_recoverable() => {
                tracing::warn!(controller = %self.kind(), tick = ctx.tick, error = %e, "Recoverable error");
                None
            }
            Err(e) => {
                tracing::error!(controller = %self.kind(), tick = ctx.tick, error = %e, "Task aborted");
                Some(self.failure(&e))
            }
        };

        if let Some(outcome) = outcome {
            ctx.world.clear_goal();
            self.reset();
            ctx.events.emit(AgentEvent::Completed {
                controller: self.kind(),
                tick: ctx.tick,
                outcome,
            });
        }
    }

    /// Cancel the activation; a no-op when already Idle
    fn stop(&mut self, ctx: &mut TickContext<'_>) -> bool {
        if !self.is_active() {
            return false;
        }
        ctx.world.clear_goal();
        self.reset();
        ctx.events.emit(AgentEvent::Stopped {
            controller: self.kind(),
            tick: ctx.tick,
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_lifecycle() {
        let mut state = ControllerState::default();
        assert!(state.is_idle());
        state.begin(42);
        assert_eq!(state.phase, Phase::Running);
        assert_eq!(state.started_at, 42);
        state.reset();
        assert!(state.is_idle());
        assert_eq!(state.started_at, 0);
    }

    #[test]
    fn test_outcome_messages() {
        let exhausted = Outcome::new(
            true,
            EndReason::Exhausted,
            Report::Harvest {
                harvested: 1,
                max_units: 5,
                target_kind: "birch".into(),
            },
        );
        assert_eq!(exhausted.message(), "No more birch trees found nearby.");

        let lost = Outcome::new(
            false,
            EndReason::TargetLost,
            Report::Follow {
                target: "Alex".into(),
            },
        );
        assert_eq!(lost.message(), "I lost track of you!");

        let fault = Outcome::new(
            false,
            EndReason::Fault("boom".into()),
            Report::Engage {
                kills: 0,
                desired: 1,
            },
        );
        assert_eq!(fault.message(), "Something went wrong: boom");
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(ControllerKind::Engager.to_string(), "engager");
    }
}
