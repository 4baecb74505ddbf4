//! Dispatcher - the single authority over which controller runs
//!
//! At most one controller is active. Starting a behavior first stops every
//! other running controller, so their `Stopped` events always precede the
//! new `Started` event. Instant capabilities (inventory reports) leave the
//! running controller alone.

use crate::capability::registry::CapabilityRegistry;
use crate::command::action::Action;
use crate::command::events::{AgentEvent, EventSink};
use crate::command::intent::Command;
use crate::controller::{
    Controller, ControllerKind, Courier, Engager, Follower, Harvester, TickContext,
};
use crate::core::config::AgentConfig;
use crate::core::error::{AgentError, Result};
use crate::core::types::{EntityId, Tick};
use crate::world::gateway::WorldGateway;
use std::sync::Arc;

/// What handling a command did
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    Started(ControllerKind),
    /// Controllers stopped by an explicit stop request
    Stopped(Vec<ControllerKind>),
    /// Instant answer that needs no controller
    Report(String),
    /// The controller refused to start; the text explains why
    Rejected(String),
}

/// Owns the controllers and routes commands and ticks to them
pub struct Dispatcher {
    registry: Arc<CapabilityRegistry>,
    config: Arc<AgentConfig>,
    events: EventSink,
    harvester: Harvester,
    follower: Follower,
    engager: Engager,
    courier: Courier,
    current_tick: Tick,
}

/// Render the inventory as `OAK LOG: 3, STICK: 2`
pub fn inventory_report(world: &dyn WorldGateway, item_type: Option<&str>) -> String {
    let items: Vec<String> = world
        .inventory()
        .into_iter()
        .filter(|stack| item_type.map_or(true, |t| stack.name.contains(t)))
        .map(|stack| {
            format!(
                "{}: {}",
                stack.name.to_uppercase().replace('_', " "),
                stack.count
            )
        })
        .collect();

    if items.is_empty() {
        "My inventory is empty!".into()
    } else {
        items.join(", ")
    }
}

impl Dispatcher {
    pub fn new(registry: Arc<CapabilityRegistry>, config: Arc<AgentConfig>, events: EventSink) -> Self {
        Self {
            registry,
            config,
            events,
            harvester: Harvester::new(),
            follower: Follower::new(),
            engager: Engager::new(),
            courier: Courier::new(),
            current_tick: 0,
        }
    }

    pub fn current_tick(&self) -> Tick {
        self.current_tick
    }

    pub fn events(&self) -> &EventSink {
        &self.events
    }

    /// The running controller, if any
    pub fn active(&self) -> Option<ControllerKind> {
        let controllers: [&dyn Controller; 4] =
            [&self.harvester, &self.follower, &self.engager, &self.courier];
        controllers
            .into_iter()
            .find(|c| c.is_active())
            .map(|c| c.kind())
    }

    pub fn engager(&self) -> &Engager {
        &self.engager
    }

    pub fn harvester(&self) -> &Harvester {
        &self.harvester
    }

    pub fn follower(&self) -> &Follower {
        &self.follower
    }

    /// Route a resolved command to its controller
    ///
    /// Errors are configuration problems (no controller for the capability);
    /// they are also published as `DispatchError` events.
    pub fn handle_command(&mut self, world: &mut dyn WorldGateway, command: &Command) -> Result<Dispatch> {
        let decoded = match self.registry.get(&command.capability) {
            Some(capability) => Action::decode(capability, command, &self.config),
            None => Err(AgentError::Configuration(format!(
                "capability {} is not registered",
                command.capability
            ))),
        };

        let action = match decoded {
            Ok(action) => action,
            Err(e) => {
                tracing::error!(capability = %command.capability, error = %e, "Cannot dispatch command");
                self.events.emit(AgentEvent::DispatchError {
                    capability: command.capability.clone(),
                    reason: e.to_string(),
                });
                return Err(e);
            }
        };

        tracing::debug!(
            capability = %command.capability,
            autonomous = action.is_autonomous(),
            ?action,
            "Dispatching"
        );

        match action {
            Action::Stop => Ok(Dispatch::Stopped(self.stop_all(world))),
            Action::Inventory { item_type } => {
                Ok(Dispatch::Report(inventory_report(&*world, item_type.as_deref())))
            }
            Action::Harvest(params) => {
                self.stop_others(world, ControllerKind::Harvester);
                let result = self.with_context(world, |d, ctx| d.harvester.start(params, ctx));
                Ok(self.started(world, ControllerKind::Harvester, result))
            }
            Action::Follow(params) => {
                self.stop_others(world, ControllerKind::Follower);
                let result = self.with_context(world, |d, ctx| d.follower.start(params, ctx));
                Ok(self.started(world, ControllerKind::Follower, result))
            }
            Action::Engage(params) => {
                self.stop_others(world, ControllerKind::Engager);
                let result = self.with_context(world, |d, ctx| d.engager.start(params, ctx));
                Ok(self.started(world, ControllerKind::Engager, result))
            }
            Action::Give(params) => {
                self.stop_others(world, ControllerKind::Courier);
                let result = self.with_context(world, |d, ctx| d.courier.start(params, ctx));
                Ok(self.started(world, ControllerKind::Courier, result))
            }
        }
    }

    /// Run `f` with a tick context built from this dispatcher's state
    fn with_context<T>(
        &mut self,
        world: &mut dyn WorldGateway,
        f: impl FnOnce(&mut Controllers<'_>, &mut TickContext<'_>) -> T,
    ) -> T {
        let Self {
            config,
            events,
            harvester,
            follower,
            engager,
            courier,
            current_tick,
            ..
        } = self;
        let mut ctx = TickContext::new(world, events, config, *current_tick);
        let mut controllers = Controllers {
            harvester,
            follower,
            engager,
            courier,
        };
        f(&mut controllers, &mut ctx)
    }

    fn started(
        &mut self,
        world: &mut dyn WorldGateway,
        kind: ControllerKind,
        result: Result<()>,
    ) -> Dispatch {
        match result {
            Ok(()) => Dispatch::Started(kind),
            Err(e) => {
                let mut reason = e.user_message();
                if kind == ControllerKind::Courier && matches!(e, AgentError::ActionFailed(_)) {
                    reason = format!(
                        "{} Let me check my inventory: {}",
                        reason,
                        inventory_report(&*world, None)
                    );
                }
                tracing::info!(controller = %kind, reason = %reason, "Start rejected");
                self.events.emit(AgentEvent::Rejected {
                    controller: kind,
                    reason: reason.clone(),
                });
                Dispatch::Rejected(reason)
            }
        }
    }

    /// Stop every running controller except `keep`
    fn stop_others(&mut self, world: &mut dyn WorldGateway, keep: ControllerKind) -> Vec<ControllerKind> {
        self.with_context(world, |c, ctx| {
            c.all()
                .into_iter()
                .filter(|controller| controller.kind() != keep)
                .filter_map(|controller| controller.stop(ctx).then(|| controller.kind()))
                .collect()
        })
    }

    /// Stop every running controller
    pub fn stop_all(&mut self, world: &mut dyn WorldGateway) -> Vec<ControllerKind> {
        let stopped: Vec<ControllerKind> = self.with_context(world, |c, ctx| {
            c.all()
                .into_iter()
                .filter_map(|controller| controller.stop(ctx).then(|| controller.kind()))
                .collect()
        });
        if !stopped.is_empty() {
            tracing::info!(?stopped, "Stopped all actions");
        }
        stopped
    }

    /// Advance the running controller by one tick
    pub fn tick(&mut self, world: &mut dyn WorldGateway) {
        self.current_tick += 1;
        self.with_context(world, |c, ctx| {
            for controller in c.all() {
                if controller.is_active() {
                    controller.tick(ctx);
                }
            }
        });
    }

    /// Forward a death notification to the engager
    pub fn on_entity_died(&mut self, id: EntityId) -> bool {
        self.engager.on_entity_died(id, &self.events, self.current_tick)
    }
}

/// Mutable view of the four controllers, split from the rest of the dispatcher
struct Controllers<'a> {
    harvester: &'a mut Harvester,
    follower: &'a mut Follower,
    engager: &'a mut Engager,
    courier: &'a mut Courier,
}

impl Controllers<'_> {
    fn all(&mut self) -> [&mut dyn Controller; 4] {
        [
            &mut *self.harvester as &mut dyn Controller,
            &mut *self.follower as &mut dyn Controller,
            &mut *self.engager as &mut dyn Controller,
            &mut *self.courier as &mut dyn Controller,
        ]
    }
}
