//! Shared harness: a sandbox world driven through the resolver and dispatcher

#![allow(dead_code)]

use std::sync::Arc;

use steward::capability::CapabilityRegistry;
use steward::command::events::{drain, AgentEvent, EventSink};
use steward::command::{IntentResolver, ResolvedIntent};
use steward::controller::Outcome;
use steward::core::config::AgentConfig;
use steward::core::error::Result;
use steward::core::types::Vec3;
use steward::dispatch::{Dispatch, Dispatcher};
use steward::world::{SandboxWorld, WorldEvent};
use tokio::sync::mpsc::UnboundedReceiver;

pub const ISSUER: &str = "Alex";

pub struct Harness {
    pub world: SandboxWorld,
    pub dispatcher: Dispatcher,
    pub registry: Arc<CapabilityRegistry>,
    rx: UnboundedReceiver<AgentEvent>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(AgentConfig::default())
    }

    pub fn with_config(config: AgentConfig) -> Self {
        let registry = Arc::new(CapabilityRegistry::builtin().expect("builtin registry"));
        let (events, rx) = EventSink::channel();
        Self {
            world: SandboxWorld::new("Steward", Vec3::new(0.5, 64.0, 0.5)),
            dispatcher: Dispatcher::new(Arc::clone(&registry), Arc::new(config), events),
            registry,
            rx,
        }
    }

    /// Resolve model text as if `ISSUER` caused it, then dispatch it
    pub fn command(&mut self, model_text: &str) -> Result<Dispatch> {
        let intent = IntentResolver::new(&self.registry)
            .resolve(model_text)
            .issued_by(ISSUER);
        let ResolvedIntent::Command(command) = intent else {
            panic!("expected a command from {:?}, got {:?}", model_text, intent);
        };
        self.dispatcher.handle_command(&mut self.world, &command)
    }

    /// One world step followed by one controller tick
    pub fn step(&mut self) {
        for event in self.world.step() {
            if let WorldEvent::EntityDied(id) = event {
                self.dispatcher.on_entity_died(id);
            }
        }
        self.dispatcher.tick(&mut self.world);
    }

    /// Step until no controller is active; returns the ticks spent
    pub fn run_until_idle(&mut self, limit: u64) -> u64 {
        for spent in 0..limit {
            if self.dispatcher.active().is_none() {
                return spent;
            }
            self.step();
        }
        panic!("still {:?} after {} ticks", self.dispatcher.active(), limit);
    }

    pub fn events(&mut self) -> Vec<AgentEvent> {
        drain(&mut self.rx)
    }

    /// The single completion among `events`
    pub fn completion(events: &[AgentEvent]) -> Outcome {
        let outcomes: Vec<&Outcome> = events
            .iter()
            .filter_map(|event| match event {
                AgentEvent::Completed { outcome, .. } => Some(outcome),
                _ => None,
            })
            .collect();
        assert_eq!(outcomes.len(), 1, "expected one completion in {:?}", events);
        outcomes[0].clone()
    }
}
