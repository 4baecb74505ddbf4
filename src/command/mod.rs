//! Command pipeline: intents, resolution, typed actions and lifecycle events

pub mod action;
pub mod events;
pub mod intent;
pub mod resolver;

pub use action::{Action, NameFilter, ResourceFilter, TargetSpec};
pub use events::{AgentEvent, EventSink};
pub use intent::{Command, Parameters, ResolvedIntent};
pub use resolver::IntentResolver;
