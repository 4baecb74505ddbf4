//! Capability table advertised to the language model
//!
//! registry (what exists) -> schema (what parameters look like) ->
//! responses (how the agent acknowledges them)

pub mod registry;
pub mod responses;
pub mod schema;

pub use registry::{Capability, CapabilityRegistry, Persona};
pub use responses::{ResponseKind, ResponseTemplates};
pub use schema::{ParamSpec, ParamType};
