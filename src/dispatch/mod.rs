//! Command dispatch and the per-connection agent state

pub mod agent;
pub mod dispatcher;

pub use agent::{AgentState, Reply};
pub use dispatcher::{inventory_report, Dispatch, Dispatcher};
