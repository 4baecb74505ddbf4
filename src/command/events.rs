//! Typed lifecycle events published by the dispatcher and controllers
//!
//! Events travel over an unbounded tokio channel to whoever consumes them
//! (the binary mirrors them to tracing and chat). Publishing never blocks and
//! never fails: a dropped receiver only means nobody is listening.

use crate::controller::{ControllerKind, Outcome};
use crate::core::types::Tick;
use serde::Serialize;
use tokio::sync::mpsc;

/// Something observable happened to the agent
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AgentEvent {
    Started {
        controller: ControllerKind,
        tick: Tick,
        detail: String,
    },
    /// One unit of work done (a node harvested, a kill)
    Progress {
        controller: ControllerKind,
        tick: Tick,
        detail: String,
    },
    Completed {
        controller: ControllerKind,
        tick: Tick,
        outcome: Outcome,
    },
    Stopped {
        controller: ControllerKind,
        tick: Tick,
    },
    /// A start request was refused without changing state
    Rejected {
        controller: ControllerKind,
        reason: String,
    },
    ResolutionFailed {
        reason: String,
    },
    DispatchError {
        capability: String,
        reason: String,
    },
}

impl AgentEvent {
    pub fn controller(&self) -> Option<ControllerKind> {
        match self {
            Self::Started { controller, .. }
            | Self::Progress { controller, .. }
            | Self::Completed { controller, .. }
            | Self::Stopped { controller, .. }
            | Self::Rejected { controller, .. } => Some(*controller),
            Self::ResolutionFailed { .. } | Self::DispatchError { .. } => None,
        }
    }

    /// What the agent says in chat about this event, if anything
    ///
    /// Rejections and failures are answered directly in the command reply,
    /// so only progress and completions produce a line here.
    pub fn chat_line(&self) -> Option<String> {
        match self {
            Self::Progress { detail, .. } => Some(detail.clone()),
            Self::Completed { outcome, .. } => Some(outcome.message()),
            _ => None,
        }
    }
}

/// Sending half of the event channel
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<AgentEvent>,
}

impl EventSink {
    /// Create a connected sink and receiver
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<AgentEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn emit(&self, event: AgentEvent) {
        tracing::trace!(?event, "Agent event");
        if self.tx.send(event).is_err() {
            tracing::trace!("No event consumer attached");
        }
    }
}

/// Collect every event currently buffered in `rx`
pub fn drain(rx: &mut mpsc::UnboundedReceiver<AgentEvent>) -> Vec<AgentEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
