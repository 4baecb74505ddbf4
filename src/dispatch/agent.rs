//! Agent state - the command surface exposed to the chat transport
//!
//! One `AgentState` exists per connection: it is created when the agent
//! joins the world and reset when it leaves. A chat message flows through
//! prompt construction, the language model, the resolver and finally the
//! dispatcher; the returned `Reply` is what the agent says back.

use crate::capability::registry::CapabilityRegistry;
use crate::capability::responses::ResponseKind;
use crate::command::events::{AgentEvent, EventSink};
use crate::command::intent::{Command, ResolvedIntent};
use crate::command::resolver::IntentResolver;
use crate::core::config::AgentConfig;
use crate::core::types::EntityId;
use crate::dispatch::dispatcher::{Dispatch, Dispatcher};
use crate::llm::client::LanguageModel;
use crate::llm::context::AgentContext;
use crate::llm::prompt::{build_prompt, Prompt};
use crate::world::gateway::WorldGateway;
use ahash::AHashMap;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

const FALLBACK_ERROR: &str = "Sorry, I had trouble understanding that.";

/// What the agent answers to one message
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Plain conversation from the model, passed through verbatim
    Conversation(String),
    /// A command was dispatched
    Command {
        acknowledgement: Option<String>,
        dispatch: Dispatch,
    },
    Error(String),
}

impl Reply {
    /// Chat lines to send, in order
    pub fn lines(&self) -> Vec<String> {
        match self {
            Reply::Conversation(text) | Reply::Error(text) => vec![text.clone()],
            Reply::Command {
                acknowledgement,
                dispatch,
            } => {
                let mut lines: Vec<String> = acknowledgement.iter().cloned().collect();
                match dispatch {
                    Dispatch::Report(text) | Dispatch::Rejected(text) => lines.push(text.clone()),
                    Dispatch::Started(_) | Dispatch::Stopped(_) => {}
                }
                lines
            }
        }
    }
}

/// Everything one connected agent owns
pub struct AgentState {
    session: Uuid,
    config: Arc<AgentConfig>,
    registry: Arc<CapabilityRegistry>,
    dispatcher: Dispatcher,
    rng: ChaCha8Rng,
}

impl AgentState {
    pub fn new(
        config: Arc<AgentConfig>,
        registry: Arc<CapabilityRegistry>,
        events: EventSink,
        seed: u64,
    ) -> Self {
        let dispatcher = Dispatcher::new(Arc::clone(&registry), Arc::clone(&config), events);
        let session = Uuid::new_v4();
        tracing::info!(session = %session, agent = %config.agent.name, "Agent session created");
        Self {
            session,
            config,
            registry,
            dispatcher,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session
    }

    pub fn name(&self) -> &str {
        &self.config.agent.name
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Whether a chat message is addressed to this agent
    ///
    /// Own messages and `/` commands are ignored; everything else must
    /// mention `@<agent name>`.
    pub fn should_respond(&self, sender: &str, message: &str) -> bool {
        if sender == self.name() || message.starts_with('/') {
            return false;
        }
        let mention = format!("@{}", self.name().to_lowercase());
        message.to_lowercase().contains(&mention)
    }

    pub fn build_prompt(&self, world: &dyn WorldGateway, issuer: &str, message: &str) -> Prompt {
        let context = AgentContext::from_world(world, self.name(), issuer);
        build_prompt(&self.registry, &context, message)
    }

    /// Full pipeline for one chat message
    pub async fn handle_message(
        &mut self,
        model: &dyn LanguageModel,
        world: &mut dyn WorldGateway,
        issuer: &str,
        message: &str,
    ) -> Reply {
        let prompt = self.build_prompt(&*world, issuer, message);
        match model.generate(&prompt).await {
            Ok(text) => self.respond(world, issuer, &text),
            Err(e) => {
                tracing::warn!(error = %e, "Model call failed");
                Reply::Error(self.error_phrase())
            }
        }
    }

    /// Resolve model text and act on it
    pub fn respond(&mut self, world: &mut dyn WorldGateway, issuer: &str, model_text: &str) -> Reply {
        let intent = IntentResolver::new(&self.registry)
            .resolve(model_text)
            .issued_by(issuer);

        match intent {
            ResolvedIntent::Conversational { text } => Reply::Conversation(text),
            ResolvedIntent::Unparsable { reason } => {
                tracing::warn!(reason = %reason, "Unparsable model response");
                self.dispatcher
                    .events()
                    .emit(AgentEvent::ResolutionFailed { reason });
                Reply::Error(self.error_phrase())
            }
            ResolvedIntent::Command(command) => {
                tracing::info!(
                    capability = %command.capability,
                    issuer = %issuer,
                    "Executing command"
                );
                match self.dispatcher.handle_command(world, &command) {
                    Ok(dispatch) => {
                        let acknowledgement = match dispatch {
                            Dispatch::Rejected(_) => None,
                            _ => self.acknowledge(&command, issuer),
                        };
                        Reply::Command {
                            acknowledgement,
                            dispatch,
                        }
                    }
                    Err(e) => Reply::Error(e.user_message()),
                }
            }
        }
    }

    fn acknowledge(&mut self, command: &Command, issuer: &str) -> Option<String> {
        let kind = self.registry.response_template_kind(&command.capability);
        let params = template_params(command, issuer);
        self.registry.responses().render(kind, &params, &mut self.rng)
    }

    fn error_phrase(&mut self) -> String {
        self.registry
            .responses()
            .render(ResponseKind::Error, &AHashMap::new(), &mut self.rng)
            .unwrap_or_else(|| FALLBACK_ERROR.to_string())
    }

    /// Advance the running controller by one tick
    pub fn tick(&mut self, world: &mut dyn WorldGateway) {
        self.dispatcher.tick(world);
    }

    pub fn on_entity_died(&mut self, id: EntityId) {
        self.dispatcher.on_entity_died(id);
    }

    /// Connection lost: stop everything and start a fresh session
    pub fn reset(&mut self, world: &mut dyn WorldGateway) {
        let stopped = self.dispatcher.stop_all(world);
        tracing::info!(session = %self.session, ?stopped, "Agent session reset");
        self.session = Uuid::new_v4();
    }
}

/// Placeholder values for acknowledgement templates
fn template_params(command: &Command, issuer: &str) -> AHashMap<String, String> {
    let mut params: AHashMap<String, String> = command
        .parameters
        .iter()
        .filter_map(|(key, value)| {
            let text = match value {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => return None,
            };
            Some((key.clone(), text))
        })
        .collect();

    for (key, default) in [
        ("treeType", "any"),
        ("woodType", "any"),
        ("playerName", issuer),
        ("distance", "2"),
        ("items", "nothing"),
    ] {
        params
            .entry(key.to_string())
            .or_insert_with(|| default.to_string());
    }
    params
}
