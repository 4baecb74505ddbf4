//! LLM integration: prompt construction, HTTP client and the function-call grammar

pub mod client;
pub mod context;
pub mod parser;
pub mod prompt;

pub use client::{LanguageModel, LlmClient, PassthroughModel};
pub use context::AgentContext;
pub use prompt::{build_prompt, Prompt};
