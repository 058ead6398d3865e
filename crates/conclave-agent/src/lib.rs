//! Agent capability and registry for the Conclave orchestration engine.
//!
//! An agent is an opaque capability: given the transcript so far, produce one
//! reply. The engine only ever talks to agents through [`AgentHandle`].
//!
//! # Main types
//!
//! - [`AgentHandle`]: The invocation contract every agent implements.
//! - [`AgentDescriptor`] / [`AgentRegistry`]: Named, ordered set of agents for a session.
//! - [`ModelAgent`]: Agent backed by a remote model through a [`ChatBackend`].
//! - [`ScriptedAgent`] / [`RuleAgent`]: Deterministic rule-based agents.
//! - [`HumanAgent`]: Human-in-the-loop agent fed through a channel.
//! - [`RetryingAgent`]: Decorator that retries transient failures with backoff.

/// Agent invocation errors.
pub mod error;
/// The agent handle contract.
pub mod handle;
/// Human-in-the-loop agents.
pub mod human;
/// Model-backed agents.
pub mod model;
/// Agent descriptors and the registry.
pub mod registry;
/// Retry decorator.
pub mod retry;
/// Rule-based agents.
pub mod scripted;

pub use error::AgentError;
pub use handle::{AgentHandle, AgentReply};
pub use human::{HumanAgent, HumanPrompt};
pub use model::{ChatBackend, ChatMessage, ChatRole, ModelAgent};
pub use registry::{AgentDescriptor, AgentRegistry};
pub use retry::{RetryPolicy, RetryingAgent};
pub use scripted::{Exhaustion, RuleAgent, ScriptedAgent};
