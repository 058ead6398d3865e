//! Round-based multi-agent orchestration engine.
//!
//! An [`Orchestrator`] drives one conversation per submitted task: each round
//! a [`TerminationPolicy`] decides whether to stop, a [`SelectionStrategy`]
//! picks one registered agent, and that agent is invoked with the transcript
//! under a per-agent timeout. Failures become transcript turns instead of
//! errors. When the loop stops, the transcript is aggregated into a
//! compliance report.
//!
//! # Main types
//!
//! - [`Orchestrator`]: The engine; built with [`OrchestratorBuilder`].
//! - [`OrchestratorConfig`]: TOML-loadable session configuration.
//! - [`SelectionStrategy`]: Next-speaker choice ([`RoundRobin`], [`KeywordMatch`], [`LeadAgent`], [`ModeratorSelection`]).
//! - [`TerminationPolicy`]: Stop conditions, composed with [`CompositePolicy`].
//! - [`ObserverChain`]: Session event fan-out, e.g. to a [`TranscriptRecorder`].
//! - [`AgentMonitor`]: Per-agent invocation metrics.

/// Session configuration.
pub mod config;
/// The orchestration loop.
pub mod engine;
/// Per-agent invocation metrics.
pub mod monitor;
/// Session events and observers.
pub mod observer;
/// Next-speaker selection strategies.
pub mod selection;
/// Termination policies.
pub mod termination;

pub use config::{OrchestratorConfig, SelectionKind, TerminationKind};
pub use engine::{Orchestrator, OrchestratorBuilder, SessionOutcome};
pub use monitor::{AgentHealth, AgentMonitor, AgentStats, MonitorTotals};
pub use observer::{ObserverChain, SessionEvent, SessionObserver, TranscriptRecorder};
pub use selection::{KeywordMatch, LeadAgent, ModeratorSelection, RoundRobin, SelectionStrategy};
pub use termination::{
    AllAgentsSpokenPolicy, CompletionMarkerPolicy, CompositePolicy, MarkerMatch, MaxRoundsPolicy,
    NoFurtherActionPolicy, TerminationPolicy,
};
pub use tokio_util::sync::CancellationToken;
