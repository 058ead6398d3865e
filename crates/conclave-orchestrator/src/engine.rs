use crate::config::{OrchestratorConfig, SelectionKind, TerminationKind};
use crate::monitor::AgentMonitor;
use crate::observer::{ObserverChain, SessionEvent, SessionObserver};
use crate::selection::{KeywordMatch, LeadAgent, RoundRobin, SelectionStrategy};
use crate::termination::{
    AllAgentsSpokenPolicy, CompositePolicy, NoFurtherActionPolicy, TerminationPolicy,
};
use conclave_agent::{AgentDescriptor, AgentError, AgentRegistry, AgentReply};
use conclave_compliance::{ComplianceReport, ResponseAggregator};
use conclave_core::{ConclaveError, ConclaveResult, Task, TerminationSignal};
use conclave_session::ConversationState;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Everything a finished session produced.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    /// Final conversation state, including the full transcript.
    pub state: ConversationState,
    /// Why the session stopped.
    pub signal: TerminationSignal,
    /// Aggregated findings.
    pub report: ComplianceReport,
}

/// Round-based multi-agent engine.
///
/// Each round the termination policy is consulted, then the selection
/// strategy picks one agent, which is invoked with the transcript under the
/// per-agent timeout. Its reply, or a failure turn, is appended and the
/// round count advances. An `Orchestrator` holds no per-session state, so one
/// instance can drive many sessions concurrently.
pub struct Orchestrator {
    config: OrchestratorConfig,
    registry: AgentRegistry,
    selection: Box<dyn SelectionStrategy>,
    termination: Box<dyn TerminationPolicy>,
    aggregator: ResponseAggregator,
    observers: ObserverChain,
    monitor: Arc<AgentMonitor>,
}

impl Orchestrator {
    /// Start building an orchestrator from a configuration.
    pub fn builder(config: OrchestratorConfig) -> OrchestratorBuilder {
        OrchestratorBuilder::new(config)
    }

    /// The active configuration.
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// The registered agents.
    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    /// Get a reference to the monitor.
    pub fn monitor(&self) -> &Arc<AgentMonitor> {
        &self.monitor
    }

    /// Run a session to completion.
    pub async fn run(&self, task: Task) -> ConclaveResult<SessionOutcome> {
        self.run_until_cancelled(task, CancellationToken::new()).await
    }

    /// Run a session that stops with [`TerminationSignal::Cancelled`] as soon
    /// as `cancel` fires, keeping every turn appended so far.
    pub async fn run_until_cancelled(
        &self,
        task: Task,
        cancel: CancellationToken,
    ) -> ConclaveResult<SessionOutcome> {
        if self.registry.is_empty() {
            return Err(ConclaveError::config("agent registry is empty"));
        }
        let start = Instant::now();

        let (state, signal) = self.converse(task, &cancel).await;
        let report = self.aggregator.aggregate(&state, signal);

        self.observers
            .emit(SessionEvent::SessionEnded {
                session_id: state.session_id(),
                signal,
                rounds: state.round(),
                status: report.status,
            })
            .await;

        info!(
            session_id = %state.session_id(),
            signal = %signal,
            rounds = state.round(),
            status = %report.status,
            duration_ms = start.elapsed().as_millis() as u64,
            "Session finished"
        );

        Ok(SessionOutcome {
            state,
            signal,
            report,
        })
    }

    async fn converse(
        &self,
        task: Task,
        cancel: &CancellationToken,
    ) -> (ConversationState, TerminationSignal) {
        let mut state = ConversationState::seeded(task, self.registry.names());
        let session_id = state.session_id();

        info!(
            session_id = %session_id,
            task_id = %state.task().id,
            agents = self.registry.len(),
            max_rounds = self.config.max_rounds,
            "Session started"
        );
        self.observers
            .emit(SessionEvent::SessionStarted {
                session_id,
                task_id: state.task().id,
                agents: self.registry.names(),
            })
            .await;
        if let Some(seed) = state.last_turn().cloned() {
            self.observers
                .emit(SessionEvent::TurnAppended {
                    session_id,
                    turn: seed,
                })
                .await;
        }

        let timeout = self.config.per_agent_timeout();
        let signal = loop {
            if cancel.is_cancelled() {
                break TerminationSignal::Cancelled;
            }
            if let Some(signal) = self.termination.evaluate(&state) {
                break signal;
            }
            if state.round() >= self.config.max_rounds {
                break TerminationSignal::MaxRoundsReached;
            }

            let selected = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                agent = self.selection.select(&state, &self.registry) => Some(agent),
            };
            let Some(selected) = selected else {
                break TerminationSignal::Cancelled;
            };
            let Some(agent) = selected else {
                break TerminationSignal::SelectionStrategyReturnedNone;
            };

            let round = state.round();
            debug!(session_id = %session_id, round, agent = %agent.name, "Agent selected");
            self.observers
                .emit(SessionEvent::AgentSelected {
                    session_id,
                    round,
                    agent: agent.name.clone(),
                })
                .await;

            let started = Instant::now();
            let invocation = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                result = tokio::time::timeout(timeout, agent.handle.invoke(state.turns())) => Some(result),
            };
            let Some(result) = invocation else {
                info!(session_id = %session_id, agent = %agent.name, "Cancelled while awaiting agent");
                break TerminationSignal::Cancelled;
            };
            let result = match result {
                Ok(reply) => reply.and_then(AgentReply::validate),
                Err(_) => Err(AgentError::Timeout {
                    timeout_ms: self.config.per_agent_timeout_ms,
                }),
            };

            self.record(&mut state, agent, round, result, started).await;
        };

        (state, signal)
    }

    async fn record(
        &self,
        state: &mut ConversationState,
        agent: &AgentDescriptor,
        round: u32,
        result: Result<AgentReply, AgentError>,
        started: Instant,
    ) {
        let session_id = state.session_id();
        let elapsed = started.elapsed();
        match result {
            Ok(reply) => {
                self.monitor.record_success(&agent.name, elapsed).await;
                let turn = state.record_reply(&agent.name, reply.content).clone();
                debug!(
                    session_id = %session_id,
                    sequence = turn.sequence,
                    agent = %agent.name,
                    "Turn appended"
                );
                self.observers
                    .emit(SessionEvent::TurnAppended { session_id, turn })
                    .await;
            }
            Err(e) => {
                let kind = e.kind();
                warn!(
                    session_id = %session_id,
                    round,
                    agent = %agent.name,
                    kind = %kind,
                    error = %e,
                    "Agent invocation failed"
                );
                self.monitor.record_failure(&agent.name, kind, elapsed).await;
                self.observers
                    .emit(SessionEvent::AgentFailed {
                        session_id,
                        round,
                        agent: agent.name.clone(),
                        kind,
                        error: e.to_string(),
                    })
                    .await;
                let turn = state
                    .record_failure(&agent.name, kind, e.to_string())
                    .clone();
                self.observers
                    .emit(SessionEvent::TurnAppended { session_id, turn })
                    .await;
            }
        }
    }
}

/// Assembles an [`Orchestrator`], validating configuration and agents.
pub struct OrchestratorBuilder {
    config: OrchestratorConfig,
    agents: Vec<AgentDescriptor>,
    selection: Option<Box<dyn SelectionStrategy>>,
    termination: Option<Box<dyn TerminationPolicy>>,
    observers: ObserverChain,
    monitor: Option<Arc<AgentMonitor>>,
}

impl OrchestratorBuilder {
    /// Starts from `config` with no agents, observers or overrides.
    pub fn new(config: OrchestratorConfig) -> Self {
        Self {
            config,
            agents: Vec::new(),
            selection: None,
            termination: None,
            observers: ObserverChain::new(),
            monitor: None,
        }
    }

    /// Register an agent. Registration order is the round-robin order.
    pub fn agent(mut self, descriptor: AgentDescriptor) -> Self {
        self.agents.push(descriptor);
        self
    }

    /// Register every agent of an existing registry.
    pub fn agents(mut self, registry: AgentRegistry) -> Self {
        self.agents.extend(registry);
        self
    }

    /// Use a custom selection strategy instead of the configured one.
    pub fn selection(mut self, strategy: impl SelectionStrategy + 'static) -> Self {
        self.selection = Some(Box::new(strategy));
        self
    }

    /// Use a custom termination policy instead of the configured one.
    ///
    /// The round ceiling from the configuration is always enforced by the
    /// engine, whatever the policy says.
    pub fn termination(mut self, policy: impl TerminationPolicy + 'static) -> Self {
        self.termination = Some(Box::new(policy));
        self
    }

    /// Add a session observer.
    pub fn observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observers.add(observer);
        self
    }

    /// Share a monitor with other orchestrators.
    pub fn monitor(mut self, monitor: Arc<AgentMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    /// Validate and build.
    pub fn build(self) -> ConclaveResult<Orchestrator> {
        self.config.validate()?;

        let mut registry = AgentRegistry::new();
        for descriptor in self.agents {
            registry.register(descriptor)?;
        }
        if registry.is_empty() {
            return Err(ConclaveError::config("agent registry is empty"));
        }

        let selection = self
            .selection
            .unwrap_or_else(|| configured_selection(&self.config));
        selection.validate(&registry)?;

        let termination = self
            .termination
            .unwrap_or_else(|| configured_termination(&self.config));
        let aggregator = ResponseAggregator::new(&self.config.negative_finding_markers);

        Ok(Orchestrator {
            config: self.config,
            registry,
            selection,
            termination,
            aggregator,
            observers: self.observers,
            monitor: self.monitor.unwrap_or_default(),
        })
    }
}

fn configured_selection(config: &OrchestratorConfig) -> Box<dyn SelectionStrategy> {
    match config.selection_strategy {
        SelectionKind::RoundRobin => Box::new(RoundRobin),
        SelectionKind::KeywordMatch => Box::new(KeywordMatch),
        SelectionKind::LeadAgent => {
            Box::new(LeadAgent::new(config.lead_agent.clone().unwrap_or_default()))
        }
    }
}

fn configured_termination(config: &OrchestratorConfig) -> Box<dyn TerminationPolicy> {
    let standard = CompositePolicy::standard(
        config.max_rounds,
        config.completion_marker.clone(),
        config.marker_match,
    );
    let policy = match config.termination_policy {
        TerminationKind::CompletionMarker => standard,
        TerminationKind::NoFurtherAction => {
            standard.then(NoFurtherActionPolicy::new(&config.no_action_phrases))
        }
        TerminationKind::AllAgentsSpoken => standard.then(AllAgentsSpokenPolicy::new()),
    };
    Box::new(policy)
}
