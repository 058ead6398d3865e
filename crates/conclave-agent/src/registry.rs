use crate::handle::AgentHandle;
use conclave_core::{ConclaveError, ConclaveResult};
use std::fmt;
use std::sync::Arc;

/// A registered agent: unique name, capability tag and its handle.
#[derive(Clone)]
pub struct AgentDescriptor {
    /// Unique name within a registry. Used as the speaker name in turns.
    pub name: String,
    /// Capability tag, e.g. "policy-check" or "data-residency".
    pub capability: String,
    /// The invocation capability.
    pub handle: Arc<dyn AgentHandle>,
}

impl AgentDescriptor {
    /// Creates a descriptor.
    pub fn new(
        name: impl Into<String>,
        capability: impl Into<String>,
        handle: Arc<dyn AgentHandle>,
    ) -> Self {
        Self {
            name: name.into(),
            capability: capability.into(),
            handle,
        }
    }
}

impl fmt::Debug for AgentDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentDescriptor")
            .field("name", &self.name)
            .field("capability", &self.capability)
            .finish_non_exhaustive()
    }
}

/// Ordered set of agents with unique names.
///
/// Registration order is significant: it is the round-robin order and the
/// tie-break order for every selection strategy.
#[derive(Debug, Clone, Default)]
pub struct AgentRegistry {
    agents: Vec<AgentDescriptor>,
}

impl AgentRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an agent. Fails on a blank or duplicate name.
    pub fn register(&mut self, descriptor: AgentDescriptor) -> ConclaveResult<()> {
        if descriptor.name.trim().is_empty() {
            return Err(ConclaveError::config("agent name must not be empty"));
        }
        if self.get(&descriptor.name).is_some() {
            return Err(ConclaveError::config(format!(
                "agent '{}' is registered twice",
                descriptor.name
            )));
        }
        self.agents.push(descriptor);
        Ok(())
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, descriptor: AgentDescriptor) -> ConclaveResult<Self> {
        self.register(descriptor)?;
        Ok(self)
    }

    /// Looks an agent up by name.
    pub fn get(&self, name: &str) -> Option<&AgentDescriptor> {
        self.agents.iter().find(|a| a.name == name)
    }

    /// The agent at `index` in registration order.
    pub fn get_index(&self, index: usize) -> Option<&AgentDescriptor> {
        self.agents.get(index)
    }

    /// Registration index of `name`.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.agents.iter().position(|a| a.name == name)
    }

    /// Iterates in registration order.
    pub fn iter(&self) -> std::slice::Iter<'_, AgentDescriptor> {
        self.agents.iter()
    }

    /// Agent names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.agents.iter().map(|a| a.name.clone()).collect()
    }

    /// Number of registered agents.
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Whether no agent is registered.
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

impl IntoIterator for AgentRegistry {
    type Item = AgentDescriptor;
    type IntoIter = std::vec::IntoIter<AgentDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.agents.into_iter()
    }
}

impl<'a> IntoIterator for &'a AgentRegistry {
    type Item = &'a AgentDescriptor;
    type IntoIter = std::slice::Iter<'a, AgentDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.agents.iter()
    }
}
