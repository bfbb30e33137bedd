//! Department Agents
//!
//! An [`Agent`] owns one department's persona, keywords and tool subset.
//! The [`AgentRegistry`] holds agents in declaration order and resolves
//! interactive tasks to one of them.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;
use crate::task::{AgentResult, Task};

/// Department that is served by the cross-department agent
pub const MANAGEMENT_DEPARTMENT: &str = "management";

/// Agent name derived from a type path: `my_crate::FinanceAgent` → `finance`
pub fn agent_name_from_type(type_name: &str) -> String {
    let short = type_name
        .split('<')
        .next()
        .unwrap_or(type_name)
        .rsplit("::")
        .next()
        .unwrap_or(type_name);
    let short = short.strip_suffix("Agent").unwrap_or(short);
    short.to_lowercase()
}

/// A department handler
#[async_trait]
pub trait Agent: Send + Sync {
    /// Registry name; defaults to the lower-cased type name without `Agent`
    fn name(&self) -> String {
        agent_name_from_type(std::any::type_name::<Self>())
    }

    /// Department this agent owns
    fn department(&self) -> &str;

    /// Cheap, synchronous relevance check
    fn can_handle(&self, task: &Task) -> bool;

    async fn execute(&self, task: &Task) -> Result<AgentResult>;
}

/// Ordered collection of agents
#[derive(Clone, Default)]
pub struct AgentRegistry {
    agents: Vec<Arc<dyn Agent>>,
    default_agent: Option<String>,
    cross_department: Option<String>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an agent; declaration order decides keyword ties
    pub fn register<A: Agent + 'static>(&mut self, agent: A) {
        self.register_arc(Arc::new(agent));
    }

    pub fn register_arc(&mut self, agent: Arc<dyn Agent>) {
        tracing::debug!(agent = %agent.name(), department = %agent.department(), "Registered agent");
        self.agents.push(agent);
    }

    /// Agent used for departments that no agent owns
    #[must_use]
    pub fn with_default_agent(mut self, name: impl Into<String>) -> Self {
        self.default_agent = Some(name.into());
        self
    }

    /// Agent used for the management department
    #[must_use]
    pub fn with_cross_department(mut self, name: impl Into<String>) -> Self {
        self.cross_department = Some(name.into());
        self
    }

    /// Look up by agent name or owned department
    pub fn get(&self, name: &str) -> Option<Arc<dyn Agent>> {
        let key = name.trim().to_lowercase();
        self.agents
            .iter()
            .find(|a| a.name() == key)
            .or_else(|| self.agents.iter().find(|a| a.department() == key))
            .cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.agents.iter().map(|a| a.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    fn owner_of(&self, department: &str) -> Option<&Arc<dyn Agent>> {
        self.agents.iter().find(|a| a.department() == department)
    }

    /// Resolve an interactive task.
    ///
    /// Order: the department's own agent if it accepts the task, then the
    /// first agent whose keywords match, then department defaults. `None`
    /// means the requester should be asked to clarify.
    pub fn select_agent(&self, task: &Task) -> Option<Arc<dyn Agent>> {
        let department = task.department_key();

        if let Some(owner) = department.as_deref().and_then(|d| self.owner_of(d)) {
            if owner.can_handle(task) {
                return Some(owner.clone());
            }
        }

        if let Some(agent) = self.agents.iter().find(|a| a.can_handle(task)) {
            return Some(agent.clone());
        }

        let department = department?;
        if department == MANAGEMENT_DEPARTMENT {
            if let Some(agent) = self.cross_department.as_deref().and_then(|n| self.get(n)) {
                return Some(agent);
            }
        }
        if let Some(owner) = self.owner_of(&department) {
            return Some(owner.clone());
        }
        self.default_agent.as_deref().and_then(|n| self.get(n))
    }
}
