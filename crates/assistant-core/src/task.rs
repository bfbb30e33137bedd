//! Tasks and Agent Results
//!
//! A [`Task`] is built once per inbound request at the transport boundary and
//! flows by reference through router → agent → loop. Every agent answers with
//! an [`AgentResult`], including on failure.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

use crate::message::Message;
use crate::tool::Artifact;

/// Where a task came from; governs the routing path
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskSource {
    #[default]
    Mobile,
    Scheduler,
    Webhook,
    Teams,
}

impl TaskSource {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mobile => "mobile",
            Self::Scheduler => "scheduler",
            Self::Webhook => "webhook",
            Self::Teams => "teams",
        }
    }

    /// Interactive sources are routed by department and keywords
    pub const fn is_interactive(self) -> bool {
        matches!(self, Self::Mobile | Self::Teams)
    }
}

impl std::fmt::Display for TaskSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The unit of work
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Task {
    /// Free-text request
    #[serde(default)]
    pub message: String,

    /// Prior turns, oldest first
    #[serde(default)]
    pub messages: Vec<Message>,

    /// Home department of the requester
    #[serde(default)]
    pub department: Option<String>,

    #[serde(default)]
    pub role: Option<String>,

    #[serde(default)]
    pub source: TaskSource,

    #[serde(default)]
    pub user_id: Option<String>,

    #[serde(default)]
    pub permissions: BTreeSet<String>,

    /// Webhook event name
    #[serde(default)]
    pub event: Option<String>,

    /// Webhook payload
    #[serde(default)]
    pub payload: Option<Value>,

    /// Explicit target agent (scheduler jobs)
    #[serde(default)]
    pub agent: Option<String>,
}

impl Task {
    pub fn new(message: impl Into<String>, source: TaskSource) -> Self {
        Self {
            message: message.into(),
            source,
            ..Default::default()
        }
    }

    /// Webhook task for an event and its payload
    pub fn webhook(event: impl Into<String>, payload: Value) -> Self {
        let event = event.into();
        Self {
            message: format!("Webhook event received: {event}"),
            source: TaskSource::Webhook,
            event: Some(event),
            payload: Some(payload),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_department(mut self, department: impl Into<String>) -> Self {
        self.department = Some(department.into());
        self
    }

    #[must_use]
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    #[must_use]
    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = Some(agent.into());
        self
    }

    #[must_use]
    pub fn with_history(mut self, messages: Vec<Message>) -> Self {
        self.messages = messages;
        self
    }

    /// Lower-cased department, if any
    pub fn department_key(&self) -> Option<String> {
        self.department
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_lowercase)
    }

    /// Lower-cased message, for keyword matching
    pub fn message_lower(&self) -> String {
        self.message.to_lowercase()
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }
}

/// Uniform result of dispatch and of every agent
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentResult {
    pub success: bool,
    pub content: String,
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
    #[serde(default)]
    pub tools_called: Vec<String>,
    /// Agent that handled the task; `"none"` when nothing was resolved
    #[serde(default)]
    pub agent_used: Option<String>,
}

/// `agent_used` value when no agent handled the task
pub const NO_AGENT: &str = "none";

impl AgentResult {
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            success: true,
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn failure(content: impl Into<String>) -> Self {
        Self {
            success: false,
            content: content.into(),
            ..Default::default()
        }
    }

    /// Failure not attributed to any agent
    pub fn unrouted(content: impl Into<String>) -> Self {
        Self::failure(content).with_agent(NO_AGENT)
    }

    #[must_use]
    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.agent_used = Some(agent.into());
        self
    }

    #[must_use]
    pub fn with_tools(mut self, tools_called: Vec<String>) -> Self {
        self.tools_called = tools_called;
        self
    }

    #[must_use]
    pub fn with_artifacts(mut self, artifacts: Vec<Artifact>) -> Self {
        self.artifacts = artifacts;
        self
    }
}
