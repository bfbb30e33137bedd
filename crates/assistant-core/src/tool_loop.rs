//! Tool-Calling Loop
//!
//! Drives the bounded exchange between one LLM provider and the tool
//! registry:
//!
//! ```text
//! select provider ──▶ chat ──▶ tool calls? ──no──▶ final answer
//!                      ▲  │         │yes
//!          failover ───┘  │         ▼
//!     (other provider,    │    execute tools in order,
//!      costs a step)      │    append exchange in the
//!                         │    answering provider's format
//!                         └─────────┘  (at most max_iterations + 1 calls)
//! ```
//!
//! Every path returns a [`LoopOutcome`]; only a step on which both providers
//! fail yields `success == false`. Hitting the step cap is a soft limit.

use chrono::Utc;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use crate::error::{AssistantError, Result};
use crate::message::Message;
use crate::provider::{ChatRequest, ChatResponse, ProviderId, ProviderSet, TextStream, TokenUsage};
use crate::selector::{SelectionContext, select_provider};
use crate::task::Task;
use crate::tool::{Artifact, ToolCall, ToolOutcome, ToolRegistry};
use crate::usage::{UsageRecord, UsageRecorder};

/// Default cap on provider round trips per request
pub const DEFAULT_MAX_ITERATIONS: usize = 5;

const DEFAULT_MAX_TOKENS: u32 = 4096;

const DEFAULT_SYSTEM_PROMPT: &str = r"You are a business assistant serving the departments of a company.

Use the available tools whenever a question depends on company data.
Call several tools in one step when they are independent.
After receiving tool results, answer concisely and cite the figures you used.
If the request is ambiguous, ask one clarifying question instead of guessing.";

const BOTH_PROVIDERS_DOWN: &str = "I'm sorry, but the AI service is temporarily unavailable. \
Please try again in a few minutes.";

/// Loop configuration
#[derive(Clone, Debug)]
pub struct LoopConfig {
    /// Base system prompt used when a caller supplies none
    pub system_prompt: String,

    /// Maximum provider round trips before returning a partial answer
    pub max_iterations: usize,

    /// Output token budget per provider call
    pub max_tokens: u32,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

/// Per-call overrides
#[derive(Clone, Debug, Default)]
pub struct LoopOptions {
    /// Restrict the tools offered to the model
    pub tool_filter: Option<Vec<String>>,

    pub max_iterations: Option<usize>,

    /// Replaces the configured base prompt (task context is still appended)
    pub system_prompt: Option<String>,
}

impl LoopOptions {
    #[must_use]
    pub fn tools<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tool_filter = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Override the step cap for this call; zero counts as one
    #[must_use]
    pub const fn max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = Some(max);
        self
    }

    #[must_use]
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }
}

/// Token totals plus the model that produced the last answer
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageSummary {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub model: String,
}

/// Result of one loop run
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LoopOutcome {
    pub success: bool,
    pub content: String,
    /// Provider round trips taken (a failover does not count twice)
    pub iterations: usize,
    /// Tool names in invocation order
    pub tools_called: Vec<String>,
    pub usage: UsageSummary,
    pub artifacts: Vec<Artifact>,
    /// Provider that answered last
    pub provider: Option<ProviderId>,
}

/// The tool-calling loop
pub struct ToolCallLoop {
    providers: ProviderSet,
    tools: Arc<ToolRegistry>,
    usage: UsageRecorder,
    config: LoopConfig,
}

impl ToolCallLoop {
    pub fn new(
        providers: ProviderSet,
        tools: Arc<ToolRegistry>,
        usage: UsageRecorder,
        config: LoopConfig,
    ) -> Self {
        Self {
            providers,
            tools,
            usage,
            config,
        }
    }

    /// Create with default configuration and no usage tracking
    pub fn with_defaults(providers: ProviderSet, tools: Arc<ToolRegistry>) -> Self {
        Self::new(providers, tools, UsageRecorder::disabled(), LoopConfig::default())
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub const fn config(&self) -> &LoopConfig {
        &self.config
    }

    pub const fn providers(&self) -> &ProviderSet {
        &self.providers
    }

    /// Build the system prompt: base persona plus the task's context
    pub fn build_system_prompt(&self, task: &Task, base: Option<&str>) -> String {
        let mut prompt = base.unwrap_or(&self.config.system_prompt).to_string();

        prompt.push_str("\n\n## Context\n");
        if let Some(department) = task.department.as_deref() {
            prompt.push_str(&format!("- Requester department: {department}\n"));
        }
        if let Some(role) = task.role.as_deref() {
            prompt.push_str(&format!("- Requester role: {role}\n"));
        }
        prompt.push_str(&format!("- Request channel: {}\n", task.source));
        prompt.push_str(&format!("- Today: {}\n", Utc::now().format("%Y-%m-%d (%A)")));

        prompt
    }

    /// Run with the configured iteration cap
    pub async fn execute(&self, task: &Task, tool_filter: Option<&[&str]>) -> LoopOutcome {
        let options = LoopOptions {
            tool_filter: tool_filter.map(|names| names.iter().map(|s| (*s).to_string()).collect()),
            ..Default::default()
        };
        self.execute_with(task, &options).await
    }

    /// Run the loop for a task
    pub async fn execute_with(&self, task: &Task, options: &LoopOptions) -> LoopOutcome {
        let selected = select_provider(&task.message, Some(&SelectionContext::from(task)));
        let max_iterations = options
            .max_iterations
            .unwrap_or(self.config.max_iterations)
            .max(1);

        let allow: Option<Vec<&str>> = options
            .tool_filter
            .as_ref()
            .map(|names| names.iter().map(String::as_str).collect());
        let tool_defs = self.tools.definitions(allow.as_deref());
        let system = self.build_system_prompt(task, options.system_prompt.as_deref());

        let mut history = initial_history(task);
        let mut tools_called: Vec<String> = Vec::new();
        let mut artifacts: Vec<Artifact> = Vec::new();
        let mut total = TokenUsage::default();
        let mut model = String::new();
        let mut active = selected;

        tracing::debug!(
            provider = %selected,
            tools = tool_defs.len(),
            max_iterations,
            "Starting tool loop"
        );

        // A step is one provider call; an answer from the fallback costs two
        let mut step = 0;
        while step < max_iterations {
            step += 1;
            let request = ChatRequest {
                messages: history.clone(),
                tools: tool_defs.clone(),
                system: Some(system.clone()),
                max_tokens: Some(self.config.max_tokens),
            };

            let Ok((answered_by, response)) = self.chat_with_failover(selected, &request).await
            else {
                return LoopOutcome {
                    success: false,
                    content: BOTH_PROVIDERS_DOWN.into(),
                    iterations: step.min(max_iterations),
                    tools_called,
                    usage: summary(total, model),
                    artifacts,
                    provider: None,
                };
            };

            if answered_by != selected {
                step += 1;
            }
            active = answered_by;
            total += response.usage;
            model = if response.model.is_empty() {
                self.providers.get(active).model().to_string()
            } else {
                response.model.clone()
            };

            if !response.has_tool_calls() {
                tracing::debug!(provider = %active, step, "Final answer");
                let usage = summary(total, model);
                self.record_usage(task, &usage);
                return LoopOutcome {
                    success: true,
                    content: response.content,
                    iterations: step.min(max_iterations),
                    tools_called,
                    usage,
                    artifacts,
                    provider: Some(active),
                };
            }

            let ChatResponse {
                content,
                tool_calls,
                ..
            } = response;

            let mut outcomes = Vec::with_capacity(tool_calls.len());
            for call in &tool_calls {
                tracing::debug!(tool = %call.name, step, "Executing tool");
                tools_called.push(call.name.clone());
                let outcome = self.run_tool(call).await;
                artifacts.extend(outcome.artifacts.iter().cloned());
                outcomes.push(outcome);
            }

            self.providers
                .get(active)
                .append_tool_exchange(&mut history, &content, &tool_calls, &outcomes);
        }

        tracing::warn!(max_iterations, tools = ?tools_called, "Tool loop hit its step limit");
        let usage = summary(total, model);
        self.record_usage(task, &usage);

        LoopOutcome {
            success: true,
            content: capped_message(max_iterations, &tools_called),
            iterations: max_iterations,
            tools_called,
            usage,
            artifacts,
            provider: Some(active),
        }
    }

    /// Open a streaming chat (no tools), failing over if the stream cannot
    /// be opened on the selected provider
    pub async fn stream(&self, task: &Task) -> Result<(ProviderId, TextStream)> {
        let selected = select_provider(&task.message, Some(&SelectionContext::from(task)));
        let history = initial_history(task);
        let system = self.build_system_prompt(task, None);

        match self
            .providers
            .get(selected)
            .stream_chat(&history, Some(&system))
            .await
        {
            Ok(stream) => Ok((selected, stream)),
            Err(e) => {
                let fallback = selected.other();
                tracing::warn!(provider = %selected, fallback = %fallback, error = %e, "Stream failed to open, failing over");
                let stream = self
                    .providers
                    .get(fallback)
                    .stream_chat(&history, Some(&system))
                    .await?;
                Ok((fallback, stream))
            }
        }
    }

    /// One chat call with a single cross-provider retry
    async fn chat_with_failover(
        &self,
        selected: ProviderId,
        request: &ChatRequest,
    ) -> Result<(ProviderId, ChatResponse)> {
        let primary_err = match self.providers.get(selected).chat(request).await {
            Ok(response) => return Ok((selected, response)),
            Err(e) => e,
        };

        let fallback = selected.other();
        tracing::warn!(
            provider = %selected,
            fallback = %fallback,
            error = %primary_err,
            "Provider call failed, failing over"
        );

        match self.providers.get(fallback).chat(request).await {
            Ok(response) => Ok((fallback, response)),
            Err(e) => {
                tracing::error!(
                    primary_error = %primary_err,
                    fallback_error = %e,
                    "Both providers failed"
                );
                Err(e)
            }
        }
    }

    /// Execute one tool call; never fails
    async fn run_tool(&self, call: &ToolCall) -> ToolOutcome {
        let result = AssertUnwindSafe(self.tools.execute(&call.name, &call.arguments))
            .catch_unwind()
            .await;

        match result {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                tracing::warn!(tool = %call.name, error = %e, "Tool call failed");
                ToolOutcome::failure(e.to_string())
            }
            Err(_) => {
                tracing::error!(tool = %call.name, "Tool panicked");
                ToolOutcome::failure(AssistantError::ToolExecution(format!("{} panicked", call.name)).to_string())
            }
        }
    }

    fn record_usage(&self, task: &Task, usage: &UsageSummary) {
        self.usage.record(UsageRecord {
            model: usage.model.clone(),
            department: task.department.clone(),
            user_id: task.user_id.clone(),
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
            recorded_at: Utc::now(),
        });
    }
}

fn initial_history(task: &Task) -> Vec<Message> {
    let mut history = task.messages.clone();
    if !task.message.is_empty() || history.is_empty() {
        history.push(Message::user(task.message.clone()));
    }
    history
}

fn summary(total: TokenUsage, model: String) -> UsageSummary {
    UsageSummary {
        input_tokens: total.input_tokens,
        output_tokens: total.output_tokens,
        model,
    }
}

fn capped_message(steps: usize, tools_called: &[String]) -> String {
    let mut used: Vec<&str> = Vec::new();
    for name in tools_called {
        if !used.contains(&name.as_str()) {
            used.push(name);
        }
    }
    let tools = if used.is_empty() {
        "no tools".to_string()
    } else {
        used.join(", ")
    };
    format!(
        "I completed {steps} steps (tools used: {tools}) but could not finish within the step limit. \
         Could you narrow the request, for example to one report or one time period?"
    )
}

/// Builder for the loop
pub struct ToolCallLoopBuilder {
    providers: Option<ProviderSet>,
    tools: ToolRegistry,
    usage: UsageRecorder,
    config: LoopConfig,
}

impl Default for ToolCallLoopBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolCallLoopBuilder {
    pub fn new() -> Self {
        Self {
            providers: None,
            tools: ToolRegistry::new(),
            usage: UsageRecorder::disabled(),
            config: LoopConfig::default(),
        }
    }

    #[must_use]
    pub fn providers(mut self, providers: ProviderSet) -> Self {
        self.providers = Some(providers);
        self
    }

    #[must_use]
    pub fn tool<T: crate::tool::Tool + 'static>(mut self, tool: T) -> Self {
        self.tools.register(tool);
        self
    }

    #[must_use]
    pub fn tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    #[must_use]
    pub fn usage(mut self, usage: UsageRecorder) -> Self {
        self.usage = usage;
        self
    }

    #[must_use]
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = prompt.into();
        self
    }

    #[must_use]
    pub const fn max_iterations(mut self, max: usize) -> Self {
        self.config.max_iterations = max;
        self
    }

    #[must_use]
    pub const fn max_tokens(mut self, max: u32) -> Self {
        self.config.max_tokens = max;
        self
    }

    pub fn build(self) -> Result<ToolCallLoop> {
        let providers = self
            .providers
            .ok_or_else(|| AssistantError::Config("Providers are required".into()))?;
        if self.config.max_iterations == 0 {
            return Err(AssistantError::Config("max_iterations must be at least 1".into()));
        }

        Ok(ToolCallLoop::new(
            providers,
            Arc::new(self.tools),
            self.usage,
            self.config,
        ))
    }
}
