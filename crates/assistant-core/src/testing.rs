//! Test doubles
//!
//! Scripted providers and recording tools for exercising the loop and the
//! dispatcher without network access. Enabled for this crate's tests and for
//! dependents through the `testing` feature.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{AssistantError, Result};
use crate::message::Message;
use crate::provider::{
    ChatRequest, ChatResponse, ProviderClient, ProviderId, ProviderSet, TextStream, TokenUsage,
};
use crate::tool::{Tool, ToolArguments, ToolCall, ToolDefinition, ToolOutcome};
use crate::wire::WireFormat;

#[derive(Clone, Debug)]
enum Step {
    Reply(ChatResponse),
    Fail(String),
}

/// Provider that plays back a fixed script of responses.
///
/// Steps are consumed in order; once the script is exhausted the `repeat`
/// step (if any) is returned forever, otherwise the call fails.
pub struct ScriptedProvider {
    id: ProviderId,
    model: String,
    script: Mutex<VecDeque<Step>>,
    repeat: Option<Step>,
    calls: AtomicUsize,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedProvider {
    pub fn new(id: ProviderId) -> Self {
        let model = match id {
            ProviderId::Claude => "claude-scripted",
            ProviderId::Kimi => "kimi-scripted",
        };
        Self {
            id,
            model: model.into(),
            script: Mutex::new(VecDeque::new()),
            repeat: None,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn claude() -> Self {
        Self::new(ProviderId::Claude)
    }

    pub fn kimi() -> Self {
        Self::new(ProviderId::Kimi)
    }

    fn push(self, step: Step) -> Self {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(step);
        self
    }

    fn response(&self, content: &str, tool_calls: Vec<ToolCall>, input: u64, output: u64) -> ChatResponse {
        let stop_reason = if tool_calls.is_empty() { "end_turn" } else { "tool_use" };
        ChatResponse {
            content: content.into(),
            tool_calls,
            stop_reason: Some(stop_reason.into()),
            usage: TokenUsage::new(input, output),
            model: self.model.clone(),
        }
    }

    /// Answer with text
    #[must_use]
    pub fn reply(self, content: &str, input: u64, output: u64) -> Self {
        let step = Step::Reply(self.response(content, Vec::new(), input, output));
        self.push(step)
    }

    /// Request one tool
    #[must_use]
    pub fn tool_call(self, name: &str, arguments: Value, input: u64, output: u64) -> Self {
        let call = ToolCall::new(call_id(), name, arguments);
        self.tool_calls(vec![call], input, output)
    }

    /// Request several tools in one step
    #[must_use]
    pub fn tool_calls(self, calls: Vec<ToolCall>, input: u64, output: u64) -> Self {
        let step = Step::Reply(self.response("", calls, input, output));
        self.push(step)
    }

    /// Fail the next call
    #[must_use]
    pub fn fail(self, message: &str) -> Self {
        self.push(Step::Fail(message.into()))
    }

    /// Request the same tool on every call once the script runs out
    #[must_use]
    pub fn always_tool_call(mut self, name: &str, arguments: Value, input: u64, output: u64) -> Self {
        let call = ToolCall::new(call_id(), name, arguments);
        self.repeat = Some(Step::Reply(self.response("", vec![call], input, output)));
        self
    }

    /// Fail every call once the script runs out
    #[must_use]
    pub fn always_fail(mut self, message: &str) -> Self {
        self.repeat = Some(Step::Fail(message.into()));
        self
    }

    /// Number of `chat` and `stream_chat` calls received
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every chat request received, in order
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn model_name(&self) -> &str {
        &self.model
    }

    fn next_step(&self) -> Step {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        next.or_else(|| self.repeat.clone())
            .unwrap_or_else(|| Step::Fail("script exhausted".into()))
    }

    fn fail_with(&self, message: String) -> AssistantError {
        AssistantError::Provider {
            provider: self.id.to_string(),
            message,
        }
    }
}

#[async_trait]
impl ProviderClient for ScriptedProvider {
    fn id(&self) -> ProviderId {
        self.id
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn wire_format(&self) -> WireFormat {
        match self.id {
            ProviderId::Claude => WireFormat::Anthropic,
            ProviderId::Kimi => WireFormat::OpenAi,
        }
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());
        match self.next_step() {
            Step::Reply(response) => Ok(response),
            Step::Fail(message) => Err(self.fail_with(message)),
        }
    }

    async fn stream_chat(&self, _messages: &[Message], _system: Option<&str>) -> Result<TextStream> {
        match self.next_step() {
            Step::Reply(response) => {
                let chunks: Vec<Result<String>> = response
                    .content
                    .split_inclusive(' ')
                    .map(|word| Ok(word.to_string()))
                    .collect();
                Ok(Box::pin(futures::stream::iter(chunks)))
            }
            Step::Fail(message) => Err(self.fail_with(message)),
        }
    }
}

/// Wrap two scripted providers in a [`ProviderSet`]
pub fn provider_set(claude: &Arc<ScriptedProvider>, kimi: &Arc<ScriptedProvider>) -> ProviderSet {
    ProviderSet::new(claude.clone(), kimi.clone())
}

fn call_id() -> String {
    format!("call_{}", uuid::Uuid::new_v4().simple())
}

fn any_object_schema() -> Value {
    json!({"type": "object", "properties": {}})
}

/// Shared invocation log
pub type CallLog = Arc<Mutex<Vec<String>>>;

/// Tool that records its invocations and echoes its arguments
pub struct RecordingTool {
    name: String,
    log: CallLog,
}

impl RecordingTool {
    pub fn new(name: &str, log: &CallLog) -> Self {
        Self {
            name: name.into(),
            log: log.clone(),
        }
    }

    pub fn log() -> CallLog {
        Arc::new(Mutex::new(Vec::new()))
    }

    pub fn entries(log: &CallLog) -> Vec<String> {
        log.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl Tool for RecordingTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(&self.name, format!("Test tool {}", self.name), any_object_schema())
    }

    async fn execute(&self, arguments: &ToolArguments) -> Result<ToolOutcome> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(self.name.clone());
        Ok(ToolOutcome::success(json!({
            "tool": self.name,
            "arguments": Value::Object(arguments.clone()),
        })))
    }
}

/// Tool whose execution always returns an error
pub struct FailingTool {
    name: String,
}

impl FailingTool {
    pub fn new(name: &str) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Tool for FailingTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(&self.name, "Always fails", any_object_schema())
    }

    async fn execute(&self, _arguments: &ToolArguments) -> Result<ToolOutcome> {
        Err(AssistantError::ToolExecution(format!("{} is unavailable", self.name)))
    }
}

/// Tool that panics when executed
pub struct PanickingTool {
    name: String,
}

impl PanickingTool {
    pub fn new(name: &str) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Tool for PanickingTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(&self.name, "Always panics", any_object_schema())
    }

    #[allow(clippy::panic)]
    async fn execute(&self, _arguments: &ToolArguments) -> Result<ToolOutcome> {
        panic!("{} exploded", self.name)
    }
}
