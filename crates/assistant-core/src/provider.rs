//! LLM Provider Abstraction
//!
//! The assistant talks to exactly two backends: a Claude-style provider
//! (Anthropic Messages API) and a Kimi-style provider (OpenAI chat
//! completions). Both sit behind [`ProviderClient`]; which wire structure a
//! client uses for tool exchanges is fixed by its [`WireFormat`].
//!
//! ## Usage
//!
//! ```rust,ignore
//! use assistant_core::provider::{ChatRequest, ProviderClient};
//!
//! let response = provider.chat(&ChatRequest::new(history)).await?;
//! if response.has_tool_calls() {
//!     provider.append_tool_exchange(&mut history, &response.content, &calls, &outcomes);
//! }
//! ```

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::Result;
use crate::message::Message;
use crate::tool::{ToolCall, ToolDefinition, ToolOutcome};
use crate::wire::WireFormat;

/// Identifies one of the two supported backends
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    /// Default provider, Anthropic wire format
    Claude,
    /// Chinese-language / APAC provider, OpenAI wire format
    Kimi,
}

impl ProviderId {
    /// The failover partner
    pub const fn other(self) -> Self {
        match self {
            Self::Claude => Self::Kimi,
            Self::Kimi => Self::Claude,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Claude => "claude",
            Self::Kimi => "kimi",
        }
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A provider-agnostic chat request
#[derive(Clone, Debug, Default)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    /// Tool definitions the model may invoke
    pub tools: Vec<ToolDefinition>,
    pub system: Option<String>,
    /// `None` lets the adapter choose
    pub max_tokens: Option<u32>,
}

impl ChatRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    #[must_use]
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    #[must_use]
    pub const fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Token usage statistics
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub const fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    pub const fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

impl std::ops::AddAssign for TokenUsage {
    fn add_assign(&mut self, rhs: Self) {
        self.input_tokens += rhs.input_tokens;
        self.output_tokens += rhs.output_tokens;
    }
}

/// Normalized response from a chat call
#[derive(Clone, Debug, Default)]
pub struct ChatResponse {
    /// Text content; empty when the model produced no text blocks
    pub content: String,
    /// Tool calls in the order the model emitted them
    pub tool_calls: Vec<ToolCall>,
    pub stop_reason: Option<String>,
    pub usage: TokenUsage,
    /// Model that actually produced the response
    pub model: String,
}

impl ChatResponse {
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Stream of text chunks from a streaming chat
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// One LLM backend.
///
/// `chat` surfaces every network or API failure to the caller; recovery is
/// the tool-calling loop's job. Streaming never carries tools.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    fn id(&self) -> ProviderId;

    /// Default model identifier this client sends
    fn model(&self) -> &str;

    /// Wire structure used for tools and tool exchanges
    fn wire_format(&self) -> WireFormat;

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse>;

    async fn stream_chat(&self, messages: &[Message], system: Option<&str>) -> Result<TextStream>;

    /// Translate generic tool definitions into this provider's wire shape
    fn format_tools(&self, tools: &[ToolDefinition]) -> Vec<Value> {
        self.wire_format().format_tools(tools)
    }

    /// Wrap one executed tool's outcome as a history message
    fn tool_result_message(&self, call: &ToolCall, outcome: &ToolOutcome) -> Message {
        self.wire_format().tool_result_message(call, outcome)
    }

    /// Append one iteration's tool calls and their outcomes to `history`
    fn append_tool_exchange(
        &self,
        history: &mut Vec<Message>,
        assistant_text: &str,
        calls: &[ToolCall],
        outcomes: &[ToolOutcome],
    ) {
        self.wire_format()
            .append_tool_exchange(history, assistant_text, calls, outcomes);
    }
}

/// The two configured providers, addressed by [`ProviderId`]
#[derive(Clone)]
pub struct ProviderSet {
    claude: Arc<dyn ProviderClient>,
    kimi: Arc<dyn ProviderClient>,
}

impl ProviderSet {
    pub fn new(claude: Arc<dyn ProviderClient>, kimi: Arc<dyn ProviderClient>) -> Self {
        Self { claude, kimi }
    }

    pub fn get(&self, id: ProviderId) -> &Arc<dyn ProviderClient> {
        match id {
            ProviderId::Claude => &self.claude,
            ProviderId::Kimi => &self.kimi,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failover_partner() {
        assert_eq!(ProviderId::Claude.other(), ProviderId::Kimi);
        assert_eq!(ProviderId::Kimi.other(), ProviderId::Claude);
    }

    #[test]
    fn test_usage_accumulates() {
        let mut total = TokenUsage::default();
        total += TokenUsage::new(10, 3);
        total += TokenUsage::new(5, 2);
        assert_eq!(total, TokenUsage::new(15, 5));
        assert_eq!(total.total(), 20);
    }

    #[test]
    fn test_request_builder() {
        let req = ChatRequest::new(vec![Message::user("hi")])
            .with_system("be brief")
            .with_max_tokens(256);
        assert_eq!(req.system.as_deref(), Some("be brief"));
        assert_eq!(req.max_tokens, Some(256));
        assert!(req.tools.is_empty());
    }
}
