//! Conversation Messages
//!
//! Provider-neutral message format. Each provider adapter renders these into
//! its own wire shape, and appends tool exchanges using its own structure
//! (see [`crate::provider::ProviderClient::append_tool_exchange`]).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Role of a message sender
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System prompt/instructions
    System,
    /// User input
    User,
    /// Assistant (LLM) response
    Assistant,
    /// Tool result (OpenAI-style histories)
    Tool,
}

impl Role {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured block inside a message
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text {
        text: String,
    },
    /// The model asked for a tool invocation
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    /// Outcome of a tool invocation, always carried as a string
    ToolResult {
        tool_use_id: String,
        tool_name: String,
        content: String,
        #[serde(default)]
        is_error: bool,
    },
}

/// Message body: plain text or a list of blocks
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    /// Concatenate every text block, ignoring tool blocks
    pub fn text(&self) -> String {
        match self {
            Self::Text(t) => t.clone(),
            Self::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    pub fn parts(&self) -> &[ContentPart] {
        match self {
            Self::Text(_) => &[],
            Self::Parts(parts) => parts,
        }
    }
}

impl Default for MessageContent {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

/// A single message in a conversation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: MessageContent,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: MessageContent::Text(content.into()),
        }
    }

    pub const fn with_parts(role: Role, parts: Vec<ContentPart>) -> Self {
        Self {
            role,
            content: MessageContent::Parts(parts),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Text content of the message
    pub fn text(&self) -> String {
        self.content.text()
    }

    /// Tool use blocks carried by this message
    pub fn tool_uses(&self) -> impl Iterator<Item = &ContentPart> {
        self.content
            .parts()
            .iter()
            .filter(|p| matches!(p, ContentPart::ToolUse { .. }))
    }

    /// Tool result blocks carried by this message
    pub fn tool_results(&self) -> impl Iterator<Item = &ContentPart> {
        self.content
            .parts()
            .iter()
            .filter(|p| matches!(p, ContentPart::ToolResult { .. }))
    }

    /// Rough token estimate (~4 characters per token)
    pub fn estimate_tokens(&self) -> u32 {
        let chars: usize = match &self.content {
            MessageContent::Text(t) => t.len(),
            MessageContent::Parts(parts) => parts
                .iter()
                .map(|p| match p {
                    ContentPart::Text { text } => text.len(),
                    ContentPart::ToolUse { name, input, .. } => name.len() + input.to_string().len(),
                    ContentPart::ToolResult { content, .. } => content.len(),
                })
                .sum(),
        };
        u32::try_from(chars / 4).unwrap_or(u32::MAX).saturating_add(4)
    }
}
