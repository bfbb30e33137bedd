//! Wire Formats
//!
//! The two function-calling dialects the assistant speaks.
//!
//! ```text
//! Anthropic                              OpenAI
//! ─────────                              ──────
//! assistant: [text, tool_use, tool_use]  assistant: content + tool_calls[2]
//! user:      [tool_result, tool_result]  tool: result #1
//!                                        tool: result #2
//! ```
//!
//! Histories are stored provider-neutrally, so after a failover a history
//! built in one structure still renders correctly for the other provider.

use serde_json::{Value, json};

use crate::message::{ContentPart, Message, MessageContent, Role};
use crate::tool::{ToolCall, ToolDefinition, ToolOutcome};

/// Function-calling dialect of a provider
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WireFormat {
    /// Anthropic Messages API
    Anthropic,
    /// OpenAI chat completions
    OpenAi,
}

impl WireFormat {
    pub fn format_tools(self, tools: &[ToolDefinition]) -> Vec<Value> {
        tools
            .iter()
            .map(|tool| match self {
                Self::Anthropic => json!({
                    "name": tool.name,
                    "description": tool.description,
                    "input_schema": tool.parameters,
                }),
                Self::OpenAi => json!({
                    "type": "function",
                    "function": {
                        "name": tool.name,
                        "description": tool.description,
                        "parameters": tool.parameters,
                    }
                }),
            })
            .collect()
    }

    pub fn tool_result_message(self, call: &ToolCall, outcome: &ToolOutcome) -> Message {
        let part = ContentPart::ToolResult {
            tool_use_id: call.id.clone(),
            tool_name: call.name.clone(),
            content: outcome.to_content(),
            is_error: !outcome.success,
        };
        let role = match self {
            Self::Anthropic => Role::User,
            Self::OpenAi => Role::Tool,
        };
        Message::with_parts(role, vec![part])
    }

    pub fn append_tool_exchange(
        self,
        history: &mut Vec<Message>,
        assistant_text: &str,
        calls: &[ToolCall],
        outcomes: &[ToolOutcome],
    ) {
        let mut assistant_parts = Vec::with_capacity(calls.len() + 1);
        if !assistant_text.is_empty() {
            assistant_parts.push(ContentPart::Text {
                text: assistant_text.to_string(),
            });
        }
        assistant_parts.extend(calls.iter().map(|call| ContentPart::ToolUse {
            id: call.id.clone(),
            name: call.name.clone(),
            input: Value::Object(call.arguments.clone()),
        }));
        history.push(Message::with_parts(Role::Assistant, assistant_parts));

        let results = calls
            .iter()
            .zip(outcomes)
            .map(|(call, outcome)| self.tool_result_message(call, outcome));

        match self {
            Self::Anthropic => {
                let combined = results
                    .flat_map(|msg| msg.content.parts().to_vec())
                    .collect();
                history.push(Message::with_parts(Role::User, combined));
            }
            Self::OpenAi => history.extend(results),
        }
    }

    /// Render a neutral history into wire messages.
    ///
    /// Anthropic output omits system messages (they travel in the top-level
    /// `system` field, see [`system_text`]).
    pub fn render_messages(self, messages: &[Message]) -> Vec<Value> {
        match self {
            Self::Anthropic => render_anthropic(messages),
            Self::OpenAi => messages.iter().flat_map(render_openai).collect(),
        }
    }
}

/// Text of all system messages, joined
pub fn system_text(messages: &[Message]) -> Option<String> {
    let parts: Vec<String> = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(Message::text)
        .filter(|t| !t.is_empty())
        .collect();
    (!parts.is_empty()).then(|| parts.join("\n\n"))
}

// ── Anthropic ──────────────────────────────────────────────────────

fn anthropic_block(part: &ContentPart) -> Value {
    match part {
        ContentPart::Text { text } => json!({"type": "text", "text": text}),
        ContentPart::ToolUse { id, name, input } => json!({
            "type": "tool_use",
            "id": id,
            "name": name,
            "input": input,
        }),
        ContentPart::ToolResult {
            tool_use_id,
            content,
            is_error,
            ..
        } => json!({
            "type": "tool_result",
            "tool_use_id": tool_use_id,
            "content": content,
            "is_error": is_error,
        }),
    }
}

fn render_anthropic(messages: &[Message]) -> Vec<Value> {
    // (role, blocks); consecutive same-role turns are merged because the
    // Messages API requires strict user/assistant alternation.
    let mut turns: Vec<(&'static str, Vec<Value>)> = Vec::new();

    for msg in messages {
        let role = match msg.role {
            Role::System => continue,
            Role::Assistant => "assistant",
            Role::User | Role::Tool => "user",
        };
        let blocks: Vec<Value> = match &msg.content {
            MessageContent::Text(t) if t.is_empty() => continue,
            MessageContent::Text(t) => vec![json!({"type": "text", "text": t})],
            MessageContent::Parts(parts) => parts
                .iter()
                .filter(|p| !matches!(p, ContentPart::Text { text } if text.is_empty()))
                .map(anthropic_block)
                .collect(),
        };
        if blocks.is_empty() {
            continue;
        }
        match turns.last_mut() {
            Some((last_role, last_blocks)) if *last_role == role => last_blocks.extend(blocks),
            _ => turns.push((role, blocks)),
        }
    }

    turns
        .into_iter()
        .map(|(role, blocks)| json!({"role": role, "content": blocks}))
        .collect()
}

// ── OpenAI ─────────────────────────────────────────────────────────

fn openai_tool_message(part: &ContentPart) -> Option<Value> {
    match part {
        ContentPart::ToolResult {
            tool_use_id,
            content,
            ..
        } => Some(json!({
            "role": "tool",
            "tool_call_id": tool_use_id,
            "content": content,
        })),
        _ => None,
    }
}

fn render_openai(msg: &Message) -> Vec<Value> {
    match (&msg.role, &msg.content) {
        (Role::Assistant, MessageContent::Parts(parts)) => {
            let text = msg.text();
            let tool_calls: Vec<Value> = parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::ToolUse { id, name, input } => Some(json!({
                        "id": id,
                        "type": "function",
                        "function": {
                            "name": name,
                            "arguments": input.to_string(),
                        }
                    })),
                    _ => None,
                })
                .collect();
            let mut obj = json!({"role": "assistant"});
            obj["content"] = if text.is_empty() {
                Value::Null
            } else {
                Value::String(text)
            };
            if !tool_calls.is_empty() {
                obj["tool_calls"] = Value::Array(tool_calls);
            }
            vec![obj]
        }
        (Role::Tool, MessageContent::Text(t)) => {
            vec![json!({"role": "tool", "tool_call_id": "", "content": t})]
        }
        (_, MessageContent::Parts(parts)) => {
            // Tool results answer the preceding assistant turn, so they go
            // first, one `tool` message each.
            let mut out: Vec<Value> = parts.iter().filter_map(openai_tool_message).collect();
            let text = msg.text();
            if !text.is_empty() {
                out.push(json!({"role": msg.role.as_str(), "content": text}));
            }
            out
        }
        (role, MessageContent::Text(t)) => vec![json!({"role": role.as_str(), "content": t})],
    }
}
