//! Kimi Provider
//!
//! Moonshot's OpenAI-compatible chat completions endpoint
//! (`POST {base}/chat/completions`).

use assistant_core::{
    error::Result,
    message::Message,
    provider::{ChatRequest, ChatResponse, ProviderClient, ProviderId, TextStream, TokenUsage},
    tool::ToolCall,
    wire::WireFormat,
};
use async_trait::async_trait;
use serde_json::{Map, Value, json};

use crate::config::ProviderConfig;
use crate::error::AdapterError;
use crate::http;
use crate::sse;

/// Kimi-style provider
pub struct KimiProvider {
    config: ProviderConfig,
    client: reqwest::Client,
}

impl KimiProvider {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let client = http::build_client(config.timeout)?;
        Ok(Self { config, client })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.config.base_url)
    }

    fn authed_post(&self) -> Result<reqwest::RequestBuilder> {
        let key = self
            .config
            .api_key
            .as_deref()
            .ok_or(AdapterError::NotConfigured(ProviderId::Kimi))?;
        Ok(self.client.post(self.completions_url()).bearer_auth(key))
    }

    fn build_body(
        &self,
        messages: &[Message],
        system: Option<&str>,
        tools: Vec<Value>,
        max_tokens: Option<u32>,
        stream: bool,
    ) -> Value {
        let mut rendered = Vec::with_capacity(messages.len() + 1);
        if let Some(system) = system.filter(|s| !s.is_empty()) {
            rendered.push(json!({"role": "system", "content": system}));
        }
        rendered.extend(WireFormat::OpenAi.render_messages(messages));

        let mut body = json!({
            "model": self.config.model,
            "messages": rendered,
        });
        if let Some(max_tokens) = max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        if !tools.is_empty() {
            body["tools"] = Value::Array(tools);
            body["tool_choice"] = Value::String("auto".into());
        }
        if stream {
            body["stream"] = Value::Bool(true);
        }
        body
    }
}

/// Decode `function.arguments`, which arrives as a JSON-encoded string
fn parse_arguments(name: &str, raw: Option<&Value>) -> Value {
    match raw {
        Some(Value::String(s)) if s.trim().is_empty() => Value::Object(Map::new()),
        Some(Value::String(s)) => serde_json::from_str(s).unwrap_or_else(|e| {
            tracing::warn!(tool = %name, error = %e, "Tool arguments are not valid JSON");
            Value::Object(Map::new())
        }),
        Some(other) => other.clone(),
        None => Value::Object(Map::new()),
    }
}

fn parse_tool_calls(message: &Value) -> Vec<ToolCall> {
    let Some(calls) = message.get("tool_calls").and_then(Value::as_array) else {
        return Vec::new();
    };

    calls
        .iter()
        .filter_map(|call| {
            let function = call.get("function")?;
            let name = function.get("name").and_then(Value::as_str)?;
            let id = call
                .get("id")
                .and_then(Value::as_str)
                .filter(|id| !id.is_empty())
                .map_or_else(http::fallback_call_id, str::to_string);
            Some(ToolCall::new(
                id,
                name,
                parse_arguments(name, function.get("arguments")),
            ))
        })
        .collect()
}

/// Normalize a chat completions response body
pub(crate) fn parse_response(body: &Value, fallback_model: &str) -> Result<ChatResponse> {
    let choice = body
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|c| c.first())
        .ok_or(AdapterError::MissingField {
            provider: ProviderId::Kimi,
            field: "choices",
        })?;
    let message = choice.get("message").ok_or(AdapterError::MissingField {
        provider: ProviderId::Kimi,
        field: "message",
    })?;

    let usage = body.get("usage").map_or_else(TokenUsage::default, |u| {
        TokenUsage::new(
            u.get("prompt_tokens").and_then(Value::as_u64).unwrap_or(0),
            u.get("completion_tokens").and_then(Value::as_u64).unwrap_or(0),
        )
    });

    Ok(ChatResponse {
        content: message
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        tool_calls: parse_tool_calls(message),
        stop_reason: choice
            .get("finish_reason")
            .and_then(Value::as_str)
            .map(str::to_string),
        usage,
        model: body
            .get("model")
            .and_then(Value::as_str)
            .unwrap_or(fallback_model)
            .to_string(),
    })
}

/// Text delta from one streaming chunk
pub(crate) fn parse_stream_chunk(data: &str) -> Option<Result<String>> {
    if data == "[DONE]" {
        return None;
    }
    let chunk: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => {
            tracing::debug!(error = %e, "Skipping unparseable Kimi stream chunk");
            return None;
        }
    };

    if let Some(message) = chunk.pointer("/error/message").and_then(Value::as_str) {
        return Some(Err(AdapterError::Stream {
            provider: ProviderId::Kimi,
            message: message.to_string(),
        }
        .into()));
    }

    chunk
        .pointer("/choices/0/delta/content")
        .and_then(Value::as_str)
        .map(|t| Ok(t.to_string()))
}

#[async_trait]
impl ProviderClient for KimiProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Kimi
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    fn wire_format(&self) -> WireFormat {
        WireFormat::OpenAi
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let body = self.build_body(
            &request.messages,
            request.system.as_deref(),
            self.format_tools(&request.tools),
            request.max_tokens,
            false,
        );

        tracing::debug!(
            provider = "kimi",
            model = %self.config.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Sending chat request"
        );

        let response = self
            .authed_post()?
            .json(&body)
            .timeout(self.config.timeout)
            .send()
            .await
            .map_err(AdapterError::from)?;
        let json = http::read_json(ProviderId::Kimi, response).await?;

        parse_response(&json, &self.config.model)
    }

    async fn stream_chat(&self, messages: &[Message], system: Option<&str>) -> Result<TextStream> {
        let body = self.build_body(messages, system, Vec::new(), None, true);

        let response = self
            .authed_post()?
            .json(&body)
            .send()
            .await
            .map_err(AdapterError::from)?;
        let response = http::ensure_success(ProviderId::Kimi, response).await?;

        Ok(sse::text_stream(response, parse_stream_chunk))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assistant_core::tool::ToolOutcome;

    fn provider() -> KimiProvider {
        KimiProvider::new(ProviderConfig::kimi().with_api_key("sk-test")).unwrap()
    }

    #[test]
    fn test_parse_tool_calls_with_string_arguments() {
        let body = json!({
            "model": "moonshot-v1-32k",
            "choices": [{
                "index": 0,
                "finish_reason": "tool_calls",
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [
                        {"id": "call_a", "type": "function",
                         "function": {"name": "crm_lookup", "arguments": "{\"query\":\"阿里巴巴\"}"}},
                        {"id": "call_b", "type": "function",
                         "function": {"name": "current_datetime", "arguments": ""}}
                    ]
                }
            }],
            "usage": {"prompt_tokens": 300, "completion_tokens": 25, "total_tokens": 325}
        });

        let response = parse_response(&body, "fallback").unwrap();
        assert_eq!(response.content, "");
        assert_eq!(response.tool_calls.len(), 2);
        assert_eq!(response.tool_calls[0].arguments["query"], "阿里巴巴");
        assert!(response.tool_calls[1].arguments.is_empty());
        assert_eq!(response.usage, TokenUsage::new(300, 25));
        assert_eq!(response.stop_reason.as_deref(), Some("tool_calls"));
    }

    #[test]
    fn test_malformed_arguments_become_empty_object() {
        let message = json!({"tool_calls": [
            {"id": "c1", "function": {"name": "crm_lookup", "arguments": "{not json"}}
        ]});
        let calls = parse_tool_calls(&message);
        assert_eq!(calls.len(), 1);
        assert!(calls[0].arguments.is_empty());
    }

    #[test]
    fn test_missing_choices() {
        assert!(parse_response(&json!({"choices": []}), "m").is_err());
    }

    #[test]
    fn test_body_splits_tool_results() {
        let p = provider();
        let mut history = vec![Message::user("查一下客户")];
        let calls = vec![
            ToolCall::new("call_a", "crm_lookup", json!({"query": "Acme"})),
            ToolCall::new("call_b", "financial_query", json!({"metric": "revenue"})),
        ];
        let outcomes = vec![ToolOutcome::success(json!({"found": 1})), ToolOutcome::failure("ledger offline")];
        p.append_tool_exchange(&mut history, "", &calls, &outcomes);

        let body = p.build_body(&history, Some("system prompt"), Vec::new(), Some(512), false);
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 5);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[2]["tool_calls"][1]["function"]["name"], "financial_query");
        assert_eq!(messages[3]["role"], "tool");
        assert_eq!(messages[4]["tool_call_id"], "call_b");
        assert_eq!(body["max_tokens"], 512);
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn test_claude_shaped_history_renders_for_kimi() {
        let p = provider();
        let mut history = vec![Message::user("Revenue?")];
        let calls = vec![
            ToolCall::new("toolu_1", "financial_query", json!({})),
            ToolCall::new("toolu_2", "crm_lookup", json!({})),
        ];
        let outcomes = vec![ToolOutcome::success("a"), ToolOutcome::success("b")];
        WireFormat::Anthropic.append_tool_exchange(&mut history, "checking", &calls, &outcomes);

        let body = p.build_body(&history, None, Vec::new(), None, false);
        let roles: Vec<&str> = body["messages"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["role"].as_str().unwrap())
            .collect();
        assert_eq!(roles, vec!["user", "assistant", "tool", "tool"]);
    }

    #[test]
    fn test_stream_chunks() {
        let chunk = r#"{"choices":[{"index":0,"delta":{"content":"你好"}}]}"#;
        assert_eq!(parse_stream_chunk(chunk).unwrap().unwrap(), "你好");
        assert!(parse_stream_chunk("[DONE]").is_none());
        assert!(parse_stream_chunk(r#"{"choices":[{"delta":{"role":"assistant"}}]}"#).is_none());
        assert!(parse_stream_chunk(r#"{"error":{"message":"quota"}}"#).unwrap().is_err());
    }
}
