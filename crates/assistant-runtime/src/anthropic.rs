//! Claude Provider
//!
//! Anthropic Messages API adapter (`POST {base}/v1/messages`).

use assistant_core::{
    error::Result,
    message::Message,
    provider::{ChatRequest, ChatResponse, ProviderClient, ProviderId, TextStream, TokenUsage},
    tool::ToolCall,
    wire::{WireFormat, system_text},
};
use async_trait::async_trait;
use serde_json::{Value, json};

use crate::config::ProviderConfig;
use crate::error::AdapterError;
use crate::http;
use crate::sse;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Claude-style provider
pub struct ClaudeProvider {
    config: ProviderConfig,
    client: reqwest::Client,
}

impl ClaudeProvider {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let client = http::build_client(config.timeout)?;
        Ok(Self { config, client })
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.config.base_url)
    }

    fn authed_post(&self) -> Result<reqwest::RequestBuilder> {
        let key = self
            .config
            .api_key
            .as_deref()
            .ok_or(AdapterError::NotConfigured(ProviderId::Claude))?;
        Ok(self
            .client
            .post(self.messages_url())
            .header("x-api-key", key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json"))
    }

    fn build_body(
        &self,
        messages: &[Message],
        system: Option<&str>,
        tools: Vec<Value>,
        max_tokens: Option<u32>,
        stream: bool,
    ) -> Value {
        let mut body = json!({
            "model": self.config.model,
            "max_tokens": max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            "messages": WireFormat::Anthropic.render_messages(messages),
        });

        let system = merge_system(system, messages);
        if let Some(system) = system {
            body["system"] = Value::String(system);
        }
        if !tools.is_empty() {
            body["tools"] = Value::Array(tools);
        }
        if stream {
            body["stream"] = Value::Bool(true);
        }
        body
    }
}

/// Explicit system prompt first, then any system turns from the history
fn merge_system(system: Option<&str>, messages: &[Message]) -> Option<String> {
    let inline = system_text(messages);
    match (system.filter(|s| !s.is_empty()), inline) {
        (Some(s), Some(inline)) => Some(format!("{s}\n\n{inline}")),
        (Some(s), None) => Some(s.to_string()),
        (None, inline) => inline,
    }
}

/// Normalize a Messages API response body
pub(crate) fn parse_response(body: &Value, fallback_model: &str) -> Result<ChatResponse> {
    let blocks = body
        .get("content")
        .and_then(Value::as_array)
        .ok_or(AdapterError::MissingField {
            provider: ProviderId::Claude,
            field: "content",
        })?;

    let mut text = String::new();
    let mut tool_calls = Vec::new();

    for block in blocks {
        match block.get("type").and_then(Value::as_str) {
            Some("text") => {
                if let Some(t) = block.get("text").and_then(Value::as_str) {
                    text.push_str(t);
                }
            }
            Some("tool_use") => {
                let id = block
                    .get("id")
                    .and_then(Value::as_str)
                    .map_or_else(http::fallback_call_id, str::to_string);
                let name = block.get("name").and_then(Value::as_str).unwrap_or_default();
                let input = block.get("input").cloned().unwrap_or(Value::Null);
                tool_calls.push(ToolCall::new(id, name, input));
            }
            _ => {}
        }
    }

    let usage = body.get("usage").map_or_else(TokenUsage::default, |u| {
        TokenUsage::new(
            u.get("input_tokens").and_then(Value::as_u64).unwrap_or(0),
            u.get("output_tokens").and_then(Value::as_u64).unwrap_or(0),
        )
    });

    Ok(ChatResponse {
        content: text,
        tool_calls,
        stop_reason: body
            .get("stop_reason")
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

/// Text delta from one streaming event
pub(crate) fn parse_stream_event(data: &str) -> Option<Result<String>> {
    let event: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => {
            tracing::debug!(error = %e, "Skipping unparseable Claude stream event");
            return None;
        }
    };

    match event.get("type").and_then(Value::as_str)? {
        "content_block_delta" => {
            let delta = event.get("delta")?;
            if delta.get("type").and_then(Value::as_str) != Some("text_delta") {
                return None;
            }
            delta
                .get("text")
                .and_then(Value::as_str)
                .map(|t| Ok(t.to_string()))
        }
        "error" => {
            let message = event
                .pointer("/error/message")
                .and_then(Value::as_str)
                .unwrap_or("unknown stream error")
                .to_string();
            Some(Err(AdapterError::Stream {
                provider: ProviderId::Claude,
                message,
            }
            .into()))
        }
        _ => None,
    }
}

#[async_trait]
impl ProviderClient for ClaudeProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Claude
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    fn wire_format(&self) -> WireFormat {
        WireFormat::Anthropic
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
            provider = "claude",
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
        let json = http::read_json(ProviderId::Claude, response).await?;

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
        let response = http::ensure_success(ProviderId::Claude, response).await?;

        Ok(sse::text_stream(response, parse_stream_event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assistant_core::message::Role;
    use assistant_core::tool::{ToolDefinition, ToolOutcome};

    fn provider() -> ClaudeProvider {
        ClaudeProvider::new(ProviderConfig::claude().with_api_key("sk-test")).unwrap()
    }

    #[test]
    fn test_parse_text_and_tool_use() {
        let body = json!({
            "id": "msg_01",
            "model": "claude-sonnet-4-20250514",
            "stop_reason": "tool_use",
            "content": [
                {"type": "text", "text": "Let me check. "},
                {"type": "tool_use", "id": "toolu_1", "name": "financial_query",
                 "input": {"metric": "revenue", "period": "2024-05"}},
                {"type": "tool_use", "id": "toolu_2", "name": "crm_lookup", "input": {"query": "Acme"}}
            ],
            "usage": {"input_tokens": 812, "output_tokens": 64}
        });

        let response = parse_response(&body, "fallback").unwrap();
        assert_eq!(response.content, "Let me check. ");
        assert_eq!(response.tool_calls.len(), 2);
        assert_eq!(response.tool_calls[0].id, "toolu_1");
        assert_eq!(response.tool_calls[0].arguments["period"], "2024-05");
        assert_eq!(response.stop_reason.as_deref(), Some("tool_use"));
        assert_eq!(response.usage, TokenUsage::new(812, 64));
        assert_eq!(response.model, "claude-sonnet-4-20250514");
    }

    #[test]
    fn test_zero_blocks_is_empty_text() {
        let body = json!({"content": [], "stop_reason": "end_turn"});
        let response = parse_response(&body, "fallback").unwrap();
        assert_eq!(response.content, "");
        assert!(!response.has_tool_calls());
        assert_eq!(response.model, "fallback");
    }

    #[test]
    fn test_missing_content_is_parse_error() {
        assert!(parse_response(&json!({"type": "error"}), "m").is_err());
    }

    #[test]
    fn test_body_shape() {
        let p = provider();
        let tools = p.format_tools(&[ToolDefinition::new(
            "crm_lookup",
            "Look up a customer",
            json!({"type": "object", "properties": {"query": {"type": "string"}}}),
        )]);
        let history = vec![Message::system("Be terse."), Message::user("Find Acme")];
        let body = p.build_body(&history, Some("You are a sales assistant."), tools, None, false);

        assert_eq!(body["max_tokens"], DEFAULT_MAX_TOKENS);
        assert_eq!(body["system"], "You are a sales assistant.\n\nBe terse.");
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
        assert_eq!(body["tools"][0]["input_schema"]["type"], "object");
        assert!(body.get("stream").is_none());
    }

    #[test]
    fn test_tool_exchange_body() {
        let p = provider();
        let mut history = vec![Message::user("Revenue?")];
        let call = ToolCall::new("toolu_1", "financial_query", json!({"metric": "revenue"}));
        p.append_tool_exchange(&mut history, "", &[call], &[ToolOutcome::success(json!({"total": "10"}))]);
        assert_eq!(history[2].role, Role::User);

        let body = p.build_body(&history, None, Vec::new(), None, false);
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1]["content"][0]["type"], "tool_use");
        assert_eq!(messages[2]["content"][0]["type"], "tool_result");
        assert_eq!(messages[2]["content"][0]["tool_use_id"], "toolu_1");
    }

    #[test]
    fn test_stream_events() {
        let delta = r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hel"}}"#;
        assert_eq!(parse_stream_event(delta).unwrap().unwrap(), "Hel");

        let start = r#"{"type":"message_start","message":{"id":"msg_1"}}"#;
        assert!(parse_stream_event(start).is_none());

        let json_delta = r#"{"type":"content_block_delta","delta":{"type":"input_json_delta","partial_json":"{"}}"#;
        assert!(parse_stream_event(json_delta).is_none());

        let error = r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#;
        assert!(parse_stream_event(error).unwrap().is_err());
    }

    #[tokio::test]
    async fn test_missing_key_is_unavailable() {
        let p = ClaudeProvider::new(ProviderConfig::claude()).unwrap();
        let err = p.chat(&ChatRequest::new(vec![Message::user("hi")])).await.unwrap_err();
        assert!(matches!(err, assistant_core::AssistantError::ProviderUnavailable(_)));
    }

    mod loopback {
        use super::*;
        use futures::StreamExt;
        use std::time::Duration;
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::{TcpListener, TcpStream};

        /// Read one request, headers and body, off the socket
        async fn read_request(socket: &mut TcpStream) {
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    return;
                }
                buf.extend_from_slice(&chunk[..n]);
                let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
                    continue;
                };
                let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
                let body_len = head
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + body_len {
                    return;
                }
            }
        }

        /// Serve one connection: write `parts` with `gap` between them
        async fn serve_slowly(parts: Vec<String>, gap: Duration) -> String {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                let (mut socket, _) = listener.accept().await.unwrap();
                read_request(&mut socket).await;
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        tokio::time::sleep(gap).await;
                    }
                    if socket.write_all(part.as_bytes()).await.is_err() {
                        return;
                    }
                    let _ = socket.flush().await;
                }
            });
            format!("http://{addr}")
        }

        fn provider_at(base_url: String, timeout: Duration) -> ClaudeProvider {
            ClaudeProvider::new(
                ProviderConfig::claude()
                    .with_api_key("sk-test")
                    .with_base_url(base_url)
                    .with_timeout(timeout),
            )
            .unwrap()
        }

        fn delta(text: &str) -> String {
            format!(
                "event: content_block_delta\ndata: {}\n\n",
                json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": text}})
            )
        }

        #[tokio::test]
        async fn test_stream_outlives_request_timeout() {
            let mut parts = vec![
                "HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\nconnection: close\r\n\r\n".to_string(),
            ];
            parts.extend(["Revenue ", "was ", "$1.2M."].map(delta));
            let base_url = serve_slowly(parts, Duration::from_millis(120)).await;

            // Four writes 120ms apart run well past the 250ms timeout
            let p = provider_at(base_url, Duration::from_millis(250));
            let mut stream = p.stream_chat(&[Message::user("Revenue?")], None).await.unwrap();

            let mut text = String::new();
            while let Some(chunk) = stream.next().await {
                text.push_str(&chunk.unwrap());
            }
            assert_eq!(text, "Revenue was $1.2M.");
        }

        #[tokio::test]
        async fn test_chat_deadline_covers_whole_body() {
            let body = json!({
                "content": [{"type": "text", "text": "Revenue was $1.2M."}],
                "stop_reason": "end_turn",
                "usage": {"input_tokens": 10, "output_tokens": 5}
            })
            .to_string();
            let (a, rest) = body.split_at(body.len() / 3);
            let (b, c) = rest.split_at(rest.len() / 2);
            let parts = vec![
                format!(
                    "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\n\r\n",
                    body.len()
                ),
                a.to_string(),
                b.to_string(),
                c.to_string(),
            ];
            let base_url = serve_slowly(parts, Duration::from_millis(120)).await;

            let p = provider_at(base_url, Duration::from_millis(250));
            let err = p
                .chat(&ChatRequest::new(vec![Message::user("Revenue?")]))
                .await
                .unwrap_err();
            assert!(matches!(err, assistant_core::AssistantError::Timeout(_)), "{err:?}");
        }
    }
}
