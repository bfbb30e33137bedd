//! HTTP/WebSocket Handlers

use axum::{
    Json,
    extract::{
        Path, State, WebSocketUpgrade,
        ws::{Message as WsMessage, WebSocket},
    },
    http::StatusCode,
    response::Response,
};
use futures::{Sink, SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;

use assistant_core::{
    AgentResult, Message, Task, TaskSource,
    usage::UsageTotals,
};

use crate::state::{AppState, ProviderInfo};

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub providers: Vec<ProviderInfo>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub source: Option<TaskSource>,
    /// Prior turns; loaded from history when empty
    #[serde(default)]
    pub messages: Vec<Message>,
}

#[derive(Debug, Deserialize)]
pub struct ScheduledRunRequest {
    pub message: String,
    #[serde(default)]
    pub agent: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UsageResponse {
    pub departments: BTreeMap<String, UsageTotals>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, code: &str, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            code: code.into(),
        }),
    )
}

impl ChatRequest {
    /// Validate and turn into an interactive task
    fn into_task(self, state: &AppState) -> Result<Task, ApiError> {
        if self.message.trim().is_empty() {
            return Err(api_error(StatusCode::BAD_REQUEST, "EMPTY_MESSAGE", "Message is empty"));
        }
        let source = self.source.unwrap_or_default();
        if !source.is_interactive() {
            return Err(api_error(
                StatusCode::BAD_REQUEST,
                "INVALID_SOURCE",
                format!("Chat requests must come from mobile or teams, not {source}"),
            ));
        }

        let mut task = Task::new(self.message, source).with_history(self.messages);
        task.department = self.department;
        task.role = self.role;
        task.user_id = self.user_id;

        if task.messages.is_empty() {
            if let Some(user) = task.user_id.as_deref() {
                match state.history.recent(user, state.history_window) {
                    Ok(turns) => task.messages = turns,
                    Err(e) => tracing::warn!(user, error = %e, "Could not load history"),
                }
            }
        }
        Ok(task)
    }
}

fn remember(state: &AppState, task: &Task, answer: &str) {
    let Some(user) = task.user_id.as_deref() else {
        return;
    };
    for turn in [Message::user(&task.message), Message::assistant(answer)] {
        if let Err(e) = state.history.append(user, turn) {
            tracing::warn!(user, error = %e, "Could not save history");
            return;
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        providers: state.providers.as_ref().clone(),
    })
}

/// Main chat endpoint (non-streaming)
pub async fn chat_handler(
    State(state): State<AppState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<AgentResult>, ApiError> {
    let task = payload.into_task(&state)?;
    let result = state.router.route(&task).await;

    tracing::info!(
        agent = result.agent_used.as_deref().unwrap_or("none"),
        success = result.success,
        tools = result.tools_called.len(),
        "Chat request handled"
    );

    if result.success {
        remember(&state, &task, &result.content);
    }
    Ok(Json(result))
}

/// WebSocket streaming chat
pub async fn chat_stream_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_stream(socket, state))
}

async fn handle_stream(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    while let Some(msg) = receiver.next().await {
        let text = match msg {
            Ok(WsMessage::Text(text)) => text,
            Ok(WsMessage::Close(_)) => break,
            Err(e) => {
                tracing::error!(error = %e, "WebSocket error");
                break;
            }
            _ => continue,
        };

        let task = match serde_json::from_str::<ChatRequest>(text.as_str()) {
            Ok(request) => match request.into_task(&state) {
                Ok(task) => task,
                Err((_, Json(err))) => {
                    if send_json(&mut sender, json!({"type": "error", "error": err.error})).await.is_err() {
                        break;
                    }
                    continue;
                }
            },
            Err(e) => {
                if send_json(&mut sender, json!({"type": "error", "error": e.to_string()})).await.is_err() {
                    break;
                }
                continue;
            }
        };

        let (provider, mut stream) = match state.tool_loop.stream(&task).await {
            Ok(opened) => opened,
            Err(e) => {
                tracing::error!(error = %e, "Streaming unavailable on both providers");
                if send_json(&mut sender, json!({"type": "error", "error": e.user_message()})).await.is_err() {
                    break;
                }
                continue;
            }
        };

        let mut answer = String::new();
        let mut failed = false;
        while let Some(chunk) = stream.next().await {
            let frame = match chunk {
                Ok(delta) => {
                    answer.push_str(&delta);
                    json!({"type": "chunk", "content": delta})
                }
                Err(e) => {
                    tracing::warn!(%provider, error = %e, "Stream interrupted");
                    failed = true;
                    json!({"type": "error", "error": e.user_message()})
                }
            };
            if send_json(&mut sender, frame).await.is_err() {
                return;
            }
            if failed {
                break;
            }
        }

        if !failed {
            remember(&state, &task, &answer);
            if send_json(&mut sender, json!({"type": "done", "provider": provider})).await.is_err() {
                break;
            }
        }
    }
}

async fn send_json<S>(sender: &mut S, value: Value) -> Result<(), axum::Error>
where
    S: Sink<WsMessage, Error = axum::Error> + Unpin,
{
    sender.send(WsMessage::Text(value.to_string().into())).await
}

/// Webhook intake: the event name is routed by keyword
pub async fn webhook_handler(
    State(state): State<AppState>,
    Path(event): Path<String>,
    Json(payload): Json<Value>,
) -> Json<AgentResult> {
    tracing::info!(%event, "Webhook received");
    let task = Task::webhook(event, payload);
    Json(state.router.route(&task).await)
}

/// Run a scheduled job now
pub async fn scheduler_handler(
    State(state): State<AppState>,
    Json(payload): Json<ScheduledRunRequest>,
) -> Result<Json<AgentResult>, ApiError> {
    if payload.message.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "EMPTY_MESSAGE", "Message is empty"));
    }

    let mut task = Task::new(payload.message, TaskSource::Scheduler);
    task.agent = payload.agent;
    task.department = payload.department;

    Ok(Json(state.router.route(&task).await))
}

/// Token usage per department
pub async fn usage_handler(State(state): State<AppState>) -> Result<Json<UsageResponse>, ApiError> {
    let departments = state.usage.totals_by_department().map_err(|e| {
        tracing::error!(error = %e, "Usage totals unavailable");
        api_error(StatusCode::INTERNAL_SERVER_ERROR, "USAGE_ERROR", e.user_message())
    })?;
    Ok(Json(UsageResponse { departments }))
}
