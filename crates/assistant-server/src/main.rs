//! Department assistant HTTP server
//!
//! Axum-based server exposing chat (plain and WebSocket streaming),
//! webhook intake and a scheduler trigger in front of the department
//! agents.

mod config;
mod handlers;
mod state;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use assistant_agents::{DataSources, build_registry, default_tools};
use assistant_core::{
    MemoryHistoryStore, TaskRouter, ToolCallLoopBuilder, UsageRecorder, usage::InMemoryUsageSink,
};
use assistant_runtime::{RuntimeConfig, build_providers};

use crate::config::ServerConfig;
use crate::handlers::{
    chat_handler, chat_stream_handler, health_check, scheduler_handler, usage_handler,
    webhook_handler,
};
use crate::state::{AppState, ProviderInfo};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();

    let config = ServerConfig::from_env();
    let runtime = RuntimeConfig::from_env();

    let providers = build_providers(&runtime)?;
    let provider_info = [&runtime.claude, &runtime.kimi]
        .into_iter()
        .map(|p| ProviderInfo {
            id: p.id,
            model: p.model.clone(),
            configured: p.is_configured(),
        })
        .collect::<Vec<_>>();
    if provider_info.iter().all(|p| !p.configured) {
        tracing::warn!("No provider has an API key; set ANTHROPIC_API_KEY or KIMI_API_KEY in .env");
    }

    let usage_sink = Arc::new(InMemoryUsageSink::new());
    let (usage, _usage_worker) = UsageRecorder::spawn(usage_sink.clone(), config.usage_queue_capacity);

    let sources = DataSources::in_memory();
    let tools = default_tools(&sources);
    tracing::info!(tools = ?tools.names(), "Registered tools");

    let tool_loop = Arc::new(
        ToolCallLoopBuilder::new()
            .providers(providers)
            .tools(tools)
            .usage(usage)
            .max_iterations(config.max_tool_iterations)
            .build()?,
    );
    let router = TaskRouter::new(build_registry(&tool_loop, &config.default_agent));

    let state = AppState {
        router: Arc::new(router),
        tool_loop,
        history: Arc::new(MemoryHistoryStore::new(config.history_max_turns)),
        usage: usage_sink,
        providers: Arc::new(provider_info),
        history_window: config.history_window,
    };

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "Department assistant listening");
    tracing::info!("  GET  /health                 - Health check");
    tracing::info!("  POST /api/chat               - Send a request");
    tracing::info!("  GET  /api/chat/stream        - WebSocket streaming");
    tracing::info!("  POST /api/webhooks/{{event}}   - Webhook intake");
    tracing::info!("  POST /api/scheduler/run      - Run a scheduled job");
    tracing::info!("  GET  /api/usage              - Token usage per department");

    axum::serve(listener, app(state)).await?;

    Ok(())
}

fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/api/chat", post(chat_handler))
        .route("/api/chat/stream", get(chat_stream_handler))
        .route("/api/webhooks/{event}", post(webhook_handler))
        .route("/api/scheduler/run", post(scheduler_handler))
        .route("/api/usage", get(usage_handler))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(cors))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assistant_core::testing::{ScriptedProvider, provider_set};
    use assistant_core::{HistoryStore, ProviderId};
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use serde_json::{Value, json};
    use std::time::Duration;
    use tower::ServiceExt;

    struct Harness {
        state: AppState,
        claude: Arc<ScriptedProvider>,
    }

    fn harness(claude: ScriptedProvider) -> Harness {
        let claude = Arc::new(claude);
        let kimi = Arc::new(ScriptedProvider::kimi());
        let usage_sink = Arc::new(InMemoryUsageSink::new());
        let (usage, _) = UsageRecorder::spawn(usage_sink.clone(), 16);
        let sources = DataSources::in_memory();

        let tool_loop = Arc::new(
            ToolCallLoopBuilder::new()
                .providers(provider_set(&claude, &kimi))
                .tools(default_tools(&sources))
                .usage(usage)
                .build()
                .unwrap(),
        );
        let router = TaskRouter::new(build_registry(&tool_loop, "operations"));

        let state = AppState {
            router: Arc::new(router),
            tool_loop,
            history: Arc::new(MemoryHistoryStore::default()),
            usage: usage_sink,
            providers: Arc::new(vec![ProviderInfo {
                id: ProviderId::Claude,
                model: "claude-scripted".into(),
                configured: true,
            }]),
            history_window: 10,
        };
        Harness { state, claude }
    }

    async fn call(state: &AppState, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
            .unwrap();
        let response = app(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn test_health() {
        let h = harness(ScriptedProvider::claude());
        let (status, body) = call(&h.state, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["providers"][0]["id"], "claude");
    }

    #[tokio::test]
    async fn test_chat_routes_and_remembers() {
        let h = harness(ScriptedProvider::claude().reply("Revenue was $1.2M.", 400, 30));
        let (status, body) = call(
            &h.state,
            "POST",
            "/api/chat",
            Some(json!({"message": "What was revenue last month?", "department": "finance", "user_id": "u-7"})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["agent_used"], "finance");
        assert_eq!(body["content"], "Revenue was $1.2M.");

        let turns = h.state.history.recent("u-7", 10).unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[1].text(), "Revenue was $1.2M.");
    }

    #[tokio::test]
    async fn test_chat_loads_history() {
        let h = harness(ScriptedProvider::claude().reply("Same as before.", 10, 5));
        h.state
            .history
            .append("u-1", assistant_core::Message::user("What was revenue in May?"))
            .unwrap();
        h.state
            .history
            .append("u-1", assistant_core::Message::assistant("$1.1M"))
            .unwrap();

        call(
            &h.state,
            "POST",
            "/api/chat",
            Some(json!({"message": "And the budget for June?", "user_id": "u-1"})),
        )
        .await;

        let request = &h.claude.requests()[0];
        assert_eq!(request.messages.len(), 3);
        assert_eq!(request.messages[0].text(), "What was revenue in May?");
    }

    #[tokio::test]
    async fn test_chat_validation() {
        let h = harness(ScriptedProvider::claude());
        let (status, body) = call(&h.state, "POST", "/api/chat", Some(json!({"message": "  "}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "EMPTY_MESSAGE");

        let (status, _) = call(
            &h.state,
            "POST",
            "/api/chat",
            Some(json!({"message": "hi", "source": "webhook"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_chat_without_match_asks_to_clarify() {
        let h = harness(ScriptedProvider::claude());
        let (_, body) = call(&h.state, "POST", "/api/chat", Some(json!({"message": "what's the weather"}))).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["agent_used"], "none");
        assert_eq!(h.claude.calls(), 0);
    }

    #[tokio::test]
    async fn test_webhook_and_usage() {
        let h = harness(ScriptedProvider::claude().reply("Invoice logged.", 120, 15));
        let (status, body) = call(
            &h.state,
            "POST",
            "/api/webhooks/invoice.paid",
            Some(json!({"invoice": "INV-9", "amount": "1200.00"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["agent_used"], "finance");

        // The recorder drains on a background task
        let mut totals = Value::Null;
        for _ in 0..50 {
            let (_, body) = call(&h.state, "GET", "/api/usage", None).await;
            if body["departments"]["unassigned"]["requests"] == 1 {
                totals = body;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(totals["departments"]["unassigned"]["input_tokens"], 120);
    }

    #[tokio::test]
    async fn test_scheduler_unknown_agent() {
        let h = harness(ScriptedProvider::claude());
        let (status, body) = call(
            &h.state,
            "POST",
            "/api/scheduler/run",
            Some(json!({"agent": "legal", "message": "Weekly contract review"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], false);
        assert_eq!(body["agent_used"], "none");
    }
}
