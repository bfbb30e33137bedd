//! Application State

use serde::Serialize;
use std::sync::Arc;

use assistant_core::{
    HistoryStore, ProviderId, TaskRouter, ToolCallLoop, usage::InMemoryUsageSink,
};

/// Provider as reported by `/health`
#[derive(Clone, Debug, Serialize)]
pub struct ProviderInfo {
    pub id: ProviderId,
    pub model: String,
    pub configured: bool,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Dispatcher over the department agents
    pub router: Arc<TaskRouter>,

    /// Loop used directly for streaming chat
    pub tool_loop: Arc<ToolCallLoop>,

    pub history: Arc<dyn HistoryStore>,

    /// Token usage aggregated per department
    pub usage: Arc<InMemoryUsageSink>,

    pub providers: Arc<Vec<ProviderInfo>>,

    /// Prior turns loaded for a chat request
    pub history_window: usize,
}
