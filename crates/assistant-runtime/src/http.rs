//! Shared HTTP plumbing for the adapters

use std::time::Duration;

use assistant_core::error::{AssistantError, Result};
use assistant_core::provider::ProviderId;
use serde_json::Value;

use crate::error::AdapterError;

/// Longest error body kept in error messages
const MAX_ERROR_BODY: usize = 512;

/// Upper bound on establishing a connection
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Client-level limits apply per connect and per read, so a long stream that
/// keeps producing bytes is never cut off. Whole-request deadlines are set on
/// the non-streaming calls.
pub(crate) fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT.min(timeout))
        .read_timeout(timeout)
        .build()
        .map_err(|e| AssistantError::Config(format!("HTTP client: {e}")))
}

/// Fail on non-2xx, keeping a truncated body for diagnostics
pub(crate) async fn ensure_success(
    provider: ProviderId,
    response: reqwest::Response,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let body: String = body.chars().take(MAX_ERROR_BODY).collect();
    tracing::warn!(provider = %provider, status = status.as_u16(), "Provider returned an error status");

    Err(AdapterError::Status {
        provider,
        status: status.as_u16(),
        body,
    }
    .into())
}

/// Check status, then decode the JSON body
pub(crate) async fn read_json(provider: ProviderId, response: reqwest::Response) -> Result<Value> {
    let response = ensure_success(provider, response).await?;
    let text = response.text().await.map_err(AdapterError::from)?;
    Ok(serde_json::from_str(&text)?)
}

/// ID for a tool call the provider did not label
pub(crate) fn fallback_call_id() -> String {
    format!("call_{}", uuid::Uuid::new_v4().simple())
}
