//! Adapter Errors
//!
//! Failures specific to talking HTTP to a provider. Everything leaves this
//! crate as an [`AssistantError`].

use assistant_core::error::AssistantError;
use assistant_core::provider::ProviderId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AdapterError {
    /// No API key configured for the provider
    #[error("{0} is not configured (missing API key)")]
    NotConfigured(ProviderId),

    /// Non-2xx response
    #[error("{provider} returned HTTP {status}: {body}")]
    Status {
        provider: ProviderId,
        status: u16,
        body: String,
    },

    /// Response body lacked a required field
    #[error("{provider} response is missing '{field}'")]
    MissingField {
        provider: ProviderId,
        field: &'static str,
    },

    /// Error event inside a stream
    #[error("{provider} stream error: {message}")]
    Stream {
        provider: ProviderId,
        message: String,
    },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl From<AdapterError> for AssistantError {
    fn from(err: AdapterError) -> Self {
        match err {
            AdapterError::NotConfigured(_) => Self::ProviderUnavailable(err.to_string()),
            AdapterError::Status {
                provider,
                status,
                ref body,
            } => match status {
                401 | 403 => Self::Auth(format!("{provider}: {body}")),
                429 => Self::RateLimited(format!("{provider}: {body}")),
                502..=504 | 529 => Self::ProviderUnavailable(err.to_string()),
                _ => Self::Provider {
                    provider: provider.to_string(),
                    message: format!("HTTP {status} - {body}"),
                },
            },
            AdapterError::MissingField { .. } => Self::Parse(err.to_string()),
            AdapterError::Stream { provider, message } => Self::Provider {
                provider: provider.to_string(),
                message,
            },
            AdapterError::Transport(e) => from_reqwest(&e),
        }
    }
}

/// Timeouts map to [`AssistantError::Timeout`], everything else to `Http`
pub(crate) fn from_reqwest(e: &reqwest::Error) -> AssistantError {
    if e.is_timeout() {
        AssistantError::Timeout(e.to_string())
    } else {
        AssistantError::Http(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: u16) -> AssistantError {
        AdapterError::Status {
            provider: ProviderId::Claude,
            status: code,
            body: "{}".into(),
        }
        .into()
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(status(401), AssistantError::Auth(_)));
        assert!(matches!(status(429), AssistantError::RateLimited(_)));
        assert!(matches!(status(529), AssistantError::ProviderUnavailable(_)));
        assert!(matches!(status(400), AssistantError::Provider { .. }));
        assert!(status(503).is_retryable());
    }

    #[test]
    fn test_not_configured_is_unavailable() {
        let err: AssistantError = AdapterError::NotConfigured(ProviderId::Kimi).into();
        assert!(matches!(err, AssistantError::ProviderUnavailable(msg) if msg.contains("kimi")));
    }
}
