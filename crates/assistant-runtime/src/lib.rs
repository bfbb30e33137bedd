//! # assistant-runtime
//!
//! HTTP adapters for the two LLM backends.
//!
//! ## Providers
//!
//! - **Claude**: Anthropic Messages API
//! - **Kimi**: Moonshot's OpenAI-compatible chat completions API
//!
//! ## Usage
//!
//! ```rust,ignore
//! use assistant_runtime::{RuntimeConfig, build_providers};
//!
//! let providers = build_providers(&RuntimeConfig::from_env())?;
//! let tool_loop = ToolCallLoopBuilder::new().providers(providers).build()?;
//! ```

pub mod anthropic;
pub mod config;
pub mod error;
mod http;
pub mod kimi;
mod sse;

use std::sync::Arc;

use assistant_core::error::Result;
use assistant_core::provider::ProviderSet;

pub use anthropic::ClaudeProvider;
pub use config::{ProviderConfig, RuntimeConfig};
pub use error::AdapterError;
pub use kimi::KimiProvider;

/// Build both adapters.
///
/// A provider without an API key is still registered; its calls fail with
/// `ProviderUnavailable` so the loop fails over to the other one.
pub fn build_providers(config: &RuntimeConfig) -> Result<ProviderSet> {
    for provider in [&config.claude, &config.kimi] {
        if provider.is_configured() {
            tracing::info!(provider = %provider.id, model = %provider.model, "Provider configured");
        } else {
            tracing::warn!(provider = %provider.id, "No API key, provider disabled");
        }
    }

    let claude = ClaudeProvider::new(config.claude.clone())?;
    let kimi = KimiProvider::new(config.kimi.clone())?;
    Ok(ProviderSet::new(Arc::new(claude), Arc::new(kimi)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assistant_core::provider::{ProviderClient, ProviderId};

    #[test]
    fn test_build_providers_without_keys() {
        let providers = build_providers(&RuntimeConfig::default()).unwrap();
        assert_eq!(providers.get(ProviderId::Claude).id(), ProviderId::Claude);
        assert_eq!(providers.get(ProviderId::Kimi).model(), config::DEFAULT_KIMI_MODEL);
    }
}
