//! Provider configuration
//!
//! Read from the environment (after `.env` has been loaded by the binary).

use std::time::Duration;

use assistant_core::provider::ProviderId;

/// Default per-request timeout for provider calls
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

pub const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-20250514";

pub const DEFAULT_KIMI_BASE_URL: &str = "https://api.moonshot.cn/v1";
pub const DEFAULT_KIMI_MODEL: &str = "moonshot-v1-32k";

/// Settings for one provider
#[derive(Clone, Debug)]
pub struct ProviderConfig {
    pub id: ProviderId,

    /// `None` leaves the provider registered but unavailable
    pub api_key: Option<String>,

    /// Base URL without trailing slash
    pub base_url: String,

    pub model: String,

    /// Per-request timeout
    pub timeout: Duration,
}

impl ProviderConfig {
    pub fn claude() -> Self {
        Self {
            id: ProviderId::Claude,
            api_key: None,
            base_url: DEFAULT_ANTHROPIC_BASE_URL.into(),
            model: DEFAULT_ANTHROPIC_MODEL.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn kimi() -> Self {
        Self {
            id: ProviderId::Kimi,
            api_key: None,
            base_url: DEFAULT_KIMI_BASE_URL.into(),
            model: DEFAULT_KIMI_MODEL.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub const fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

/// Both providers
#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    pub claude: ProviderConfig,
    pub kimi: ProviderConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            claude: ProviderConfig::claude(),
            kimi: ProviderConfig::kimi(),
        }
    }
}

impl RuntimeConfig {
    /// Load from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let timeout = get("LLM_TIMEOUT_SECS")
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS), Duration::from_secs);

        let mut claude = ProviderConfig::claude().with_timeout(timeout);
        claude.api_key = get("ANTHROPIC_API_KEY");
        if let Some(url) = get("ANTHROPIC_BASE_URL") {
            claude = claude.with_base_url(url);
        }
        if let Some(model) = get("ANTHROPIC_MODEL") {
            claude = claude.with_model(model);
        }

        let mut kimi = ProviderConfig::kimi().with_timeout(timeout);
        kimi.api_key = get("KIMI_API_KEY").or_else(|| get("MOONSHOT_API_KEY"));
        if let Some(url) = get("KIMI_BASE_URL") {
            kimi = kimi.with_base_url(url);
        }
        if let Some(model) = get("KIMI_MODEL") {
            kimi = kimi.with_model(model);
        }

        Self { claude, kimi }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_config_defaults() {
        let config = RuntimeConfig::from_lookup(lookup(&[]));
        assert_eq!(config.claude.base_url, DEFAULT_ANTHROPIC_BASE_URL);
        assert_eq!(config.kimi.model, DEFAULT_KIMI_MODEL);
        assert_eq!(config.claude.timeout, Duration::from_secs(120));
        assert!(!config.claude.is_configured());
    }

    #[test]
    fn test_config_overrides() {
        let config = RuntimeConfig::from_lookup(lookup(&[
            ("ANTHROPIC_API_KEY", "sk-ant"),
            ("KIMI_BASE_URL", "https://api.moonshot.ai/v1/"),
            ("MOONSHOT_API_KEY", "sk-moon"),
            ("LLM_TIMEOUT_SECS", "30"),
        ]));
        assert_eq!(config.claude.api_key.as_deref(), Some("sk-ant"));
        assert_eq!(config.kimi.api_key.as_deref(), Some("sk-moon"));
        assert_eq!(config.kimi.base_url, "https://api.moonshot.ai/v1");
        assert_eq!(config.kimi.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_invalid_timeout_falls_back() {
        let config = RuntimeConfig::from_lookup(lookup(&[("LLM_TIMEOUT_SECS", "soon")]));
        assert_eq!(config.claude.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
    }
}
