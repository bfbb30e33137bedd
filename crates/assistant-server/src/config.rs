//! Server Configuration

use assistant_core::{history::DEFAULT_MAX_TURNS, tool_loop::DEFAULT_MAX_ITERATIONS, usage::DEFAULT_QUEUE_CAPACITY};

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_AGENT: &str = "operations";
/// Prior turns loaded into a chat request that carries none
pub const DEFAULT_HISTORY_WINDOW: usize = 10;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub max_tool_iterations: usize,
    /// Agent for departments no agent owns
    pub default_agent: String,
    pub usage_queue_capacity: usize,
    pub history_window: usize,
    pub history_max_turns: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.into(),
            max_tool_iterations: DEFAULT_MAX_ITERATIONS,
            default_agent: DEFAULT_AGENT.into(),
            usage_queue_capacity: DEFAULT_QUEUE_CAPACITY,
            history_window: DEFAULT_HISTORY_WINDOW,
            history_max_turns: DEFAULT_MAX_TURNS,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let positive = |key: &str| {
            get(key)
                .and_then(|v| v.parse::<usize>().ok())
                .filter(|n| *n > 0)
        };

        let defaults = Self::default();
        Self {
            bind_addr: get("BIND_ADDR").unwrap_or(defaults.bind_addr),
            max_tool_iterations: positive("MAX_TOOL_ITERATIONS").unwrap_or(defaults.max_tool_iterations),
            default_agent: get("DEFAULT_AGENT")
                .map(|a| a.to_lowercase())
                .unwrap_or(defaults.default_agent),
            usage_queue_capacity: positive("USAGE_QUEUE_CAPACITY").unwrap_or(defaults.usage_queue_capacity),
            history_window: positive("HISTORY_WINDOW").unwrap_or(defaults.history_window),
            history_max_turns: positive("HISTORY_MAX_TURNS").unwrap_or(defaults.history_max_turns),
        }
    }
}
