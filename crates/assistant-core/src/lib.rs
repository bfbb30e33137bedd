//! # assistant-core
//!
//! Provider-agnostic core of the department assistant: the tool-calling loop,
//! the two-provider abstraction, and task dispatch.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                           TaskRouter                             │
//! │   webhook table │ scheduler target │ AgentRegistry::select_agent │
//! └───────────────────────────────┬──────────────────────────────────┘
//!                                 ▼
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      Agent (per department)                      │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────────────┐  │
//! │  │ ToolCallLoop │───│ ToolRegistry │   │ ProviderSet          │  │
//! │  │  (≤5 steps)  │───│              │   │  Claude ⇄ Kimi       │  │
//! │  └──────────────┘   └──────────────┘   └──────────────────────┘  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Provider selection is a pure function of the message and its context
//! ([`selector::select_provider`]). Each provider speaks one
//! [`wire::WireFormat`], and histories stay neutral so they survive a
//! failover between the two.

pub mod agent;
pub mod error;
pub mod history;
pub mod message;
pub mod provider;
pub mod router;
pub mod selector;
pub mod task;
pub mod tool;
pub mod tool_loop;
pub mod usage;
pub mod wire;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use agent::{Agent, AgentRegistry};
pub use error::{AssistantError, Result};
pub use history::{HistoryStore, MemoryHistoryStore};
pub use message::{ContentPart, Message, Role};
pub use provider::{ChatRequest, ChatResponse, ProviderClient, ProviderId, ProviderSet, TextStream};
pub use router::TaskRouter;
pub use selector::select_provider;
pub use task::{AgentResult, Task, TaskSource};
pub use tool::{Artifact, Tool, ToolCall, ToolDefinition, ToolOutcome, ToolRegistry};
pub use tool_loop::{LoopOptions, LoopOutcome, ToolCallLoop, ToolCallLoopBuilder};
pub use usage::{UsageRecorder, UsageSink};
pub use wire::WireFormat;
