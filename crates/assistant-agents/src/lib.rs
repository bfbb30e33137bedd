//! # assistant-agents
//!
//! Department agents and the business tools they drive.
//!
//! ## Departments
//!
//! ```text
//! ┌─────────────────┬────────────┬──────────────────────────────────────────┐
//! │ Agent           │ Department │ Tools                                    │
//! ├─────────────────┼────────────┼──────────────────────────────────────────┤
//! │ finance         │ finance    │ financial_query, generate_report, email  │
//! │ sales           │ sales      │ crm_lookup, draft_email, generate_report │
//! │ marketing       │ marketing  │ crm_lookup, draft_email, generate_report │
//! │ hr              │ hr         │ financial_query, draft_email, report     │
//! │ operations      │ operations │ financial_query, draft_email, report     │
//! │ crossdepartment │ management │ every registered tool                    │
//! └─────────────────┴────────────┴──────────────────────────────────────────┘
//! ```
//!
//! Every agent also sees `current_datetime`. Registration order is the
//! order above; it decides which agent wins when several keyword sets match.
//!
//! ## Data
//!
//! Tools read and write through the traits in [`data`]. [`DataSources::in_memory`]
//! wires seeded in-memory implementations so the whole system runs without
//! external services.

pub mod data;
pub mod departments;
pub mod error;
pub mod model;
pub mod tools;

pub use departments::{
    CrossDepartmentAgent, DepartmentProfile, FinanceAgent, HrAgent, MarketingAgent,
    OperationsAgent, SalesAgent,
};
pub use error::{Result, ToolDataError};
pub use model::{Period, Report};

use assistant_core::{AgentRegistry, ToolCallLoop, ToolRegistry, tool::DateTimeTool};
use std::sync::Arc;

use data::{
    CrmSource, InMemoryCrm, InMemoryLedger, LedgerSource, MemoryOutbox, MemoryReportStore,
    Outbox, ReportStore,
};
use tools::{CrmLookupTool, DraftEmailTool, FinancialQueryTool, GenerateReportTool};

/// Backends for the department tools
#[derive(Clone)]
pub struct DataSources {
    pub ledger: Arc<dyn LedgerSource>,
    pub crm: Arc<dyn CrmSource>,
    pub outbox: Arc<dyn Outbox>,
    pub reports: Arc<dyn ReportStore>,
}

impl DataSources {
    /// Seeded demo data held in memory
    pub fn in_memory() -> Self {
        Self {
            ledger: Arc::new(InMemoryLedger::default()),
            crm: Arc::new(InMemoryCrm::default()),
            outbox: Arc::new(MemoryOutbox::new()),
            reports: Arc::new(MemoryReportStore::new()),
        }
    }
}

/// Registry with every department tool plus `current_datetime`
pub fn default_tools(sources: &DataSources) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(FinancialQueryTool::new(sources.ledger.clone()));
    registry.register(CrmLookupTool::new(sources.crm.clone()));
    registry.register(DraftEmailTool::new(sources.outbox.clone()));
    registry.register(GenerateReportTool::new(sources.reports.clone()));
    registry.register(DateTimeTool);
    registry
}

/// All department agents in declaration order.
///
/// `default_agent` serves departments that no agent owns.
pub fn build_registry(tool_loop: &Arc<ToolCallLoop>, default_agent: &str) -> AgentRegistry {
    let mut registry = AgentRegistry::new();
    registry.register(FinanceAgent::new(tool_loop.clone()));
    registry.register(SalesAgent::new(tool_loop.clone()));
    registry.register(MarketingAgent::new(tool_loop.clone()));
    registry.register(HrAgent::new(tool_loop.clone()));
    registry.register(OperationsAgent::new(tool_loop.clone()));
    registry.register(CrossDepartmentAgent::new(tool_loop.clone()));

    tracing::info!(agents = registry.len(), default_agent, "Department agents registered");

    registry
        .with_default_agent(default_agent)
        .with_cross_department("crossdepartment")
}

#[cfg(test)]
mod tests {
    use super::*;
    use assistant_core::testing::{ScriptedProvider, provider_set};
    use assistant_core::{Task, TaskRouter, TaskSource, ToolCallLoopBuilder, task::NO_AGENT};
    use serde_json::json;

    fn system(
        claude: &Arc<ScriptedProvider>,
        kimi: &Arc<ScriptedProvider>,
        sources: &DataSources,
    ) -> TaskRouter {
        let tool_loop = Arc::new(
            ToolCallLoopBuilder::new()
                .providers(provider_set(claude, kimi))
                .tools(default_tools(sources))
                .build()
                .unwrap(),
        );
        TaskRouter::new(build_registry(&tool_loop, "operations"))
    }

    #[test]
    fn test_registry_order() {
        let sources = DataSources::in_memory();
        let claude = Arc::new(ScriptedProvider::claude());
        let kimi = Arc::new(ScriptedProvider::kimi());
        let router = system(&claude, &kimi, &sources);
        assert_eq!(
            router.registry().names(),
            ["finance", "sales", "marketing", "hr", "operations", "crossdepartment"]
        );
        assert!(router.registry().get("management").is_some());
    }

    #[tokio::test]
    async fn test_finance_pnl_end_to_end() {
        let sources = DataSources::in_memory();
        let claude = Arc::new(
            ScriptedProvider::claude()
                .tool_call("financial_query", json!({"metric": "pnl", "period": "last_month"}), 900, 40)
                .reply("Net income last month was positive.", 1400, 120),
        );
        let kimi = Arc::new(ScriptedProvider::kimi());
        let router = system(&claude, &kimi, &sources);

        let task = Task::new("Generate the P&L for last month", TaskSource::Mobile)
            .with_department("finance");
        let result = router.route(&task).await;

        assert!(result.success);
        assert_eq!(result.agent_used.as_deref(), Some("finance"));
        assert_eq!(result.tools_called, ["financial_query"]);

        let requests = claude.requests();
        let offered: Vec<&str> = requests[0].tools.iter().map(|t| t.name.as_str()).collect();
        assert!(offered.contains(&"financial_query"));
        assert!(!offered.contains(&"crm_lookup"));
        assert!(requests[0].system.as_deref().unwrap_or_default().contains("finance assistant"));
        assert_eq!(kimi.calls(), 0);
    }

    #[tokio::test]
    async fn test_webhook_goes_to_sales_by_event() {
        let sources = DataSources::in_memory();
        let claude = Arc::new(ScriptedProvider::claude().reply("Welcomed the new customer.", 300, 30));
        let kimi = Arc::new(ScriptedProvider::kimi());
        let router = system(&claude, &kimi, &sources);

        // Message matches no sales keyword; only the event decides
        let task = Task::webhook("customer_signed_up", json!({"name": "Hooli", "plan": "team"}));
        let result = router.route(&task).await;

        assert!(result.success);
        assert_eq!(result.agent_used.as_deref(), Some("sales"));
        let prompt = &claude.requests()[0];
        assert!(prompt.system.as_deref().unwrap_or_default().contains("sales assistant"));
    }

    #[tokio::test]
    async fn test_unmatched_message_asks_to_clarify() {
        let sources = DataSources::in_memory();
        let claude = Arc::new(ScriptedProvider::claude());
        let kimi = Arc::new(ScriptedProvider::kimi());
        let router = system(&claude, &kimi, &sources);

        let result = router.route(&Task::new("what's the weather", TaskSource::Mobile)).await;

        assert!(result.success);
        assert_eq!(result.agent_used.as_deref(), Some(NO_AGENT));
        assert_eq!(claude.calls() + kimi.calls(), 0);
    }

    #[tokio::test]
    async fn test_department_owner_yields_to_keyword_match() {
        let sources = DataSources::in_memory();
        let claude = Arc::new(ScriptedProvider::claude().reply("Acme has two open deals.", 200, 20));
        let kimi = Arc::new(ScriptedProvider::kimi());
        let router = system(&claude, &kimi, &sources);

        let task = Task::new("Which deals are in the pipeline for Acme?", TaskSource::Teams)
            .with_department("finance");
        let result = router.route(&task).await;

        assert_eq!(result.agent_used.as_deref(), Some("sales"));
    }

    #[tokio::test]
    async fn test_report_artifact_reaches_result() {
        let sources = DataSources::in_memory();
        let claude = Arc::new(
            ScriptedProvider::claude()
                .tool_call(
                    "generate_report",
                    json!({
                        "title": "Executive Summary",
                        "sections": [{"heading": "Highlights", "body": "Revenue up."}]
                    }),
                    500,
                    60,
                )
                .reply("The executive summary is ready.", 700, 40),
        );
        let kimi = Arc::new(ScriptedProvider::kimi());
        let router = system(&claude, &kimi, &sources);

        let task = Task::new("Prepare an executive summary", TaskSource::Mobile)
            .with_department("management");
        let result = router.route(&task).await;

        assert_eq!(result.agent_used.as_deref(), Some("crossdepartment"));
        assert_eq!(result.artifacts.len(), 1);
        assert_eq!(result.artifacts[0].name, "executive-summary.md");
    }

    #[tokio::test]
    async fn test_both_providers_down() {
        let sources = DataSources::in_memory();
        let claude = Arc::new(ScriptedProvider::claude().always_fail("overloaded"));
        let kimi = Arc::new(ScriptedProvider::kimi().always_fail("timeout"));
        let router = system(&claude, &kimi, &sources);

        let task = Task::new("What was revenue in March?", TaskSource::Mobile);
        let result = router.route(&task).await;

        assert!(!result.success);
        assert_eq!(result.agent_used.as_deref(), Some("finance"));
        assert!(result.content.contains("temporarily unavailable"));
    }
}
