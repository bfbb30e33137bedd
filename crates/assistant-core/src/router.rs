//! Task Routing
//!
//! Entry point for every inbound task. The route depends only on the task's
//! source:
//!
//! | Source          | Resolution                                       |
//! |-----------------|--------------------------------------------------|
//! | webhook         | event keyword table, first substring match wins  |
//! | scheduler       | explicit agent name, else department             |
//! | mobile / teams  | [`AgentRegistry::select_agent`]                  |
//!
//! The router is an error boundary: agent failures and panics come back as
//! an [`AgentResult`] with `success == false`.

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use crate::agent::{Agent, AgentRegistry};
use crate::task::{AgentResult, NO_AGENT, Task, TaskSource};

/// Default webhook event keywords, checked in order
pub const DEFAULT_WEBHOOK_ROUTES: &[(&str, &str)] = &[
    ("invoice", "finance"),
    ("payment", "finance"),
    ("expense", "finance"),
    ("refund", "finance"),
    ("customer", "sales"),
    ("lead", "sales"),
    ("deal", "sales"),
    ("order", "sales"),
    ("campaign", "marketing"),
    ("newsletter", "marketing"),
    ("candidate", "hr"),
    ("employee", "hr"),
    ("leave", "hr"),
    ("ticket", "operations"),
    ("inventory", "operations"),
    ("shipment", "operations"),
];

/// Routes tasks to agents
pub struct TaskRouter {
    registry: AgentRegistry,
    webhook_routes: Vec<(String, String)>,
}

impl TaskRouter {
    pub fn new(registry: AgentRegistry) -> Self {
        Self {
            registry,
            webhook_routes: DEFAULT_WEBHOOK_ROUTES
                .iter()
                .map(|(k, a)| ((*k).to_string(), (*a).to_string()))
                .collect(),
        }
    }

    /// Replace the webhook keyword table
    #[must_use]
    pub fn with_webhook_routes(mut self, routes: Vec<(String, String)>) -> Self {
        self.webhook_routes = routes;
        self
    }

    pub const fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    /// Route and execute a task; never fails
    pub async fn route(&self, task: &Task) -> AgentResult {
        tracing::debug!(
            source = %task.source,
            department = ?task.department,
            event = ?task.event,
            "Routing task"
        );

        match task.source {
            TaskSource::Webhook => self.route_webhook(task).await,
            TaskSource::Scheduler => self.route_scheduled(task).await,
            TaskSource::Mobile | TaskSource::Teams => self.route_interactive(task).await,
        }
    }

    async fn route_webhook(&self, task: &Task) -> AgentResult {
        let Some(event) = task.event.as_deref() else {
            return AgentResult::unrouted("Webhook task has no event name");
        };
        let event_lower = event.to_lowercase();

        let Some((_, target)) = self
            .webhook_routes
            .iter()
            .find(|(keyword, _)| event_lower.contains(keyword.as_str()))
        else {
            tracing::warn!(event, "No agent registered for webhook event");
            return AgentResult::unrouted(format!("No agent handles webhook event '{event}'"));
        };

        match self.registry.get(target) {
            Some(agent) => run_agent(agent, task).await,
            None => AgentResult::unrouted(format!(
                "Webhook event '{event}' maps to unknown agent '{target}'"
            )),
        }
    }

    async fn route_scheduled(&self, task: &Task) -> AgentResult {
        let Some(target) = task
            .agent
            .as_deref()
            .filter(|a| !a.trim().is_empty())
            .or(task.department.as_deref())
        else {
            return AgentResult::unrouted("Scheduled task names no agent or department");
        };

        match self.registry.get(target) {
            Some(agent) => run_agent(agent, task).await,
            None => {
                tracing::warn!(target, "Scheduled task targets unknown agent");
                AgentResult::unrouted(format!("Unknown agent '{target}'"))
            }
        }
    }

    async fn route_interactive(&self, task: &Task) -> AgentResult {
        match self.registry.select_agent(task) {
            Some(agent) => run_agent(agent, task).await,
            None => AgentResult::success(self.clarification()).with_agent(NO_AGENT),
        }
    }

    fn clarification(&self) -> String {
        let mut departments: Vec<String> = Vec::new();
        for name in self.registry.names() {
            if let Some(agent) = self.registry.get(&name) {
                let department = agent.department().to_string();
                if !departments.contains(&department) {
                    departments.push(department);
                }
            }
        }

        if departments.is_empty() {
            return "I'm not sure how to help with that yet. Could you add a bit more detail?".into();
        }
        format!(
            "I'm not sure which team should handle that. Which area is it about ({})? \
             A little more detail will help me route your request.",
            departments.join(", ")
        )
    }
}

async fn run_agent(agent: Arc<dyn Agent>, task: &Task) -> AgentResult {
    let name = agent.name();
    tracing::info!(agent = %name, source = %task.source, "Dispatching task");

    match AssertUnwindSafe(agent.execute(task)).catch_unwind().await {
        Ok(Ok(mut result)) => {
            if result.agent_used.as_deref().is_none_or(str::is_empty) {
                result.agent_used = Some(name);
            }
            result
        }
        Ok(Err(e)) => {
            tracing::error!(agent = %name, error = %e, "Agent failed");
            AgentResult::failure(format!("Routing error: {e}")).with_agent(name)
        }
        Err(_) => {
            tracing::error!(agent = %name, "Agent panicked");
            AgentResult::failure(format!("Routing error: agent '{name}' stopped unexpectedly"))
                .with_agent(name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AssistantError, Result};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct KeywordAgent {
        name: &'static str,
        department: &'static str,
        keywords: &'static [&'static str],
        consulted: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Agent for KeywordAgent {
        fn name(&self) -> String {
            self.name.into()
        }
        fn department(&self) -> &str {
            self.department
        }
        fn can_handle(&self, task: &Task) -> bool {
            self.consulted.fetch_add(1, Ordering::SeqCst);
            let msg = task.message_lower();
            self.keywords.iter().any(|k| msg.contains(k))
        }
        async fn execute(&self, _task: &Task) -> Result<AgentResult> {
            Ok(AgentResult::success(format!("handled by {}", self.name)))
        }
    }

    struct BrokenAgent;

    #[async_trait]
    impl Agent for BrokenAgent {
        fn department(&self) -> &str {
            "operations"
        }
        fn can_handle(&self, task: &Task) -> bool {
            task.message.contains("broken")
        }
        async fn execute(&self, _task: &Task) -> Result<AgentResult> {
            Err(AssistantError::Agent("ledger offline".into()))
        }
    }

    struct PanickyAgent;

    #[async_trait]
    impl Agent for PanickyAgent {
        fn department(&self) -> &str {
            "hr"
        }
        fn can_handle(&self, task: &Task) -> bool {
            task.message.contains("panic")
        }
        #[allow(clippy::panic)]
        async fn execute(&self, _task: &Task) -> Result<AgentResult> {
            panic!("unexpected state")
        }
    }

    fn router(consulted: &Arc<AtomicUsize>) -> TaskRouter {
        let mut registry = AgentRegistry::new();
        registry.register(KeywordAgent {
            name: "finance",
            department: "finance",
            keywords: &["budget", "p&l", "invoice"],
            consulted: consulted.clone(),
        });
        registry.register(KeywordAgent {
            name: "sales",
            department: "sales",
            keywords: &["pipeline", "deal"],
            consulted: consulted.clone(),
        });
        registry.register(BrokenAgent);
        registry.register(PanickyAgent);
        TaskRouter::new(registry)
    }

    #[tokio::test]
    async fn test_webhook_skips_can_handle() {
        let consulted = Arc::new(AtomicUsize::new(0));
        let router = router(&consulted);

        let result = router
            .route(&Task::webhook("customer_signed_up", json!({"email": "a@b.co"})))
            .await;
        assert!(result.success);
        assert_eq!(result.agent_used.as_deref(), Some("sales"));
        assert_eq!(consulted.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_webhook_table_order() {
        let consulted = Arc::new(AtomicUsize::new(0));
        // "customer_payment" contains both keywords; payment is listed first
        let result = router(&consulted)
            .route(&Task::webhook("customer_payment_failed", json!({})))
            .await;
        assert_eq!(result.agent_used.as_deref(), Some("finance"));
    }

    #[tokio::test]
    async fn test_unknown_webhook_event() {
        let consulted = Arc::new(AtomicUsize::new(0));
        let result = router(&consulted)
            .route(&Task::webhook("build_finished", json!({})))
            .await;
        assert!(!result.success);
        assert_eq!(result.agent_used.as_deref(), Some(NO_AGENT));
    }

    #[tokio::test]
    async fn test_scheduler_routes_by_name_then_department() {
        let consulted = Arc::new(AtomicUsize::new(0));
        let router = router(&consulted);

        let by_name = Task::new("weekly", TaskSource::Scheduler).with_agent("sales");
        assert_eq!(router.route(&by_name).await.agent_used.as_deref(), Some("sales"));

        let by_department = Task::new("weekly", TaskSource::Scheduler).with_department("finance");
        assert_eq!(
            router.route(&by_department).await.agent_used.as_deref(),
            Some("finance")
        );

        let missing = Task::new("weekly", TaskSource::Scheduler);
        let result = router.route(&missing).await;
        assert!(!result.success);
        assert_eq!(result.agent_used.as_deref(), Some(NO_AGENT));

        let unknown = Task::new("weekly", TaskSource::Scheduler).with_agent("legal");
        assert!(!router.route(&unknown).await.success);
    }

    #[tokio::test]
    async fn test_keyword_fallback_beats_home_department() {
        let consulted = Arc::new(AtomicUsize::new(0));
        let task = Task::new("Update the deal pipeline", TaskSource::Teams).with_department("finance");
        let result = router(&consulted).route(&task).await;
        assert_eq!(result.agent_used.as_deref(), Some("sales"));
    }

    #[tokio::test]
    async fn test_clarification_when_unresolved() {
        let consulted = Arc::new(AtomicUsize::new(0));
        let task = Task::new("what's the weather", TaskSource::Mobile);
        let result = router(&consulted).route(&task).await;
        assert!(result.success);
        assert_eq!(result.agent_used.as_deref(), Some(NO_AGENT));
        assert!(result.content.contains("finance"));
    }

    #[tokio::test]
    async fn test_agent_error_is_contained() {
        let consulted = Arc::new(AtomicUsize::new(0));
        let task = Task::new("this is broken", TaskSource::Mobile);
        let result = router(&consulted).route(&task).await;
        assert!(!result.success);
        assert!(result.content.starts_with("Routing error:"));
        assert!(result.content.contains("ledger offline"));
        assert_eq!(result.agent_used.as_deref(), Some("broken"));
    }

    #[tokio::test]
    async fn test_agent_panic_is_contained() {
        let consulted = Arc::new(AtomicUsize::new(0));
        let task = Task::new("please panic", TaskSource::Mobile);
        let result = router(&consulted).route(&task).await;
        assert!(!result.success);
        assert!(result.content.starts_with("Routing error:"));
    }
}
