//! Department Agents
//!
//! Each agent pairs a [`DepartmentProfile`] (keywords, persona, tool
//! allow-list) with the shared [`ToolCallLoop`]. The concrete types exist so
//! that registry names derive from the type: `FinanceAgent` → `finance`.

use assistant_core::{
    Agent, AgentResult, LoopOptions, Result, Task, TaskSource, ToolCallLoop,
    agent::MANAGEMENT_DEPARTMENT,
};
use async_trait::async_trait;
use std::borrow::Cow;
use std::sync::Arc;

/// Static description of one department
#[derive(Debug)]
pub struct DepartmentProfile {
    pub department: &'static str,
    /// Lower-case substrings that mark a message as this department's
    pub keywords: &'static [&'static str],
    pub prompt: &'static str,
    /// Tools the department may use; `None` means every registered tool
    pub tools: Option<&'static [&'static str]>,
}

impl DepartmentProfile {
    pub fn matches(&self, message_lower: &str) -> bool {
        self.keywords.iter().any(|k| message_lower.contains(k))
    }
}

pub static FINANCE: DepartmentProfile = DepartmentProfile {
    department: "finance",
    keywords: &[
        "revenue", "expense", "budget", "invoice", "p&l", "profit", "cash flow", "ledger",
        "margin", "forecast", "payment", "financial",
    ],
    prompt: r"You are the finance assistant. You answer questions about revenue, expenses,
profit and loss, budgets and invoices.

- Always pull figures with `financial_query` before quoting numbers.
- Amounts are USD; show them with thousands separators and two decimals.
- When comparing months, state both periods and the absolute and percentage change.
- Use `generate_report` when the requester asks for a document or summary to share.",
    tools: Some(&["financial_query", "generate_report", "draft_email", "current_datetime"]),
};

pub static SALES: DepartmentProfile = DepartmentProfile {
    department: "sales",
    keywords: &[
        "customer", "deal", "pipeline", "lead", "crm", "quota", "prospect", "opportunity",
        "sales",
    ],
    prompt: r"You are the sales assistant. You help account managers with customers, deals and
pipeline.

- Look customers up with `crm_lookup`; never invent deal values or stages.
- Summarise open pipeline by stage and point out deals that need attention.
- Draft follow-up emails with `draft_email`; drafts are reviewed before sending.",
    tools: Some(&["crm_lookup", "draft_email", "generate_report", "current_datetime"]),
};

pub static MARKETING: DepartmentProfile = DepartmentProfile {
    department: "marketing",
    keywords: &[
        "campaign", "marketing", "newsletter", "social media", "seo", "brand", "launch",
        "audience",
    ],
    prompt: r"You are the marketing assistant. You help plan campaigns, write copy and prepare
launch material.

- Keep copy on brand: clear, confident, no superlatives without evidence.
- Use `crm_lookup` to tailor messaging to a named customer or region.
- Put campaign plans into `generate_report` and announcements into `draft_email`.",
    tools: Some(&["crm_lookup", "draft_email", "generate_report", "current_datetime"]),
};

pub static HR: DepartmentProfile = DepartmentProfile {
    department: "hr",
    keywords: &[
        "employee", "hiring", "candidate", "onboarding", "vacation", "payroll", "benefits",
        "performance review", "recruit", "leave",
    ],
    prompt: r"You are the HR assistant. You help with hiring, onboarding, leave and people
processes.

- Treat personal data as confidential; only discuss what the requester needs.
- Payroll totals come from `financial_query` with department `hr`.
- Offer letters and candidate replies are prepared with `draft_email`.",
    tools: Some(&["financial_query", "draft_email", "generate_report", "current_datetime"]),
};

pub static OPERATIONS: DepartmentProfile = DepartmentProfile {
    department: "operations",
    keywords: &[
        "inventory", "shipment", "supplier", "logistics", "ticket", "warehouse",
        "procurement", "incident",
    ],
    prompt: r"You are the operations assistant. You help with suppliers, logistics, support
tickets and incidents.

- Be concrete: owners, next steps and deadlines.
- Use `financial_query` with department `operations` for cost questions.
- Incident write-ups go into `generate_report`; supplier contact goes through `draft_email`.",
    tools: Some(&["financial_query", "draft_email", "generate_report", "current_datetime"]),
};

pub static CROSS_DEPARTMENT: DepartmentProfile = DepartmentProfile {
    department: MANAGEMENT_DEPARTMENT,
    keywords: &[
        "company-wide", "all departments", "cross-department", "executive summary", "kpi",
    ],
    prompt: r"You are the executive assistant for company management. You combine information
from every department.

- Gather figures from all relevant tools before summarising.
- Lead with the three most important points, then the supporting detail.
- Executive summaries and KPI reviews go into `generate_report`.",
    tools: None,
};

/// The message an agent works on: webhook tasks carry their payload inline
fn effective_task(task: &Task) -> Cow<'_, Task> {
    if task.source != TaskSource::Webhook {
        return Cow::Borrowed(task);
    }

    let mut enriched = task.clone();
    if let Some(event) = task.event.as_deref() {
        enriched.message.push_str(&format!("\n\nEvent: {event}"));
    }
    if let Some(payload) = task.payload.as_ref() {
        let pretty = serde_json::to_string_pretty(payload).unwrap_or_else(|_| payload.to_string());
        enriched
            .message
            .push_str(&format!("\nPayload:\n```json\n{pretty}\n```"));
    }
    enriched
        .message
        .push_str("\n\nSummarise what happened and take any follow-up action that is needed.");
    Cow::Owned(enriched)
}

/// Drive the tool loop for one department
async fn run(tool_loop: &ToolCallLoop, profile: &DepartmentProfile, task: &Task) -> AgentResult {
    let task = effective_task(task);
    let mut options = LoopOptions::default().system_prompt(profile.prompt);
    if let Some(tools) = profile.tools {
        options = options.tools(tools.iter().copied());
    }

    let outcome = tool_loop.execute_with(&task, &options).await;

    tracing::info!(
        department = profile.department,
        success = outcome.success,
        iterations = outcome.iterations,
        tools = outcome.tools_called.len(),
        model = %outcome.usage.model,
        "Department task finished"
    );

    let result = if outcome.success {
        AgentResult::success(outcome.content)
    } else {
        AgentResult::failure(outcome.content)
    };
    result
        .with_tools(outcome.tools_called)
        .with_artifacts(outcome.artifacts)
}

macro_rules! department_agent {
    ($(#[$doc:meta])* $name:ident, $profile:ident) => {
        $(#[$doc])*
        pub struct $name {
            tool_loop: Arc<ToolCallLoop>,
        }

        impl $name {
            pub const fn new(tool_loop: Arc<ToolCallLoop>) -> Self {
                Self { tool_loop }
            }
        }

        #[async_trait]
        impl Agent for $name {
            fn department(&self) -> &str {
                $profile.department
            }

            fn can_handle(&self, task: &Task) -> bool {
                $profile.matches(&task.message_lower())
            }

            async fn execute(&self, task: &Task) -> Result<AgentResult> {
                Ok(run(&self.tool_loop, &$profile, task).await)
            }
        }
    };
}

department_agent!(
    /// Revenue, expenses, budgets and invoices
    FinanceAgent,
    FINANCE
);
department_agent!(
    /// Customers, deals and pipeline
    SalesAgent,
    SALES
);
department_agent!(
    /// Campaigns, copy and launches
    MarketingAgent,
    MARKETING
);
department_agent!(
    /// Hiring, onboarding and leave
    HrAgent,
    HR
);
department_agent!(
    /// Suppliers, logistics, tickets and incidents
    OperationsAgent,
    OPERATIONS
);
department_agent!(
    /// Management questions spanning every department
    CrossDepartmentAgent,
    CROSS_DEPARTMENT
);
