//! Financial Query Tool
//!
//! Revenue, expense and P&L figures for one month from the ledger.

use assistant_core::{
    Result as CoreResult,
    tool::{Tool, ToolArguments, ToolDefinition, ToolOutcome},
};
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::str_arg;
use crate::data::LedgerSource;
use crate::error::ToolDataError;
use crate::model::{EntryKind, LedgerEntry, Period};

/// Which figure to report
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Metric {
    Revenue,
    Expenses,
    ProfitAndLoss,
}

impl Metric {
    fn parse(input: Option<&str>) -> Result<Self, ToolDataError> {
        match input.map(str::to_lowercase).as_deref() {
            None | Some("pnl" | "p&l" | "profit_and_loss") => Ok(Self::ProfitAndLoss),
            Some("revenue") => Ok(Self::Revenue),
            Some("expenses" | "expense") => Ok(Self::Expenses),
            Some(other) => Err(ToolDataError::InvalidInput(format!("unknown metric '{other}'"))),
        }
    }
}

#[derive(Debug, Serialize)]
struct Statement {
    period: String,
    department: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    revenue: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expenses: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    net_income: Option<Decimal>,
    by_account: BTreeMap<String, Decimal>,
}

fn summarize(entries: &[LedgerEntry], metric: Metric) -> (Decimal, Decimal, BTreeMap<String, Decimal>) {
    let mut revenue = Decimal::ZERO;
    let mut expenses = Decimal::ZERO;
    let mut by_account = BTreeMap::new();

    for entry in entries {
        let include = match entry.kind {
            EntryKind::Revenue => {
                revenue += entry.amount;
                metric != Metric::Expenses
            }
            EntryKind::Expense => {
                expenses += entry.amount;
                metric != Metric::Revenue
            }
        };
        if include {
            *by_account.entry(entry.account.clone()).or_insert(Decimal::ZERO) += entry.amount;
        }
    }

    (revenue, expenses, by_account)
}

/// Tool for querying the general ledger
pub struct FinancialQueryTool {
    ledger: Arc<dyn LedgerSource>,
}

impl FinancialQueryTool {
    pub fn new(ledger: Arc<dyn LedgerSource>) -> Self {
        Self { ledger }
    }
}

#[async_trait]
impl Tool for FinancialQueryTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "financial_query",
            "Query the general ledger for one month. Returns revenue, expenses and net income \
             with a per-account breakdown. Amounts are in USD.",
            json!({
                "type": "object",
                "properties": {
                    "metric": {
                        "type": "string",
                        "enum": ["revenue", "expenses", "pnl"],
                        "description": "Figure to report (default: pnl)"
                    },
                    "period": {
                        "type": "string",
                        "description": "Month as YYYY-MM, or 'this_month' / 'last_month' (default: last_month)"
                    },
                    "department": {
                        "type": "string",
                        "description": "Restrict to one department's accounts"
                    }
                }
            }),
        )
    }

    async fn execute(&self, arguments: &ToolArguments) -> CoreResult<ToolOutcome> {
        let metric = Metric::parse(str_arg(arguments, "metric"))?;
        let period = Period::parse(
            str_arg(arguments, "period").unwrap_or("last_month"),
            Utc::now().date_naive(),
        )?;
        let department = str_arg(arguments, "department").map(str::to_lowercase);

        let mut entries = self.ledger.entries(period).await?;
        if let Some(dept) = department.as_deref() {
            entries.retain(|e| e.department == dept);
        }

        tracing::debug!(%period, ?metric, entries = entries.len(), "Financial query");

        if entries.is_empty() {
            return Ok(ToolOutcome::failure(format!("No ledger entries for {period}")));
        }

        let (revenue, expenses, by_account) = summarize(&entries, metric);
        let statement = Statement {
            period: period.to_string(),
            department,
            revenue: (metric != Metric::Expenses).then_some(revenue),
            expenses: (metric != Metric::Revenue).then_some(expenses),
            net_income: (metric == Metric::ProfitAndLoss).then(|| revenue - expenses),
            by_account,
        };

        Ok(ToolOutcome::success(serde_json::to_value(statement)?))
    }
}
