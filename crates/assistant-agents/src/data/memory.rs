//! In-Memory Data Sources
//!
//! For development and tests. The ledger is seeded with the last four
//! months relative to today so "last month" always has data.

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{CrmSource, LedgerSource, Outbox, ReportStore};
use crate::error::Result;
use crate::model::{Customer, Deal, DealStage, EmailDraft, EntryKind, LedgerEntry, Period, Report};

/// Monthly template: (kind, account, department, base amount)
const MONTHLY_LEDGER: &[(EntryKind, &str, &str, Decimal)] = &[
    (EntryKind::Revenue, "Product sales", "sales", dec!(412_500.00)),
    (EntryKind::Revenue, "Subscriptions", "sales", dec!(186_300.00)),
    (EntryKind::Revenue, "Professional services", "operations", dec!(54_250.00)),
    (EntryKind::Expense, "Payroll", "hr", dec!(298_000.00)),
    (EntryKind::Expense, "Cloud hosting", "operations", dec!(41_780.50)),
    (EntryKind::Expense, "Paid media", "marketing", dec!(63_400.00)),
    (EntryKind::Expense, "Office & facilities", "operations", dec!(27_950.00)),
    (EntryKind::Expense, "Software licenses", "finance", dec!(12_480.25)),
];

/// Ledger with generated monthly figures
pub struct InMemoryLedger {
    entries: Vec<LedgerEntry>,
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::seeded(Period::current(), 4)
    }
}

impl InMemoryLedger {
    pub const fn new(entries: Vec<LedgerEntry>) -> Self {
        Self { entries }
    }

    /// `months` months of data ending at `latest`; older months are scaled
    /// down 3% per month so trends are visible
    pub fn seeded(latest: Period, months: u32) -> Self {
        let mut entries = Vec::new();
        for back in 0..months {
            let period = latest.months_back(back);
            let scale = Decimal::ONE - Decimal::new(3, 2) * Decimal::from(back);
            for (kind, account, department, amount) in MONTHLY_LEDGER {
                entries.push(LedgerEntry {
                    period,
                    kind: *kind,
                    account: (*account).to_string(),
                    department: (*department).to_string(),
                    amount: (*amount * scale).round_dp(2),
                });
            }
        }
        Self { entries }
    }
}

#[async_trait]
impl LedgerSource for InMemoryLedger {
    async fn entries(&self, period: Period) -> Result<Vec<LedgerEntry>> {
        Ok(self
            .entries
            .iter()
            .filter(|e| e.period == period)
            .cloned()
            .collect())
    }
}

/// CRM with a handful of sample accounts
pub struct InMemoryCrm {
    customers: Vec<Customer>,
    deals: Vec<Deal>,
}

impl Default for InMemoryCrm {
    fn default() -> Self {
        let customer = |id: &str, name: &str, region: &str, tier: &str, owner: &str, ltv: Decimal| Customer {
            id: id.into(),
            name: name.into(),
            region: region.into(),
            tier: tier.into(),
            owner: owner.into(),
            lifetime_value: ltv,
        };
        let deal = |id: &str, customer_id: &str, title: &str, stage: DealStage, value: Decimal| Deal {
            id: id.into(),
            customer_id: customer_id.into(),
            title: title.into(),
            stage,
            value,
        };

        Self {
            customers: vec![
                customer("C-1001", "Acme Manufacturing", "North America", "enterprise", "Dana Ortiz", dec!(1_250_000)),
                customer("C-1002", "Globex Retail", "EMEA", "mid-market", "Sam Keller", dec!(310_000)),
                customer("C-1003", "Shanghai Lumen Tech", "APAC", "enterprise", "Li Wei", dec!(880_000)),
                customer("C-1004", "Initech", "North America", "smb", "Dana Ortiz", dec!(48_500)),
            ],
            deals: vec![
                deal("D-501", "C-1001", "Fleet analytics renewal", DealStage::Negotiation, dec!(240_000)),
                deal("D-502", "C-1001", "Plant expansion add-on", DealStage::Proposal, dec!(85_000)),
                deal("D-503", "C-1002", "POS integration", DealStage::ClosedWon, dec!(62_000)),
                deal("D-504", "C-1003", "Regional rollout", DealStage::Prospect, dec!(175_000)),
                deal("D-505", "C-1004", "Starter plan", DealStage::ClosedLost, dec!(9_600)),
            ],
        }
    }
}

impl InMemoryCrm {
    pub const fn new(customers: Vec<Customer>, deals: Vec<Deal>) -> Self {
        Self { customers, deals }
    }
}

#[async_trait]
impl CrmSource for InMemoryCrm {
    async fn search_customers(&self, query: &str) -> Result<Vec<Customer>> {
        let q = query.trim().to_lowercase();
        Ok(self
            .customers
            .iter()
            .filter(|c| {
                c.name.to_lowercase().contains(&q)
                    || c.id.to_lowercase() == q
                    || c.region.to_lowercase() == q
            })
            .cloned()
            .collect())
    }

    async fn deals_for(&self, customer_id: &str) -> Result<Vec<Deal>> {
        Ok(self
            .deals
            .iter()
            .filter(|d| d.customer_id == customer_id)
            .cloned()
            .collect())
    }
}

/// Outbox kept in memory
#[derive(Default)]
pub struct MemoryOutbox {
    drafts: RwLock<Vec<EmailDraft>>,
}

impl MemoryOutbox {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Outbox for MemoryOutbox {
    async fn save_draft(&self, draft: EmailDraft) -> Result<()> {
        self.drafts.write().await.push(draft);
        Ok(())
    }

    async fn drafts(&self) -> Result<Vec<EmailDraft>> {
        Ok(self.drafts.read().await.clone())
    }
}

/// Report store kept in memory
#[derive(Default)]
pub struct MemoryReportStore {
    reports: RwLock<HashMap<String, Report>>,
}

impl MemoryReportStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReportStore for MemoryReportStore {
    async fn save(&self, report: Report) -> Result<String> {
        let location = format!("reports/{}/{}", report.id, report.file_name());
        self.reports.write().await.insert(report.id.clone(), report);
        Ok(location)
    }

    async fn get(&self, id: &str) -> Result<Option<Report>> {
        Ok(self.reports.read().await.get(id).cloned())
    }
}
