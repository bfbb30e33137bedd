//! Data Sources
//!
//! Narrow interfaces the department tools read from and write to.
//! Implement these over a real ledger, CRM, mail system or file store.

mod memory;

pub use memory::{InMemoryCrm, InMemoryLedger, MemoryOutbox, MemoryReportStore};

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{Customer, Deal, EmailDraft, LedgerEntry, Period, Report};

/// General ledger
#[async_trait]
pub trait LedgerSource: Send + Sync {
    async fn entries(&self, period: Period) -> Result<Vec<LedgerEntry>>;
}

/// Customer relationship data
#[async_trait]
pub trait CrmSource: Send + Sync {
    /// Case-insensitive match on name, ID or region
    async fn search_customers(&self, query: &str) -> Result<Vec<Customer>>;

    async fn deals_for(&self, customer_id: &str) -> Result<Vec<Deal>>;
}

/// Drafted emails awaiting review
#[async_trait]
pub trait Outbox: Send + Sync {
    async fn save_draft(&self, draft: EmailDraft) -> Result<()>;

    async fn drafts(&self) -> Result<Vec<EmailDraft>>;
}

/// Generated reports
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Store a report and return where it can be fetched
    async fn save(&self, report: Report) -> Result<String>;

    async fn get(&self, id: &str) -> Result<Option<Report>>;
}
