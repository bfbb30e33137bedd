//! Domain Models
//!
//! Business records behind the department tools.
//! Uses `rust_decimal` for all monetary values - never use f64 for money!

use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, ToolDataError};

/// A calendar month, `YYYY-MM`
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Period {
    pub year: i32,
    pub month: u32,
}

impl Period {
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn current() -> Self {
        Self::from_date(Utc::now().date_naive())
    }

    /// The month `n` months before this one
    #[must_use]
    pub fn months_back(self, n: u32) -> Self {
        let first = NaiveDate::from_ymd_opt(self.year, self.month, 1)
            .and_then(|d| d.checked_sub_months(Months::new(n)));
        first.map_or(self, Self::from_date)
    }

    /// Parse `YYYY-MM`, `this_month` or `last_month` relative to `today`
    pub fn parse(input: &str, today: NaiveDate) -> Result<Self> {
        let input = input.trim().to_lowercase();
        let current = Self::from_date(today);
        match input.as_str() {
            "" | "this_month" | "current" => return Ok(current),
            "last_month" | "previous_month" => return Ok(current.months_back(1)),
            _ => {}
        }

        let (year, month) = input
            .split_once('-')
            .ok_or_else(|| ToolDataError::InvalidPeriod(input.clone()))?;
        let year: i32 = year.parse().map_err(|_| ToolDataError::InvalidPeriod(input.clone()))?;
        let month: u32 = month.parse().map_err(|_| ToolDataError::InvalidPeriod(input.clone()))?;
        if !(1..=12).contains(&month) {
            return Err(ToolDataError::InvalidPeriod(input));
        }
        Ok(Self { year, month })
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Revenue or expense
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Revenue,
    Expense,
}

/// One ledger line
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub period: Period,
    pub kind: EntryKind,
    /// e.g. "Product sales", "Payroll"
    pub account: String,
    /// Owning department
    pub department: String,
    pub amount: Decimal,
}

/// Customer record
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub region: String,
    /// "enterprise", "mid-market", "smb"
    pub tier: String,
    pub owner: String,
    pub lifetime_value: Decimal,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DealStage {
    Prospect,
    Proposal,
    Negotiation,
    ClosedWon,
    ClosedLost,
}

impl DealStage {
    pub const fn is_open(self) -> bool {
        !matches!(self, Self::ClosedWon | Self::ClosedLost)
    }
}

/// Sales opportunity
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Deal {
    pub id: String,
    pub customer_id: String,
    pub title: String,
    pub stage: DealStage,
    pub value: Decimal,
}

/// Email prepared for a human to review and send
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EmailDraft {
    pub id: String,
    pub to: String,
    pub subject: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Generated markdown report
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Report {
    pub id: String,
    pub title: String,
    pub department: Option<String>,
    pub markdown: String,
    pub created_at: DateTime<Utc>,
}

impl Report {
    /// File name derived from the title
    pub fn file_name(&self) -> String {
        let mut slug = String::with_capacity(self.title.len());
        for c in self.title.chars() {
            if c.is_alphanumeric() {
                slug.extend(c.to_lowercase());
            } else if !slug.ends_with('-') {
                slug.push('-');
            }
        }
        let slug = slug.trim_matches('-');
        if slug.is_empty() {
            format!("report-{}.md", self.id)
        } else {
            format!("{slug}.md")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_period_parsing() {
        let today = date(2025, 1, 15);
        assert_eq!(Period::parse("last_month", today).unwrap().to_string(), "2024-12");
        assert_eq!(Period::parse("this_month", today).unwrap().to_string(), "2025-01");
        assert_eq!(Period::parse("2024-07", today).unwrap(), Period { year: 2024, month: 7 });
        assert!(Period::parse("2024-13", today).is_err());
        assert!(Period::parse("July", today).is_err());
    }

    #[test]
    fn test_report_file_name() {
        let report = Report {
            id: "r1".into(),
            title: "Q2 P&L / Finance".into(),
            department: None,
            markdown: String::new(),
            created_at: Utc::now(),
        };
        assert_eq!(report.file_name(), "q2-p-l-finance.md");
    }
}
