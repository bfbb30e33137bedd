//! Department Tools
//!
//! Business tools that implement `assistant_core::Tool` over the data
//! sources in [`crate::data`].

mod crm_lookup;
mod draft_email;
mod financial_query;
mod generate_report;

pub use crm_lookup::CrmLookupTool;
pub use draft_email::DraftEmailTool;
pub use financial_query::FinancialQueryTool;
pub use generate_report::GenerateReportTool;

use assistant_core::tool::ToolArguments;
use serde_json::Value;

use crate::error::ToolDataError;

/// Optional, trimmed, non-empty string argument
pub(crate) fn str_arg<'a>(args: &'a ToolArguments, name: &str) -> Option<&'a str> {
    args.get(name)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Required string argument
pub(crate) fn required_str<'a>(args: &'a ToolArguments, name: &str) -> Result<&'a str, ToolDataError> {
    str_arg(args, name).ok_or_else(|| ToolDataError::InvalidInput(format!("'{name}' must be a non-empty string")))
}
