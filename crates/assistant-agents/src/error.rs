//! Error Types for Department Tools

use assistant_core::error::AssistantError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ToolDataError>;

#[derive(Error, Debug)]
pub enum ToolDataError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unsupported period '{0}' (use YYYY-MM, this_month or last_month)")]
    InvalidPeriod(String),

    #[error("Data source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<ToolDataError> for AssistantError {
    fn from(err: ToolDataError) -> Self {
        match err {
            ToolDataError::InvalidInput(_) | ToolDataError::InvalidPeriod(_) => {
                Self::ToolValidation(err.to_string())
            }
            ToolDataError::Serialization(e) => Self::Json(e),
            ToolDataError::NotFound(_) | ToolDataError::SourceUnavailable(_) => {
                Self::ToolExecution(err.to_string())
            }
        }
    }
}
