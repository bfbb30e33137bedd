//! Draft Email Tool
//!
//! Prepares an email in the outbox. Nothing is sent; a human reviews drafts.

use assistant_core::{
    Result as CoreResult,
    tool::{Artifact, Tool, ToolArguments, ToolDefinition, ToolOutcome},
};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;

use super::required_str;
use crate::data::Outbox;
use crate::error::ToolDataError;
use crate::model::EmailDraft;

/// Tool for drafting emails
pub struct DraftEmailTool {
    outbox: Arc<dyn Outbox>,
}

impl DraftEmailTool {
    pub fn new(outbox: Arc<dyn Outbox>) -> Self {
        Self { outbox }
    }
}

fn valid_address(address: &str) -> bool {
    match address.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !address.contains(' ')
        }
        None => false,
    }
}

#[async_trait]
impl Tool for DraftEmailTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "draft_email",
            "Draft an email for the requester to review. The draft is saved to the outbox and is \
             NOT sent.",
            json!({
                "type": "object",
                "properties": {
                    "to": {"type": "string", "description": "Recipient email address"},
                    "subject": {"type": "string"},
                    "body": {"type": "string", "description": "Plain-text body"}
                },
                "required": ["to", "subject", "body"]
            }),
        )
    }

    async fn execute(&self, arguments: &ToolArguments) -> CoreResult<ToolOutcome> {
        let to = required_str(arguments, "to")?;
        let subject = required_str(arguments, "subject")?;
        let body = required_str(arguments, "body")?;

        if !valid_address(to) {
            return Err(ToolDataError::InvalidInput(format!("'{to}' is not an email address")).into());
        }

        let draft = EmailDraft {
            id: uuid::Uuid::new_v4().to_string(),
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
            created_at: Utc::now(),
        };
        let id = draft.id.clone();
        self.outbox.save_draft(draft).await?;

        tracing::info!(draft_id = %id, "Email drafted");

        Ok(ToolOutcome::success(json!({
            "draft_id": id,
            "status": "draft",
            "to": to,
            "subject": subject,
        }))
        .with_artifact(Artifact {
            kind: "email_draft".into(),
            name: subject.to_string(),
            location: format!("outbox://{id}"),
        }))
    }
}
