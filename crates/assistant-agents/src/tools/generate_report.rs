//! Generate Report Tool
//!
//! Assembles a markdown report from titled sections and stores it.

use assistant_core::{
    Result as CoreResult,
    tool::{Artifact, Tool, ToolArguments, ToolDefinition, ToolOutcome},
};
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};
use std::fmt::Write as _;
use std::sync::Arc;

use super::{required_str, str_arg};
use crate::data::ReportStore;
use crate::error::ToolDataError;
use crate::model::Report;

#[derive(Debug, Deserialize)]
struct Section {
    heading: String,
    #[serde(default)]
    body: String,
}

/// Tool for producing markdown reports
pub struct GenerateReportTool {
    store: Arc<dyn ReportStore>,
}

impl GenerateReportTool {
    pub fn new(store: Arc<dyn ReportStore>) -> Self {
        Self { store }
    }
}

fn render(title: &str, department: Option<&str>, sections: &[Section]) -> String {
    let mut md = format!("# {title}\n\n");
    let generated = Utc::now().format("%Y-%m-%d %H:%M UTC");
    match department {
        Some(dept) => {
            let _ = writeln!(md, "_Department: {dept} · Generated {generated}_\n");
        }
        None => {
            let _ = writeln!(md, "_Generated {generated}_\n");
        }
    }
    for section in sections {
        let _ = writeln!(md, "## {}\n\n{}\n", section.heading.trim(), section.body.trim());
    }
    md
}

#[async_trait]
impl Tool for GenerateReportTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "generate_report",
            "Create a markdown report document from sections. Use this after gathering figures \
             with other tools. Returns where the report is stored.",
            json!({
                "type": "object",
                "properties": {
                    "title": {"type": "string"},
                    "department": {"type": "string"},
                    "sections": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "heading": {"type": "string"},
                                "body": {"type": "string", "description": "Markdown content"}
                            },
                            "required": ["heading"]
                        }
                    }
                },
                "required": ["title", "sections"]
            }),
        )
    }

    async fn execute(&self, arguments: &ToolArguments) -> CoreResult<ToolOutcome> {
        let title = required_str(arguments, "title")?;
        let department = str_arg(arguments, "department");
        let sections: Vec<Section> = serde_json::from_value(
            arguments.get("sections").cloned().unwrap_or(Value::Null),
        )
        .map_err(|e| ToolDataError::InvalidInput(format!("sections: {e}")))?;
        if sections.is_empty() {
            return Err(ToolDataError::InvalidInput("a report needs at least one section".into()).into());
        }

        let report = Report {
            id: uuid::Uuid::new_v4().simple().to_string(),
            title: title.to_string(),
            department: department.map(str::to_string),
            markdown: render(title, department, &sections),
            created_at: Utc::now(),
        };
        let id = report.id.clone();
        let name = report.file_name();
        let bytes = report.markdown.len();
        let location = self.store.save(report).await?;

        tracing::info!(report_id = %id, %location, sections = sections.len(), "Report generated");

        Ok(ToolOutcome::success(json!({
            "report_id": id,
            "location": location,
            "sections": sections.len(),
            "bytes": bytes,
        }))
        .with_artifact(Artifact {
            kind: "report".into(),
            name,
            location,
        }))
    }
}
