//! CRM Lookup Tool

use assistant_core::{
    Result as CoreResult,
    tool::{Tool, ToolArguments, ToolDefinition, ToolOutcome},
};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::json;
use std::sync::Arc;

use super::required_str;
use crate::data::CrmSource;

/// Most customers returned for one query
const MAX_RESULTS: usize = 10;

/// Tool for looking up customers and their deals
pub struct CrmLookupTool {
    crm: Arc<dyn CrmSource>,
}

impl CrmLookupTool {
    pub fn new(crm: Arc<dyn CrmSource>) -> Self {
        Self { crm }
    }
}

#[async_trait]
impl Tool for CrmLookupTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "crm_lookup",
            "Look up customers in the CRM by name, customer ID or region, including their deals \
             and open pipeline value.",
            json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Customer name fragment, customer ID (e.g. C-1001) or region"
                    },
                    "include_closed": {
                        "type": "boolean",
                        "description": "Include won/lost deals (default: false)"
                    }
                },
                "required": ["query"]
            }),
        )
    }

    async fn execute(&self, arguments: &ToolArguments) -> CoreResult<ToolOutcome> {
        let query = required_str(arguments, "query")?;
        let include_closed = arguments
            .get("include_closed")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false);

        let customers = self.crm.search_customers(query).await?;
        tracing::debug!(query, matches = customers.len(), "CRM lookup");

        if customers.is_empty() {
            return Ok(ToolOutcome::success(json!({
                "matches": 0,
                "customers": [],
                "note": format!("No customer matches '{query}'"),
            })));
        }

        let mut results = Vec::with_capacity(customers.len().min(MAX_RESULTS));
        for customer in customers.iter().take(MAX_RESULTS) {
            let deals = self.crm.deals_for(&customer.id).await?;
            let open_pipeline: Decimal = deals
                .iter()
                .filter(|d| d.stage.is_open())
                .map(|d| d.value)
                .sum();
            let deals: Vec<_> = deals
                .into_iter()
                .filter(|d| include_closed || d.stage.is_open())
                .collect();

            results.push(json!({
                "customer": customer,
                "open_pipeline": open_pipeline,
                "deals": deals,
            }));
        }

        Ok(ToolOutcome::success(json!({
            "matches": customers.len(),
            "customers": results,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::InMemoryCrm;
    use serde_json::Value;

    fn tool() -> CrmLookupTool {
        CrmLookupTool::new(Arc::new(InMemoryCrm::default()))
    }

    fn args(value: Value) -> ToolArguments {
        value.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn test_lookup_with_pipeline() {
        let outcome = tool().execute(&args(json!({"query": "Acme"}))).await.unwrap();
        let output = outcome.output.unwrap();
        assert_eq!(output["matches"], 1);
        assert_eq!(output["customers"][0]["open_pipeline"], "325000");
        assert_eq!(output["customers"][0]["deals"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_closed_deals_hidden_by_default() {
        let output = tool()
            .execute(&args(json!({"query": "globex"})))
            .await
            .unwrap()
            .output
            .unwrap();
        assert!(output["customers"][0]["deals"].as_array().unwrap().is_empty());

        let output = tool()
            .execute(&args(json!({"query": "globex", "include_closed": true})))
            .await
            .unwrap()
            .output
            .unwrap();
        assert_eq!(output["customers"][0]["deals"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_no_match_is_not_an_error() {
        let outcome = tool().execute(&args(json!({"query": "Umbrella"}))).await.unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.output.unwrap()["matches"], 0);
    }

    #[tokio::test]
    async fn test_blank_query_rejected() {
        assert!(tool().execute(&args(json!({"query": "  "}))).await.is_err());
    }
}
