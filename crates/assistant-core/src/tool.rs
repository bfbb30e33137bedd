//! Tool System
//!
//! Tools are registered at startup and invoked by the tool-calling loop.
//! Every tool is described by a JSON-schema [`ToolDefinition`] and answers
//! with a [`ToolOutcome`] envelope: `{success, output}` or `{success, error}`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{AssistantError, Result};

/// Tool arguments as sent by the model
pub type ToolArguments = Map<String, Value>;

/// Tool call request from the LLM
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Provider-assigned call ID, echoed back with the result
    pub id: String,

    /// Tool identifier
    pub name: String,

    /// Arguments object
    #[serde(default)]
    pub arguments: ToolArguments,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        let arguments = match arguments {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// A file or document produced by a tool
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// e.g. "report", "email_draft"
    pub kind: String,
    pub name: String,
    /// Path or URI where the artifact can be fetched
    pub location: String,
}

/// Result envelope from tool execution
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolOutcome {
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<Artifact>,
}

impl ToolOutcome {
    pub fn success(output: impl Into<Value>) -> Self {
        Self {
            success: true,
            output: Some(output.into()),
            error: None,
            artifacts: Vec::new(),
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: None,
            error: Some(error.into()),
            artifacts: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_artifact(mut self, artifact: Artifact) -> Self {
        self.artifacts.push(artifact);
        self
    }

    /// Render the envelope as the string content of a tool-result message.
    ///
    /// Never empty and never null: a missing output becomes `""`.
    pub fn to_content(&self) -> String {
        let mut body = Map::new();
        body.insert("success".into(), Value::Bool(self.success));
        if self.success {
            let output = match &self.output {
                None | Some(Value::Null) => Value::String(String::new()),
                Some(v) => v.clone(),
            };
            body.insert("output".into(), output);
        } else {
            let error = self
                .error
                .clone()
                .unwrap_or_else(|| "tool failed without an error message".into());
            body.insert("error".into(), Value::String(error));
        }
        Value::Object(body).to_string()
    }
}

/// Tool definition schema (for LLM function calling)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique tool identifier
    pub name: String,

    /// Human-readable description (shown to LLM)
    pub description: String,

    /// JSON Schema for the arguments object
    pub parameters: Value,
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }

    /// Names listed in the schema's `required` array
    pub fn required_parameters(&self) -> Vec<&str> {
        self.parameters
            .get("required")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }
}

/// Tool trait - implement to add new capabilities
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool's definition for LLM function calling
    fn definition(&self) -> ToolDefinition;

    /// Execute the tool with given arguments
    async fn execute(&self, arguments: &ToolArguments) -> Result<ToolOutcome>;

    /// Validate arguments before execution
    fn validate(&self, arguments: &ToolArguments) -> Result<()> {
        let definition = self.definition();
        for name in definition.required_parameters() {
            if !arguments.contains_key(name) {
                return Err(AssistantError::ToolValidation(format!(
                    "Missing required parameter: {name}"
                )));
            }
        }
        Ok(())
    }
}

/// Registry for available tools
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new tool
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        self.register_arc(Arc::new(tool));
    }

    /// Register a shared tool
    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.definition().name;
        if self.tools.insert(name.clone(), tool).is_some() {
            tracing::warn!(tool = %name, "Replaced previously registered tool");
        }
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Execute a named tool.
    ///
    /// Unknown tools and invalid arguments are errors; callers that must not
    /// fail convert them into failure envelopes.
    pub async fn execute(&self, name: &str, arguments: &ToolArguments) -> Result<ToolOutcome> {
        let tool = self
            .get(name)
            .ok_or_else(|| AssistantError::ToolNotFound(name.to_string()))?;

        tool.validate(arguments)?;
        tool.execute(arguments).await
    }

    /// Definitions of all tools, optionally restricted to an allow-list
    pub fn definitions(&self, allow: Option<&[&str]>) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .filter(|(name, _)| allow.is_none_or(|names| names.contains(&name.as_str())))
            .map(|(_, tool)| tool.definition())
            .collect()
    }

    /// Get tool names
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

// ============================================================================
// Built-in Tools
// ============================================================================

/// Returns the current date and time
pub struct DateTimeTool;

#[async_trait]
impl Tool for DateTimeTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "current_datetime",
            "Get the current date and time (UTC)",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "format": {
                        "type": "string",
                        "enum": ["iso", "human", "unix"],
                        "description": "Output format (default: human)"
                    }
                }
            }),
        )
    }

    async fn execute(&self, arguments: &ToolArguments) -> Result<ToolOutcome> {
        let format = arguments
            .get("format")
            .and_then(Value::as_str)
            .unwrap_or("human");

        let now = chrono::Utc::now();

        let output = match format {
            "iso" => now.to_rfc3339(),
            "unix" => now.timestamp().to_string(),
            _ => now.format("%A, %B %d, %Y at %H:%M:%S UTC").to_string(),
        };

        Ok(ToolOutcome::success(output))
    }
}
