use async_trait::async_trait;
use review_domain::error::{Error, Result};
use serde_json::Value;

use crate::contract::{Tool, ToolKind};

pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a file at the given path, relative to the project root."
    }

    fn kind(&self) -> ToolKind {
        ToolKind::ReadOnly
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "File path to read" },
            },
            "required": ["path"],
        })
    }

    fn validate(&self, arguments: &Value) -> Result<()> {
        arguments
            .get("path")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::Validation("read_file requires a string 'path' argument".into()))?;
        Ok(())
    }

    async fn execute(&self, arguments: Value) -> Result<String> {
        let path = arguments["path"].as_str().unwrap_or_default();
        tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::Other(format!("failed to read '{path}': {e}")))
    }
}
