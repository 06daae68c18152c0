use async_trait::async_trait;
use review_domain::error::{Error, Result};
use serde_json::Value;

use crate::contract::{Tool, ToolKind};

pub struct WriteFileTool;

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write (or overwrite) a file at the given path with the given content."
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Modifying {
            requires_confirmation: true,
        }
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": { "type": "string" },
                "content": { "type": "string" },
            },
            "required": ["path", "content"],
        })
    }

    fn validate(&self, arguments: &Value) -> Result<()> {
        let has_path = arguments.get("path").and_then(|v| v.as_str()).is_some();
        let has_content = arguments.get("content").and_then(|v| v.as_str()).is_some();
        if !has_path || !has_content {
            return Err(Error::Validation(
                "write_file requires string 'path' and 'content' arguments".into(),
            ));
        }
        Ok(())
    }

    async fn execute(&self, arguments: Value) -> Result<String> {
        let path = arguments["path"].as_str().unwrap_or_default();
        let content = arguments["content"].as_str().unwrap_or_default();
        if let Some(parent) = std::path::Path::new(path).parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::Other(format!("failed to create '{}': {e}", parent.display())))?;
        }
        tokio::fs::write(path, content)
            .await
            .map_err(|e| Error::Other(format!("failed to write '{path}': {e}")))?;
        Ok(format!("wrote {} bytes to {path}", content.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_a_modifying_tool_requiring_confirmation() {
        let tool = WriteFileTool;
        assert_eq!(
            tool.kind(),
            ToolKind::Modifying {
                requires_confirmation: true
            }
        );
    }

    #[tokio::test]
    async fn execute_writes_file_and_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out.txt");

        let tool = WriteFileTool;
        let result = tool
            .execute(serde_json::json!({
                "path": path.to_str().unwrap(),
                "content": "payload",
            }))
            .await
            .unwrap();
        assert!(result.contains("7 bytes"));
        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), "payload");
    }
}
