//! Regex content search across a directory tree.

use async_trait::async_trait;
use regex::Regex;
use review_domain::error::{Error, Result};
use serde_json::Value;

use crate::contract::{Tool, ToolKind};

pub struct SearchTool;

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &str {
        "search"
    }

    fn description(&self) -> &str {
        "Search for a regex pattern across files under a directory, returning matching lines."
    }

    fn kind(&self) -> ToolKind {
        ToolKind::ReadOnly
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "pattern": { "type": "string" },
                "path": { "type": "string", "description": "Directory to search, defaults to '.'" },
                "max_results": { "type": "integer" },
            },
            "required": ["pattern"],
        })
    }

    fn validate(&self, arguments: &Value) -> Result<()> {
        let pattern = arguments
            .get("pattern")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::Validation("search requires a string 'pattern' argument".into()))?;
        Regex::new(pattern).map_err(|e| Error::Validation(format!("invalid regex: {e}")))?;
        Ok(())
    }

    async fn execute(&self, arguments: Value) -> Result<String> {
        let pattern = arguments["pattern"].as_str().unwrap_or_default();
        let root = arguments
            .get("path")
            .and_then(|v| v.as_str())
            .unwrap_or(".")
            .to_string();
        let max_results = arguments
            .get("max_results")
            .and_then(|v| v.as_u64())
            .unwrap_or(200) as usize;

        let re = Regex::new(pattern).map_err(|e| Error::Validation(format!("invalid regex: {e}")))?;

        let root = std::path::PathBuf::from(root);
        let matches = tokio::task::spawn_blocking(move || search_dir(&root, &re, max_results))
            .await
            .map_err(|e| Error::Other(format!("search task panicked: {e}")))??;

        if matches.is_empty() {
            Ok("no matches".to_string())
        } else {
            Ok(matches.join("\n"))
        }
    }
}

fn search_dir(root: &std::path::Path, re: &Regex, max_results: usize) -> Result<Vec<String>> {
    let mut matches = Vec::new();
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        if matches.len() >= max_results {
            break;
        }
        let entries = match std::fs::read_dir(&dir) {
            Ok(e) => e,
            Err(_) => continue,
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                if path.file_name().and_then(|n| n.to_str()) != Some(".git") {
                    stack.push(path);
                }
                continue;
            }
            let Ok(content) = std::fs::read_to_string(&path) else {
                continue;
            };
            for (lineno, line) in content.lines().enumerate() {
                if re.is_match(line) {
                    matches.push(format!("{}:{}: {}", path.display(), lineno + 1, line.trim()));
                    if matches.len() >= max_results {
                        break;
                    }
                }
            }
        }
    }

    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_invalid_regex() {
        let tool = SearchTool;
        let result = tool.validate(&serde_json::json!({ "pattern": "(unclosed" }));
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn execute_finds_matching_lines() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "fn main() {}\n// TODO: fix this\n").unwrap();

        let tool = SearchTool;
        let result = tool
            .execute(serde_json::json!({
                "pattern": "TODO",
                "path": dir.path().to_str().unwrap(),
            }))
            .await
            .unwrap();
        assert!(result.contains("TODO: fix this"));
    }

    #[tokio::test]
    async fn execute_no_matches_reports_clearly() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "fn main() {}\n").unwrap();

        let tool = SearchTool;
        let result = tool
            .execute(serde_json::json!({
                "pattern": "nonexistent_pattern_xyz",
                "path": dir.path().to_str().unwrap(),
            }))
            .await
            .unwrap();
        assert_eq!(result, "no matches");
    }
}
