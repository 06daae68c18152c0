use async_trait::async_trait;
use review_domain::error::{Error, Result};
use serde_json::Value;

use crate::contract::{Tool, ToolKind};

pub struct WebFetchTool {
    client: reqwest::Client,
}

impl Default for WebFetchTool {
    fn default() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Tool for WebFetchTool {
    fn name(&self) -> &str {
        "web_fetch"
    }

    fn description(&self) -> &str {
        "Fetch the text content of a URL."
    }

    fn kind(&self) -> ToolKind {
        ToolKind::ReadOnly
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "url": { "type": "string" },
            },
            "required": ["url"],
        })
    }

    fn validate(&self, arguments: &Value) -> Result<()> {
        let url = arguments
            .get("url")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::Validation("web_fetch requires a string 'url' argument".into()))?;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(Error::Validation(
                "web_fetch 'url' must be an http(s) URL".into(),
            ));
        }
        Ok(())
    }

    async fn execute(&self, arguments: Value) -> Result<String> {
        let url = arguments["url"].as_str().unwrap_or_default();
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Other(format!("request to '{url}' failed: {e}")))?;
        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| Error::Other(format!("failed reading response body: {e}")))?;
        if !status.is_success() {
            return Err(Error::Other(format!("HTTP {} fetching '{url}'", status.as_u16())));
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_non_http_scheme() {
        let tool = WebFetchTool::default();
        let result = tool.validate(&serde_json::json!({ "url": "file:///etc/passwd" }));
        assert!(result.is_err());
    }

    #[test]
    fn validate_accepts_https_url() {
        let tool = WebFetchTool::default();
        let result = tool.validate(&serde_json::json!({ "url": "https://example.com" }));
        assert!(result.is_ok());
    }
}
