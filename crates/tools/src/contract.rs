//! The interface every tool implements, and the dispatch contract the
//! Tool Scheduler drives through a name → implementation map rather than
//! a match on tool name.

use async_trait::async_trait;
use review_domain::error::Result;
use serde_json::Value;

/// Whether invoking a tool can change state on the developer's machine.
/// The Agent Loop / client surfaces use this to decide whether a call
/// needs explicit developer confirmation before it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    ReadOnly,
    Modifying { requires_confirmation: bool },
}

#[async_trait]
pub trait Tool: Send + Sync {
    /// The name the LLM invokes this tool by; also the scheduler's
    /// per-tool config and rate-limit key.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn kind(&self) -> ToolKind;

    /// JSON Schema describing this tool's `arguments` object, advertised
    /// to the LLM provider as a [`review_domain::tool::ToolDefinition`].
    fn parameters_schema(&self) -> Value;

    /// Validate `arguments` against this tool's schema before scheduling
    /// execution. Returns `Error::Validation` on mismatch.
    fn validate(&self, arguments: &Value) -> Result<()>;

    /// Run the tool and return its result as a string, which becomes the
    /// content of the resulting `tool-result` content part.
    async fn execute(&self, arguments: Value) -> Result<String>;
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echoes its input back."
        }

        fn kind(&self) -> ToolKind {
            ToolKind::ReadOnly
        }

        fn parameters_schema(&self) -> Value {
            serde_json::json!({
                "type": "object",
                "properties": { "text": { "type": "string" } },
                "required": ["text"],
            })
        }

        fn validate(&self, arguments: &Value) -> Result<()> {
            if arguments.get("text").and_then(|v| v.as_str()).is_none() {
                return Err(review_domain::error::Error::Validation(
                    "echo requires a string 'text' argument".into(),
                ));
            }
            Ok(())
        }

        async fn execute(&self, arguments: Value) -> Result<String> {
            Ok(arguments["text"].as_str().unwrap_or_default().to_string())
        }
    }
}
