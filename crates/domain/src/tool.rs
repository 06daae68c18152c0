//! The conversation data model: messages, content parts, and tool calls.
//!
//! A single representation is shared by the message log, the LLM request
//! builder, and the stream parser — the plain-string shortcut used by
//! simple messages is just the single-element, text-only case of the
//! same [`MessageContent`] sum.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Message
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One entry in a session's conversation log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: MessageContent,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MessageMetadata>,
}

/// Optional per-message bookkeeping: which model produced it, and at what
/// token cost. Only assistant messages normally carry this.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ContentPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool-use")]
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    #[serde(rename = "tool-result")]
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default)]
        is_error: bool,
    },
}

impl Message {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            id: new_message_id(),
            role: Role::System,
            content: MessageContent::Text(text.into()),
            timestamp: Utc::now(),
            metadata: None,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            id: new_message_id(),
            role: Role::User,
            content: MessageContent::Text(text.into()),
            timestamp: Utc::now(),
            metadata: None,
        }
    }

    /// An assistant message combining accumulated text and the tool-use
    /// parts from one turn. Text and tool-use parts live in a single
    /// message so later tool-result parts can correlate against it.
    pub fn assistant_with_tool_uses(text: &str, tool_calls: &[ToolCall]) -> Self {
        let mut parts = Vec::new();
        if !text.is_empty() {
            parts.push(ContentPart::Text {
                text: text.to_string(),
            });
        }
        for tc in tool_calls {
            parts.push(ContentPart::ToolUse {
                id: tc.id.clone(),
                name: tc.tool_name.clone(),
                input: tc.arguments.clone(),
            });
        }
        Self {
            id: new_message_id(),
            role: Role::Assistant,
            content: MessageContent::Parts(parts),
            timestamp: Utc::now(),
            metadata: None,
        }
    }

    /// A user message whose content is the ordered list of tool-result
    /// parts for every tool call from the preceding assistant message.
    pub fn tool_results(results: Vec<ContentPart>) -> Self {
        Self {
            id: new_message_id(),
            role: Role::User,
            content: MessageContent::Parts(results),
            timestamp: Utc::now(),
            metadata: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}

impl MessageContent {
    pub fn extract_all_text(&self) -> String {
        match self {
            MessageContent::Text(t) => t.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    /// All tool-use ids carried by this content, in order.
    pub fn tool_use_ids(&self) -> Vec<&str> {
        match self {
            MessageContent::Text(_) => Vec::new(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::ToolUse { id, .. } => Some(id.as_str()),
                    _ => None,
                })
                .collect(),
        }
    }
}

fn new_message_id() -> String {
    format!("msg_{}", uuid::Uuid::new_v4())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ToolCall — the mutable per-invocation lifecycle record
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One tool invocation, tracked from the moment the Stream Parser opens
/// its `tool-use-start` block through scheduler execution to completion.
///
/// Created by the Stream Parser (id, name, arguments), then mutated
/// in-place by the Tool Scheduler (status, timestamps, result/error) as
/// it moves through its lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub tool_name: String,
    pub arguments: serde_json::Value,
    pub status: ToolCallStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallStatus {
    Pending,
    Validating,
    Executing,
    Completed,
    Failed,
    Cancelled,
}

impl ToolCall {
    /// Create a pending tool call as the Stream Parser does at
    /// `tool-use-start`, before arguments are known.
    pub fn pending(id: impl Into<String>, tool_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tool_name: tool_name.into(),
            arguments: serde_json::Value::Null,
            status: ToolCallStatus::Pending,
            started_at: None,
            completed_at: None,
            result: None,
            error: None,
        }
    }

    pub fn to_result_part(&self) -> ContentPart {
        match self.status {
            ToolCallStatus::Completed => ContentPart::ToolResult {
                tool_use_id: self.id.clone(),
                content: self.result.clone().unwrap_or_default(),
                is_error: false,
            },
            _ => ContentPart::ToolResult {
                tool_use_id: self.id.clone(),
                content: self
                    .error
                    .clone()
                    .unwrap_or_else(|| "tool did not complete".to_string()),
                is_error: true,
            },
        }
    }
}

/// The JSON-schema advertisement of a tool, as sent to the LLM provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}
