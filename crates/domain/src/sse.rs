//! The SSE wire event — what actually reaches the client.
//!
//! Distinct from [`crate::stream::ProviderChunk`] (what the LLM provider
//! sends us) and from the Agent Loop's internal tool-call bookkeeping
//! ([`crate::tool::ToolCall`]) — this is the outward-facing camelCase
//! shape the SSE Emitter serializes as `data: <json>\n\n`.

use chrono::Utc;
use serde::Serialize;

use crate::tool::{ToolCall, ToolCallStatus};

/// One SSE record's `data:` payload: `{type, data}`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
#[serde(rename_all = "camelCase")]
pub enum SseEvent {
    #[serde(rename = "connected")]
    Connected { session_id: String, timestamp: i64 },

    #[serde(rename = "thinking")]
    Thinking {
        session_id: String,
        timestamp: i64,
        content: String,
    },

    #[serde(rename = "response")]
    Response {
        session_id: String,
        timestamp: i64,
        content: String,
    },

    #[serde(rename = "tool_start")]
    ToolStart {
        session_id: String,
        timestamp: i64,
        tool_call: ToolCallWire,
    },

    #[serde(rename = "tool_progress")]
    ToolProgress {
        session_id: String,
        timestamp: i64,
        tool_call: ToolCallWire,
        progress: f32,
    },

    #[serde(rename = "tool_complete")]
    ToolComplete {
        session_id: String,
        timestamp: i64,
        tool_call: ToolCallWire,
    },

    #[serde(rename = "complete")]
    Complete {
        session_id: String,
        timestamp: i64,
        message: crate::tool::Message,
    },

    #[serde(rename = "error")]
    Error {
        session_id: String,
        timestamp: i64,
        error: SseError,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct SseError {
    pub code: String,
    pub message: String,
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// The wire shape of a tool call: a projection of [`ToolCall`]'s full
/// lifecycle bookkeeping onto the handful of fields a client needs.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallWire {
    pub id: String,
    pub tool: String,
    pub params: serde_json::Value,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&ToolCall> for ToolCallWire {
    fn from(call: &ToolCall) -> Self {
        let status = match call.status {
            ToolCallStatus::Pending | ToolCallStatus::Validating | ToolCallStatus::Executing => {
                "executing"
            }
            ToolCallStatus::Completed => "completed",
            ToolCallStatus::Failed | ToolCallStatus::Cancelled => "failed",
        };
        Self {
            id: call.id.clone(),
            tool: call.tool_name.clone(),
            params: call.arguments.clone(),
            status,
            result: call.result.clone(),
            error: call.error.clone(),
        }
    }
}

impl SseEvent {
    /// The event's `type` discriminant, used as the SSE record's `event:` line.
    pub fn event_name(&self) -> &'static str {
        match self {
            SseEvent::Connected { .. } => "connected",
            SseEvent::Thinking { .. } => "thinking",
            SseEvent::Response { .. } => "response",
            SseEvent::ToolStart { .. } => "tool_start",
            SseEvent::ToolProgress { .. } => "tool_progress",
            SseEvent::ToolComplete { .. } => "tool_complete",
            SseEvent::Complete { .. } => "complete",
            SseEvent::Error { .. } => "error",
        }
    }

    /// Render as a raw SSE wire record: `data: <json>\n\n`.
    pub fn to_sse_record(&self) -> String {
        let json = serde_json::to_string(self).unwrap_or_default();
        format!("data: {json}\n\n")
    }
}

pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}
