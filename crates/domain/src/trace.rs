//! Structured lifecycle events emitted across the runtime's crates.
//!
//! Each variant is logged through `tracing` as a single structured
//! `runtime_event` field rather than threaded ad hoc through call sites —
//! callers build the event, then call `emit()`.

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    SessionCreated {
        session_id: String,
    },
    SessionResumed {
        session_id: String,
        message_count: usize,
    },
    SessionEvicted {
        session_id: String,
        reason: String,
    },
    SessionDeleted {
        session_id: String,
    },
    TurnStarted {
        session_id: String,
        turn: u32,
    },
    TurnCompleted {
        session_id: String,
        turn: u32,
        duration_ms: u64,
    },
    MaxTurnsReached {
        session_id: String,
        max_turns: u32,
    },
    ToolScheduled {
        session_id: String,
        tool_name: String,
        call_id: String,
    },
    ToolRateLimited {
        session_id: String,
        tool_name: String,
        retry_after_ms: u64,
    },
    ToolCompleted {
        session_id: String,
        tool_name: String,
        call_id: String,
        duration_ms: u64,
        success: bool,
    },
    ToolTimedOut {
        session_id: String,
        tool_name: String,
        call_id: String,
        timeout_ms: u64,
    },
    LlmRequest {
        session_id: String,
        provider: String,
        model: String,
        streaming: bool,
        duration_ms: u64,
        prompt_tokens: Option<u32>,
        completion_tokens: Option<u32>,
    },
    CancellationRequested {
        session_id: String,
        reason: String,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(runtime_event = %json, "runtime_event");
    }
}
