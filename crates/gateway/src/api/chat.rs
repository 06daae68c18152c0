//! `/chat` — the only wire boundary: `POST` drives one Agent Loop turn
//! over SSE, `GET` reports service health/status.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Json};
use futures_util::stream::Stream;
use serde::Deserialize;

use review_domain::sse::{now_ms, SseError, SseEvent, ToolCallWire};
use review_providers::LlmProvider;

use crate::runtime::{run_turn, CancelToken, TurnEvent, TurnInput};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequestBody {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub project_path: Option<String>,
    #[serde(default)]
    pub user_memory: Option<String>,
    #[serde(default)]
    pub custom_instructions: Option<String>,
}

/// `POST /chat` — validates the request, resolves/creates the session,
/// then streams the turn as SSE. Returns 400 before a stream starts if
/// `message` is absent or empty.
pub async fn chat(
    State(state): State<AppState>,
    Json(body): Json<ChatRequestBody>,
) -> impl IntoResponse {
    if body.message.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "message must not be empty" })),
        )
            .into_response();
    }

    let session = state.sessions.get_or_create(body.session_id.as_deref());
    let session_id = session.id.clone();
    let permit = state.sessions.acquire_run_lock(&session_id).await;
    let cancel = state.sessions.register_cancel_token(&session_id);
    let stream_cancel = cancel.clone();

    let input = TurnInput {
        user_message: body.message,
        model: None,
        project_path: body.project_path,
        user_memory: body.user_memory,
        custom_instructions: body.custom_instructions,
    };

    let rx = run_turn(
        state.llm.clone(),
        state.scheduler.clone(),
        session,
        state.sessions.max_turns(),
        cancel,
        input,
        state.tools.tool_definitions(),
        state.config.llm.clone(),
    );

    let stream = make_sse_stream(session_id, rx, permit, state.sessions.clone(), stream_cancel);

    Sse::new(stream)
        .keep_alive(KeepAlive::default())
        .into_response()
}

/// `GET /chat` — health/status probe. No body.
pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "details": {
            "config": {
                "model": state.config.llm.default_model,
                "maxTurns": state.sessions.max_turns(),
                "tools": state.tools.names(),
            },
            "service": {
                "provider": state.llm.provider_id(),
                "activeSessions": state.sessions.session_count(),
                "uptimeSecs": state.started_at.elapsed().as_secs(),
            },
        },
    }))
}

/// Trips the session's cancel token when the generator it's bound in is
/// dropped — whether that's normal stream completion or the client
/// disconnecting mid-turn and axum dropping the `Stream` early.
struct CancelOnDrop(CancelToken);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

fn make_sse_stream(
    session_id: String,
    mut rx: tokio::sync::mpsc::Receiver<TurnEvent>,
    permit: tokio::sync::OwnedSemaphorePermit,
    sessions: std::sync::Arc<crate::runtime::SessionManager>,
    cancel: CancelToken,
) -> impl Stream<Item = Result<Event, std::convert::Infallible>> {
    async_stream::stream! {
        let _cancel_guard = CancelOnDrop(cancel);

        yield sse_json(&SseEvent::Connected {
            session_id: session_id.clone(),
            timestamp: now_ms(),
        });

        while let Some(event) = rx.recv().await {
            match event {
                TurnEvent::AssistantDelta { text } => {
                    yield sse_json(&SseEvent::Response {
                        session_id: session_id.clone(),
                        timestamp: now_ms(),
                        content: text,
                    });
                }
                TurnEvent::ToolStarted { tool_call } => {
                    yield sse_json(&SseEvent::ToolStart {
                        session_id: session_id.clone(),
                        timestamp: now_ms(),
                        tool_call: ToolCallWire::from(&tool_call),
                    });
                }
                TurnEvent::ToolCompleted { tool_call } => {
                    yield sse_json(&SseEvent::ToolComplete {
                        session_id: session_id.clone(),
                        timestamp: now_ms(),
                        tool_call: ToolCallWire::from(&tool_call),
                    });
                }
                TurnEvent::Final { message } => {
                    yield sse_json(&SseEvent::Complete {
                        session_id: session_id.clone(),
                        timestamp: now_ms(),
                        message,
                    });
                }
                TurnEvent::Usage(_) => {
                    // Not part of the wire contract; kept internal for tracing.
                }
                TurnEvent::Stopped => {
                    // Cancellation: no error event, the stream just ends.
                    break;
                }
                TurnEvent::Error { code, message } => {
                    yield sse_json(&SseEvent::Error {
                        session_id: session_id.clone(),
                        timestamp: now_ms(),
                        error: SseError {
                            code: code.to_string(),
                            message,
                            timestamp: now_ms(),
                            details: None,
                        },
                    });
                    break;
                }
            }
        }

        sessions.clear_cancel_token(&session_id);
        drop(permit);
    }
}

fn sse_json(event: &SseEvent) -> Result<Event, std::convert::Infallible> {
    Ok(Event::default().data(serde_json::to_string(event).unwrap_or_default()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_message_is_rejected_before_session_creation() {
        let body = ChatRequestBody {
            message: "   ".into(),
            session_id: None,
            project_path: None,
            user_memory: None,
            custom_instructions: None,
        };
        assert!(body.message.trim().is_empty());
    }

    #[test]
    fn request_body_accepts_camel_case_fields() {
        let json = r#"{"message":"hi","sessionId":"s1","projectPath":"/repo","userMemory":"m","customInstructions":"c"}"#;
        let body: ChatRequestBody = serde_json::from_str(json).unwrap();
        assert_eq!(body.session_id.as_deref(), Some("s1"));
        assert_eq!(body.project_path.as_deref(), Some("/repo"));
        assert_eq!(body.user_memory.as_deref(), Some("m"));
        assert_eq!(body.custom_instructions.as_deref(), Some("c"));
    }

    #[tokio::test]
    async fn dropping_the_stream_cancels_the_session_token() {
        use futures_util::StreamExt;
        use review_domain::config::SessionsConfig;

        let sessions = std::sync::Arc::new(crate::runtime::SessionManager::new(
            SessionsConfig::default(),
        ));
        let session = sessions.create();
        let cancel = sessions.register_cancel_token(&session.id);
        let (_tx, rx) = tokio::sync::mpsc::channel::<TurnEvent>(1);
        let semaphore = std::sync::Arc::new(tokio::sync::Semaphore::new(1));
        let permit = semaphore.acquire_owned().await.unwrap();

        let stream = make_sse_stream(session.id.clone(), rx, permit, sessions, cancel.clone());
        tokio::pin!(stream);

        assert!(!cancel.is_cancelled());
        // Poll once so the generator starts and the drop guard is bound.
        let _ = stream.next().await;
        drop(stream);

        assert!(cancel.is_cancelled());
    }
}
