//! The Agent Loop: the ReAct-style turn executor.
//!
//! Drives the provider through `chat_stream`, feeds raw chunks through
//! the [`super::parser::StreamParser`], dispatches any resulting tool
//! calls through the [`super::scheduler::ToolScheduler`], and repeats
//! until the model stops calling tools or `max_turns` is hit. Checked
//! for cancellation at every suspension point: between stream chunks,
//! and before/after each tool execution.

use std::sync::Arc;

use futures_util::StreamExt;
use review_domain::error::Result;
use review_domain::stream::Usage;
use review_domain::tool::{Message, ToolCall, ToolCallStatus};
use review_domain::trace::TraceEvent;
use review_providers::{ChatRequest, LlmProvider};
use tokio::sync::mpsc;

use super::cancel::CancelToken;
use super::parser::{ParsedEvent, StreamParser};
use super::scheduler::{SchedulerOutcome, ToolScheduler};
use super::session::Session;

/// One unit of progress the Agent Loop hands back to its caller,
/// converted into an SSE record by the API layer.
#[derive(Debug, Clone)]
pub enum TurnEvent {
    AssistantDelta { text: String },
    ToolStarted { tool_call: ToolCall },
    ToolCompleted { tool_call: ToolCall },
    Final { message: Message },
    Stopped,
    Error { code: &'static str, message: String },
    Usage(Usage),
}

/// Per-call tool execution timeout the Agent Loop imposes on top of the
/// scheduler's own per-tool/global defaults.
const TOOL_CALL_TIMEOUT_MS: u64 = 30_000;

pub struct TurnInput {
    pub user_message: String,
    pub model: Option<String>,
    /// Directory tool execution should be scoped to, if the caller gave one.
    pub project_path: Option<String>,
    /// Free-form memory about the user/project folded into the system prompt.
    pub user_memory: Option<String>,
    /// Additional instructions appended to the system prompt for this turn.
    pub custom_instructions: Option<String>,
}

/// Spawn the turn as a background task and return a channel of events
/// the caller drains for SSE.
#[allow(clippy::too_many_arguments)]
pub fn run_turn(
    provider: Arc<dyn LlmProvider>,
    scheduler: Arc<ToolScheduler>,
    session: Arc<Session>,
    max_turns: u32,
    cancel: CancelToken,
    input: TurnInput,
    tool_defs: Vec<review_domain::tool::ToolDefinition>,
    llm_config: review_domain::config::LlmConfig,
) -> mpsc::Receiver<TurnEvent> {
    let (tx, rx) = mpsc::channel(64);

    tokio::spawn(async move {
        let result = run_turn_inner(
            provider,
            scheduler,
            session.clone(),
            max_turns,
            &cancel,
            input,
            tool_defs,
            llm_config,
            tx.clone(),
        )
        .await;

        if let Err(e) = result {
            let _ = tx
                .send(TurnEvent::Error {
                    code: e.wire_code(),
                    message: e.to_string(),
                })
                .await;
        }
    });

    rx
}

/// Assembles the one-time system message from the request's optional
/// context fields. Prompt wording beyond this minimal join is left to the
/// provider-facing layer.
fn build_system_preamble(input: &TurnInput) -> Option<String> {
    let mut parts = Vec::new();
    if let Some(path) = &input.project_path {
        parts.push(format!("Working directory: {path}"));
    }
    if let Some(memory) = &input.user_memory {
        parts.push(format!("User memory:\n{memory}"));
    }
    if let Some(instructions) = &input.custom_instructions {
        parts.push(format!("Additional instructions:\n{instructions}"));
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n\n"))
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_turn_inner(
    provider: Arc<dyn LlmProvider>,
    scheduler: Arc<ToolScheduler>,
    session: Arc<Session>,
    max_turns: u32,
    cancel: &CancelToken,
    input: TurnInput,
    tool_defs: Vec<review_domain::tool::ToolDefinition>,
    llm_config: review_domain::config::LlmConfig,
    tx: mpsc::Sender<TurnEvent>,
) -> Result<()> {
    {
        let mut messages = session.messages.write();
        if messages.is_empty() {
            if let Some(preamble) = build_system_preamble(&input) {
                messages.push(Message::system(preamble));
            }
        }
        messages.push(Message::user(input.user_message.clone()));
    }
    session.touch();

    let mut total_usage = Usage {
        prompt_tokens: 0,
        completion_tokens: 0,
        total_tokens: 0,
    };

    'turns: for turn in 0..max_turns {
        if cancel.is_cancelled() {
            let _ = tx.send(TurnEvent::Stopped).await;
            return Ok(());
        }

        TraceEvent::TurnStarted {
            session_id: session.id.clone(),
            turn,
        }
        .emit();
        let turn_started = std::time::Instant::now();

        let messages = session.messages.read().clone();
        let req = ChatRequest {
            messages,
            tools: tool_defs.clone(),
            temperature: Some(llm_config.temperature),
            max_tokens: Some(llm_config.max_tokens),
            model: input
                .model
                .clone()
                .or_else(|| Some(llm_config.default_model.clone())),
        };

        // Whether a retry (rebuilding the payload from the unchanged message
        // log) is still available if this attempt fails upstream.
        let attempts_remain = turn + 1 < max_turns;

        let mut stream = match provider.chat_stream(req).await {
            Ok(s) => s,
            Err(e) if attempts_remain => {
                tracing::warn!(session_id = %session.id, turn, error = %e, "LLM request failed, retrying turn");
                continue 'turns;
            }
            Err(e) => return Err(e),
        };
        let mut parser = StreamParser::new();
        let mut text_buf = String::new();
        let mut tool_calls: Vec<ToolCall> = Vec::new();

        while let Some(chunk) = stream.next().await {
            if cancel.is_cancelled() {
                let _ = tx.send(TurnEvent::Stopped).await;
                return Ok(());
            }

            let chunk = match chunk {
                Ok(c) => c,
                Err(e) if attempts_remain => {
                    tracing::warn!(session_id = %session.id, turn, error = %e, "LLM stream read failed, retrying turn");
                    continue 'turns;
                }
                Err(e) => return Err(e),
            };

            let events = parser.feed(chunk)?;
            for event in events {
                match event {
                    ParsedEvent::TextDelta(text) => {
                        text_buf.push_str(&text);
                        let _ = tx.send(TurnEvent::AssistantDelta { text }).await;
                    }
                    ParsedEvent::ToolCallReady(call) => {
                        let _ = tx
                            .send(TurnEvent::ToolStarted {
                                tool_call: call.clone(),
                            })
                            .await;
                        tool_calls.push(call);
                    }
                    ParsedEvent::Stopped { usage, .. } => {
                        if let Some(u) = usage {
                            total_usage.prompt_tokens += u.prompt_tokens;
                            total_usage.completion_tokens += u.completion_tokens;
                            total_usage.total_tokens += u.total_tokens;
                        }
                    }
                    ParsedEvent::Error(message) => {
                        let _ = tx
                            .send(TurnEvent::Error {
                                code: "upstream",
                                message,
                            })
                            .await;
                        return Ok(());
                    }
                }
            }
        }

        TraceEvent::TurnCompleted {
            session_id: session.id.clone(),
            turn,
            duration_ms: turn_started.elapsed().as_millis() as u64,
        }
        .emit();

        if tool_calls.is_empty() && text_buf.is_empty() {
            tracing::debug!(session_id = %session.id, turn, "wasted turn: no text and no tool calls");
            continue 'turns;
        }

        session
            .messages
            .write()
            .push(Message::assistant_with_tool_uses(&text_buf, &tool_calls));
        session.touch();

        if tool_calls.is_empty() {
            let final_message = session
                .messages
                .read()
                .last()
                .cloned()
                .expect("just pushed the assistant message");
            let _ = tx
                .send(TurnEvent::Final {
                    message: final_message,
                })
                .await;
            let _ = tx.send(TurnEvent::Usage(total_usage)).await;
            return Ok(());
        }

        let mut result_parts = Vec::with_capacity(tool_calls.len());
        for mut call in tool_calls {
            if cancel.is_cancelled() {
                let _ = tx.send(TurnEvent::Stopped).await;
                return Ok(());
            }

            // Already failed in the Stream Parser (unparseable arguments) —
            // never reaches the scheduler, folds straight into the result.
            if call.status == ToolCallStatus::Failed {
                result_parts.push(call.to_result_part());
                let _ = tx.send(TurnEvent::ToolCompleted { tool_call: call }).await;
                continue;
            }

            call.status = ToolCallStatus::Executing;
            call.started_at = Some(chrono::Utc::now());

            let outcome = scheduler
                .schedule(
                    &session.id,
                    &call.id,
                    &call.tool_name,
                    call.arguments.clone(),
                    Some(TOOL_CALL_TIMEOUT_MS),
                )
                .await;

            call.completed_at = Some(chrono::Utc::now());
            match outcome {
                Ok(SchedulerOutcome::Success(output)) => {
                    call.status = ToolCallStatus::Completed;
                    call.result = Some(output);
                }
                Ok(SchedulerOutcome::Failure(message)) => {
                    call.status = ToolCallStatus::Failed;
                    call.error = Some(message);
                }
                Err(e) => {
                    call.status = ToolCallStatus::Failed;
                    call.error = Some(e.to_string());
                }
            }

            result_parts.push(call.to_result_part());
            let _ = tx.send(TurnEvent::ToolCompleted { tool_call: call }).await;
        }

        session
            .messages
            .write()
            .push(Message::tool_results(result_parts));
        session.touch();
    }

    TraceEvent::MaxTurnsReached {
        session_id: session.id.clone(),
        max_turns,
    }
    .emit();
    let _ = tx
        .send(TurnEvent::Error {
            code: "upstream",
            message: format!("max turns ({max_turns}) reached without a final response"),
        })
        .await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use review_domain::config::{LlmConfig, SessionsConfig, ToolsConfig};
    use review_domain::stream::{BlockDelta, BlockStart, BoxStream, ProviderChunk};
    use review_tools::ToolRegistry;

    struct ScriptedProvider {
        chunks: Vec<ProviderChunk>,
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn chat_stream(
            &self,
            _req: ChatRequest,
        ) -> Result<BoxStream<'static, Result<ProviderChunk>>> {
            let chunks = self.chunks.clone();
            Ok(Box::pin(futures_util::stream::iter(
                chunks.into_iter().map(Ok),
            )))
        }

        fn provider_id(&self) -> &str {
            "scripted"
        }
    }

    fn text_only_chunks(text: &str) -> Vec<ProviderChunk> {
        vec![
            ProviderChunk::MessageStart {
                message_id: "m1".into(),
            },
            ProviderChunk::ContentBlockStart {
                index: 0,
                block: BlockStart::Text,
            },
            ProviderChunk::ContentBlockDelta {
                index: 0,
                delta: BlockDelta::Text { text: text.into() },
            },
            ProviderChunk::ContentBlockStop { index: 0 },
            ProviderChunk::MessageDelta {
                usage: Some(Usage {
                    prompt_tokens: 5,
                    completion_tokens: 3,
                    total_tokens: 8,
                }),
                stop_reason: Some("end_turn".into()),
            },
            ProviderChunk::MessageStop,
        ]
    }

    fn make_session() -> Arc<Session> {
        super::super::session::SessionManager::new(SessionsConfig::default()).create()
    }

    fn turn_input(user_message: &str) -> TurnInput {
        TurnInput {
            user_message: user_message.into(),
            model: None,
            project_path: None,
            user_memory: None,
            custom_instructions: None,
        }
    }

    #[tokio::test]
    async fn single_turn_with_no_tool_calls_completes() {
        let provider: Arc<dyn LlmProvider> = Arc::new(ScriptedProvider {
            chunks: text_only_chunks("hello there"),
        });
        let scheduler = Arc::new(ToolScheduler::new(
            Arc::new(ToolRegistry::with_builtins()),
            ToolsConfig::default(),
        ));
        let session = make_session();
        let cancel = CancelToken::new();

        let mut rx = run_turn(
            provider,
            scheduler,
            session,
            20,
            cancel,
            turn_input("hi"),
            Vec::new(),
            LlmConfig::default(),
        );

        let mut saw_final = false;
        while let Some(ev) = rx.recv().await {
            if let TurnEvent::Final { message } = ev {
                assert_eq!(message.content.extract_all_text(), "hello there");
                saw_final = true;
            }
        }
        assert!(saw_final);
    }

    #[tokio::test]
    async fn cancellation_before_first_turn_stops_immediately() {
        let provider: Arc<dyn LlmProvider> = Arc::new(ScriptedProvider {
            chunks: text_only_chunks("should not see this"),
        });
        let scheduler = Arc::new(ToolScheduler::new(
            Arc::new(ToolRegistry::with_builtins()),
            ToolsConfig::default(),
        ));
        let session = make_session();
        let cancel = CancelToken::new();
        cancel.cancel();

        let mut rx = run_turn(
            provider,
            scheduler,
            session,
            20,
            cancel,
            turn_input("hi"),
            Vec::new(),
            LlmConfig::default(),
        );

        let first = rx.recv().await.unwrap();
        assert!(matches!(first, TurnEvent::Stopped));
    }

    #[tokio::test]
    async fn tool_call_round_trip_executes_and_recurses() {
        let first_round = vec![
            ProviderChunk::MessageStart {
                message_id: "m1".into(),
            },
            ProviderChunk::ContentBlockStart {
                index: 0,
                block: BlockStart::ToolUse {
                    id: "call_1".into(),
                    name: "read_file".into(),
                },
            },
            ProviderChunk::ContentBlockDelta {
                index: 0,
                delta: BlockDelta::InputJson {
                    partial_json: "{\"path\":\"/nonexistent\"}".into(),
                },
            },
            ProviderChunk::ContentBlockStop { index: 0 },
            ProviderChunk::MessageDelta {
                usage: None,
                stop_reason: Some("tool_use".into()),
            },
            ProviderChunk::MessageStop,
        ];

        struct TwoRoundProvider {
            first: std::sync::Mutex<Option<Vec<ProviderChunk>>>,
            second: Vec<ProviderChunk>,
        }

        #[async_trait]
        impl LlmProvider for TwoRoundProvider {
            async fn chat_stream(
                &self,
                _req: ChatRequest,
            ) -> Result<BoxStream<'static, Result<ProviderChunk>>> {
                let mut guard = self.first.lock().unwrap();
                let chunks = guard.take().unwrap_or_else(|| self.second.clone());
                Ok(Box::pin(futures_util::stream::iter(
                    chunks.into_iter().map(Ok),
                )))
            }
            fn provider_id(&self) -> &str {
                "two-round"
            }
        }

        let provider: Arc<dyn LlmProvider> = Arc::new(TwoRoundProvider {
            first: std::sync::Mutex::new(Some(first_round)),
            second: text_only_chunks("done"),
        });
        let scheduler = Arc::new(ToolScheduler::new(
            Arc::new(ToolRegistry::with_builtins()),
            ToolsConfig::default(),
        ));
        let session = make_session();
        let cancel = CancelToken::new();

        let mut rx = run_turn(
            provider,
            scheduler,
            session,
            20,
            cancel,
            turn_input("read a file"),
            Vec::new(),
            LlmConfig::default(),
        );

        let mut saw_tool_completed = false;
        let mut saw_final = false;
        while let Some(ev) = rx.recv().await {
            match ev {
                TurnEvent::ToolCompleted { tool_call } => {
                    assert_eq!(tool_call.status, ToolCallStatus::Failed);
                    saw_tool_completed = true;
                }
                TurnEvent::Final { message } => {
                    assert_eq!(message.content.extract_all_text(), "done");
                    saw_final = true;
                }
                _ => {}
            }
        }
        assert!(saw_tool_completed);
        assert!(saw_final);
    }

    #[tokio::test]
    async fn max_turns_reached_emits_error() {
        let loop_chunks = vec![
            ProviderChunk::MessageStart {
                message_id: "m1".into(),
            },
            ProviderChunk::ContentBlockStart {
                index: 0,
                block: BlockStart::ToolUse {
                    id: "call_loop".into(),
                    name: "read_file".into(),
                },
            },
            ProviderChunk::ContentBlockDelta {
                index: 0,
                delta: BlockDelta::InputJson {
                    partial_json: "{\"path\":\"/nonexistent\"}".into(),
                },
            },
            ProviderChunk::ContentBlockStop { index: 0 },
            ProviderChunk::MessageStop,
        ];

        struct LoopingProvider {
            chunks: Vec<ProviderChunk>,
        }

        #[async_trait]
        impl LlmProvider for LoopingProvider {
            async fn chat_stream(
                &self,
                _req: ChatRequest,
            ) -> Result<BoxStream<'static, Result<ProviderChunk>>> {
                let chunks = self.chunks.clone();
                Ok(Box::pin(futures_util::stream::iter(
                    chunks.into_iter().map(Ok),
                )))
            }
            fn provider_id(&self) -> &str {
                "looping"
            }
        }

        let provider: Arc<dyn LlmProvider> = Arc::new(LoopingProvider { chunks: loop_chunks });
        let scheduler = Arc::new(ToolScheduler::new(
            Arc::new(ToolRegistry::with_builtins()),
            ToolsConfig::default(),
        ));
        let session = make_session();
        let cancel = CancelToken::new();

        let mut rx = run_turn(
            provider,
            scheduler,
            session,
            2,
            cancel,
            turn_input("loop forever"),
            Vec::new(),
            LlmConfig::default(),
        );

        let mut saw_error = false;
        while let Some(ev) = rx.recv().await {
            if let TurnEvent::Error { message, .. } = ev {
                assert!(message.contains("max turns"));
                saw_error = true;
            }
        }
        assert!(saw_error);
    }

    #[tokio::test]
    async fn malformed_tool_json_fails_only_that_call_and_turn_continues() {
        let round_with_one_bad_call = vec![
            ProviderChunk::MessageStart {
                message_id: "m1".into(),
            },
            ProviderChunk::ContentBlockStart {
                index: 0,
                block: BlockStart::ToolUse {
                    id: "call_bad".into(),
                    name: "read_file".into(),
                },
            },
            ProviderChunk::ContentBlockDelta {
                index: 0,
                delta: BlockDelta::InputJson {
                    partial_json: "{not json".into(),
                },
            },
            ProviderChunk::ContentBlockStop { index: 0 },
            ProviderChunk::MessageDelta {
                usage: None,
                stop_reason: Some("tool_use".into()),
            },
            ProviderChunk::MessageStop,
        ];

        struct TwoRoundProvider {
            first: std::sync::Mutex<Option<Vec<ProviderChunk>>>,
            second: Vec<ProviderChunk>,
        }

        #[async_trait]
        impl LlmProvider for TwoRoundProvider {
            async fn chat_stream(
                &self,
                _req: ChatRequest,
            ) -> Result<BoxStream<'static, Result<ProviderChunk>>> {
                let mut guard = self.first.lock().unwrap();
                let chunks = guard.take().unwrap_or_else(|| self.second.clone());
                Ok(Box::pin(futures_util::stream::iter(
                    chunks.into_iter().map(Ok),
                )))
            }
            fn provider_id(&self) -> &str {
                "two-round"
            }
        }

        let provider: Arc<dyn LlmProvider> = Arc::new(TwoRoundProvider {
            first: std::sync::Mutex::new(Some(round_with_one_bad_call)),
            second: text_only_chunks("recovered"),
        });
        let scheduler = Arc::new(ToolScheduler::new(
            Arc::new(ToolRegistry::with_builtins()),
            ToolsConfig::default(),
        ));
        let session = make_session();
        let cancel = CancelToken::new();

        let mut rx = run_turn(
            provider,
            scheduler,
            session,
            20,
            cancel,
            turn_input("call a tool badly"),
            Vec::new(),
            LlmConfig::default(),
        );

        let mut saw_failed_tool = false;
        let mut saw_error = false;
        let mut saw_final = false;
        while let Some(ev) = rx.recv().await {
            match ev {
                TurnEvent::ToolCompleted { tool_call } => {
                    assert_eq!(tool_call.status, ToolCallStatus::Failed);
                    assert!(tool_call.error.as_ref().unwrap().contains("unparseable"));
                    saw_failed_tool = true;
                }
                TurnEvent::Error { .. } => saw_error = true,
                TurnEvent::Final { message } => {
                    assert_eq!(message.content.extract_all_text(), "recovered");
                    saw_final = true;
                }
                _ => {}
            }
        }
        assert!(saw_failed_tool, "expected the malformed call to surface as a failed tool result");
        assert!(!saw_error, "a single tool call's bad JSON must not fail the whole turn");
        assert!(saw_final);
    }

    #[tokio::test]
    async fn wasted_turn_with_no_text_and_no_tool_calls_continues() {
        let empty_round = vec![
            ProviderChunk::MessageStart {
                message_id: "m1".into(),
            },
            ProviderChunk::MessageDelta {
                usage: None,
                stop_reason: Some("end_turn".into()),
            },
            ProviderChunk::MessageStop,
        ];

        struct TwoRoundProvider {
            first: std::sync::Mutex<Option<Vec<ProviderChunk>>>,
            second: Vec<ProviderChunk>,
        }

        #[async_trait]
        impl LlmProvider for TwoRoundProvider {
            async fn chat_stream(
                &self,
                _req: ChatRequest,
            ) -> Result<BoxStream<'static, Result<ProviderChunk>>> {
                let mut guard = self.first.lock().unwrap();
                let chunks = guard.take().unwrap_or_else(|| self.second.clone());
                Ok(Box::pin(futures_util::stream::iter(
                    chunks.into_iter().map(Ok),
                )))
            }
            fn provider_id(&self) -> &str {
                "two-round"
            }
        }

        let provider: Arc<dyn LlmProvider> = Arc::new(TwoRoundProvider {
            first: std::sync::Mutex::new(Some(empty_round)),
            second: text_only_chunks("finally said something"),
        });
        let scheduler = Arc::new(ToolScheduler::new(
            Arc::new(ToolRegistry::with_builtins()),
            ToolsConfig::default(),
        ));
        let session = make_session();
        let cancel = CancelToken::new();

        let mut rx = run_turn(
            provider,
            scheduler,
            session,
            20,
            cancel,
            turn_input("say nothing first"),
            Vec::new(),
            LlmConfig::default(),
        );

        let mut finals_seen = 0;
        while let Some(ev) = rx.recv().await {
            if let TurnEvent::Final { message } = ev {
                assert_eq!(message.content.extract_all_text(), "finally said something");
                finals_seen += 1;
            }
        }
        assert_eq!(finals_seen, 1, "the wasted turn must not itself produce a Final event");

        let messages = session.messages.read();
        assert!(
            messages.iter().all(|m| !m.content.extract_all_text().is_empty() || m.role == review_domain::tool::Role::User),
            "no empty assistant message should have been pushed for the wasted turn"
        );
    }

    #[tokio::test]
    async fn upstream_stream_failure_retries_turn_when_attempts_remain() {
        struct FlakyProvider {
            failed_once: std::sync::atomic::AtomicBool,
            chunks: Vec<ProviderChunk>,
        }

        #[async_trait]
        impl LlmProvider for FlakyProvider {
            async fn chat_stream(
                &self,
                _req: ChatRequest,
            ) -> Result<BoxStream<'static, Result<ProviderChunk>>> {
                if !self.failed_once.swap(true, std::sync::atomic::Ordering::SeqCst) {
                    return Err(review_domain::error::Error::Provider {
                        provider: "flaky".into(),
                        message: "connection reset".into(),
                    });
                }
                let chunks = self.chunks.clone();
                Ok(Box::pin(futures_util::stream::iter(
                    chunks.into_iter().map(Ok),
                )))
            }
            fn provider_id(&self) -> &str {
                "flaky"
            }
        }

        let provider: Arc<dyn LlmProvider> = Arc::new(FlakyProvider {
            failed_once: std::sync::atomic::AtomicBool::new(false),
            chunks: text_only_chunks("survived the retry"),
        });
        let scheduler = Arc::new(ToolScheduler::new(
            Arc::new(ToolRegistry::with_builtins()),
            ToolsConfig::default(),
        ));
        let session = make_session();
        let cancel = CancelToken::new();

        let mut rx = run_turn(
            provider,
            scheduler,
            session,
            20,
            cancel,
            turn_input("hi"),
            Vec::new(),
            LlmConfig::default(),
        );

        let mut saw_final = false;
        let mut saw_error = false;
        while let Some(ev) = rx.recv().await {
            match ev {
                TurnEvent::Final { message } => {
                    assert_eq!(message.content.extract_all_text(), "survived the retry");
                    saw_final = true;
                }
                TurnEvent::Error { .. } => saw_error = true,
                _ => {}
            }
        }
        assert!(saw_final, "turn should complete after the retry succeeds");
        assert!(!saw_error, "a retried failure with attempts remaining must not surface as an error");
    }

    #[tokio::test]
    async fn system_preamble_is_pushed_once_from_optional_context() {
        let provider: Arc<dyn LlmProvider> = Arc::new(ScriptedProvider {
            chunks: text_only_chunks("hi back"),
        });
        let scheduler = Arc::new(ToolScheduler::new(
            Arc::new(ToolRegistry::with_builtins()),
            ToolsConfig::default(),
        ));
        let session = make_session();
        let cancel = CancelToken::new();

        let mut rx = run_turn(
            provider,
            scheduler,
            session.clone(),
            20,
            cancel,
            TurnInput {
                user_message: "hi".into(),
                model: None,
                project_path: Some("/repo".into()),
                user_memory: Some("prefers terse answers".into()),
                custom_instructions: None,
            },
            Vec::new(),
            LlmConfig::default(),
        );

        while rx.recv().await.is_some() {}

        let messages = session.messages.read();
        assert_eq!(messages[0].role, review_domain::tool::Role::System);
        let system_text = messages[0].content.extract_all_text();
        assert!(system_text.contains("/repo"));
        assert!(system_text.contains("prefers terse answers"));
    }
}
