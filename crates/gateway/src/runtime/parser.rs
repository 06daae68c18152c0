//! The Stream Parser: assembles raw provider chunks into complete
//! text deltas and tool calls.
//!
//! [`review_domain::stream::ProviderChunk`] is deliberately unbuffered —
//! a provider adapter forwards `input_json_delta` fragments as they
//! arrive, with no assembly. This module is where that assembly
//! happens: `input-json` deltas accumulate per content-block index and
//! are parsed into a `serde_json::Value` only once their block's
//! `content-block-stop` arrives, at which point a fully-formed
//! [`ToolCall`] is emitted.

use std::collections::HashMap;

use review_domain::error::{Error, Result};
use review_domain::stream::{BlockDelta, BlockStart, ProviderChunk, Usage};
use review_domain::tool::{ToolCall, ToolCallStatus};

/// One assembled unit of progress out of the Stream Parser, ready for
/// the Agent Loop to act on or forward as an SSE event.
#[derive(Debug, Clone)]
pub enum ParsedEvent {
    TextDelta(String),
    ToolCallReady(ToolCall),
    Stopped {
        stop_reason: Option<String>,
        usage: Option<Usage>,
    },
    Error(String),
}

#[derive(Debug)]
enum BlockState {
    Text,
    ToolUse {
        id: String,
        name: String,
        buffer: String,
    },
}

/// Per-turn assembly state. One parser is used for the lifetime of a
/// single streaming response; it is not reused across turns.
#[derive(Debug, Default)]
pub struct StreamParser {
    blocks: HashMap<u64, BlockState>,
}

impl StreamParser {
    pub fn new() -> Self {
        Self {
            blocks: HashMap::new(),
        }
    }

    /// Feed one raw chunk, returning zero or more assembled events. Most
    /// chunks produce exactly one event; `content-block-stop` on a text
    /// block produces none (there's nothing left to assemble).
    pub fn feed(&mut self, chunk: ProviderChunk) -> Result<Vec<ParsedEvent>> {
        match chunk {
            ProviderChunk::MessageStart { .. } => Ok(Vec::new()),

            ProviderChunk::ContentBlockStart { index, block } => {
                match block {
                    BlockStart::Text => {
                        self.blocks.insert(index, BlockState::Text);
                    }
                    BlockStart::ToolUse { id, name } => {
                        self.blocks.insert(
                            index,
                            BlockState::ToolUse {
                                id,
                                name,
                                buffer: String::new(),
                            },
                        );
                    }
                }
                Ok(Vec::new())
            }

            ProviderChunk::ContentBlockDelta { index, delta } => match delta {
                BlockDelta::Text { text } => Ok(vec![ParsedEvent::TextDelta(text)]),
                BlockDelta::InputJson { partial_json } => {
                    match self.blocks.get_mut(&index) {
                        Some(BlockState::ToolUse { buffer, .. }) => buffer.push_str(&partial_json),
                        _ => {
                            return Err(Error::Provider {
                                provider: "stream_parser".into(),
                                message: format!(
                                    "input_json_delta for unopened or non-tool-use block {index}"
                                ),
                            })
                        }
                    }
                    Ok(Vec::new())
                }
            },

            ProviderChunk::ContentBlockStop { index } => match self.blocks.remove(&index) {
                Some(BlockState::Text) => Ok(Vec::new()),
                Some(BlockState::ToolUse { id, name, buffer }) => {
                    let mut call = ToolCall::pending(id.clone(), name.clone());
                    if buffer.trim().is_empty() {
                        call.arguments = serde_json::Value::Object(Default::default());
                    } else {
                        match serde_json::from_str(&buffer) {
                            Ok(arguments) => call.arguments = arguments,
                            Err(e) => {
                                // Confined to this one tool call — the turn continues,
                                // other tool calls in it are unaffected.
                                call.arguments = serde_json::Value::Object(Default::default());
                                call.status = ToolCallStatus::Failed;
                                call.error = Some(format!(
                                    "tool call '{name}' ({id}) has unparseable arguments: {e}"
                                ));
                            }
                        }
                    }
                    Ok(vec![ParsedEvent::ToolCallReady(call)])
                }
                None => Ok(Vec::new()),
            },

            ProviderChunk::MessageDelta { usage, stop_reason } => {
                Ok(vec![ParsedEvent::Stopped { stop_reason, usage }])
            }

            ProviderChunk::MessageStop => Ok(Vec::new()),

            ProviderChunk::Error { message } => Ok(vec![ParsedEvent::Error(message)]),
        }
    }
}
