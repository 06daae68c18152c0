//! The LLM provider's streaming chunk vocabulary (§6 of the runtime spec).
//!
//! This is deliberately the *raw* wire-level chunk shape — `message-start`,
//! `content-block-start`, `content-block-delta`, `content-block-stop`,
//! `message-stop` — with no buffering or assembly performed here. A
//! provider adapter's only job is to translate its own wire format onto
//! these chunks unchanged; the Stream Parser (in the gateway's runtime)
//! is the component that buffers `input_json_delta` fragments and parses
//! a tool call's arguments at `content-block-stop`.

use serde::{Deserialize, Serialize};
use std::pin::Pin;

/// A boxed async stream, used for LLM streaming responses.
pub type BoxStream<'a, T> = Pin<Box<dyn futures_core::Stream<Item = T> + Send + 'a>>;

/// One chunk of a provider's streaming response.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ProviderChunk {
    #[serde(rename = "message-start")]
    MessageStart { message_id: String },

    #[serde(rename = "content-block-start")]
    ContentBlockStart { index: u64, block: BlockStart },

    #[serde(rename = "content-block-delta")]
    ContentBlockDelta { index: u64, delta: BlockDelta },

    #[serde(rename = "content-block-stop")]
    ContentBlockStop { index: u64 },

    #[serde(rename = "message-delta")]
    MessageDelta {
        #[serde(skip_serializing_if = "Option::is_none")]
        usage: Option<Usage>,
        #[serde(skip_serializing_if = "Option::is_none")]
        stop_reason: Option<String>,
    },

    #[serde(rename = "message-stop")]
    MessageStop,

    #[serde(rename = "error")]
    Error { message: String },
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind")]
pub enum BlockStart {
    #[serde(rename = "text")]
    Text,
    #[serde(rename = "tool-use")]
    ToolUse { id: String, name: String },
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind")]
pub enum BlockDelta {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "input-json")]
    InputJson { partial_json: String },
}

/// Token usage for a completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}
