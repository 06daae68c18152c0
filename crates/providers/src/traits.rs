use review_domain::error::Result;
use review_domain::stream::{BoxStream, ProviderChunk};
use review_domain::tool::{Message, ToolDefinition};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request type
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A chat completion request built by the Agent Loop for one turn.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    /// The conversation so far, including any internal system-role messages.
    pub messages: Vec<Message>,
    /// Tool definitions the model may invoke this turn.
    pub tools: Vec<ToolDefinition>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// Model identifier override. `None` uses the provider's configured default.
    pub model: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Core provider trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The consumer-facing interface the Agent Loop drives the LLM through.
///
/// Only streaming is exposed: the runtime's ReAct loop is built around
/// incremental chunks, and a non-streaming `chat()` would just be this
/// with the assembly step done for the caller — nothing in the runtime
/// needs that shortcut.
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send a chat completion request and return a stream of raw provider
    /// chunks. No buffering or assembly is performed here — see the
    /// gateway's stream parser for that.
    async fn chat_stream(&self, req: ChatRequest) -> Result<BoxStream<'static, Result<ProviderChunk>>>;

    /// A unique identifier for this provider instance, used in logs and
    /// in `Error::Provider`.
    fn provider_id(&self) -> &str;
}
