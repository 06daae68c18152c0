pub mod anthropic;
pub mod traits;
pub(crate) mod sse;
pub(crate) mod util;

pub use anthropic::AnthropicProvider;
pub use traits::{ChatRequest, LlmProvider};
