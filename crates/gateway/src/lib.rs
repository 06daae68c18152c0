//! The HTTP service: session lifecycle, the Agent Loop, and the SSE
//! streaming surface clients talk to.

pub mod api;
pub mod runtime;
pub mod state;

pub use state::AppState;
