//! Shared types for the code-review agent runtime.
//!
//! Everything a session, the agent loop, the tool scheduler, and the
//! provider adapters need to agree on without depending on each other:
//! the message/content-part model, the error taxonomy, the provider
//! streaming chunk vocabulary, and runtime configuration.

pub mod config;
pub mod error;
pub mod sse;
pub mod stream;
pub mod tool;
pub mod trace;

pub use error::{Error, Result};
