//! Built-in tools the Agent Loop can invoke through the Tool Scheduler.
//!
//! Each tool implements [`contract::Tool`]; the scheduler dispatches by
//! name through [`registry::ToolRegistry`] rather than matching on tool
//! name itself.

pub mod contract;
pub mod read_file;
pub mod registry;
pub mod search;
pub mod shell;
pub mod web_fetch;
pub mod write_file;

pub use contract::{Tool, ToolKind};
pub use registry::ToolRegistry;
