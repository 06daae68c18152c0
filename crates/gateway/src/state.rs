//! Shared application state passed to every API handler.

use std::sync::Arc;
use std::time::Instant;

use review_domain::config::RuntimeConfig;
use review_providers::LlmProvider;
use review_tools::ToolRegistry;

use crate::runtime::{SessionManager, ToolScheduler};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RuntimeConfig>,
    pub llm: Arc<dyn LlmProvider>,
    pub tools: Arc<ToolRegistry>,
    pub scheduler: Arc<ToolScheduler>,
    pub sessions: Arc<SessionManager>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: RuntimeConfig, llm: Arc<dyn LlmProvider>) -> Self {
        let tools = Arc::new(ToolRegistry::with_builtins());
        let scheduler = Arc::new(ToolScheduler::new(tools.clone(), config.tools.clone()));
        let sessions = Arc::new(SessionManager::new(config.sessions.clone()));
        Self {
            config: Arc::new(config),
            llm,
            tools,
            scheduler,
            sessions,
            started_at: Instant::now(),
        }
    }
}
