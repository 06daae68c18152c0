//! Runtime configuration: server bind address, LLM provider, session
//! manager limits, and per-tool scheduler policy.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Server
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "d_port")]
    pub port: u16,
    #[serde(default = "d_host")]
    pub host: String,
    #[serde(default)]
    pub cors: CorsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: d_port(),
            host: d_host(),
            cors: CorsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Origins allowed for CORS. Use `["*"]` for permissive (not recommended).
    #[serde(default = "d_cors_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: d_cors_origins(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// LLM provider
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "d_anthropic_url")]
    pub base_url: String,
    /// Name of the environment variable holding the API key. The key itself
    /// is never stored in config.
    #[serde(default = "d_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "d_model")]
    pub default_model: String,
    #[serde(default = "d_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "d_temperature")]
    pub temperature: f32,
    #[serde(default = "d_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: d_anthropic_url(),
            api_key_env: d_api_key_env(),
            default_model: d_model(),
            max_tokens: d_max_tokens(),
            temperature: d_temperature(),
            request_timeout_ms: d_request_timeout_ms(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session manager
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// Minutes of inactivity before a session becomes eligible for eviction.
    #[serde(default = "d_ttl_minutes")]
    pub ttl_minutes: u64,
    /// How often the eviction sweep runs.
    #[serde(default = "d_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// Hard cap on live sessions; the manager evicts the least-recently-used
    /// session to stay under this when a new one is created.
    #[serde(default = "d_max_sessions")]
    pub max_sessions: usize,
    /// Maximum ReAct turns per `ProcessMessage` call before the agent loop
    /// gives up and returns a max-turns error.
    #[serde(default = "d_max_turns")]
    pub max_turns: u32,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            ttl_minutes: d_ttl_minutes(),
            sweep_interval_secs: d_sweep_interval_secs(),
            max_sessions: d_max_sessions(),
            max_turns: d_max_turns(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tool scheduler
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Default timeout applied to any tool without a more specific override.
    #[serde(default = "d_default_timeout_ms")]
    pub default_timeout_ms: u64,
    /// Default per-tool rate-limit budget (calls per 60s sliding window)
    /// applied to any tool without a more specific override.
    #[serde(default = "d_default_rate_limit_per_min")]
    pub default_rate_limit_per_min: u32,
    /// Per-tool overrides, keyed by tool name.
    #[serde(default = "d_tool_overrides")]
    pub overrides: HashMap<String, ToolOverride>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: d_default_timeout_ms(),
            default_rate_limit_per_min: d_default_rate_limit_per_min(),
            overrides: d_tool_overrides(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOverride {
    #[serde(default = "d_true")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit_per_min: Option<u32>,
}

impl ToolsConfig {
    /// Resolve the effective timeout for a tool name, given an optional
    /// per-call override. Per-call wins over per-tool wins over global
    /// default — the three-layer resolution the scheduler applies before
    /// racing execution against the timer.
    pub fn resolve_timeout_ms(&self, tool_name: &str, per_call_ms: Option<u64>) -> u64 {
        per_call_ms
            .or_else(|| self.overrides.get(tool_name).and_then(|o| o.timeout_ms))
            .unwrap_or(self.default_timeout_ms)
    }

    pub fn resolve_rate_limit(&self, tool_name: &str) -> u32 {
        self.overrides
            .get(tool_name)
            .and_then(|o| o.rate_limit_per_min)
            .unwrap_or(self.default_rate_limit_per_min)
    }

    pub fn is_enabled(&self, tool_name: &str) -> bool {
        self.overrides
            .get(tool_name)
            .map(|o| o.enabled)
            .unwrap_or(true)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Default-value helpers (serde `default = "..."` targets)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn d_port() -> u16 {
    8787
}
fn d_host() -> String {
    "127.0.0.1".into()
}
fn d_cors_origins() -> Vec<String> {
    vec!["http://localhost:3000".into()]
}
fn d_anthropic_url() -> String {
    "https://api.anthropic.com".into()
}
fn d_api_key_env() -> String {
    "ANTHROPIC_API_KEY".into()
}
fn d_model() -> String {
    "claude-sonnet-4-20250514".into()
}
fn d_max_tokens() -> u32 {
    4096
}
fn d_temperature() -> f32 {
    0.7
}
fn d_request_timeout_ms() -> u64 {
    60_000
}
fn d_ttl_minutes() -> u64 {
    30
}
fn d_sweep_interval_secs() -> u64 {
    300
}
fn d_max_sessions() -> usize {
    50
}
fn d_max_turns() -> u32 {
    20
}
fn d_default_timeout_ms() -> u64 {
    60_000
}
fn d_default_rate_limit_per_min() -> u32 {
    30
}
fn d_true() -> bool {
    true
}

fn d_tool_overrides() -> HashMap<String, ToolOverride> {
    let mut map = HashMap::new();
    map.insert(
        "shell".to_string(),
        ToolOverride {
            enabled: true,
            timeout_ms: Some(120_000),
            rate_limit_per_min: Some(10),
        },
    );
    map.insert(
        "web_fetch".to_string(),
        ToolOverride {
            enabled: true,
            timeout_ms: Some(30_000),
            rate_limit_per_min: Some(20),
        },
    );
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_toml() {
        let cfg = RuntimeConfig::default();
        let s = toml::to_string(&cfg).unwrap();
        let back: RuntimeConfig = toml::from_str(&s).unwrap();
        assert_eq!(back.server.port, cfg.server.port);
        assert_eq!(back.sessions.max_turns, cfg.sessions.max_turns);
    }

    #[test]
    fn resolve_timeout_prefers_per_call_over_override_over_default() {
        let cfg = ToolsConfig::default();
        assert_eq!(cfg.resolve_timeout_ms("shell", Some(5_000)), 5_000);
        assert_eq!(cfg.resolve_timeout_ms("shell", None), 120_000);
        assert_eq!(cfg.resolve_timeout_ms("read_file", None), 60_000);
    }

    #[test]
    fn unknown_tool_is_enabled_by_default() {
        let cfg = ToolsConfig::default();
        assert!(cfg.is_enabled("read_file"));
    }

    #[test]
    fn shell_has_lower_rate_limit_than_default() {
        let cfg = ToolsConfig::default();
        assert_eq!(cfg.resolve_rate_limit("shell"), 10);
        assert_eq!(cfg.resolve_rate_limit("read_file"), 30);
    }
}
