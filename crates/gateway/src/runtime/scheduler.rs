//! The Tool Scheduler: policy layer sitting between the Agent Loop and
//! [`review_tools::ToolRegistry`].
//!
//! Owns per-tool enable/disable, a sliding 60-second rate-limit window,
//! parameter validation (delegated to the tool itself), three-layer
//! timeout resolution, and cumulative-average duration statistics.
//! None of this lives in the tools themselves — a tool only knows how
//! to validate and execute; the scheduler decides whether and how long
//! it's allowed to run.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use review_domain::config::ToolsConfig;
use review_domain::error::{Error, Result};
use review_domain::trace::TraceEvent;
use review_tools::ToolRegistry;

const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);

/// Running call timestamps + duration stats for one tool.
///
/// `total_calls` counts every attempt, including ones rejected before
/// execution (disabled, unknown, rate-limited, failed validation).
/// `executed_count`/`total_duration_ms` only count calls that actually
/// raced against the timeout, so the average stays meaningful even when
/// a tool gets rate-limited often.
#[derive(Default)]
struct ToolStats {
    recent_calls: Vec<Instant>,
    total_calls: u64,
    successful_calls: u64,
    failed_calls: u64,
    executed_count: u64,
    total_duration_ms: u64,
    last_execution: Option<DateTime<Utc>>,
}

impl ToolStats {
    fn prune(&mut self, now: Instant) {
        self.recent_calls
            .retain(|t| now.duration_since(*t) < RATE_LIMIT_WINDOW);
    }

    fn average_duration_ms(&self) -> f64 {
        if self.executed_count == 0 {
            0.0
        } else {
            self.total_duration_ms as f64 / self.executed_count as f64
        }
    }
}

/// Point-in-time snapshot of a tool's call statistics, handed back to
/// callers that want to report on scheduler activity.
#[derive(Debug, Clone, Copy)]
pub struct ToolCallStats {
    pub total_calls: u64,
    pub successful_calls: u64,
    pub failed_calls: u64,
    pub average_duration_ms: f64,
    pub last_execution: Option<DateTime<Utc>>,
}

pub struct ToolScheduler {
    registry: Arc<ToolRegistry>,
    config: ToolsConfig,
    stats: Mutex<HashMap<String, ToolStats>>,
}

/// Outcome of executing one scheduled tool call, independent of whether
/// the tool succeeded — this is what gets folded into the `ToolCall`'s
/// `result`/`error` fields.
pub enum SchedulerOutcome {
    Success(String),
    Failure(String),
}

impl ToolScheduler {
    pub fn new(registry: Arc<ToolRegistry>, config: ToolsConfig) -> Self {
        Self {
            registry,
            config,
            stats: Mutex::new(HashMap::new()),
        }
    }

    /// Run one tool call under this scheduler's policy: disabled check,
    /// rate limit, schema validation, then execution raced against the
    /// resolved timeout.
    pub async fn schedule(
        &self,
        session_id: &str,
        call_id: &str,
        tool_name: &str,
        arguments: serde_json::Value,
        per_call_timeout_ms: Option<u64>,
    ) -> Result<SchedulerOutcome> {
        self.record_attempt(tool_name);

        if !self.config.is_enabled(tool_name) {
            self.record_failure(tool_name);
            return Err(Error::Validation(format!("tool '{tool_name}' is disabled")));
        }

        let tool = match self.registry.get(tool_name) {
            Some(tool) => tool,
            None => {
                self.record_failure(tool_name);
                return Err(Error::Validation(format!("unknown tool '{tool_name}'")));
            }
        };

        if let Err(e) = self.check_rate_limit(tool_name) {
            self.record_failure(tool_name);
            return Err(e);
        }

        if let Err(e) = tool.validate(&arguments) {
            self.record_failure(tool_name);
            return Err(e);
        }

        TraceEvent::ToolScheduled {
            session_id: session_id.to_owned(),
            tool_name: tool_name.to_owned(),
            call_id: call_id.to_owned(),
        }
        .emit();

        let timeout_ms = self.config.resolve_timeout_ms(tool_name, per_call_timeout_ms);
        let timeout = Duration::from_millis(timeout_ms);

        let started = Instant::now();
        let outcome = tokio::select! {
            result = tool.execute(arguments) => {
                match result {
                    Ok(output) => SchedulerOutcome::Success(output),
                    Err(e) => SchedulerOutcome::Failure(e.to_string()),
                }
            }
            _ = tokio::time::sleep(timeout) => {
                TraceEvent::ToolTimedOut {
                    session_id: session_id.to_owned(),
                    tool_name: tool_name.to_owned(),
                    call_id: call_id.to_owned(),
                    timeout_ms,
                }
                .emit();
                SchedulerOutcome::Failure(format!("tool '{tool_name}' timed out after {timeout_ms}ms"))
            }
        };

        let duration_ms = started.elapsed().as_millis() as u64;
        self.record_duration(tool_name, duration_ms);
        match &outcome {
            SchedulerOutcome::Success(_) => self.record_success(tool_name),
            SchedulerOutcome::Failure(_) => self.record_failure(tool_name),
        }

        TraceEvent::ToolCompleted {
            session_id: session_id.to_owned(),
            tool_name: tool_name.to_owned(),
            call_id: call_id.to_owned(),
            duration_ms,
            success: matches!(outcome, SchedulerOutcome::Success(_)),
        }
        .emit();

        Ok(outcome)
    }

    fn check_rate_limit(&self, tool_name: &str) -> Result<()> {
        let limit = self.config.resolve_rate_limit(tool_name);
        let now = Instant::now();
        let mut stats = self.stats.lock();
        let entry = stats.entry(tool_name.to_owned()).or_default();
        entry.prune(now);

        if entry.recent_calls.len() as u32 >= limit {
            return Err(Error::RateLimit(format!(
                "tool '{tool_name}' exceeded {limit} calls per minute"
            )));
        }

        entry.recent_calls.push(now);
        Ok(())
    }

    fn record_attempt(&self, tool_name: &str) {
        let mut stats = self.stats.lock();
        let entry = stats.entry(tool_name.to_owned()).or_default();
        entry.total_calls += 1;
        entry.last_execution = Some(Utc::now());
    }

    fn record_success(&self, tool_name: &str) {
        let mut stats = self.stats.lock();
        stats.entry(tool_name.to_owned()).or_default().successful_calls += 1;
    }

    fn record_failure(&self, tool_name: &str) {
        let mut stats = self.stats.lock();
        stats.entry(tool_name.to_owned()).or_default().failed_calls += 1;
    }

    fn record_duration(&self, tool_name: &str, duration_ms: u64) {
        let mut stats = self.stats.lock();
        let entry = stats.entry(tool_name.to_owned()).or_default();
        entry.executed_count += 1;
        entry.total_duration_ms += duration_ms;
    }

    pub fn average_duration_ms(&self, tool_name: &str) -> f64 {
        self.stats
            .lock()
            .get(tool_name)
            .map(|s| s.average_duration_ms())
            .unwrap_or(0.0)
    }

    /// Snapshot of one tool's call stats, zeroed if it has never been scheduled.
    pub fn stats(&self, tool_name: &str) -> ToolCallStats {
        self.stats
            .lock()
            .get(tool_name)
            .map(|s| ToolCallStats {
                total_calls: s.total_calls,
                successful_calls: s.successful_calls,
                failed_calls: s.failed_calls,
                average_duration_ms: s.average_duration_ms(),
                last_execution: s.last_execution,
            })
            .unwrap_or(ToolCallStats {
                total_calls: 0,
                successful_calls: 0,
                failed_calls: 0,
                average_duration_ms: 0.0,
                last_execution: None,
            })
    }
}
