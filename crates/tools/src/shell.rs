//! Shell command execution.
//!
//! The tool itself just spawns and waits — timeout enforcement is the
//! Tool Scheduler's job, which races this future against a timer rather
//! than having every tool reimplement that.

use async_trait::async_trait;
use review_domain::error::{Error, Result};
use serde_json::Value;
use std::collections::HashMap;

use crate::contract::{Tool, ToolKind};

/// Environment variables a command is never allowed to override, since
/// doing so could redirect dynamic linking or hijack another process on
/// the same machine.
fn is_dangerous_env_var(name: &str) -> bool {
    const BLOCKED: &[&str] = &[
        "LD_PRELOAD",
        "LD_LIBRARY_PATH",
        "LD_AUDIT",
        "DYLD_INSERT_LIBRARIES",
        "DYLD_LIBRARY_PATH",
        "DYLD_FRAMEWORK_PATH",
        "PATH",
        "HOME",
        "SSH_AUTH_SOCK",
        "SSH_AGENT_PID",
    ];
    BLOCKED.contains(&name.to_ascii_uppercase().as_str())
}

pub struct ShellTool;

#[async_trait]
impl Tool for ShellTool {
    fn name(&self) -> &str {
        "shell"
    }

    fn description(&self) -> &str {
        "Run a shell command and return its combined stdout/stderr output."
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Modifying {
            requires_confirmation: true,
        }
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": { "type": "string" },
                "workdir": { "type": "string" },
                "env": { "type": "object", "additionalProperties": { "type": "string" } },
            },
            "required": ["command"],
        })
    }

    fn validate(&self, arguments: &Value) -> Result<()> {
        let command = arguments
            .get("command")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::Validation("shell requires a string 'command' argument".into()))?;
        if command.trim().is_empty() {
            return Err(Error::Validation("shell 'command' must not be empty".into()));
        }
        if let Some(env) = arguments.get("env").and_then(|v| v.as_object()) {
            for key in env.keys() {
                if is_dangerous_env_var(key) {
                    return Err(Error::Validation(format!(
                        "environment variable '{key}' is blocked by security policy"
                    )));
                }
            }
        }
        Ok(())
    }

    async fn execute(&self, arguments: Value) -> Result<String> {
        let command = arguments["command"].as_str().unwrap_or_default();
        let workdir = arguments.get("workdir").and_then(|v| v.as_str());
        let env: HashMap<String, String> = arguments
            .get("env")
            .and_then(|v| v.as_object())
            .map(|m| {
                m.iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect()
            })
            .unwrap_or_default();

        let mut cmd = tokio::process::Command::new("sh");
        cmd.arg("-c").arg(command);
        cmd.stdout(std::process::Stdio::piped());
        cmd.stderr(std::process::Stdio::piped());
        if let Some(wd) = workdir {
            cmd.current_dir(wd);
        }
        for (k, v) in &env {
            cmd.env(k, v);
        }

        let output = cmd
            .output()
            .await
            .map_err(|e| Error::Other(format!("failed to spawn shell: {e}")))?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        if !output.status.success() {
            return Err(Error::Other(format!(
                "command exited with {:?}: {combined}",
                output.status.code()
            )));
        }

        Ok(combined)
    }
}
