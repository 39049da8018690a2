//! run_command tool - Execute shell commands in the base directory

use async_trait::async_trait;
use eyre::eyre;
use serde_json::Value;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use super::{Tool, ToolContext, ToolError, ToolOutput};

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MAX_OUTPUT_CHARS: usize = 30_000;

pub struct RunCommandTool;

#[async_trait]
impl Tool for RunCommandTool {
    fn name(&self) -> &str {
        "run_command"
    }

    fn description(&self) -> &str {
        "Run a shell command in the base directory and return its output."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "Shell command to execute"
                },
                "timeout": {
                    "type": "integer",
                    "description": "Timeout in seconds (default: 30)"
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<ToolOutput, eyre::Error> {
        let command = input["command"].as_str().ok_or_else(|| eyre!("command is required"))?;
        let timeout_secs = input["timeout"].as_u64().unwrap_or(DEFAULT_TIMEOUT_SECS);

        let output = tokio::time::timeout(
            Duration::from_secs(timeout_secs),
            Command::new("sh")
                .arg("-c")
                .arg(command)
                .current_dir(&ctx.base_dir)
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| ToolError::CommandTimeout { timeout_secs })??;

        let mut result = String::from_utf8_lossy(&output.stdout).to_string();
        if !output.stderr.is_empty() {
            result.push_str("\n[stderr]\n");
            result.push_str(&String::from_utf8_lossy(&output.stderr));
        }
        if !output.status.success() {
            result.push_str(&format!("\n[exit code: {}]", output.status.code().unwrap_or(-1)));
        }

        let result = result.trim();
        let result = if result.is_empty() {
            "Command completed with no output".to_string()
        } else if result.chars().count() > MAX_OUTPUT_CHARS {
            let head: String = result.chars().take(MAX_OUTPUT_CHARS).collect();
            format!("{}...\n[truncated, {} chars total]", head, result.chars().count())
        } else {
            result.to_string()
        };

        if output.status.success() {
            Ok(ToolOutput::success(result))
        } else {
            Ok(ToolOutput::error(result))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn run(input: Value) -> Result<ToolOutput, eyre::Error> {
        let dir = tempdir().unwrap();
        let ctx = ToolContext::new(dir.path().to_path_buf());
        RunCommandTool.execute(input, &ctx).await
    }

    #[tokio::test]
    async fn test_run_command_echo() {
        let result = run(serde_json::json!({"command": "echo 'Hello, World!'"})).await.unwrap();
        assert!(!result.is_error);
        assert_eq!(result.content, "Hello, World!");
    }

    #[tokio::test]
    async fn test_run_command_in_base_dir() {
        let dir = tempdir().unwrap();
        let ctx = ToolContext::new(dir.path().to_path_buf());
        std::fs::write(dir.path().join("marker.txt"), "found").unwrap();

        let result = RunCommandTool
            .execute(serde_json::json!({"command": "cat marker.txt"}), &ctx)
            .await
            .unwrap();
        assert_eq!(result.content, "found");
    }

    #[tokio::test]
    async fn test_run_command_failure_appends_exit_code() {
        let result = run(serde_json::json!({"command": "echo out; echo bad >&2; exit 3"}))
            .await
            .unwrap();
        assert!(result.is_error);
        assert_eq!(result.content, "out\n\n[stderr]\nbad\n\n[exit code: 3]");
    }

    #[tokio::test]
    async fn test_run_command_no_output() {
        let result = run(serde_json::json!({"command": "true"})).await.unwrap();
        assert_eq!(result.content, "Command completed with no output");
    }

    #[tokio::test]
    async fn test_run_command_timeout() {
        let result = run(serde_json::json!({"command": "sleep 10", "timeout": 1})).await;
        assert!(result.unwrap_err().to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_run_command_missing_command() {
        assert!(run(serde_json::json!({})).await.is_err());
    }
}
