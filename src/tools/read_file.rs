//! read_file tool - Read file contents with line numbers

use async_trait::async_trait;
use eyre::eyre;
use serde_json::Value;
use std::path::Path;

use super::{Tool, ToolContext, ToolOutput};

const DEFAULT_MAX_LINES: usize = 500;
const MAX_LINE_CHARS: usize = 2000;

pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a file with line numbers."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File path relative to the base directory"
                },
                "offset": {
                    "type": "integer",
                    "description": "Line number to start reading from (1-indexed)"
                },
                "max_lines": {
                    "type": "integer",
                    "description": "Maximum number of lines to read (default: 500)"
                }
            },
            "required": ["path"]
        })
    }

    fn safe(&self) -> bool {
        true
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<ToolOutput, eyre::Error> {
        let path = input["path"].as_str().ok_or_else(|| eyre!("path is required"))?;
        let offset = input["offset"].as_u64().unwrap_or(1).max(1) as usize;
        let max_lines = input["max_lines"].as_u64().map_or(DEFAULT_MAX_LINES, |n| n as usize);

        let full_path = ctx.validate_path(Path::new(path))?;
        if !full_path.is_file() {
            return Ok(ToolOutput::error(format!("Not a file: {}", path)));
        }

        let content = match tokio::fs::read_to_string(&full_path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                return Ok(ToolOutput::error(format!("Cannot read file (binary or non-UTF8): {}", path)));
            }
            Err(e) => return Err(eyre!("Failed to read file '{}': {}", path, e)),
        };

        let mut remaining = content.lines().skip(offset - 1);
        let mut lines: Vec<String> = remaining
            .by_ref()
            .take(max_lines)
            .enumerate()
            .map(|(i, line)| {
                let shown = if line.chars().count() > MAX_LINE_CHARS {
                    format!("{}...", line.chars().take(MAX_LINE_CHARS).collect::<String>())
                } else {
                    line.to_string()
                };
                format!("{:>6}| {}", offset + i, shown)
            })
            .collect();

        if remaining.next().is_some() {
            lines.push(format!("\n... (truncated at {} lines)", max_lines));
        }

        Ok(ToolOutput::success(lines.join("\n")))
    }
}
