//! save_file tool - Write content to a file, refusing to clobber by default

use async_trait::async_trait;
use eyre::eyre;
use serde_json::Value;
use std::path::Path;

use super::{Tool, ToolContext, ToolOutput, format_size};

pub struct SaveFileTool;

#[async_trait]
impl Tool for SaveFileTool {
    fn name(&self) -> &str {
        "save_file"
    }

    fn description(&self) -> &str {
        "Save content to a file. Creates parent directories if needed. Existing files are only replaced with overwrite=true."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File path relative to the base directory"
                },
                "content": {
                    "type": "string",
                    "description": "Content to write"
                },
                "overwrite": {
                    "type": "boolean",
                    "description": "Allow overwriting an existing file (default: false)"
                }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<ToolOutput, eyre::Error> {
        let path = input["path"].as_str().ok_or_else(|| eyre!("path is required"))?;
        let content = input["content"].as_str().ok_or_else(|| eyre!("content is required"))?;
        let overwrite = input["overwrite"].as_bool().unwrap_or(false);

        let full_path = ctx.validate_path(Path::new(path))?;
        let existed = full_path.exists();
        if existed && !overwrite {
            return Ok(ToolOutput::error(format!(
                "File {} already exists. Set overwrite=true to replace.",
                path
            )));
        }

        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full_path, content).await?;

        let action = if existed { "Overwrote" } else { "Created" };
        Ok(ToolOutput::success(format!(
            "{} file: {} ({})",
            action,
            path,
            format_size(content.len() as u64)
        )))
    }
}
