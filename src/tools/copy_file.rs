//! copy_file tool - Copy or move a file inside the base directory

use async_trait::async_trait;
use eyre::eyre;
use serde_json::Value;
use std::path::Path;

use super::{Tool, ToolContext, ToolOutput};

pub struct CopyFileTool;

#[async_trait]
impl Tool for CopyFileTool {
    fn name(&self) -> &str {
        "copy_file"
    }

    fn description(&self) -> &str {
        "Copy or move a file. The destination is only replaced with overwrite=true."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "source": {
                    "type": "string",
                    "description": "Source file path"
                },
                "destination": {
                    "type": "string",
                    "description": "Destination file path"
                },
                "move": {
                    "type": "boolean",
                    "description": "Move instead of copy (default: false)"
                },
                "overwrite": {
                    "type": "boolean",
                    "description": "Allow overwriting the destination (default: false)"
                }
            },
            "required": ["source", "destination"]
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<ToolOutput, eyre::Error> {
        let source = input["source"].as_str().ok_or_else(|| eyre!("source is required"))?;
        let destination = input["destination"]
            .as_str()
            .ok_or_else(|| eyre!("destination is required"))?;
        let move_file = input["move"].as_bool().unwrap_or(false);
        let overwrite = input["overwrite"].as_bool().unwrap_or(false);

        let src = ctx.validate_path(Path::new(source))?;
        let dst = ctx.validate_path(Path::new(destination))?;

        if !src.is_file() {
            return Ok(ToolOutput::error(format!("Source not found: {}", source)));
        }
        if dst.exists() && !overwrite {
            return Ok(ToolOutput::error(format!(
                "Destination exists: {}. Set overwrite=true to replace.",
                destination
            )));
        }

        if let Some(parent) = dst.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        if move_file {
            if tokio::fs::rename(&src, &dst).await.is_err() {
                // rename fails across filesystems
                tokio::fs::copy(&src, &dst).await?;
                tokio::fs::remove_file(&src).await?;
            }
            Ok(ToolOutput::success(format!("Moved: {} → {}", source, destination)))
        } else {
            tokio::fs::copy(&src, &dst).await?;
            Ok(ToolOutput::success(format!("Copied: {} → {}", source, destination)))
        }
    }
}
