//! list_directory tool - List files and directories in a path

use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;

use super::{Tool, ToolContext, ToolOutput, format_size};

pub struct ListDirectoryTool;

#[async_trait]
impl Tool for ListDirectoryTool {
    fn name(&self) -> &str {
        "list_directory"
    }

    fn description(&self) -> &str {
        "List files and directories at a path, with file sizes."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Directory path relative to the base directory (default: .)"
                },
                "include_hidden": {
                    "type": "boolean",
                    "description": "Include entries starting with a dot (default: false)"
                }
            }
        })
    }

    fn safe(&self) -> bool {
        true
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<ToolOutput, eyre::Error> {
        let path = input["path"].as_str().unwrap_or(".");
        let include_hidden = input["include_hidden"].as_bool().unwrap_or(false);
        let full_path = ctx.validate_path(Path::new(path))?;

        if !full_path.is_dir() {
            return Ok(ToolOutput::error(format!("Not a directory: {}", path)));
        }

        // (is_file, lowercase name, display line): directories first
        let mut entries = Vec::new();
        let mut dir = tokio::fs::read_dir(&full_path).await?;

        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if !include_hidden && name.starts_with('.') {
                continue;
            }

            let line = match entry.metadata().await {
                Ok(metadata) if metadata.is_dir() => (false, format!("📁 {}/", name)),
                Ok(metadata) => (true, format!("📄 {} ({})", name, format_size(metadata.len()))),
                Err(_) => (true, format!("⚠️ {} (access denied)", name)),
            };
            entries.push((line.0, name.to_lowercase(), line.1));
        }

        if entries.is_empty() {
            return Ok(ToolOutput::success(format!("Directory {} is empty.", path)));
        }

        entries.sort();
        let lines: Vec<String> = entries.into_iter().map(|(_, _, line)| line).collect();
        Ok(ToolOutput::success(format!("Contents of {}:\n{}", path, lines.join("\n"))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_list_directory_basic() {
        let dir = tempdir().unwrap();
        let ctx = ToolContext::new(dir.path().to_path_buf());

        std::fs::write(dir.path().join("b.txt"), "12345").unwrap();
        std::fs::write(dir.path().join("A.txt"), "").unwrap();
        std::fs::create_dir(dir.path().join("zdir")).unwrap();

        let result = ListDirectoryTool
            .execute(serde_json::json!({"path": "."}), &ctx)
            .await
            .unwrap();

        assert!(!result.is_error);
        assert_eq!(result.content, "Contents of .:\n📁 zdir/\n📄 A.txt (0B)\n📄 b.txt (5B)");
    }

    #[tokio::test]
    async fn test_list_directory_hidden() {
        let dir = tempdir().unwrap();
        let ctx = ToolContext::new(dir.path().to_path_buf());
        std::fs::write(dir.path().join(".secret"), "").unwrap();

        let result = ListDirectoryTool.execute(serde_json::json!({}), &ctx).await.unwrap();
        assert_eq!(result.content, "Directory . is empty.");

        let result = ListDirectoryTool
            .execute(serde_json::json!({"include_hidden": true}), &ctx)
            .await
            .unwrap();
        assert!(result.content.contains(".secret"));
    }

    #[tokio::test]
    async fn test_list_file_is_error_result() {
        let dir = tempdir().unwrap();
        let ctx = ToolContext::new(dir.path().to_path_buf());
        std::fs::write(dir.path().join("f.txt"), "").unwrap();

        let result = ListDirectoryTool
            .execute(serde_json::json!({"path": "f.txt"}), &ctx)
            .await
            .unwrap();
        assert!(result.is_error);
    }
}
