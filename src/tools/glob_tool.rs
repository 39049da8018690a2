//! glob tool - Find files matching a glob pattern

use async_trait::async_trait;
use eyre::eyre;
use serde_json::Value;
use std::path::Path;

use super::{Tool, ToolContext, ToolOutput};

const MAX_MATCHES: usize = 1000;

pub struct GlobTool;

#[async_trait]
impl Tool for GlobTool {
    fn name(&self) -> &str {
        "glob"
    }

    fn description(&self) -> &str {
        "Find files matching a glob pattern (e.g., **/*.md)"
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "Glob pattern to match"
                },
                "path": {
                    "type": "string",
                    "description": "Directory to search from (default: base directory)"
                }
            },
            "required": ["pattern"]
        })
    }

    fn safe(&self) -> bool {
        true
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<ToolOutput, eyre::Error> {
        let pattern = input["pattern"].as_str().ok_or_else(|| eyre!("pattern is required"))?;
        let base = input["path"].as_str().unwrap_or(".");

        let root = ctx.root()?;
        let search_dir = ctx.validate_path(Path::new(base))?;
        let full_pattern = search_dir.join(pattern);
        let full_pattern = full_pattern
            .to_str()
            .ok_or_else(|| eyre!("pattern is not valid UTF-8"))?;

        let mut matches: Vec<String> = glob::glob(full_pattern)?
            .filter_map(|r| r.ok())
            .filter_map(|p| p.canonicalize().ok())
            .filter(|p| p.starts_with(&root))
            .map(|p| p.strip_prefix(&root).unwrap_or(&p).to_string_lossy().to_string())
            .take(MAX_MATCHES)
            .collect();
        matches.sort();

        if matches.is_empty() {
            Ok(ToolOutput::success("No matches found"))
        } else {
            Ok(ToolOutput::success(matches.join("\n")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_glob_recursive() {
        let dir = tempdir().unwrap();
        let ctx = ToolContext::new(dir.path().to_path_buf());

        std::fs::create_dir_all(dir.path().join("notes/daily")).unwrap();
        std::fs::write(dir.path().join("notes/a.md"), "").unwrap();
        std::fs::write(dir.path().join("notes/daily/b.md"), "").unwrap();
        std::fs::write(dir.path().join("notes/c.txt"), "").unwrap();

        let result = GlobTool
            .execute(serde_json::json!({"pattern": "**/*.md"}), &ctx)
            .await
            .unwrap();

        assert_eq!(result.content, "notes/a.md\nnotes/daily/b.md");
    }

    #[tokio::test]
    async fn test_glob_no_matches() {
        let dir = tempdir().unwrap();
        let ctx = ToolContext::new(dir.path().to_path_buf());

        let result = GlobTool
            .execute(serde_json::json!({"pattern": "*.xyz"}), &ctx)
            .await
            .unwrap();
        assert_eq!(result.content, "No matches found");
    }

    #[tokio::test]
    async fn test_glob_cannot_escape() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("inner")).unwrap();
        std::fs::write(dir.path().join("outside.md"), "").unwrap();
        let ctx = ToolContext::new(dir.path().join("inner"));

        let result = GlobTool
            .execute(serde_json::json!({"pattern": "../*.md"}), &ctx)
            .await
            .unwrap();
        assert_eq!(result.content, "No matches found");
    }
}
