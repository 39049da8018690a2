//! Tool system for backend interactions
//!
//! Tools are grouped into named toolsets. The built-in `system` toolset gives
//! file and shell access inside one base directory; remote toolsets are
//! served over HTTP by a tool server.

mod context;
mod copy_file;
mod executor;
mod glob_tool;
mod list_directory;
mod mcp;
mod read_file;
mod run_command;
mod save_file;

pub use context::{ToolContext, ToolError};
pub(crate) use context::{fold_components, resolve_existing_prefix};
pub use executor::{SYSTEM_TOOLSET, ToolExecutor};
pub use mcp::McpToolset;

pub use copy_file::CopyFileTool;
pub use glob_tool::GlobTool;
pub use list_directory::ListDirectoryTool;
pub use read_file::ReadFileTool;
pub use run_command::RunCommandTool;
pub use save_file::SaveFileTool;

use async_trait::async_trait;
use serde_json::Value;

use crate::llm::ToolDefinition;

/// A tool that can be called by the model
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name (matches the backend's tool_use name)
    fn name(&self) -> &str;

    /// Human-readable description
    fn description(&self) -> &str;

    /// JSON Schema for input parameters
    fn input_schema(&self) -> Value;

    /// Read-only tools run without confirmation
    fn safe(&self) -> bool {
        false
    }

    /// Execute the tool
    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<ToolOutput, eyre::Error>;

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(self.name(), self.description(), self.input_schema(), self.safe())
    }
}

/// Output of one tool execution
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    pub content: String,
    pub is_error: bool,
}

impl ToolOutput {
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: true,
        }
    }
}

/// Human-readable byte size, e.g. `12B`, `3.4KB`
pub(crate) fn format_size(size: u64) -> String {
    if size < 1024 {
        format!("{}B", size)
    } else if size < 1024 * 1024 {
        format!("{:.1}KB", size as f64 / 1024.0)
    } else {
        format!("{:.1}MB", size as f64 / (1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_output() {
        assert!(!ToolOutput::success("done").is_error);
        assert!(ToolOutput::error("failed").is_error);
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(12), "12B");
        assert_eq!(format_size(2048), "2.0KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0MB");
    }

    #[test]
    fn test_definition_carries_safe_flag() {
        assert!(ReadFileTool.definition().safe);
        assert!(!SaveFileTool.definition().safe);
        assert_eq!(RunCommandTool.definition().name, "run_command");
    }
}
