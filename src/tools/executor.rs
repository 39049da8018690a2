//! Tool executor - manages toolsets, tool registration and execution

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use log::{debug, warn};

use super::{
    CopyFileTool, GlobTool, ListDirectoryTool, ReadFileTool, RunCommandTool, SaveFileTool, Tool, ToolContext,
};
use crate::llm::{ToolCall, ToolDefinition, ToolResult};

/// Name of the built-in file and shell toolset
pub const SYSTEM_TOOLSET: &str = "system";

/// Registry of tools grouped into named toolsets
#[derive(Clone)]
pub struct ToolExecutor {
    tools: HashMap<String, Arc<dyn Tool>>,
    toolsets: BTreeMap<String, Vec<String>>,
    ctx: ToolContext,
}

impl ToolExecutor {
    /// Create an empty executor (for custom tool sets)
    pub fn new(ctx: ToolContext) -> Self {
        Self {
            tools: HashMap::new(),
            toolsets: BTreeMap::new(),
            ctx,
        }
    }

    /// Create executor with the `system` toolset
    pub fn standard(ctx: ToolContext) -> Self {
        let system: Vec<Arc<dyn Tool>> = vec![
            Arc::new(ListDirectoryTool),
            Arc::new(ReadFileTool),
            Arc::new(GlobTool),
            Arc::new(SaveFileTool),
            Arc::new(CopyFileTool),
            Arc::new(RunCommandTool),
        ];

        let mut executor = Self::new(ctx);
        executor.add_toolset(SYSTEM_TOOLSET, system);
        executor
    }

    /// Register tools under a toolset name
    pub fn add_toolset(&mut self, toolset: &str, tools: Vec<Arc<dyn Tool>>) {
        for tool in tools {
            self.add_tool(toolset, tool);
        }
    }

    /// Add a tool to a toolset; a tool with the same name is replaced
    pub fn add_tool(&mut self, toolset: &str, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            warn!("Tool {} registered twice; the {} toolset wins", name, toolset);
            for members in self.toolsets.values_mut() {
                members.retain(|m| m != &name);
            }
        }
        self.toolsets.entry(toolset.to_string()).or_default().push(name.clone());
        self.tools.insert(name, tool);
    }

    /// Executor restricted to the named toolsets
    pub fn scoped(&self, toolsets: &[String]) -> Self {
        let mut scoped = Self::new(self.ctx.clone());
        for toolset in toolsets {
            match self.toolsets.get(toolset) {
                Some(members) => {
                    for name in members {
                        if let Some(tool) = self.tools.get(name) {
                            scoped.add_tool(toolset, Arc::clone(tool));
                        }
                    }
                }
                None => warn!("Unknown toolset {}; ignoring", toolset),
            }
        }
        scoped
    }

    /// Get tool definitions for the backend, sorted by name
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self.tools.values().map(|t| t.definition()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Whether the tool may run without confirmation; unknown tools are unsafe
    pub fn is_safe(&self, name: &str) -> bool {
        self.tools.get(name).is_some_and(|t| t.safe())
    }

    /// Execute a tool call; failures become error results
    pub async fn execute(&self, call: &ToolCall) -> ToolResult {
        let Some(tool) = self.tools.get(&call.name) else {
            return ToolResult::error(&call.id, format!("Unknown tool: {}", call.name));
        };

        debug!("Executing {}", call.summary());
        match tool.execute(call.input.clone(), &self.ctx).await {
            Ok(output) if output.is_error => ToolResult::error(&call.id, output.content),
            Ok(output) => ToolResult::success(&call.id, output.content),
            Err(e) => ToolResult::error(&call.id, format!("Tool error: {}", e)),
        }
    }

    /// Check if a tool exists
    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn toolset_names(&self) -> Vec<&str> {
        self.toolsets.keys().map(String::as_str).collect()
    }

    /// Tools of one toolset in registration order
    pub fn toolset(&self, name: &str) -> Vec<&dyn Tool> {
        self.toolsets
            .get(name)
            .map(|members| members.iter().filter_map(|m| self.tools.get(m)).map(|t| t.as_ref()).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn executor(dir: &tempfile::TempDir) -> ToolExecutor {
        ToolExecutor::standard(ToolContext::new(dir.path().to_path_buf()))
    }

    #[test]
    fn test_standard_executor_has_system_tools() {
        let dir = tempdir().unwrap();
        let executor = executor(&dir);

        for name in ["list_directory", "read_file", "glob", "save_file", "copy_file", "run_command"] {
            assert!(executor.has_tool(name), "missing {}", name);
        }
        assert_eq!(executor.toolset_names(), vec![SYSTEM_TOOLSET]);
    }

    #[test]
    fn test_definitions_sorted_with_safety() {
        let dir = tempdir().unwrap();
        let defs = executor(&dir).definitions();

        let names: Vec<&str> = defs.iter().map(|d| d.name.as_str()).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
        assert!(defs.iter().find(|d| d.name == "read_file").unwrap().safe);
        assert!(!defs.iter().find(|d| d.name == "run_command").unwrap().safe);
    }

    #[test]
    fn test_is_safe() {
        let dir = tempdir().unwrap();
        let executor = executor(&dir);
        assert!(executor.is_safe("list_directory"));
        assert!(!executor.is_safe("save_file"));
        assert!(!executor.is_safe("no_such_tool"));
    }

    #[test]
    fn test_scoped() {
        let dir = tempdir().unwrap();
        let executor = executor(&dir);

        assert!(executor.scoped(&[]).is_empty());
        assert!(executor.scoped(&["unknown".to_string()]).is_empty());

        let scoped = executor.scoped(&[SYSTEM_TOOLSET.to_string()]);
        assert_eq!(scoped.definitions().len(), executor.definitions().len());
    }

    #[tokio::test]
    async fn test_execute_unknown_tool() {
        let dir = tempdir().unwrap();
        let call = ToolCall::new("call_1", "nonexistent_tool", serde_json::json!({}));

        let result = executor(&dir).execute(&call).await;
        assert!(result.is_error);
        assert_eq!(result.tool_use_id, "call_1");
        assert!(result.content.contains("Unknown tool"));
    }

    #[tokio::test]
    async fn test_execute_correlates_ids() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("test.txt"), "Hello").unwrap();
        let executor = executor(&dir);

        let read = ToolCall::new("call_1", "read_file", serde_json::json!({"path": "test.txt"}));
        let missing = ToolCall::new("call_2", "read_file", serde_json::json!({}));

        let ok = executor.execute(&read).await;
        assert_eq!(ok.tool_use_id, "call_1");
        assert!(!ok.is_error);
        assert!(ok.content.contains("Hello"));

        let failed = executor.execute(&missing).await;
        assert_eq!(failed.tool_use_id, "call_2");
        assert!(failed.is_error);
        assert!(failed.content.starts_with("Tool error:"));
    }
}
