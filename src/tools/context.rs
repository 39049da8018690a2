//! Tool execution context - every path is confined to one base directory

use std::path::{Component, Path, PathBuf};

/// Execution context shared by all tools of an executor
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// All file operations are constrained here
    pub base_dir: PathBuf,

    /// Whether sandbox mode is enabled (default: true)
    pub sandbox_enabled: bool,
}

impl ToolContext {
    pub fn new(base_dir: PathBuf) -> Self {
        Self {
            base_dir,
            sandbox_enabled: true,
        }
    }

    /// Create a context with sandbox disabled (for testing)
    pub fn new_unsandboxed(base_dir: PathBuf) -> Self {
        Self {
            base_dir,
            sandbox_enabled: false,
        }
    }

    /// Resolve `path` against the base directory and enforce the sandbox.
    ///
    /// `..` components are folded before the check and the longest existing
    /// prefix is canonicalized, so paths to files that do not exist yet are
    /// judged the same way as existing ones.
    pub fn validate_path(&self, path: &Path) -> Result<PathBuf, ToolError> {
        let joined = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        };
        let resolved = resolve_existing_prefix(&fold_components(&joined));

        if !self.sandbox_enabled {
            return Ok(resolved);
        }

        let base = self.base_dir.canonicalize().map_err(|e| ToolError::IoError {
            operation: "canonicalize base directory".to_string(),
            source: e,
        })?;

        if resolved.starts_with(&base) {
            Ok(resolved)
        } else {
            Err(ToolError::SandboxViolation {
                path: path.to_path_buf(),
                base: self.base_dir.clone(),
            })
        }
    }

    /// Canonical base directory, for presenting results relative to it
    pub fn root(&self) -> Result<PathBuf, ToolError> {
        self.validate_path(Path::new("."))
    }
}

pub(crate) fn fold_components(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

pub(crate) fn resolve_existing_prefix(path: &Path) -> PathBuf {
    let mut existing = path.to_path_buf();
    let mut missing = Vec::new();

    loop {
        if let Ok(canonical) = existing.canonicalize() {
            let mut out = canonical;
            for part in missing.iter().rev() {
                out.push(part);
            }
            return out;
        }
        match (existing.file_name().map(|n| n.to_os_string()), existing.parent()) {
            (Some(name), Some(parent)) => {
                missing.push(name);
                existing = parent.to_path_buf();
            }
            _ => return path.to_path_buf(),
        }
    }
}

/// Errors that can occur during tool execution
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Path must be under {base}: {path}")]
    SandboxViolation { path: PathBuf, base: PathBuf },

    #[error("Command timed out after {timeout_secs}s")]
    CommandTimeout { timeout_secs: u64 },

    #[error("Tool not found: {name}")]
    UnknownTool { name: String },

    #[error("IO error during {operation}: {source}")]
    IoError {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Remote toolset {toolset}: {message}")]
    Remote { toolset: String, message: String },
}
