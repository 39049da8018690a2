use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use quill::llm::AnthropicConfig;
use quill::pipeline::PipelineSettings;
use quill::runner::DEFAULT_MAX_ITERATIONS;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: Option<String>,
    pub skin: SkinConfig,
    pub llm: LlmConfig,
    pub tool_loop: ToolLoopConfig,
    pub tools: ToolsConfig,
    pub vault: VaultConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SkinConfig {
    /// Skin documents are written in
    pub active: String,
    /// Skin applied after the active one when reading, to absorb older styles
    pub reference: String,
}

impl Default for SkinConfig {
    fn default() -> Self {
        Self {
            active: "markdown".to_string(),
            reference: "markdown".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
    pub thinking_budget: Option<u32>,
    pub system_prompt: Option<String>,
    pub timeout_ms: u64,
    pub api_key_env: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4-20250514".to_string(),
            max_tokens: 8192,
            temperature: None,
            thinking_budget: None,
            system_prompt: None,
            timeout_ms: 300000,
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolLoopConfig {
    pub max_iterations: u32,
}

impl Default for ToolLoopConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Sandbox root for file tools; defaults to the vault root
    pub base_dir: Option<PathBuf>,
    pub sandbox: bool,
    pub enabled_toolsets: Vec<String>,
    pub remote: Vec<RemoteToolsetConfig>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            base_dir: None,
            sandbox: true,
            enabled_toolsets: vec!["system".to_string()],
            remote: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteToolsetConfig {
    pub url: String,
    pub toolset: String,
    /// Environment variable holding the server's bearer token
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_remote_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_remote_timeout_ms() -> u64 {
    30000
}

impl RemoteToolsetConfig {
    pub fn api_key(&self) -> Option<String> {
        self.api_key_env.as_ref().and_then(|var| std::env::var(var).ok())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Root that links resolve against; defaults to the document's directory
    pub root: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            skin: SkinConfig::default(),
            llm: LlmConfig::default(),
            tool_loop: ToolLoopConfig::default(),
            tools: ToolsConfig::default(),
            vault: VaultConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try primary location: ~/.config/<project>/<project>.yml
        if let Some(config_dir) = dirs::config_dir() {
            let project_name = env!("CARGO_PKG_NAME");
            let primary_config = config_dir.join(project_name).join(format!("{}.yml", project_name));
            if primary_config.exists() {
                match Self::load_from_file(&primary_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", primary_config.display(), e);
                    }
                }
            }
        }

        // Try fallback location: ./<project>.yml
        let project_name = env!("CARGO_PKG_NAME");
        let fallback_config = PathBuf::from(format!("{}.yml", project_name));
        if fallback_config.exists() {
            match Self::load_from_file(&fallback_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", fallback_config.display(), e);
                }
            }
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Block defaults for the pipeline
    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            model: self.llm.model.clone(),
            system_prompt: self.llm.system_prompt.clone(),
            temperature: self.llm.temperature,
            max_tokens: Some(self.llm.max_tokens),
            thinking_budget: self.llm.thinking_budget,
            max_iterations: self.tool_loop.max_iterations,
            toolsets: self.tools.enabled_toolsets.clone(),
        }
    }

    pub fn anthropic_config(&self) -> AnthropicConfig {
        AnthropicConfig {
            model: self.llm.model.clone(),
            max_tokens: self.llm.max_tokens,
            timeout: Duration::from_millis(self.llm.timeout_ms),
            api_key_env: self.llm.api_key_env.clone(),
        }
    }

    /// Vault root for a document: configured root, else the document's directory
    pub fn vault_root(&self, document: &Path) -> PathBuf {
        self.vault.root.clone().unwrap_or_else(|| {
            document
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."))
        })
    }

    pub fn tools_base_dir(&self, vault_root: &Path) -> PathBuf {
        self.tools.base_dir.clone().unwrap_or_else(|| vault_root.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("quill.yml");
        fs::write(
            &path,
            "skin:\n  active: raw\nllm:\n  model: claude-haiku\ntools:\n  remote:\n    - url: http://localhost:8000\n      toolset: gmail\n",
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.skin.active, "raw");
        assert_eq!(config.skin.reference, "markdown");
        assert_eq!(config.llm.model, "claude-haiku");
        assert_eq!(config.llm.max_tokens, 8192);
        assert_eq!(config.tools.enabled_toolsets, vec!["system"]);
        assert_eq!(config.tools.remote[0].toolset, "gmail");
        assert_eq!(config.tools.remote[0].timeout_ms, 30000);
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let path = PathBuf::from("/nonexistent/quill.yml");
        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    fn test_pipeline_settings() {
        let mut config = Config::default();
        config.tool_loop.max_iterations = 4;
        let settings = config.pipeline_settings();
        assert_eq!(settings.max_iterations, 4);
        assert_eq!(settings.max_tokens, Some(8192));
        assert_eq!(settings.toolsets, vec!["system"]);
    }

    #[test]
    fn test_vault_root_defaults_to_document_dir() {
        let config = Config::default();
        assert_eq!(config.vault_root(Path::new("notes/doc.md")), PathBuf::from("notes"));
        assert_eq!(config.vault_root(Path::new("doc.md")), PathBuf::from("."));
    }
}
