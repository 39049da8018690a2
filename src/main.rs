use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

mod cli;
mod config;

use cli::commands::Commands;
use cli::{Cli, TerminalGate};
use config::Config;

use quill::confirm::{AutoApprove, ConfirmationGate};
use quill::llm::AnthropicBackend;
use quill::pipeline::{BlockPipeline, DocumentStore, FsDocumentStore};
use quill::protocol::Beacons;
use quill::skin::SkinRegistry;
use quill::tools::{McpToolset, ToolContext, ToolExecutor};

fn setup_logging(level: Option<&str>) -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("quill")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("quill.log");

    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    // RUST_LOG wins over the configured level
    let env = env_logger::Env::default().default_filter_or(level.unwrap_or("info"));
    env_logger::Builder::from_env(env)
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

async fn run_application(cli: &Cli, config: &Config) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match &cli.command {
        Commands::Process {
            file,
            yes,
            no_tools,
            skin,
        } => handle_process_command(file, *yes, *no_tools, skin.as_deref(), config).await,
        Commands::Convert { file, to, from, write } => {
            handle_convert_command(file, to, from.as_deref(), *write, config)
        }
        Commands::Skins => handle_skins_command(config),
        Commands::Tools => handle_tools_command(config).await,
    }
}

/// Standard tools plus every reachable remote toolset.
async fn build_executor(config: &Config, base_dir: PathBuf) -> ToolExecutor {
    let ctx = if config.tools.sandbox {
        ToolContext::new(base_dir)
    } else {
        ToolContext::new_unsandboxed(base_dir)
    };
    let mut executor = ToolExecutor::standard(ctx);

    for remote in &config.tools.remote {
        let toolset = match McpToolset::new(&remote.url, &remote.toolset, remote.api_key(), remote.timeout()) {
            Ok(toolset) => Arc::new(toolset),
            Err(e) => {
                warn!("Skipping toolset {}: {}", remote.toolset, e);
                continue;
            }
        };
        match toolset.fetch_tools().await {
            Ok(tools) => executor.add_toolset(&remote.toolset, tools),
            Err(e) => {
                warn!("Skipping toolset {}: {}", remote.toolset, e);
                eprintln!("{} {}", "Toolset unavailable:".yellow(), e);
            }
        }
    }

    executor
}

async fn handle_process_command(
    file: &Path,
    yes: bool,
    no_tools: bool,
    skin: Option<&str>,
    config: &Config,
) -> Result<()> {
    let path = fs::canonicalize(file).context(format!("Failed to open {}", file.display()))?;
    info!("Processing {}", path.display());

    let vault_root = config.vault_root(&path);
    let beacons = Beacons::CANONICAL;
    let registry = SkinRegistry::builtin(beacons);
    let normalizer = registry.normalizer(skin.unwrap_or(&config.skin.active), &config.skin.reference)?;

    let backend = AnthropicBackend::new(config.anthropic_config()).context("Failed to create backend")?;
    let executor = build_executor(config, config.tools_base_dir(&vault_root)).await;
    let gate: Arc<dyn ConfirmationGate> = if yes { Arc::new(AutoApprove) } else { Arc::new(TerminalGate) };

    let mut settings = config.pipeline_settings();
    if no_tools {
        settings.toolsets.clear();
    }

    let pipeline = BlockPipeline::new(
        Arc::new(backend),
        executor,
        gate,
        Arc::new(FsDocumentStore::new(vault_root).with_document(&path)),
        normalizer,
        beacons,
    )
    .with_settings(settings);

    let summary = pipeline.process_path(&path).await?;

    if summary.blocks() == 0 {
        println!("{}", "No pending blocks.".cyan());
        return Ok(());
    }
    println!(
        "{} {} answered, {} failed ({} in / {} out tokens)",
        "Done:".green(),
        summary.answered,
        summary.failed,
        summary.usage.input_tokens,
        summary.usage.output_tokens
    );
    if summary.failed > 0 {
        println!("{}", "Failed blocks carry an error note in the document.".red());
    }
    Ok(())
}

fn handle_convert_command(file: &Path, to: &str, from: Option<&str>, write: bool, config: &Config) -> Result<()> {
    let registry = SkinRegistry::builtin(Beacons::CANONICAL);
    let normalizer = registry.normalizer(from.unwrap_or(&config.skin.active), &config.skin.reference)?;
    let target = registry.get(to)?;

    let path = fs::canonicalize(file).context(format!("Failed to open {}", file.display()))?;
    let store = FsDocumentStore::new(config.vault_root(&path)).with_document(&path);
    let doc = store.read(&path)?;
    let converted = target.from_canonical(&normalizer.normalize_in(&doc));

    if write {
        store.write(&path, &converted)?;
        println!("{} {} → {}", "Converted:".green(), file.display(), to);
    } else {
        print!("{}", converted);
    }
    Ok(())
}

fn handle_skins_command(config: &Config) -> Result<()> {
    let registry = SkinRegistry::builtin(Beacons::CANONICAL);
    for name in registry.names() {
        let skin = registry.get(name)?;
        let marker = if name == config.skin.active { "*".green() } else { " ".normal() };
        println!("{} {:<10} {}", marker, name.bold(), skin.description());
    }
    Ok(())
}

async fn handle_tools_command(config: &Config) -> Result<()> {
    let base_dir = config
        .tools
        .base_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from("."));
    let executor = build_executor(config, base_dir).await;

    for toolset in executor.toolset_names() {
        let enabled = config.tools.enabled_toolsets.iter().any(|t| t == toolset);
        let status = if enabled { "enabled".green() } else { "disabled".dimmed() };
        println!("{} ({})", toolset.bold(), status);
        for tool in executor.toolset(toolset) {
            let safety = if tool.safe() { "safe".green() } else { "asks".yellow() };
            println!("  {:<16} [{}] {}", tool.name(), safety, tool.description());
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    setup_logging(config.log_level.as_deref()).context("Failed to setup logging")?;

    info!("Starting with config from: {:?}", cli.config);

    // Run the main application logic
    run_application(&cli, &config).await.context("Application failed")?;

    Ok(())
}
