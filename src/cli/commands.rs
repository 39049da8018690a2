//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - process: answer every `<reply!>` in a document
//! - convert: rewrite a document in another skin
//! - skins / tools: list what is available

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Quill - co-author documents with an AI backend through inline markup
#[derive(Parser, Debug)]
#[command(name = "quill")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Answer every pending block in a document
    Process {
        /// Document to process
        file: PathBuf,

        /// Approve every tool call without asking
        #[arg(short, long)]
        yes: bool,

        /// Disable tools for every block
        #[arg(long)]
        no_tools: bool,

        /// Override the active skin
        #[arg(short, long)]
        skin: Option<String>,
    },

    /// Convert a document to another skin
    Convert {
        /// Document to convert
        file: PathBuf,

        /// Skin to write
        #[arg(short, long)]
        to: String,

        /// Skin the document is in (default: configured active skin)
        #[arg(short, long)]
        from: Option<String>,

        /// Write the result back instead of printing it
        #[arg(short, long)]
        write: bool,
    },

    /// List available skins
    Skins,

    /// List configured toolsets and their tools
    Tools,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_process() {
        let cli = Cli::try_parse_from(["quill", "process", "notes/doc.md", "--yes"]).unwrap();
        match cli.command {
            Commands::Process { file, yes, no_tools, skin } => {
                assert_eq!(file, PathBuf::from("notes/doc.md"));
                assert!(yes);
                assert!(!no_tools);
                assert!(skin.is_none());
            }
            _ => panic!("Expected Process command"),
        }
    }

    #[test]
    fn test_cli_parse_convert() {
        let cli = Cli::try_parse_from(["quill", "convert", "doc.md", "--to", "raw", "--write"]).unwrap();
        match cli.command {
            Commands::Convert { to, from, write, .. } => {
                assert_eq!(to, "raw");
                assert!(from.is_none());
                assert!(write);
            }
            _ => panic!("Expected Convert command"),
        }
    }

    #[test]
    fn test_cli_global_flags() {
        let cli = Cli::try_parse_from(["quill", "skins", "-v", "--config", "/tmp/q.yml"]).unwrap();
        assert!(cli.is_verbose());
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/q.yml")));
        assert!(matches!(cli.command, Commands::Skins));
    }

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["quill"]).is_err());
    }
}
