//! CLI module for quill - command-line interface and subcommands.

pub mod commands;
pub mod gate;

pub use commands::Cli;
pub use gate::TerminalGate;
