//! Terminal confirmation for unsafe tool calls.

use async_trait::async_trait;
use colored::*;
use log::warn;
use std::io::{self, BufRead, Write};

use quill::confirm::{Confirmation, ConfirmationGate};
use quill::llm::ToolCall;

/// Asks on stdin: `y` approves, `n` or an empty line rejects, anything else
/// rejects with that text as feedback.
pub struct TerminalGate;

#[async_trait]
impl ConfirmationGate for TerminalGate {
    async fn request(&self, call: &ToolCall, description: &str) -> Confirmation {
        let prompt = format!(
            "{} {}\n{} ",
            "⚠ Tool wants to run:".yellow().bold(),
            description,
            "Approve? [y]es, [n]o, or type feedback to reject:".cyan()
        );
        let tool = call.name.clone();

        let answer = tokio::task::spawn_blocking(move || -> io::Result<String> {
            let mut stdout = io::stdout();
            stdout.write_all(prompt.as_bytes())?;
            stdout.flush()?;
            let mut line = String::new();
            io::stdin().lock().read_line(&mut line)?;
            Ok(line)
        })
        .await;

        match answer {
            Ok(Ok(line)) => parse_answer(&line),
            Ok(Err(e)) => {
                warn!("Could not read confirmation for {}: {}", tool, e);
                Confirmation::reject(None)
            }
            Err(e) => {
                warn!("Confirmation prompt for {} failed: {}", tool, e);
                Confirmation::reject(None)
            }
        }
    }
}

fn parse_answer(line: &str) -> Confirmation {
    let answer = line.trim();
    match answer.to_ascii_lowercase().as_str() {
        "y" | "yes" => Confirmation::approve(),
        "" | "n" | "no" => Confirmation::reject(None),
        _ => Confirmation::reject(Some(answer.to_string())),
    }
}
