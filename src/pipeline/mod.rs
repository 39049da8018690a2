//! Block pipeline - one processing pass over a document.
//!
//! A pass normalizes the document to canonical text, consumes every
//! `<reply!>` trigger inside an `<ai!>` block, answers the triggered blocks
//! one after another and renders the result back into the active skin.
//! Nothing in a pass is shared with any other pass.

mod context;
mod store;

pub use context::{ContextExpander, ExpandedContext};
pub use store::{DocumentStore, FsDocumentStore, MemoryStore};

use std::path::Path;
use std::sync::Arc;

use log::{debug, error, info, warn};

use crate::confirm::ConfirmationGate;
use crate::error::Result;
use crate::llm::{ChatBackend, ChatOptions, Usage};
use crate::protocol::{Beacons, TokenRecord};
use crate::runner::{self, DEFAULT_MAX_ITERATIONS, LoopFailure, LoopOutcome};
use crate::skin::Normalizer;
use crate::tags::{self, extract_params};
use crate::tools::ToolExecutor;
use crate::transcript;

const INTERRUPTED: &str = "Processing was interrupted before an answer arrived.";

/// Defaults for every block; parameter tags override them per block.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub model: String,
    pub system_prompt: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub thinking_budget: Option<u32>,
    pub max_iterations: u32,
    /// Toolsets a block gets when it names none
    pub toolsets: Vec<String>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            model: String::new(),
            system_prompt: None,
            temperature: None,
            max_tokens: None,
            thinking_budget: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            toolsets: Vec::new(),
        }
    }
}

/// What one pass did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassSummary {
    /// The new document body, in the active skin
    pub text: String,
    pub answered: usize,
    pub failed: usize,
    pub usage: Usage,
}

impl PassSummary {
    pub fn blocks(&self) -> usize {
        self.answered + self.failed
    }
}

/// Composition root for a processing pass
pub struct BlockPipeline {
    backend: Arc<dyn ChatBackend>,
    executor: ToolExecutor,
    gate: Arc<dyn ConfirmationGate>,
    store: Arc<dyn DocumentStore>,
    normalizer: Normalizer,
    beacons: Beacons,
    settings: PipelineSettings,
}

impl BlockPipeline {
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        executor: ToolExecutor,
        gate: Arc<dyn ConfirmationGate>,
        store: Arc<dyn DocumentStore>,
        normalizer: Normalizer,
        beacons: Beacons,
    ) -> Self {
        Self {
            backend,
            executor,
            gate,
            store,
            normalizer,
            beacons,
            settings: PipelineSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: PipelineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Run a pass over a document body.
    pub async fn process_text(&self, doc: &str) -> PassSummary {
        let (prepared, pending) = self.prepare(doc);
        self.answer_pending(prepared, pending).await
    }

    /// Run a pass over a stored document.
    ///
    /// The document is written once with its triggers consumed, before any
    /// backend call, and once more with the answers. A pass that changes
    /// nothing writes nothing.
    pub async fn process_path(&self, path: &Path) -> Result<PassSummary> {
        let doc = self.store.read(path)?;
        let (prepared, pending) = self.prepare(&doc);
        let consumed = self.normalizer.normalize_out(&prepared);
        if pending == 0 {
            debug!("No pending blocks in {}", path.display());
            if consumed != doc {
                self.store.write(path, &consumed)?;
            }
            return Ok(PassSummary {
                text: consumed,
                ..Default::default()
            });
        }

        self.store.write(path, &consumed)?;
        info!("Processing {} block(s) in {}", pending, path.display());

        let summary = self.answer_pending(prepared, pending).await;
        self.store.write(path, &summary.text)?;
        Ok(summary)
    }

    /// Normalize in, fail stale placeholders and consume triggers.
    ///
    /// Returns canonical text and the number of blocks left pending.
    fn prepare(&self, doc: &str) -> (String, usize) {
        let canonical = self.normalizer.normalize_in(doc);
        let beacons = self.beacons;
        let mut pending = 0;

        let (prepared, _) = tags::rewrite(&canonical, |tag| {
            let (Some(inner), Some(inner_start)) = (&tag.inner, tag.inner_start()) else {
                return None;
            };
            if tag.name != "ai" {
                return None;
            }

            let stale = inner.contains(beacons.processing);
            let body = if stale {
                warn!("Found a placeholder from an interrupted pass");
                inner.replace(beacons.processing, &beacons.error_block(INTERRUPTED))
            } else {
                inner.clone()
            };

            let mut triggered = false;
            let (body, _) = tags::rewrite(&body, |inner_tag| match inner_tag.name.as_str() {
                "reply" if !inner_tag.is_paired() => {
                    triggered = true;
                    Some(beacons.processing.to_string())
                }
                _ => None,
            });

            if !stale && !triggered {
                return None;
            }
            if triggered {
                pending += 1;
            }
            let opening = &canonical[tag.span.start..inner_start];
            Some(format!("{}{}</ai!>", opening, body))
        });

        (prepared, pending)
    }

    async fn answer_pending(&self, mut doc: String, pending: usize) -> PassSummary {
        let mut summary = PassSummary::default();
        let mut cursor = 0;

        for _ in 0..pending {
            let Some((start, end, inner)) = self.next_pending(&doc, cursor) else {
                break;
            };

            let (body, answered, usage) = self.process_block(&inner).await;
            if answered {
                summary.answered += 1;
            } else {
                summary.failed += 1;
            }
            summary.usage.add(&usage);

            let block = &doc[start..end];
            let inner_at = block.len() - "</ai!>".len() - inner.len();
            let rebuilt = format!("{}{}</ai!>", &block[..inner_at], body);
            cursor = start + rebuilt.len();
            doc.replace_range(start..end, &rebuilt);
        }

        summary.text = self.normalizer.normalize_out(&doc);
        summary
    }

    /// Span and inner text of the first pending block at or after `cursor`.
    fn next_pending(&self, doc: &str, cursor: usize) -> Option<(usize, usize, String)> {
        tags::scan(&doc[cursor..])
            .into_iter()
            .filter(|tag| tag.name == "ai")
            .find_map(|tag| {
                let inner = tag.inner?;
                inner
                    .contains(self.beacons.processing)
                    .then(|| (cursor + tag.span.start, cursor + tag.span.end, inner))
            })
    }

    /// Answer one block. The answer replaces the first placeholder; any
    /// further placeholders in the block are dropped.
    async fn process_block(&self, inner: &str) -> (String, bool, Usage) {
        let processing = self.beacons.processing;
        let Some(at) = inner.find(processing) else {
            return (inner.to_string(), false, Usage::default());
        };
        let before = &inner[..at];
        let after = inner[at + processing.len()..].replace(processing, "");

        let (text, params) = extract_params(before);
        let expanded = ContextExpander::new(self.store.as_ref()).expand(&text);
        let turns = transcript::build(&expanded.text, expanded.media, &self.beacons);
        debug!("Block has {} turns, params {:?}", turns.len(), params);

        let options = ChatOptions {
            model: params.model.unwrap_or_else(|| self.settings.model.clone()),
            system_prompt: params.system.or_else(|| self.settings.system_prompt.clone()),
            temperature: params.temperature.or(self.settings.temperature),
            max_tokens: params.max_tokens.or(self.settings.max_tokens),
            tools: Vec::new(),
            thinking_budget: params.thinking_budget.or(self.settings.thinking_budget),
        };
        let toolsets = params.toolsets.unwrap_or_else(|| self.settings.toolsets.clone());
        let executor = self.executor.scoped(&toolsets);
        let max_iterations = params.max_iterations.unwrap_or(self.settings.max_iterations);

        let context_notes: Vec<String> = expanded.errors.iter().map(|e| format!("context error: {}", e)).collect();

        match runner::run(
            turns,
            self.backend.as_ref(),
            &executor,
            self.gate.as_ref(),
            &options,
            max_iterations,
        )
        .await
        {
            Ok(outcome) => {
                info!(
                    "Block answered: {} in / {} out tokens, {} model calls",
                    outcome.usage.input_tokens, outcome.usage.output_tokens, outcome.iterations
                );
                let usage = outcome.usage;
                (
                    format!("{}{}{}", before, self.render_answer(&outcome, &context_notes), after),
                    true,
                    usage,
                )
            }
            Err(failure) => {
                error!("Block failed: {}", failure);
                let usage = failure.usage;
                (
                    format!("{}{}{}", before, self.render_failure(&failure, &context_notes), after),
                    false,
                    usage,
                )
            }
        }
    }

    fn render_answer(&self, outcome: &LoopOutcome, context_notes: &[String]) -> String {
        let b = &self.beacons;
        let record = TokenRecord::new(
            outcome.model.clone().unwrap_or_default(),
            outcome.usage.input_tokens,
            outcome.usage.output_tokens,
        );

        let mut out = b.assistant_header(Some(&record));
        if let Some(thinking) = &outcome.thinking {
            out.push_str(&b.thinking_block(&self.literal(thinking)));
        }
        let log: Vec<String> = context_notes.iter().cloned().chain(outcome.log_lines()).collect();
        if !log.is_empty() {
            out.push_str(&b.tool_block(&self.literal(&log.join("\n"))));
        }
        out.push_str(&self.literal(outcome.final_text.trim_matches('\n')));
        out.push('\n');
        out.push_str(&b.user_header());
        out
    }

    fn render_failure(&self, failure: &LoopFailure, context_notes: &[String]) -> String {
        let mut message = failure.to_string();
        let log: Vec<&String> = context_notes.iter().chain(failure.execution_log.iter()).collect();
        if !log.is_empty() {
            message.push('\n');
            for line in log {
                message.push('\n');
                message.push_str(line);
            }
        }
        self.beacons.error_block(&self.literal(&message))
    }

    /// Text from the backend or tools as it may appear in the document:
    /// no tag or sentinel in it is ever read back as structure.
    fn literal(&self, text: &str) -> String {
        self.beacons.neutralize(&tags::escape(text))
    }
}
