//! Bounded tool loop.
//!
//! `ToolLoop` is a synchronous state machine: `next_step` says what the
//! driver must do, `apply` feeds back what happened. `run` is the async
//! driver that performs the steps against a backend, an executor and a
//! confirmation gate. Backend calls are strictly sequential because every
//! iteration depends on the previous iteration's tool results.

use std::collections::HashSet;

use log::{debug, error, info, warn};
use thiserror::Error;

use crate::confirm::{Confirmation, ConfirmationGate};
use crate::llm::{ChatBackend, ChatOptions, ChatResponse, LlmError, ToolCall, ToolResult, Usage};
use crate::tools::ToolExecutor;
use crate::transcript::{ConversationTurn, Part, Role};

/// Default cap on model calls per block
pub const DEFAULT_MAX_ITERATIONS: u32 = 10;

const REJECTED_NOTICE: &str = "The user rejected this tool call.";

/// What the driver has to do next
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Call the backend with `ToolLoop::turns()`
    CallModel,
    /// Ask the confirmation gate about this call
    Confirm(ToolCall),
    /// Run this call through the executor
    Execute(ToolCall),
    /// Nothing left to do; take the outcome
    Finished,
}

/// What happened when the driver performed a step
#[derive(Debug)]
pub enum Event {
    ModelReplied(ChatResponse),
    ModelFailed(LlmError),
    Confirmed(Confirmation),
    Executed(ToolResult),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Confirm,
    Execute,
}

#[derive(Debug)]
enum State {
    AwaitingModel,
    ExecutingTools {
        text: String,
        calls: Vec<ToolCall>,
        index: usize,
        phase: Phase,
        results: Vec<ToolResult>,
    },
    Done,
    Aborted(LlmError),
}

/// Result of a completed loop
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoopOutcome {
    pub final_text: String,
    /// Token usage summed over every model call
    pub usage: Usage,
    pub thinking: Option<String>,
    /// Model reported by the last response
    pub model: Option<String>,
    /// One line per tool call, in execution order
    pub execution_log: Vec<String>,
    pub warnings: Vec<String>,
    pub iterations: u32,
}

impl LoopOutcome {
    /// Execution log followed by warnings, as shown in the tool block.
    pub fn log_lines(&self) -> Vec<String> {
        self.execution_log
            .iter()
            .cloned()
            .chain(self.warnings.iter().map(|w| format!("warning: {}", w)))
            .collect()
    }
}

/// A backend failure that ended the loop
#[derive(Debug, Error)]
#[error("{source}")]
pub struct LoopFailure {
    #[source]
    pub source: LlmError,
    /// Tool calls that ran before the failure
    pub execution_log: Vec<String>,
    pub usage: Usage,
}

/// The tool-calling state machine for one block.
///
/// Owns the block's conversation exclusively; it is dropped when the loop
/// ends.
#[derive(Debug)]
pub struct ToolLoop {
    turns: Vec<ConversationTurn>,
    safe_tools: HashSet<String>,
    max_iterations: u32,
    state: State,
    iterations: u32,
    usage: Usage,
    thinking: Vec<String>,
    /// Signed reasoning of the response whose tool calls are in flight
    reasoning: Vec<Part>,
    model: Option<String>,
    partial: Vec<String>,
    final_text: String,
    execution_log: Vec<String>,
    warnings: Vec<String>,
}

impl ToolLoop {
    /// Start a loop. Tools not in `safe_tools` need confirmation.
    pub fn new(turns: Vec<ConversationTurn>, safe_tools: HashSet<String>, max_iterations: u32) -> Self {
        Self {
            turns,
            safe_tools,
            max_iterations: max_iterations.max(1),
            state: State::AwaitingModel,
            iterations: 0,
            usage: Usage::default(),
            thinking: Vec::new(),
            reasoning: Vec::new(),
            model: None,
            partial: Vec::new(),
            final_text: String::new(),
            execution_log: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// The conversation as it stands, to send with the next model call.
    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, State::Done | State::Aborted(_))
    }

    pub fn next_step(&self) -> Step {
        match &self.state {
            State::AwaitingModel => Step::CallModel,
            State::ExecutingTools {
                calls, index, phase, ..
            } => {
                let call = calls[*index].clone();
                match phase {
                    Phase::Confirm => Step::Confirm(call),
                    Phase::Execute => Step::Execute(call),
                }
            }
            State::Done | State::Aborted(_) => Step::Finished,
        }
    }

    /// Advance the machine. An event that does not fit the current state is
    /// logged and ignored.
    pub fn apply(&mut self, event: Event) {
        let state = std::mem::replace(&mut self.state, State::Done);
        self.state = match (state, event) {
            (State::AwaitingModel, Event::ModelReplied(response)) => self.on_model_reply(response),
            (State::AwaitingModel, Event::ModelFailed(err)) => {
                error!("Backend call {} failed: {}", self.iterations + 1, err);
                State::Aborted(err)
            }
            (
                State::ExecutingTools {
                    text,
                    calls,
                    index,
                    phase: Phase::Confirm,
                    mut results,
                },
                Event::Confirmed(verdict),
            ) => {
                if verdict.approved {
                    State::ExecutingTools {
                        text,
                        calls,
                        index,
                        phase: Phase::Execute,
                        results,
                    }
                } else {
                    let call = &calls[index];
                    let content = match &verdict.feedback {
                        Some(feedback) => format!("{} Feedback: {}", REJECTED_NOTICE, feedback),
                        None => REJECTED_NOTICE.to_string(),
                    };
                    info!("Tool call {} rejected", call.name);
                    self.execution_log.push(format!(
                        "{} -> rejected{}",
                        call.summary(),
                        verdict.feedback.map(|f| format!(": {}", f)).unwrap_or_default()
                    ));
                    results.push(ToolResult::error(&call.id, content));
                    self.advance(text, calls, index, results)
                }
            }
            (
                State::ExecutingTools {
                    text,
                    calls,
                    index,
                    phase: Phase::Execute,
                    mut results,
                },
                Event::Executed(mut result),
            ) => {
                let call = &calls[index];
                // Results are keyed by the originating call, whatever the executor reported
                result.tool_use_id = call.id.clone();
                self.execution_log.push(log_line(call, &result));
                results.push(result);
                self.advance(text, calls, index, results)
            }
            (state, event) => {
                warn!("Ignoring tool loop event {:?} in state {:?}", event, state);
                state
            }
        };
    }

    fn on_model_reply(&mut self, response: ChatResponse) -> State {
        self.iterations += 1;
        self.usage.add(&response.usage);
        if let Some(thinking) = response.thinking.filter(|t| !t.trim().is_empty()) {
            self.thinking.push(thinking);
        }
        self.reasoning = response.thinking_blocks;
        if response.model.is_some() {
            self.model = response.model;
        }
        if !response.text.trim().is_empty() {
            self.partial.push(response.text.clone());
        }

        debug!(
            "Model call {} returned {} chars, {} tool calls",
            self.iterations,
            response.text.len(),
            response.tool_calls.len()
        );

        if response.tool_calls.is_empty() {
            self.final_text = response.text;
            return State::Done;
        }

        if self.iterations >= self.max_iterations {
            let warning = format!(
                "Stopped after {} model calls; {} tool calls left unexecuted",
                self.iterations,
                response.tool_calls.len()
            );
            warn!("{}", warning);
            self.warnings.push(warning);
            self.final_text = self.partial.join("\n\n");
            return State::Done;
        }

        let phase = self.phase_for(&response.tool_calls[0]);
        State::ExecutingTools {
            text: response.text,
            calls: response.tool_calls,
            index: 0,
            phase,
            results: Vec::new(),
        }
    }

    fn advance(&mut self, text: String, calls: Vec<ToolCall>, index: usize, results: Vec<ToolResult>) -> State {
        let next = index + 1;
        if next < calls.len() {
            let phase = self.phase_for(&calls[next]);
            return State::ExecutingTools {
                text,
                calls,
                index: next,
                phase,
                results,
            };
        }

        let mut request = std::mem::take(&mut self.reasoning);
        if !text.trim().is_empty() {
            request.push(Part::text(text));
        }
        request.extend(calls.into_iter().map(Part::ToolUse));
        self.turns.push(ConversationTurn::with_parts(Role::Assistant, request));
        self.turns.push(ConversationTurn::with_parts(
            Role::User,
            results.into_iter().map(Part::ToolResult).collect(),
        ));
        State::AwaitingModel
    }

    fn phase_for(&self, call: &ToolCall) -> Phase {
        if self.safe_tools.contains(&call.name) {
            Phase::Execute
        } else {
            Phase::Confirm
        }
    }

    /// Consume the finished machine.
    pub fn into_outcome(self) -> Result<LoopOutcome, LoopFailure> {
        match self.state {
            State::Aborted(source) => Err(LoopFailure {
                source,
                execution_log: self.execution_log,
                usage: self.usage,
            }),
            _ => Ok(LoopOutcome {
                final_text: self.final_text,
                usage: self.usage,
                thinking: (!self.thinking.is_empty()).then(|| self.thinking.join("\n\n")),
                model: self.model,
                execution_log: self.execution_log,
                warnings: self.warnings,
                iterations: self.iterations,
            }),
        }
    }
}

fn log_line(call: &ToolCall, result: &ToolResult) -> String {
    if result.is_error {
        let first = result.content.lines().next().unwrap_or_default();
        format!("{} -> error: {}", call.summary(), first)
    } else {
        format!("{} -> ok", call.summary())
    }
}

/// Drive a `ToolLoop` to completion.
///
/// `options.tools` is replaced by the executor's definitions.
pub async fn run<B, G>(
    turns: Vec<ConversationTurn>,
    backend: &B,
    executor: &ToolExecutor,
    gate: &G,
    options: &ChatOptions,
    max_iterations: u32,
) -> Result<LoopOutcome, LoopFailure>
where
    B: ChatBackend + ?Sized,
    G: ConfirmationGate + ?Sized,
{
    let definitions = executor.definitions();
    let safe_tools = definitions.iter().filter(|d| d.safe).map(|d| d.name.clone()).collect();
    let options = ChatOptions {
        tools: definitions,
        ..options.clone()
    };

    let mut machine = ToolLoop::new(turns, safe_tools, max_iterations);
    loop {
        let event = match machine.next_step() {
            Step::CallModel => match backend.chat(machine.turns(), &options).await {
                Ok(response) => Event::ModelReplied(response),
                Err(err) => Event::ModelFailed(err),
            },
            Step::Confirm(call) => Event::Confirmed(gate.request(&call, &call.summary()).await),
            Step::Execute(call) => Event::Executed(executor.execute(&call).await),
            Step::Finished => break,
        };
        machine.apply(event);
    }

    info!("Tool loop finished after {} model calls", machine.iterations());
    machine.into_outcome()
}
