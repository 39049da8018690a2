//! Tool loop - alternates model calls and tool executions for one block.
//!
//! This module provides:
//! - `ToolLoop`, the synchronous state machine
//! - `run`, the async driver over a backend, executor and confirmation gate
//! - `LoopOutcome` / `LoopFailure` for the two ways a loop ends

mod tool_loop;

pub use tool_loop::{DEFAULT_MAX_ITERATIONS, Event, LoopFailure, LoopOutcome, Step, ToolLoop, run};
