//! LLM backend layer
//!
//! This module provides:
//! - Request/response types for backend communication
//! - ChatBackend trait for vendor abstraction
//! - AnthropicBackend implementation
//! - MockBackend for tests

pub mod anthropic;
pub mod client;
pub mod mock;
pub mod types;

pub use anthropic::{AnthropicBackend, AnthropicConfig};
pub use client::{ChatBackend, LlmError};
pub use mock::{MockBackend, RecordedRequest};
pub use types::{ChatOptions, ChatResponse, StopReason, ToolCall, ToolDefinition, ToolResult, Usage};
