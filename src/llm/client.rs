//! Chat backend trait and its error type

use async_trait::async_trait;
use std::time::Duration;

use super::{ChatOptions, ChatResponse};
use crate::transcript::ConversationTurn;

/// A chat backend. Each call is independent; the caller owns the turns.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// One model call over the full conversation so far
    async fn chat(&self, turns: &[ConversationTurn], options: &ChatOptions) -> Result<ChatResponse, LlmError>;
}

/// Errors that can occur during LLM operations
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Missing API key: environment variable {env_var} not set")]
    MissingApiKey { env_var: String },
}

impl LlmError {
    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            LlmError::MissingApiKey { .. } | LlmError::ApiError { status: 401 | 403, .. }
        )
    }
}
