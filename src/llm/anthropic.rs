//! Anthropic API backend
//!
//! Maps conversation turns onto the Messages API and parses text, thinking
//! and tool_use blocks back into a `ChatResponse`.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use log::debug;
use reqwest::Client;
use serde_json::{Value, json};

use super::client::{ChatBackend, LlmError};
use super::types::{ChatOptions, ChatResponse, StopReason, ToolCall, Usage};
use crate::transcript::{ConversationTurn, Part, Role, TurnContent};

/// Anthropic API base URL
const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";

/// Anthropic API version
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Default model to use
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Default max tokens
const DEFAULT_MAX_TOKENS: u32 = 8192;

/// Headroom above the thinking budget reserved for the visible answer
const THINKING_HEADROOM: u32 = 1024;

/// Configuration for the Anthropic backend
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    pub model: String,
    pub max_tokens: u32,
    pub timeout: Duration,
    pub api_key_env: String,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout: Duration::from_secs(300),
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
        }
    }
}

impl AnthropicConfig {
    /// Create a new config with a specific model
    pub fn with_model(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }
}

/// Anthropic Messages API backend
pub struct AnthropicBackend {
    client: Client,
    api_key: String,
    config: AnthropicConfig,
}

impl AnthropicBackend {
    /// Create a backend reading the API key from `config.api_key_env`
    pub fn new(config: AnthropicConfig) -> Result<Self, LlmError> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| LlmError::MissingApiKey {
            env_var: config.api_key_env.clone(),
        })?;

        Self::with_api_key(api_key, config)
    }

    /// Create a backend with an explicit API key
    pub fn with_api_key(api_key: String, config: AnthropicConfig) -> Result<Self, LlmError> {
        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            api_key,
            config,
        })
    }

    /// Build the request body for the Messages API
    fn build_request(&self, turns: &[ConversationTurn], options: &ChatOptions) -> Value {
        let model = if options.model.is_empty() {
            self.config.model.as_str()
        } else {
            options.model.as_str()
        };

        let mut max_tokens = options.max_tokens.unwrap_or(self.config.max_tokens);
        if let Some(budget) = options.thinking_budget {
            max_tokens = max_tokens.max(budget.saturating_add(THINKING_HEADROOM));
        }

        let messages: Vec<Value> = turns
            .iter()
            .map(|t| {
                json!({
                    "role": match t.role {
                        Role::User => "user",
                        Role::Assistant => "assistant",
                    },
                    "content": content_to_json(&t.content)
                })
            })
            .collect();

        let mut body = json!({
            "model": model,
            "max_tokens": max_tokens,
            "messages": messages
        });

        if let Some(system) = options.system_prompt.as_deref().filter(|s| !s.is_empty()) {
            body["system"] = json!(system);
        }

        // Extended thinking only accepts the default temperature
        match options.thinking_budget {
            Some(budget) => {
                body["thinking"] = json!({ "type": "enabled", "budget_tokens": budget });
            }
            None => {
                if let Some(temperature) = options.temperature {
                    body["temperature"] = json!(temperature);
                }
            }
        }

        if !options.tools.is_empty() {
            let tools: Vec<Value> = options.tools.iter().map(|t| t.to_anthropic_schema()).collect();
            body["tools"] = json!(tools);
        }

        body
    }

    /// Parse the API response into a ChatResponse
    fn parse_response(&self, body: Value) -> Result<ChatResponse, LlmError> {
        let blocks = body["content"]
            .as_array()
            .ok_or_else(|| LlmError::InvalidResponse("missing content array".to_string()))?;

        let stop_reason = match body["stop_reason"].as_str() {
            Some("tool_use") => StopReason::ToolUse,
            Some("max_tokens") => StopReason::MaxTokens,
            Some("stop_sequence") => StopReason::StopSequence,
            _ => StopReason::EndTurn,
        };

        let usage = Usage::new(
            body["usage"]["input_tokens"].as_u64().unwrap_or(0),
            body["usage"]["output_tokens"].as_u64().unwrap_or(0),
        );

        let mut text = String::new();
        let mut thinking = String::new();
        let mut thinking_blocks = Vec::new();
        let mut tool_calls = Vec::new();

        for block in blocks {
            match block["type"].as_str() {
                Some("text") => {
                    if let Some(t) = block["text"].as_str() {
                        if !text.is_empty() {
                            text.push('\n');
                        }
                        text.push_str(t);
                    }
                }
                Some("thinking") => {
                    if let Some(t) = block["thinking"].as_str() {
                        if !thinking.is_empty() {
                            thinking.push('\n');
                        }
                        thinking.push_str(t);
                        if let Some(signature) = block["signature"].as_str() {
                            thinking_blocks.push(Part::Thinking {
                                thinking: t.to_string(),
                                signature: signature.to_string(),
                            });
                        }
                    }
                }
                Some("redacted_thinking") => {
                    if let Some(data) = block["data"].as_str() {
                        thinking_blocks.push(Part::RedactedThinking { data: data.to_string() });
                    }
                }
                Some("tool_use") => {
                    let id = block["id"]
                        .as_str()
                        .ok_or_else(|| LlmError::InvalidResponse("tool_use block without id".to_string()))?;
                    let name = block["name"]
                        .as_str()
                        .ok_or_else(|| LlmError::InvalidResponse("tool_use block without name".to_string()))?;
                    tool_calls.push(ToolCall::new(id, name, block["input"].clone()));
                }
                other => debug!("Skipping content block of type {:?}", other),
            }
        }

        Ok(ChatResponse {
            text,
            tool_calls,
            usage,
            thinking: (!thinking.is_empty()).then_some(thinking),
            thinking_blocks,
            model: body["model"].as_str().map(String::from),
            stop_reason,
        })
    }

    /// Send a request to the Messages API
    async fn send_request(&self, body: Value) -> Result<Value, LlmError> {
        let response = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();

        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(LlmError::RateLimited {
                retry_after: Duration::from_secs(retry_after),
            });
        }

        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(LlmError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl ChatBackend for AnthropicBackend {
    async fn chat(&self, turns: &[ConversationTurn], options: &ChatOptions) -> Result<ChatResponse, LlmError> {
        let body = self.build_request(turns, options);
        debug!("Sending {} turns to {}", turns.len(), body["model"]);
        let response = self.send_request(body).await?;
        self.parse_response(response)
    }
}

impl std::fmt::Debug for AnthropicBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicBackend")
            .field("model", &self.config.model)
            .field("max_tokens", &self.config.max_tokens)
            .finish()
    }
}

fn content_to_json(content: &TurnContent) -> Value {
    match content {
        TurnContent::Text(text) => json!(text),
        TurnContent::Parts(parts) => Value::Array(parts.iter().map(part_to_json).collect()),
    }
}

fn part_to_json(part: &Part) -> Value {
    match part {
        Part::Text { text } => json!({ "type": "text", "text": text }),
        Part::Image { data, media_type } => json!({
            "type": "image",
            "source": {
                "type": "base64",
                "media_type": media_type,
                "data": STANDARD.encode(data)
            }
        }),
        Part::Document { data } => json!({
            "type": "document",
            "source": {
                "type": "base64",
                "media_type": "application/pdf",
                "data": STANDARD.encode(data)
            }
        }),
        Part::ToolUse(call) => json!({
            "type": "tool_use",
            "id": call.id,
            "name": call.name,
            "input": call.input
        }),
        Part::ToolResult(result) => json!({
            "type": "tool_result",
            "tool_use_id": result.tool_use_id,
            "content": result.content,
            "is_error": result.is_error
        }),
        Part::Thinking { thinking, signature } => json!({
            "type": "thinking",
            "thinking": thinking,
            "signature": signature
        }),
        Part::RedactedThinking { data } => json!({ "type": "redacted_thinking", "data": data }),
    }
}
