//! Conversation turn model shared by the transcript builder, tool loop and
//! backend adapters.

use serde::{Deserialize, Serialize};

use crate::llm::{ToolCall, ToolResult};

/// Role in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One piece of multipart turn content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Part {
    Text { text: String },
    Image { data: Vec<u8>, media_type: String },
    Document { data: Vec<u8> },
    ToolUse(ToolCall),
    ToolResult(ToolResult),
    /// Signed reasoning from an earlier response, sent back unchanged
    Thinking { thinking: String, signature: String },
    RedactedThinking { data: String },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Part::Text { .. })
    }
}

/// Turn content: plain text, or an ordered list of parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TurnContent {
    Text(String),
    Parts(Vec<Part>),
}

/// A role-tagged conversational unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: TurnContent,
}

impl ConversationTurn {
    /// Create a user turn
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: TurnContent::Text(text.into()),
        }
    }

    /// Create an assistant turn
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: TurnContent::Text(text.into()),
        }
    }

    pub fn with_parts(role: Role, parts: Vec<Part>) -> Self {
        Self {
            role,
            content: TurnContent::Parts(parts),
        }
    }

    /// All text of the turn, parts joined by newlines.
    pub fn text(&self) -> String {
        match &self.content {
            TurnContent::Text(text) => text.clone(),
            TurnContent::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    Part::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    /// Whether any part is something other than text.
    pub fn has_non_text_parts(&self) -> bool {
        match &self.content {
            TurnContent::Text(_) => false,
            TurnContent::Parts(parts) => parts.iter().any(|p| !p.is_text()),
        }
    }

    /// Convert text content into parts: the text first, then `extra`.
    pub fn attach(&mut self, extra: Vec<Part>) {
        let mut parts = match std::mem::replace(&mut self.content, TurnContent::Parts(Vec::new())) {
            TurnContent::Text(text) => vec![Part::Text { text }],
            TurnContent::Parts(parts) => parts,
        };
        parts.extend(extra);
        self.content = TurnContent::Parts(parts);
    }
}
