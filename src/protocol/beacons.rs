//! The sentinel set and the canonical formatters built from it.

use super::TokenRecord;

/// Literal sentinels of the canonical protocol.
///
/// One immutable value is handed to everything that reads or writes
/// canonical text; there are no module-level string constants to drift apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Beacons {
    /// Start of an assistant turn (includes the trailing newline)
    pub assistant: &'static str,
    /// Start of a user turn (includes the trailing newline)
    pub user: &'static str,
    pub think_open: &'static str,
    pub think_close: &'static str,
    pub error_open: &'static str,
    pub error_close: &'static str,
    pub tools_open: &'static str,
    pub tools_close: &'static str,
    /// Stands in for a consumed `<reply!>` marker while the block is processed
    pub processing: &'static str,
    pub tokens_prefix: &'static str,
    pub tokens_suffix: &'static str,
}

impl Beacons {
    /// The canonical sentinel set.
    pub const CANONICAL: Beacons = Beacons {
        assistant: "|AI|\n",
        user: "|ME|\n",
        think_open: "|THINK|",
        think_close: "|/THINK|",
        error_open: "|ERROR|",
        error_close: "|/ERROR|",
        tools_open: "|TOOLS|",
        tools_close: "|/TOOLS|",
        processing: "|PROCESSING|",
        tokens_prefix: "|==",
        tokens_suffix: "|==",
    };

    /// Assistant turn start, followed by the accounting line when known.
    pub fn assistant_header(&self, record: Option<&TokenRecord>) -> String {
        match record {
            Some(record) => format!("{}{}\n", self.assistant, self.token_line(record)),
            None => self.assistant.to_string(),
        }
    }

    pub fn user_header(&self) -> String {
        self.user.to_string()
    }

    /// `|==[model|]In=<n>,Out=<n>[,Cost=<f>]|==`
    pub fn token_line(&self, record: &TokenRecord) -> String {
        format!("{}{}{}", self.tokens_prefix, record.body(), self.tokens_suffix)
    }

    /// Parse an accounting line at the start of `text`.
    ///
    /// Returns the record and the number of bytes consumed.
    pub fn parse_token_line(&self, text: &str) -> Option<(TokenRecord, usize)> {
        let rest = text.strip_prefix(self.tokens_prefix)?;
        let end = rest.find(self.tokens_suffix)?;
        let body = &rest[..end];
        if body.contains('\n') {
            return None;
        }
        let record = TokenRecord::parse_body(body)?;
        Some((record, self.tokens_prefix.len() + end + self.tokens_suffix.len()))
    }

    pub fn thinking_block(&self, text: &str) -> String {
        wrap(self.think_open, text, self.think_close)
    }

    pub fn error_block(&self, message: &str) -> String {
        wrap(self.error_open, message, self.error_close)
    }

    pub fn tool_block(&self, log: &str) -> String {
        wrap(self.tools_open, log, self.tools_close)
    }

    /// Respell every sentinel in foreign text in lowercase, including whole
    /// accounting lines, so the text reads back as prose.
    pub fn neutralize(&self, text: &str) -> String {
        let mut out = text.to_string();
        for sentinel in [
            self.assistant,
            self.user,
            self.processing,
            self.think_open,
            self.think_close,
            self.error_open,
            self.error_close,
            self.tools_open,
            self.tools_close,
        ] {
            if out.contains(sentinel) {
                out = out.replace(sentinel, &sentinel.to_lowercase());
            }
        }

        let mut result = String::with_capacity(out.len());
        let mut rest = out.as_str();
        while let Some(at) = rest.find(self.tokens_prefix) {
            result.push_str(&rest[..at]);
            let tail = &rest[at..];
            let used = match self.parse_token_line(tail) {
                Some((_, used)) => {
                    result.push_str(&tail[..used].to_lowercase());
                    used
                }
                None => {
                    result.push_str(self.tokens_prefix);
                    self.tokens_prefix.len()
                }
            };
            rest = &tail[used..];
        }
        result.push_str(rest);
        result
    }

    /// Paired presentation-only sections, as (open, close) pairs.
    pub fn metadata_sections(&self) -> [(&'static str, &'static str); 3] {
        [
            (self.think_open, self.think_close),
            (self.error_open, self.error_close),
            (self.tools_open, self.tools_close),
        ]
    }
}

impl Default for Beacons {
    fn default() -> Self {
        Self::CANONICAL
    }
}

fn wrap(open: &str, body: &str, close: &str) -> String {
    format!("{}\n{}\n{}\n", open, body.trim_end_matches('\n'), close)
}
