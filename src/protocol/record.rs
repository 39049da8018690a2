//! Token accounting record carried in an assistant header.

use serde::{Deserialize, Serialize};

/// `{model, inputTokens, outputTokens, cost?}` as written after `|AI|`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenRecord {
    /// Model that answered; empty when the backend did not report one
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost: Option<f64>,
}

impl TokenRecord {
    /// Create a record, pricing it when the model is in the price table.
    pub fn new(model: impl Into<String>, input_tokens: u64, output_tokens: u64) -> Self {
        let model = model.into();
        let cost = price_per_million(&model).map(|(input_price, output_price)| {
            let cost = (input_tokens as f64 / 1_000_000.0) * input_price
                + (output_tokens as f64 / 1_000_000.0) * output_price;
            (cost * 1_000_000.0).round() / 1_000_000.0
        });
        Self {
            model,
            input_tokens,
            output_tokens,
            cost,
        }
    }

    /// The text between the accounting prefix and suffix.
    pub(crate) fn body(&self) -> String {
        let mut body = String::new();
        if !self.model.is_empty() {
            body.push_str(&self.model);
            body.push('|');
        }
        body.push_str(&format!("In={},Out={}", self.input_tokens, self.output_tokens));
        if let Some(cost) = self.cost {
            body.push_str(&format!(",Cost={}", cost));
        }
        body
    }

    pub(crate) fn parse_body(body: &str) -> Option<Self> {
        let (model, counts) = match body.split_once('|') {
            Some((model, counts)) => (model, counts),
            None => ("", body),
        };

        let mut fields = counts.split(',');
        let input_tokens = fields.next()?.strip_prefix("In=")?.parse().ok()?;
        let output_tokens = fields.next()?.strip_prefix("Out=")?.parse().ok()?;
        let cost = match fields.next() {
            Some(field) => Some(field.strip_prefix("Cost=")?.parse().ok()?),
            None => None,
        };
        if fields.next().is_some() {
            return None;
        }

        Some(Self {
            model: model.to_string(),
            input_tokens,
            output_tokens,
            cost,
        })
    }
}

/// (input, output) USD price per million tokens for known model families.
pub fn price_per_million(model: &str) -> Option<(f64, f64)> {
    match model {
        "" => None,
        m if m.contains("opus") => Some((15.0, 75.0)),
        m if m.contains("sonnet") => Some((3.0, 15.0)),
        m if m.contains("haiku") => Some((0.80, 4.0)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_prices_known_model() {
        let record = TokenRecord::new("claude-sonnet-4-20250514", 1_000_000, 100_000);
        // $3 input + $1.50 output
        assert_eq!(record.cost, Some(4.5));
    }

    #[test]
    fn test_new_leaves_unknown_model_unpriced() {
        assert_eq!(TokenRecord::new("local-llama", 10, 10).cost, None);
        assert_eq!(TokenRecord::new("", 10, 10).cost, None);
    }

    #[test]
    fn test_cost_is_rounded() {
        let record = TokenRecord::new("claude-haiku-3-5", 1, 1);
        assert_eq!(record.cost, Some(0.000005));
    }

    #[test]
    fn test_body_without_model() {
        assert_eq!(TokenRecord::new("", 5, 2).body(), "In=5,Out=2");
    }

    #[test]
    fn test_parse_body_with_cost() {
        let record = TokenRecord::parse_body("m|In=1,Out=2,Cost=0.5").unwrap();
        assert_eq!(record.model, "m");
        assert_eq!(record.cost, Some(0.5));
    }

    #[test]
    fn test_parse_body_rejects_extra_fields() {
        assert!(TokenRecord::parse_body("In=1,Out=2,Cost=0.5,Extra=1").is_none());
        assert!(TokenRecord::parse_body("In=x,Out=2").is_none());
        assert!(TokenRecord::parse_body("Out=2,In=1").is_none());
    }
}
