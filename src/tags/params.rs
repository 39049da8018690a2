//! Per-block parameter tags (`<model!…>`, `<temperature!…>`, ...).

use log::{debug, warn};
use std::str::FromStr;

use super::{Tag, rewrite};

/// Settings a block overrides through parameter tags.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockParams {
    pub model: Option<String>,
    pub system: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub thinking_budget: Option<u32>,
    /// Enabled toolsets; `Some(vec![])` disables tools for the block
    pub toolsets: Option<Vec<String>>,
    pub max_iterations: Option<u32>,
}

/// Strip parameter tags from `text` and collect their values.
///
/// A parameter tag whose value does not parse stays in the text verbatim.
pub fn extract_params(text: &str) -> (String, BlockParams) {
    let mut params = BlockParams::default();

    let (stripped, _) = rewrite(text, |tag| {
        let value = tag.value.as_deref().map(str::trim);
        let consumed = match tag.name.as_str() {
            "model" => set_string(&mut params.model, value),
            "system" => set_string(&mut params.system, value.or(tag.inner.as_deref())),
            "temperature" => match value.and_then(|v| v.parse::<f32>().ok()) {
                Some(t) if (0.0..=2.0).contains(&t) => {
                    params.temperature = Some(t);
                    true
                }
                _ => false,
            },
            "max_tokens" => set_parsed(&mut params.max_tokens, value, tag),
            "think" => set_parsed(&mut params.thinking_budget, value, tag),
            "max_iterations" => set_parsed(&mut params.max_iterations, value, tag),
            "tools" => match value {
                Some(v) if !v.is_empty() => {
                    params.toolsets = Some(parse_toolsets(v));
                    true
                }
                _ => false,
            },
            _ => return None,
        };

        if consumed {
            Some(String::new())
        } else {
            warn!("Ignoring malformed parameter tag <{}!>", tag.name);
            None
        }
    });

    (stripped, params)
}

fn set_string(slot: &mut Option<String>, value: Option<&str>) -> bool {
    match value {
        Some(v) if !v.is_empty() => {
            *slot = Some(v.to_string());
            true
        }
        _ => false,
    }
}

fn set_parsed<T: FromStr>(slot: &mut Option<T>, value: Option<&str>, tag: &Tag) -> bool {
    match value.map(str::parse::<T>) {
        Some(Ok(parsed)) => {
            *slot = Some(parsed);
            true
        }
        _ => {
            debug!("Parameter <{}!> has unparseable value {:?}", tag.name, tag.value);
            false
        }
    }
}

fn parse_toolsets(value: &str) -> Vec<String> {
    if value.eq_ignore_ascii_case("none") {
        return Vec::new();
    }
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
