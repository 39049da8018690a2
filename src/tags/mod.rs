//! Inline tag markup - `<name!value>inner</name!>` and `<name!value>`.
//!
//! This module provides:
//! - `scan` to list the top-level tags of a text, left to right
//! - `rewrite` to splice handler output over those tags in one pass
//! - `extract_params` to collect the per-block parameter tags
//! - `escape` to turn markup in foreign text into its literal spelling
//!
//! Tag names are lowercase only. `<AI!>` is never a tag, which is how
//! documents show literal examples of the markup.

mod params;
mod scanner;

pub use params::{BlockParams, extract_params};
pub use scanner::scan;

use std::ops::Range;

/// One tag occurrence, recomputed on every scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub name: String,
    /// Unescaped quoted value, `[[wikilink]]` with brackets, or bare token
    pub value: Option<String>,
    /// Text between the opening and closing marker of a paired tag
    pub inner: Option<String>,
    /// Byte range of the whole tag in the scanned text
    pub span: Range<usize>,
}

impl Tag {
    pub fn is_paired(&self) -> bool {
        self.inner.is_some()
    }

    /// The literal source of this tag within the text it was scanned from.
    pub fn raw<'a>(&self, text: &'a str) -> &'a str {
        &text[self.span.clone()]
    }

    /// Byte offset where the inner text starts, for paired tags.
    pub fn inner_start(&self) -> Option<usize> {
        let inner = self.inner.as_ref()?;
        Some(self.span.end - format!("</{}!>", self.name).len() - inner.len())
    }
}

/// Replace tags with handler output.
///
/// All tags are located before the handler runs, and handler output is
/// never re-scanned. Returning `None` keeps the tag verbatim.
pub fn rewrite<F>(text: &str, mut handler: F) -> (String, Vec<Tag>)
where
    F: FnMut(&Tag) -> Option<String>,
{
    let tags = scan(text);
    let mut out = String::with_capacity(text.len());
    let mut last = 0;

    for tag in &tags {
        out.push_str(&text[last..tag.span.start]);
        match handler(tag) {
            Some(replacement) => out.push_str(&replacement),
            None => out.push_str(tag.raw(text)),
        }
        last = tag.span.end;
    }
    out.push_str(&text[last..]);

    (out, tags)
}

/// Uppercase the name of every tag marker in `text`, openers and closers
/// alike, so none of it scans as a tag.
pub fn escape(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    let mut pos = 0;

    while let Some(offset) = text[pos..].find('<') {
        let lt = pos + offset;
        pos = lt + 1;

        let start = if bytes.get(pos) == Some(&b'/') { pos + 1 } else { pos };
        if !bytes.get(start).is_some_and(|b| b.is_ascii_lowercase()) {
            continue;
        }
        let mut end = start;
        while bytes
            .get(end)
            .is_some_and(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'_')
        {
            end += 1;
        }
        if bytes.get(end) != Some(&b'!') {
            continue;
        }

        out.push_str(&text[last..start]);
        out.push_str(&text[start..end].to_ascii_uppercase());
        last = end;
        pos = end;
    }

    out.push_str(&text[last..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rewrite_without_tags_is_identity() {
        let text = "plain text with <html> and a ! mark </b>";
        let (out, tags) = rewrite(text, |_| Some("X".to_string()));
        assert_eq!(out, text);
        assert!(tags.is_empty());
    }

    #[test]
    fn test_rewrite_unhandled_passes_through() {
        let text = "a <x!1> b <y!2> c";
        let (out, tags) = rewrite(text, |tag| match tag.name.as_str() {
            "x" => Some("[x]".to_string()),
            _ => None,
        });
        assert_eq!(out, "a [x] b <y!2> c");
        assert_eq!(tags.len(), 2);
    }

    #[test]
    fn test_rewrite_output_is_not_rescanned() {
        let (out, tags) = rewrite("<x!>", |_| Some("<x!>".to_string()));
        assert_eq!(out, "<x!>");
        assert_eq!(tags.len(), 1);
    }

    #[test]
    fn test_rewrite_sees_original_spans() {
        let text = "<a!1>--<b!2>";
        let mut seen = Vec::new();
        rewrite(text, |tag| {
            seen.push(tag.span.clone());
            Some("longer replacement".to_string())
        });
        assert_eq!(seen, vec![0..5, 7..12]);
    }

    #[test]
    fn test_inner_start() {
        let text = "xx<ai!>Hello</ai!>";
        let tag = &scan(text)[0];
        let start = tag.inner_start().unwrap();
        assert_eq!(&text[start..start + 5], "Hello");
    }

    #[test]
    fn test_escape_leaves_nothing_to_scan() {
        let text = "Put <reply!> in <ai!>a block</ai!>, or link <doc![[Note]]>.";
        let escaped = escape(text);
        assert_eq!(escaped, "Put <REPLY!> in <AI!>a block</AI!>, or link <DOC![[Note]]>.");
        assert!(scan(&escaped).is_empty());
    }

    #[test]
    fn test_escape_keeps_other_angle_brackets() {
        let text = "a < b, <b>bold</b>, <x1> and <!-- note -->";
        assert_eq!(escape(text), text);
        assert_eq!(escape("<ai!"), "<AI!");
    }

    #[test]
    fn test_raw() {
        let text = "see <doc![[Note]]> here";
        let tag = &scan(text)[0];
        assert_eq!(tag.raw(text), "<doc![[Note]]>");
    }
}
