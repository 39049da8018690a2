//! Hand-written scanner for the tag grammar.
//!
//! ```text
//! open   := '<' name '!' value? '>'
//! name   := [a-z][a-z0-9_]*
//! value  := '"' (escaped char | [^"])* '"' | '[[' [^\]\n]* ']]' | ('\ ' | [^>\s])+
//! paired := open inner '</' name '!>'     (first closer with the same name)
//! single := open                          (no same-name closer anywhere after)
//! ```
//!
//! Anything that does not match stays literal text. Same-name nesting is not
//! balanced: the first closer ends the region.

use log::trace;

use super::Tag;

/// The opening marker of a tag, before pairing is decided.
struct OpenMarker {
    name: String,
    value: Option<String>,
    end: usize,
}

/// Scan `text` for top-level tags, left to right.
pub fn scan(text: &str) -> Vec<Tag> {
    let mut tags = Vec::new();
    let mut pos = 0;

    while let Some(offset) = text[pos..].find('<') {
        let start = pos + offset;
        match parse_tag(text, start) {
            Some(tag) => {
                pos = tag.span.end;
                tags.push(tag);
            }
            None => pos = start + 1,
        }
    }

    trace!("Scanned {} tags", tags.len());
    tags
}

fn parse_tag(text: &str, start: usize) -> Option<Tag> {
    let open = parse_open(text, start)?;
    let closer = format!("</{}!>", open.name);

    match text[open.end..].find(&closer) {
        Some(rel) => {
            let inner_end = open.end + rel;
            Some(Tag {
                inner: Some(text[open.end..inner_end].to_string()),
                span: start..inner_end + closer.len(),
                name: open.name,
                value: open.value,
            })
        }
        None => Some(Tag {
            inner: None,
            span: start..open.end,
            name: open.name,
            value: open.value,
        }),
    }
}

fn parse_open(text: &str, start: usize) -> Option<OpenMarker> {
    let bytes = text.as_bytes();
    let mut i = start + 1;

    if !bytes.get(i)?.is_ascii_lowercase() {
        return None;
    }
    while bytes
        .get(i)
        .is_some_and(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'_')
    {
        i += 1;
    }
    let name = text[start + 1..i].to_string();

    if bytes.get(i) != Some(&b'!') {
        return None;
    }
    i += 1;

    let (value, after) = match bytes.get(i) {
        Some(b'"') => parse_quoted(text, i)?,
        Some(b'[') if text[i..].starts_with("[[") => parse_wikilink(text, i)?,
        _ => parse_bare(text, i),
    };

    if bytes.get(after) != Some(&b'>') {
        return None;
    }

    Some(OpenMarker {
        name,
        value,
        end: after + 1,
    })
}

/// `"..."` starting at the opening quote. Returns the unescaped value and the
/// index just past the closing quote.
fn parse_quoted(text: &str, quote: usize) -> Option<(Option<String>, usize)> {
    let mut value = String::new();
    let mut chars = text[quote + 1..].char_indices();

    while let Some((offset, c)) = chars.next() {
        match c {
            '\\' => {
                let (_, escaped) = chars.next()?;
                value.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    other => other,
                });
            }
            '"' => return Some((Some(value), quote + 1 + offset + 1)),
            _ => value.push(c),
        }
    }

    None
}

/// `[[target]]` starting at the first bracket; the brackets stay in the value.
fn parse_wikilink(text: &str, open: usize) -> Option<(Option<String>, usize)> {
    let close = text[open + 2..].find("]]")? + open + 2;
    let target = &text[open + 2..close];
    if target.contains('\n') || target.contains('[') {
        return None;
    }
    let end = close + 2;
    Some((Some(text[open..end].to_string()), end))
}

/// Bare token up to `>` or whitespace; `\ ` is an escaped space.
fn parse_bare(text: &str, from: usize) -> (Option<String>, usize) {
    let rest = &text[from..];
    let mut value = String::new();
    let mut end = rest.len();
    let mut chars = rest.char_indices().peekable();

    while let Some((offset, c)) = chars.next() {
        if c == '>' || c.is_whitespace() {
            end = offset;
            break;
        }
        if c == '\\' && matches!(chars.peek(), Some((_, ' '))) {
            chars.next();
            value.push(' ');
            continue;
        }
        value.push(c);
    }

    let value = if value.is_empty() { None } else { Some(value) };
    (value, from + end)
}
