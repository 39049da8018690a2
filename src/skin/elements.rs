//! Presentation element model shared by every skin, and its canonical
//! reading/writing.

use crate::protocol::{Beacons, TokenRecord};

/// One structural piece of a document, independent of how a skin draws it.
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    /// Ordinary document text, kept byte for byte
    Text(String),
    /// Start of an assistant turn with its accounting record
    Assistant(Option<TokenRecord>),
    User,
    /// Raw section bodies, including surrounding newlines
    Thinking(String),
    Tools(String),
    Error(String),
    Processing,
}

/// Append text, merging with a preceding text element.
pub(crate) fn push_text(elements: &mut Vec<Element>, text: &str) {
    if text.is_empty() {
        return;
    }
    match elements.last_mut() {
        Some(Element::Text(last)) => last.push_str(text),
        _ => elements.push(Element::Text(text.to_string())),
    }
}

/// Read canonical text into elements.
///
/// Anything that is not a complete sentinel structure stays text, so
/// `render_canonical(&parse_canonical(d)) == d` for every input.
pub fn parse_canonical(doc: &str, beacons: &Beacons) -> Vec<Element> {
    let mut elements = Vec::new();
    let mut pos = 0;

    while let Some(offset) = doc[pos..].find('|') {
        let at = pos + offset;
        push_text(&mut elements, &doc[pos..at]);
        match match_canonical(&doc[at..], beacons) {
            Some((element, used)) => {
                elements.push(element);
                pos = at + used;
            }
            None => {
                push_text(&mut elements, "|");
                pos = at + 1;
            }
        }
    }

    push_text(&mut elements, &doc[pos..]);
    elements
}

fn match_canonical(rest: &str, b: &Beacons) -> Option<(Element, usize)> {
    if let Some(after) = rest.strip_prefix(b.assistant) {
        // Only a record that re-renders identically is lifted out of the text
        let record = b.parse_token_line(after).filter(|(record, used)| {
            after[*used..].starts_with('\n') && b.token_line(record) == after[..*used]
        });
        return Some(match record {
            Some((record, used)) => (Element::Assistant(Some(record)), b.assistant.len() + used + 1),
            None => (Element::Assistant(None), b.assistant.len()),
        });
    }
    if rest.starts_with(b.user) {
        return Some((Element::User, b.user.len()));
    }
    if rest.starts_with(b.processing) {
        return Some((Element::Processing, b.processing.len()));
    }

    let sections: [(&str, &str, fn(String) -> Element); 3] = [
        (b.think_open, b.think_close, Element::Thinking),
        (b.tools_open, b.tools_close, Element::Tools),
        (b.error_open, b.error_close, Element::Error),
    ];
    for (open, close, make) in sections {
        if let Some(body) = rest.strip_prefix(open) {
            if let Some(end) = body.find(close) {
                return Some((make(body[..end].to_string()), open.len() + end + close.len()));
            }
        }
    }
    None
}

/// Write elements as canonical text.
pub fn render_canonical(elements: &[Element], b: &Beacons) -> String {
    let mut out = String::new();
    for element in elements {
        match element {
            Element::Text(text) => out.push_str(text),
            Element::Assistant(record) => out.push_str(&b.assistant_header(record.as_ref())),
            Element::User => out.push_str(b.user),
            Element::Thinking(body) => push_section(&mut out, b.think_open, body, b.think_close),
            Element::Tools(body) => push_section(&mut out, b.tools_open, body, b.tools_close),
            Element::Error(body) => push_section(&mut out, b.error_open, body, b.error_close),
            Element::Processing => out.push_str(b.processing),
        }
    }
    out
}

fn push_section(out: &mut String, open: &str, body: &str, close: &str) {
    out.push_str(open);
    out.push_str(body);
    out.push_str(close);
}

#[cfg(test)]
mod tests {
    use super::*;

    const B: Beacons = Beacons::CANONICAL;

    #[test]
    fn test_parse_answer_block() {
        let doc = "<ai!>Hello|AI|\n|==In=5,Out=2|==\nHi\n|ME|\n</ai!>";
        let elements = parse_canonical(doc, &B);
        assert_eq!(
            elements,
            vec![
                Element::Text("<ai!>Hello".to_string()),
                Element::Assistant(Some(TokenRecord::new("", 5, 2))),
                Element::Text("Hi\n".to_string()),
                Element::User,
                Element::Text("</ai!>".to_string()),
            ]
        );
        assert_eq!(render_canonical(&elements, &B), doc);
    }

    #[test]
    fn test_sections_keep_raw_body() {
        let doc = format!("x{}{}", B.thinking_block("deep"), B.error_block("boom"));
        let elements = parse_canonical(&doc, &B);
        assert_eq!(elements[1], Element::Thinking("\ndeep\n".to_string()));
        assert_eq!(elements[3], Element::Error("\nboom\n".to_string()));
        assert_eq!(render_canonical(&elements, &B), doc);
    }

    #[test]
    fn test_non_normal_record_stays_text() {
        let doc = "|AI|\n|==In=05,Out=2|==\nHi";
        let elements = parse_canonical(doc, &B);
        assert_eq!(elements[0], Element::Assistant(None));
        assert_eq!(render_canonical(&elements, &B), doc);
    }

    #[test]
    fn test_partial_sentinels_are_text() {
        let doc = "a | b |AI| c |THINK| unterminated |/THINK";
        assert_eq!(parse_canonical(doc, &B), vec![Element::Text(doc.to_string())]);
    }

    #[test]
    fn test_processing() {
        let elements = parse_canonical("before|PROCESSING|after", &B);
        assert_eq!(elements[1], Element::Processing);
        assert_eq!(elements.len(), 3);
    }
}
