//! Markdown skin: headings for turns and collapsible `<details>` sections
//! for thinking, tool logs and errors.
//!
//! Turn headings are written after a blank-line gap; the gap is removed
//! again on reading. A heading typed by hand at the start of a line is
//! accepted without the gap.
//!
//! Document text that would read as one of these markers is written with
//! one more leading backslash, and reading drops it again.

use super::elements::push_text;
use super::{Element, Skin, render_canonical};
use crate::protocol::{Beacons, TokenRecord};

const GAP: &str = "\n\n";
const ASSISTANT: &str = "##### ✦ AI\n";
const USER: &str = "##### ✎ You\n";
const THINKING_OPEN: &str = "<details><summary>💭 Thinking</summary>";
const TOOLS_OPEN: &str = "<details><summary>🛠 Tools</summary>";
const ERROR_OPEN: &str = "<details open><summary>⚠️ Error</summary>";
const DETAILS_CLOSE: &str = "</details>";
const PROCESSING: &str = "⏳ *AI is working…*";
const FIELD_SEP: &str = " · ";
const ESCAPE: char = '\\';

/// Marker that document text must not contain unescaped at this position.
/// Headings only count at the start of a line, with or without their newline.
fn marker_at(rest: &str, line_start: bool) -> Option<&'static str> {
    let headings = [ASSISTANT, USER].map(|h| h.trim_end_matches('\n'));
    if line_start {
        if let Some(heading) = headings.into_iter().find(|h| rest.starts_with(h)) {
            return Some(heading);
        }
    }
    [PROCESSING, THINKING_OPEN, TOOLS_OPEN, ERROR_OPEN]
        .into_iter()
        .find(|m| rest.starts_with(m))
}

fn backslash_run(text: &str) -> usize {
    text.len() - text.trim_start_matches(ESCAPE).len()
}

/// Append document text, escaping every marker in it.
fn push_escaped(out: &mut String, text: &str) {
    let mut rest = text;
    while let Some(offset) = rest.find(|c: char| matches!(c, ESCAPE | '#' | '<' | '⏳')) {
        out.push_str(&rest[..offset]);
        let from = &rest[offset..];
        let run = backslash_run(from);
        let line_start = out.is_empty() || out.ends_with('\n');

        let used = match marker_at(&from[run..], line_start) {
            Some(marker) => {
                out.push(ESCAPE);
                run + marker.len()
            }
            None if run > 0 => run,
            None => from.chars().next().map_or(1, char::len_utf8),
        };
        out.push_str(&from[..used]);
        rest = &from[used..];
    }
    out.push_str(rest);
}

/// Whether `text` opens with a line that would read as an accounting record.
fn starts_like_record(text: &str) -> bool {
    let first = text.split('\n').next().unwrap_or_default();
    parse_record_line(&format!("{}\n", first)).is_some()
}

pub struct MarkdownSkin {
    beacons: Beacons,
}

impl MarkdownSkin {
    pub fn new(beacons: Beacons) -> Self {
        Self { beacons }
    }

    fn match_at(&self, doc: &str, at: usize) -> Option<(Element, usize)> {
        let rest = &doc[at..];
        let line_start = at == 0 || doc[..at].ends_with('\n');

        if line_start {
            if let Some(after) = rest.strip_prefix(ASSISTANT) {
                return Some(match parse_record_line(after) {
                    Some((record, used)) => (Element::Assistant(Some(record)), ASSISTANT.len() + used),
                    None => (Element::Assistant(None), ASSISTANT.len()),
                });
            }
            if rest.starts_with(USER) {
                return Some((Element::User, USER.len()));
            }
        }

        if rest.starts_with(PROCESSING) {
            return Some((Element::Processing, PROCESSING.len()));
        }

        let sections: [(&str, fn(String) -> Element); 3] = [
            (THINKING_OPEN, Element::Thinking),
            (TOOLS_OPEN, Element::Tools),
            (ERROR_OPEN, Element::Error),
        ];
        for (open, make) in sections {
            if let Some(body) = rest.strip_prefix(open) {
                if let Some(end) = body.find(DETAILS_CLOSE) {
                    return Some((make(body[..end].to_string()), open.len() + end + DETAILS_CLOSE.len()));
                }
            }
        }
        None
    }

    fn push_section(&self, out: &mut String, open: &str, body: &str, element: &Element) {
        // A body holding the closer would end early, and a backslash just
        // before the opener would escape it
        if body.contains(DETAILS_CLOSE) || out.ends_with(ESCAPE) {
            self.push_canonical(out, element);
            return;
        }
        out.push_str(open);
        out.push_str(body);
        out.push_str(DETAILS_CLOSE);
    }

    /// Canonical spelling inside a markdown document. It reads back as text,
    /// so section bodies are escaped like any other text.
    fn push_canonical(&self, out: &mut String, element: &Element) {
        let b = &self.beacons;
        let (open, body, close) = match element {
            Element::Thinking(body) => (b.think_open, body, b.think_close),
            Element::Tools(body) => (b.tools_open, body, b.tools_close),
            Element::Error(body) => (b.error_open, body, b.error_close),
            _ => {
                out.push_str(&render_canonical(std::slice::from_ref(element), b));
                return;
            }
        };
        out.push_str(open);
        push_escaped(out, body);
        out.push_str(close);
    }
}

impl Skin for MarkdownSkin {
    fn name(&self) -> &'static str {
        "markdown"
    }

    fn description(&self) -> &'static str {
        "headings and collapsible sections"
    }

    fn beacons(&self) -> &Beacons {
        &self.beacons
    }

    fn parse(&self, doc: &str) -> Vec<Element> {
        let mut elements = Vec::new();
        let mut pos = 0;
        let mut cursor = 0;

        while let Some(offset) = doc[cursor..].find(|c: char| matches!(c, ESCAPE | '#' | '<' | '⏳')) {
            let at = cursor + offset;
            let run = backslash_run(&doc[at..]);
            if run > 0 {
                let line_start = at == 0 || doc[..at].ends_with('\n');
                match marker_at(&doc[at + run..], line_start) {
                    Some(marker) => {
                        push_text(&mut elements, &doc[pos..at]);
                        push_text(&mut elements, &doc[at + 1..at + run + marker.len()]);
                        pos = at + run + marker.len();
                        cursor = pos;
                    }
                    None => cursor = at + run,
                }
                continue;
            }

            match self.match_at(doc, at) {
                Some((element, used)) => {
                    let mut text = &doc[pos..at];
                    if matches!(element, Element::Assistant(_) | Element::User) {
                        text = text.strip_suffix(GAP).unwrap_or(text);
                    }
                    push_text(&mut elements, text);
                    elements.push(element);
                    pos = at + used;
                    cursor = pos;
                }
                None => {
                    cursor = at + doc[at..].chars().next().map_or(1, char::len_utf8);
                }
            }
        }

        push_text(&mut elements, &doc[pos..]);
        elements
    }

    fn render(&self, elements: &[Element]) -> String {
        let mut out = String::new();
        for (i, element) in elements.iter().enumerate() {
            match element {
                Element::Text(text) => push_escaped(&mut out, text),
                Element::Assistant(record) => {
                    let line = record.as_ref().map(format_record_line);
                    let ambiguous = match &line {
                        Some(line) => parse_record_line(line).map(|(r, _)| r) != *record,
                        None => matches!(elements.get(i + 1), Some(Element::Text(next)) if starts_like_record(next)),
                    };
                    if ambiguous {
                        self.push_canonical(&mut out, element);
                        continue;
                    }
                    out.push_str(GAP);
                    out.push_str(ASSISTANT);
                    if let Some(line) = line {
                        out.push_str(&line);
                    }
                }
                Element::User => {
                    out.push_str(GAP);
                    out.push_str(USER);
                }
                Element::Thinking(body) => self.push_section(&mut out, THINKING_OPEN, body, element),
                Element::Tools(body) => self.push_section(&mut out, TOOLS_OPEN, body, element),
                Element::Error(body) => self.push_section(&mut out, ERROR_OPEN, body, element),
                Element::Processing if out.ends_with(ESCAPE) => self.push_canonical(&mut out, element),
                Element::Processing => out.push_str(PROCESSING),
            }
        }
        out
    }
}

/// `*model · In 5 · Out 2 · $0.0001*\n`
fn format_record_line(record: &TokenRecord) -> String {
    let mut fields = Vec::new();
    if !record.model.is_empty() {
        fields.push(record.model.clone());
    }
    fields.push(format!("In {}", record.input_tokens));
    fields.push(format!("Out {}", record.output_tokens));
    if let Some(cost) = record.cost {
        fields.push(format!("${}", cost));
    }
    format!("*{}*\n", fields.join(FIELD_SEP))
}

fn parse_record_line(text: &str) -> Option<(TokenRecord, usize)> {
    let end = text.find('\n')?;
    let inner = text[..end].strip_prefix('*')?.strip_suffix('*')?;

    let mut fields: Vec<&str> = inner.split(FIELD_SEP).collect();
    let model = match fields.first() {
        Some(first) if !first.starts_with("In ") => fields.remove(0).to_string(),
        _ => String::new(),
    };

    let mut fields = fields.into_iter();
    let input_tokens = fields.next()?.strip_prefix("In ")?.parse().ok()?;
    let output_tokens = fields.next()?.strip_prefix("Out ")?.parse().ok()?;
    let cost = match fields.next() {
        Some(field) => Some(field.strip_prefix('$')?.parse().ok()?),
        None => None,
    };
    if fields.next().is_some() {
        return None;
    }

    let record = TokenRecord {
        model,
        input_tokens,
        output_tokens,
        cost,
    };
    Some((record, end + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn skin() -> MarkdownSkin {
        MarkdownSkin::new(Beacons::CANONICAL)
    }

    #[test]
    fn test_end_to_end_rendering() {
        let canonical = "<ai!>Hello|AI|\n|==In=5,Out=2|==\nHi\n|ME|\n</ai!>";
        let rendered = skin().from_canonical(canonical);
        assert_eq!(
            rendered,
            "<ai!>Hello\n\n##### ✦ AI\n*In 5 · Out 2*\nHi\n\n\n##### ✎ You\n</ai!>"
        );
        assert_eq!(skin().to_canonical(&rendered), canonical);
    }

    #[test]
    fn test_record_line_with_model_and_cost() {
        let record = TokenRecord::new("claude-haiku-4", 1000, 10);
        let line = format_record_line(&record);
        assert_eq!(line, "*claude-haiku-4 · In 1000 · Out 10 · $0.00084*\n");
        assert_eq!(parse_record_line(&line), Some((record, line.len())));
    }

    #[test]
    fn test_record_line_rejects_prose() {
        assert!(parse_record_line("*emphasis here*\n").is_none());
        assert!(parse_record_line("*In 5 · Out 2* trailing\n").is_none());
        assert!(parse_record_line("*In 5 · Out 2*").is_none());
    }

    #[test]
    fn test_hand_typed_heading_without_gap() {
        let doc = "Question\n##### ✦ AI\nAnswer\n##### ✎ You\nMore";
        assert_eq!(skin().to_canonical(doc), "Question\n|AI|\nAnswer\n|ME|\nMore");
    }

    #[test]
    fn test_heading_mid_line_is_text() {
        let doc = "see ##### ✦ AI\nfor details";
        assert_eq!(skin().to_canonical(doc), doc);
    }

    #[test]
    fn test_sections() {
        let s = skin();
        assert_eq!(
            s.thinking_block("pondering"),
            "<details><summary>💭 Thinking</summary>\npondering\n</details>\n"
        );
        assert_eq!(
            s.to_canonical("<details open><summary>⚠️ Error</summary>\nboom\n</details>\n"),
            "|ERROR|\nboom\n|/ERROR|\n"
        );
    }

    #[test]
    fn test_unclosed_details_is_text() {
        let doc = "<details><summary>💭 Thinking</summary> never closed";
        assert_eq!(skin().to_canonical(doc), doc);
    }

    #[test]
    fn test_placeholder() {
        let s = skin();
        assert_eq!(s.processing_placeholder(), PROCESSING);
        assert_eq!(s.to_canonical(&format!("a{}b", PROCESSING)), "a|PROCESSING|b");
    }

    #[test]
    fn test_record_like_text_after_bare_heading() {
        let canonical = "|AI|\n*In 5 · Out 2*\nanswer\n";
        let rendered = skin().from_canonical(canonical);
        assert_eq!(rendered, canonical);
        assert_eq!(skin().to_canonical(&rendered), canonical);
    }

    #[test]
    fn test_literal_markers_in_text_are_escaped() {
        let canonical = "##### ✦ AI\nnot a turn, nor is ⏳ *AI is working…* or \\##### ✎ You";
        let rendered = skin().from_canonical(canonical);
        assert_eq!(
            rendered,
            "\\##### ✦ AI\nnot a turn, nor is \\⏳ *AI is working…* or \\##### ✎ You"
        );
        assert_eq!(skin().to_canonical(&rendered), canonical);
    }

    #[test]
    fn test_heading_text_before_a_turn_stays_text() {
        let canonical = "a\n##### ✦ AI|ME|\n";
        let rendered = skin().from_canonical(canonical);
        assert_eq!(skin().to_canonical(&rendered), canonical);
    }

    #[test]
    fn test_backslash_before_placeholder() {
        let canonical = "ends with \\|PROCESSING|";
        let rendered = skin().from_canonical(canonical);
        assert_eq!(skin().to_canonical(&rendered), canonical);
    }

    #[test]
    fn test_unrepresentable_model_falls_back_to_canonical() {
        let record = TokenRecord {
            model: "odd · name".to_string(),
            input_tokens: 1,
            output_tokens: 1,
            cost: None,
        };
        let canonical = Beacons::CANONICAL.assistant_header(Some(&record));
        let rendered = skin().from_canonical(&canonical);
        assert_eq!(rendered, canonical);
        assert_eq!(skin().to_canonical(&rendered), canonical);
    }
}
