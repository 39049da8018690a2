//! Transcript builder - canonical block text to an ordered list of turns.
//!
//! Presentation metadata (thinking, tool logs, errors, token accounting,
//! placeholders) is stripped first; the remaining text is split on the two
//! turn beacons. Text before the first beacon belongs to the user.

mod turn;

pub use turn::{ConversationTurn, Part, Role, TurnContent};

use log::{debug, warn};

use crate::protocol::Beacons;

/// Element of the beacon-split stream.
#[derive(Debug, PartialEq)]
enum Piece<'a> {
    Text(&'a str),
    Turn(Role),
}

/// Build the turns of a block.
///
/// `media` is attached once, to the first user turn emitted.
pub fn build(text: &str, media: Vec<Part>, beacons: &Beacons) -> Vec<ConversationTurn> {
    let cleaned = strip_metadata(text, beacons);
    let mut turns = Vec::new();
    let mut role = Role::User;
    let mut buffer = String::new();
    let mut pending_media = Some(media);

    for piece in split_turns(&cleaned, beacons) {
        match piece {
            Piece::Text(t) => buffer.push_str(t),
            Piece::Turn(next) => {
                flush(&mut turns, role, &mut buffer, &mut pending_media);
                role = next;
            }
        }
    }
    flush(&mut turns, role, &mut buffer, &mut pending_media);

    if turns.is_empty() {
        let mut only = ConversationTurn::user(cleaned.trim());
        if let Some(media) = pending_media.take().filter(|m| !m.is_empty()) {
            only.attach(media);
        }
        turns.push(only);
    } else if pending_media.as_ref().is_some_and(|m| !m.is_empty()) {
        warn!("Block has attachments but no user turn; attachments dropped");
    }

    debug!("Built transcript with {} turns", turns.len());
    turns
}

fn flush(
    turns: &mut Vec<ConversationTurn>,
    role: Role,
    buffer: &mut String,
    pending_media: &mut Option<Vec<Part>>,
) {
    let content = buffer.trim();
    if content.is_empty() {
        buffer.clear();
        return;
    }

    let mut turn = ConversationTurn {
        role,
        content: TurnContent::Text(content.to_string()),
    };
    buffer.clear();

    if role == Role::User {
        if let Some(media) = pending_media.take().filter(|m| !m.is_empty()) {
            turn.attach(media);
        }
    }
    turns.push(turn);
}

/// Split on turn beacons, keeping each beacon as its own stream element.
fn split_turns<'a>(text: &'a str, beacons: &Beacons) -> Vec<Piece<'a>> {
    let mut pieces = Vec::new();
    let mut rest = text;

    loop {
        let next_ai = rest.find(beacons.assistant).map(|i| (i, Role::Assistant, beacons.assistant));
        let next_me = rest.find(beacons.user).map(|i| (i, Role::User, beacons.user));
        let next = match (next_ai, next_me) {
            (Some(a), Some(u)) => Some(if a.0 <= u.0 { a } else { u }),
            (a, u) => a.or(u),
        };

        match next {
            Some((at, role, beacon)) => {
                if at > 0 {
                    pieces.push(Piece::Text(&rest[..at]));
                }
                pieces.push(Piece::Turn(role));
                rest = &rest[at + beacon.len()..];
            }
            None => {
                if !rest.is_empty() {
                    pieces.push(Piece::Text(rest));
                }
                break;
            }
        }
    }

    pieces
}

/// Remove thinking, tool-log and error sections, accounting lines and
/// processing placeholders. An unterminated section stays as text.
pub fn strip_metadata(text: &str, beacons: &Beacons) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pos = 0;

    'scan: while let Some(offset) = text[pos..].find('|') {
        let at = pos + offset;
        out.push_str(&text[pos..at]);
        let rest = &text[at..];

        for (open, close) in beacons.metadata_sections() {
            if let Some(body) = rest.strip_prefix(open) {
                if let Some(end) = body.find(close) {
                    pos = at + open.len() + end + close.len();
                    if text[pos..].starts_with('\n') {
                        pos += 1;
                    }
                    continue 'scan;
                }
            }
        }

        if let Some((_, used)) = beacons.parse_token_line(rest) {
            pos = at + used;
            if text[pos..].starts_with('\n') {
                pos += 1;
            }
            continue;
        }

        if rest.starts_with(beacons.processing) {
            pos = at + beacons.processing.len();
            continue;
        }

        out.push('|');
        pos = at + 1;
    }

    out.push_str(&text[pos..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const B: Beacons = Beacons::CANONICAL;

    fn image() -> Part {
        Part::Image {
            data: vec![0x89, 0x50],
            media_type: "image/png".to_string(),
        }
    }

    #[test]
    fn test_role_alternation() {
        let text = format!("A{}B{}C", B.assistant, B.user);
        let turns = build(&text, vec![], &B);
        assert_eq!(
            turns,
            vec![
                ConversationTurn::user("A"),
                ConversationTurn::assistant("B"),
                ConversationTurn::user("C"),
            ]
        );
    }

    #[test]
    fn test_plain_text_is_one_user_turn() {
        let turns = build("  just a question \n", vec![], &B);
        assert_eq!(turns, vec![ConversationTurn::user("just a question")]);
    }

    #[test]
    fn test_empty_input_synthesizes_one_turn() {
        let turns = build("   ", vec![], &B);
        assert_eq!(turns, vec![ConversationTurn::user("")]);
    }

    #[test]
    fn test_blank_segments_dropped() {
        let text = format!("{}  \n{}Hi{}", B.user, B.assistant, B.user);
        let turns = build(&text, vec![], &B);
        assert_eq!(turns, vec![ConversationTurn::assistant("Hi")]);
    }

    #[test]
    fn test_leading_assistant_beacon() {
        let text = format!("{}Hello\n{}Thanks", B.assistant, B.user);
        let turns = build(&text, vec![], &B);
        assert_eq!(turns[0].role, Role::Assistant);
        assert_eq!(turns[1], ConversationTurn::user("Thanks"));
    }

    #[test]
    fn test_media_attached_once() {
        let text = format!("first{}answer{}second", B.assistant, B.user);
        let turns = build(&text, vec![image()], &B);

        assert_eq!(turns.len(), 3);
        assert!(turns[0].has_non_text_parts());
        assert_eq!(turns[0].text(), "first");
        assert_eq!(turns[2], ConversationTurn::user("second"));
        assert!(!turns[2].has_non_text_parts());
    }

    #[test]
    fn test_media_skips_leading_assistant_turn() {
        let text = format!("{}hello{}question", B.assistant, B.user);
        let turns = build(&text, vec![image()], &B);
        assert!(!turns[0].has_non_text_parts());
        assert!(turns[1].has_non_text_parts());
    }

    #[test]
    fn test_media_on_synthesized_turn() {
        let turns = build("", vec![image()], &B);
        assert_eq!(turns.len(), 1);
        assert!(turns[0].has_non_text_parts());
    }

    #[test]
    fn test_strips_thinking_and_accounting() {
        let text = format!(
            "Q{}{}{}Answer\n{}",
            B.assistant_header(Some(&crate::protocol::TokenRecord::new("", 5, 2))),
            B.thinking_block("secret reasoning"),
            B.tool_block("read_file ok"),
            B.user
        );
        let turns = build(&text, vec![], &B);
        assert_eq!(
            turns,
            vec![ConversationTurn::user("Q"), ConversationTurn::assistant("Answer")]
        );
    }

    #[test]
    fn test_strips_errors_and_placeholder() {
        let text = format!("Q\n{}more{}", B.error_block("API error 500"), B.processing);
        assert_eq!(strip_metadata(&text, &B), "Q\nmore");
    }

    #[test]
    fn test_unterminated_section_is_kept() {
        let text = "before |THINK| never closed";
        assert_eq!(strip_metadata(text, &B), text);
    }

    #[test]
    fn test_lone_pipes_survive() {
        let text = "| a | b |\n|---|---|";
        assert_eq!(strip_metadata(text, &B), text);
    }

    #[test]
    fn test_split_keeps_consecutive_beacons() {
        let text = format!("{}{}", B.assistant, B.assistant);
        let pieces = split_turns(&text, &B);
        assert_eq!(pieces, vec![Piece::Turn(Role::Assistant), Piece::Turn(Role::Assistant)]);
    }
}
