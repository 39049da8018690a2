//! Context tags - `<doc!…>`, `<file!…>`, `<image!…>`, `<pdf!…>`.
//!
//! Text references are inlined as `<document name="…">` frames; images and
//! PDFs are removed from the text and returned as attachments. A reference
//! that cannot be resolved leaves a `[context error: …]` note in its place.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use log::{debug, warn};

use super::DocumentStore;
use crate::error::{QuillError, Result};
use crate::tags::rewrite;
use crate::transcript::Part;

/// A block's text with its context tags expanded.
#[derive(Debug, Default)]
pub struct ExpandedContext {
    pub text: String,
    /// Attachments for the first user turn, in tag order
    pub media: Vec<Part>,
    /// One message per reference that failed
    pub errors: Vec<String>,
}

#[derive(Debug, Clone)]
enum Resolved {
    Inline(String),
    Media,
    Failed(String),
}

enum Loaded {
    Inline(String),
    Media(Part),
}

/// Expands the context tags of one block.
///
/// The cache is keyed by the literal tag text and lives as long as the
/// expander, which is one block.
pub struct ContextExpander<'a> {
    store: &'a dyn DocumentStore,
    cache: HashMap<String, Resolved>,
}

impl<'a> ContextExpander<'a> {
    pub fn new(store: &'a dyn DocumentStore) -> Self {
        Self {
            store,
            cache: HashMap::new(),
        }
    }

    pub fn expand(&mut self, text: &str) -> ExpandedContext {
        let mut media = Vec::new();
        let mut errors = Vec::new();

        let (expanded, _) = rewrite(text, |tag| {
            if !matches!(tag.name.as_str(), "doc" | "file" | "image" | "pdf") {
                return None;
            }
            let key = tag.raw(text).to_string();

            let resolved = match self.cache.get(&key) {
                Some(hit) => {
                    debug!("Context cache hit for {}", key);
                    hit.clone()
                }
                None => {
                    let reference = tag.value.as_deref().or(tag.inner.as_deref()).unwrap_or("").trim();
                    let resolved = match self.load(&tag.name, reference) {
                        Ok(Loaded::Inline(inline)) => Resolved::Inline(inline),
                        Ok(Loaded::Media(part)) => {
                            media.push(part);
                            Resolved::Media
                        }
                        Err(err) => {
                            let message = match err {
                                QuillError::Context(message) => message,
                                other => other.to_string(),
                            };
                            warn!("Context tag {} failed: {}", key, message);
                            errors.push(message.clone());
                            Resolved::Failed(message)
                        }
                    };
                    self.cache.insert(key, resolved.clone());
                    resolved
                }
            };

            Some(match resolved {
                Resolved::Inline(inline) => inline,
                Resolved::Media => String::new(),
                Resolved::Failed(message) => format!("[context error: {}]", message),
            })
        });

        ExpandedContext {
            text: expanded,
            media,
            errors,
        }
    }

    fn load(&self, kind: &str, reference: &str) -> Result<Loaded> {
        if reference.is_empty() {
            return Err(QuillError::Context(format!("<{}!> needs a reference", kind)));
        }
        let target = link_target(reference);

        match kind {
            "doc" => {
                let path = self
                    .store
                    .resolve_link(target)
                    .ok_or_else(|| QuillError::Context(format!("note '{}' not found", target)))?;
                let body = self.store.read(&path)?;
                Ok(Loaded::Inline(frame(target, &body)))
            }
            "file" => {
                let body = self.store.read(Path::new(target))?;
                Ok(Loaded::Inline(frame(target, &body)))
            }
            "image" => {
                let path = self.media_path(target);
                let media_type = image_media_type(&path)
                    .ok_or_else(|| QuillError::Context(format!("'{}' is not a supported image", target)))?;
                let data = self.store.read_bytes(&path)?;
                Ok(Loaded::Media(Part::Image {
                    data,
                    media_type: media_type.to_string(),
                }))
            }
            _ => {
                let data = self.store.read_bytes(&self.media_path(target))?;
                if !data.starts_with(b"%PDF") {
                    return Err(QuillError::Context(format!("'{}' is not a PDF", target)));
                }
                Ok(Loaded::Media(Part::Document { data }))
            }
        }
    }

    fn media_path(&self, target: &str) -> PathBuf {
        self.store
            .resolve_link(target)
            .unwrap_or_else(|| PathBuf::from(target))
    }
}

/// `[[Note|alias]]` and `[[Note#Heading]]` both name `Note`.
fn link_target(reference: &str) -> &str {
    let inner = reference
        .strip_prefix("[[")
        .and_then(|r| r.strip_suffix("]]"))
        .unwrap_or(reference);
    inner.split(['|', '#']).next().unwrap_or(inner).trim()
}

fn frame(name: &str, body: &str) -> String {
    format!("<document name=\"{}\">\n{}\n</document>", name, body.trim_end())
}

fn image_media_type(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::MemoryStore;

    fn store() -> MemoryStore {
        MemoryStore::new()
            .with_file("Ideas.md", "Build a boat.\n")
            .with_file("notes/todo.txt", "milk")
            .with_file("chart.png", vec![0x89, b'P', b'N', b'G'])
            .with_file("paper.pdf", b"%PDF-1.7 ...".to_vec())
            .with_file("fake.pdf", b"hello".to_vec())
    }

    #[test]
    fn test_doc_and_file_are_inlined() {
        let store = store();
        let mut expander = ContextExpander::new(&store);
        let out = expander.expand("See <doc![[Ideas]]> and <file!\"notes/todo.txt\">.");

        assert_eq!(
            out.text,
            "See <document name=\"Ideas\">\nBuild a boat.\n</document> and \
             <document name=\"notes/todo.txt\">\nmilk\n</document>."
        );
        assert!(out.media.is_empty());
        assert!(out.errors.is_empty());
    }

    #[test]
    fn test_media_becomes_attachments() {
        let store = store();
        let mut expander = ContextExpander::new(&store);
        let out = expander.expand("Look <image![[chart.png]]> and <pdf![[paper.pdf]]>");

        assert_eq!(out.text, "Look  and ");
        assert_eq!(out.media.len(), 2);
        assert!(matches!(&out.media[0], Part::Image { media_type, .. } if media_type == "image/png"));
        assert!(matches!(out.media[1], Part::Document { .. }));
    }

    #[test]
    fn test_repeated_tag_resolves_once() {
        let store = store();
        let mut expander = ContextExpander::new(&store);
        let out = expander.expand("<image![[chart.png]]><image![[chart.png]]>");
        assert_eq!(out.media.len(), 1);
    }

    #[test]
    fn test_failures_are_annotated_in_place() {
        let store = store();
        let mut expander = ContextExpander::new(&store);
        let out = expander.expand("a <doc![[Missing]]> b <pdf![[fake.pdf]]> c <image![[notes/todo.txt]]>");

        assert_eq!(out.errors.len(), 3);
        assert!(out.text.starts_with("a [context error: note 'Missing' not found] b"));
        assert!(out.text.contains("is not a PDF"));
        assert!(out.text.contains("is not a supported image"));
        assert!(out.media.is_empty());
    }

    #[test]
    fn test_other_tags_untouched() {
        let store = store();
        let mut expander = ContextExpander::new(&store);
        let out = expander.expand("<model!x> <DOC![[Ideas]]>");
        assert_eq!(out.text, "<model!x> <DOC![[Ideas]]>");
    }

    #[test]
    fn test_link_target() {
        assert_eq!(link_target("[[Note]]"), "Note");
        assert_eq!(link_target("[[Note|alias]]"), "Note");
        assert_eq!(link_target("[[Note#Part]]"), "Note");
        assert_eq!(link_target("plain.md"), "plain.md");
    }
}
