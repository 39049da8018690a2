//! Skins - human-facing renderings of the canonical protocol
//!
//! A skin reads and writes its own surface through the shared `Element`
//! model. Conversions to and from canonical text are compositions of a
//! skin's `parse`/`render` with the canonical reader and writer.

mod elements;
mod markdown;
mod raw;

pub use elements::{Element, parse_canonical, render_canonical};
pub use markdown::MarkdownSkin;
pub use raw::RawSkin;

use std::collections::HashMap;
use std::sync::Arc;

use log::debug;

use crate::error::{QuillError, Result};
use crate::protocol::{Beacons, TokenRecord};

/// A named display format for whole documents.
pub trait Skin: Send + Sync {
    fn name(&self) -> &'static str;

    /// One-line summary for listings
    fn description(&self) -> &'static str;

    fn beacons(&self) -> &Beacons;

    /// Read this skin's surface; unrecognized structure stays text.
    fn parse(&self, doc: &str) -> Vec<Element>;

    /// Write elements in this skin's surface.
    fn render(&self, elements: &[Element]) -> String;

    fn to_canonical(&self, doc: &str) -> String {
        render_canonical(&self.parse(doc), self.beacons())
    }

    fn from_canonical(&self, doc: &str) -> String {
        self.render(&parse_canonical(doc, self.beacons()))
    }

    fn assistant_header(&self, record: Option<&TokenRecord>) -> String {
        self.render(&[Element::Assistant(record.cloned())])
    }

    fn user_header(&self) -> String {
        self.render(&[Element::User])
    }

    fn thinking_block(&self, text: &str) -> String {
        self.from_canonical(&self.beacons().thinking_block(text))
    }

    fn tool_block(&self, log: &str) -> String {
        self.from_canonical(&self.beacons().tool_block(log))
    }

    fn error_block(&self, message: &str) -> String {
        self.from_canonical(&self.beacons().error_block(message))
    }

    fn processing_placeholder(&self) -> String {
        self.render(&[Element::Processing])
    }
}

/// Skins by name.
pub struct SkinRegistry {
    skins: HashMap<String, Arc<dyn Skin>>,
}

impl SkinRegistry {
    /// Registry without any skins
    pub fn empty() -> Self {
        Self { skins: HashMap::new() }
    }

    /// Registry with the built-in `raw` and `markdown` skins
    pub fn builtin(beacons: Beacons) -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(RawSkin::new(beacons)));
        registry.register(Arc::new(MarkdownSkin::new(beacons)));
        registry
    }

    pub fn register(&mut self, skin: Arc<dyn Skin>) {
        debug!("Registering skin {}", skin.name());
        self.skins.insert(skin.name().to_string(), skin);
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Skin>> {
        self.skins
            .get(name)
            .cloned()
            .ok_or_else(|| QuillError::Config(format!("Unknown skin: {}", name)))
    }

    /// Skin names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.skins.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Normalizer for an active skin plus the reference skin used to absorb
    /// documents still carrying an older style.
    pub fn normalizer(&self, active: &str, reference: &str) -> Result<Normalizer> {
        Ok(Normalizer {
            active: self.get(active)?,
            reference: self.get(reference)?,
        })
    }
}

/// Entry and exit conversions for one processing pass.
#[derive(Clone)]
pub struct Normalizer {
    active: Arc<dyn Skin>,
    reference: Arc<dyn Skin>,
}

impl Normalizer {
    pub fn active(&self) -> &dyn Skin {
        self.active.as_ref()
    }

    /// Active skin to canonical, then the reference skin to canonical.
    pub fn normalize_in(&self, doc: &str) -> String {
        let canonical = self.active.to_canonical(doc);
        if self.reference.name() == self.active.name() {
            return canonical;
        }
        self.reference.to_canonical(&canonical)
    }

    pub fn normalize_out(&self, doc: &str) -> String {
        self.active.from_canonical(doc)
    }
}
