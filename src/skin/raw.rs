//! The canonical skin: documents are stored exactly as the protocol is written.

use super::{Element, Skin, parse_canonical, render_canonical};
use crate::protocol::Beacons;

pub struct RawSkin {
    beacons: Beacons,
}

impl RawSkin {
    pub fn new(beacons: Beacons) -> Self {
        Self { beacons }
    }
}

impl Skin for RawSkin {
    fn name(&self) -> &'static str {
        "raw"
    }

    fn description(&self) -> &'static str {
        "canonical sentinels, stored as-is"
    }

    fn beacons(&self) -> &Beacons {
        &self.beacons
    }

    fn parse(&self, doc: &str) -> Vec<Element> {
        parse_canonical(doc, &self.beacons)
    }

    fn render(&self, elements: &[Element]) -> String {
        render_canonical(elements, &self.beacons)
    }

    fn to_canonical(&self, doc: &str) -> String {
        doc.to_string()
    }

    fn from_canonical(&self, doc: &str) -> String {
        doc.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::TokenRecord;

    #[test]
    fn test_identity() {
        let skin = RawSkin::new(Beacons::CANONICAL);
        let doc = "anything |AI|\n at all |==broken";
        assert_eq!(skin.to_canonical(doc), doc);
        assert_eq!(skin.from_canonical(doc), doc);
    }

    #[test]
    fn test_formatters_are_canonical() {
        let skin = RawSkin::new(Beacons::CANONICAL);
        assert_eq!(skin.assistant_header(Some(&TokenRecord::new("", 5, 2))), "|AI|\n|==In=5,Out=2|==\n");
        assert_eq!(skin.user_header(), "|ME|\n");
        assert_eq!(skin.thinking_block("hmm"), "|THINK|\nhmm\n|/THINK|\n");
        assert_eq!(skin.processing_placeholder(), "|PROCESSING|");
    }
}
