//! Canonical protocol - the fixed sentinels every skin converts to and from.
//!
//! Canonical text is the only form the parser, transcript builder and tool
//! loop ever see. The sentinels are literal strings, shared verbatim by
//! every document written with Quill.

mod beacons;
mod record;

pub use beacons::Beacons;
pub use record::{TokenRecord, price_per_million};
