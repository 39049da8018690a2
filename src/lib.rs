//! Quill - co-author documents with an AI backend through inline markup.
//!
//! A document carries `<ai!>` blocks; a `<reply!>` inside one asks for an
//! answer. Each processing pass normalizes the document to canonical text,
//! rebuilds the block's conversation, runs a bounded tool loop against the
//! backend and writes the answer back in the active skin.

pub mod confirm;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod protocol;
pub mod runner;
pub mod skin;
pub mod tags;
pub mod tools;
pub mod transcript;

pub use error::{QuillError, Result};
