//! File system storage
//!
//! - NDJSON record files (read for rehearsal, written by extraction)
//! - Page images gathered from files and directories

mod images;
mod ndjson;

pub use images::{DEFAULT_MAX_PAGES, ImageDirectory, mime_for};
pub use ndjson::{NdjsonReader, NdjsonWriter};
