//! Image-to-line-item extraction
//!
//! Compression, prompt construction, one model request per image with bounded
//! retry, and tolerant parsing of the model's answer.

mod compress;
mod extractor;
mod parse;
mod prompt;
mod source;

pub use compress::{CompressionOptions, compress_image};
pub use extractor::{AttemptStatus, DEFAULT_MAX_IMAGES, ExtractionAttempt, ImageExtractor};
pub use parse::{RawItem, clean_response, parse_items};
pub use prompt::{DEFAULT_MAX_LENGTH, build_prompt};
pub use source::SourceImage;
