//! Vision model client, wire types and retry policy.
//!
//! This module provides the [`VisionClient`] used to send one document image
//! per request to the extraction model, along with the [`RetryPolicy`]
//! applied to overload responses.

mod retry;
mod types;
mod vision;

pub use retry::RetryPolicy;
pub use types::{GenerateContentRequest, GenerateContentResponse, GenerationConfig};
pub use vision::{DEFAULT_MODEL, DEFAULT_URL, REDACTED, VisionClient, VisionError, VisionModel};
