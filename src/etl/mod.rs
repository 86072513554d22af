//! Core ETL (Extract, Transform, Load) abstractions
//!
//! Document images are extracted into raw items, transformed into typed row
//! records, and loaded into a host form or a record file.

mod extract;
mod load;
mod pipeline;
mod transform;

pub use extract::Extractor;
pub use load::Loader;
pub use pipeline::{Pipeline, RunSummary};
pub use transform::{Chained, IdentityTransformer, Transformer};
