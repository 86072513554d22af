//! formfill
//!
//! Reads line items off document images with a vision model and types them
//! into a legacy web form row by row, the way a person would.
//!
//! The crate is organized as an ETL pipeline:
//! - [`extraction`] turns images into raw items through the vision [`client`]
//! - [`transform`] normalizes and sanitizes them into [`record::RowRecord`]s
//! - [`fill`] drives a [`page::HostPage`] to create and fill one row per record
//!
//! Both sides read field definitions from the [`schema`] registry.

pub mod cli;
pub mod client;
pub mod config;
pub mod etl;
pub mod extraction;
pub mod fill;
pub mod page;
pub mod record;
pub mod schema;
pub mod storage;
pub mod transform;

// Re-exports for convenience
pub use client::{VisionClient, VisionError, VisionModel};
pub use etl::{Extractor, IdentityTransformer, Loader, Pipeline, RunSummary, Transformer};
pub use fill::{AbortHandle, FillError, FillTimings, RowFillEngine, RowFillLoader};
pub use page::{HostPage, MemoryPage};
pub use record::{FieldValue, RowRecord};
pub use schema::{SchemaError, SchemaRegistry};
pub use storage::{ImageDirectory, NdjsonReader, NdjsonWriter};
