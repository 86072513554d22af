//! Schema registry: field specifications and transaction profiles
//!
//! This module describes which line-item fields exist on the host form, their
//! types and DOM names, and which of them each transaction type writes.

mod field;
mod registry;

pub use field::{Control, DomTemplate, FieldSpec, FieldType, ROW_PLACEHOLDER};
pub use registry::{DEFAULT_PROFILE, DomNames, FieldCatalog, SchemaError, SchemaRegistry};
