//! Schema and field declarations
//!
//! This module defines the closed schema of a catalog index:
//! - Field identifiers (`name`, `category`)
//! - Per-field indexing options, storage and query boost

mod field;
mod mapping;

pub use field::Field;
pub use mapping::{searchable_fields, FieldMapping, IndexOptions, SCHEMA};
