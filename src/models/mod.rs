//! Data models for schemadb.
//!
//! This module re-exports the schema, value and definition types used
//! throughout the crate.

pub mod definition;
pub mod schema;
pub mod value;

// Re-export commonly used types
pub use definition::{FieldDefinition, TableDefinition, TypeSpec};
pub use schema::{BytesFormat, Field, FieldType, Kind, Schema};
pub use value::{Record, SqlValue, Value};
