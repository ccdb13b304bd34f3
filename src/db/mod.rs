//! Database abstraction layer.
//!
//! This module provides database access functionality:
//! - Type adapters between typed values and SQLite storage classes
//! - Parameterized query building
//! - Schema-bound tables with CRUD operations
//! - Connection pooling and task-scoped transactions
//! - Row decoding and parameter binding

pub mod adapter;
pub mod database;
pub(crate) mod params;
pub mod query;
pub mod table;
pub mod transaction;
pub mod types;

pub use adapter::{
    Adapter, AdapterRegistry, BlobAdapter, BooleanAdapter, ColumnAdapter, IntegerAdapter,
    RealAdapter, StringFormAdapter, TextAdapter,
};
pub use database::Database;
pub use query::{Query, quote_identifier};
pub use table::{Table, TableBuilder};
