//! schemadb Library
//!
//! A schema-driven persistence layer for SQLite: typed records are mapped
//! onto tables through per-kind value adapters, statements are built with
//! bound parameters only, and reentrant transaction scopes are tied to the
//! calling task.
//!
//! ```ignore
//! let db = Database::open("sqlite:data.db").await?;
//! let schema = Schema::new()
//!     .field("id", FieldType::Uuid)
//!     .field("tags", FieldType::set(FieldType::Str).nullable());
//! let table = Table::new(db.clone(), "foo", schema, "id")?;
//! table.create().await?;
//! db.transaction(|| async move {
//!     table.insert(&Record::new().with("id", Uuid::new_v4())).await?;
//!     Ok::<_, DbError>(())
//! })
//! .await?;
//! ```

pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod resource;

pub use config::Config;
pub use db::{AdapterRegistry, Database, Query, Table};
pub use error::{DbError, DbResult};
pub use models::{BytesFormat, FieldType, Kind, Record, Schema, SqlValue, Value};
pub use resource::{ResourceError, TableResource};
