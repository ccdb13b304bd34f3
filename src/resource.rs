//! Generic CRUD resource over a table.
//!
//! [`TableResource`] exposes a table through resource-style operations and
//! translates storage errors into the [`ResourceError`] vocabulary expected
//! by request handlers.

use crate::db::{Query, Table};
use crate::error::DbError;
use crate::models::{Record, Value};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResourceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ResourceError {
    /// HTTP status code conventionally used for this error.
    pub fn status(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::Conflict(_) => 409,
            Self::BadRequest(_) => 400,
            Self::Internal(_) => 500,
        }
    }
}

impl From<DbError> for ResourceError {
    fn from(err: DbError) -> Self {
        let message = err.to_string();
        match err {
            DbError::NotFound { .. } => Self::NotFound(message),
            DbError::AlreadyExists { .. } | DbError::UniqueViolation { .. } => {
                Self::Conflict(message)
            }
            DbError::InvalidField { .. }
            | DbError::InvalidValue { .. }
            | DbError::InvalidInput { .. } => Self::BadRequest(message),
            DbError::Connection { .. }
            | DbError::Database { .. }
            | DbError::AdapterNotFound { .. }
            | DbError::TransactionAborted { .. }
            | DbError::Schema { .. }
            | DbError::Internal { .. } => Self::Internal(message),
        }
    }
}

pub type ResourceResult<T> = Result<T, ResourceError>;

#[derive(Debug, Clone)]
pub struct TableResource {
    table: Table,
}

impl TableResource {
    pub fn new(table: Table) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    /// `record` with its primary key set to `key`. A record carrying a
    /// different key is rejected.
    fn keyed(&self, key: &Value, record: &Record) -> ResourceResult<Record> {
        let pk = self.table.primary_key();
        match record.get(pk) {
            Some(existing) if existing != key => Err(ResourceError::BadRequest(format!(
                "record key {} does not match {}",
                existing, key
            ))),
            _ => Ok(record.clone().with(pk, key.clone())),
        }
    }

    /// Create a resource item; returns `{primary key: key}`.
    pub async fn create(&self, key: &Value, record: &Record) -> ResourceResult<Record> {
        let record = self.keyed(key, record)?;
        self.table.insert(&record).await?;
        Ok(Record::new().with(self.table.primary_key(), key.clone()))
    }

    pub async fn read(&self, key: &Value) -> ResourceResult<Record> {
        Ok(self.table.select(key).await?)
    }

    /// Replace a resource item; returns the stored record.
    pub async fn update(&self, key: &Value, record: &Record) -> ResourceResult<Record> {
        let record = self.keyed(key, record)?;
        self.table.update(&record).await?;
        Ok(record)
    }

    /// Update some fields of a resource item; returns the full record after
    /// the change.
    pub async fn patch(&self, key: &Value, partial: &Record) -> ResourceResult<Record> {
        let table = &self.table;
        table
            .database()
            .transaction(|| async move {
                table.patch(key, partial).await?;
                Ok(table.select(key).await?)
            })
            .await
    }

    pub async fn delete(&self, key: &Value) -> ResourceResult<()> {
        Ok(self.table.delete(key).await?)
    }

    /// Keys of all items, or of the items matching `filter`.
    pub async fn list(&self, filter: Option<&Query>) -> ResourceResult<Vec<Value>> {
        Ok(self.table.list(filter).await?)
    }
}
