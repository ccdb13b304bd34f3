//! Error types for schemadb.
//!
//! This module defines all error types using `thiserror`. Structural errors
//! (`AdapterNotFound`, `InvalidField`, `InvalidValue`, `Schema`) are raised
//! before any SQL is issued; row-count errors (`NotFound`, `AlreadyExists`)
//! are derived from the result of the single statement responsible for them.

use thiserror::Error;

/// SQLite extended result codes for constraint violations on keys.
const SQLITE_CONSTRAINT_PRIMARYKEY: &str = "1555";
const SQLITE_CONSTRAINT_UNIQUE: &str = "2067";

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Database error: {message}")]
    Database {
        message: String,
        /// SQLite extended result code, e.g. "1299" for a NOT NULL violation
        sql_state: Option<String>,
        suggestion: String,
    },

    #[error("Uniqueness violation: {message}")]
    UniqueViolation { message: String },

    #[error("No adapter registered for kind '{kind}'")]
    AdapterNotFound { kind: String },

    #[error("Field '{field}' is not defined on table '{table}'")]
    InvalidField { field: String, table: String },

    #[error("Invalid value: {message}")]
    InvalidValue { message: String },

    #[error("No row with key {key} in table '{table}'")]
    NotFound { table: String, key: String },

    #[error("A row with key {key} already exists in table '{table}'")]
    AlreadyExists { table: String, key: String },

    #[error("Transaction aborted: {message} (transaction: {transaction_id})")]
    TransactionAborted {
        message: String,
        transaction_id: String,
    },

    #[error("Schema error: {message} (object: {object})")]
    Schema { message: String, object: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DbError {
    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a database error with optional SQLite result code.
    pub fn database(
        message: impl Into<String>,
        sql_state: Option<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::Database {
            message: message.into(),
            sql_state,
            suggestion: suggestion.into(),
        }
    }

    pub fn adapter_not_found(kind: impl Into<String>) -> Self {
        Self::AdapterNotFound { kind: kind.into() }
    }

    pub fn invalid_field(field: impl Into<String>, table: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            table: table.into(),
        }
    }

    pub fn invalid_value(message: impl Into<String>) -> Self {
        Self::InvalidValue {
            message: message.into(),
        }
    }

    pub fn not_found(table: impl Into<String>, key: impl Into<String>) -> Self {
        Self::NotFound {
            table: table.into(),
            key: key.into(),
        }
    }

    pub fn already_exists(table: impl Into<String>, key: impl Into<String>) -> Self {
        Self::AlreadyExists {
            table: table.into(),
            key: key.into(),
        }
    }

    /// Create a transaction aborted error.
    pub fn transaction_aborted(
        message: impl Into<String>,
        transaction_id: impl Into<String>,
    ) -> Self {
        Self::TransactionAborted {
            message: message.into(),
            transaction_id: transaction_id.into(),
        }
    }

    /// Create a schema error.
    pub fn schema(message: impl Into<String>, object: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
            object: object.into(),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            Self::Database { suggestion, .. } => Some(suggestion),
            _ => None,
        }
    }

    /// Check if this error is retryable. Nothing is retried internally;
    /// this only informs the caller's own retry policy.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }

    /// True for errors produced before any statement reached the engine.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::AdapterNotFound { .. }
                | Self::InvalidField { .. }
                | Self::InvalidValue { .. }
                | Self::Schema { .. }
        )
    }
}

/// Convert sqlx errors to DbError.
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => DbError::connection(
                msg.to_string(),
                "Check the connection string format: sqlite:path/to/db.sqlite",
            ),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                let unique = db_err.is_unique_violation()
                    || matches!(
                        code.as_deref(),
                        Some(SQLITE_CONSTRAINT_PRIMARYKEY) | Some(SQLITE_CONSTRAINT_UNIQUE)
                    );
                if unique {
                    DbError::UniqueViolation {
                        message: db_err.message().to_string(),
                    }
                } else {
                    DbError::database(
                        db_err.message(),
                        code,
                        "Check the SQL syntax and referenced objects",
                    )
                }
            }
            sqlx::Error::RowNotFound => DbError::database(
                "No rows returned",
                None,
                "Verify the query conditions match existing data",
            ),
            sqlx::Error::PoolTimedOut => DbError::connection(
                "Timed out acquiring a connection from the pool",
                "Raise acquire_timeout or max_connections, or finish open transactions first",
            ),
            sqlx::Error::PoolClosed => {
                DbError::connection("Connection pool is closed", "Reopen the database")
            }
            sqlx::Error::Io(io_err) => DbError::connection(
                format!("I/O error: {}", io_err),
                "Check that the database file is reachable and writable",
            ),
            sqlx::Error::ColumnNotFound(col) => {
                DbError::schema(format!("Column not found: {}", col), col.to_string())
            }
            sqlx::Error::ColumnIndexOutOfBounds { index, len } => DbError::internal(format!(
                "Column index {} out of bounds (len: {})",
                index, len
            )),
            sqlx::Error::ColumnDecode { index, source } => {
                DbError::internal(format!("Failed to decode column {}: {}", index, source))
            }
            sqlx::Error::Decode(source) => DbError::internal(format!("Decode error: {}", source)),
            sqlx::Error::WorkerCrashed => DbError::internal("Database worker crashed"),
            _ => DbError::internal(format!("Unknown database error: {}", err)),
        }
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DbError::connection("Failed to connect", "Check the path");
        assert!(err.to_string().contains("Connection failed"));
    }

    #[test]
    fn test_error_suggestion() {
        let err = DbError::database("Syntax error", Some("1".to_string()), "Check SQL syntax");
        assert_eq!(err.suggestion(), Some("Check SQL syntax"));
        assert_eq!(DbError::internal("boom").suggestion(), None);
    }

    #[test]
    fn test_error_retryable() {
        assert!(DbError::connection("err", "sugg").is_retryable());
        assert!(!DbError::not_found("foo", "1").is_retryable());
        assert!(!DbError::already_exists("foo", "1").is_retryable());
    }

    #[test]
    fn test_structural_errors() {
        assert!(DbError::adapter_not_found("uuid").is_structural());
        assert!(DbError::invalid_field("nope", "foo").is_structural());
        assert!(!DbError::not_found("foo", "1").is_structural());
        assert!(!DbError::transaction_aborted("rolled back", "tx_1").is_structural());
    }

    #[test]
    fn test_not_found_message_names_table_and_key() {
        let err = DbError::not_found("foo", "\"abc\"");
        let msg = err.to_string();
        assert!(msg.contains("foo"));
        assert!(msg.contains("abc"));
    }
}
