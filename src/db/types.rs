//! SQLite row decoding.
//!
//! Type conversion uses a two-phase approach:
//! 1. `categorize_type` classifies a type name into a storage class, using
//!    SQLite's column affinity rules
//! 2. `decode_column` extracts the value for that class as a [`SqlValue`]
//!
//! Classification is done on the type of the stored value, not the declared
//! column type, so a value always decodes to the class SQLite actually holds.

use crate::error::{DbError, DbResult};
use crate::models::SqlValue;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, TypeInfo, ValueRef};

/// Storage class of a SQLite value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageClass {
    Null,
    Integer,
    Real,
    Text,
    Blob,
    /// NUMERIC affinity; the value may be an integer or a real.
    Numeric,
}

/// Classify a SQLite type name.
pub fn categorize_type(type_name: &str) -> StorageClass {
    let upper = type_name.to_uppercase();

    if upper == "NULL" {
        return StorageClass::Null;
    }
    if upper.contains("INT") {
        return StorageClass::Integer;
    }
    if upper.contains("CHAR") || upper.contains("CLOB") || upper.contains("TEXT") {
        return StorageClass::Text;
    }
    if upper.is_empty() || upper.contains("BLOB") {
        return StorageClass::Blob;
    }
    if upper.contains("REAL") || upper.contains("FLOA") || upper.contains("DOUB") {
        return StorageClass::Real;
    }
    StorageClass::Numeric
}

/// Decode every column of a row, in select-list order.
pub fn decode_row(row: &SqliteRow) -> DbResult<Vec<SqlValue>> {
    (0..row.len()).map(|idx| decode_column(row, idx)).collect()
}

/// Decode one column of a row.
pub fn decode_column(row: &SqliteRow, idx: usize) -> DbResult<SqlValue> {
    let raw = row.try_get_raw(idx)?;
    if raw.is_null() {
        return Ok(SqlValue::Null);
    }
    let class = categorize_type(raw.type_info().name());

    let value = match class {
        StorageClass::Null => SqlValue::Null,
        StorageClass::Integer => SqlValue::Integer(row.try_get(idx)?),
        StorageClass::Real => SqlValue::Real(row.try_get(idx)?),
        StorageClass::Text => SqlValue::Text(row.try_get(idx)?),
        StorageClass::Blob => SqlValue::Blob(row.try_get(idx)?),
        StorageClass::Numeric => match row.try_get::<i64, _>(idx) {
            Ok(v) => SqlValue::Integer(v),
            Err(_) => SqlValue::Real(row.try_get(idx).map_err(|e| {
                DbError::internal(format!("Cannot decode NUMERIC column {}: {}", idx, e))
            })?),
        },
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categorize_storage_classes() {
        assert_eq!(categorize_type("INTEGER"), StorageClass::Integer);
        assert_eq!(categorize_type("REAL"), StorageClass::Real);
        assert_eq!(categorize_type("TEXT"), StorageClass::Text);
        assert_eq!(categorize_type("BLOB"), StorageClass::Blob);
        assert_eq!(categorize_type("NULL"), StorageClass::Null);
    }

    #[test]
    fn test_categorize_declared_types_by_affinity() {
        assert_eq!(categorize_type("bigint"), StorageClass::Integer);
        assert_eq!(categorize_type("VARCHAR(20)"), StorageClass::Text);
        assert_eq!(categorize_type("double precision"), StorageClass::Real);
        assert_eq!(categorize_type(""), StorageClass::Blob);
        assert_eq!(categorize_type("DECIMAL(10,2)"), StorageClass::Numeric);
        assert_eq!(categorize_type("BOOLEAN"), StorageClass::Numeric);
    }
}
