//! Type adapters.
//!
//! An [`Adapter`] translates between in-memory [`Value`]s of one kind and the
//! SQLite storage class used to persist them. Adapters are stateless; the
//! field type they operate on is passed to every call, which lets one adapter
//! serve all field types of a kind (including custom subtypes and container
//! item types).
//!
//! | kind | column type | stored as |
//! |---|---|---|
//! | string | TEXT | text |
//! | integer | INTEGER | integer |
//! | number | REAL | real |
//! | boolean | INTEGER | 0 or 1 |
//! | bytes (binary) | BLOB | raw octets |
//! | bytes (byte), date, datetime, uuid | TEXT | string form |
//! | dict, list, set | TEXT | canonical JSON text |
//!
//! [`AdapterRegistry`] maps kinds to adapters, and [`ColumnAdapter`] binds an
//! adapter to a field type, handling the nullable wrapper.

use crate::error::{DbError, DbResult};
use crate::models::{BytesFormat, FieldType, Kind, SqlValue, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Bidirectional value encoder for one kind of field type.
///
/// `encode` and `decode` are only called with non-null values; null handling
/// belongs to [`ColumnAdapter`].
pub trait Adapter: fmt::Debug + Send + Sync {
    /// Column type used in `CREATE TABLE`.
    fn sql_type(&self) -> &'static str;

    fn encode(&self, field_type: &FieldType, value: &Value) -> DbResult<SqlValue>;

    fn decode(&self, field_type: &FieldType, value: SqlValue) -> DbResult<Value>;
}

fn unexpected_value(field_type: &FieldType, value: &Value) -> DbError {
    DbError::invalid_value(format!(
        "cannot encode {} as {}",
        value.type_name(),
        field_type.kind()
    ))
}

fn unexpected_column(field_type: &FieldType, value: &SqlValue) -> DbError {
    DbError::invalid_value(format!(
        "cannot decode {} from a {} column value",
        field_type.kind(),
        value.type_name()
    ))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TextAdapter;

impl Adapter for TextAdapter {
    fn sql_type(&self) -> &'static str {
        "TEXT"
    }

    fn encode(&self, field_type: &FieldType, value: &Value) -> DbResult<SqlValue> {
        match value {
            Value::Str(s) => Ok(SqlValue::Text(s.clone())),
            other => Err(unexpected_value(field_type, other)),
        }
    }

    fn decode(&self, field_type: &FieldType, value: SqlValue) -> DbResult<Value> {
        match value {
            SqlValue::Text(s) => Ok(Value::Str(s)),
            other => Err(unexpected_column(field_type, &other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IntegerAdapter;

impl Adapter for IntegerAdapter {
    fn sql_type(&self) -> &'static str {
        "INTEGER"
    }

    fn encode(&self, field_type: &FieldType, value: &Value) -> DbResult<SqlValue> {
        match value {
            Value::Int(i) => Ok(SqlValue::Integer(*i)),
            other => Err(unexpected_value(field_type, other)),
        }
    }

    fn decode(&self, field_type: &FieldType, value: SqlValue) -> DbResult<Value> {
        match value {
            SqlValue::Integer(i) => Ok(Value::Int(i)),
            other => Err(unexpected_column(field_type, &other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RealAdapter;

impl Adapter for RealAdapter {
    fn sql_type(&self) -> &'static str {
        "REAL"
    }

    fn encode(&self, field_type: &FieldType, value: &Value) -> DbResult<SqlValue> {
        match value {
            Value::Float(f) => Ok(SqlValue::Real(*f)),
            other => Err(unexpected_value(field_type, other)),
        }
    }

    fn decode(&self, field_type: &FieldType, value: SqlValue) -> DbResult<Value> {
        match value {
            SqlValue::Real(f) => Ok(Value::Float(f)),
            // REAL affinity stores integral values written by other clients as integers
            SqlValue::Integer(i) => Ok(Value::Float(i as f64)),
            other => Err(unexpected_column(field_type, &other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BooleanAdapter;

impl Adapter for BooleanAdapter {
    fn sql_type(&self) -> &'static str {
        "INTEGER"
    }

    fn encode(&self, field_type: &FieldType, value: &Value) -> DbResult<SqlValue> {
        match value {
            Value::Bool(b) => Ok(SqlValue::Integer(i64::from(*b))),
            other => Err(unexpected_value(field_type, other)),
        }
    }

    fn decode(&self, field_type: &FieldType, value: SqlValue) -> DbResult<Value> {
        match value {
            SqlValue::Integer(i) => Ok(Value::Bool(i != 0)),
            other => Err(unexpected_column(field_type, &other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BlobAdapter;

impl Adapter for BlobAdapter {
    fn sql_type(&self) -> &'static str {
        "BLOB"
    }

    fn encode(&self, field_type: &FieldType, value: &Value) -> DbResult<SqlValue> {
        match value {
            Value::Bytes(b) => Ok(SqlValue::Blob(b.clone())),
            other => Err(unexpected_value(field_type, other)),
        }
    }

    fn decode(&self, field_type: &FieldType, value: SqlValue) -> DbResult<Value> {
        match value {
            SqlValue::Blob(b) => Ok(Value::Bytes(b)),
            other => Err(unexpected_column(field_type, &other)),
        }
    }
}

/// Stores a value as the string form of its field type: base64 for bytes,
/// ISO 8601 for dates, hyphenated UUIDs, JSON text for containers.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringFormAdapter;

impl Adapter for StringFormAdapter {
    fn sql_type(&self) -> &'static str {
        "TEXT"
    }

    fn encode(&self, field_type: &FieldType, value: &Value) -> DbResult<SqlValue> {
        field_type.str_encode(value).map(SqlValue::Text)
    }

    fn decode(&self, field_type: &FieldType, value: SqlValue) -> DbResult<Value> {
        match value {
            SqlValue::Text(s) => field_type.str_decode(&s),
            other => Err(unexpected_column(field_type, &other)),
        }
    }
}

/// An adapter bound to one field type.
#[derive(Debug, Clone)]
pub struct ColumnAdapter {
    field_type: FieldType,
    adapter: Arc<dyn Adapter>,
}

impl ColumnAdapter {
    pub fn new(field_type: FieldType, adapter: Arc<dyn Adapter>) -> Self {
        Self {
            field_type,
            adapter,
        }
    }

    pub fn field_type(&self) -> &FieldType {
        &self.field_type
    }

    pub fn sql_type(&self) -> &'static str {
        self.adapter.sql_type()
    }

    pub fn nullable(&self) -> bool {
        self.field_type.is_nullable()
    }

    pub fn encode(&self, value: &Value) -> DbResult<SqlValue> {
        self.field_type.validate(value)?;
        if value.is_null() {
            return Ok(SqlValue::Null);
        }
        self.adapter.encode(&self.field_type, value)
    }

    pub fn decode(&self, value: SqlValue) -> DbResult<Value> {
        if value.is_null() {
            return if self.nullable() {
                Ok(Value::Null)
            } else {
                Err(DbError::invalid_value(format!(
                    "NULL stored in non-nullable {} column",
                    self.field_type.kind()
                )))
            };
        }
        self.adapter.decode(&self.field_type, value)
    }
}

/// Kind to adapter mapping. Passed explicitly to tables; there is no global
/// registry.
#[derive(Debug, Clone)]
pub struct AdapterRegistry {
    adapters: HashMap<Kind, Arc<dyn Adapter>>,
}

impl AdapterRegistry {
    /// A registry with no adapters.
    pub fn empty() -> Self {
        Self {
            adapters: HashMap::new(),
        }
    }

    /// The default SQLite registry, covering every kind.
    pub fn sqlite() -> Self {
        Self::empty()
            .register(Kind::Str, TextAdapter)
            .register(Kind::Int, IntegerAdapter)
            .register(Kind::Float, RealAdapter)
            .register(Kind::Bool, BooleanAdapter)
            .register(Kind::Bytes(BytesFormat::Binary), BlobAdapter)
            .register(Kind::Bytes(BytesFormat::Byte), StringFormAdapter)
            .register(Kind::Date, StringFormAdapter)
            .register(Kind::DateTime, StringFormAdapter)
            .register(Kind::Uuid, StringFormAdapter)
            .register(Kind::Dict, StringFormAdapter)
            .register(Kind::List, StringFormAdapter)
            .register(Kind::Set, StringFormAdapter)
    }

    /// Register (or replace) the adapter for a kind.
    pub fn register(mut self, kind: Kind, adapter: impl Adapter + 'static) -> Self {
        self.adapters.insert(kind, Arc::new(adapter));
        self
    }

    pub fn get(&self, kind: Kind) -> Option<Arc<dyn Adapter>> {
        self.adapters.get(&kind).cloned()
    }

    /// Resolve the adapter for a field type.
    pub fn adapter_for(&self, field_type: &FieldType) -> DbResult<ColumnAdapter> {
        let kind = field_type.kind();
        let adapter = self
            .get(kind)
            .ok_or_else(|| DbError::adapter_not_found(kind.to_string()))?;
        Ok(ColumnAdapter::new(field_type.clone(), adapter))
    }
}
