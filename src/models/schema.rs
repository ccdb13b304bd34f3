//! Declarative record schemas.
//!
//! A [`Schema`] is an ordered list of named [`FieldType`] descriptors. Field
//! types form a closed sum type; adapters are resolved from the [`Kind`] tag
//! of a descriptor, and custom subtypes carry an explicit `base` so that they
//! resolve to the same kind as the type they specialize.
//!
//! Every field type defines two string forms used by the adapters and the
//! command-line tool:
//! - `str_encode`/`str_decode`: a single scalar string (dates as ISO 8601,
//!   bytes as base64, containers as JSON text)
//! - `json_encode`/`json_decode`: a `serde_json::Value`, used inside
//!   dicts, lists and sets

use crate::error::{DbError, DbResult};
use crate::models::value::{Record, Value};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use uuid::Uuid;

const DATE_FORMAT: &str = "%Y-%m-%d";
/// RFC 3339 in UTC for years 0 to 9999; other years keep chrono's signed
/// extended form.
const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.fZ";

/// How a bytes field is represented outside of memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BytesFormat {
    /// Raw octets; stored as a BLOB.
    Binary,
    /// Base64 text; stored as TEXT.
    Byte,
}

/// Kind tag of a field type. Adapter lookup is keyed by kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Str,
    Int,
    Float,
    Bool,
    Bytes(BytesFormat),
    Date,
    DateTime,
    Uuid,
    Dict,
    List,
    Set,
}

impl Kind {
    /// All kinds, in declaration order.
    pub const ALL: [Kind; 12] = [
        Kind::Str,
        Kind::Int,
        Kind::Float,
        Kind::Bool,
        Kind::Bytes(BytesFormat::Binary),
        Kind::Bytes(BytesFormat::Byte),
        Kind::Date,
        Kind::DateTime,
        Kind::Uuid,
        Kind::Dict,
        Kind::List,
        Kind::Set,
    ];
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str => write!(f, "string"),
            Self::Int => write!(f, "integer"),
            Self::Float => write!(f, "number"),
            Self::Bool => write!(f, "boolean"),
            Self::Bytes(BytesFormat::Binary) => write!(f, "bytes(binary)"),
            Self::Bytes(BytesFormat::Byte) => write!(f, "bytes(byte)"),
            Self::Date => write!(f, "date"),
            Self::DateTime => write!(f, "datetime"),
            Self::Uuid => write!(f, "uuid"),
            Self::Dict => write!(f, "dict"),
            Self::List => write!(f, "list"),
            Self::Set => write!(f, "set"),
        }
    }
}

/// A named field of a schema or of a dict type.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub field_type: FieldType,
}

impl Field {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
        }
    }
}

/// Field type descriptor.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    Str,
    Int,
    Float,
    Bool,
    Bytes(BytesFormat),
    Date,
    DateTime,
    Uuid,
    /// Structured dict with named, typed properties.
    Dict(Vec<Field>),
    List(Box<FieldType>),
    Set(Box<FieldType>),
    Nullable(Box<FieldType>),
    /// A specialization of `base`; behaves exactly like it.
    Custom { name: String, base: Box<FieldType> },
}

impl FieldType {
    pub fn bytes(format: BytesFormat) -> Self {
        Self::Bytes(format)
    }

    pub fn list(item: FieldType) -> Self {
        Self::List(Box::new(item))
    }

    pub fn set(item: FieldType) -> Self {
        Self::Set(Box::new(item))
    }

    pub fn dict<N, I>(properties: I) -> Self
    where
        N: Into<String>,
        I: IntoIterator<Item = (N, FieldType)>,
    {
        Self::Dict(
            properties
                .into_iter()
                .map(|(name, ft)| Field::new(name, ft))
                .collect(),
        )
    }

    pub fn custom(name: impl Into<String>, base: FieldType) -> Self {
        Self::Custom {
            name: name.into(),
            base: Box::new(base),
        }
    }

    /// Wrap this type so that it also accepts null. Already-nullable types
    /// are returned unchanged.
    pub fn nullable(self) -> Self {
        if self.is_nullable() {
            self
        } else {
            Self::Nullable(Box::new(self))
        }
    }

    pub fn is_nullable(&self) -> bool {
        match self {
            Self::Nullable(_) => true,
            Self::Custom { base, .. } => base.is_nullable(),
            _ => false,
        }
    }

    /// The concrete type behind any nullable or custom layers.
    pub fn resolved(&self) -> &FieldType {
        let mut current = self;
        loop {
            match current {
                Self::Nullable(inner) => current = inner,
                Self::Custom { base, .. } => current = base,
                _ => return current,
            }
        }
    }

    pub fn kind(&self) -> Kind {
        match self.resolved() {
            Self::Str => Kind::Str,
            Self::Int => Kind::Int,
            Self::Float => Kind::Float,
            Self::Bool => Kind::Bool,
            Self::Bytes(format) => Kind::Bytes(*format),
            Self::Date => Kind::Date,
            Self::DateTime => Kind::DateTime,
            Self::Uuid => Kind::Uuid,
            Self::Dict(_) => Kind::Dict,
            Self::List(_) => Kind::List,
            Self::Set(_) => Kind::Set,
            // resolved() never stops on a wrapper
            Self::Nullable(inner) | Self::Custom { base: inner, .. } => inner.kind(),
        }
    }

    fn mismatch(&self, value: &Value) -> DbError {
        DbError::invalid_value(format!("expected {}, got {}", self.kind(), value.type_name()))
    }

    /// Check that `value` is an instance of this type.
    pub fn validate(&self, value: &Value) -> DbResult<()> {
        if value.is_null() {
            return if self.is_nullable() {
                Ok(())
            } else {
                Err(DbError::invalid_value(format!(
                    "null is not allowed for non-nullable {}",
                    self.kind()
                )))
            };
        }
        match (self.resolved(), value) {
            // SQLite stores a bound NaN as NULL
            (Self::Float, Value::Float(f)) if f.is_nan() => {
                Err(DbError::invalid_value("NaN can not be stored"))
            }
            (Self::Str, Value::Str(_))
            | (Self::Int, Value::Int(_))
            | (Self::Float, Value::Float(_))
            | (Self::Bool, Value::Bool(_))
            | (Self::Bytes(_), Value::Bytes(_))
            | (Self::Date, Value::Date(_))
            | (Self::DateTime, Value::DateTime(_))
            | (Self::Uuid, Value::Uuid(_)) => Ok(()),
            (Self::Dict(properties), Value::Dict(values)) => validate_fields(properties, values),
            (Self::List(item), Value::List(items)) => {
                items.iter().try_for_each(|v| item.validate(v))
            }
            (Self::Set(item), Value::Set(items)) => items.iter().try_for_each(|v| item.validate(v)),
            _ => Err(self.mismatch(value)),
        }
    }

    /// Encode a non-null value into its string form.
    pub fn str_encode(&self, value: &Value) -> DbResult<String> {
        self.validate(value)?;
        match value {
            Value::Null => Err(DbError::invalid_value("null has no string form")),
            Value::Str(s) => Ok(s.clone()),
            Value::Int(i) => Ok(i.to_string()),
            Value::Float(f) => Ok(f.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            Value::Bytes(b) => Ok(STANDARD.encode(b)),
            Value::Date(d) => Ok(d.format(DATE_FORMAT).to_string()),
            Value::DateTime(dt) => Ok(dt.format(DATETIME_FORMAT).to_string()),
            Value::Uuid(u) => Ok(u.hyphenated().to_string()),
            Value::Dict(_) | Value::List(_) | Value::Set(_) => {
                let json = self.json_encode(value)?;
                serde_json::to_string(&json)
                    .map_err(|e| DbError::invalid_value(format!("JSON encoding failed: {}", e)))
            }
        }
    }

    /// Decode a value from its string form.
    pub fn str_decode(&self, s: &str) -> DbResult<Value> {
        let parse_error =
            |e: &dyn fmt::Display| DbError::invalid_value(format!("invalid {}: {}", self.kind(), e));
        match self.resolved() {
            Self::Str => Ok(Value::Str(s.to_string())),
            Self::Int => s.parse().map(Value::Int).map_err(|e| parse_error(&e)),
            Self::Float => s.parse().map(Value::Float).map_err(|e| parse_error(&e)),
            Self::Bool => match s {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                other => Err(parse_error(&format!("'{}' is not true or false", other))),
            },
            Self::Bytes(_) => STANDARD
                .decode(s)
                .map(Value::Bytes)
                .map_err(|e| parse_error(&e)),
            Self::Date => NaiveDate::parse_from_str(s, DATE_FORMAT)
                .map(Value::Date)
                .map_err(|e| parse_error(&e)),
            Self::DateTime => DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .or_else(|_| {
                    NaiveDateTime::parse_from_str(s, DATETIME_FORMAT).map(|dt| dt.and_utc())
                })
                .map(Value::DateTime)
                .map_err(|e| parse_error(&e)),
            Self::Uuid => Uuid::parse_str(s)
                .map(Value::Uuid)
                .map_err(|e| parse_error(&e)),
            Self::Dict(_) | Self::List(_) | Self::Set(_) => {
                let json: JsonValue = serde_json::from_str(s).map_err(|e| parse_error(&e))?;
                self.json_decode(&json)
            }
            Self::Nullable(inner) | Self::Custom { base: inner, .. } => inner.str_decode(s),
        }
    }

    /// Encode a value into its JSON form.
    pub fn json_encode(&self, value: &Value) -> DbResult<JsonValue> {
        self.validate(value)?;
        match (self.resolved(), value) {
            (_, Value::Null) => Ok(JsonValue::Null),
            (_, Value::Str(s)) => Ok(JsonValue::String(s.clone())),
            (_, Value::Int(i)) => Ok(JsonValue::Number((*i).into())),
            (_, Value::Float(f)) => serde_json::Number::from_f64(*f)
                .map(JsonValue::Number)
                .ok_or_else(|| DbError::invalid_value(format!("{} has no JSON form", f))),
            (_, Value::Bool(b)) => Ok(JsonValue::Bool(*b)),
            (Self::Dict(properties), Value::Dict(values)) => {
                let mut object = serde_json::Map::new();
                for property in properties {
                    if let Some(v) = values.get(&property.name) {
                        object.insert(property.name.clone(), property.field_type.json_encode(v)?);
                    }
                }
                Ok(JsonValue::Object(object))
            }
            (Self::List(item), Value::List(items)) => items
                .iter()
                .map(|v| item.json_encode(v))
                .collect::<DbResult<Vec<_>>>()
                .map(JsonValue::Array),
            (Self::Set(item), Value::Set(items)) => items
                .iter()
                .map(|v| item.json_encode(v))
                .collect::<DbResult<Vec<_>>>()
                .map(JsonValue::Array),
            (_, other) => self.str_encode(other).map(JsonValue::String),
        }
    }

    /// Decode a value from its JSON form.
    pub fn json_decode(&self, json: &JsonValue) -> DbResult<Value> {
        if json.is_null() {
            let value = Value::Null;
            self.validate(&value)?;
            return Ok(value);
        }
        let unexpected = || {
            DbError::invalid_value(format!("expected {} in JSON, got {}", self.kind(), json))
        };
        match self.resolved() {
            Self::Int => json.as_i64().map(Value::Int).ok_or_else(unexpected),
            Self::Float => json.as_f64().map(Value::Float).ok_or_else(unexpected),
            Self::Bool => json.as_bool().map(Value::Bool).ok_or_else(unexpected),
            Self::Str | Self::Bytes(_) | Self::Date | Self::DateTime | Self::Uuid => {
                let s = json.as_str().ok_or_else(unexpected)?;
                self.str_decode(s)
            }
            Self::Dict(properties) => {
                let object = json.as_object().ok_or_else(unexpected)?;
                let mut values = BTreeMap::new();
                for (key, item) in object {
                    let property = properties
                        .iter()
                        .find(|p| &p.name == key)
                        .ok_or_else(|| {
                            DbError::invalid_value(format!("unknown dict property '{}'", key))
                        })?;
                    values.insert(key.clone(), property.field_type.json_decode(item)?);
                }
                let value = Value::Dict(values);
                self.validate(&value)?;
                Ok(value)
            }
            Self::List(item) => json
                .as_array()
                .ok_or_else(unexpected)?
                .iter()
                .map(|v| item.json_decode(v))
                .collect::<DbResult<Vec<_>>>()
                .map(Value::List),
            Self::Set(item) => json
                .as_array()
                .ok_or_else(unexpected)?
                .iter()
                .map(|v| item.json_decode(v))
                .collect::<DbResult<BTreeSet<_>>>()
                .map(Value::Set),
            Self::Nullable(inner) | Self::Custom { base: inner, .. } => inner.json_decode(json),
        }
    }
}

/// Validate named values against a list of fields. Fields without a value
/// are treated as null.
fn validate_fields(fields: &[Field], values: &BTreeMap<String, Value>) -> DbResult<()> {
    if let Some(name) = values.keys().find(|k| !fields.iter().any(|f| &f.name == *k)) {
        return Err(DbError::invalid_value(format!("unknown field '{}'", name)));
    }
    for field in fields {
        let value = values.get(&field.name).unwrap_or(&Value::Null);
        field.field_type.validate(value).map_err(|e| match e {
            DbError::InvalidValue { message } => {
                DbError::invalid_value(format!("{}: {}", field.name, message))
            }
            other => other,
        })?;
    }
    Ok(())
}

/// An ordered, immutable-once-built set of named field types.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    fields: Vec<Field>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field. A field with the same name replaces the earlier one in
    /// place, keeping its position.
    pub fn field(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        let field = Field::new(name, field_type);
        match self.fields.iter_mut().find(|f| f.name == field.name) {
            Some(existing) => *existing = field,
            None => self.fields.push(field),
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldType> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| &f.field_type)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Validate a full record: no unknown fields, every value matches its
    /// type, absent fields must be nullable.
    pub fn validate(&self, record: &Record) -> DbResult<()> {
        validate_fields(&self.fields, record.as_map())
    }

    /// Render a record as a JSON object in schema field order.
    pub fn record_to_json(&self, record: &Record) -> DbResult<JsonValue> {
        let mut object = serde_json::Map::new();
        for field in &self.fields {
            if let Some(value) = record.get(&field.name) {
                object.insert(field.name.clone(), field.field_type.json_encode(value)?);
            }
        }
        Ok(JsonValue::Object(object))
    }

    /// Parse a record from a JSON object.
    pub fn record_from_json(&self, json: &JsonValue) -> DbResult<Record> {
        let object = json
            .as_object()
            .ok_or_else(|| DbError::invalid_input("a record must be a JSON object"))?;
        let mut record = Record::new();
        for (name, item) in object {
            let field_type = self
                .get(name)
                .ok_or_else(|| DbError::invalid_value(format!("unknown field '{}'", name)))?;
            record.insert(name.clone(), field_type.json_decode(item)?);
        }
        Ok(record)
    }
}
