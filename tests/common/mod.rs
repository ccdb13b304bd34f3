#![allow(dead_code)]

use chrono::{DateTime, NaiveDate, Utc};
use schemadb::{BytesFormat, Database, FieldType, Record, Schema, Table, Value};
use std::collections::{BTreeMap, BTreeSet};
use tempfile::TempDir;
use uuid::Uuid;

/// A fresh database file in its own temporary directory. Keep the
/// `TempDir` alive for as long as the database is used.
pub async fn temp_database() -> (TempDir, Database) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite:{}", dir.path().join("test.db").display());
    let database = Database::open(&url).await.unwrap();
    (dir, database)
}

/// Schema with one field of every kind; everything but `id` is nullable.
pub fn dc_schema() -> Schema {
    Schema::new()
        .field("id", FieldType::Uuid)
        .field("str", FieldType::Str.nullable())
        .field("dict", FieldType::dict([("a", FieldType::Int)]).nullable())
        .field("list", FieldType::list(FieldType::Int).nullable())
        .field("_set", FieldType::set(FieldType::Str).nullable())
        .field("int", FieldType::Int.nullable())
        .field("float", FieldType::Float.nullable())
        .field("bool", FieldType::Bool.nullable())
        .field("bytes", FieldType::Bytes(BytesFormat::Byte).nullable())
        .field("date", FieldType::Date.nullable())
        .field("datetime", FieldType::DateTime.nullable())
}

/// A created `foo` table over [`dc_schema`].
pub async fn foo_table(database: &Database) -> Table {
    let table = Table::new(database.clone(), "foo", dc_schema(), "id").unwrap();
    table.create().await.unwrap();
    table
}

/// A record with every field set to null except `id`.
pub fn empty_row(id: Uuid) -> Record {
    dc_schema()
        .names()
        .map(|name| (name.to_string(), Value::Null))
        .collect::<Record>()
        .with("id", id)
}

/// A record with every field populated.
pub fn full_row(id: Uuid) -> Record {
    let date = NaiveDate::from_ymd_opt(2019, 1, 1).unwrap();
    let datetime: DateTime<Utc> = "2019-01-01T01:01:01Z".parse().unwrap();
    let set: BTreeSet<Value> = ["foo", "bar"].into_iter().map(Value::from).collect();
    Record::new()
        .with("id", id)
        .with("str", "string")
        .with(
            "dict",
            BTreeMap::from([("a".to_string(), Value::Int(1))]),
        )
        .with("list", vec![Value::Int(1), Value::Int(2), Value::Int(3)])
        .with("_set", set)
        .with("int", 1)
        .with("float", 2.3)
        .with("bool", true)
        .with("bytes", b"12345".to_vec())
        .with("date", date)
        .with("datetime", datetime)
}
