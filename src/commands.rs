//! Command handlers for the `schemadb` tool.
//!
//! Each handler runs one [`Command`] against a [`TableResource`] and returns
//! the text to print. Keys on the command line use the string form of the
//! primary key type; records use the schema's JSON form.

use crate::config::{Command, Config};
use crate::db::{Database, Query, Table};
use crate::error::{DbError, DbResult};
use crate::models::{Record, TableDefinition, Value};
use crate::resource::{ResourceError, TableResource};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum CommandError {
    #[error(transparent)]
    Database(#[from] DbError),

    #[error(transparent)]
    Resource(#[from] ResourceError),
}

/// Load the table definition and connect to the configured database.
pub async fn open(config: &Config) -> DbResult<TableResource> {
    let definition = TableDefinition::load(&config.definition)?;
    let schema = definition.schema()?;
    let database = Database::connect(&config.database).await?;
    let table = Table::new(
        database,
        definition.table.as_str(),
        schema,
        definition.primary_key.as_str(),
    )?;
    info!(table = %table.name(), "Opened table");
    Ok(TableResource::new(table))
}

/// Run a command and return its output.
pub async fn execute(resource: &TableResource, command: &Command) -> Result<String, CommandError> {
    let table = resource.table();
    match command {
        Command::Create => {
            table.create().await?;
            Ok(format!("created table {}", table.name()))
        }
        Command::Drop => {
            table.drop().await?;
            Ok(format!("dropped table {}", table.name()))
        }
        Command::List { field, equals } => {
            let filter = match (field, equals) {
                (Some(field), Some(equals)) => Some(equals_filter(table, field, equals)?),
                _ => None,
            };
            let keys = resource.list(filter.as_ref()).await?;
            let lines = keys
                .iter()
                .map(|key| format_key(table, key))
                .collect::<DbResult<Vec<_>>>()?;
            Ok(lines.join("\n"))
        }
        Command::Get { key } => {
            let record = resource.read(&parse_key(table, key)?).await?;
            Ok(render(table, &record)?)
        }
        Command::Put { record } => {
            let record = parse_record(table, record)?;
            let key = record
                .get(table.primary_key())
                .cloned()
                .ok_or_else(|| {
                    ResourceError::BadRequest(format!(
                        "record has no '{}' field",
                        table.primary_key()
                    ))
                })?;
            let created = put(resource, &key, &record).await?;
            let verb = if created { "created" } else { "updated" };
            Ok(format!("{} {}", verb, format_key(table, &key)?))
        }
        Command::Patch { key, record } => {
            let key = parse_key(table, key)?;
            let partial = parse_record(table, record)?;
            let record = resource.patch(&key, &partial).await?;
            Ok(render(table, &record)?)
        }
        Command::Delete { key } => {
            let key = parse_key(table, key)?;
            resource.delete(&key).await?;
            Ok(format!("deleted {}", format_key(table, &key)?))
        }
    }
}

/// Insert `record`, or replace it when `key` already exists. Returns true
/// when a new row was created.
async fn put(resource: &TableResource, key: &Value, record: &Record) -> Result<bool, ResourceError> {
    resource
        .table()
        .database()
        .transaction(|| async move {
            match resource.read(key).await {
                Ok(_) => {
                    resource.update(key, record).await?;
                    Ok(false)
                }
                Err(ResourceError::NotFound(_)) => {
                    resource.create(key, record).await?;
                    Ok(true)
                }
                Err(e) => Err(e),
            }
        })
        .await
}

fn equals_filter(table: &Table, field: &str, text: &str) -> DbResult<Query> {
    let value = table.adapter(field)?.field_type().str_decode(text)?;
    let mut filter = table.database().query();
    filter.column(table, field)?.text(" = ").value(table, field, value)?;
    Ok(filter)
}

fn parse_key(table: &Table, text: &str) -> DbResult<Value> {
    table
        .adapter(table.primary_key())?
        .field_type()
        .str_decode(text)
}

fn format_key(table: &Table, key: &Value) -> DbResult<String> {
    table
        .adapter(table.primary_key())?
        .field_type()
        .str_encode(key)
}

fn parse_record(table: &Table, text: &str) -> DbResult<Record> {
    let json: JsonValue = serde_json::from_str(text)
        .map_err(|e| DbError::invalid_input(format!("Invalid JSON record: {}", e)))?;
    table.schema().record_from_json(&json)
}

fn render(table: &Table, record: &Record) -> DbResult<String> {
    let json = table.schema().record_to_json(record)?;
    serde_json::to_string_pretty(&json)
        .map_err(|e| DbError::internal(format!("Failed to render record: {}", e)))
}
