//! Schema-bound tables.
//!
//! A [`Table`] maps records of one [`Schema`] onto one SQL table. Column
//! adapters are resolved once, when the table is built; every operation
//! issues exactly one statement through the table's [`Database`], so it
//! joins the transaction scope active in the calling task.

use crate::db::adapter::{Adapter, AdapterRegistry, ColumnAdapter};
use crate::db::database::Database;
use crate::db::query::Query;
use crate::error::{DbError, DbResult};
use crate::models::{Record, Schema, SqlValue, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone)]
pub struct Table {
    database: Database,
    name: String,
    schema: Arc<Schema>,
    primary_key: String,
    /// One adapter per schema field, in schema order.
    columns: Vec<(String, ColumnAdapter)>,
}

/// Builder for [`Table`], for custom registries and per-field adapters.
pub struct TableBuilder {
    database: Database,
    name: String,
    schema: Arc<Schema>,
    primary_key: String,
    registry: AdapterRegistry,
    overrides: HashMap<String, Arc<dyn Adapter>>,
}

impl TableBuilder {
    /// Resolve adapters from `registry` instead of the SQLite default.
    pub fn registry(mut self, registry: AdapterRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Use `adapter` for `field` regardless of its kind.
    pub fn adapter(mut self, field: impl Into<String>, adapter: impl Adapter + 'static) -> Self {
        self.overrides.insert(field.into(), Arc::new(adapter));
        self
    }

    pub fn build(mut self) -> DbResult<Table> {
        if self.name.is_empty() {
            return Err(DbError::schema("table name must not be empty", ""));
        }
        if !self.schema.contains(&self.primary_key) {
            return Err(DbError::schema(
                format!("primary key '{}' is not a field", self.primary_key),
                &self.name,
            ));
        }
        if let Some(field) = self.overrides.keys().find(|f| !self.schema.contains(f)) {
            return Err(DbError::invalid_field(field.as_str(), &self.name));
        }

        let columns = self
            .schema
            .fields()
            .iter()
            .map(|field| {
                let adapter = match self.overrides.remove(&field.name) {
                    Some(adapter) => ColumnAdapter::new(field.field_type.clone(), adapter),
                    None => self.registry.adapter_for(&field.field_type)?,
                };
                Ok((field.name.clone(), adapter))
            })
            .collect::<DbResult<Vec<_>>>()?;

        Ok(Table {
            database: self.database,
            name: self.name,
            schema: self.schema,
            primary_key: self.primary_key,
            columns,
        })
    }
}

impl Table {
    /// Build a table using the default SQLite adapters.
    pub fn new(
        database: Database,
        name: impl Into<String>,
        schema: impl Into<Arc<Schema>>,
        primary_key: impl Into<String>,
    ) -> DbResult<Self> {
        Self::builder(database, name, schema, primary_key).build()
    }

    pub fn builder(
        database: Database,
        name: impl Into<String>,
        schema: impl Into<Arc<Schema>>,
        primary_key: impl Into<String>,
    ) -> TableBuilder {
        TableBuilder {
            database,
            name: name.into(),
            schema: schema.into(),
            primary_key: primary_key.into(),
            registry: AdapterRegistry::sqlite(),
            overrides: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    /// The column adapter for a field.
    pub fn adapter(&self, field: &str) -> DbResult<&ColumnAdapter> {
        self.columns
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, adapter)| adapter)
            .ok_or_else(|| DbError::invalid_field(field, &self.name))
    }

    fn encode(&self, field: &str, value: &Value) -> DbResult<SqlValue> {
        self.adapter(field)?.encode(value).map_err(|e| match e {
            DbError::InvalidValue { message } => {
                DbError::invalid_value(format!("{}.{}: {}", self.name, field, message))
            }
            other => other,
        })
    }

    fn check_fields(&self, record: &Record) -> DbResult<()> {
        match record.fields().find(|f| !self.schema.contains(f)) {
            Some(field) => Err(DbError::invalid_field(field, &self.name)),
            None => Ok(()),
        }
    }

    fn decode_row(&self, row: Vec<SqlValue>) -> DbResult<Record> {
        if row.len() != self.columns.len() {
            return Err(DbError::internal(format!(
                "expected {} columns from '{}', got {}",
                self.columns.len(),
                self.name,
                row.len()
            )));
        }
        self.columns
            .iter()
            .zip(row)
            .map(|((name, adapter), value)| Ok((name.clone(), adapter.decode(value)?)))
            .collect()
    }

    fn where_key(&self, query: &mut Query, key: &Value) -> DbResult<()> {
        let encoded = self.encode(&self.primary_key, key)?;
        query
            .text(" WHERE ")
            .identifier(&self.primary_key)
            .text(" = ")
            .param(encoded);
        Ok(())
    }

    fn column_list(&self, query: &mut Query) {
        for (i, (name, _)) in self.columns.iter().enumerate() {
            if i > 0 {
                query.text(", ");
            }
            query.identifier(name);
        }
    }

    /// Issue `CREATE TABLE`.
    pub async fn create(&self) -> DbResult<()> {
        let mut query = self.database.query();
        query.text("CREATE TABLE ").identifier(&self.name).text(" (");
        for (name, adapter) in &self.columns {
            query.identifier(name).text(" ").text(adapter.sql_type());
            if !adapter.nullable() {
                query.text(" NOT NULL");
            }
            query.text(", ");
        }
        query
            .text("PRIMARY KEY (")
            .identifier(&self.primary_key)
            .text("))");

        self.database.execute(&query).await?;
        info!(table = %self.name, columns = self.columns.len(), "Table created");
        Ok(())
    }

    /// Issue `DROP TABLE`.
    pub async fn drop(&self) -> DbResult<()> {
        let mut query = self.database.query();
        query.text("DROP TABLE ").identifier(&self.name);
        self.database.execute(&query).await?;
        info!(table = %self.name, "Table dropped");
        Ok(())
    }

    /// Insert a new row. Fields missing from `record` are stored as null.
    pub async fn insert(&self, record: &Record) -> DbResult<()> {
        self.check_fields(record)?;

        let mut query = self.database.query();
        query.text("INSERT INTO ").identifier(&self.name).text(" (");
        self.column_list(&mut query);
        query.text(") VALUES (");
        for (i, (name, _)) in self.columns.iter().enumerate() {
            if i > 0 {
                query.text(", ");
            }
            let value = record.get(name).unwrap_or(&Value::Null);
            query.param(self.encode(name, value)?);
        }
        query.text(")");

        match self.database.execute(&query).await {
            Ok(_) => Ok(()),
            Err(DbError::UniqueViolation { .. }) => {
                let key = record.get(&self.primary_key).unwrap_or(&Value::Null);
                Err(DbError::already_exists(&self.name, key.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    /// Read the row with primary key `key`. Every schema field is present in
    /// the returned record.
    pub async fn select(&self, key: &Value) -> DbResult<Record> {
        let mut query = self.database.query();
        query.text("SELECT ");
        self.column_list(&mut query);
        query.text(" FROM ").identifier(&self.name);
        self.where_key(&mut query, key)?;

        let row = self
            .database
            .fetch(&query)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found(&self.name, key.to_string()))?;
        self.decode_row(row)
    }

    /// Replace every non-key column of the row keyed by `record`'s primary
    /// key. Fields missing from `record` are stored as null.
    pub async fn update(&self, record: &Record) -> DbResult<()> {
        self.check_fields(record)?;
        let key = record.get(&self.primary_key).unwrap_or(&Value::Null);

        let values: Vec<(&str, &Value)> = self
            .columns
            .iter()
            .map(|(name, _)| name.as_str())
            .filter(|name| *name != self.primary_key)
            .map(|name| (name, record.get(name).unwrap_or(&Value::Null)))
            .collect();
        self.update_columns(key, &values).await
    }

    /// Update only the fields present in `partial`. The primary key can not
    /// be changed; an empty patch only checks that the row exists.
    pub async fn patch(&self, key: &Value, partial: &Record) -> DbResult<()> {
        self.check_fields(partial)?;
        if partial
            .get(&self.primary_key)
            .is_some_and(|patched| patched != key)
        {
            return Err(DbError::invalid_field(&self.primary_key, &self.name));
        }

        let values: Vec<(&str, &Value)> = partial
            .iter()
            .filter(|(name, _)| *name != self.primary_key)
            .collect();
        self.update_columns(key, &values).await
    }

    async fn update_columns(&self, key: &Value, values: &[(&str, &Value)]) -> DbResult<()> {
        if values.is_empty() {
            self.select(key).await?;
            return Ok(());
        }

        let mut query = self.database.query();
        query.text("UPDATE ").identifier(&self.name).text(" SET ");
        for (i, (name, value)) in values.iter().enumerate() {
            if i > 0 {
                query.text(", ");
            }
            query
                .identifier(name)
                .text(" = ")
                .param(self.encode(name, value)?);
        }
        self.where_key(&mut query, key)?;

        if self.database.execute(&query).await? == 0 {
            return Err(DbError::not_found(&self.name, key.to_string()));
        }
        Ok(())
    }

    /// Delete the row with primary key `key`.
    pub async fn delete(&self, key: &Value) -> DbResult<()> {
        let mut query = self.database.query();
        query.text("DELETE FROM ").identifier(&self.name);
        self.where_key(&mut query, key)?;

        if self.database.execute(&query).await? == 0 {
            return Err(DbError::not_found(&self.name, key.to_string()));
        }
        Ok(())
    }

    /// Primary keys of all rows, or of the rows matching `filter` (a
    /// condition built with [`Database::query`]). Order is unspecified.
    pub async fn list(&self, filter: Option<&Query>) -> DbResult<Vec<Value>> {
        let mut query = self.database.query();
        query
            .text("SELECT ")
            .identifier(&self.primary_key)
            .text(" FROM ")
            .identifier(&self.name);
        if let Some(filter) = filter.filter(|f| !f.is_empty()) {
            query.text(" WHERE ").append(filter);
        }

        let key_adapter = self.adapter(&self.primary_key)?;
        self.database
            .fetch(&query)
            .await?
            .into_iter()
            .map(|row| match row.into_iter().next() {
                Some(value) => key_adapter.decode(value),
                None => Err(DbError::internal("empty row in key listing")),
            })
            .collect()
    }
}
