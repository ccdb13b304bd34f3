//! Parameterized query builder.
//!
//! A [`Query`] accumulates SQL text and an ordered list of parameters. Caller
//! data only ever enters as a bound parameter: [`Query::value`] encodes the
//! value with the adapter of the named table field and emits a `?`
//! placeholder. Identifiers are emitted double-quoted.

use crate::db::table::Table;
use crate::error::DbResult;
use crate::models::{SqlValue, Value};

/// Quote an SQL identifier, doubling embedded double quotes.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    sql: String,
    params: Vec<SqlValue>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append literal SQL text verbatim.
    pub fn text(&mut self, fragment: &str) -> &mut Self {
        self.sql.push_str(fragment);
        self
    }

    /// Append a placeholder bound to an already encoded parameter.
    pub fn param(&mut self, value: SqlValue) -> &mut Self {
        self.sql.push('?');
        self.params.push(value);
        self
    }

    /// Append a placeholder bound to `value`, encoded with the adapter of
    /// `field` in `table`.
    pub fn value(
        &mut self,
        table: &Table,
        field: &str,
        value: impl Into<Value>,
    ) -> DbResult<&mut Self> {
        let encoded = table.adapter(field)?.encode(&value.into())?;
        Ok(self.param(encoded))
    }

    /// Append the quoted name of a field of `table`.
    pub fn column(&mut self, table: &Table, field: &str) -> DbResult<&mut Self> {
        table.adapter(field)?;
        Ok(self.identifier(field))
    }

    /// Append a quoted identifier.
    pub fn identifier(&mut self, name: &str) -> &mut Self {
        self.sql.push_str(&quote_identifier(name));
        self
    }

    /// Append another query's text and parameters.
    pub fn append(&mut self, other: &Query) -> &mut Self {
        self.sql.push_str(&other.sql);
        self.params.extend(other.params.iter().cloned());
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[SqlValue] {
        &self.params
    }

    pub fn is_empty(&self) -> bool {
        self.sql.trim().is_empty()
    }

    pub fn build(self) -> (String, Vec<SqlValue>) {
        (self.sql, self.params)
    }
}
