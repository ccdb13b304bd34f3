//! Table definition files.
//!
//! A definition file is a JSON document naming a table, its primary key and
//! its fields. It is turned into a [`Schema`] for the command-line tool.

use crate::error::{DbError, DbResult};
use crate::models::schema::{BytesFormat, FieldType, Schema};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableDefinition {
    pub table: String,
    pub primary_key: String,
    pub fields: Vec<FieldDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    #[serde(flatten)]
    pub spec: TypeSpec,
}

/// Type of a field, a list/set item or a dict property.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeSpec {
    #[serde(rename = "type")]
    pub type_name: TypeName,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<FormatName>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<TypeSpec>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Vec<FieldDefinition>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeName {
    String,
    Integer,
    Number,
    Boolean,
    Bytes,
    Date,
    Datetime,
    Uuid,
    Dict,
    List,
    Set,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatName {
    Binary,
    Byte,
}

impl TypeSpec {
    /// Build the field type this spec describes. `object` names the field
    /// for error messages.
    pub fn to_field_type(&self, object: &str) -> DbResult<FieldType> {
        let misplaced = |key: &str| {
            DbError::schema(
                format!("'{}' is not allowed on type {:?}", key, self.type_name),
                object,
            )
        };
        if self.format.is_some() && self.type_name != TypeName::Bytes {
            return Err(misplaced("format"));
        }
        if self.items.is_some() && !matches!(self.type_name, TypeName::List | TypeName::Set) {
            return Err(misplaced("items"));
        }
        if self.properties.is_some() && self.type_name != TypeName::Dict {
            return Err(misplaced("properties"));
        }

        let item_type = || match &self.items {
            Some(items) => items.to_field_type(&format!("{}[]", object)),
            None => Err(DbError::schema("'items' is required", object)),
        };

        let field_type = match self.type_name {
            TypeName::String => FieldType::Str,
            TypeName::Integer => FieldType::Int,
            TypeName::Number => FieldType::Float,
            TypeName::Boolean => FieldType::Bool,
            TypeName::Bytes => FieldType::Bytes(match self.format {
                Some(FormatName::Binary) => BytesFormat::Binary,
                Some(FormatName::Byte) | None => BytesFormat::Byte,
            }),
            TypeName::Date => FieldType::Date,
            TypeName::Datetime => FieldType::DateTime,
            TypeName::Uuid => FieldType::Uuid,
            TypeName::Dict => {
                let properties = self
                    .properties
                    .as_deref()
                    .ok_or_else(|| DbError::schema("'properties' is required", object))?;
                let schema = fields_to_schema(properties, object)?;
                FieldType::Dict(schema.fields().to_vec())
            }
            TypeName::List => FieldType::list(item_type()?),
            TypeName::Set => FieldType::set(item_type()?),
        };

        Ok(if self.nullable {
            field_type.nullable()
        } else {
            field_type
        })
    }
}

fn fields_to_schema(fields: &[FieldDefinition], parent: &str) -> DbResult<Schema> {
    let mut schema = Schema::new();
    for field in fields {
        let object = if parent.is_empty() {
            field.name.clone()
        } else {
            format!("{}.{}", parent, field.name)
        };
        if schema.contains(&field.name) {
            return Err(DbError::schema("duplicate field name", object));
        }
        schema = schema.field(field.name.clone(), field.spec.to_field_type(&object)?);
    }
    Ok(schema)
}

impl TableDefinition {
    pub fn from_json(text: &str) -> DbResult<Self> {
        serde_json::from_str(text)
            .map_err(|e| DbError::invalid_input(format!("Invalid table definition: {}", e)))
    }

    pub fn load(path: &Path) -> DbResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            DbError::invalid_input(format!("Cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&text)
    }

    /// Build the schema. The primary key must name one of the fields.
    pub fn schema(&self) -> DbResult<Schema> {
        let schema = fields_to_schema(&self.fields, "")?;
        if !schema.contains(&self.primary_key) {
            return Err(DbError::schema(
                "primary key is not one of the fields",
                &self.primary_key,
            ));
        }
        Ok(schema)
    }
}
