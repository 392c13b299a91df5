//! Schema data structures
//!
//! These types represent the annotated object model and form the contract
//! between analysis (produces) and code templates (consume). Everything
//! here is built once per analysis pass and read-only afterwards.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Raw database column type as reported by a schema provider
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DbType {
    Bit,
    Blob,
    Char,
    Date,
    DateTime,
    Float,
    Integer,
    Time,
    #[default]
    VarChar,
    Json,
    /// Anything else the provider reported; rejected by analysis
    Other(String),
}

impl DbType {
    pub fn parse(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "bit" | "bool" | "boolean" => DbType::Bit,
            "blob" | "text" => DbType::Blob,
            "char" => DbType::Char,
            "date" => DbType::Date,
            "datetime" | "timestamp" => DbType::DateTime,
            "float" | "double" | "decimal" => DbType::Float,
            "integer" | "int" => DbType::Integer,
            "time" => DbType::Time,
            "varchar" => DbType::VarChar,
            "json" => DbType::Json,
            _ => DbType::Other(name.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            DbType::Bit => "bit",
            DbType::Blob => "blob",
            DbType::Char => "char",
            DbType::Date => "date",
            DbType::DateTime => "datetime",
            DbType::Float => "float",
            DbType::Integer => "integer",
            DbType::Time => "time",
            DbType::VarChar => "varchar",
            DbType::Json => "json",
            DbType::Other(name) => name,
        }
    }
}

impl From<String> for DbType {
    fn from(name: String) -> Self {
        DbType::parse(&name)
    }
}

impl From<DbType> for String {
    fn from(db_type: DbType) -> Self {
        db_type.as_str().to_string()
    }
}

impl fmt::Display for DbType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type a column is exposed as in generated code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableType {
    Boolean,
    Integer,
    Float,
    String,
    DateTime,
}

impl VariableType {
    /// Variable name prefix
    pub fn prefix(self) -> &'static str {
        match self {
            VariableType::Boolean => "bln",
            VariableType::Integer => "int",
            VariableType::Float => "flt",
            VariableType::String => "str",
            VariableType::DateTime => "dtt",
        }
    }

    /// Name used when casting values to this type
    pub fn cast_name(self) -> &'static str {
        match self {
            VariableType::Boolean => "boolean",
            VariableType::Integer => "integer",
            VariableType::Float => "float",
            VariableType::String => "string",
            VariableType::DateTime => "datetime",
        }
    }
}

/// Parsed column default
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DefaultValue {
    Integer(i64),
    Float(f64),
    Text(String),
}

/// A single cell value read from a table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl Value {
    /// Interpret a cell a driver reported as text, given its column type
    ///
    /// Only numeric and boolean columns are converted; everything else
    /// stays text, so `"007"` in a varchar column is kept as is.
    pub fn from_text(text: &str, db_type: &DbType) -> Self {
        let parsed = match db_type {
            DbType::Integer => text.trim().parse().ok().map(Value::Integer),
            DbType::Float => text.trim().parse().ok().map(Value::Float),
            DbType::Bit => match text.trim() {
                "t" | "true" | "1" => Some(Value::Bool(true)),
                "f" | "false" | "0" => Some(Value::Bool(false)),
                _ => None,
            },
            _ => None,
        };
        parsed.unwrap_or_else(|| Value::Text(text.to_string()))
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Bool(b) => Some(i64::from(*b)),
            Value::Text(s) => s.trim().parse().ok(),
            Value::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Bool(b) => Some(b.to_string()),
            Value::Integer(i) => Some(i.to_string()),
            Value::Float(f) => Some(f.to_string()),
            Value::Text(s) => Some(s.clone()),
        }
    }

    /// Convert to the representation of `variable_type`, falling back to
    /// `Null` when the value cannot be represented
    pub fn coerce(&self, variable_type: VariableType) -> Value {
        match (self, variable_type) {
            (Value::Null, _) => Value::Null,
            (_, VariableType::Integer) => self.as_integer().map_or(Value::Null, Value::Integer),
            (Value::Integer(i), VariableType::Float) => Value::Float(*i as f64),
            (Value::Float(f), VariableType::Float) => Value::Float(*f),
            (Value::Text(s), VariableType::Float) => {
                s.trim().parse().map_or(Value::Null, Value::Float)
            }
            (Value::Bool(b), VariableType::Boolean) => Value::Bool(*b),
            (_, VariableType::Boolean) => match self.as_integer() {
                Some(i) => Value::Bool(i != 0),
                None => match self.as_text().as_deref() {
                    Some("true") | Some("t") => Value::Bool(true),
                    Some("false") | Some("f") => Value::Bool(false),
                    _ => Value::Null,
                },
            },
            (_, VariableType::String) | (_, VariableType::DateTime) => {
                self.as_text().map_or(Value::Null, Value::Text)
            }
            _ => Value::Null,
        }
    }
}

/// Options read from JSON embedded in a column comment
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommentOptions(pub BTreeMap<String, serde_json::Value>);

/// Options supplied by the external override store
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExternalOptions(pub BTreeMap<String, serde_json::Value>);

/// Merged per-field generator options
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ColumnOptions(BTreeMap<String, serde_json::Value>);

impl ColumnOptions {
    /// External overrides win over comment-embedded options
    pub fn merge(comment: CommentOptions, external: ExternalOptions) -> Self {
        let mut options = comment.0;
        options.extend(external.0);
        Self(options)
    }

    /// Layer further external overrides on top of the current options
    pub fn overlay(self, external: ExternalOptions) -> Self {
        Self::merge(CommentOptions(self.0), external)
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl From<ExternalOptions> for ColumnOptions {
    fn from(external: ExternalOptions) -> Self {
        Self(external.0)
    }
}

/// A table column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    /// Owning table name, kept for diagnostics
    pub table_name: String,
    pub name: String,
    pub primary_key: bool,
    pub identity: bool,
    pub not_null: bool,
    pub unique: bool,
    pub indexed: bool,
    pub timestamp: bool,
    /// Generated code refreshes the timestamp on save
    pub auto_update: bool,
    pub db_type: DbType,
    pub variable_type: VariableType,
    /// Type name generated code casts raw values to
    pub cast_type: &'static str,
    pub variable_name: String,
    pub property_name: String,
    pub length: Option<u32>,
    pub default: Option<DefaultValue>,
    pub comment: Option<String>,
    pub options: ColumnOptions,
    pub reference: Option<Reference>,
}

/// Forward view of a foreign key, held by the owning column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reference {
    pub key_name: String,
    /// Referenced table
    pub table: String,
    /// Referenced column
    pub column: String,
    /// Class name of the referenced table
    pub variable_type: String,
    /// Logical name of the referenced object (`person_id` -> `person`)
    pub name: String,
    pub property_name: String,
    pub variable_name: String,
    pub is_type: bool,
    /// Position of the mirrored entry in the referenced table's
    /// `reverse_references`
    pub reverse_reference: Option<usize>,
}

/// Backward view of a foreign key, held by the referenced table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReverseReference {
    pub key_name: String,
    /// Referencing table
    pub table: String,
    /// Referencing column
    pub column: String,
    pub not_null: bool,
    pub unique: bool,
    pub property_name: String,
    pub variable_name: String,
    pub variable_type: String,
    pub object_description: String,
    pub object_description_plural: String,
    /// One-to-one navigation member; `None` for one-to-many
    pub object_member_variable: Option<String>,
    pub object_property_name: Option<String>,
    pub options: ColumnOptions,
}

/// One half of a many-to-many relationship through an association table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManyToManyReference {
    pub key_name: String,
    /// Association table
    pub table: String,
    pub column: String,
    pub property_name: String,
    pub opposite_column: String,
    pub opposite_variable_name: String,
    pub opposite_property_name: String,
    pub opposite_variable_type: VariableType,
    pub opposite_db_type: DbType,
    pub opposite_object_description: String,
    /// Table on the other side of the association
    pub associated_table: String,
    pub variable_name: String,
    pub variable_type: String,
    pub object_description: String,
    pub object_description_plural: String,
    pub is_type_association: bool,
    pub options: ColumnOptions,
}

/// Table index
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Index {
    pub key_name: String,
    pub unique: bool,
    pub primary_key: bool,
    /// Created by analysis for an unindexed foreign key column
    pub synthesized: bool,
    pub column_names: Vec<String>,
}

/// Analyzed regular table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    pub database_index: usize,
    pub name: String,
    pub class_name: String,
    pub class_name_plural: String,
    /// Keyed by lowercased column name
    pub columns: BTreeMap<String, Column>,
    /// Column names that form the primary key (in order)
    pub primary_key: Vec<String>,
    pub reverse_references: Vec<ReverseReference>,
    pub many_to_many_references: Vec<ManyToManyReference>,
    pub indexes: Vec<Index>,
}

impl Table {
    /// Case-insensitive column lookup
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.get(&name.to_lowercase())
    }

    /// Get primary key columns in order
    pub fn primary_key_columns(&self) -> Vec<&Column> {
        self.primary_key
            .iter()
            .filter_map(|pk_name| self.column(pk_name))
            .collect()
    }

    /// Number of foreign key columns
    pub fn reference_count(&self) -> usize {
        self.columns
            .values()
            .filter(|col| col.reference.is_some())
            .count()
    }
}

/// Analyzed enumeration table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeTable {
    pub name: String,
    pub class_name: String,
    /// id -> display name
    pub names: BTreeMap<i64, String>,
    /// id -> identifier-safe token
    pub tokens: BTreeMap<i64, String>,
    /// Columns after the id and name columns
    pub extra_fields: Vec<Column>,
    /// id -> column name -> value
    pub extra_values: BTreeMap<i64, BTreeMap<String, Value>>,
    pub key_column: Column,
}

/// The annotated model for one data source
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Schema {
    pub database_index: usize,
    /// Keyed by lowercased table name
    pub tables: BTreeMap<String, Table>,
    /// Keyed by lowercased table name
    pub type_tables: BTreeMap<String, TypeTable>,
    /// Lowercased names of tables skipped by configuration
    pub excluded: BTreeSet<String>,
}

impl Schema {
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(&name.to_lowercase())
    }

    pub fn type_table(&self, name: &str) -> Option<&TypeTable> {
        self.type_tables.get(&name.to_lowercase())
    }

    /// Follow a forward reference to its mirrored reverse reference
    pub fn reverse_reference_of(&self, reference: &Reference) -> Option<&ReverseReference> {
        let index = reference.reverse_reference?;
        self.table(&reference.table)?.reverse_references.get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(name: &str, primary_key: bool, identity: bool) -> Column {
        Column {
            table_name: "users".to_string(),
            name: name.to_string(),
            primary_key,
            identity,
            not_null: true,
            unique: primary_key,
            indexed: primary_key,
            timestamp: false,
            auto_update: false,
            db_type: DbType::Integer,
            variable_type: VariableType::Integer,
            cast_type: "integer",
            variable_name: format!("int{}", name),
            property_name: name.to_string(),
            length: None,
            default: None,
            comment: None,
            options: ColumnOptions::default(),
            reference: None,
        }
    }

    fn table(columns: Vec<Column>) -> Table {
        Table {
            database_index: 0,
            name: "users".to_string(),
            class_name: "Users".to_string(),
            class_name_plural: "Userses".to_string(),
            primary_key: columns
                .iter()
                .filter(|c| c.primary_key)
                .map(|c| c.name.clone())
                .collect(),
            columns: columns
                .into_iter()
                .map(|c| (c.name.to_lowercase(), c))
                .collect(),
            reverse_references: vec![],
            many_to_many_references: vec![],
            indexes: vec![],
        }
    }

    #[test]
    fn test_primary_key_columns_and_lookup() {
        let table = table(vec![column("Tenant", true, false), column("id", true, false)]);

        let names: Vec<_> = table
            .primary_key_columns()
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(names, vec!["Tenant", "id"]);
        assert!(table.column("TENANT").is_some());
        assert_eq!(table.reference_count(), 0);
    }

    #[test]
    fn test_db_type_parse() {
        assert_eq!(DbType::parse("VARCHAR"), DbType::VarChar);
        assert_eq!(DbType::parse("int"), DbType::Integer);
        assert_eq!(DbType::parse("uuid"), DbType::Other("uuid".to_string()));
        assert_eq!(String::from(DbType::DateTime), "datetime");
    }

    #[test]
    fn test_options_external_wins() {
        let comment = CommentOptions(BTreeMap::from([
            ("Timestamp".to_string(), serde_json::json!(true)),
            ("Label".to_string(), serde_json::json!("from comment")),
        ]));
        let external = ExternalOptions(BTreeMap::from([(
            "Label".to_string(),
            serde_json::json!("from store"),
        )]));

        let options = ColumnOptions::merge(comment, external);
        assert_eq!(options.len(), 2);
        assert_eq!(options.get("Label"), Some(&serde_json::json!("from store")));
    }

    #[test]
    fn test_value_coerce() {
        assert_eq!(
            Value::Text("12".to_string()).coerce(VariableType::Integer),
            Value::Integer(12)
        );
        assert_eq!(Value::Integer(1).coerce(VariableType::Boolean), Value::Bool(true));
        assert_eq!(
            Value::Integer(3).coerce(VariableType::String),
            Value::Text("3".to_string())
        );
        assert_eq!(Value::Text("x".to_string()).coerce(VariableType::Float), Value::Null);
    }

    #[test]
    fn test_value_from_text_follows_column_type() {
        assert_eq!(Value::from_text("007", &DbType::VarChar), Value::Text("007".to_string()));
        assert_eq!(Value::from_text("007", &DbType::Integer), Value::Integer(7));
        assert_eq!(Value::from_text("2.5", &DbType::Float), Value::Float(2.5));
        assert_eq!(Value::from_text("t", &DbType::Bit), Value::Bool(true));
        assert_eq!(Value::from_text("n/a", &DbType::Integer), Value::Text("n/a".to_string()));
    }
}
