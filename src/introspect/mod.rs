//! Database introspection
//!
//! Raw schema metadata as read from a live database (or a recorded
//! snapshot of one). Analysis only ever talks to a [`SchemaProvider`];
//! each supported database has its own feature-gated submodule.

use serde::{Deserialize, Serialize};

use crate::prelude::OrmliftError;
use crate::schema::{DbType, Value};

mod snapshot;

pub use snapshot::{SnapshotProvider, SnapshotTable};

/// A row returned by [`SchemaProvider::rows_for_table`]
pub type Row = Vec<Value>;

/// One column as reported by the database
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub db_type: DbType,
    pub max_length: Option<u32>,
    pub default: Option<String>,
    pub primary_key: bool,
    pub not_null: bool,
    pub identity: bool,
    pub unique: bool,
    pub timestamp: bool,
    pub comment: Option<String>,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, db_type: DbType) -> Self {
        Self {
            name: name.into(),
            db_type,
            ..Self::default()
        }
    }

    /// Primary key columns are implicitly NOT NULL
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.not_null = true;
        self
    }

    pub fn identity(mut self) -> Self {
        self.identity = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn timestamp(mut self) -> Self {
        self.timestamp = true;
        self
    }

    pub fn with_length(mut self, length: u32) -> Self {
        self.max_length = Some(length);
        self
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

/// A foreign key constraint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForeignKeyDescriptor {
    pub key_name: String,
    pub column_names: Vec<String>,
    pub reference_table: String,
    pub reference_columns: Vec<String>,
}

impl ForeignKeyDescriptor {
    pub fn new(
        key_name: impl Into<String>,
        column_names: Vec<String>,
        reference_table: impl Into<String>,
        reference_columns: Vec<String>,
    ) -> Self {
        Self {
            key_name: key_name.into(),
            column_names,
            reference_table: reference_table.into(),
            reference_columns,
        }
    }

    /// Single-column foreign key
    pub fn single(
        key_name: impl Into<String>,
        column: impl Into<String>,
        reference_table: impl Into<String>,
        reference_column: impl Into<String>,
    ) -> Self {
        Self::new(
            key_name,
            vec![column.into()],
            reference_table,
            vec![reference_column.into()],
        )
    }
}

/// An index as reported by the database
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexDescriptor {
    pub key_name: String,
    pub unique: bool,
    pub primary_key: bool,
    pub column_names: Vec<String>,
}

impl IndexDescriptor {
    pub fn new(key_name: impl Into<String>, unique: bool, column_names: Vec<String>) -> Self {
        Self {
            key_name: key_name.into(),
            unique,
            primary_key: false,
            column_names,
        }
    }
}

/// Source of raw schema metadata
pub trait SchemaProvider {
    /// All table names in the schema
    fn list_tables(&mut self) -> Result<Vec<String>, OrmliftError>;

    /// Columns of a table, in declaration order
    fn fields_for_table(&mut self, table: &str) -> Result<Vec<FieldDescriptor>, OrmliftError>;

    fn foreign_keys_for_table(
        &mut self,
        table: &str,
    ) -> Result<Vec<ForeignKeyDescriptor>, OrmliftError>;

    fn indexes_for_table(&mut self, table: &str) -> Result<Vec<IndexDescriptor>, OrmliftError>;

    /// Every row of a table, cells in column order; used to load type
    /// table rows
    ///
    /// Implementations quote and qualify the table name themselves.
    fn rows_for_table(&mut self, table: &str) -> Result<Vec<Row>, OrmliftError>;

    /// Query profiling on the connection makes analysis unreliable
    fn profiling_enabled(&self) -> bool {
        false
    }
}

// Feature-gated database implementations
#[cfg(feature = "postgres")]
mod postgres;

#[cfg(feature = "postgres")]
pub use postgres::PostgresProvider;
