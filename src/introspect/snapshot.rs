//! Recorded schema snapshots
//!
//! A JSON document describing tables, their metadata and (for type tables)
//! their rows. Useful for analyzing a schema without a live connection and
//! as the fixture source for tests.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::{FieldDescriptor, ForeignKeyDescriptor, IndexDescriptor, Row, SchemaProvider};
use crate::prelude::OrmliftError;

const SNAPSHOT_SCHEMA: &str = "snapshot";

/// One table in a snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotTable {
    pub name: String,
    pub fields: Vec<FieldDescriptor>,
    pub foreign_keys: Vec<ForeignKeyDescriptor>,
    pub indexes: Vec<IndexDescriptor>,
    pub rows: Vec<Row>,
}

impl SnapshotTable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    pub fn foreign_key(mut self, foreign_key: ForeignKeyDescriptor) -> Self {
        self.foreign_keys.push(foreign_key);
        self
    }

    pub fn index(mut self, index: IndexDescriptor) -> Self {
        self.indexes.push(index);
        self
    }

    pub fn row(mut self, row: Row) -> Self {
        self.rows.push(row);
        self
    }
}

/// [`SchemaProvider`] backed by an in-memory snapshot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotProvider {
    pub tables: Vec<SnapshotTable>,
    pub profiling: bool,
}

impl SnapshotProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, table: SnapshotTable) -> Self {
        self.tables.push(table);
        self
    }

    pub fn from_json(json: &str) -> Result<Self, OrmliftError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a snapshot file
    pub fn load(path: &Path) -> Result<Self, OrmliftError> {
        debug!(path = ?path, "Loading schema snapshot");
        let json = fs::read_to_string(path).map_err(|e| OrmliftError::Introspection {
            schema: SNAPSHOT_SCHEMA.to_string(),
            message: format!("Failed to read {}: {}", path.display(), e),
        })?;
        Self::from_json(&json)
    }

    fn table(&self, name: &str) -> Result<&SnapshotTable, OrmliftError> {
        self.tables
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| OrmliftError::Introspection {
                schema: SNAPSHOT_SCHEMA.to_string(),
                message: format!("Table '{}' does not exist", name),
            })
    }
}

impl SchemaProvider for SnapshotProvider {
    fn list_tables(&mut self) -> Result<Vec<String>, OrmliftError> {
        Ok(self.tables.iter().map(|t| t.name.clone()).collect())
    }

    fn fields_for_table(&mut self, table: &str) -> Result<Vec<FieldDescriptor>, OrmliftError> {
        Ok(self.table(table)?.fields.clone())
    }

    fn foreign_keys_for_table(
        &mut self,
        table: &str,
    ) -> Result<Vec<ForeignKeyDescriptor>, OrmliftError> {
        Ok(self.table(table)?.foreign_keys.clone())
    }

    fn indexes_for_table(&mut self, table: &str) -> Result<Vec<IndexDescriptor>, OrmliftError> {
        Ok(self.table(table)?.indexes.clone())
    }

    fn rows_for_table(&mut self, table: &str) -> Result<Vec<Row>, OrmliftError> {
        trace!(table = ?table, "Reading snapshot rows");
        Ok(self.table(table)?.rows.clone())
    }

    fn profiling_enabled(&self) -> bool {
        self.profiling
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{DbType, Value};

    #[test]
    fn test_snapshot_from_json() {
        let json = r#"{
            "tables": [
                {
                    "name": "role_type",
                    "fields": [
                        {"name": "id", "type": "integer", "primary_key": true, "not_null": true},
                        {"name": "name", "type": "varchar", "unique": true, "not_null": true}
                    ],
                    "rows": [[1, "Admin"], [2, "Guest"]]
                }
            ]
        }"#;

        let mut provider = SnapshotProvider::from_json(json).unwrap();

        assert_eq!(provider.list_tables().unwrap(), vec!["role_type"]);
        let fields = provider.fields_for_table("ROLE_TYPE").unwrap();
        assert_eq!(fields[1].db_type, DbType::VarChar);
        let rows = provider.rows_for_table("Role_Type").unwrap();
        assert_eq!(rows[0], vec![Value::Integer(1), Value::Text("Admin".to_string())]);
        assert!(!provider.profiling_enabled());
    }

    #[test]
    fn test_snapshot_unknown_table() {
        let mut provider = SnapshotProvider::new().with_table(SnapshotTable::new("person"));

        let err = provider.fields_for_table("address").unwrap_err();
        assert!(err.to_string().contains("address"));
        assert!(provider.rows_for_table("address").is_err());
    }
}
