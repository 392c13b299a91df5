//! Type table analysis
//!
//! A type table is a fixed enumeration: an integer key, a unique display
//! name and optionally further columns carrying per-row data.

use std::collections::BTreeMap;

use tracing::debug;

use super::{analyze_field, metadata_error, AnalysisPass, ColumnContext};
use crate::error::TableError;
use crate::naming::type_token;
use crate::schema::{DbType, TypeTable, Value};

impl AnalysisPass<'_> {
    pub(super) fn analyze_type_table(&mut self, name: &str) -> Result<TypeTable, TableError> {
        let fields = self
            .provider
            .fields_for_table(name)
            .map_err(|e| metadata_error(name, e))?;

        let (key_field, name_field) = match fields.as_slice() {
            [key, display, ..] => (key, display),
            _ => return Err(TableError::TypeTableKey(name.to_string())),
        };
        if key_field.db_type != DbType::Integer || !key_field.primary_key {
            return Err(TableError::TypeTableKey(name.to_string()));
        }
        if name_field.db_type != DbType::VarChar || !name_field.unique {
            return Err(TableError::TypeTableName(name.to_string()));
        }

        let class_name = self.naming.class_name(name);
        let context = ColumnContext {
            table_name: name,
            class_name: &class_name,
            primary_key_count: 1,
        };

        let mut key_column = analyze_field(
            key_field,
            context,
            self.naming,
            self.ctx.options.as_ref(),
            &mut self.ctx.diagnostics,
        )?;
        key_column.unique = true;
        key_column.indexed = true;

        let mut extra_fields = Vec::new();
        for field in &fields[2..] {
            extra_fields.push(analyze_field(
                field,
                context,
                self.naming,
                self.ctx.options.as_ref(),
                &mut self.ctx.diagnostics,
            )?);
        }

        let rows = self
            .provider
            .rows_for_table(name)
            .map_err(|e| metadata_error(name, e))?;

        let mut names = BTreeMap::new();
        let mut tokens = BTreeMap::new();
        let mut extra_values = BTreeMap::new();
        for row in rows {
            let raw_id = row.first().cloned().unwrap_or(Value::Null);
            let id = raw_id.as_integer().ok_or_else(|| TableError::TypeTableRowId {
                table: name.to_string(),
                value: raw_id.as_text().unwrap_or_else(|| "NULL".to_string()),
            })?;
            let display = row.get(1).and_then(Value::as_text).unwrap_or_default();

            let mut token = type_token(&display);
            if token.is_empty() {
                return Err(TableError::EmptyTypeToken {
                    table: name.to_string(),
                    id,
                });
            }
            if self.naming.is_reserved(&token) {
                self.ctx.diagnostics.warning(format!(
                    "Type table '{}' has a row ('{}') whose token is a reserved word; using '_{}'",
                    name, display, token
                ));
                token = format!("_{}", token);
            }

            let values: BTreeMap<String, Value> = extra_fields
                .iter()
                .enumerate()
                .map(|(i, column)| {
                    let value = row.get(i + 2).unwrap_or(&Value::Null);
                    (column.name.clone(), value.coerce(column.variable_type))
                })
                .collect();

            names.insert(id, display);
            tokens.insert(id, token);
            if !values.is_empty() {
                extra_values.insert(id, values);
            }
        }

        debug!(table = ?name, rows = ?names.len(), "Loaded type table");

        Ok(TypeTable {
            name: name.to_string(),
            class_name,
            names,
            tokens,
            extra_fields,
            extra_values,
            key_column,
        })
    }
}
