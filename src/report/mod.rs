//! Analysis reports
//!
//! Renders the analyzed [`Schema`] together with its [`Diagnostics`],
//! either as a human-readable summary or as JSON for downstream code
//! templates.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use minijinja::Environment;
use serde::Serialize;
use tracing::{debug, info};

use crate::analyze::Diagnostics;
use crate::error::OrmliftError;
use crate::schema::{Column, Schema, Table, TypeTable};

/// Report output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReportFormat {
    /// Plain text summary
    #[default]
    Text,
    /// The full annotated model as JSON
    Json,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    schema: &'a Schema,
    diagnostics: &'a Diagnostics,
}

/// Report renderer
pub struct ReportRenderer {
    env: Environment<'static>,
}

impl ReportRenderer {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);

        env.add_template("summary", include_str!("templates/summary.txt.jinja"))
            .expect("Failed to load summary template");

        Self { env }
    }

    pub fn render(
        &self,
        schema: &Schema,
        diagnostics: &Diagnostics,
        format: ReportFormat,
    ) -> Result<String, OrmliftError> {
        debug!(format = ?format, "Rendering report");
        match format {
            ReportFormat::Text => self.render_summary(schema, diagnostics),
            ReportFormat::Json => Ok(serde_json::to_string_pretty(&JsonReport {
                schema,
                diagnostics,
            })?),
        }
    }

    /// Render to `output`, or to stdout when no path is given
    pub fn write(
        &self,
        schema: &Schema,
        diagnostics: &Diagnostics,
        format: ReportFormat,
        output: Option<&Path>,
    ) -> Result<(), OrmliftError> {
        let report = self.render(schema, diagnostics, format)?;

        match output {
            Some(path) => {
                if let Some(parent) = path.parent() {
                    if !parent.as_os_str().is_empty() {
                        fs::create_dir_all(parent)?;
                    }
                }
                fs::write(path, report)?;
                info!(path = ?path, "Wrote analysis report");
            }
            None => {
                let mut stdout = io::stdout().lock();
                stdout.write_all(report.as_bytes())?;
                stdout.flush()?;
            }
        }

        Ok(())
    }

    fn render_summary(
        &self,
        schema: &Schema,
        diagnostics: &Diagnostics,
    ) -> Result<String, OrmliftError> {
        let template = self
            .env
            .get_template("summary")
            .map_err(|e| OrmliftError::Render(format!("Template error: {}", e)))?;

        let ctx = minijinja::context! {
            database_index => schema.database_index,
            tables => schema.tables.values().map(build_table_context).collect::<Vec<_>>(),
            type_tables => schema.type_tables.values().map(build_type_table_context).collect::<Vec<_>>(),
            excluded => &schema.excluded,
            errors => &diagnostics.errors,
            warnings => &diagnostics.warnings,
        };

        template
            .render(ctx)
            .map_err(|e| OrmliftError::Render(format!("Render error: {}", e)))
    }
}

impl Default for ReportRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Build template context for a table
fn build_table_context(table: &Table) -> minijinja::Value {
    minijinja::context! {
        name => &table.name,
        class_name => &table.class_name,
        primary_key => &table.primary_key,
        columns => table.columns.values().map(build_column_context).collect::<Vec<_>>(),
        indexes => table.indexes.iter().map(|index| minijinja::context! {
            key_name => &index.key_name,
            columns => &index.column_names,
            unique => index.unique,
            synthesized => index.synthesized,
        }).collect::<Vec<_>>(),
        reverse_references => table.reverse_references.iter().map(|reverse| minijinja::context! {
            description => &reverse.object_description,
            description_plural => &reverse.object_description_plural,
            source => format!("{}.{}", reverse.table, reverse.column),
            member => &reverse.object_member_variable,
        }).collect::<Vec<_>>(),
        associations => table.many_to_many_references.iter().map(|m2m| minijinja::context! {
            description => &m2m.object_description,
            description_plural => &m2m.object_description_plural,
            table => &m2m.table,
            associated_table => &m2m.associated_table,
            is_type => m2m.is_type_association,
        }).collect::<Vec<_>>(),
    }
}

/// Build template context for a column
fn build_column_context(column: &Column) -> minijinja::Value {
    let flags: Vec<&str> = [
        (column.primary_key, "pk"),
        (column.identity, "identity"),
        (column.not_null, "not null"),
        (column.unique, "unique"),
        (column.indexed, "indexed"),
        (column.timestamp, "timestamp"),
    ]
    .into_iter()
    .filter_map(|(set, flag)| set.then_some(flag))
    .collect();

    minijinja::context! {
        name => &column.name,
        db_type => column.db_type.as_str(),
        variable_name => &column.variable_name,
        flags => flags,
        reference => column.reference.as_ref().map(|r| {
            let kind = if r.is_type { " (type)" } else { "" };
            format!("{}.{}{} as {}", r.table, r.column, kind, r.property_name)
        }),
    }
}

/// Build template context for a type table
fn build_type_table_context(type_table: &TypeTable) -> minijinja::Value {
    minijinja::context! {
        name => &type_table.name,
        class_name => &type_table.class_name,
        entries => type_table.names.iter().map(|(id, name)| minijinja::context! {
            id => id,
            name => name,
            token => type_table.tokens.get(id),
        }).collect::<Vec<_>>(),
    }
}
