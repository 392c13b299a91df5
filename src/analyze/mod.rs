//! Schema analysis
//!
//! Turns raw metadata from a [`SchemaProvider`] into the annotated
//! [`Schema`] model: tables are classified, type tables are loaded,
//! regular tables get their columns, indexes and references, and
//! association tables become pairs of many-to-many references.
//!
//! Problems scoped to a single table never abort the run. They are
//! recorded in [`Diagnostics`] and the table is left out of the model.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::AnalysisConfig;
use crate::error::TableError;
use crate::introspect::{ForeignKeyDescriptor, SchemaProvider};
use crate::naming::Naming;
use crate::prelude::OrmliftError;
use crate::schema::Schema;

mod association;
mod classify;
mod column;
mod options;
mod relationships;
mod table;
mod type_table;

pub use classify::{Classification, TableClassifier, TableKind};
pub use column::{analyze_field, parse_default, split_comment, variable_type_for, ColumnContext};
pub use options::{OptionOverrides, OptionStore};
pub use relationships::{ColumnResolver, RelationshipScript, SchemaLookup};

/// Accumulated errors and warnings of an analysis run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Diagnostics {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl Diagnostics {
    pub fn error(&mut self, message: impl Into<String>) {
        let message = message.into();
        error!(error = ?message, "Analysis error");
        self.errors.push(message);
    }

    pub fn table_error(&mut self, err: TableError) {
        self.error(err.to_string());
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!(warning = ?message, "Analysis warning");
        self.warnings.push(message);
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }
}

/// Table names of a data source that has already been analyzed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedSchema {
    pub database_index: usize,
    pub table_names: Vec<String>,
}

/// State shared across the analysis of every configured data source
pub struct SchemaAnalysisContext {
    pub diagnostics: Diagnostics,
    options: Box<dyn OptionStore>,
    completed: Vec<CompletedSchema>,
}

impl Default for SchemaAnalysisContext {
    fn default() -> Self {
        Self::new(OptionOverrides::default())
    }
}

impl SchemaAnalysisContext {
    pub fn new(options: impl OptionStore + 'static) -> Self {
        Self {
            diagnostics: Diagnostics::default(),
            options: Box::new(options),
            completed: Vec::new(),
        }
    }

    pub fn options(&self) -> &dyn OptionStore {
        self.options.as_ref()
    }

    pub fn completed(&self) -> &[CompletedSchema] {
        &self.completed
    }

    fn is_duplicate(&self, table: &str) -> bool {
        self.completed.iter().any(|schema| {
            schema
                .table_names
                .iter()
                .any(|name| name.eq_ignore_ascii_case(table))
        })
    }
}

/// Drives a full analysis of one data source
#[derive(Debug, Clone)]
pub struct SchemaAnalyzer {
    config: AnalysisConfig,
    naming: Naming,
    classifier: TableClassifier,
    relationships: Option<RelationshipScript>,
}

impl SchemaAnalyzer {
    /// Build an analyzer, loading the relationships script if one is
    /// configured
    pub fn new(config: AnalysisConfig) -> Result<Self, OrmliftError> {
        let classifier = TableClassifier::new(&config)?;
        let relationships = match &config.relationships {
            Some(source) => Some(RelationshipScript::load(&source.path, source.format)?),
            None => None,
        };

        Ok(Self {
            naming: Naming::new(&config),
            config,
            classifier,
            relationships,
        })
    }

    /// Use an already parsed relationships script
    pub fn with_relationships(mut self, script: RelationshipScript) -> Self {
        self.relationships = Some(script);
        self
    }

    pub fn naming(&self) -> &Naming {
        &self.naming
    }

    /// Analyze the schema behind `provider`
    ///
    /// Fails only when the run cannot start at all; everything scoped to
    /// a table ends up in `ctx.diagnostics`.
    pub fn analyze(
        &self,
        ctx: &mut SchemaAnalysisContext,
        provider: Option<&mut dyn SchemaProvider>,
    ) -> Result<Schema, OrmliftError> {
        let database_index = self.config.database_index;
        let provider = provider.ok_or(OrmliftError::NoConnection(database_index))?;
        if provider.profiling_enabled() {
            return Err(OrmliftError::ProfilingEnabled(database_index));
        }

        info!(database_index = ?database_index, "Starting schema analysis");

        let table_names = provider.list_tables()?;
        let classification = self.classifier.classify(&table_names);
        info!(
            regular = ?classification.regular.len(),
            type_tables = ?classification.type_tables.len(),
            associations = ?classification.associations.len(),
            excluded = ?classification.excluded.len(),
            "Classified tables"
        );

        for name in &classification.duplicates {
            ctx.diagnostics
                .error(format!("Duplicate table name used: {}", name));
        }
        for name in classification.names() {
            if ctx.is_duplicate(name) {
                ctx.diagnostics
                    .error(format!("Duplicate table name used: {}", name));
            }
        }

        let mut pass = AnalysisPass {
            database_index,
            naming: &self.naming,
            classification: &classification,
            provider,
            script: self.relationships.clone(),
            ctx: &mut *ctx,
        };

        if let Some(script) = pass.script.as_mut() {
            script.reject_unknown_tables(&classification, &mut pass.ctx.diagnostics);
        }

        let mut type_tables = BTreeMap::new();
        for (key, name) in &classification.type_tables {
            debug!(table = ?name, "Analyzing type table");
            match pass.analyze_type_table(name) {
                Ok(type_table) => {
                    type_tables.insert(key.clone(), type_table);
                }
                Err(e) => pass.ctx.diagnostics.table_error(e),
            }
        }

        let mut tables = BTreeMap::new();
        let mut pending = Vec::new();
        for (key, name) in &classification.regular {
            debug!(table = ?name, "Analyzing table");
            if let Some(analysis) = pass.analyze_table(name) {
                tables.insert(key.clone(), analysis.table);
                pending.extend(analysis.reverse_references);
            }
        }
        table::install_reverse_references(
            &mut tables,
            pending,
            pass.naming,
            &mut pass.ctx.diagnostics,
        );

        for name in classification.associations.values() {
            debug!(table = ?name, "Analyzing association table");
            pass.analyze_association_table(name, &mut tables, &type_tables);
        }

        table::verify_references(&tables, &type_tables, &mut pass.ctx.diagnostics);

        if let Some(script) = &pass.script {
            for line in script.unused_lines() {
                pass.ctx.diagnostics.warning(format!(
                    "Relationships script line was never applied to a table: {}",
                    line
                ));
            }
        }

        ctx.completed.push(CompletedSchema {
            database_index,
            table_names: tables.values().map(|t| t.name.clone()).collect(),
        });

        info!(
            tables = ?tables.len(),
            type_tables = ?type_tables.len(),
            errors = ?ctx.diagnostics.errors.len(),
            warnings = ?ctx.diagnostics.warnings.len(),
            "Schema analysis complete"
        );

        Ok(Schema {
            database_index,
            tables,
            type_tables,
            excluded: classification.excluded.clone(),
        })
    }
}

/// Working state of a single [`SchemaAnalyzer::analyze`] call
///
/// The per-kind analyzers are implemented on this type in the sibling
/// modules.
struct AnalysisPass<'a> {
    database_index: usize,
    naming: &'a Naming,
    classification: &'a Classification,
    provider: &'a mut dyn SchemaProvider,
    script: Option<RelationshipScript>,
    ctx: &'a mut SchemaAnalysisContext,
}

impl AnalysisPass<'_> {
    /// Database foreign keys plus any declared in the relationships script
    fn foreign_keys_for(&mut self, table: &str) -> Result<Vec<ForeignKeyDescriptor>, TableError> {
        let mut keys = self
            .provider
            .foreign_keys_for_table(table)
            .map_err(|e| metadata_error(table, e))?;

        if let Some(script) = self.script.as_mut() {
            let mut lookup = SchemaLookup::new(self.classification, &mut *self.provider);
            keys.extend(script.foreign_keys_for(table, &mut lookup, &mut self.ctx.diagnostics));
        }

        Ok(keys)
    }
}

fn metadata_error(table: &str, err: OrmliftError) -> TableError {
    TableError::Metadata {
        table: table.to_string(),
        message: err.to_string(),
    }
}
