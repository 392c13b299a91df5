//! # ormlift
//!
//! Analyze relational database schemas into an annotated object model
//!
//! This crate provides a CLI tool and library that read table metadata from
//! a database (or a recorded snapshot), classify tables, and derive the
//! class, property and relationship names an ORM code generator needs.

pub mod analyze;
pub mod config;
pub mod error;
pub mod introspect;
pub mod naming;
pub mod report;
pub mod schema;

pub mod prelude {
    pub use crate::analyze::{
        Diagnostics, OptionOverrides, OptionStore, RelationshipScript, SchemaAnalysisContext,
        SchemaAnalyzer,
    };
    pub use crate::config::{AnalysisConfig, DbConfig, RelationshipSource, ScriptFormat};
    pub use crate::error::{OrmliftError, TableError};
    pub use crate::introspect::{SchemaProvider, SnapshotProvider};
    pub use crate::naming::Naming;
    pub use crate::report::{ReportFormat, ReportRenderer};
    pub use crate::schema::{
        Column, DbType, Index, ManyToManyReference, Reference, ReverseReference, Schema, Table,
        TypeTable, VariableType,
    };
}

#[cfg(feature = "postgres")]
pub use introspect::PostgresProvider;
