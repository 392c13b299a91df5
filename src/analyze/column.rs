//! Column analysis
//!
//! Maps one [`FieldDescriptor`] to an annotated [`Column`]: variable type,
//! generated names, parsed default and the options embedded in the
//! column comment.

use std::collections::BTreeMap;

use tracing::trace;

use super::{Diagnostics, OptionStore};
use crate::error::TableError;
use crate::introspect::FieldDescriptor;
use crate::naming::Naming;
use crate::schema::{Column, ColumnOptions, CommentOptions, DbType, DefaultValue, VariableType};

const TIMESTAMP_OPTION: &str = "Timestamp";
const AUTO_UPDATE_OPTION: &str = "AutoUpdate";

/// Table-level facts the column analyzer needs
#[derive(Debug, Clone, Copy)]
pub struct ColumnContext<'a> {
    pub table_name: &'a str,
    pub class_name: &'a str,
    /// Number of primary key columns in the table
    pub primary_key_count: usize,
}

/// Variable type a database type is exposed as
pub fn variable_type_for(db_type: &DbType) -> Option<VariableType> {
    match db_type {
        DbType::Bit => Some(VariableType::Boolean),
        DbType::Integer => Some(VariableType::Integer),
        DbType::Float => Some(VariableType::Float),
        DbType::Date | DbType::DateTime | DbType::Time => Some(VariableType::DateTime),
        DbType::Blob | DbType::Char | DbType::VarChar | DbType::Json => Some(VariableType::String),
        DbType::Other(_) => None,
    }
}

/// Parse a raw column default
///
/// `NULL` and zero dates mean "no default". Integer-looking text becomes an
/// integer, other numeric text a float, and anything else stays text.
pub fn parse_default(raw: Option<&str>) -> Option<DefaultValue> {
    let raw = raw?;
    let trimmed = raw.trim();

    if trimmed.eq_ignore_ascii_case("null") || trimmed.starts_with("0000-00-00") {
        return None;
    }

    let digits = trimmed.strip_prefix('-').unwrap_or(trimmed);
    if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
        if let Ok(i) = trimmed.parse() {
            return Some(DefaultValue::Integer(i));
        }
    }

    let numeric = trimmed.chars().any(|c| c.is_ascii_digit())
        && trimmed
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'));
    if numeric {
        if let Ok(f) = trimmed.parse() {
            return Some(DefaultValue::Float(f));
        }
    }

    Some(DefaultValue::Text(raw.to_string()))
}

/// Split a column comment into its prose and the JSON object embedded in it
///
/// Only a non-empty JSON object counts; otherwise the comment is returned
/// untouched.
pub fn split_comment(comment: Option<&str>) -> (Option<String>, CommentOptions) {
    let Some(comment) = comment else {
        return (None, CommentOptions::default());
    };

    let embedded = comment.find('{').and_then(|start| {
        let end = comment.rfind('}')?;
        (end > start).then_some((start, end))
    });

    if let Some((start, end)) = embedded {
        if let Ok(serde_json::Value::Object(map)) =
            serde_json::from_str::<serde_json::Value>(&comment[start..=end])
        {
            if !map.is_empty() {
                let prose = format!("{}{}", &comment[..start], &comment[end + 1..]);
                let prose = prose.trim();
                let options: BTreeMap<_, _> = map.into_iter().collect();
                return (
                    (!prose.is_empty()).then(|| prose.to_string()),
                    CommentOptions(options),
                );
            }
        }
    }

    let comment = comment.trim();
    (
        (!comment.is_empty()).then(|| comment.to_string()),
        CommentOptions::default(),
    )
}

/// Loose truthiness for option flags: `false`, `0`, `""`, `"0"`, `null`
/// and empty containers are off
fn is_set(value: Option<&serde_json::Value>) -> bool {
    match value {
        None | Some(serde_json::Value::Null) => false,
        Some(serde_json::Value::Bool(b)) => *b,
        Some(serde_json::Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(serde_json::Value::String(s)) => !s.is_empty() && s != "0",
        Some(serde_json::Value::Array(a)) => !a.is_empty(),
        Some(serde_json::Value::Object(o)) => !o.is_empty(),
    }
}

/// Analyze one column
///
/// Dashed names and unsupported types are errors for the caller to record.
/// An identity flag on a non-key column is cleared with a warning.
pub fn analyze_field(
    field: &FieldDescriptor,
    table: ColumnContext<'_>,
    naming: &Naming,
    store: &dyn OptionStore,
    diagnostics: &mut Diagnostics,
) -> Result<Column, TableError> {
    trace!(table = ?table.table_name, column = ?field.name, "Analyzing column");

    if field.name.contains('-') {
        return Err(TableError::DashedColumnName {
            table: table.table_name.to_string(),
            column: field.name.clone(),
        });
    }

    let variable_type =
        variable_type_for(&field.db_type).ok_or_else(|| TableError::UnsupportedType {
            table: table.table_name.to_string(),
            column: field.name.clone(),
            db_type: field.db_type.to_string(),
        })?;

    let (comment, comment_options) = split_comment(field.comment.as_deref());
    let timestamp = field.timestamp || is_set(comment_options.0.get(TIMESTAMP_OPTION));
    let auto_update = timestamp && is_set(comment_options.0.get(AUTO_UPDATE_OPTION));

    let identity = if field.identity && !field.primary_key {
        diagnostics.warning(format!(
            "Column '{}' in table '{}' is an identity column but not a primary key; ignoring identity",
            field.name, table.table_name
        ));
        false
    } else {
        field.identity
    };

    let sole_primary_key = field.primary_key && table.primary_key_count == 1;
    let property_name = naming.column_property_name(&field.name);
    let options = ColumnOptions::merge(
        comment_options,
        store.options(table.class_name, &property_name),
    );

    Ok(Column {
        table_name: table.table_name.to_string(),
        name: field.name.clone(),
        primary_key: field.primary_key,
        identity,
        not_null: field.not_null,
        unique: field.unique || sole_primary_key,
        indexed: sole_primary_key,
        timestamp,
        auto_update,
        db_type: field.db_type.clone(),
        variable_type,
        cast_type: variable_type.cast_name(),
        variable_name: naming.column_variable_name(&field.name, variable_type),
        property_name,
        length: field.max_length,
        default: parse_default(field.default.as_deref()),
        comment,
        options,
        reference: None,
    })
}
