//! Relationships script
//!
//! Declares foreign keys the database itself does not enforce. Two formats
//! are understood:
//!
//! ```text
//! address.person_id => person.id
//! ```
//!
//! ```sql
//! ALTER TABLE address ADD CONSTRAINT fk_person FOREIGN KEY (person_id) REFERENCES person (id);
//! ```
//!
//! Each line is applied to at most one table. A line naming a table the
//! schema lacks is an error; lines for tables that were excluded or left
//! out are reported once analysis finishes.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, trace};

use super::{Classification, Diagnostics};
use crate::config::ScriptFormat;
use crate::introspect::{ForeignKeyDescriptor, SchemaProvider};
use crate::prelude::OrmliftError;

static ALTER_TABLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r#"^alter\s+table\s+[\[`"']?([a-z_][a-z0-9_]*)[\]`"']?\s+"#,
        r#"(?:add\s+)?(?:constraint\s+[\[`"']?([a-z_][a-z0-9_]*)[\]`"']?\s+)?"#,
        r#"foreign\s+key\s*(?:[\[`"']?[a-z_][a-z0-9_]*[\]`"']?\s*)?\(([^)]*)\)\s*"#,
        r#"references\s+[\[`"']?([a-z_][a-z0-9_]*)[\]`"']?\s*\(([^)]*)\)"#,
    ))
    .unwrap()
});

static BLOCK_COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)/\*.*?\*/").unwrap());

static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Resolves a script's `table.column` to the names the database uses
pub trait ColumnResolver {
    fn resolve_column(&mut self, table: &str, column: &str) -> Option<(String, String)>;
}

impl<F> ColumnResolver for F
where
    F: FnMut(&str, &str) -> Option<(String, String)>,
{
    fn resolve_column(&mut self, table: &str, column: &str) -> Option<(String, String)> {
        self(table, column)
    }
}

/// [`ColumnResolver`] over the classified tables of the current run
pub struct SchemaLookup<'a> {
    classification: &'a Classification,
    provider: &'a mut dyn SchemaProvider,
    columns: HashMap<String, Vec<String>>,
}

impl<'a> SchemaLookup<'a> {
    pub fn new(classification: &'a Classification, provider: &'a mut dyn SchemaProvider) -> Self {
        Self {
            classification,
            provider,
            columns: HashMap::new(),
        }
    }
}

impl ColumnResolver for SchemaLookup<'_> {
    fn resolve_column(&mut self, table: &str, column: &str) -> Option<(String, String)> {
        let (_, table) = self.classification.resolve(table)?;

        if !self.columns.contains_key(table) {
            let fields = self.provider.fields_for_table(table).ok()?;
            self.columns.insert(
                table.to_string(),
                fields.into_iter().map(|f| f.name).collect(),
            );
        }

        let column = self
            .columns
            .get(table)?
            .iter()
            .find(|c| c.eq_ignore_ascii_case(column))?;
        Some((table.to_string(), column.clone()))
    }
}

/// What a single script line declares
#[derive(Debug, Clone, PartialEq, Eq)]
enum Declaration {
    ForeignKey {
        table: String,
        column: String,
        key_name: Option<String>,
        reference_table: String,
        reference_column: String,
    },
    MultiColumn,
    Malformed(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ScriptLine {
    text: String,
    consumed: bool,
}

/// A parsed relationships script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipScript {
    format: ScriptFormat,
    lines: Vec<ScriptLine>,
}

fn unquote(identifier: &str) -> String {
    identifier
        .chars()
        .filter(|c| !matches!(c, '`' | '\'' | '"' | '[' | ']'))
        .collect::<String>()
        .trim()
        .to_string()
}

fn parse_dsl(line: &str) -> Declaration {
    let sides: Vec<&str> = line.split("=>").collect();
    if sides.len() != 2 {
        return Declaration::Malformed("Incorrect Format");
    }

    let parse_side = |side: &str| {
        let parts: Vec<&str> = side.trim().split('.').map(str::trim).collect();
        match parts.as_slice() {
            [table, column] if !table.is_empty() && !column.is_empty() => {
                Some((table.to_string(), column.to_string()))
            }
            _ => None,
        }
    };

    match (parse_side(sides[0]), parse_side(sides[1])) {
        (Some((table, column)), Some((reference_table, reference_column))) => {
            Declaration::ForeignKey {
                table,
                column,
                key_name: None,
                reference_table,
                reference_column,
            }
        }
        _ => Declaration::Malformed("Incorrect Format"),
    }
}

fn parse_sql(statement: &str) -> Declaration {
    let Some(captures) = ALTER_TABLE_RE.captures(statement) else {
        return Declaration::Malformed("Not in ANSI SQL Format");
    };

    let columns = &captures[3];
    let reference_columns = &captures[5];
    if columns.contains(',') || reference_columns.contains(',') {
        return Declaration::MultiColumn;
    }

    Declaration::ForeignKey {
        table: captures[1].to_string(),
        column: unquote(columns),
        key_name: captures.get(2).map(|m| m.as_str().to_string()),
        reference_table: captures[4].to_string(),
        reference_column: unquote(reference_columns),
    }
}

fn parse_line(format: ScriptFormat, text: &str) -> Declaration {
    match format {
        ScriptFormat::Dsl => parse_dsl(text),
        ScriptFormat::Sql => parse_sql(text),
    }
}

impl RelationshipScript {
    pub fn parse(script: &str, format: ScriptFormat) -> Self {
        let script = script.to_lowercase().replace('\r', "");
        let texts: Vec<String> = match format {
            ScriptFormat::Dsl => script
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .filter(|l| !(l.starts_with("//") || l.starts_with("--") || l.starts_with('#')))
                .map(str::to_string)
                .collect(),
            ScriptFormat::Sql => {
                let script = BLOCK_COMMENT_RE.replace_all(&script, " ");
                let joined = script
                    .lines()
                    .map(|l| l.split("--").next().unwrap_or_default())
                    .collect::<Vec<_>>()
                    .join(" ");
                WHITESPACE_RE
                    .replace_all(&joined, " ")
                    .split(';')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            }
        };

        debug!(format = ?format, lines = ?texts.len(), "Parsed relationships script");

        Self {
            format,
            lines: texts
                .into_iter()
                .map(|text| ScriptLine {
                    text,
                    consumed: false,
                })
                .collect(),
        }
    }

    pub fn load(path: &Path, format: ScriptFormat) -> Result<Self, OrmliftError> {
        debug!(path = ?path, "Loading relationships script");
        let script = fs::read_to_string(path).map_err(|e| {
            OrmliftError::Config(format!(
                "Failed to read relationships script {}: {}",
                path.display(),
                e
            ))
        })?;
        Ok(Self::parse(&script, format))
    }

    pub fn format(&self) -> ScriptFormat {
        self.format
    }

    /// Foreign keys the script declares for `table`
    ///
    /// Every line that is malformed or names `table` is consumed here.
    /// Problems are recorded as errors but never drop the table.
    pub fn foreign_keys_for(
        &mut self,
        table: &str,
        resolver: &mut dyn ColumnResolver,
        diagnostics: &mut Diagnostics,
    ) -> Vec<ForeignKeyDescriptor> {
        let table_lower = table.to_lowercase();
        let format = self.format;
        let mut keys = Vec::new();

        for line in self.lines.iter_mut().filter(|l| !l.consumed) {
            match parse_line(format, &line.text) {
                Declaration::Malformed(reason) => {
                    line.consumed = true;
                    diagnostics.error(format!(
                        "Could not parse relationships script line: {} ({})",
                        line.text, reason
                    ));
                }
                Declaration::MultiColumn => {
                    line.consumed = true;
                    diagnostics.error(format!(
                        "Relationships script line declares a foreign key on multiple columns, which is not supported: {}",
                        line.text
                    ));
                }
                Declaration::ForeignKey { table: ref source, .. } if *source != table_lower => {}
                Declaration::ForeignKey {
                    column,
                    key_name,
                    reference_table,
                    reference_column,
                    ..
                } => {
                    line.consumed = true;
                    trace!(table = ?table, line = ?line.text, "Applying relationships script line");

                    let Some((_, column)) = resolver.resolve_column(table, &column) else {
                        diagnostics.error(format!(
                            "Could not parse relationships script line: {} (column '{}.{}' does not exist)",
                            line.text, table_lower, column
                        ));
                        continue;
                    };
                    let Some((reference_table, reference_column)) =
                        resolver.resolve_column(&reference_table, &reference_column)
                    else {
                        diagnostics.error(format!(
                            "Could not parse relationships script line: {} (column '{}.{}' does not exist)",
                            line.text, reference_table, reference_column
                        ));
                        continue;
                    };

                    let key_name = key_name
                        .unwrap_or_else(|| format!("virtualfk_{}_{}", table, column).to_lowercase());
                    keys.push(ForeignKeyDescriptor::single(
                        key_name,
                        column,
                        reference_table,
                        reference_column,
                    ));
                }
            }
        }

        keys
    }

    /// Record an error for every line whose source table is not in the
    /// schema, and consume it
    ///
    /// Excluded tables still count as present; their lines stay unused.
    pub fn reject_unknown_tables(
        &mut self,
        classification: &Classification,
        diagnostics: &mut Diagnostics,
    ) {
        let format = self.format;
        for line in self.lines.iter_mut().filter(|l| !l.consumed) {
            let Declaration::ForeignKey { table, .. } = parse_line(format, &line.text) else {
                continue;
            };
            if classification.resolve(&table).is_some() || classification.is_excluded(&table) {
                continue;
            }

            line.consumed = true;
            diagnostics.error(format!(
                "Could not parse relationships script line: {} (table '{}' does not exist)",
                line.text, table
            ));
        }
    }

    /// Lines no table has claimed yet
    pub fn unused_lines(&self) -> impl Iterator<Item = &str> {
        self.lines
            .iter()
            .filter(|l| !l.consumed)
            .map(|l| l.text.as_str())
    }
}
