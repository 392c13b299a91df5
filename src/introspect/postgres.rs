use postgres::{Client, SimpleQueryMessage};
use tracing::{debug, error, trace};

use super::{FieldDescriptor, ForeignKeyDescriptor, IndexDescriptor, Row, SchemaProvider};
use crate::prelude::OrmliftError;
use crate::schema::{DbType, Value};

/// PostgreSQL schema provider
pub struct PostgresProvider<'a> {
    client: &'a mut Client,
    schema_name: String,
}

impl<'a> PostgresProvider<'a> {
    pub fn new(client: &'a mut Client, schema_name: impl Into<String>) -> Self {
        Self {
            client,
            schema_name: schema_name.into(),
        }
    }

    fn query(
        &mut self,
        what: &str,
        sql: &str,
        table_name: Option<&str>,
    ) -> Result<Vec<postgres::Row>, OrmliftError> {
        let result = match table_name {
            Some(table) => self.client.query(sql, &[&table, &self.schema_name]),
            None => self.client.query(sql, &[&self.schema_name]),
        };

        result.map_err(|e| {
            error!(
                schema = ?self.schema_name,
                table = ?table_name,
                error = ?e,
                "Failed to query {}", what
            );
            OrmliftError::Introspection {
                schema: self.schema_name.clone(),
                message: match table_name {
                    Some(table) => format!("Failed to query {} for table '{}': {}", what, table, e),
                    None => format!("Failed to query {}: {}", what, e),
                },
            }
        })
    }
}

impl SchemaProvider for PostgresProvider<'_> {
    /// Query all table names in the schema
    fn list_tables(&mut self) -> Result<Vec<String>, OrmliftError> {
        trace!(schema = ?self.schema_name, "Querying tables");

        let sql = r#"
            SELECT c.relname AS table_name
            FROM pg_class c
            JOIN pg_namespace n ON n.oid = c.relnamespace
            WHERE c.relkind = 'r'
                AND n.nspname = $1
            ORDER BY c.relname
        "#;

        let rows = self.query("tables", sql, None)?;
        let tables: Vec<String> = rows.iter().map(|row| row.get("table_name")).collect();
        debug!(count = ?tables.len(), "Found tables");
        Ok(tables)
    }

    fn fields_for_table(&mut self, table: &str) -> Result<Vec<FieldDescriptor>, OrmliftError> {
        trace!(schema = ?self.schema_name, table = ?table, "Querying columns");

        let sql = r#"
            SELECT
                a.attname AS column_name,
                format_type(a.atttypid, a.atttypmod) AS data_type,
                a.attnotnull AS not_null,
                pg_get_expr(d.adbin, d.adrelid) AS default_value,
                (a.attidentity <> '') AS is_identity,
                EXISTS (
                    SELECT 1 FROM pg_constraint con
                    WHERE con.conrelid = c.oid
                        AND con.contype = 'p'
                        AND a.attnum = ANY(con.conkey)
                ) AS is_primary_key,
                EXISTS (
                    SELECT 1 FROM pg_constraint con
                    WHERE con.conrelid = c.oid
                        AND con.contype = 'u'
                        AND con.conkey = ARRAY[a.attnum]
                ) AS is_unique,
                col_description(c.oid, a.attnum) AS comment
            FROM pg_attribute a
            JOIN pg_class c ON c.oid = a.attrelid
            JOIN pg_namespace n ON n.oid = c.relnamespace
            LEFT JOIN pg_attrdef d ON d.adrelid = c.oid AND d.adnum = a.attnum
            WHERE c.relname = $1
                AND n.nspname = $2
                AND a.attnum > 0
                AND NOT a.attisdropped
            ORDER BY a.attnum
        "#;

        let rows = self.query("columns", sql, Some(table))?;

        let mut fields = Vec::with_capacity(rows.len());
        for row in rows {
            let name: String = row.get("column_name");
            let data_type: String = row.get("data_type");
            let raw_default: Option<String> = row.get("default_value");
            let is_identity: bool = row.get("is_identity");

            let is_serial = raw_default
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains("nextval("));
            let lower_type = data_type.to_lowercase();

            let field = FieldDescriptor {
                db_type: parse_data_type(&data_type),
                max_length: extract_length(&data_type),
                default: if is_serial {
                    None
                } else {
                    raw_default.as_deref().map(normalize_default)
                },
                primary_key: row.get("is_primary_key"),
                not_null: row.get("not_null"),
                identity: is_identity || is_serial,
                unique: row.get("is_unique"),
                timestamp: lower_type.starts_with("timestamp") && is_row_version(&raw_default),
                comment: row.get("comment"),
                name,
            };

            trace!(
                column = ?field.name,
                data_type = ?data_type,
                parsed_type = ?field.db_type,
                identity = ?field.identity,
                "Parsed column"
            );
            fields.push(field);
        }

        Ok(fields)
    }

    fn foreign_keys_for_table(
        &mut self,
        table: &str,
    ) -> Result<Vec<ForeignKeyDescriptor>, OrmliftError> {
        trace!(schema = ?self.schema_name, table = ?table, "Querying foreign keys");

        let sql = r#"
            SELECT
                con.conname::text AS key_name,
                ARRAY(
                    SELECT a.attname::text
                    FROM unnest(con.conkey) WITH ORDINALITY k(attnum, ord)
                    JOIN pg_attribute a ON a.attrelid = con.conrelid AND a.attnum = k.attnum
                    ORDER BY k.ord
                ) AS column_names,
                ft.relname::text AS reference_table,
                ARRAY(
                    SELECT a.attname::text
                    FROM unnest(con.confkey) WITH ORDINALITY k(attnum, ord)
                    JOIN pg_attribute a ON a.attrelid = con.confrelid AND a.attnum = k.attnum
                    ORDER BY k.ord
                ) AS reference_columns
            FROM pg_constraint con
            JOIN pg_class c ON c.oid = con.conrelid
            JOIN pg_namespace n ON n.oid = c.relnamespace
            JOIN pg_class ft ON ft.oid = con.confrelid
            WHERE con.contype = 'f'
                AND c.relname = $1
                AND n.nspname = $2
            ORDER BY con.conname
        "#;

        let rows = self.query("foreign keys", sql, Some(table))?;
        Ok(rows
            .iter()
            .map(|row| ForeignKeyDescriptor {
                key_name: row.get("key_name"),
                column_names: row.get("column_names"),
                reference_table: row.get("reference_table"),
                reference_columns: row.get("reference_columns"),
            })
            .collect())
    }

    fn indexes_for_table(&mut self, table: &str) -> Result<Vec<IndexDescriptor>, OrmliftError> {
        trace!(schema = ?self.schema_name, table = ?table, "Querying indexes");

        let sql = r#"
            SELECT
                i.relname::text AS key_name,
                ix.indisunique AS is_unique,
                ix.indisprimary AS is_primary,
                ARRAY(
                    SELECT a.attname::text
                    FROM unnest(ix.indkey::int2[]) WITH ORDINALITY k(attnum, ord)
                    JOIN pg_attribute a ON a.attrelid = ix.indrelid AND a.attnum = k.attnum
                    ORDER BY k.ord
                ) AS column_names
            FROM pg_index ix
            JOIN pg_class c ON c.oid = ix.indrelid
            JOIN pg_class i ON i.oid = ix.indexrelid
            JOIN pg_namespace n ON n.oid = c.relnamespace
            WHERE c.relname = $1
                AND n.nspname = $2
            ORDER BY i.relname
        "#;

        let rows = self.query("indexes", sql, Some(table))?;
        Ok(rows
            .iter()
            .map(|row| IndexDescriptor {
                key_name: row.get("key_name"),
                unique: row.get("is_unique"),
                primary_key: row.get("is_primary"),
                column_names: row.get("column_names"),
            })
            .collect())
    }

    fn rows_for_table(&mut self, table: &str) -> Result<Vec<Row>, OrmliftError> {
        let types: Vec<DbType> = self
            .fields_for_table(table)?
            .into_iter()
            .map(|field| field.db_type)
            .collect();
        let sql = format!(
            "SELECT * FROM {}.{}",
            quote_identifier(&self.schema_name),
            quote_identifier(table)
        );
        trace!(sql = ?sql, "Reading table rows");

        let messages = self.client.simple_query(&sql).map_err(|e| {
            error!(sql = ?sql, error = ?e, "Query failed");
            OrmliftError::Introspection {
                schema: self.schema_name.clone(),
                message: format!("Failed to read rows of table '{}': {}", table, e),
            }
        })?;

        Ok(messages
            .iter()
            .filter_map(|message| match message {
                SimpleQueryMessage::Row(row) => Some(
                    (0..row.len())
                        .map(|i| match (row.get(i), types.get(i)) {
                            (None, _) => Value::Null,
                            (Some(text), Some(db_type)) => Value::from_text(text, db_type),
                            (Some(text), None) => Value::Text(text.to_string()),
                        })
                        .collect(),
                ),
                _ => None,
            })
            .collect())
    }
}

/// Map a PostgreSQL type string onto the analyzer's type set
fn parse_data_type(type_str: &str) -> DbType {
    let lower = type_str.to_lowercase();
    let trimmed = lower.trim();

    if trimmed.starts_with("character varying") || trimmed.starts_with("varchar") {
        return DbType::VarChar;
    }
    if trimmed.starts_with("character(") || trimmed.starts_with("char(") || trimmed == "character"
    {
        return DbType::Char;
    }
    if trimmed.starts_with("numeric") || trimmed.starts_with("decimal") {
        return DbType::Float;
    }
    if trimmed.starts_with("timestamp") {
        return DbType::DateTime;
    }
    if trimmed.starts_with("time ") || trimmed == "time" || trimmed == "timetz" {
        return DbType::Time;
    }

    match trimmed {
        "smallint" | "int2" | "integer" | "int" | "int4" | "bigint" | "int8" => DbType::Integer,
        "boolean" | "bool" => DbType::Bit,
        "text" | "bytea" => DbType::Blob,
        "real" | "float4" | "double precision" | "float8" => DbType::Float,
        "date" => DbType::Date,
        "json" | "jsonb" => DbType::Json,
        _ => DbType::Other(type_str.to_string()),
    }
}

/// Double-quote an identifier, doubling embedded quotes
fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Extract length parameter from type like "varchar(255)" or "character varying(100)"
fn extract_length(type_str: &str) -> Option<u32> {
    if let Some(start) = type_str.find('(') {
        if let Some(end) = type_str.find(')') {
            let len_str = &type_str[start + 1..end];
            // Handle numeric(10,2) - just take first number
            let first_num = len_str.split(',').next().unwrap_or(len_str);
            return first_num.trim().parse().ok();
        }
    }
    None
}

/// Strip casts and quoting: `'abc'::character varying` -> `abc`
fn normalize_default(default: &str) -> String {
    let value = match default.find("::") {
        Some(pos) => &default[..pos],
        None => default,
    };
    let value = value.trim();
    value
        .strip_prefix('\'')
        .and_then(|v| v.strip_suffix('\''))
        .map(|v| v.replace("''", "'"))
        .unwrap_or_else(|| value.to_string())
}

fn is_row_version(default: &Option<String>) -> bool {
    default.as_deref().is_some_and(|d| {
        let lower = d.to_lowercase();
        lower.contains("now()") || lower.contains("current_timestamp")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_types() {
        assert_eq!(parse_data_type("integer"), DbType::Integer);
        assert_eq!(parse_data_type("bigint"), DbType::Integer);
        assert_eq!(parse_data_type("boolean"), DbType::Bit);
        assert_eq!(parse_data_type("text"), DbType::Blob);
        assert_eq!(parse_data_type("jsonb"), DbType::Json);
        assert_eq!(parse_data_type("uuid"), DbType::Other("uuid".to_string()));
    }

    #[test]
    fn test_parse_parameterized_types() {
        assert_eq!(parse_data_type("character varying(100)"), DbType::VarChar);
        assert_eq!(parse_data_type("character(2)"), DbType::Char);
        assert_eq!(parse_data_type("numeric(10,2)"), DbType::Float);
        assert_eq!(
            parse_data_type("timestamp with time zone"),
            DbType::DateTime
        );
        assert_eq!(parse_data_type("time without time zone"), DbType::Time);
    }

    #[test]
    fn test_extract_length() {
        assert_eq!(extract_length("varchar(255)"), Some(255));
        assert_eq!(extract_length("character varying(100)"), Some(100));
        assert_eq!(extract_length("numeric(10,2)"), Some(10));
        assert_eq!(extract_length("text"), None);
    }

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("Role_Type"), "\"Role_Type\"");
        assert_eq!(quote_identifier("odd\"name"), "\"odd\"\"name\"");
    }

    #[test]
    fn test_normalize_default() {
        assert_eq!(normalize_default("'abc'::character varying"), "abc");
        assert_eq!(normalize_default("'it''s'::text"), "it's");
        assert_eq!(normalize_default("42"), "42");
        assert_eq!(normalize_default("now()"), "now()");
    }
}
