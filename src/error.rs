use thiserror::Error;

/// ormlift run-level errors
#[derive(Error, Debug)]
pub enum OrmliftError {
    #[error("Failed to connect to database: {0}")]
    Connection(String),

    #[error("Failed to introspect schema '{schema}': {message}")]
    Introspection { schema: String, message: String },

    #[error("FATAL ERROR: no database connection configured at index {0}")]
    NoConnection(usize),

    #[error("FATAL ERROR: cannot analyze the database at index {0} while profiling is enabled")]
    ProfilingEnabled(usize),

    #[error("Failed to write output: {0}")]
    Output(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to render report: {0}")]
    Render(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// A problem scoped to a single table.
///
/// Most variants drop the table from the analyzed model; the foreign key
/// and index variants only skip the offending key.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TableError {
    #[error("Unable to read metadata for table '{table}': {message}")]
    Metadata { table: String, message: String },

    #[error("Invalid column name '{column}' in table '{table}': column names cannot contain dashes")]
    DashedColumnName { table: String, column: String },

    #[error("Column '{column}' in table '{table}' has an unsupported database type '{db_type}'")]
    UnsupportedType {
        table: String,
        column: String,
        db_type: String,
    },

    #[error("Table '{0}' can only contain characters that are alphanumeric or _, and must not begin with a number")]
    InvalidTableName(String),

    #[error("Table '{0}' has a table name which is a reserved word")]
    ReservedTableName(String),

    #[error("Table '{table}' has an invalid column name: '{column}'")]
    InvalidColumnName { table: String, column: String },

    #[error("Table '{0}' does not have any defined primary keys")]
    NoPrimaryKey(String),

    #[error("Index '{index}' in table '{table}' indexes on no columns")]
    EmptyIndex { table: String, index: String },

    #[error("Index '{index}' in table '{table}' indexes on the column '{column}', which does not appear to exist")]
    IndexColumnMissing {
        table: String,
        index: String,
        column: String,
    },

    #[error("Foreign key '{key}' in table '{table}' keys on multiple columns; multiple-column foreign keys are not supported")]
    MultiColumnForeignKey { table: String, key: String },

    #[error("Foreign key '{key}' in table '{table}' keys on a column '{column}' that does not appear to exist")]
    ForeignKeyColumnMissing {
        table: String,
        key: String,
        column: String,
    },

    #[error("Foreign key '{key}' in table '{table}' references a table '{target}' that does not appear to exist")]
    UnknownReferencedTable {
        table: String,
        key: String,
        target: String,
    },

    #[error("Type table '{0}' must have an integer primary key as its first column")]
    TypeTableKey(String),

    #[error("Type table '{0}' must have a unique varchar as its second column")]
    TypeTableName(String),

    #[error("Type table '{table}' has a row with an invalid id: {value}")]
    TypeTableRowId { table: String, value: String },

    #[error("Type table '{table}' has a row (id {id}) whose name produces an empty token")]
    EmptyTypeToken { table: String, id: i64 },

    #[error("Association table '{table}' {reason}")]
    Association { table: String, reason: String },
}
