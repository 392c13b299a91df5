//! Configuration loading
//!
//! Loads database connection and schema analysis configuration from
//! environment variables, optionally reading from a .env file first.

use crate::prelude::OrmliftError;
use std::{env, path::Path, path::PathBuf};
use tracing::{debug, error, trace, warn};

/// Keywords no generated class may be named after, unless overridden with
/// `ORMLIFT_RESERVED_WORDS`.
pub const DEFAULT_RESERVED_WORDS: &[&str] = &[
    "abstract", "and", "array", "as", "break", "case", "catch", "class", "clone", "const",
    "continue", "declare", "default", "do", "echo", "else", "elseif", "empty", "enum", "eval",
    "exit", "extends", "final", "finally", "fn", "for", "foreach", "function", "global", "goto",
    "if", "implements", "include", "instanceof", "interface", "isset", "list", "match",
    "namespace", "new", "null", "or", "print", "private", "protected", "public", "require",
    "return", "self", "static", "switch", "throw", "trait", "try", "unset", "use", "var",
    "while", "xor", "yield",
];

/// Database connection configuration
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
}

impl DbConfig {
    /// Load configuration from environment variables
    ///
    /// Expected variables:
    /// - DB_HOST (default: localhost)
    /// - DB_PORT (default: 5432)
    /// - DB_NAME (required)
    /// - DB_USER (required)
    /// - DB_PASSWORD (required)
    pub fn from_env() -> Result<Self, OrmliftError> {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, OrmliftError> {
        debug!("Loading database configuration");

        let host = var("DB_HOST").unwrap_or_else(|| {
            trace!("DB_HOST not set, using default");
            "localhost".to_string()
        });

        let port_str = var("DB_PORT").unwrap_or_else(|| {
            trace!("DB_PORT not set, using default");
            "5432".to_string()
        });

        let port = port_str.parse::<u16>().map_err(|e| {
            error!(port = ?port_str, error = ?e, "Invalid DB_PORT value");
            OrmliftError::Config("DB_PORT must be a valid port number".to_string())
        })?;

        let database = required(&var, "DB_NAME")?;
        let user = required(&var, "DB_USER")?;
        let password = required(&var, "DB_PASSWORD")?;

        debug!(host = ?host, port = ?port, database = ?database, user = ?user, "Configuration loaded");

        Ok(Self {
            host,
            port,
            database,
            user,
            password,
        })
    }

    /// Load a .env file and then read configuration from environment
    pub fn load(env_file: &Path) -> Result<Self, OrmliftError> {
        load_env_file(env_file)?;
        Self::from_env()
    }

    /// Build a PostgreSQL connection string
    pub fn postgres_connection_string(&self) -> String {
        format!(
            "host={} port={} dbname={} user={} password={}",
            self.host, self.port, self.database, self.user, self.password
        )
    }

    /// Build a connection string with password redacted (for error messages)
    pub fn redacted_connection_string(&self) -> String {
        format!(
            "host={} port={} dbname={} user={} password=***",
            self.host, self.port, self.database, self.user
        )
    }
}

/// Input format of a relationships script
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScriptFormat {
    /// `table.column => table.column`, one per line
    #[default]
    Dsl,
    /// `ALTER TABLE ... FOREIGN KEY (...) REFERENCES ...;` statements
    Sql,
}

impl ScriptFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "dsl" => Some(Self::Dsl),
            "sql" => Some(Self::Sql),
            _ => None,
        }
    }
}

/// Where additional foreign keys come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipSource {
    pub path: PathBuf,
    pub format: ScriptFormat,
}

/// Settings that steer schema analysis and naming
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Index of the configured data source being analyzed
    pub database_index: usize,
    pub class_prefix: String,
    pub class_suffix: String,
    pub associated_object_prefix: String,
    pub associated_object_suffix: String,
    pub type_table_suffixes: Vec<String>,
    pub association_table_suffix: String,
    /// Stripped from the front of table names before class naming
    pub strip_table_prefix: String,
    /// Case-insensitive regular expression
    pub exclude_pattern: Option<String>,
    pub exclude_tables: Vec<String>,
    /// Case-insensitive regular expression
    pub include_pattern: Option<String>,
    pub include_tables: Vec<String>,
    pub relationships: Option<RelationshipSource>,
    pub reserved_words: Vec<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            database_index: 0,
            class_prefix: String::new(),
            class_suffix: String::new(),
            associated_object_prefix: String::new(),
            associated_object_suffix: String::new(),
            type_table_suffixes: vec!["_type".to_string()],
            association_table_suffix: "_assn".to_string(),
            strip_table_prefix: String::new(),
            exclude_pattern: None,
            exclude_tables: Vec::new(),
            include_pattern: None,
            include_tables: Vec::new(),
            relationships: None,
            reserved_words: DEFAULT_RESERVED_WORDS.iter().map(|w| w.to_string()).collect(),
        }
    }
}

impl AnalysisConfig {
    /// Load analysis settings from `ORMLIFT_*` environment variables
    pub fn from_env() -> Result<Self, OrmliftError> {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Build analysis settings from an arbitrary variable source,
    /// falling back to defaults for anything unset
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, OrmliftError> {
        debug!("Loading analysis configuration");
        let mut config = Self::default();

        if let Some(index) = var("ORMLIFT_DATABASE_INDEX") {
            config.database_index = index.trim().parse().map_err(|e| {
                error!(index = ?index, error = ?e, "Invalid ORMLIFT_DATABASE_INDEX value");
                OrmliftError::Config(
                    "ORMLIFT_DATABASE_INDEX must be a non-negative integer".to_string(),
                )
            })?;
        }

        let text = |key: &str, target: &mut String| {
            if let Some(value) = var(key) {
                trace!(key = ?key, value = ?value, "Override");
                *target = value;
            }
        };
        text("ORMLIFT_CLASS_PREFIX", &mut config.class_prefix);
        text("ORMLIFT_CLASS_SUFFIX", &mut config.class_suffix);
        text(
            "ORMLIFT_ASSOCIATED_OBJECT_PREFIX",
            &mut config.associated_object_prefix,
        );
        text(
            "ORMLIFT_ASSOCIATED_OBJECT_SUFFIX",
            &mut config.associated_object_suffix,
        );
        text(
            "ORMLIFT_ASSOCIATION_TABLE_SUFFIX",
            &mut config.association_table_suffix,
        );
        text("ORMLIFT_STRIP_TABLE_PREFIX", &mut config.strip_table_prefix);

        if let Some(suffixes) = var("ORMLIFT_TYPE_TABLE_SUFFIXES") {
            config.type_table_suffixes = split_list(&suffixes);
        }
        if let Some(words) = var("ORMLIFT_RESERVED_WORDS") {
            config.reserved_words = split_list(&words);
        }

        config.exclude_pattern = var("ORMLIFT_EXCLUDE_PATTERN").filter(|p| !p.is_empty());
        config.include_pattern = var("ORMLIFT_INCLUDE_PATTERN").filter(|p| !p.is_empty());
        config.exclude_tables = var("ORMLIFT_EXCLUDE_TABLES")
            .map(|v| split_list(&v))
            .unwrap_or_default();
        config.include_tables = var("ORMLIFT_INCLUDE_TABLES")
            .map(|v| split_list(&v))
            .unwrap_or_default();

        if let Some(path) = var("ORMLIFT_RELATIONSHIPS").filter(|p| !p.is_empty()) {
            let format = match var("ORMLIFT_RELATIONSHIPS_FORMAT") {
                Some(name) => ScriptFormat::parse(&name).ok_or_else(|| {
                    error!(format = ?name, "Invalid ORMLIFT_RELATIONSHIPS_FORMAT value");
                    OrmliftError::Config(format!(
                        "ORMLIFT_RELATIONSHIPS_FORMAT must be 'dsl' or 'sql', got '{}'",
                        name
                    ))
                })?,
                None => ScriptFormat::default(),
            };
            config.relationships = Some(RelationshipSource {
                path: PathBuf::from(path),
                format,
            });
        }

        debug!(
            database_index = ?config.database_index,
            type_table_suffixes = ?config.type_table_suffixes,
            association_table_suffix = ?config.association_table_suffix,
            relationships = ?config.relationships,
            "Analysis configuration loaded"
        );

        Ok(config)
    }

    /// Load a .env file and then read analysis settings from environment
    pub fn load(env_file: &Path) -> Result<Self, OrmliftError> {
        load_env_file(env_file)?;
        Self::from_env()
    }
}

fn required(var: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String, OrmliftError> {
    var(key).ok_or_else(|| {
        error!(key = ?key, "Required environment variable is not set");
        OrmliftError::Config(format!("{} environment variable is required", key))
    })
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(String::from)
        .collect()
}

fn load_env_file(env_file: &Path) -> Result<(), OrmliftError> {
    if env_file.exists() {
        debug!(path = ?env_file, "Loading environment file");
        dotenvy::from_path(env_file).map_err(|e| {
            error!(path = ?env_file, error = ?e, "Failed to load environment file");
            OrmliftError::Config(format!("Failed to load {}: {}", env_file.display(), e))
        })?;
    } else {
        warn!(path = ?env_file, "Environment file not found, using existing environment");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn required_vars() -> Vec<(&'static str, &'static str)> {
        vec![
            ("DB_NAME", "testdb"),
            ("DB_USER", "testuser"),
            ("DB_PASSWORD", "testpass"),
        ]
    }

    #[test]
    fn test_from_vars_with_defaults() {
        let config = DbConfig::from_vars(vars(&required_vars())).unwrap();

        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 5432);
        assert_eq!(config.database, "testdb");
        assert_eq!(config.user, "testuser");
        assert_eq!(config.password, "testpass");
    }

    #[test]
    fn test_from_vars_with_custom_values() {
        let mut pairs = required_vars();
        pairs.push(("DB_HOST", "db.example.com"));
        pairs.push(("DB_PORT", "5433"));

        let config = DbConfig::from_vars(vars(&pairs)).unwrap();

        assert_eq!(config.host, "db.example.com");
        assert_eq!(config.port, 5433);
    }

    #[test]
    fn test_from_vars_missing_db_name() {
        let result = DbConfig::from_vars(vars(&[("DB_USER", "u"), ("DB_PASSWORD", "p")]));

        let err = result.unwrap_err();
        assert!(err.to_string().contains("DB_NAME"));
    }

    #[test]
    fn test_from_vars_invalid_port() {
        let mut pairs = required_vars();
        pairs.push(("DB_PORT", "not_a_number"));

        let err = DbConfig::from_vars(vars(&pairs)).unwrap_err();
        assert!(err.to_string().contains("DB_PORT"));
    }

    #[test]
    fn test_redacted_connection_string() {
        let config = DbConfig {
            host: "localhost".to_string(),
            port: 5432,
            database: "mydb".to_string(),
            user: "myuser".to_string(),
            password: "secret".to_string(),
        };

        assert_eq!(
            config.postgres_connection_string(),
            "host=localhost port=5432 dbname=mydb user=myuser password=secret"
        );
        let redacted = config.redacted_connection_string();
        assert!(!redacted.contains("secret"));
        assert!(redacted.contains("***"));
    }

    #[test]
    fn test_analysis_defaults() {
        let config = AnalysisConfig::from_vars(vars(&[])).unwrap();

        assert_eq!(config.type_table_suffixes, vec!["_type"]);
        assert_eq!(config.association_table_suffix, "_assn");
        assert!(config.relationships.is_none());
        assert!(config.reserved_words.iter().any(|w| w == "class"));
    }

    #[test]
    fn test_analysis_overrides() {
        let config = AnalysisConfig::from_vars(vars(&[
            ("ORMLIFT_CLASS_PREFIX", "Db"),
            ("ORMLIFT_TYPE_TABLE_SUFFIXES", "_type, _enum"),
            ("ORMLIFT_EXCLUDE_TABLES", "audit_log,tmp"),
            ("ORMLIFT_RELATIONSHIPS", "rel.sql"),
            ("ORMLIFT_RELATIONSHIPS_FORMAT", "SQL"),
            ("ORMLIFT_DATABASE_INDEX", "2"),
        ]))
        .unwrap();

        assert_eq!(config.class_prefix, "Db");
        assert_eq!(config.type_table_suffixes, vec!["_type", "_enum"]);
        assert_eq!(config.exclude_tables, vec!["audit_log", "tmp"]);
        assert_eq!(config.database_index, 2);
        let source = config.relationships.unwrap();
        assert_eq!(source.format, ScriptFormat::Sql);
        assert_eq!(source.path, PathBuf::from("rel.sql"));
    }

    #[test]
    fn test_analysis_invalid_format() {
        let err = AnalysisConfig::from_vars(vars(&[
            ("ORMLIFT_RELATIONSHIPS", "rel.txt"),
            ("ORMLIFT_RELATIONSHIPS_FORMAT", "xml"),
        ]))
        .unwrap_err();

        assert!(err.to_string().contains("ORMLIFT_RELATIONSHIPS_FORMAT"));
    }
}
