use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use ormlift::analyze::{OptionOverrides, SchemaAnalysisContext, SchemaAnalyzer};
use ormlift::config::{AnalysisConfig, DbConfig, RelationshipSource, ScriptFormat};
use ormlift::introspect::SnapshotProvider;
use ormlift::report::{ReportFormat, ReportRenderer};
use ormlift::schema::Schema;

#[derive(Debug, Clone, ValueEnum)]
enum Source {
    /// Recorded JSON snapshot (see --snapshot)
    Snapshot,
    Postgres,
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum CliScriptFormat {
    /// `table.column => table.column` lines
    #[default]
    Dsl,
    /// ALTER TABLE ... FOREIGN KEY statements
    Sql,
}

impl From<CliScriptFormat> for ScriptFormat {
    fn from(format: CliScriptFormat) -> Self {
        match format {
            CliScriptFormat::Dsl => ScriptFormat::Dsl,
            CliScriptFormat::Sql => ScriptFormat::Sql,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum CliReportFormat {
    /// Human-readable summary
    #[default]
    Text,
    /// Full annotated model
    Json,
}

impl From<CliReportFormat> for ReportFormat {
    fn from(format: CliReportFormat) -> Self {
        match format {
            CliReportFormat::Text => ReportFormat::Text,
            CliReportFormat::Json => ReportFormat::Json,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "ormlift")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Where schema metadata comes from
    source: Source,

    /// Snapshot file to analyze (snapshot source only)
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Database schema to introspect
    #[arg(long, default_value = "public")]
    schema: String,

    /// Path to .env file for connection and analysis config
    #[arg(long, default_value = "./.env")]
    env_file: PathBuf,

    /// JSON file with per-field option overrides
    #[arg(long)]
    options: Option<PathBuf>,

    /// Script declaring additional foreign keys
    #[arg(long)]
    relationships: Option<PathBuf>,

    /// Format of the relationships script
    #[arg(long, value_enum, default_value_t = CliScriptFormat::Dsl)]
    relationships_format: CliScriptFormat,

    /// Comma-separated list of tables to analyze (default: all)
    #[arg(long, value_delimiter = ',')]
    tables: Option<Vec<String>>,

    /// Comma-separated list of tables to exclude
    #[arg(long, value_delimiter = ',')]
    exclude: Option<Vec<String>>,

    /// Report format
    #[arg(long, value_enum, default_value_t = CliReportFormat::Text)]
    format: CliReportFormat,

    /// Report file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Verbose output (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() {
    if let Err(e) = run() {
        error!(error = ?e, "Fatal error");
        eprintln!("{:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    info!("ormlift v{}", env!("CARGO_PKG_VERSION"));
    info!(
        source = ?cli.source,
        schema = ?cli.schema,
        format = ?cli.format,
        output = ?cli.output,
        "Starting schema analysis"
    );

    let mut config =
        AnalysisConfig::load(&cli.env_file).context("Failed to load analysis configuration")?;
    apply_cli_overrides(&mut config, &cli);
    debug!(config = ?config, "Analysis configuration");

    let options = match &cli.options {
        Some(path) => OptionOverrides::load(path).context("Failed to load option overrides")?,
        None => OptionOverrides::default(),
    };

    let analyzer = SchemaAnalyzer::new(config).context("Invalid analysis configuration")?;
    let mut ctx = SchemaAnalysisContext::new(options);

    let schema = match cli.source {
        Source::Snapshot => {
            let Some(path) = &cli.snapshot else {
                bail!("The snapshot source needs --snapshot <PATH>");
            };
            analyze_snapshot(&analyzer, &mut ctx, path)?
        }
        Source::Postgres => {
            let db_config = DbConfig::from_env().context("Failed to load database configuration")?;
            debug!(connection = ?db_config.redacted_connection_string(), "Loaded configuration");
            analyze_postgres(&analyzer, &mut ctx, &db_config, &cli.schema)?
        }
    };

    if schema.tables.is_empty() && schema.type_tables.is_empty() {
        warn!("No tables left after analysis");
    }

    // Log table names at debug level
    for table in schema.tables.values() {
        debug!(
            table = ?table.name,
            class = ?table.class_name,
            columns = ?table.columns.len(),
            references = ?table.reference_count(),
            "Table"
        );
    }

    ReportRenderer::new()
        .write(
            &schema,
            &ctx.diagnostics,
            cli.format.into(),
            cli.output.as_deref(),
        )
        .context("Failed to write report")?;

    if !ctx.diagnostics.errors.is_empty() {
        warn!(
            errors = ?ctx.diagnostics.errors.len(),
            "Analysis finished with errors; affected tables were left out"
        );
    }

    Ok(())
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string().to_lowercase()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Command line flags win over the environment
fn apply_cli_overrides(config: &mut AnalysisConfig, cli: &Cli) {
    if let Some(path) = &cli.relationships {
        config.relationships = Some(RelationshipSource {
            path: path.clone(),
            format: cli.relationships_format.into(),
        });
    }

    // Restricting to a list means excluding everything else
    if let Some(tables) = &cli.tables {
        config.exclude_pattern = Some(".*".to_string());
        config.include_pattern = None;
        config.include_tables = tables.clone();
    }

    if let Some(exclude) = &cli.exclude {
        config.exclude_tables.extend(exclude.iter().cloned());
    }
}

fn analyze_snapshot(
    analyzer: &SchemaAnalyzer,
    ctx: &mut SchemaAnalysisContext,
    path: &Path,
) -> Result<Schema> {
    let mut provider = SnapshotProvider::load(path)
        .with_context(|| format!("Failed to load snapshot {}", path.display()))?;
    info!(path = ?path, tables = ?provider.tables.len(), "Loaded snapshot");

    let schema = analyzer
        .analyze(ctx, Some(&mut provider))
        .context("Failed to analyze snapshot")?;

    Ok(schema)
}

#[cfg(feature = "postgres")]
fn analyze_postgres(
    analyzer: &SchemaAnalyzer,
    ctx: &mut SchemaAnalysisContext,
    config: &DbConfig,
    schema_name: &str,
) -> Result<Schema> {
    use ormlift::PostgresProvider;
    use postgres::NoTls;

    info!(connection = ?config.redacted_connection_string(), "Connecting to PostgreSQL");

    let mut client = postgres::Client::connect(&config.postgres_connection_string(), NoTls)
        .with_context(|| {
            format!(
                "Failed to connect to PostgreSQL at {}",
                config.redacted_connection_string()
            )
        })?;

    info!("Connected to database");

    let mut provider = PostgresProvider::new(&mut client, schema_name);
    let schema = analyzer
        .analyze(ctx, Some(&mut provider))
        .context("Failed to analyze schema")?;

    Ok(schema)
}

#[cfg(not(feature = "postgres"))]
fn analyze_postgres(
    _analyzer: &SchemaAnalyzer,
    _ctx: &mut SchemaAnalysisContext,
    _config: &DbConfig,
    _schema_name: &str,
) -> Result<Schema> {
    bail!("PostgreSQL support not enabled. Rebuild with --features postgres")
}
