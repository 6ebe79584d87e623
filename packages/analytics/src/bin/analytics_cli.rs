//! Diagnostic CLI for analytics tables
//!
//! Lists fields, prints compiled SQL and runs tables or pivots against the
//! database in `DATABASE_URL`. Output is JSON on stdout; logs go to stderr.
//! Rows are read without access control.

use analytics::postgres::{load_schema, PgExecutor};
use analytics::{
    AnalyticsConfig, ExtractionEngine, PivotEngine, PivotSpec, Schema, TableSpec, Unrestricted,
};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "analytics_cli")]
#[command(about = "Compile and run analytics tables")]
struct Cli {
    /// Read the schema from a JSON file instead of the database
    #[arg(long, global = true)]
    schema: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List selectable fields below a root (or a prefix path)
    Fields {
        starting_object: String,
        #[arg(long)]
        prefix: Option<String>,
        #[arg(long, default_value_t = 1)]
        depth: usize,
    },

    /// Print the compiled statement of a table
    Sql { table: PathBuf },

    /// Run a table and print its records
    Run { table: PathBuf },

    /// Run a pivot over a table
    Pivot {
        table: PathBuf,
        pivot: PathBuf,
        /// Print the statement instead of running it
        #[arg(long)]
        sql_only: bool,
    },
}

#[derive(Serialize)]
struct FieldInfo {
    path: String,
    label: String,
    value: bool,
    functions: Vec<String>,
}

fn output<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
}

async fn connect(config: &AnalyticsConfig) -> Result<PgExecutor> {
    let url = config
        .database_url
        .as_deref()
        .context("DATABASE_URL must be set")?;
    PgExecutor::connect(url)
        .await
        .context("Failed to connect to database")
}

async fn schema(cli_schema: Option<&Path>, config: &AnalyticsConfig) -> Result<Schema> {
    match cli_schema {
        Some(path) => {
            let schema: Schema = read_json(path)?;
            Ok(schema.with_meta_fields(config.meta_fields.iter().cloned()))
        }
        None => {
            let executor = connect(config).await?;
            load_schema(executor.pool(), config)
                .await
                .context("Failed to load schema")
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,analytics=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = AnalyticsConfig::from_env().context("Failed to load config")?;
    let schema = schema(cli.schema.as_deref(), &config).await?;
    let engine = ExtractionEngine::new(schema, Unrestricted);

    match cli.command {
        Commands::Fields {
            starting_object,
            prefix,
            depth,
        } => cmd_fields(&engine, &starting_object, prefix.as_deref(), depth),
        Commands::Sql { table } => {
            let table: TableSpec = read_json(&table)?;
            output(&engine.sql(&table)?)
        }
        Commands::Run { table } => {
            let table: TableSpec = read_json(&table)?;
            let executor = connect(&config).await?;
            output(&engine.execute(&table, &executor).await?)
        }
        Commands::Pivot {
            table,
            pivot,
            sql_only,
        } => {
            let table: TableSpec = read_json(&table)?;
            let pivot: PivotSpec = read_json(&pivot)?;
            let compiled = PivotEngine::new().compile(&engine.compile(&table)?, &pivot)?;
            if sql_only {
                return output(&compiled.statement()?);
            }
            let executor = connect(&config).await?;
            output(&compiled.execute(&executor).await?)
        }
    }
}

fn cmd_fields(
    engine: &ExtractionEngine<Unrestricted>,
    starting_object: &str,
    prefix: Option<&str>,
    depth: usize,
) -> Result<()> {
    let mut model = engine.field_model(starting_object)?;
    let listed = model.list_fields(prefix, depth)?;

    let fields: Vec<FieldInfo> = listed
        .into_iter()
        .map(|(path, id)| {
            let node = model.node(id);
            FieldInfo {
                path,
                label: model.full_label(id),
                value: node.is_value(),
                functions: node
                    .kind
                    .supported_functions()
                    .iter()
                    .map(|f| f.to_string())
                    .collect(),
            }
        })
        .collect();

    output(&fields)
}
