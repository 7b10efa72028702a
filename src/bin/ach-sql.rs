use ach_sql::config::Config;
use ach_sql::logging::{self, LoggingConfiguration};
use ach_sql::query::SearchParams;
use ach_sql::service::Service;
use ach_sql::storage::FilterParams;
use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ach-sql", about = "Query archives of ACH batch files with SQL")]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(long, default_value = "ach-sql.toml")]
    config: PathBuf,

    /// Force JSON log output even when stderr is a tty.
    #[arg(long)]
    json_logs: bool,

    /// Minimum log level, as a `tracing` filter directive.
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List configured sources and ingest any matching files.
    Ingest {
        /// Only ingest files whose name contains this substring.
        #[arg(long, default_value = "")]
        pattern: String,

        /// Only ingest files at or after this RFC 3339 timestamp.
        #[arg(long)]
        start: Option<DateTime<Utc>>,

        /// Only ingest files at or before this RFC 3339 timestamp.
        #[arg(long)]
        end: Option<DateTime<Utc>>,
    },
    /// Run a SQL query against the embedded engine.
    Query {
        /// The SQL text to run.
        sql: String,

        /// Only match rows from files whose name contains this substring.
        #[arg(long, default_value = "")]
        pattern: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    logging::init(&LoggingConfiguration {
        force_json_output: cli.json_logs,
        log_level: &cli.log_level,
    })?;

    let config_text = std::fs::read_to_string(&cli.config)
        .with_context(|| format!("reading config file {}", cli.config.display()))?;
    let config: Config = toml::from_str(&config_text)
        .with_context(|| format!("parsing config file {}", cli.config.display()))?;

    let service = Service::from_config(&config, &tokio::runtime::Handle::current())
        .context("starting up")?;

    match cli.command {
        Command::Ingest { pattern, start, end } => {
            let outcomes = service
                .ingest(FilterParams { start, end, pattern })
                .await
                .context("ingest failed")?;

            let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
            for outcome in &outcomes {
                match &outcome.result {
                    Ok(()) => println!("ok\t{}", outcome.filename),
                    Err(e) => println!("failed\t{}\t{}", outcome.filename, e),
                }
            }
            println!("{} files ingested, {} failed", outcomes.len(), failed);
            if failed > 0 {
                std::process::exit(1);
            }
        }
        Command::Query { sql, pattern } => {
            let results = service
                .query(&sql, &SearchParams { pattern })
                .context("query failed")?;
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
    }

    Ok(())
}
