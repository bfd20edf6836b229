//! themis-odoo-migrate CLI - Themis to Odoo case-management migration.

use clap::{Parser, Subcommand};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;
use themis_odoo_migrate::{
    Config, DestinationConfig, FirebirdSource, MigrateError, MigrationResult, Orchestrator,
    SourceConfig, SourceReader,
};
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "themis-odoo-migrate")]
#[command(about = "Migrate a Themis database into Odoo")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file (flags below override its values)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to the Themis database file
    #[arg(long)]
    themis_db: Option<String>,

    /// Directory holding one sub-directory of documents per Themis case
    #[arg(long)]
    document_path: Option<PathBuf>,

    /// Base URL of the Odoo instance
    #[arg(long)]
    url: Option<String>,

    /// Odoo database name
    #[arg(long)]
    odoo_db: Option<String>,

    /// Odoo login
    #[arg(long)]
    user: Option<String>,

    /// Odoo password or API key
    #[arg(long)]
    secret: Option<String>,

    /// Ceiling on the document payload of one submission, in bytes
    #[arg(long)]
    max_batch_bytes: Option<usize>,

    /// Path to state file for resume capability
    #[arg(long)]
    state_file: Option<PathBuf>,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a new migration
    Run {
        /// Steps to leave out, by name (repeatable)
        #[arg(long = "skip-step")]
        skip_steps: Vec<String>,
    },

    /// Resume a previously interrupted migration
    Resume,

    /// List the tables of the Themis database, or the columns of one table
    Tables {
        /// Show the columns of this table
        #[arg(long)]
        table: Option<String>,
    },

    /// Test source and destination connections
    HealthCheck,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), MigrateError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format, cli.log_file.as_deref())?;

    let mut config = build_config(&cli)?;

    match cli.command {
        Commands::Run { ref skip_steps } => {
            config.migration.skip_steps.extend(skip_steps.iter().cloned());

            let mut orchestrator = Orchestrator::new(config).await?;
            if let Some(ref path) = cli.state_file {
                orchestrator = orchestrator.with_state_file(path.clone());
            }

            let result = orchestrator.run().await?;
            report(&result, cli.output_json, "Migration finished")?;
        }

        Commands::Resume => {
            // State file is required for resume
            let state_file = cli.state_file.clone().ok_or_else(|| {
                MigrateError::Config("--state-file is required for resume".to_string())
            })?;

            if !state_file.exists() {
                return Err(MigrateError::Config(format!(
                    "State file not found: {:?}",
                    state_file
                )));
            }

            let orchestrator = Orchestrator::new(config)
                .await?
                .with_state_file(state_file)
                .resume()?;

            info!("Resuming from previous state");
            let result = orchestrator.run().await?;
            report(&result, cli.output_json, "Migration resumed and finished")?;
        }

        Commands::Tables { ref table } => {
            let source = FirebirdSource::connect(&config.source).await?;
            let names = match table {
                Some(table) => source.list_columns(table).await?,
                None => source.list_tables().await?,
            };

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&names)?);
            } else {
                for name in names {
                    println!("{}", name);
                }
            }
        }

        Commands::HealthCheck => {
            config.validate()?;
            let result = Orchestrator::health_check(&config).await;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Health Check Results:");
                println!(
                    "  Source (Themis): {} ({}ms)",
                    if result.source_connected { "OK" } else { "FAILED" },
                    result.source_latency_ms
                );
                if let Some(ref err) = result.source_error {
                    println!("    Error: {}", err);
                }
                println!(
                    "  Destination (Odoo): {} ({}ms)",
                    if result.destination_connected { "OK" } else { "FAILED" },
                    result.destination_latency_ms
                );
                if let Some(ref err) = result.destination_error {
                    println!("    Error: {}", err);
                }
                println!(
                    "\n  Overall: {}",
                    if result.healthy { "HEALTHY" } else { "UNHEALTHY" }
                );
            }

            if !result.healthy {
                return Err(MigrateError::Config("Health check failed".to_string()));
            }
        }
    }

    Ok(())
}

/// Configuration from the YAML file when given, overridden by flags.
fn build_config(cli: &Cli) -> Result<Config, MigrateError> {
    let mut config = match cli.config {
        Some(ref path) => {
            let config = Config::load(path).map_err(|e| match e {
                MigrateError::Io(io) => {
                    MigrateError::Config(format!("Cannot read {}: {}", path.display(), io))
                }
                other => other,
            })?;
            info!("Loaded configuration from {:?}", path);
            config
        }
        None => Config::new(
            SourceConfig::for_database(""),
            DestinationConfig::new("", "", "", ""),
        ),
    };

    if let Some(ref db) = cli.themis_db {
        config.source.database = db.clone();
    }
    if let Some(ref path) = cli.document_path {
        config.migration.document_root = path.clone();
    }
    if let Some(ref url) = cli.url {
        config.destination.url = url.clone();
    }
    if let Some(ref db) = cli.odoo_db {
        config.destination.database = db.clone();
    }
    if let Some(ref user) = cli.user {
        config.destination.user = user.clone();
    }
    if let Some(ref secret) = cli.secret {
        config.destination.secret = secret.clone();
    }
    if let Some(bytes) = cli.max_batch_bytes {
        config.migration.max_batch_bytes = bytes;
    }

    Ok(config)
}

fn report(result: &MigrationResult, json: bool, headline: &str) -> Result<(), MigrateError> {
    if json {
        println!("{}", result.to_json()?);
        return Ok(());
    }

    println!("\n{} ({})", headline, result.status);
    println!("  Run ID: {}", result.run_id);
    println!("  Duration: {:.2}s", result.duration_seconds);
    println!("  Records: {}", result.records_created);
    for step in &result.steps {
        println!(
            "  {:<20} {:?}: {} read, {} created, {} failed",
            step.step.name(),
            step.status,
            step.rows_extracted,
            step.records_created,
            step.records_failed
        );
    }
    if !result.documents_failed.is_empty() {
        println!("  Failed documents:");
        for label in &result.documents_failed {
            println!("    {}", label);
        }
    }
    Ok(())
}

fn setup_logging(verbosity: &str, format: &str, log_file: Option<&Path>) -> Result<(), MigrateError> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false);

    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| {
                    MigrateError::Config(format!("Cannot open log file {}: {}", path.display(), e))
                })?;
            let subscriber = subscriber.with_ansi(false).with_writer(Mutex::new(file));
            if format == "json" {
                subscriber.json().init();
            } else {
                subscriber.init();
            }
        }
        None => {
            let subscriber = subscriber.with_writer(std::io::stderr);
            if format == "json" {
                subscriber.json().init();
            } else {
                subscriber.init();
            }
        }
    }

    Ok(())
}
