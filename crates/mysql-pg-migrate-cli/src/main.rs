//! mysql-pg-migrate CLI - migrate a MySQL database into PostgreSQL.

use clap::Parser;
use mysql_pg_migrate::{Config, MigrateError, Orchestrator};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::sync::watch;
use tracing::{info, Level};

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

#[derive(Parser)]
#[command(name = "mysql-pg-migrate")]
#[command(about = "Migrate a MySQL database schema and data into PostgreSQL")]
#[command(version)]
struct Cli {
    /// Path to the JSON or XML configuration file
    config: PathBuf,

    /// Output the JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,
}

#[tokio::main]
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

    setup_logging(&cli.verbosity, &cli.log_format)
        .map_err(MigrateError::Config)?;

    let config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    let cancel_rx = setup_signal_handler().await?;

    let orchestrator = Orchestrator::new(config)?;
    let result = orchestrator.run(Some(cancel_rx)).await?;

    if cli.output_json {
        println!("{}", result.to_json()?);
    } else {
        println!("\nMigration {}!", result.status);
        println!("  Run ID: {}", result.run_id);
        println!("  Schema: {}", result.target_schema);
        println!("  Duration: {:.2}s", result.duration_seconds);
        println!("  Tables: {}", result.tables_total);
        println!(
            "  Views: {}/{}",
            result.views_created, result.views_total
        );
        println!("  Rows: {}", result.rows_transferred);
        if result.rows_failed > 0 {
            println!("  Failed rows: {}", result.rows_failed);
        }
    }

    Ok(())
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
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

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    Ok(())
}

/// Setup signal handlers for graceful shutdown. On SIGINT/SIGTERM the
/// orchestrator stops scheduling new tables, lets running COPY streams
/// finish their current chunk and returns. There is no rollback.
#[cfg(unix)]
async fn setup_signal_handler() -> Result<watch::Receiver<bool>, MigrateError> {
    let (cancel_tx, cancel_rx) = watch::channel(false);

    let tx_int = cancel_tx.clone();
    let tx_term = cancel_tx;

    tokio::spawn(async move {
        let mut sigint = signal(SignalKind::interrupt()).expect("Failed to setup SIGINT handler");
        sigint.recv().await;
        eprintln!("\nReceived SIGINT. Finishing current chunks, then stopping...");
        let _ = tx_int.send(true);
    });

    tokio::spawn(async move {
        let mut sigterm = signal(SignalKind::terminate()).expect("Failed to setup SIGTERM handler");
        sigterm.recv().await;
        eprintln!("\nReceived SIGTERM. Finishing current chunks, then stopping...");
        let _ = tx_term.send(true);
    });

    Ok(cancel_rx)
}

#[cfg(not(unix))]
async fn setup_signal_handler() -> Result<watch::Receiver<bool>, MigrateError> {
    let (cancel_tx, cancel_rx) = watch::channel(false);

    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to setup Ctrl-C handler");
        eprintln!("\nReceived Ctrl-C. Finishing current chunks, then stopping...");
        let _ = cancel_tx.send(true);
    });

    Ok(cancel_rx)
}
