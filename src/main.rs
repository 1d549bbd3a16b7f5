//! CLI entry point for the transit arrivals monitor.
//!
//! `monitor` refreshes a bus/subway arrivals table until Ctrl+C; `once`
//! fetches a single snapshot, optionally as JSON.

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::ffi::OsStr;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};
use transit_arrivals::{
    aggregator::SourceAggregator,
    config::SourceArgs,
    monitor::MonitorLoop,
    output::{JsonPresenter, MonitorHeader, TablePresenter},
};

#[derive(Parser)]
#[command(name = "transit_arrivals")]
#[command(about = "Live NYC bus and subway arrivals in the terminal", long_about = None)]
struct Cli {
    /// Disable ANSI colors
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Refresh the arrivals table until interrupted
    Monitor {
        #[command(flatten)]
        sources: SourceArgs,

        /// Append frames instead of clearing the screen between refreshes
        #[arg(long, default_value_t = false)]
        no_clear: bool,
    },
    /// Fetch and print arrivals once
    Once {
        #[command(flatten)]
        sources: SourceArgs,

        /// Print one JSON object instead of a table
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    let _file_guard = init_tracing();
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    match cli.command {
        Commands::Monitor { sources, no_clear } => {
            let config = sources.resolve()?;
            let aggregator = SourceAggregator::from_config(&config)?;
            let presenter = TablePresenter::stdout(MonitorHeader::from(&config))
                .clear_screen(!no_clear)
                .live(true);
            let mut monitor = MonitorLoop::new(aggregator, presenter, config.refresh_interval);

            let cancel = CancellationToken::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => info!("Interrupt received, stopping"),
                    Err(e) => error!(error = %e, "Failed to listen for Ctrl+C"),
                }
                on_interrupt.cancel();
            });

            monitor.run(cancel).await?;
            println!("\n\n{}", "Monitoring stopped. Goodbye!".yellow());
        }
        Commands::Once { sources, json } => {
            let config = sources.resolve()?;
            let aggregator = SourceAggregator::from_config(&config)?;
            if json {
                MonitorLoop::new(aggregator, JsonPresenter::stdout(), config.refresh_interval)
                    .run_once()
                    .await?;
            } else {
                let presenter = TablePresenter::stdout(MonitorHeader::from(&config));
                MonitorLoop::new(aggregator, presenter, config.refresh_interval)
                    .run_once()
                    .await?;
            }
        }
    }

    Ok(())
}

/// Colored stderr logs plus a JSON rolling log file.
///
/// The stderr layer defaults to `warn` so routine logs do not scroll the live
/// table away. The returned guard must stay alive to flush the file writer.
fn init_tracing() -> WorkerGuard {
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/transit_arrivals.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("transit_arrivals.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::try_from_env("RUST_LOG").unwrap_or_else(|_| EnvFilter::new("warn")));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(
            EnvFilter::try_from_env("RUST_LOG_JSON").unwrap_or_else(|_| EnvFilter::new("debug")),
        );

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    file_guard
}
