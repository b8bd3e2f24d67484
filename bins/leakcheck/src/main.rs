use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};

use leakcheck_harness::{HarnessConfig, HarnessRun};

/// Run a leak-check integration test against a service binary
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path (YAML)
    #[arg(short, long, value_name = "FILE")]
    config: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Subject port (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Keep the subject's working directory even if the config removes it
    #[arg(long)]
    keep_working_directory: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let mut config = HarnessConfig::load_from_file(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;

    initialize_logging(args.debug, &config.log_level)?;

    info!("Config file: {}", args.config.display());

    if let Some(port) = args.port {
        config.endpoint.port = port;
    }
    if args.keep_working_directory {
        config.cleanup.remove_working_directory = false;
    }

    let run = HarnessRun::new(config);
    info!("Run {} starting", run.run_id());

    // Dropping the run on interrupt kills the subject
    let report = tokio::select! {
        result = run.execute() => result,
        _ = shutdown_signal() => {
            warn!("Interrupted, subject killed");
            return Ok(ExitCode::FAILURE);
        }
    };

    match report {
        Ok(report) => {
            println!("{}", report);
            for failure in &report.failures {
                println!("  failure: {}", failure);
            }

            if report.passed() {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
        Err(e) => {
            error!("Failed to launch subject: {}", e);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn initialize_logging(debug: bool, config_level: &str) -> Result<()> {
    let level = if debug { "debug" } else { config_level };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))
}

async fn shutdown_signal() {
    use tokio::signal;

    #[cfg(unix)]
    {
        let sigterm = signal::unix::signal(signal::unix::SignalKind::terminate());
        let sigint = signal::unix::signal(signal::unix::SignalKind::interrupt());

        match (sigterm, sigint) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => info!("Received SIGTERM signal"),
                    _ = sigint.recv() => info!("Received SIGINT signal"),
                }
            }
            _ => {
                warn!("Failed to install signal handlers, interrupts will not clean up");
                std::future::pending::<()>().await;
            }
        }
    }

    #[cfg(windows)]
    {
        if signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C signal");
        } else {
            std::future::pending::<()>().await;
        }
    }
}
