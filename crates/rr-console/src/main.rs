//! remote-repl console
//!
//! Attaches this terminal to a session endpoint waiting inside another
//! process and blocks until that session ends.

use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rr_console::{Connector, Devices, LineEditor};
use rr_core::config::{self, ConsoleConfig};

#[derive(Parser)]
#[command(name = "remote-repl")]
#[command(about = "Attach a local console to a remote REPL session")]
#[command(version)]
struct Args {
    /// Host of the session endpoint
    #[arg(short, long)]
    server: Option<String>,

    /// Port of the session endpoint
    #[arg(short, long)]
    port: Option<u16>,

    /// Keep retrying until the endpoint is available
    #[arg(short, long)]
    wait: bool,

    /// Reconnect after each session ends
    #[arg(short = 'r', long)]
    persist: bool,

    /// Show the remote process's stdout/stderr here [default: true]
    #[arg(short, long, value_name = "BOOL")]
    capture: Option<bool>,

    /// Skip startup files (console.toml and line history)
    #[arg(short = 'f', conflicts_with = "config")]
    no_startup_files: bool,

    /// Path to configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = if args.no_startup_files {
        ConsoleConfig {
            history_file: None,
            ..ConsoleConfig::default()
        }
    } else if let Some(path) = &args.config {
        config::load_config(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?
    } else {
        config::load_or_default(&config::default_console_config_path())
    };

    // Apply command-line overrides
    if let Some(host) = args.server {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    config.wait |= args.wait;
    config.persist |= args.persist;
    if let Some(capture) = args.capture {
        config.capture = capture;
    }

    let devices = if std::io::stdin().is_terminal() {
        let editor = LineEditor::new(config.history_file.clone())
            .context("Failed to initialize line editor")?;
        Devices::terminal(editor)
    } else {
        Devices::stdio()
    };

    let endpoint = config.endpoint_address();
    tracing::info!("Connecting to {}", endpoint);
    let connector = Connector::new(config, devices);

    tokio::select! {
        result = connector.run() => {
            result.with_context(|| format!("Failed to attach to {}", endpoint))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted");
        }
    }

    Ok(())
}
