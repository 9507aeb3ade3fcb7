//! Demo host process
//!
//! Serves remote sessions against its own process state so a console can be
//! tried out without embedding the endpoint anywhere.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rr_core::config::{self, EndpointConfig};
use rr_endpoint::{Endpoint, EndpointOptions, LineRepl, ReplOptions};

#[derive(Parser)]
#[command(name = "rr-host")]
#[command(about = "Host process serving remote-repl sessions")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Host to bind (overrides config)
    #[arg(short, long)]
    server: Option<String>,

    /// Port to bind (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Keep process output on this terminal
    #[arg(long)]
    no_capture: bool,

    /// Shell used for `.command` escapes
    #[arg(long)]
    shell: Option<String>,

    /// Serve a single session, then exit
    #[arg(long)]
    once: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// What sessions on the demo host get to inspect
struct HostState {
    started: Instant,
    session: usize,
}

fn evaluate(state: &HostState, line: &str) -> Result<String> {
    let mut words = line.split_whitespace();
    match words.next().unwrap_or_default() {
        "pid" => Ok(std::process::id().to_string()),
        "uptime" => Ok(format!("{:.1}s", state.started.elapsed().as_secs_f64())),
        "session" => Ok(state.session.to_string()),
        "cwd" => Ok(std::env::current_dir()?.display().to_string()),
        "env" => {
            let name = words.next().context("usage: env NAME")?;
            Ok(std::env::var(name).map_or_else(|_| "nil".to_string(), |v| format!("{:?}", v)))
        }
        "sum" => {
            let total = words
                .map(|w| w.parse::<f64>().with_context(|| format!("not a number: {}", w)))
                .sum::<Result<f64>>()?;
            Ok(total.to_string())
        }
        other => anyhow::bail!("undefined local variable or method '{}'", other),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = match args.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config: EndpointConfig = match &args.config {
        Some(path) => config::load_config(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => config::load_or_default(&config::default_endpoint_config_path()),
    };
    if let Some(host) = args.server {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if args.no_capture {
        config.capture = false;
    }
    if args.shell.is_some() {
        config.shell = args.shell;
    }

    let options = EndpointOptions::from_config(&config).with_repl_options(ReplOptions {
        prompt: "rr-host> ".to_string(),
        ..ReplOptions::default()
    });
    let started = Instant::now();
    let mut session = 0;

    loop {
        session += 1;
        let state = HostState { started, session };
        let mut repl = LineRepl::new(evaluate)
            .with_completions(["pid", "uptime", "session", "cwd", "env", "sum"]);

        let mut endpoint = Endpoint::bind(state, options.clone())
            .await
            .with_context(|| format!("Failed to bind {}", config.address()))?;

        let interrupted = tokio::select! {
            result = endpoint.run(&mut repl) => {
                if let Err(e) = result {
                    tracing::error!("Session {} failed: {:#}", session, e);
                }
                false
            }
            _ = tokio::signal::ctrl_c() => true,
        };

        if interrupted {
            tracing::info!("Interrupted, shutting down");
            // The dropped session still owes the console its wake-up
            endpoint.abort().await;
            break;
        }

        if args.once {
            break;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> HostState {
        HostState {
            started: Instant::now(),
            session: 3,
        }
    }

    #[test]
    fn test_evaluate_builtins() {
        assert_eq!(evaluate(&state(), "session").unwrap(), "3");
        assert_eq!(evaluate(&state(), "pid").unwrap(), std::process::id().to_string());
        assert_eq!(evaluate(&state(), "sum 1 2 3.5").unwrap(), "6.5");
    }

    #[test]
    fn test_evaluate_errors() {
        assert!(evaluate(&state(), "sum 1 x").is_err());
        assert!(evaluate(&state(), "env").is_err());
        let err = evaluate(&state(), "frobnicate").unwrap_err();
        assert!(err.to_string().contains("frobnicate"));
    }
}
