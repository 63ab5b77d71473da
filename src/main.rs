use std::net::SocketAddr;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use color_eyre::{Report, Result, Section};
use tracing::{error, info, warn};

use metricast::connector::{ConnectorConfig, ConnectorEvent, FailoverConnector};
use metricast::error::{ConnectorError, MetricastError};
use metricast::observer::ObserverView;
use metricast::server::{start_relay, store_from_config, ServerConfig};
use metricast::traits::TransportKind;

/// Live host metrics relay and observer
#[derive(Parser)]
#[command(name = "metricast")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Verbose logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the latest metrics to WebSocket subscribers
    Serve(ServeArgs),

    /// Follow a relay, failing over across endpoints
    Watch(WatchArgs),
}

#[derive(Args)]
struct ServeArgs {
    /// Address to listen on (defaults to METRICAST_BIND / WEBSOCKET_PORT)
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Upstream "latest row" URL
    #[arg(long)]
    store_url: Option<String>,

    /// Broadcast period in milliseconds
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Allowed CORS origin
    #[arg(long)]
    cors_origin: Option<String>,
}

#[derive(Args)]
struct WatchArgs {
    /// Candidate endpoints, in preference order
    #[arg(
        short,
        long = "endpoint",
        env = "METRICAST_ENDPOINTS",
        value_delimiter = ',',
        required = true
    )]
    endpoints: Vec<String>,

    /// Transports tried on every attempt, in order
    #[arg(long, value_delimiter = ',', default_value = "websocket,polling")]
    transport: Vec<TransportKind>,

    #[arg(long, default_value_t = 10_000)]
    handshake_timeout_ms: u64,

    #[arg(long, default_value_t = 2_000)]
    retry_delay_ms: u64,

    /// Failed handshakes on one endpoint before moving to the next
    #[arg(long, default_value_t = 5)]
    max_attempts: u32,

    /// Give up after this many passes over the endpoint list
    #[arg(long)]
    max_rotations: Option<u32>,

    /// Print samples as JSON lines
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    metricast::logging::init(cli.verbose);

    let result = match cli.command {
        Commands::Serve(args) => serve(args).await,
        Commands::Watch(args) => watch(args).await,
    };
    result.map_err(explain)
}

/// Log a crate error with its classification and attach the recovery hint.
fn explain(report: Report) -> Report {
    let hint = report.downcast_ref::<MetricastError>().map(|err| {
        error!(
            code = err.error_code(),
            category = %err.category(),
            retryable = err.is_retryable(),
            "{}",
            err.user_message()
        );
        err.category().recovery_hint()
    });
    match hint {
        Some(hint) => report.suggestion(hint),
        None => report,
    }
}

/// Resolves on Ctrl-C, or on SIGTERM where there is one.
async fn shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down");
                Ok(())
            }
            result = tokio::signal::ctrl_c() => {
                info!("Received SIGINT, shutting down");
                result
            }
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await
    }
}

async fn serve(args: ServeArgs) -> Result<()> {
    let mut config = ServerConfig::from_env()?;
    if let Some(bind) = args.bind {
        config = config.with_bind_addr(bind);
    }
    if let Some(url) = args.store_url {
        config = config.with_store_url(url);
    }
    if let Some(ms) = args.interval_ms {
        if ms == 0 {
            return Err(MetricastError::config("--interval-ms must be greater than zero").into());
        }
        config = config.with_broadcast_interval(Duration::from_millis(ms));
    }
    if let Some(origin) = args.cors_origin {
        config = config.with_cors_origin(origin);
    }

    let store = store_from_config(&config).ok_or_else(|| {
        MetricastError::config("no metrics store configured; set --store-url or METRICAST_STORE_URL")
    })?;

    let relay = start_relay(&config, store).await?;
    info!(addr = %relay.local_addr(), "Press Ctrl-C to stop");

    if let Err(e) = shutdown_signal().await {
        warn!(error = %e, "Failed to listen for shutdown signals");
    }
    relay.shutdown().await;
    Ok(())
}

async fn watch(args: WatchArgs) -> Result<()> {
    let config = ConnectorConfig::new(args.endpoints)
        .map_err(MetricastError::from)?
        .with_transports(args.transport)
        .with_handshake_timeout(Duration::from_millis(args.handshake_timeout_ms))
        .with_retry_delay(Duration::from_millis(args.retry_delay_ms))
        .with_max_attempts_per_endpoint(args.max_attempts)
        .with_max_rotations(args.max_rotations);

    let endpoints = config.endpoints.len();
    let mut connector = FailoverConnector::start(config);
    let mut view = ObserverView::new().with_json(args.json);
    let mut exhausted = None;
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            event = connector.recv() => {
                let Some(event) = event else { break };
                if let ConnectorEvent::Exhausted { rotations } = event {
                    exhausted = Some(rotations);
                }
                for line in view.apply(&event) {
                    println!("{}", line);
                }
            }
            signal = &mut shutdown => {
                if let Err(e) = signal {
                    warn!(error = %e, "Failed to listen for shutdown signals");
                }
                break;
            }
        }
    }

    connector.close();
    connector.join().await;

    match exhausted {
        Some(rotations) => Err(MetricastError::from(ConnectorError::AllEndpointsExhausted {
            endpoints,
            rotations,
        })
        .into()),
        None => Ok(()),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_shutdown_signal_resolves_on_sigterm() {
        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);
        // First poll installs the handlers.
        assert!(futures_util::poll!(&mut shutdown).is_pending());

        let status = std::process::Command::new("kill")
            .args(["-TERM", &std::process::id().to_string()])
            .status()
            .unwrap();
        assert!(status.success());

        let result = tokio::time::timeout(Duration::from_secs(5), &mut shutdown)
            .await
            .expect("SIGTERM was not observed");
        assert!(result.is_ok());
    }
}
