//! modcast-send - Background daemon for scheduled publishing
//!
//! Runs the publish scheduler against the moderation queue: posts whose
//! scheduled time has elapsed go out to their destination feed, the daily
//! fallback advances approved-but-unscheduled posts, and the daily
//! retention sweep trims old records.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use libmodcast::config::Config;
use libmodcast::gateway::LogGateway;
use libmodcast::{ModcastService, Result, Scheduler};
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "modcast-send")]
#[command(version)]
#[command(about = "Background daemon for scheduled publishing")]
#[command(long_about = "\
modcast-send - Background daemon for scheduled publishing

DESCRIPTION:
    modcast-send is a long-running daemon that polls the moderation queue
    and delivers approved posts to their destination feed at the scheduled
    time. It also performs the daily fallback publish for approved posts
    without an explicit schedule and the daily retention sweep.

    Run exactly one instance per store: a second active scheduler would
    double-publish due posts.

USAGE:
    # Run in foreground (logs to stderr)
    modcast-send

    # Run with custom poll interval
    modcast-send --poll-interval 30

SIGNALS:
    SIGTERM, SIGINT - Graceful shutdown with a final persistence flush

CONFIGURATION:
    Configuration file: ~/.config/modcast/config.toml (or MODCAST_CONFIG)
    Store location:     ~/.local/share/modcast/{posts,feeds}.json

EXIT CODES:
    0 - Clean shutdown
    1 - Runtime error
    2 - Configuration error
")]
struct Cli {
    /// Poll interval in seconds (overrides config)
    #[arg(long, value_name = "SECONDS")]
    #[arg(help = "How often to check for due posts (default: 60)")]
    poll_interval: Option<u64>,

    /// Path to the configuration file (overrides MODCAST_CONFIG)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    #[arg(help = "Enable verbose logging (useful for debugging)")]
    verbose: bool,

    /// Run one scheduler pass and exit (for testing)
    #[arg(long, hide = true)]
    once: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("modcast-send: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };
    if let Some(interval) = cli.poll_interval {
        config.scheduler.poll_interval = interval;
    }

    let gateway = Arc::new(LogGateway::new(config.operator.clone()));
    let service = ModcastService::open(&config, gateway).await;

    info!(
        poll_interval = config.scheduler.poll_interval,
        "modcast-send daemon starting"
    );

    let mut scheduler = Scheduler::new(service.clone(), config.scheduler.clone());

    if cli.once {
        scheduler.tick(chrono::Local::now()).await;
        service.flush().await?;
        info!("modcast-send: single pass complete, exiting");
        return Ok(());
    }

    let shutdown = CancellationToken::new();
    spawn_signal_listener(shutdown.clone());
    scheduler.run(shutdown).await;

    info!("modcast-send daemon stopped");
    Ok(())
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: bool) {
    use libmodcast::logging::{LogFormat, LoggingConfig};

    let format = std::env::var("MODCAST_LOG_FORMAT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(LogFormat::Text);
    let level = std::env::var("MODCAST_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

    LoggingConfig::new(format, level, verbose).init();
}

/// Cancel the token on SIGINT/SIGTERM so the scheduler can flush and stop.
#[cfg(unix)]
fn spawn_signal_listener(shutdown: CancellationToken) {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    std::thread::spawn(move || {
        let mut signals = match Signals::new([SIGINT, SIGTERM]) {
            Ok(signals) => signals,
            Err(e) => {
                tracing::error!(error = %e, "signal handler setup failed");
                return;
            }
        };
        if signals.forever().next().is_some() {
            info!("received shutdown signal, stopping gracefully...");
            shutdown.cancel();
        }
    });
}

#[cfg(not(unix))]
fn spawn_signal_listener(shutdown: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received shutdown signal, stopping gracefully...");
            shutdown.cancel();
        }
    });
}
