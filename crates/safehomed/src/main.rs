// # safehomed - Safe Home Daemon
//
// Thin integration layer: all presence logic lives in safehome-core.
//
// The safehomed daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Registering notifiers and state stores
// 4. Resuming or starting tracking
// 5. Feeding location fixes from stdin into the tracker
//
// ## Configuration
//
// ### State Store
// - `SAFEHOME_STATE_STORE_TYPE`: file (default) or memory
// - `SAFEHOME_STATE_STORE_PATH`: Path to state file (for file store)
//
// ### Notifier
// - `SAFEHOME_NOTIFIER_TYPE`: log (default) or webhook
// - `SAFEHOME_WEBHOOK_URL`: Endpoint receiving arrivals (for webhook)
// - `SAFEHOME_WEBHOOK_TOKEN`: Bearer token (optional)
// - `SAFEHOME_MODE`: Set to `dry-run` to log webhook calls instead of sending
//
// ### Home
// - `SAFEHOME_HOME_LAT`, `SAFEHOME_HOME_LON`: Home coordinates (optional when resuming)
// - `SAFEHOME_HOME_LABEL`: Label sent with the arrival (default "Home")
//
// ### Tracker
// - `SAFEHOME_EXIT_METERS`, `SAFEHOME_ENTRY_METERS`: Hysteresis radii
// - `SAFEHOME_REQUIRED_READINGS`: Close readings needed to confirm return
// - `SAFEHOME_COOLDOWN_SECS`: Minimum time between notifications
// - `SAFEHOME_INTERVAL_SECS`, `SAFEHOME_DISTANCE_METERS`: Requested feed cadence
// - `SAFEHOME_DISPATCH_TIMEOUT_MS`: Upper bound on one notification
// - `SAFEHOME_LOG_LEVEL`: trace, debug, info, warn, error
//
// ## Example
//
// ```bash
// export SAFEHOME_STATE_STORE_PATH=/var/lib/safehome/state.json
// export SAFEHOME_HOME_LAT=14.5995
// export SAFEHOME_HOME_LON=120.9842
// export SAFEHOME_NOTIFIER_TYPE=webhook
// export SAFEHOME_WEBHOOK_URL=https://hooks.example.com/arrivals
//
// location-feed | safehomed
// ```

mod config;
mod feed;
mod notifier;

use std::process::ExitCode;

use anyhow::Result;
use safehome_core::{ComponentRegistry, TrackerEvent, TrackingError, TrackingLifecycleManager};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

use crate::config::Config;
use crate::feed::StdinScheduler;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum SafeHomeExitCode {
    /// Clean shutdown (signal or end of feed)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<SafeHomeExitCode> for ExitCode {
    fn from(code: SafeHomeExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return SafeHomeExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return SafeHomeExitCode::ConfigError.into();
    }

    let log_level = match config.log_level() {
        Ok(level) => level,
        Err(e) => {
            eprintln!("Configuration validation error: {:#}", e);
            return SafeHomeExitCode::ConfigError.into();
        }
    };

    // Logs go to stderr; stdin carries the location feed
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return SafeHomeExitCode::ConfigError.into();
    }

    info!("Starting safehomed daemon");

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return SafeHomeExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run_daemon(config).await {
            error!("Daemon error: {:#}", e);
            SafeHomeExitCode::RuntimeError
        } else {
            SafeHomeExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Run the daemon
async fn run_daemon(config: Config) -> Result<()> {
    let registry = ComponentRegistry::new();
    registry.register_builtin_state_stores();
    notifier::register(&registry);

    #[cfg(feature = "webhook")]
    {
        info!("Registering webhook notifier");
        safehome_notify_webhook::register(&registry);
    }

    let core_config = config.core_config();
    info!("State store type: {}", core_config.state_store.type_name());
    info!("Notifier type: {}", core_config.notifier.type_name());

    let state_store = registry.create_state_store(&core_config.state_store).await?;
    let notifier = registry.create_notifier(&core_config.notifier)?;

    let (manager, event_rx) = TrackingLifecycleManager::new(
        Box::new(StdinScheduler::new()),
        notifier,
        state_store,
        core_config,
    )?;
    let events = tokio::spawn(log_events(event_rx));

    resume_or_start(&manager, &config).await?;

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let signals = tokio::spawn(async move {
        match wait_for_shutdown().await {
            Ok(signal) => info!("Received shutdown signal: {}", signal),
            Err(e) => error!("Signal handling failed: {}", e),
        }
        let _ = shutdown_tx.send(());
    });

    info!("Reading location fixes from stdin");
    manager
        .run_with_shutdown(feed::stdin_samples(), Some(shutdown_rx))
        .await?;

    // Tracking stays enabled on disk so the next start resumes it
    signals.abort();
    drop(manager);
    let _ = events.await;

    info!("Shutting down daemon");
    Ok(())
}

/// Resume persisted tracking, or start fresh from the configured home
async fn resume_or_start(manager: &TrackingLifecycleManager, config: &Config) -> Result<()> {
    let home = config.home();

    let recovered = match manager.recover().await {
        Ok(recovered) => recovered,
        Err(TrackingError::NoHomeConfigured) if home.is_some() => {
            warn!("Persisted tracking has no home location, starting over");
            false
        }
        Err(e) => return Err(e.into()),
    };

    match (recovered, home) {
        (true, Some(home)) => {
            if manager.home_location().await?.as_ref() != Some(&home) {
                info!("Configured home differs from persisted home, updating");
                manager.update_home_location(home).await?;
            } else {
                info!("Resumed tracking for '{}'", home.label);
            }
        }
        (true, None) => info!("Resumed tracking for the persisted home"),
        (false, Some(home)) => manager.start(home).await?,
        (false, None) => anyhow::bail!(
            "No tracking to resume and no home configured. \
            Set SAFEHOME_HOME_LAT and SAFEHOME_HOME_LON."
        ),
    }

    Ok(())
}

async fn log_events(mut event_rx: mpsc::Receiver<TrackerEvent>) {
    while let Some(event) = event_rx.recv().await {
        debug!("Tracker event: {:?}", event);
    }
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    let signal = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    Ok(signal)
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
