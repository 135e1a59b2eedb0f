//! Console tail for the CostSync store.
//!
//! Connects to the configured broker, subscribes to the fixed state
//! topics, and logs every snapshot revision, status transition, and
//! command confirmation until interrupted. Doubles as a smoke test for a
//! deployment: if this binary shows snapshot updates, the dashboard will
//! too.
//!
//! # Startup sequence
//!
//! 1. Load configuration from `costsync-config.yaml` (or `$COSTSYNC_CONFIG`)
//! 2. Initialize structured logging (tracing)
//! 3. Connect the store and subscribe to its change channels
//! 4. Log changes until Ctrl-C, then shut down gracefully

use std::path::Path;

use costsync_client::{SyncConfig, SyncStore};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Application entry point.
///
/// # Errors
///
/// Returns an error when configuration loading or store startup fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path =
        std::env::var("COSTSYNC_CONFIG").unwrap_or_else(|_| "costsync-config.yaml".to_owned());
    let config_file_found = Path::new(&config_path).exists();
    let config = load_config(Path::new(&config_path), config_file_found)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone())),
        )
        .with_target(true)
        .init();

    info!(path = %config_path, "costsync-monitor starting");
    if !config_file_found {
        warn!(path = %config_path, "config file not found, using defaults");
    }

    let store = SyncStore::connect(config).await?;
    let handle = store.handle();
    info!(client_id = %handle.client_id(), "store started");

    let mut snapshots = handle.subscribe_snapshots();
    let mut status = handle.subscribe_status();
    let mut confirmations = handle.subscribe_confirmations();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupt received");
                break;
            }
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *status.borrow_and_update();
                info!(status = %current, "connection status changed");
            }
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                info!(
                    revision = snapshot.revision(),
                    topics = snapshot.raw_all().len(),
                    rate_tiers = snapshot.rate_cards().map_or(0, |cards| cards.0.len()),
                    "snapshot updated"
                );
            }
            result = confirmations.recv() => {
                match result {
                    Ok(command) => {
                        info!(token = %command.token, topic = %command.topic, "command confirmed");
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "confirmation stream lagged, skipping ahead");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    store.shutdown().await?;
    info!("costsync-monitor stopped");
    Ok(())
}

/// Load configuration, falling back to env-overridden defaults when no
/// file exists.
fn load_config(path: &Path, found: bool) -> Result<SyncConfig, Box<dyn std::error::Error>> {
    if found {
        Ok(SyncConfig::from_file(path)?)
    } else {
        Ok(SyncConfig::from_env())
    }
}
