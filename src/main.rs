//! # CanSat Station
//!
//! Ground-station acquisition core for a CanSat sensor payload.
//!
//! This binary runs the headless acquisition pipeline that turns raw serial
//! lines from the payload into a validated, buffered, unit-convertible time
//! series with periodic persistence to an embedded sqlite store.
//!
//! # Control Flow
//!
//! 1. **Initialization**
//!    - Set up logging with tracing subscriber
//!    - Load configuration (built-in defaults if no config file)
//!    - Discover and open the payload serial link (debug fallback if absent)
//!    - Open the versioned record store (acquisition continues without it)
//!
//! 2. **Main Loop**: one cooperative scheduler over four periodic timers
//!    - Fast tick (~100ms): poll, parse, buffer; heartbeat log every 100 ticks
//!    - Mean tick (~2s): temperature running statistics
//!    - Slow tick (~1s): health reporting + record persistence
//!    - Passive tick (~3s): notice-window reset
//!    - Handle Ctrl+C for graceful shutdown
//!
//! 3. **Graceful Shutdown**
//!    - Timers stop firing, final counts are logged, clean exit
//!
//! # Errors
//!
//! Returns error if:
//! - The configuration file exists but is invalid
//! - The unit conversion table is incomplete
//! - A channel series reaches its fixed capacity (structural, never silent)

use std::path::Path;

use anyhow::Result;
use tokio::time::{interval, Duration};
use tracing::{error, info, warn};

use cansat_station::config::Config;
use cansat_station::link::LinkManager;
use cansat_station::pipeline::Acquisition;
use cansat_station::store::RecordStore;
use cansat_station::telemetry::frame::ChannelId;

/// Configuration file consulted at startup
const CONFIG_PATH: &str = "config/default.toml";

/// Number of fast ticks between heartbeat log messages (~10s at 100ms)
const HEARTBEAT_TICKS: u64 = 100;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("CanSat station v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = Config::load_or_default(CONFIG_PATH)?;

    let link = LinkManager::connect(&config.serial);

    let store = if config.storage.enabled {
        match RecordStore::open_default(Path::new(&config.storage.db_dir)) {
            Ok(store) => Some(store),
            Err(err) => {
                warn!(%err, "record store unavailable, continuing without persistence");
                None
            }
        }
    } else {
        None
    };

    let mut acquisition = Acquisition::new(&config, link, store)?;

    let mut fast = interval(Duration::from_millis(config.acquisition.fast_tick_ms));
    let mut mean = interval(Duration::from_millis(config.acquisition.mean_tick_ms));
    let mut slow = interval(Duration::from_millis(config.acquisition.slow_tick_ms));
    let mut passive = interval(Duration::from_millis(config.acquisition.passive_tick_ms));

    info!(
        "Starting acquisition loop ({}ms fast tick)",
        config.acquisition.fast_tick_ms
    );
    info!("Press Ctrl+C to exit");

    let mut tick_count: u64 = 0;

    // Main acquisition loop
    loop {
        tokio::select! {
            _ = fast.tick() => {
                if let Err(err) = acquisition.fast_tick() {
                    error!(%err, "acquisition halted");
                    return Err(err.into());
                }

                tick_count += 1;
                if tick_count % HEARTBEAT_TICKS == 0 {
                    heartbeat(&acquisition);
                }
            }

            _ = mean.tick() => {
                if let Err(err) = acquisition.mean_tick() {
                    error!(%err, "statistics halted");
                    return Err(err.into());
                }
            }

            _ = slow.tick() => acquisition.slow_tick(),

            _ = passive.tick() => acquisition.passive_tick(),

            // Handle Ctrl+C for graceful shutdown
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    info!(
        "Stopped after {} acquisition ticks ({} samples per channel)",
        tick_count,
        acquisition.series(ChannelId::Temperature).len()
    );

    Ok(())
}

/// Periodic one-line summary of the current readings
fn heartbeat(acquisition: &Acquisition) {
    let temp = acquisition.reading(ChannelId::Temperature);
    let press = acquisition.reading(ChannelId::Pressure);
    let poll = acquisition.reading(ChannelId::Particulates);

    info!(
        "link {} | temp {:.3} {} | press {:.1} {} | dust {:.1} {} | altitude {:.1} m",
        acquisition.link_status(),
        temp.value,
        acquisition.unit_label(ChannelId::Temperature),
        press.value,
        acquisition.unit_label(ChannelId::Pressure),
        poll.value,
        acquisition.unit_label(ChannelId::Particulates),
        acquisition.altitude(),
    );
}
