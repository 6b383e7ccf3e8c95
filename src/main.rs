//! # Telemetry Unit
//!
//! Onboard vehicle telemetry unit for the racing team's base station link.
//!
//! The unit ingests sensor readings from the CAN bus and the GPS receiver,
//! keeps the latest value per channel in a shared store, and relays
//! periodic snapshots over WiFi to the base station while appending them
//! to local log segments.
//!
//! # Control Flow
//!
//! 1. **Initialization**
//!    - Load and validate the TOML configuration
//!    - Set up logging (console plus a non-blocking file writer)
//!    - Build the sensor store, slot pool and task channels
//!
//! 2. **Tasks**
//!    - Connectivity manager: owns the WiFi link lifecycle
//!    - CAN / GPS ingestion: fill the sensor store
//!    - Data sender: periodic snapshot -> frame -> transport queue
//!    - Network transmit: drains the queue towards the base station
//!    - Data logger: periodic/button-triggered durable records
//!
//! 3. **Shutdown**
//!    - Ctrl+C stops the unit and logs the final pipeline counters
//!
//! # Errors
//!
//! Returns error if the configuration cannot be loaded, the log directory
//! cannot be created, or the UDP transport cannot be bound. Everything past
//! startup is absorbed by the pipeline and surfaced as counters and log
//! events.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use telemetry_unit::config::Config;
use telemetry_unit::ingest;
use telemetry_unit::link::driver::DetachedDriver;
use telemetry_unit::link::{ConnectivityManager, LinkConfig, WifiDriver};
use telemetry_unit::logger::{DataLogger, FileStorage, RecordFormat};
use telemetry_unit::sender::DataSender;
use telemetry_unit::sim;
use telemetry_unit::sim::SimWifiDriver;
use telemetry_unit::stats::PipelineStats;
use telemetry_unit::store::SensorStore;
use telemetry_unit::transport::{self, SlotPool, Transport, UdpTransport};

/// Fallback configuration path when none is given on the command line
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load configuration from {}", config_path))?;

    // Diagnostics share the data logger's directory
    let diag_dir = if config.logger.log_dir.is_empty() {
        "./logs"
    } else {
        config.logger.log_dir.as_str()
    };
    std::fs::create_dir_all(diag_dir)
        .with_context(|| format!("failed to create log directory {}", diag_dir))?;

    let file_appender = tracing_appender::rolling::daily(diag_dir, "telemetry-unit.log");
    let (file_writer, _log_guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false),
        )
        .init();

    info!("Telemetry Unit v{} starting...", env!("CARGO_PKG_VERSION"));
    info!(config = %config_path, "configuration loaded");

    let stats = PipelineStats::new();
    let (store, can_writer, gps_writer) = SensorStore::with_writers();
    let pool = SlotPool::new(config.pool.slots, config.pool.slot_size);

    // Hand-off channels between collaborators and tasks
    let (can_tx, can_rx) = mpsc::channel(64);
    let (gps_tx, gps_rx) = mpsc::channel(16);
    let (wifi_event_tx, wifi_event_rx) = mpsc::channel(16);
    let (queue_tx, queue_rx) = mpsc::channel(config.network.queue_depth);
    let (trigger_tx, trigger_rx) = mpsc::channel(4);

    let mut tasks = Vec::new();

    // Connectivity manager
    let driver: Box<dyn WifiDriver> = if config.simulation.enabled {
        let drop_after = (config.simulation.drop_link_after_s > 0)
            .then(|| Duration::from_secs(config.simulation.drop_link_after_s));
        Box::new(SimWifiDriver::new(
            wifi_event_tx.clone(),
            config.simulation.connect_succeeds_after,
            drop_after,
        ))
    } else {
        // Real link hardware glue plugs into the event channel; until then
        // every connect attempt times out and the unit logs locally only
        warn!("no WiFi driver wired on this platform, link will stay down");
        Box::new(DetachedDriver)
    };
    let (manager, link) =
        ConnectivityManager::new(driver, wifi_event_rx, LinkConfig::from_wifi_config(&config.wifi));
    tasks.push(tokio::spawn(manager.run()));

    // Ingestion
    tasks.push(tokio::spawn(ingest::can::run(
        can_rx,
        can_writer,
        Arc::clone(&stats),
    )));
    tasks.push(tokio::spawn(ingest::gps::run(
        gps_rx,
        gps_writer,
        Arc::clone(&stats),
    )));

    // Telemetry path
    let base_station = config.network.base_station()?;
    let uplink: Box<dyn Transport> = Box::new(
        UdpTransport::connect(base_station)
            .await
            .with_context(|| format!("failed to open UDP transport to {}", base_station))?,
    );
    tasks.push(tokio::spawn(transport::run(
        queue_rx,
        uplink,
        Arc::clone(&stats),
    )));

    let sender = DataSender::new(
        Arc::clone(&store),
        link.clone(),
        pool.clone(),
        queue_tx,
        Arc::clone(&stats),
    );
    tasks.push(tokio::spawn(
        sender.run(Duration::from_millis(config.sender.interval_ms)),
    ));

    // Local logging
    if config.logger.enabled {
        let format = RecordFormat::parse(&config.logger.format).unwrap_or(RecordFormat::Csv);
        let storage = FileStorage::new(
            &config.logger.log_dir,
            format.extension(),
            config.logger.max_files_to_keep,
        )
        .context("failed to open record storage")?;

        let logger = DataLogger::new(
            Arc::clone(&store),
            Box::new(storage),
            format,
            config.logger.max_records_per_file,
            trigger_rx,
            Arc::clone(&stats),
        );
        tasks.push(tokio::spawn(
            logger.run(Duration::from_millis(config.logger.interval_ms)),
        ));
    }

    // Bench simulation feeds, replacing the vehicle-side drivers
    if config.simulation.enabled {
        info!("bench simulation enabled");
        tasks.push(tokio::spawn(sim::run_motor_sim(
            can_tx.clone(),
            Duration::from_millis(config.simulation.can_interval_ms),
        )));
        tasks.push(tokio::spawn(sim::run_gps_sim(
            gps_tx.clone(),
            Duration::from_millis(config.simulation.gps_interval_ms),
        )));
    } else {
        info!("hardware driver endpoints idle until platform glue feeds them");
    }

    // Hardware glue owns these endpoints in a real deployment: CAN frames,
    // GPS fixes, link events and the log button all arrive through them
    let _driver_endpoints = (can_tx, gps_tx, wifi_event_tx, trigger_tx);

    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl+C, shutting down...");
    info!(
        frames_enqueued = stats.frames_enqueued(),
        frames_sent = stats.frames_sent(),
        send_failures = stats.send_failures(),
        offline_skips = stats.offline_skips(),
        pool_exhausted_drops = stats.pool_exhausted_drops(),
        queue_full_drops = stats.queue_full_drops(),
        records_written = stats.records_written(),
        records_dropped = stats.records_dropped(),
        "final pipeline counters"
    );

    for task in tasks {
        task.abort();
    }

    Ok(())
}
