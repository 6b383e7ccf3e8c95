//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::Deserialize;
use serde::de::Error;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;

use crate::error::Result;
use crate::frame::protocol::TELEMETRY_FRAME_SIZE;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub wifi: WifiConfig,
    pub network: NetworkConfig,
    pub pool: PoolConfig,
    pub sender: SenderConfig,
    pub logger: LoggerConfig,
    pub simulation: SimulationConfig,
}

/// WiFi link configuration
///
/// The unit associates with the primary access point and, when redundancy is
/// enabled, rotates to the redundant one after a connect timeout or failure.
#[derive(Debug, Deserialize, Clone)]
pub struct WifiConfig {
    pub primary_ssid: String,

    #[serde(default)]
    pub primary_password: String,

    #[serde(default)]
    pub redundant_ssid: String,

    #[serde(default)]
    pub redundant_password: String,

    #[serde(default)]
    pub redundancy_enabled: bool,

    #[serde(default = "default_status_poll_ms")]
    pub status_poll_ms: u64,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

/// Base station network configuration
#[derive(Debug, Deserialize, Clone)]
pub struct NetworkConfig {
    #[serde(default = "default_base_station_addr")]
    pub base_station_addr: String,

    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
}

/// Transport slot pool configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PoolConfig {
    #[serde(default = "default_pool_slots")]
    pub slots: usize,

    #[serde(default = "default_slot_size")]
    pub slot_size: usize,
}

/// Data sender configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SenderConfig {
    #[serde(default = "default_sender_interval_ms")]
    pub interval_ms: u64,
}

/// Data logger configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggerConfig {
    #[serde(default = "default_logger_enabled")]
    pub enabled: bool,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_logger_interval_ms")]
    pub interval_ms: u64,

    #[serde(default = "default_record_format")]
    pub format: String,

    #[serde(default = "default_max_records_per_file")]
    pub max_records_per_file: usize,

    #[serde(default = "default_max_files_to_keep")]
    pub max_files_to_keep: usize,
}

/// Bench simulation configuration
///
/// When enabled, the unit runs against simulated CAN/GPS/WiFi collaborators
/// instead of hardware drivers.
#[derive(Debug, Deserialize, Clone)]
pub struct SimulationConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_sim_can_interval_ms")]
    pub can_interval_ms: u64,

    #[serde(default = "default_sim_gps_interval_ms")]
    pub gps_interval_ms: u64,

    #[serde(default = "default_sim_connect_succeeds_after")]
    pub connect_succeeds_after: u32,

    /// Drop the link this many seconds after each connect (0 = never)
    #[serde(default)]
    pub drop_link_after_s: u64,
}

// Default value functions
fn default_status_poll_ms() -> u64 { 300 }
fn default_connect_timeout_ms() -> u64 { 9000 }
fn default_retry_delay_ms() -> u64 { 1000 }

fn default_base_station_addr() -> String { "192.168.1.10:5005".to_string() }
fn default_queue_depth() -> usize { 64 }

fn default_pool_slots() -> usize { 128 }
fn default_slot_size() -> usize { 256 }

fn default_sender_interval_ms() -> u64 { 100 }

fn default_logger_enabled() -> bool { true }
fn default_log_dir() -> String { "./logs".to_string() }
fn default_logger_interval_ms() -> u64 { 500 }
fn default_record_format() -> String { "csv".to_string() }
fn default_max_records_per_file() -> usize { 10000 }
fn default_max_files_to_keep() -> usize { 10 }

fn default_sim_can_interval_ms() -> u64 { 100 }
fn default_sim_gps_interval_ms() -> u64 { 1000 }
fn default_sim_connect_succeeds_after() -> u32 { 1 }

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a configuration string (used by tests and embedded defaults)
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    fn validate(&self) -> Result<()> {
        // Validate wifi configuration
        if self.wifi.primary_ssid.is_empty() {
            return Err(crate::error::TelemetryError::Config(
                toml::de::Error::custom("primary_ssid cannot be empty")
            ));
        }

        if self.wifi.redundancy_enabled && self.wifi.redundant_ssid.is_empty() {
            return Err(crate::error::TelemetryError::Config(
                toml::de::Error::custom("redundant_ssid cannot be empty when redundancy is enabled")
            ));
        }

        if self.wifi.status_poll_ms == 0 || self.wifi.status_poll_ms > 10000 {
            return Err(crate::error::TelemetryError::Config(
                toml::de::Error::custom("status_poll_ms must be between 1 and 10000")
            ));
        }

        if self.wifi.connect_timeout_ms < self.wifi.status_poll_ms
            || self.wifi.connect_timeout_ms > 600_000
        {
            return Err(crate::error::TelemetryError::Config(
                toml::de::Error::custom("connect_timeout_ms must be between status_poll_ms and 600000")
            ));
        }

        if self.wifi.retry_delay_ms == 0 || self.wifi.retry_delay_ms > 60000 {
            return Err(crate::error::TelemetryError::Config(
                toml::de::Error::custom("retry_delay_ms must be between 1 and 60000")
            ));
        }

        // Validate network configuration
        self.network.base_station()?;

        if self.network.queue_depth == 0 {
            return Err(crate::error::TelemetryError::Config(
                toml::de::Error::custom("queue_depth must be greater than 0")
            ));
        }

        // Queue entries are backed by pool slots, so the queue can never need
        // more slots than the pool holds
        if self.network.queue_depth > self.pool.slots {
            return Err(crate::error::TelemetryError::Config(
                toml::de::Error::custom("queue_depth cannot exceed pool slots")
            ));
        }

        // Validate pool configuration
        if self.pool.slots == 0 || self.pool.slots > 4096 {
            return Err(crate::error::TelemetryError::Config(
                toml::de::Error::custom("pool slots must be between 1 and 4096")
            ));
        }

        if self.pool.slot_size < TELEMETRY_FRAME_SIZE {
            return Err(crate::error::TelemetryError::Config(
                toml::de::Error::custom(format!(
                    "slot_size must be at least {} bytes (one telemetry frame)",
                    TELEMETRY_FRAME_SIZE
                ))
            ));
        }

        // Validate timing fields
        if self.sender.interval_ms == 0 || self.sender.interval_ms > 60000 {
            return Err(crate::error::TelemetryError::Config(
                toml::de::Error::custom("sender interval_ms must be between 1 and 60000")
            ));
        }

        if self.logger.interval_ms == 0 || self.logger.interval_ms > 60000 {
            return Err(crate::error::TelemetryError::Config(
                toml::de::Error::custom("logger interval_ms must be between 1 and 60000")
            ));
        }

        // Validate logger configuration
        if self.logger.enabled && self.logger.log_dir.is_empty() {
            return Err(crate::error::TelemetryError::Config(
                toml::de::Error::custom("log_dir cannot be empty when logger is enabled")
            ));
        }

        if self.logger.format != "csv" && self.logger.format != "jsonl" {
            return Err(crate::error::TelemetryError::Config(
                toml::de::Error::custom("logger format must be \"csv\" or \"jsonl\"")
            ));
        }

        if self.logger.max_records_per_file == 0 {
            return Err(crate::error::TelemetryError::Config(
                toml::de::Error::custom("max_records_per_file must be greater than 0")
            ));
        }

        if self.logger.max_files_to_keep == 0 {
            return Err(crate::error::TelemetryError::Config(
                toml::de::Error::custom("max_files_to_keep must be greater than 0")
            ));
        }

        // Validate simulation configuration
        if self.simulation.enabled {
            if self.simulation.can_interval_ms == 0 || self.simulation.gps_interval_ms == 0 {
                return Err(crate::error::TelemetryError::Config(
                    toml::de::Error::custom("simulation intervals must be greater than 0")
                ));
            }
        }

        Ok(())
    }
}

impl NetworkConfig {
    /// Parse the configured base station address
    pub fn base_station(&self) -> Result<SocketAddr> {
        self.base_station_addr.parse().map_err(|_| {
            crate::error::TelemetryError::Config(toml::de::Error::custom(format!(
                "base_station_addr is not a valid socket address: {}",
                self.base_station_addr
            )))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [wifi]
        primary_ssid = "pit-lane"

        [network]
        [pool]
        [sender]
        [logger]
        [simulation]
    "#;

    #[test]
    fn test_minimal_config_defaults() {
        let config = Config::from_toml(MINIMAL).unwrap();

        assert_eq!(config.wifi.primary_ssid, "pit-lane");
        assert_eq!(config.wifi.primary_password, "");
        assert!(!config.wifi.redundancy_enabled);
        assert_eq!(config.wifi.status_poll_ms, 300);
        assert_eq!(config.wifi.connect_timeout_ms, 9000);
        assert_eq!(config.network.queue_depth, 64);
        assert_eq!(config.pool.slots, 128);
        assert_eq!(config.pool.slot_size, 256);
        assert_eq!(config.sender.interval_ms, 100);
        assert_eq!(config.logger.format, "csv");
        assert!(!config.simulation.enabled);
    }

    #[test]
    fn test_default_pool_matches_heap_budget() {
        let config = Config::from_toml(MINIMAL).unwrap();

        // 128 slots x 256 bytes = 32 KiB message heap
        assert_eq!(config.pool.slots * config.pool.slot_size, 32768);
    }

    #[test]
    fn test_full_config_parses() {
        let toml = r#"
            [wifi]
            primary_ssid = "paddock"
            primary_password = "secret"
            redundant_ssid = "paddock-2"
            redundant_password = "secret2"
            redundancy_enabled = true
            status_poll_ms = 200
            connect_timeout_ms = 6000
            retry_delay_ms = 500

            [network]
            base_station_addr = "10.0.0.2:9000"
            queue_depth = 8

            [pool]
            slots = 16
            slot_size = 512

            [sender]
            interval_ms = 50

            [logger]
            enabled = true
            log_dir = "/tmp/telemetry"
            interval_ms = 250
            format = "jsonl"
            max_records_per_file = 500
            max_files_to_keep = 3

            [simulation]
            enabled = true
            can_interval_ms = 10
            gps_interval_ms = 100
            connect_succeeds_after = 3
            drop_link_after_s = 30
        "#;

        let config = Config::from_toml(toml).unwrap();
        assert!(config.wifi.redundancy_enabled);
        assert_eq!(config.wifi.redundant_ssid, "paddock-2");
        assert_eq!(config.network.base_station().unwrap().port(), 9000);
        assert_eq!(config.simulation.connect_succeeds_after, 3);
    }

    #[test]
    fn test_empty_primary_ssid_rejected() {
        let toml = MINIMAL.replace("pit-lane", "");
        let result = Config::from_toml(&toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_redundancy_requires_redundant_ssid() {
        let toml = r#"
            [wifi]
            primary_ssid = "pit-lane"
            redundancy_enabled = true

            [network]
            [pool]
            [sender]
            [logger]
            [simulation]
        "#;

        let result = Config::from_toml(toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_queue_deeper_than_pool_rejected() {
        let toml = r#"
            [wifi]
            primary_ssid = "pit-lane"

            [network]
            queue_depth = 32

            [pool]
            slots = 16

            [sender]
            [logger]
            [simulation]
        "#;

        let result = Config::from_toml(toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_slot_size_must_fit_frame() {
        let toml = r#"
            [wifi]
            primary_ssid = "pit-lane"

            [network]
            [pool]
            slot_size = 16

            [sender]
            [logger]
            [simulation]
        "#;

        let result = Config::from_toml(toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_record_format_rejected() {
        let toml = r#"
            [wifi]
            primary_ssid = "pit-lane"

            [network]
            [pool]
            [sender]

            [logger]
            format = "xml"

            [simulation]
        "#;

        let result = Config::from_toml(toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_base_station_addr_rejected() {
        let toml = r#"
            [wifi]
            primary_ssid = "pit-lane"

            [network]
            base_station_addr = "not-an-address"

            [pool]
            [sender]
            [logger]
            [simulation]
        "#;

        let result = Config::from_toml(toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_connect_timeout_shorter_than_poll_rejected() {
        let toml = r#"
            [wifi]
            primary_ssid = "pit-lane"
            status_poll_ms = 300
            connect_timeout_ms = 100

            [network]
            [pool]
            [sender]
            [logger]
            [simulation]
        "#;

        let result = Config::from_toml(toml);
        assert!(result.is_err());
    }
}
