//! # Telemetry Unit Library
//!
//! Onboard vehicle telemetry unit for relaying sensor data to a base station.
//!
//! This library provides the core functionality of the unit: CAN and GPS
//! ingestion into a shared sensor store, a WiFi connectivity manager with
//! redundant access points, a periodic data sender feeding a pooled
//! transport queue, and a durable local data logger.

pub mod config;
pub mod error;
pub mod frame;
pub mod ingest;
pub mod link;
pub mod logger;
pub mod sender;
pub mod sim;
pub mod stats;
pub mod store;
pub mod transport;
