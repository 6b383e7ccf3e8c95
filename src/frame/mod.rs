//! # Telemetry Frame Module
//!
//! Wire format of the frames sent to the base station.
//!
//! This module handles:
//! - Sensor snapshot serialization into fixed-layout frames
//! - Sequence numbering and channel validity markers
//! - CRC8-DVB-S2 checksum calculation
//! - Frame synchronization and validation

pub mod protocol;
pub mod encoder;
pub mod crc;
