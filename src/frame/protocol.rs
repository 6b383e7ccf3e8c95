//! # Telemetry Frame Constants and Types
//!
//! Core wire-format definitions for frames sent to the base station.

use crate::error::{Result, TelemetryError};
use crate::frame::crc::crc8_dvb_s2;
use crate::store::CHANNEL_COUNT;

/// Frame sync byte (always 0x54)
pub const FRAME_SYNC_BYTE: u8 = 0x54;

/// Sensor data frame type
pub const FRAMETYPE_SENSOR_DATA: u8 = 0x01;

/// Maximum frame size on the wire
pub const MAX_FRAME_SIZE: usize = 128;

/// Maximum frame payload size
/// Frame structure: sync(1) + length(1) + type(1) + payload(N) + crc(1)
pub const MAX_PAYLOAD_SIZE: usize = MAX_FRAME_SIZE - 4;

/// Sensor data payload size:
/// sequence(2) + validity bitmap(2) + snapshot uptime(4) + channels(8 x f64)
pub const SENSOR_DATA_PAYLOAD_SIZE: usize = 2 + 2 + 4 + CHANNEL_COUNT * 8;

/// Complete sensor data frame size on the wire
pub const TELEMETRY_FRAME_SIZE: usize = SENSOR_DATA_PAYLOAD_SIZE + 4;

/// A serialized telemetry message pending transmission
///
/// Immutable once built; the transmit path consumes it exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryFrame {
    /// Frame type
    pub frame_type: u8,

    /// Payload data
    pub payload: Vec<u8>,
}

impl TelemetryFrame {
    /// Create a new telemetry frame
    ///
    /// # Errors
    ///
    /// Returns error if the payload exceeds [`MAX_PAYLOAD_SIZE`]
    pub fn new(frame_type: u8, payload: Vec<u8>) -> Result<Self> {
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(TelemetryError::Frame(format!(
                "payload size {} exceeds maximum {}",
                payload.len(),
                MAX_PAYLOAD_SIZE
            )));
        }

        Ok(Self { frame_type, payload })
    }

    /// Frame length byte (type + payload + crc)
    ///
    /// Cannot overflow since the payload is validated against [`MAX_PAYLOAD_SIZE`]
    pub fn length(&self) -> u8 {
        (1 + self.payload.len() + 1) as u8
    }

    /// Total size of the encoded frame in bytes
    pub fn wire_size(&self) -> usize {
        self.payload.len() + 4
    }

    /// Serialize the frame into `buf` without allocating
    ///
    /// Used by the data sender to fill a transport slot in place.
    ///
    /// # Errors
    ///
    /// Returns error if `buf` is smaller than [`Self::wire_size`]
    pub fn encode_into(&self, buf: &mut [u8]) -> Result<usize> {
        let total = self.wire_size();
        if buf.len() < total {
            return Err(TelemetryError::Frame(format!(
                "buffer of {} bytes cannot hold a {} byte frame",
                buf.len(),
                total
            )));
        }

        buf[0] = FRAME_SYNC_BYTE;
        buf[1] = self.length();
        buf[2] = self.frame_type;
        buf[3..3 + self.payload.len()].copy_from_slice(&self.payload);

        // CRC covers length + type + payload
        let crc = crc8_dvb_s2(&buf[1..3 + self.payload.len()]);
        buf[total - 1] = crc;

        Ok(total)
    }

    /// Serialize the frame into a fresh buffer
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; self.wire_size()];
        // Cannot fail: the buffer is sized to the frame
        let written = self
            .encode_into(&mut buf)
            .expect("frame-sized buffer");
        debug_assert_eq!(written, buf.len());
        buf
    }
}
