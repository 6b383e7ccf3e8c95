//! # CAN Ingestion
//!
//! Consumes decoded frames from the CAN driver and fills the sensor store.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, trace};

use crate::stats::PipelineStats;
use crate::store::{CanChannel, CanChannels};

/// One decoded frame from the vehicle CAN bus
///
/// The CAN driver collaborator delivers these already stripped of bus-level
/// framing: identifier, data length code and up to 8 payload bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanFrame {
    pub id: u32,
    pub dlc: u8,
    pub data: [u8; 8],
}

/// Identifier of the motor controller broadcast frame
pub const MOTOR_FRAME_ID: u32 = 0x18;

/// Values decoded from one motor frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct MotorReadings {
    power: u16,
    angular_speed: u16,
    vehicle_speed: u16,
}

/// Decode the motor broadcast frame
///
/// Layout: three 16-bit big-endian values in bytes 0..6 (power, angular
/// speed, vehicle speed); bytes 6..8 are reserved. Anything else is treated
/// as malformed and discarded.
fn decode_motor_frame(frame: &CanFrame) -> Option<MotorReadings> {
    if frame.id != MOTOR_FRAME_ID || frame.dlc != 8 {
        return None;
    }

    Some(MotorReadings {
        power: u16::from_be_bytes([frame.data[0], frame.data[1]]),
        angular_speed: u16::from_be_bytes([frame.data[2], frame.data[3]]),
        vehicle_speed: u16::from_be_bytes([frame.data[4], frame.data[5]]),
    })
}

/// CAN ingestion task
///
/// Applies frames in arrival order until the driver side closes the channel.
pub async fn run(
    mut frames: mpsc::Receiver<CanFrame>,
    channels: CanChannels,
    stats: Arc<PipelineStats>,
) {
    info!("CAN ingestion started");

    while let Some(frame) = frames.recv().await {
        match decode_motor_frame(&frame) {
            Some(readings) => {
                channels.update(CanChannel::Power, readings.power as f64);
                channels.update(CanChannel::AngularSpeed, readings.angular_speed as f64);
                channels.update(CanChannel::VehicleSpeed, readings.vehicle_speed as f64);

                trace!(
                    power = readings.power,
                    angular_speed = readings.angular_speed,
                    vehicle_speed = readings.vehicle_speed,
                    "motor frame applied"
                );
            }
            None => {
                stats.record_can_frame_rejected();
                debug!(id = frame.id, dlc = frame.dlc, "discarding malformed CAN frame");
            }
        }
    }

    info!("CAN ingestion stopped");
}
