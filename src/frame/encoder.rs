//! # Telemetry Frame Encoder
//!
//! Serializes sensor snapshots into sensor data frames.

use bytes::BufMut;

use crate::store::SensorSnapshot;

use super::protocol::*;

/// Encode a sensor snapshot into a complete telemetry frame
///
/// The frame carries a wrapping sequence number, a per-channel validity
/// bitmap, the snapshot's uptime timestamp and one big-endian IEEE-754 value
/// per channel. Channels that were never written encode as 0.0 with their
/// validity bit clear, so the base station can tell "no data yet" from a
/// measured zero.
pub fn encode_sensor_frame(sequence: u16, snapshot: &SensorSnapshot) -> TelemetryFrame {
    // The payload size is fixed and below MAX_PAYLOAD_SIZE, so the frame is
    // built directly instead of through the validating constructor
    TelemetryFrame {
        frame_type: FRAMETYPE_SENSOR_DATA,
        payload: encode_sensor_payload(sequence, snapshot),
    }
}

/// Encode the sensor data payload
///
/// # Layout
///
/// ```text
/// Bytes 0..2   sequence number, big-endian
/// Bytes 2..4   channel validity bitmap, big-endian (bit i = channel i)
/// Bytes 4..8   snapshot uptime in milliseconds, big-endian
/// Bytes 8..72  channel values, 8 x f64 big-endian in channel order
/// ```
pub fn encode_sensor_payload(sequence: u16, snapshot: &SensorSnapshot) -> Vec<u8> {
    let mut payload = Vec::with_capacity(SENSOR_DATA_PAYLOAD_SIZE);

    payload.put_u16(sequence);
    payload.put_u16(snapshot.validity_bitmap());
    payload.put_u32(snapshot.taken_at_ms() as u32);

    for (_, sample) in snapshot.iter() {
        payload.put_f64(sample.map_or(0.0, |s| s.value));
    }

    debug_assert_eq!(payload.len(), SENSOR_DATA_PAYLOAD_SIZE);
    payload
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::crc::crc8_dvb_s2;
    use crate::store::{CanChannel, GpsChannel, SensorChannel, SensorStore};

    #[test]
    fn test_empty_snapshot_encodes_invalid_channels() {
        let (store, _can, _gps) = SensorStore::with_writers();
        let frame = encode_sensor_frame(0, &store.snapshot());

        assert_eq!(frame.frame_type, FRAMETYPE_SENSOR_DATA);
        assert_eq!(frame.payload.len(), SENSOR_DATA_PAYLOAD_SIZE);

        // Validity bitmap is zero, all values encode as 0.0
        assert_eq!(&frame.payload[2..4], &[0x00, 0x00]);
        assert!(frame.payload[8..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_sequence_number_is_big_endian() {
        let (store, _can, _gps) = SensorStore::with_writers();
        let frame = encode_sensor_frame(0x1234, &store.snapshot());

        assert_eq!(frame.payload[0], 0x12);
        assert_eq!(frame.payload[1], 0x34);
    }

    #[test]
    fn test_channel_values_encode_in_order() {
        let (store, can, gps) = SensorStore::with_writers();
        can.update(CanChannel::Power, 57000.0);
        gps.update(GpsChannel::Latitude, 46.2331);

        let frame = encode_sensor_frame(1, &store.snapshot());

        let power_index = 8 + SensorChannel::Power.index() * 8;
        let power_bytes: [u8; 8] = frame.payload[power_index..power_index + 8]
            .try_into()
            .unwrap();
        assert_eq!(f64::from_be_bytes(power_bytes), 57000.0);

        let lat_index = 8 + SensorChannel::GpsLatitude.index() * 8;
        let lat_bytes: [u8; 8] = frame.payload[lat_index..lat_index + 8]
            .try_into()
            .unwrap();
        assert_eq!(f64::from_be_bytes(lat_bytes), 46.2331);

        // Validity bitmap marks exactly the two written channels
        let bitmap = u16::from_be_bytes([frame.payload[2], frame.payload[3]]);
        let expected = (1 << SensorChannel::Power.index())
            | (1 << SensorChannel::GpsLatitude.index());
        assert_eq!(bitmap, expected);
    }

    #[test]
    fn test_encoded_frame_wire_layout() {
        let (store, can, _gps) = SensorStore::with_writers();
        can.update(CanChannel::VehicleSpeed, 78.0);

        let bytes = encode_sensor_frame(7, &store.snapshot()).encode();

        assert_eq!(bytes.len(), TELEMETRY_FRAME_SIZE);
        assert_eq!(bytes[0], FRAME_SYNC_BYTE);
        assert_eq!(bytes[1], (1 + SENSOR_DATA_PAYLOAD_SIZE + 1) as u8);
        assert_eq!(bytes[2], FRAMETYPE_SENSOR_DATA);
        assert_eq!(
            bytes[TELEMETRY_FRAME_SIZE - 1],
            crc8_dvb_s2(&bytes[1..TELEMETRY_FRAME_SIZE - 1])
        );
    }

    #[test]
    fn test_different_snapshots_different_crc() {
        let (store, can, _gps) = SensorStore::with_writers();

        can.update(CanChannel::Power, 55000.0);
        let frame1 = encode_sensor_frame(1, &store.snapshot()).encode();

        can.update(CanChannel::Power, 59000.0);
        let frame2 = encode_sensor_frame(1, &store.snapshot()).encode();

        assert_ne!(
            frame1[TELEMETRY_FRAME_SIZE - 1],
            frame2[TELEMETRY_FRAME_SIZE - 1]
        );
    }
}
