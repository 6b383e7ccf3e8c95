//! # Sensor Store
//!
//! In-memory table of the latest known value per sensor channel.
//!
//! This module handles:
//! - One cell per channel with the latest value and a monotonic update timestamp
//! - Single-writer-per-channel access through the `CanChannels` / `GpsChannels` handles
//! - Consistent snapshots for the data sender and data logger
//!
//! There is no store-wide lock: each cell carries its own mutex, so a reader
//! taking a snapshot never blocks a writer for more than one cell copy. A
//! snapshot is not an atomic cut across channels, but no single channel value
//! can ever be observed torn.

use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Number of sensor channels
pub const CHANNEL_COUNT: usize = 8;

/// One named sensor measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorChannel {
    /// Motor power draw (CAN)
    Power = 0,
    /// Motor angular speed (CAN)
    AngularSpeed = 1,
    /// Vehicle ground speed from the wheel sensor (CAN)
    VehicleSpeed = 2,
    /// GPS latitude in degrees
    GpsLatitude = 3,
    /// GPS longitude in degrees
    GpsLongitude = 4,
    /// GPS fix flag (0.0 or 1.0)
    GpsFix = 5,
    /// GPS time of day in seconds
    GpsTime = 6,
    /// GPS ground speed
    GpsSpeed = 7,
}

impl SensorChannel {
    /// All channels in wire/record order
    pub const ALL: [SensorChannel; CHANNEL_COUNT] = [
        SensorChannel::Power,
        SensorChannel::AngularSpeed,
        SensorChannel::VehicleSpeed,
        SensorChannel::GpsLatitude,
        SensorChannel::GpsLongitude,
        SensorChannel::GpsFix,
        SensorChannel::GpsTime,
        SensorChannel::GpsSpeed,
    ];

    /// Stable index of this channel in snapshots, frames and records
    pub fn index(self) -> usize {
        self as usize
    }

    /// Channel name used in log records
    pub fn name(self) -> &'static str {
        match self {
            SensorChannel::Power => "power",
            SensorChannel::AngularSpeed => "angular_speed",
            SensorChannel::VehicleSpeed => "vehicle_speed",
            SensorChannel::GpsLatitude => "gps_latitude",
            SensorChannel::GpsLongitude => "gps_longitude",
            SensorChannel::GpsFix => "gps_fix",
            SensorChannel::GpsTime => "gps_time",
            SensorChannel::GpsSpeed => "gps_speed",
        }
    }
}

/// Channels owned by the CAN ingestion task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanChannel {
    Power,
    AngularSpeed,
    VehicleSpeed,
}

impl CanChannel {
    fn channel(self) -> SensorChannel {
        match self {
            CanChannel::Power => SensorChannel::Power,
            CanChannel::AngularSpeed => SensorChannel::AngularSpeed,
            CanChannel::VehicleSpeed => SensorChannel::VehicleSpeed,
        }
    }
}

/// Channels owned by the GPS ingestion task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpsChannel {
    Latitude,
    Longitude,
    Fix,
    Time,
    Speed,
}

impl GpsChannel {
    fn channel(self) -> SensorChannel {
        match self {
            GpsChannel::Latitude => SensorChannel::GpsLatitude,
            GpsChannel::Longitude => SensorChannel::GpsLongitude,
            GpsChannel::Fix => SensorChannel::GpsFix,
            GpsChannel::Time => SensorChannel::GpsTime,
            GpsChannel::Speed => SensorChannel::GpsSpeed,
        }
    }
}

/// Latest value of one channel plus its update timestamp
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelSample {
    pub value: f64,
    /// Milliseconds of unit uptime at the last update
    pub updated_at_ms: u64,
}

#[derive(Debug, Clone, Copy, Default)]
struct Cell {
    value: f64,
    updated_at_ms: u64,
    written: bool,
}

/// Table of the latest value per channel
#[derive(Debug)]
pub struct SensorStore {
    start: Instant,
    cells: [Mutex<Cell>; CHANNEL_COUNT],
}

impl SensorStore {
    /// Create the store together with its two writer handles
    ///
    /// Each handle can only update the channels its ingestion task owns, so
    /// no channel can ever have two writers.
    pub fn with_writers() -> (Arc<Self>, CanChannels, GpsChannels) {
        let store = Arc::new(Self {
            start: Instant::now(),
            cells: std::array::from_fn(|_| Mutex::new(Cell::default())),
        });

        let can = CanChannels { store: Arc::clone(&store) };
        let gps = GpsChannels { store: Arc::clone(&store) };

        (store, can, gps)
    }

    /// Milliseconds elapsed since the store was created
    pub fn uptime_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    fn set(&self, channel: SensorChannel, value: f64) {
        let updated_at_ms = self.uptime_ms();
        let mut cell = self.lock_cell(channel);
        *cell = Cell { value, updated_at_ms, written: true };
    }

    /// Latest sample of one channel, `None` if it was never written
    pub fn reading(&self, channel: SensorChannel) -> Option<ChannelSample> {
        let cell = *self.lock_cell(channel);
        cell.written.then_some(ChannelSample {
            value: cell.value,
            updated_at_ms: cell.updated_at_ms,
        })
    }

    /// Copy all channels into an immutable snapshot
    pub fn snapshot(&self) -> SensorSnapshot {
        let taken_at_ms = self.uptime_ms();
        let samples = std::array::from_fn(|i| {
            let cell = *self.lock_cell(SensorChannel::ALL[i]);
            cell.written.then_some(ChannelSample {
                value: cell.value,
                updated_at_ms: cell.updated_at_ms,
            })
        });

        SensorSnapshot { taken_at_ms, samples }
    }

    fn lock_cell(&self, channel: SensorChannel) -> std::sync::MutexGuard<'_, Cell> {
        // A poisoned cell still holds a fully written Cell copy
        self.cells[channel.index()]
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }
}

/// Writer handle owned by the CAN ingestion task
#[derive(Debug)]
pub struct CanChannels {
    store: Arc<SensorStore>,
}

impl CanChannels {
    pub fn update(&self, channel: CanChannel, value: f64) {
        self.store.set(channel.channel(), value);
    }
}

/// Writer handle owned by the GPS ingestion task
#[derive(Debug)]
pub struct GpsChannels {
    store: Arc<SensorStore>,
}

impl GpsChannels {
    pub fn update(&self, channel: GpsChannel, value: f64) {
        self.store.set(channel.channel(), value);
    }
}

/// Immutable copy of all channel values taken at one instant
#[derive(Debug, Clone, PartialEq)]
pub struct SensorSnapshot {
    taken_at_ms: u64,
    samples: [Option<ChannelSample>; CHANNEL_COUNT],
}

impl SensorSnapshot {
    /// Uptime milliseconds at which the snapshot was taken
    pub fn taken_at_ms(&self) -> u64 {
        self.taken_at_ms
    }

    /// Sample of one channel, `None` if the channel was never written
    pub fn get(&self, channel: SensorChannel) -> Option<ChannelSample> {
        self.samples[channel.index()]
    }

    /// Bitmap with one validity bit per channel, bit i = `SensorChannel::ALL[i]`
    pub fn validity_bitmap(&self) -> u16 {
        let mut bitmap = 0u16;
        for (i, sample) in self.samples.iter().enumerate() {
            if sample.is_some() {
                bitmap |= 1 << i;
            }
        }
        bitmap
    }

    /// Iterate channels in wire/record order
    pub fn iter(&self) -> impl Iterator<Item = (SensorChannel, Option<ChannelSample>)> + '_ {
        SensorChannel::ALL
            .iter()
            .map(move |&channel| (channel, self.samples[channel.index()]))
    }
}
