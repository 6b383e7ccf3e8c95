//! # GPS Ingestion
//!
//! Consumes parsed fixes from the GPS driver and fills the sensor store.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, trace};

use crate::stats::PipelineStats;
use crate::store::{GpsChannel, GpsChannels};

/// One parsed position/time/speed report from the GPS receiver
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpsFix {
    /// Latitude in degrees, positive north
    pub latitude: f64,
    /// Longitude in degrees, positive east
    pub longitude: f64,
    /// Whether the receiver currently has a position fix
    pub fix: bool,
    /// UTC time of day in seconds
    pub time_of_day: f64,
    /// Ground speed in km/h
    pub speed: f64,
}

/// Range-check a fix before applying it
fn is_plausible(fix: &GpsFix) -> bool {
    fix.latitude.is_finite()
        && fix.longitude.is_finite()
        && fix.time_of_day.is_finite()
        && fix.speed.is_finite()
        && (-90.0..=90.0).contains(&fix.latitude)
        && (-180.0..=180.0).contains(&fix.longitude)
        && (0.0..86400.0).contains(&fix.time_of_day)
        && fix.speed >= 0.0
}

/// GPS ingestion task
///
/// Fix state and time of day always update. Position and speed only update
/// while the receiver reports a fix, so those channels hold their last good
/// values through signal loss instead of jumping to receiver garbage.
pub async fn run(
    mut fixes: mpsc::Receiver<GpsFix>,
    channels: GpsChannels,
    stats: Arc<PipelineStats>,
) {
    info!("GPS ingestion started");

    while let Some(fix) = fixes.recv().await {
        if !is_plausible(&fix) {
            stats.record_gps_fix_rejected();
            debug!(?fix, "discarding implausible GPS fix");
            continue;
        }

        channels.update(GpsChannel::Fix, if fix.fix { 1.0 } else { 0.0 });
        channels.update(GpsChannel::Time, fix.time_of_day);

        if fix.fix {
            channels.update(GpsChannel::Latitude, fix.latitude);
            channels.update(GpsChannel::Longitude, fix.longitude);
            channels.update(GpsChannel::Speed, fix.speed);

            trace!(
                latitude = fix.latitude,
                longitude = fix.longitude,
                speed = fix.speed,
                "GPS fix applied"
            );
        }
    }

    info!("GPS ingestion stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{SensorChannel, SensorStore};

    fn fix_at(latitude: f64, longitude: f64) -> GpsFix {
        GpsFix {
            latitude,
            longitude,
            fix: true,
            time_of_day: 45296.0,
            speed: 63.5,
        }
    }

    #[test]
    fn test_plausibility_ranges() {
        assert!(is_plausible(&fix_at(46.2331, 7.3606)));
        assert!(!is_plausible(&fix_at(91.0, 7.3606)));
        assert!(!is_plausible(&fix_at(46.2331, -181.0)));
        assert!(!is_plausible(&GpsFix { speed: -1.0, ..fix_at(46.2331, 7.3606) }));
        assert!(!is_plausible(&GpsFix { time_of_day: 90000.0, ..fix_at(46.2331, 7.3606) }));
        assert!(!is_plausible(&GpsFix { latitude: f64::NAN, ..fix_at(0.0, 0.0) }));
    }

    #[tokio::test]
    async fn test_fix_updates_all_gps_channels() {
        let (store, _can, gps) = SensorStore::with_writers();
        let stats = PipelineStats::new();
        let (tx, rx) = mpsc::channel(8);

        let task = tokio::spawn(run(rx, gps, Arc::clone(&stats)));

        tx.send(fix_at(46.2331, 7.3606)).await.unwrap();
        drop(tx);
        task.await.unwrap();

        assert_eq!(store.reading(SensorChannel::GpsFix).unwrap().value, 1.0);
        assert_eq!(store.reading(SensorChannel::GpsLatitude).unwrap().value, 46.2331);
        assert_eq!(store.reading(SensorChannel::GpsLongitude).unwrap().value, 7.3606);
        assert_eq!(store.reading(SensorChannel::GpsTime).unwrap().value, 45296.0);
        assert_eq!(store.reading(SensorChannel::GpsSpeed).unwrap().value, 63.5);
    }

    #[tokio::test]
    async fn test_position_freezes_without_fix() {
        let (store, _can, gps) = SensorStore::with_writers();
        let stats = PipelineStats::new();
        let (tx, rx) = mpsc::channel(8);

        let task = tokio::spawn(run(rx, gps, Arc::clone(&stats)));

        tx.send(fix_at(46.2331, 7.3606)).await.unwrap();
        tx.send(GpsFix {
            latitude: 0.0,
            longitude: 0.0,
            fix: false,
            time_of_day: 45300.0,
            speed: 0.0,
        })
        .await
        .unwrap();
        drop(tx);
        task.await.unwrap();

        // Fix state and time track the receiver, position holds the last fix
        assert_eq!(store.reading(SensorChannel::GpsFix).unwrap().value, 0.0);
        assert_eq!(store.reading(SensorChannel::GpsTime).unwrap().value, 45300.0);
        assert_eq!(store.reading(SensorChannel::GpsLatitude).unwrap().value, 46.2331);
        assert_eq!(store.reading(SensorChannel::GpsSpeed).unwrap().value, 63.5);
    }

    #[tokio::test]
    async fn test_implausible_fix_is_discarded_entirely() {
        let (store, _can, gps) = SensorStore::with_writers();
        let stats = PipelineStats::new();
        let (tx, rx) = mpsc::channel(8);

        let task = tokio::spawn(run(rx, gps, Arc::clone(&stats)));

        tx.send(fix_at(46.2331, 7.3606)).await.unwrap();
        tx.send(fix_at(120.0, 7.3606)).await.unwrap();
        drop(tx);
        task.await.unwrap();

        assert_eq!(store.reading(SensorChannel::GpsLatitude).unwrap().value, 46.2331);
        assert_eq!(stats.gps_fixes_rejected(), 1);
    }
}
