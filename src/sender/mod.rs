//! # Data Sender
//!
//! Tick-driven serialization of sensor snapshots into the transport queue.
//!
//! This module handles:
//! - The periodic telemetry cycle (snapshot, serialize, enqueue)
//! - Gating on the connectivity manager's link state
//! - Drop accounting when the pool is exhausted or the queue is full
//!
//! The sender never blocks: while the link is down it does no work at all,
//! and when the transmit side is backlogged it drops the current frame
//! rather than disturb its own schedule.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, trace};

use crate::frame::encoder::encode_sensor_frame;
use crate::link::LinkHandle;
use crate::stats::PipelineStats;
use crate::store::SensorStore;
use crate::transport::{Slot, SlotPool};

/// The task producing telemetry frames on a fixed schedule
pub struct DataSender {
    store: Arc<SensorStore>,
    link: LinkHandle,
    pool: SlotPool,
    queue: mpsc::Sender<Slot>,
    stats: Arc<PipelineStats>,
    sequence: u16,
}

impl DataSender {
    pub fn new(
        store: Arc<SensorStore>,
        link: LinkHandle,
        pool: SlotPool,
        queue: mpsc::Sender<Slot>,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self {
            store,
            link,
            pool,
            queue,
            stats,
            sequence: 0,
        }
    }

    /// Run the periodic telemetry schedule until the transmit side goes away
    pub async fn run(mut self, period: Duration) {
        info!(period_ms = period.as_millis() as u64, "data sender started");

        let mut ticker = interval(period);
        // A late tick must not cause a burst of catch-up frames
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            if self.queue.is_closed() {
                break;
            }
            self.cycle();
        }

        info!("data sender stopped");
    }

    /// One telemetry cycle
    ///
    /// While the link is unusable this does no work at all: no snapshot and
    /// no slot allocation, only a counted skip.
    pub fn cycle(&mut self) {
        if !self.link.is_usable() {
            self.stats.record_offline_skip();
            trace!("link down, skipping telemetry cycle");
            return;
        }

        let snapshot = self.store.snapshot();
        let frame = encode_sensor_frame(self.sequence, &snapshot);

        let Some(mut slot) = self.pool.try_acquire() else {
            // Transmit task is backlogged; drop this frame, keep the schedule
            self.stats.record_pool_exhausted();
            debug!(sequence = self.sequence, "slot pool exhausted, dropping frame");
            return;
        };

        if let Err(error) = slot.write_frame(&frame) {
            // Config validation keeps slot_size at least one frame, so this
            // only fires on a misbuilt pool
            debug!(%error, "frame dropped, does not fit slot");
            return;
        }

        match self.queue.try_send(slot) {
            Ok(()) => {
                self.stats.record_frame_enqueued();
                trace!(sequence = self.sequence, "frame enqueued");
                self.sequence = self.sequence.wrapping_add(1);
            }
            Err(mpsc::error::TrySendError::Full(slot)) => {
                drop(slot);
                self.stats.record_queue_full();
                debug!(sequence = self.sequence, "transport queue full, dropping frame");
            }
            Err(mpsc::error::TrySendError::Closed(slot)) => {
                drop(slot);
                debug!("transport queue closed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::driver::mocks::MockWifiDriver;
    use crate::link::{ConnectivityManager, LinkConfig, LinkState};
    use crate::link::AccessPoint;

    fn idle_link_handle() -> LinkHandle {
        // A manager that is never run: the published state stays whatever
        // the test forces it to
        let (event_tx, event_rx) = mpsc::channel(1);
        let mock = MockWifiDriver::new(&event_tx);
        let config = LinkConfig {
            primary: AccessPoint::new("ap", ""),
            redundant: None,
            status_poll: Duration::from_millis(300),
            connect_timeout: Duration::from_millis(900),
            retry_delay: Duration::from_millis(1000),
        };
        let (_manager, handle) = ConnectivityManager::new(Box::new(mock), event_rx, config);
        handle
    }

    fn sender_under_test(
        pool_slots: usize,
        queue_depth: usize,
    ) -> (DataSender, LinkHandle, SlotPool, mpsc::Receiver<Slot>, Arc<PipelineStats>) {
        let (store, _can, _gps) = SensorStore::with_writers();
        let link = idle_link_handle();
        let pool = SlotPool::new(pool_slots, 256);
        let stats = PipelineStats::new();
        let (queue_tx, queue_rx) = mpsc::channel(queue_depth);

        let sender = DataSender::new(
            store,
            link.clone(),
            pool.clone(),
            queue_tx,
            Arc::clone(&stats),
        );

        (sender, link, pool, queue_rx, stats)
    }

    #[test]
    fn test_offline_cycles_allocate_nothing() {
        let (mut sender, link, pool, mut queue, stats) = sender_under_test(8, 8);
        link.force_state(LinkState::Disconnected);

        for _ in 0..50 {
            sender.cycle();
        }

        assert_eq!(pool.available(), pool.capacity());
        assert_eq!(pool.exhaustion_count(), 0);
        assert_eq!(stats.offline_skips(), 50);
        assert_eq!(stats.frames_enqueued(), 0);
        assert!(queue.try_recv().is_err());
    }

    #[test]
    fn test_online_cycle_enqueues_one_frame() {
        let (mut sender, link, pool, mut queue, stats) = sender_under_test(8, 8);
        link.force_state(LinkState::Connected);

        sender.cycle();

        let slot = queue.try_recv().unwrap();
        assert_eq!(pool.available(), pool.capacity() - 1);
        assert_eq!(stats.frames_enqueued(), 1);

        // First frame carries sequence number zero
        let bytes = slot.frame_bytes();
        assert_eq!(u16::from_be_bytes([bytes[3], bytes[4]]), 0);
    }

    #[test]
    fn test_sequence_increments_per_enqueued_frame() {
        let (mut sender, link, _pool, mut queue, _stats) = sender_under_test(8, 8);
        link.force_state(LinkState::Connected);

        for _ in 0..3 {
            sender.cycle();
        }

        for expected in 0u16..3 {
            let slot = queue.try_recv().unwrap();
            let bytes = slot.frame_bytes();
            assert_eq!(u16::from_be_bytes([bytes[3], bytes[4]]), expected);
        }
    }

    #[test]
    fn test_pool_exhaustion_drops_frame_without_blocking() {
        let (mut sender, link, pool, mut queue, stats) = sender_under_test(1, 8);
        link.force_state(LinkState::Connected);

        sender.cycle();
        sender.cycle();

        assert_eq!(stats.frames_enqueued(), 1);
        assert_eq!(stats.pool_exhausted_drops(), 1);
        assert_eq!(pool.exhaustion_count(), 1);

        // Exactly one frame made it through
        assert!(queue.try_recv().is_ok());
        assert!(queue.try_recv().is_err());
    }

    #[test]
    fn test_queue_full_drops_frame_and_releases_slot() {
        let (mut sender, link, pool, mut queue, stats) = sender_under_test(4, 1);
        link.force_state(LinkState::Connected);

        sender.cycle();
        sender.cycle();

        assert_eq!(stats.frames_enqueued(), 1);
        assert_eq!(stats.queue_full_drops(), 1);
        // The dropped frame's slot went straight back to the pool
        assert_eq!(pool.available(), pool.capacity() - 1);

        let first = queue.try_recv().unwrap();
        let bytes = first.frame_bytes();
        assert_eq!(u16::from_be_bytes([bytes[3], bytes[4]]), 0);
    }

    #[test]
    fn test_recovery_after_link_returns() {
        let (mut sender, link, _pool, mut queue, stats) = sender_under_test(8, 8);

        link.force_state(LinkState::Disconnected);
        sender.cycle();
        link.force_state(LinkState::Connected);
        sender.cycle();

        assert_eq!(stats.offline_skips(), 1);
        assert_eq!(stats.frames_enqueued(), 1);
        assert!(queue.try_recv().is_ok());
    }
}
