//! # Pipeline Counters
//!
//! Shared atomic counters for drops, sends and recoveries.
//!
//! Every recoverable condition in the pipeline is absorbed where it happens
//! and surfaced only here and in the log stream, so the counters are the
//! observable record of degraded operation.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared by the pipeline tasks
#[derive(Debug, Default)]
pub struct PipelineStats {
    frames_enqueued: AtomicU64,
    frames_sent: AtomicU64,
    send_failures: AtomicU64,
    offline_skips: AtomicU64,
    pool_exhausted_drops: AtomicU64,
    queue_full_drops: AtomicU64,
    can_frames_rejected: AtomicU64,
    gps_fixes_rejected: AtomicU64,
    records_written: AtomicU64,
    records_dropped: AtomicU64,
}

impl PipelineStats {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_frame_enqueued(&self) {
        self.frames_enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_frame_sent(&self) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_send_failure(&self) {
        self.send_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_offline_skip(&self) {
        self.offline_skips.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_pool_exhausted(&self) {
        self.pool_exhausted_drops.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_queue_full(&self) {
        self.queue_full_drops.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_can_frame_rejected(&self) {
        self.can_frames_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_gps_fix_rejected(&self) {
        self.gps_fixes_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_record_written(&self) {
        self.records_written.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_record_dropped(&self) {
        self.records_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frames_enqueued(&self) -> u64 {
        self.frames_enqueued.load(Ordering::Relaxed)
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent.load(Ordering::Relaxed)
    }

    pub fn send_failures(&self) -> u64 {
        self.send_failures.load(Ordering::Relaxed)
    }

    pub fn offline_skips(&self) -> u64 {
        self.offline_skips.load(Ordering::Relaxed)
    }

    pub fn pool_exhausted_drops(&self) -> u64 {
        self.pool_exhausted_drops.load(Ordering::Relaxed)
    }

    pub fn queue_full_drops(&self) -> u64 {
        self.queue_full_drops.load(Ordering::Relaxed)
    }

    pub fn can_frames_rejected(&self) -> u64 {
        self.can_frames_rejected.load(Ordering::Relaxed)
    }

    pub fn gps_fixes_rejected(&self) -> u64 {
        self.gps_fixes_rejected.load(Ordering::Relaxed)
    }

    pub fn records_written(&self) -> u64 {
        self.records_written.load(Ordering::Relaxed)
    }

    pub fn records_dropped(&self) -> u64 {
        self.records_dropped.load(Ordering::Relaxed)
    }
}
