//! # Transport Module
//!
//! Hand-off between the data sender and the network transmit task.
//!
//! This module handles:
//! - The fixed slot pool backing all outbound frames
//! - The transmit task draining the FIFO transport queue
//! - The transport collaborator seam (UDP in production, mocks in tests)
//!
//! The transmit task makes exactly one send attempt per slot and releases
//! the slot either way; a failed frame is never retried, the next sender
//! tick produces a fresh one.

pub mod pool;
pub mod udp;

use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{info, trace, warn};

use crate::stats::PipelineStats;

pub use pool::{Slot, SlotPool};
pub use udp::UdpTransport;

/// One-shot frame transmission towards the base station
#[async_trait]
pub trait Transport: Send {
    /// Attempt to send one serialized frame
    async fn send(&mut self, frame: &[u8]) -> io::Result<()>;
}

/// Network transmit task
///
/// Blocks on the transport queue, which is the only unbounded wait in the
/// system: an empty queue means there is nothing to do.
pub async fn run(
    mut queue: mpsc::Receiver<Slot>,
    mut transport: Box<dyn Transport>,
    stats: Arc<PipelineStats>,
) {
    info!("network transmit started");

    while let Some(slot) = queue.recv().await {
        match transport.send(slot.frame_bytes()).await {
            Ok(()) => {
                stats.record_frame_sent();
                trace!(bytes = slot.frame_bytes().len(), "frame sent");
            }
            Err(error) => {
                stats.record_send_failure();
                warn!(%error, "frame transmission failed");
            }
        }
        // The slot drops here, returning its buffer to the pool on success
        // and failure alike
    }

    info!("network transmit stopped");
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Mock transport for testing
    #[derive(Clone)]
    pub struct MockTransport {
        pub sent_frames: Arc<Mutex<Vec<Vec<u8>>>>,
        pub fail_sends: Arc<AtomicBool>,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self {
                sent_frames: Arc::new(Mutex::new(Vec::new())),
                fail_sends: Arc::new(AtomicBool::new(false)),
            }
        }

        pub fn sent_frames(&self) -> Vec<Vec<u8>> {
            self.sent_frames.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send(&mut self, frame: &[u8]) -> io::Result<()> {
            if self.fail_sends.load(Ordering::SeqCst) {
                return Err(io::Error::new(io::ErrorKind::Other, "mock send error"));
            }
            self.sent_frames.lock().unwrap().push(frame.to_vec());
            Ok(())
        }
    }
}
