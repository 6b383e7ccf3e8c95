//! # Transport Slot Pool
//!
//! Fixed-capacity pool of pre-allocated frame buffers.
//!
//! All outbound frames live in slots drawn from this pool, so transmission
//! can never allocate without bound while the transmit task is backlogged.
//! A slot's buffer returns to the free list when the slot is dropped, which
//! makes release exactly-once by construction: the producer releases by
//! dropping on any failure path, the transmit task releases after its one
//! send attempt.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::Result;
use crate::frame::protocol::TelemetryFrame;

#[derive(Debug)]
struct PoolShared {
    free: Mutex<Vec<Box<[u8]>>>,
    capacity: usize,
    slot_size: usize,
    exhaustion_count: AtomicU64,
}

impl PoolShared {
    fn lock_free(&self) -> std::sync::MutexGuard<'_, Vec<Box<[u8]>>> {
        // The free list is a plain Vec of buffers; a poisoned lock cannot
        // leave it half-updated
        self.free.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Fixed pool of transport slot buffers
#[derive(Debug, Clone)]
pub struct SlotPool {
    shared: Arc<PoolShared>,
}

impl SlotPool {
    /// Pre-allocate `capacity` buffers of `slot_size` bytes each
    pub fn new(capacity: usize, slot_size: usize) -> Self {
        let free = (0..capacity)
            .map(|_| vec![0u8; slot_size].into_boxed_slice())
            .collect();

        Self {
            shared: Arc::new(PoolShared {
                free: Mutex::new(free),
                capacity,
                slot_size,
                exhaustion_count: AtomicU64::new(0),
            }),
        }
    }

    /// Draw a slot from the pool
    ///
    /// Returns `None` when every buffer is outstanding. Exhaustion is a
    /// recoverable condition: the caller drops its frame and the event is
    /// counted, nothing blocks.
    pub fn try_acquire(&self) -> Option<Slot> {
        let buffer = self.shared.lock_free().pop();

        match buffer {
            Some(buffer) => Some(Slot {
                buffer: Some(buffer),
                len: 0,
                shared: Arc::clone(&self.shared),
            }),
            None => {
                self.shared.exhaustion_count.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Total number of slots in the pool
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Size of each slot buffer in bytes
    pub fn slot_size(&self) -> usize {
        self.shared.slot_size
    }

    /// Number of slots currently in the free list
    pub fn available(&self) -> usize {
        self.shared.lock_free().len()
    }

    /// How many times `try_acquire` found the pool empty
    pub fn exhaustion_count(&self) -> u64 {
        self.shared.exhaustion_count.load(Ordering::Relaxed)
    }
}

/// One pool buffer holding a serialized frame pending transmission
///
/// Ownership transfers producer -> queue -> transmit task; the buffer goes
/// back to the free list when the slot is dropped.
#[derive(Debug)]
pub struct Slot {
    buffer: Option<Box<[u8]>>,
    len: usize,
    shared: Arc<PoolShared>,
}

impl Slot {
    /// Serialize `frame` into this slot
    ///
    /// # Errors
    ///
    /// Returns error if the frame does not fit the slot buffer
    pub fn write_frame(&mut self, frame: &TelemetryFrame) -> Result<()> {
        match self.buffer.as_deref_mut() {
            Some(buffer) => {
                self.len = frame.encode_into(buffer)?;
                Ok(())
            }
            // Unreachable outside Drop; kept as an error rather than a panic
            None => Err(crate::error::TelemetryError::Frame(
                "slot buffer already released".to_string(),
            )),
        }
    }

    /// The serialized frame bytes written so far
    pub fn frame_bytes(&self) -> &[u8] {
        match self.buffer.as_deref() {
            Some(buffer) => &buffer[..self.len],
            None => &[],
        }
    }
}

impl Drop for Slot {
    fn drop(&mut self) {
        if let Some(buffer) = self.buffer.take() {
            self.shared.lock_free().push(buffer);
        }
    }
}
