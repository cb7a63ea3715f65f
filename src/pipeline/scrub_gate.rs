//! Backpressure gate for scrub operations.
//!
//! Regex scrubbing is the throughput bottleneck, so the number of
//! concurrently in-flight scrub operations is bounded here rather than
//! throttling the whole pipeline. Verification, validation, and
//! extraction of other traces proceed while permits are exhausted.

use parking_lot::{Condvar, Mutex};

/// Bounded permit gate. `acquire` blocks until a permit is free; the
/// permit is returned on drop.
#[derive(Debug)]
pub struct ScrubGate {
    available: Mutex<usize>,
    signal: Condvar,
}

impl ScrubGate {
    /// `max_in_flight` must be at least 1.
    pub fn new(max_in_flight: usize) -> Self {
        Self {
            available: Mutex::new(max_in_flight.max(1)),
            signal: Condvar::new(),
        }
    }

    pub fn acquire(&self) -> ScrubPermit<'_> {
        let mut available = self.available.lock();
        while *available == 0 {
            self.signal.wait(&mut available);
        }
        *available -= 1;
        ScrubPermit { gate: self }
    }

    pub fn permits_available(&self) -> usize {
        *self.available.lock()
    }

    fn release(&self) {
        let mut available = self.available.lock();
        *available += 1;
        self.signal.notify_one();
    }
}

/// RAII permit for one in-flight scrub.
#[derive(Debug)]
pub struct ScrubPermit<'a> {
    gate: &'a ScrubGate,
}

impl Drop for ScrubPermit<'_> {
    fn drop(&mut self) {
        self.gate.release();
    }
}
