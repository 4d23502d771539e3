//! Host time source for the mcycle CSR and throughput reporting.

use std::time::Instant;

/// A monotonic 64-bit counter read. Only the mcycle/mcycleh CSR readback
/// and the embedding runner's throughput report consume it; correctness of
/// execution never depends on the values.
pub trait Clock {
    fn now(&self) -> u64;
}

/// Nanoseconds since the clock was created, from the host monotonic timer.
pub struct MonotonicClock {
    anchor: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            anchor: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> u64 {
        self.anchor.elapsed().as_nanos() as u64
    }
}

/// A clock pinned to one value, for deterministic tests.
pub struct FixedClock(pub u64);

impl Clock for FixedClock {
    fn now(&self) -> u64 {
        self.0
    }
}
