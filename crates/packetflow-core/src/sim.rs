//! Simulation state and per-tick report types.

use crate::fixed::{Fixed64, Ticks};

// ---------------------------------------------------------------------------
// Simulation state
// ---------------------------------------------------------------------------

/// Mutable simulation state tracked by the engine.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct SimState {
    /// Number of completed ticks.
    pub tick: Ticks,
}

impl SimState {
    /// Create a new simulation state starting at tick 0.
    pub fn new() -> Self {
        Self::default()
    }
}

// ---------------------------------------------------------------------------
// Tick report
// ---------------------------------------------------------------------------

/// Summary of one [`Simulation::step`](crate::engine::Simulation::step).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Tick number this report belongs to (1 for the first step).
    /// Zero when the step did not run (paused).
    pub tick: Ticks,
    /// Sum of all rates added to queues during generation.
    pub generated: Fixed64,
    /// Sum removed from source queues during allocation.
    pub drained: Fixed64,
    /// Sum pushed across the final hop of every route.
    pub delivered: Fixed64,
    /// Sources that found a route and ran allocation.
    pub routed: u32,
    /// Sources whose chosen destination was unreachable.
    pub unreachable: u32,
    /// Sources for which the destination policy chose nothing.
    pub skipped: u32,
    /// Total backlog across all nodes after allocation.
    pub backlog: Fixed64,
}

impl TickReport {
    /// Whether the step actually ran.
    pub fn ran(&self) -> bool {
        self.tick > 0
    }
}

// ---------------------------------------------------------------------------
// State hash
// ---------------------------------------------------------------------------

/// A simple deterministic hash of simulation state for reproducibility checks.
///
/// Uses FNV-1a (64-bit) for speed and simplicity. Not cryptographic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateHash(pub u64);

impl StateHash {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;

    /// Start a new hash.
    pub fn new() -> Self {
        Self(Self::FNV_OFFSET)
    }

    /// Feed bytes into the hash.
    pub fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 ^= b as u64;
            self.0 = self.0.wrapping_mul(Self::FNV_PRIME);
        }
    }

    /// Feed a u64 into the hash.
    pub fn write_u64(&mut self, v: u64) {
        self.write(&v.to_le_bytes());
    }

    /// Feed a Fixed64 into the hash.
    pub fn write_fixed64(&mut self, v: Fixed64) {
        self.write(&v.to_bits().to_le_bytes());
    }

    /// Finalize and return the hash value.
    pub fn finish(self) -> u64 {
        self.0
    }
}

impl Default for StateHash {
    fn default() -> Self {
        Self::new()
    }
}
