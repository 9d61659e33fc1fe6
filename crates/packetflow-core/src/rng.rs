//! Deterministic PRNG for destination selection.
//!
//! Uses the SplitMix64 algorithm: fast, 8 bytes of state, and trivially
//! reproducible from a seed, so two runs with the same seed pick the same
//! destinations in the same order.

/// SplitMix64 pseudo-random number generator.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SimRng {
    state: u64,
}

impl SimRng {
    /// Create a new RNG with the given seed.
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Generate the next `u64` in the sequence.
    pub fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    /// Uniform integer in `0..bound`. Returns 0 when `bound` is 0.
    ///
    /// Uses Lemire's multiply-shift reduction; the bias for the small bounds
    /// used here (node counts) is negligible.
    pub fn below(&mut self, bound: usize) -> usize {
        if bound == 0 {
            return 0;
        }
        let r = self.next_u64() as u128;
        ((r * bound as u128) >> 64) as usize
    }

    /// Get the internal state.
    pub fn state(&self) -> u64 {
        self.state
    }
}
