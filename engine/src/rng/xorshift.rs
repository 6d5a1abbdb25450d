//! xorshift64* random number generator
//!
//! Fast PRNG used to shuffle the elimination order. Quality does not need to
//! be cryptographic, but the seed must be unpredictable to external observers
//! between rounds: without a configured seed, one is derived by hashing a
//! caller-supplied salt together with wall-clock nanoseconds.
//!
//! With a fixed seed the generator is fully deterministic, which is what the
//! lifecycle tests rely on.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};

/// Shuffle RNG with 64-bit state.
///
/// # Example
/// ```
/// use spinwheel_engine::WheelRng;
///
/// let mut rng = WheelRng::new(12345);
/// let mut items = vec![1, 2, 3, 4, 5];
/// rng.shuffle(&mut items);
/// assert_eq!(items.len(), 5);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WheelRng {
    state: u64,
}

impl WheelRng {
    /// Create an RNG from a fixed seed.
    pub fn new(seed: u64) -> Self {
        // xorshift requires non-zero state
        let state = if seed == 0 { 1 } else { seed };
        Self { state }
    }

    /// Create an RNG seeded from wall-clock entropy mixed with `salt`.
    pub fn from_entropy(salt: &[u8]) -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);

        let mut hasher = Sha256::new();
        hasher.update(salt);
        hasher.update(nanos.to_le_bytes());
        let digest = hasher.finalize();

        let mut seed_bytes = [0u8; 8];
        seed_bytes.copy_from_slice(&digest[..8]);
        Self::new(u64::from_le_bytes(seed_bytes))
    }

    /// Generate the next random u64, advancing the state.
    pub fn next_u64(&mut self) -> u64 {
        // xorshift64* algorithm
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545F4914F6CDD1D)
    }

    /// Random index in `[0, bound)`.
    ///
    /// # Panics
    /// Panics if `bound` is zero.
    pub fn gen_index(&mut self, bound: usize) -> usize {
        assert!(bound > 0, "bound must be positive");
        (self.next_u64() % bound as u64) as usize
    }

    /// Uniform Fisher-Yates shuffle in place.
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.gen_index(i + 1);
            items.swap(i, j);
        }
    }

    /// Current state, for diagnostics.
    pub fn state(&self) -> u64 {
        self.state
    }
}
