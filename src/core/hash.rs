//! State Hashing for Verification
//!
//! Deterministic hashing of engine state, used to confirm that two runs
//! of the same seed and input stream stayed byte-identical. Replay
//! playback compares hashes per tick; the determinism tests do the
//! same.

use sha2::{Digest, Sha256};

use super::fixed::Fixed;

/// Hash output type (256 bits / 32 bytes)
pub type StateHash = [u8; 32];

/// Deterministic hasher for engine state.
///
/// Wraps SHA-256 with helpers for the engine's field types. The order
/// of updates is part of the hash definition.
pub struct StateHasher {
    hasher: Sha256,
}

impl StateHasher {
    /// Create a new hasher with a domain separator.
    pub fn new(domain: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(domain);
        Self { hasher }
    }

    /// Create the hasher used for full engine snapshots.
    pub fn for_engine_state() -> Self {
        Self::new(b"FASTSTACK_STATE_V1")
    }

    /// Update with raw bytes.
    #[inline]
    pub fn update_bytes(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }

    /// Update with a u8 value.
    #[inline]
    pub fn update_u8(&mut self, value: u8) {
        self.hasher.update([value]);
    }

    /// Update with a u32 value (little-endian).
    #[inline]
    pub fn update_u32(&mut self, value: u32) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with a u64 value (little-endian).
    #[inline]
    pub fn update_u64(&mut self, value: u64) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with an i32 value (little-endian).
    #[inline]
    pub fn update_i32(&mut self, value: i32) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with a Fixed value.
    #[inline]
    pub fn update_fixed(&mut self, value: Fixed) {
        self.update_i32(value);
    }

    /// Update with a boolean.
    #[inline]
    pub fn update_bool(&mut self, value: bool) {
        self.update_u8(value as u8);
    }

    /// Finalize and return the hash.
    pub fn finalize(self) -> StateHash {
        self.hasher.finalize().into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_updates_same_hash() {
        let mut h1 = StateHasher::for_engine_state();
        let mut h2 = StateHasher::for_engine_state();

        for h in [&mut h1, &mut h2] {
            h.update_u32(42);
            h.update_i32(-7);
            h.update_bool(true);
        }

        assert_eq!(h1.finalize(), h2.finalize());
    }

    #[test]
    fn test_domain_separation() {
        let mut h1 = StateHasher::new(b"A");
        let mut h2 = StateHasher::new(b"B");
        h1.update_u32(1);
        h2.update_u32(1);

        assert_ne!(h1.finalize(), h2.finalize());
    }

    #[test]
    fn test_update_order_matters() {
        let mut h1 = StateHasher::for_engine_state();
        let mut h2 = StateHasher::for_engine_state();
        h1.update_u8(1);
        h1.update_u8(2);
        h2.update_u8(2);
        h2.update_u8(1);

        assert_ne!(h1.finalize(), h2.finalize());
    }
}
