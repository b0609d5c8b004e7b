//! Core deterministic primitives.
//!
//! Everything in this module is bit-exact across platforms. The engine
//! and its replays are built on these guarantees.

pub mod fixed;
pub mod hash;
pub mod rng;

// Re-export core types
pub use fixed::{Fixed, FIXED_ONE, FIXED_SCALE};
pub use hash::{StateHash, StateHasher};
pub use rng::SmallPrng;
