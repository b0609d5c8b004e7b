//! # FastStack Engine
//!
//! Deterministic, frame-accurate stacking-block game engine with
//! replay-compatible simulation.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     FASTSTACK ENGINE                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                  │
//! │  ├── fixed.rs    - Q16.16 fixed-point sub-cell positions     │
//! │  ├── rng.rs      - Bit-exact smallprng PRNG                  │
//! │  └── hash.rs     - State hashing for verification            │
//! │                                                              │
//! │  game/           - Game logic (deterministic)                 │
//! │  ├── piece.rs    - Piece kinds and block geometry             │
//! │  ├── rotation.rs - Rotation systems and wallkick tables       │
//! │  ├── randomizer.rs - Next-piece policies                      │
//! │  ├── field.rs    - Playfield grid and line clearing           │
//! │  ├── input.rs    - Virtual keys, DAS, input translation       │
//! │  ├── config.rs   - Configuration and validation               │
//! │  ├── events.rs   - Per-tick sound-effect bitmask              │
//! │  └── engine.rs   - The per-tick state machine                 │
//! │                                                              │
//! │  replay.rs       - Keystate-delta recording and playback     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism Guarantee
//!
//! The engine is **100% deterministic**:
//! - No floating-point arithmetic in game logic
//! - No wall-clock access; time is an integer tick counter
//! - All randomness from the seeded smallprng
//!
//! Given an identical configuration, seed and per-tick input stream,
//! the simulation produces **identical state hashes** at every tick on
//! any platform. Replays rely on this.
//!
//! Rendering, audio, persistence and real-time pacing are frontend
//! concerns: frontends read the engine's observable fields between
//! ticks and feed one [`Input`] per tick.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod replay;

// Re-export commonly used types
pub use crate::core::fixed::{Fixed, FIXED_ONE};
pub use crate::core::hash::StateHash;
pub use crate::core::rng::SmallPrng;
pub use game::{
    Config, ConfigError, Controls, Engine, GameState, Input, KeySet, Piece, RandomizerKind,
    RotationSystemKind, SfxSet, SoundEffect,
};
pub use replay::{Replay, ReplayError, ReplayRecorder};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
