//! Game Logic Module
//!
//! All game simulation code. 100% deterministic.
//!
//! ## Module Structure
//!
//! - `piece`: Piece kinds and static block geometry
//! - `rotation`: Rotation systems and wallkick tables
//! - `randomizer`: Next-piece policies
//! - `field`: Playfield grid, occupancy, line clearing
//! - `input`: Virtual keys, DAS charging, per-tick input translation
//! - `config`: Engine configuration and validation
//! - `events`: Per-tick sound-effect bitmask
//! - `engine`: The per-tick state machine

pub mod config;
pub mod engine;
pub mod events;
pub mod field;
pub mod input;
pub mod piece;
pub mod randomizer;
pub mod rotation;

// Re-export key types
pub use config::{Config, ConfigError, InitialActionStyle, LockStyle};
pub use engine::{Engine, GameState};
pub use events::{SfxSet, SoundEffect};
pub use field::Field;
pub use input::{Controls, Input, InputFlags, KeySet};
pub use piece::Piece;
pub use randomizer::{Randomizer, RandomizerKind};
pub use rotation::RotationSystemKind;
