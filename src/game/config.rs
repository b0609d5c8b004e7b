//! Engine Configuration
//!
//! Every tunable the engine honors, set before [`crate::Engine::new`]
//! and never mutated by the core mid-game. The full set is persisted in
//! a replay overview so a recorded game can be rebuilt exactly.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::fixed::{to_fixed, Fixed};
use crate::game::field::{MAX_HEIGHT, MAX_WIDTH};
use crate::game::randomizer::RandomizerKind;
use crate::game::rotation::RotationSystemKind;

/// Maximum number of preview pieces.
pub const PREVIEW_MAX: usize = 10;

/// When the lock timer is reset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum LockStyle {
    /// Only on entry of a new piece.
    Entry = 0,
    /// On any downward step.
    Step = 1,
    /// On any successful movement or rotation.
    #[default]
    Move = 2,
}

/// How initial rotation/hold (IRS/IHS) is latched during entry delay.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum InitialActionStyle {
    /// Disabled.
    #[default]
    None = 0,
    /// The keystate on the final entry-delay tick is applied at spawn.
    Persistent = 1,
    /// Only a fresh press during entry delay is applied at spawn.
    Trigger = 2,
}

/// Complete engine configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Field width in cells (4 to [`MAX_WIDTH`]).
    pub field_width: u8,

    /// Field height in cells (4 to [`MAX_HEIGHT`]).
    pub field_height: u8,

    /// Milliseconds of game time per logic tick.
    pub ms_per_tick: u32,

    /// Game ticks per draw request (frontend pacing hint; the core
    /// only stores it so replays capture the original pacing).
    pub ticks_per_draw: u32,

    /// Entry delay between lock and next spawn, in ms.
    pub are_delay_ms: u32,

    /// Whether any input during entry delay ends it early.
    pub are_cancellable: bool,

    /// Lock timer reset style.
    pub lock_style: LockStyle,

    /// Time a landed piece may rest before locking, in ms.
    pub lock_delay_ms: u32,

    /// Maximum upward kicks per piece; 0 disables the limit.
    pub floorkick_limit: u32,

    /// Whether soft drop applies once per press instead of while held.
    pub one_shot_soft_drop: bool,

    /// Rotation system in play.
    pub rotation_system: RotationSystemKind,

    /// Gravity in cells per millisecond (fixed-point).
    pub gravity: Fixed,

    /// Soft-drop gravity in cells per millisecond (fixed-point).
    pub soft_drop_gravity: Fixed,

    /// Piece randomizer policy.
    pub randomizer: RandomizerKind,

    /// Length of the "READY" phase, in ms.
    pub ready_phase_length_ms: u32,

    /// Length of the "GO" phase, in ms.
    pub go_phase_length_ms: u32,

    /// Whether hold may be used repeatedly during READY/GO.
    pub infinite_ready_go_hold: bool,

    /// Number of visible preview pieces (up to [`PREVIEW_MAX`]).
    pub next_piece_count: u8,

    /// IRS/IHS latching style.
    pub initial_action_style: InitialActionStyle,

    /// Lines to clear to finish the game.
    pub goal: u32,

    /// PRNG seed. `None` means the caller supplies entropy at reset
    /// time; replays always record the seed actually used.
    pub seed: Option<u32>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            field_width: 10,
            field_height: 20,
            ms_per_tick: 16,
            ticks_per_draw: 1,
            are_delay_ms: 0,
            are_cancellable: false,
            lock_style: LockStyle::Move,
            lock_delay_ms: 150,
            floorkick_limit: 0,
            one_shot_soft_drop: false,
            rotation_system: RotationSystemKind::Srs,
            gravity: to_fixed(0.000625),
            soft_drop_gravity: to_fixed(0.0625),
            randomizer: RandomizerKind::NoSzoBag7,
            ready_phase_length_ms: 833,
            go_phase_length_ms: 833,
            infinite_ready_go_hold: false,
            next_piece_count: 4,
            initial_action_style: InitialActionStyle::None,
            goal: 40,
            seed: None,
        }
    }
}

impl Config {
    /// Convert a millisecond duration to whole ticks (floor).
    #[inline]
    pub fn ticks(&self, ms: u32) -> u32 {
        ms / self.ms_per_tick
    }

    /// Check the configuration for values the engine cannot run with.
    ///
    /// A misconfigured engine refuses to start; nothing is clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(4..=MAX_WIDTH as u8).contains(&self.field_width)
            || !(4..=MAX_HEIGHT as u8).contains(&self.field_height)
        {
            return Err(ConfigError::FieldSize {
                width: self.field_width,
                height: self.field_height,
            });
        }
        if self.ms_per_tick == 0 {
            return Err(ConfigError::ZeroTickLength);
        }
        if self.next_piece_count as usize > PREVIEW_MAX {
            return Err(ConfigError::PreviewTooLong(self.next_piece_count));
        }
        if self.goal == 0 {
            return Err(ConfigError::ZeroGoal);
        }
        if self.gravity < 0 || self.soft_drop_gravity < 0 {
            return Err(ConfigError::NegativeGravity);
        }
        Ok(())
    }
}

/// Configuration rejected at engine construction.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("field size {width}x{height} out of range")]
    FieldSize { width: u8, height: u8 },

    #[error("ms_per_tick must be nonzero")]
    ZeroTickLength,

    #[error("preview length {0} exceeds maximum {PREVIEW_MAX}")]
    PreviewTooLong(u8),

    #[error("goal must be at least one line")]
    ZeroGoal,

    #[error("gravity rates must be non-negative")]
    NegativeGravity,
}
