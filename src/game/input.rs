//! Input Capture and Translation
//!
//! Frontends read physical devices and hand the engine one [`KeySet`]
//! per tick; the translator turns the raw keystate into the per-tick
//! [`Input`] actions the state machine consumes. All timing-sensitive
//! behavior (DAS charging, one-shot soft drop, new-press detection)
//! lives here, in integer ticks, so the same keystate stream always
//! produces the same action stream.

use serde::{Deserialize, Serialize};

use crate::core::fixed::Fixed;
use crate::game::config::Config;

/// Bitmask of virtual keys held during one tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySet(u16);

impl KeySet {
    pub const UP: KeySet = KeySet(0x0001);
    pub const DOWN: KeySet = KeySet(0x0002);
    pub const LEFT: KeySet = KeySet(0x0004);
    pub const RIGHT: KeySet = KeySet(0x0008);
    pub const ROTL: KeySet = KeySet(0x0010);
    pub const ROTR: KeySet = KeySet(0x0020);
    pub const ROTH: KeySet = KeySet(0x0040);
    pub const HOLD: KeySet = KeySet(0x0080);
    pub const START: KeySet = KeySet(0x0100);
    pub const RESTART: KeySet = KeySet(0x0200);
    pub const QUIT: KeySet = KeySet(0x0400);

    /// The empty keystate.
    pub const NONE: KeySet = KeySet(0);

    /// Whether all of `keys` are held.
    #[inline]
    pub fn contains(self, keys: KeySet) -> bool {
        self.0 & keys.0 == keys.0
    }

    /// Union of two keystates.
    #[inline]
    pub const fn with(self, keys: KeySet) -> KeySet {
        KeySet(self.0 | keys.0)
    }

    /// Keys held now that were not held in `previous`.
    #[inline]
    pub fn pressed_since(self, previous: KeySet) -> KeySet {
        KeySet(self.0 & !previous.0)
    }

    /// Whether no key is held.
    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Number of keys held.
    #[inline]
    pub fn count(self) -> u32 {
        self.0.count_ones()
    }

    /// Raw bits, for replay storage.
    #[inline]
    pub fn bits(self) -> u16 {
        self.0
    }

    /// Rebuild from replay storage.
    #[inline]
    pub const fn from_bits(bits: u16) -> KeySet {
        KeySet(bits)
    }
}

/// Extra per-tick action flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputFlags(u8);

impl InputFlags {
    pub const HARD_DROP: InputFlags = InputFlags(0x01);
    pub const HOLD: InputFlags = InputFlags(0x02);
    pub const LOCK: InputFlags = InputFlags(0x04);
    pub const FINESSE_DIRECTION: InputFlags = InputFlags(0x08);
    pub const FINESSE_ROTATION: InputFlags = InputFlags(0x10);

    /// Whether all of `flags` are set.
    #[inline]
    pub fn contains(self, flags: InputFlags) -> bool {
        self.0 & flags.0 == flags.0
    }

    /// Set `flags`.
    #[inline]
    pub fn insert(&mut self, flags: InputFlags) {
        self.0 |= flags.0;
    }

    /// Whether no flag is set.
    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// The actions the engine performs during one tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Input {
    /// Rotation: -1 anticlockwise, +1 clockwise, +2 half turn, 0 none.
    pub rotation: i8,

    /// Net horizontal movement in cells. The engine applies it one
    /// cell at a time and stops at the first collision, so a large
    /// value means "as far as possible".
    pub movement: i8,

    /// Extra downward motion this tick (soft drop), in fixed-point
    /// cells. Added on top of the configured gravity.
    pub gravity: Fixed,

    /// Hard drop / hold / finesse flags.
    pub extra: InputFlags,

    /// The raw keystate this input was derived from. The engine
    /// inspects it for initial rotation/hold during entry delay.
    pub keys: KeySet,
}

impl Input {
    /// Whether this input requests nothing at all.
    pub fn is_idle(&self) -> bool {
        self.rotation == 0 && self.movement == 0 && self.gravity == 0 && self.extra.is_empty()
    }
}

/// DAS state and translation parameters.
///
/// Owned by the caller alongside the engine and fed the keystate each
/// tick. Reset it whenever the engine is reset.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Controls {
    /// Milliseconds a direction must be held before auto-shift.
    pub das_delay_ms: u32,

    /// Auto-shift speed in cells per tick once charged; 0 means
    /// "instant" (the whole field in one tick).
    pub das_speed: u8,

    /// Keystate of the previous tick.
    last_keys: KeySet,

    /// Ticks the current direction has been held past the tap.
    das_counter: u32,

    /// Direction currently charging: -1, 0 or +1.
    das_direction: i8,

    /// Total new key presses seen, for keys-per-piece stats.
    presses: u64,
}

impl Default for Controls {
    fn default() -> Self {
        Self {
            das_delay_ms: 150,
            das_speed: 1,
            last_keys: KeySet::NONE,
            das_counter: 0,
            das_direction: 0,
            presses: 0,
        }
    }
}

impl Controls {
    /// Create controls with the given DAS parameters.
    pub fn new(das_delay_ms: u32, das_speed: u8) -> Self {
        Self {
            das_delay_ms,
            das_speed,
            ..Self::default()
        }
    }

    /// Clear transient state (held keys, charge) without touching the
    /// DAS parameters.
    pub fn reset(&mut self) {
        self.last_keys = KeySet::NONE;
        self.das_counter = 0;
        self.das_direction = 0;
        self.presses = 0;
    }

    /// Total new key presses seen since the last reset.
    pub fn presses(&self) -> u64 {
        self.presses
    }

    /// Translate one tick of keystate into engine actions.
    pub fn translate(&mut self, keys: KeySet, config: &Config) -> Input {
        let new = keys.pressed_since(self.last_keys);
        self.last_keys = keys;
        self.presses += new.count() as u64;

        let mut input = Input {
            keys,
            ..Input::default()
        };

        // Rotation, with a fixed priority when several are pressed at
        // once.
        if new.contains(KeySet::ROTR) {
            input.rotation = 1;
        } else if new.contains(KeySet::ROTL) {
            input.rotation = -1;
        } else if new.contains(KeySet::ROTH) {
            input.rotation = 2;
        }

        if new.contains(KeySet::HOLD) {
            input.extra.insert(InputFlags::HOLD);
        }
        if new.contains(KeySet::UP) {
            input.extra.insert(InputFlags::HARD_DROP);
        }

        if new.contains(KeySet::LEFT) || new.contains(KeySet::RIGHT) {
            input.extra.insert(InputFlags::FINESSE_DIRECTION);
        }
        if new.contains(KeySet::ROTL) || new.contains(KeySet::ROTR) || new.contains(KeySet::ROTH) {
            input.extra.insert(InputFlags::FINESSE_ROTATION);
        }

        input.movement = self.das_movement(keys, new, config);

        // Soft drop. One-shot mode applies a single contribution per
        // DOWN press; otherwise the contribution repeats while held.
        let down = if config.one_shot_soft_drop {
            new.contains(KeySet::DOWN)
        } else {
            keys.contains(KeySet::DOWN)
        };
        if down {
            input.gravity = config.soft_drop_gravity * config.ms_per_tick as Fixed;
        }

        input
    }

    /// Horizontal movement for this tick: a single-cell tap on a new
    /// press, then auto-shift once the charge counter reaches the DAS
    /// delay. The counter resets when the direction releases or
    /// reverses.
    fn das_movement(&mut self, keys: KeySet, new: KeySet, config: &Config) -> i8 {
        let left = keys.contains(KeySet::LEFT);
        let right = keys.contains(KeySet::RIGHT);

        // The most recent press wins when both are held.
        if new.contains(KeySet::RIGHT) {
            self.das_direction = 1;
            self.das_counter = 0;
            return 1;
        }
        if new.contains(KeySet::LEFT) {
            self.das_direction = -1;
            self.das_counter = 0;
            return -1;
        }

        // Release of the charging direction: fall back to the other
        // held direction (fresh tap) or go idle.
        if self.das_direction > 0 && !right {
            self.das_counter = 0;
            if left {
                self.das_direction = -1;
                return -1;
            }
            self.das_direction = 0;
            return 0;
        }
        if self.das_direction < 0 && !left {
            self.das_counter = 0;
            if right {
                self.das_direction = 1;
                return 1;
            }
            self.das_direction = 0;
            return 0;
        }

        if self.das_direction == 0 {
            return 0;
        }

        if self.das_counter >= config.ticks(self.das_delay_ms) {
            // Charged: shift every tick. Speed 0 means the engine's
            // movement loop walks the piece to the wall.
            let cells = if self.das_speed == 0 {
                crate::game::field::MAX_WIDTH as i8
            } else {
                self.das_speed as i8
            };
            cells * self.das_direction
        } else {
            self.das_counter += 1;
            0
        }
    }
}
