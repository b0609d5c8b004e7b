//! Rotation Systems and Wallkick Tables
//!
//! A rotation system decides how pieces enter the field and which
//! alternative positions are tried when a rotation collides. Each
//! system supplies:
//!
//!  * Entry offsets - horizontal shift applied to a piece's bounding
//!    box when its blocks are computed.
//!  * Entry thetas - the rotation state a freshly spawned piece is
//!    mapped through (systems with upside-down spawns reuse the shared
//!    SRS block geometry via this remap).
//!  * Kick tables - per-piece, per-direction ordered lists of
//!    `(dx, dy)` tests, tried until one does not collide.
//!
//! All tables are immutable program data shared by every engine
//! instance. The resolver that walks them lives in
//! [`crate::game::engine`].

use serde::{Deserialize, Serialize};

use crate::game::piece::{Piece, PIECE_COUNT, ROTATION_COUNT};

/// The available rotation systems.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum RotationSystemKind {
    /// Pure rotation states, no kicks.
    Simple = 0,
    /// Sega arcade rules: flat spawns, no kicks.
    Sega = 1,
    /// Standard guideline SRS.
    #[default]
    Srs = 2,
    /// SRS with Arika's I-piece kick variant.
    ArikaSrs = 3,
    /// TGM1/TGM2: Sega states plus right/left kicks with the
    /// classical J/L/T exception.
    Tgm12 = 4,
    /// TGM3: TGM kicks plus limited I/T floorkicks.
    Tgm3 = 5,
    /// DTET: symmetric, direction-biased kicks.
    Dtet = 6,
}

impl RotationSystemKind {
    /// Number of rotation systems.
    pub const COUNT: usize = 7;

    /// Get a rotation system kind from its index.
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Self::Simple),
            1 => Some(Self::Sega),
            2 => Some(Self::Srs),
            3 => Some(Self::ArikaSrs),
            4 => Some(Self::Tgm12),
            5 => Some(Self::Tgm3),
            6 => Some(Self::Dtet),
            _ => None,
        }
    }
}

/// A single wallkick test.
///
/// `dx`/`dy` offset the piece position before the collision check
/// (y grows down, so a negative `dy` is an upward kick - a floorkick
/// when the reference test's dy is higher). `arika_ljt` marks the test
/// that is forbidden outright when the TGM J/L/T field-state exception
/// holds; hitting it then aborts the whole rotation.
#[derive(Clone, Copy, Debug)]
pub struct KickTest {
    pub dx: i8,
    pub dy: i8,
    pub arika_ljt: bool,
}

const fn k(dx: i8, dy: i8) -> KickTest {
    KickTest { dx, dy, arika_ljt: false }
}

const fn ka(dx: i8, dy: i8) -> KickTest {
    KickTest { dx, dy, arika_ljt: true }
}

/// An ordered list of kick tests. Exhausting the list fails the
/// rotation.
pub type KickList = &'static [KickTest];

/// A wallkick table: one kick list per current rotation state.
pub type KickTable = [KickList; ROTATION_COUNT];

/// The no-kick fallback: only the unshifted position is tested.
static BASIC: [KickTest; 1] = [k(0, 0)];

/// A complete rotation system.
pub struct RotationSystem {
    entry_offset: [i8; PIECE_COUNT],
    entry_theta: [u8; PIECE_COUNT],
    kicks_cw: [i8; PIECE_COUNT],
    kicks_ccw: [i8; PIECE_COUNT],
    kicks_half: [i8; PIECE_COUNT],
    tables: &'static [KickTable],
}

impl RotationSystem {
    /// Horizontal shift applied to `piece`'s bounding box.
    #[inline]
    pub fn entry_offset(&self, piece: Piece) -> i8 {
        self.entry_offset[piece.index()]
    }

    /// Rotation-state remap applied on top of the engine's theta.
    #[inline]
    pub fn entry_theta(&self, piece: Piece) -> u8 {
        self.entry_theta[piece.index()]
    }

    /// The kick tests for rotating `piece` from `theta` in `direction`
    /// (+1 clockwise, -1 anticlockwise, +2 half turn).
    pub fn kicks(&self, piece: Piece, direction: i8, theta: u8) -> KickList {
        let index = match direction {
            1 => self.kicks_cw[piece.index()],
            -1 => self.kicks_ccw[piece.index()],
            _ => self.kicks_half[piece.index()],
        };

        if index < 0 {
            &BASIC
        } else {
            self.tables[index as usize][(theta & 3) as usize]
        }
    }
}

/// Look up the static table set for a rotation system.
pub fn rotation_system(kind: RotationSystemKind) -> &'static RotationSystem {
    match kind {
        RotationSystemKind::Simple => &SIMPLE,
        RotationSystemKind::Sega => &SEGA,
        RotationSystemKind::Srs => &SRS,
        RotationSystemKind::ArikaSrs => &ARIKA_SRS,
        RotationSystemKind::Tgm12 => &TGM12,
        RotationSystemKind::Tgm3 => &TGM3,
        RotationSystemKind::Dtet => &DTET,
    }
}

// ---------------------------------------------------------------------
// SRS
// ---------------------------------------------------------------------

// Guideline JLSTZ kick data, y-down coordinates.
const SRS_JLSTZ_CW: KickTable = [
    &[k(0, 0), k(-1, 0), k(-1, -1), k(0, 2), k(-1, 2)],
    &[k(0, 0), k(1, 0), k(1, 1), k(0, -2), k(1, -2)],
    &[k(0, 0), k(1, 0), k(1, -1), k(0, 2), k(1, 2)],
    &[k(0, 0), k(-1, 0), k(-1, 1), k(0, -2), k(-1, -2)],
];

const SRS_JLSTZ_CCW: KickTable = [
    &[k(0, 0), k(1, 0), k(1, -1), k(0, 2), k(1, 2)],
    &[k(0, 0), k(1, 0), k(1, 1), k(0, -2), k(1, -2)],
    &[k(0, 0), k(-1, 0), k(-1, -1), k(0, 2), k(-1, 2)],
    &[k(0, 0), k(-1, 0), k(-1, 1), k(0, -2), k(-1, -2)],
];

const SRS_I_CW: KickTable = [
    &[k(0, 0), k(-2, 0), k(1, 0), k(-2, 1), k(1, -2)],
    &[k(0, 0), k(-1, 0), k(2, 0), k(-1, -2), k(2, 1)],
    &[k(0, 0), k(2, 0), k(-1, 0), k(2, -1), k(-1, 2)],
    &[k(0, 0), k(1, 0), k(-2, 0), k(1, 2), k(-2, -1)],
];

const SRS_I_CCW: KickTable = [
    &[k(0, 0), k(-1, 0), k(2, 0), k(-1, -2), k(2, 1)],
    &[k(0, 0), k(2, 0), k(-1, 0), k(2, -1), k(-1, 2)],
    &[k(0, 0), k(1, 0), k(-2, 0), k(1, 2), k(-2, -1)],
    &[k(0, 0), k(-2, 0), k(1, 0), k(-2, 1), k(1, -2)],
];

static SRS: RotationSystem = RotationSystem {
    entry_offset: [-1; PIECE_COUNT],
    entry_theta: [0; PIECE_COUNT],
    //          I  J  L   O  S  T  Z
    kicks_cw: [1, 0, 0, -1, 0, 0, 0],
    kicks_ccw: [3, 2, 2, -1, 2, 2, 2],
    kicks_half: [-1; PIECE_COUNT],
    tables: &[SRS_JLSTZ_CW, SRS_I_CW, SRS_JLSTZ_CCW, SRS_I_CCW],
};

// ---------------------------------------------------------------------
// Arika SRS
// ---------------------------------------------------------------------

// JLSTZ kicks match guideline SRS; the I piece uses Arika's variant,
// which symmetrizes the horizontal tests and allows the I floorkick.
const ARIKA_I_CW: KickTable = [
    &[k(0, 0), k(-2, 0), k(1, 0), k(1, -2), k(-2, 1)],
    &[k(0, 0), k(-1, 0), k(2, 0), k(-1, -2), k(2, 1)],
    &[k(0, 0), k(2, 0), k(-1, 0), k(2, -1), k(-1, 1)],
    &[k(0, 0), k(-2, 0), k(1, 0), k(-2, -1), k(1, 2)],
];

const ARIKA_I_CCW: KickTable = [
    &[k(0, 0), k(2, 0), k(-1, 0), k(-1, -2), k(2, 1)],
    &[k(0, 0), k(1, 0), k(-2, 0), k(1, -2), k(-2, 1)],
    &[k(0, 0), k(-2, 0), k(1, 0), k(-2, -1), k(1, 1)],
    &[k(0, 0), k(2, 0), k(-1, 0), k(2, -1), k(-1, 2)],
];

static ARIKA_SRS: RotationSystem = RotationSystem {
    entry_offset: [-1; PIECE_COUNT],
    entry_theta: [0; PIECE_COUNT],
    kicks_cw: [1, 0, 0, -1, 0, 0, 0],
    kicks_ccw: [3, 2, 2, -1, 2, 2, 2],
    kicks_half: [-1; PIECE_COUNT],
    tables: &[SRS_JLSTZ_CW, ARIKA_I_CW, SRS_JLSTZ_CCW, ARIKA_I_CCW],
};

// ---------------------------------------------------------------------
// Sega / Simple
// ---------------------------------------------------------------------

static SIMPLE: RotationSystem = RotationSystem {
    entry_offset: [-1; PIECE_COUNT],
    entry_theta: [0; PIECE_COUNT],
    kicks_cw: [-1; PIECE_COUNT],
    kicks_ccw: [-1; PIECE_COUNT],
    kicks_half: [-1; PIECE_COUNT],
    tables: &[],
};

static SEGA: RotationSystem = RotationSystem {
    entry_offset: [-1; PIECE_COUNT],
    //            I  J  L  O  S  T  Z
    entry_theta: [0, 2, 2, 0, 0, 2, 0],
    kicks_cw: [-1; PIECE_COUNT],
    kicks_ccw: [-1; PIECE_COUNT],
    kicks_half: [-1; PIECE_COUNT],
    tables: &[],
};

// ---------------------------------------------------------------------
// TGM
// ---------------------------------------------------------------------

// Centre, right, left. The right kick carries the J/L/T exception
// flag: when the field-state predicate holds, kicks are forbidden
// entirely and the rotation fails on the flagged test.
const TGM_KICKS: KickTable = [
    &[k(0, 0), ka(1, 0), k(-1, 0)],
    &[k(0, 0), ka(1, 0), k(-1, 0)],
    &[k(0, 0), ka(1, 0), k(-1, 0)],
    &[k(0, 0), ka(1, 0), k(-1, 0)],
];

static TGM12: RotationSystem = RotationSystem {
    entry_offset: [-1; PIECE_COUNT],
    entry_theta: [0, 2, 2, 0, 0, 2, 0],
    //           I  J  L   O  S  T  Z
    kicks_cw: [-1, 0, 0, -1, 0, 0, 0],
    kicks_ccw: [-1, 0, 0, -1, 0, 0, 0],
    kicks_half: [-1; PIECE_COUNT],
    tables: &[TGM_KICKS],
};

// TGM3 additions: vertical I may climb one cell when rotating flat at
// the stack, horizontal I may step right; T gains a single floorkick.
const TGM3_I: KickTable = [
    &[k(0, 0), k(1, 0), k(2, 0)],
    &[k(0, 0), k(1, 0), k(0, -1)],
    &[k(0, 0), k(1, 0), k(2, 0)],
    &[k(0, 0), k(1, 0), k(0, -1)],
];

const TGM3_T: KickTable = [
    &[k(0, 0), ka(1, 0), k(-1, 0), k(0, -1)],
    &[k(0, 0), ka(1, 0), k(-1, 0)],
    &[k(0, 0), ka(1, 0), k(-1, 0), k(0, -1)],
    &[k(0, 0), ka(1, 0), k(-1, 0)],
];

static TGM3: RotationSystem = RotationSystem {
    entry_offset: [-1; PIECE_COUNT],
    entry_theta: [0, 2, 2, 0, 0, 2, 0],
    //          I  J  L   O  S  T  Z
    kicks_cw: [1, 0, 0, -1, 0, 2, 0],
    kicks_ccw: [1, 0, 0, -1, 0, 2, 0],
    kicks_half: [-1; PIECE_COUNT],
    tables: &[TGM_KICKS, TGM3_I, TGM3_T],
};

// ---------------------------------------------------------------------
// DTET
// ---------------------------------------------------------------------

// Generous symmetric kicks, biased toward the rotation direction,
// with a downward step as the last resort.
const DTET_CW: KickTable = [
    &[k(0, 0), k(1, 0), k(-1, 0), k(0, 1), k(1, 1), k(-1, 1)],
    &[k(0, 0), k(1, 0), k(-1, 0), k(0, 1), k(1, 1), k(-1, 1)],
    &[k(0, 0), k(1, 0), k(-1, 0), k(0, 1), k(1, 1), k(-1, 1)],
    &[k(0, 0), k(1, 0), k(-1, 0), k(0, 1), k(1, 1), k(-1, 1)],
];

const DTET_CCW: KickTable = [
    &[k(0, 0), k(-1, 0), k(1, 0), k(0, 1), k(-1, 1), k(1, 1)],
    &[k(0, 0), k(-1, 0), k(1, 0), k(0, 1), k(-1, 1), k(1, 1)],
    &[k(0, 0), k(-1, 0), k(1, 0), k(0, 1), k(-1, 1), k(1, 1)],
    &[k(0, 0), k(-1, 0), k(1, 0), k(0, 1), k(-1, 1), k(1, 1)],
];

static DTET: RotationSystem = RotationSystem {
    entry_offset: [-1; PIECE_COUNT],
    entry_theta: [0, 2, 2, 0, 0, 2, 0],
    //          I  J  L   O  S  T  Z
    kicks_cw: [0, 0, 0, -1, 0, 0, 0],
    kicks_ccw: [1, 1, 1, -1, 1, 1, 1],
    kicks_half: [-1; PIECE_COUNT],
    tables: &[DTET_CW, DTET_CCW],
};
