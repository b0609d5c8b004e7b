//! Piece Definitions
//!
//! The seven tetromino kinds, their static block geometry, and the cell
//! values they stamp into the field on lock.
//!
//! Block offsets are defined once, in SRS orientation, inside a 4x4
//! bounding box. Alternate rotation systems do not redefine geometry;
//! they remap it through entry thetas and wallkick tables (see
//! [`crate::game::rotation`]).

use serde::{Deserialize, Serialize};

/// Number of piece kinds.
pub const PIECE_COUNT: usize = 7;

/// Number of rotation states.
pub const ROTATION_COUNT: usize = 4;

/// Number of blocks in a piece.
pub const BLOCKS_PER_PIECE: usize = 4;

/// A playable piece kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Piece {
    I = 0,
    J = 1,
    L = 2,
    O = 3,
    S = 4,
    T = 5,
    Z = 6,
}

impl Piece {
    /// All pieces in index order.
    pub const ALL: [Piece; PIECE_COUNT] = [
        Piece::I,
        Piece::J,
        Piece::L,
        Piece::O,
        Piece::S,
        Piece::T,
        Piece::Z,
    ];

    /// Get a piece from its index (0-6).
    pub fn from_index(index: u8) -> Option<Piece> {
        Self::ALL.get(index as usize).copied()
    }

    /// Index of this piece (0-6).
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Cell value stamped into the field when this piece locks.
    ///
    /// Nonzero and distinct per kind so renderers can recolor locked
    /// cells. Value 1 is reserved; occupancy tests check `cell > 1`.
    #[inline]
    pub fn cell_color(self) -> u8 {
        CELL_COLORS[self.index()]
    }

    /// The four block offsets of this piece at a rotation state.
    #[inline]
    pub fn offsets(self, theta: u8) -> &'static [(i8, i8); BLOCKS_PER_PIECE] {
        &PIECE_OFFSETS[self.index()][(theta & 3) as usize]
    }
}

/// Cell values per piece kind.
const CELL_COLORS: [u8; PIECE_COUNT] = [0x10, 0x20, 0x30, 0x40, 0x50, 0x60, 0x70];

/// Static block offsets, SRS orientation, 4x4 bounding box.
///
/// Indexed `[piece][theta][block]`; x grows right, y grows down.
static PIECE_OFFSETS: [[[(i8, i8); BLOCKS_PER_PIECE]; ROTATION_COUNT]; PIECE_COUNT] = [
    // I
    [
        [(0, 1), (1, 1), (2, 1), (3, 1)],
        [(2, 0), (2, 1), (2, 2), (2, 3)],
        [(0, 2), (1, 2), (2, 2), (3, 2)],
        [(1, 0), (1, 1), (1, 2), (1, 3)],
    ],
    // J
    [
        [(0, 0), (0, 1), (1, 1), (2, 1)],
        [(1, 0), (1, 1), (1, 2), (2, 0)],
        [(0, 1), (1, 1), (2, 1), (2, 2)],
        [(0, 2), (1, 0), (1, 1), (1, 2)],
    ],
    // L
    [
        [(0, 1), (1, 1), (2, 0), (2, 1)],
        [(1, 0), (1, 1), (1, 2), (2, 2)],
        [(0, 1), (0, 2), (1, 1), (2, 1)],
        [(0, 0), (1, 0), (1, 1), (1, 2)],
    ],
    // O
    [
        [(1, 0), (1, 1), (2, 0), (2, 1)],
        [(1, 0), (1, 1), (2, 0), (2, 1)],
        [(1, 0), (1, 1), (2, 0), (2, 1)],
        [(1, 0), (1, 1), (2, 0), (2, 1)],
    ],
    // S
    [
        [(0, 1), (1, 0), (1, 1), (2, 0)],
        [(1, 0), (1, 1), (2, 1), (2, 2)],
        [(0, 2), (1, 1), (1, 2), (2, 1)],
        [(0, 0), (0, 1), (1, 1), (1, 2)],
    ],
    // T
    [
        [(0, 1), (1, 0), (1, 1), (2, 1)],
        [(1, 0), (1, 1), (1, 2), (2, 1)],
        [(0, 1), (1, 1), (1, 2), (2, 1)],
        [(0, 1), (1, 0), (1, 1), (1, 2)],
    ],
    // Z
    [
        [(0, 0), (1, 0), (1, 1), (2, 1)],
        [(1, 1), (1, 2), (2, 0), (2, 1)],
        [(0, 1), (1, 1), (1, 2), (2, 2)],
        [(0, 1), (0, 2), (1, 0), (1, 1)],
    ],
];
