//! Piece Randomizers
//!
//! The next-piece policy is a closed sum type carrying its own state;
//! the engine dispatches on the variant. All randomness flows through
//! the engine's [`SmallPrng`], so a policy is fully determined by the
//! seed and the number of draws made before it.
//!
//! Changing the configured policy mid-game is allowed: the engine
//! rebuilds the state the next time a piece is drawn.

use serde::{Deserialize, Serialize};

use crate::core::rng::SmallPrng;
use crate::game::piece::{Piece, PIECE_COUNT};

/// The available randomizer policies.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum RandomizerKind {
    /// Uniform draw, no memory.
    Simple = 0,
    /// 7-bag shuffle; the very first piece of a game is never S, Z
    /// or O.
    #[default]
    NoSzoBag7 = 1,
    /// TGM1: history of 4 (seeded Z,Z,Z,Z), up to 4 rerolls.
    Tgm1 = 2,
    /// TGM2: history of 4 (seeded Z,S,S,Z), up to 6 rerolls.
    Tgm2 = 3,
}

impl RandomizerKind {
    /// Get a randomizer kind from its index.
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Self::Simple),
            1 => Some(Self::NoSzoBag7),
            2 => Some(Self::Tgm1),
            3 => Some(Self::Tgm2),
            _ => None,
        }
    }
}

/// Length of the TGM reroll history.
const HISTORY_LEN: usize = 4;

/// A randomizer with its live state.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Randomizer {
    /// Uniform, stateless beyond the PRNG.
    Simple,
    /// Shuffled bag of all seven pieces, consumed in order.
    Bag {
        buf: [Piece; PIECE_COUNT],
        index: u8,
    },
    /// Reroll-against-history policy shared by TGM1 and TGM2.
    TgmHistory {
        history: [Piece; HISTORY_LEN],
        index: u8,
        rolls: u8,
    },
}

impl Randomizer {
    /// Initialize the state for a policy.
    ///
    /// The bag policy draws from the PRNG here (the first bag is
    /// shuffled, and reshuffled until it does not lead with S, Z or
    /// O), so initialization order is part of the deterministic
    /// sequence.
    pub fn new(kind: RandomizerKind, rng: &mut SmallPrng) -> Self {
        match kind {
            RandomizerKind::Simple => Randomizer::Simple,
            RandomizerKind::NoSzoBag7 => {
                let mut buf = Piece::ALL;
                loop {
                    rng.shuffle(&mut buf);
                    if !matches!(buf[0], Piece::S | Piece::Z | Piece::O) {
                        break;
                    }
                }
                Randomizer::Bag { buf, index: 0 }
            }
            RandomizerKind::Tgm1 => Randomizer::TgmHistory {
                history: [Piece::Z; HISTORY_LEN],
                index: 0,
                rolls: 4,
            },
            RandomizerKind::Tgm2 => Randomizer::TgmHistory {
                history: [Piece::Z, Piece::S, Piece::S, Piece::Z],
                index: 0,
                rolls: 6,
            },
        }
    }

    /// The policy this state belongs to, used to detect a mid-game
    /// configuration change.
    pub fn kind(&self) -> RandomizerKind {
        match self {
            Randomizer::Simple => RandomizerKind::Simple,
            Randomizer::Bag { .. } => RandomizerKind::NoSzoBag7,
            Randomizer::TgmHistory { rolls: 4, .. } => RandomizerKind::Tgm1,
            Randomizer::TgmHistory { .. } => RandomizerKind::Tgm2,
        }
    }

    /// Draw the next piece.
    pub fn next_piece(&mut self, rng: &mut SmallPrng) -> Piece {
        match self {
            Randomizer::Simple => uniform_piece(rng),
            Randomizer::Bag { buf, index } => {
                let piece = buf[*index as usize];
                *index += 1;
                if *index as usize == PIECE_COUNT {
                    *index = 0;
                    // Later bags have no first-piece constraint.
                    rng.shuffle(buf);
                }
                piece
            }
            Randomizer::TgmHistory { history, index, rolls } => {
                let mut piece = Piece::I;
                for _ in 0..*rolls {
                    piece = uniform_piece(rng);
                    if !history.contains(&piece) {
                        break;
                    }
                }
                // The final roll is kept even when it repeats.
                history[*index as usize] = piece;
                *index = (*index + 1) % HISTORY_LEN as u8;
                piece
            }
        }
    }
}

#[inline]
fn uniform_piece(rng: &mut SmallPrng) -> Piece {
    Piece::ALL[rng.in_range(0, PIECE_COUNT as u32) as usize]
}
