//! Engine State Machine
//!
//! One engine instance is one field of play. The frontend calls
//! [`Engine::tick`] exactly once per logic frame with the translated
//! [`Input`]; everything observable (field, piece, counters, sound
//! effects) is stable between ticks and must only be read there.
//!
//! # Determinism
//!
//! The tick function is 100% deterministic:
//! - integer tick clock, no wall time
//! - fixed-point vertical position, no floats
//! - all randomness from the seeded [`SmallPrng`]
//!
//! Given the same configuration, seed and input stream, two runs
//! produce identical state hashes at every tick on any platform.
//!
//! # Fall-through
//!
//! Some transitions are zero-delay: entry delay can cancel straight
//! into a spawn, and a lock flows into line clearing and the next
//! entry delay within one tick. The dispatch loop re-enters for those
//! states, bounded by a hard cap; the externally visible state is the
//! last one reached.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::fixed::{self, Fixed};
use crate::core::hash::{StateHash, StateHasher};
use crate::core::rng::SmallPrng;
use crate::game::config::{Config, ConfigError, InitialActionStyle, LockStyle, PREVIEW_MAX};
use crate::game::events::{SfxSet, SoundEffect};
use crate::game::field::Field;
use crate::game::input::{Input, InputFlags, KeySet};
use crate::game::piece::{Piece, BLOCKS_PER_PIECE};
use crate::game::randomizer::Randomizer;
use crate::game::rotation::rotation_system;

/// Hard cap on zero-delay state transitions within one tick.
///
/// The longest legal chain is FALLING -> LINES -> ARE -> NEW_PIECE.
const MAX_FALLTHROUGH: usize = 4;

/// Presses needed to reach each rotation state optimally (no 180s).
const OPTIMAL_ROTATIONS: [u32; 4] = [0, 1, 2, 1];

/// The engine's current phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum GameState {
    /// "READY" countdown before play.
    Ready = 0,
    /// "GO" countdown before play.
    Go = 1,
    /// A piece is in flight.
    Falling = 2,
    /// The piece is resting on the stack/floor.
    Landed = 3,
    /// Entry delay between lock and next spawn.
    Are = 4,
    /// A new piece spawns this instant.
    NewPiece = 5,
    /// Lock and line clearing happen this instant.
    Lines = 6,
    /// Caller-initiated termination; the engine does nothing further.
    Quit = 7,
    /// Terminal: topped out or goal reached.
    GameOver = 8,
    /// Not a reachable phase; the value of `last_state` before the
    /// first tick.
    Unknown = 9,
}

/// A single game instance.
///
/// Public fields are the externally observable state; frontends read
/// them between ticks. `state` is also writable so a caller can signal
/// [`GameState::Quit`]. Configuration lives in `config` and must not
/// be changed mid-game, with one exception: swapping `config.randomizer`
/// takes effect at the next piece draw.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Engine {
    /// Engine configuration (validated at construction).
    pub config: Config,

    /// The playfield.
    pub field: Field,

    /// Current phase.
    pub state: GameState,

    /// Phase at the end of the previous tick.
    pub last_state: GameState,

    /// The piece in flight, if any.
    pub piece: Option<Piece>,

    /// Piece bounding-box x position.
    pub x: i32,

    /// Piece bounding-box y position (whole cells).
    pub y: i32,

    /// Greatest y the piece could occupy without colliding, for the
    /// current x and theta.
    pub hard_drop_y: i32,

    /// Piece rotation state, 0-3 quarter turns clockwise from spawn.
    pub theta: u8,

    /// The held piece, if any.
    pub hold_piece: Option<Piece>,

    /// Sound effects emitted during the last tick.
    pub se: SfxSet,

    /// Pieces locked since reset.
    pub blocks_placed: u64,

    /// Lines cleared since reset.
    pub lines_cleared: u32,

    /// Logic ticks elapsed since GO finished.
    pub total_ticks: u64,

    /// Wasted direction/rotation presses since reset.
    pub finesse: u64,

    // Internal state.
    rng: SmallPrng,
    seed: u32,
    randomizer: Randomizer,
    next_pieces: [Piece; PREVIEW_MAX],
    actual_y: Fixed,
    irs_amount: i8,
    ihs_flag: bool,
    hold_available: bool,
    last_input: Input,
    are_timer: u32,
    generic_counter: u32,
    lock_timer: u32,
    floorkick_count: u32,
    finesse_piece_direction: u32,
    finesse_piece_rotation: u32,
}

impl Engine {
    /// Build an engine from a configuration and reset it.
    ///
    /// Invalid configuration is rejected here; a constructed engine is
    /// always ready to tick, so there is no "uninitialized" misuse
    /// state to guard against later.
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        config.validate()?;

        let seed = config.seed.unwrap_or(0);
        let mut rng = SmallPrng::new(seed);
        let randomizer = Randomizer::new(config.randomizer, &mut rng);

        let mut engine = Self {
            field: Field::new(config.field_width, config.field_height),
            state: GameState::Ready,
            last_state: GameState::Unknown,
            piece: None,
            x: 0,
            y: 0,
            hard_drop_y: 0,
            theta: 0,
            hold_piece: None,
            se: SfxSet::EMPTY,
            blocks_placed: 0,
            lines_cleared: 0,
            total_ticks: 0,
            finesse: 0,
            rng,
            seed,
            randomizer,
            next_pieces: [Piece::I; PREVIEW_MAX],
            actual_y: 0,
            irs_amount: 0,
            ihs_flag: false,
            hold_available: true,
            last_input: Input::default(),
            are_timer: 0,
            generic_counter: 0,
            lock_timer: 0,
            floorkick_count: 0,
            finesse_piece_direction: 0,
            finesse_piece_rotation: 0,
            config,
        };
        engine.reset();
        Ok(engine)
    }

    /// Clear all transient state and start a fresh game with the
    /// configured seed (or the previous seed when none is configured).
    ///
    /// Configuration is left untouched.
    pub fn reset(&mut self) {
        let seed = self.config.seed.unwrap_or(self.seed);
        self.reset_with_seed(seed);
    }

    /// Reset with an explicit seed (replay playback, or caller-chosen
    /// entropy).
    pub fn reset_with_seed(&mut self, seed: u32) {
        self.field = Field::new(self.config.field_width, self.config.field_height);
        self.seed = seed;
        self.rng = SmallPrng::new(seed);
        self.randomizer = Randomizer::new(self.config.randomizer, &mut self.rng);

        self.se = SfxSet::EMPTY;
        self.irs_amount = 0;
        self.ihs_flag = false;
        self.finesse = 0;
        self.finesse_piece_direction = 0;
        self.finesse_piece_rotation = 0;
        self.are_timer = 0;
        self.generic_counter = 0;
        self.total_ticks = 0;
        self.lock_timer = 0;
        self.floorkick_count = 0;
        self.lines_cleared = 0;
        self.blocks_placed = 0;
        self.last_state = GameState::Unknown;
        self.last_input = Input::default();
        self.state = GameState::Ready;
        self.hold_available = true;
        self.hold_piece = None;

        // No piece yet: nothing is rendered during READY/GO. The
        // preview is filled so frontends can show it immediately.
        self.piece = None;
        self.x = 0;
        self.y = 0;
        self.actual_y = 0;
        self.hard_drop_y = 0;
        self.theta = 0;
        for i in 0..self.config.next_piece_count as usize {
            self.next_pieces[i] = self.next_random_piece();
        }

        info!(seed, "game reset");
    }

    /// The seed this game is running with.
    pub fn seed(&self) -> u32 {
        self.seed
    }

    /// The visible preview pieces, soonest first.
    pub fn preview(&self) -> &[Piece] {
        &self.next_pieces[..self.config.next_piece_count as usize]
    }

    /// Whether a hold is currently allowed.
    pub fn hold_available(&self) -> bool {
        self.hold_available
    }

    /// The input consumed by the last tick.
    pub fn last_input(&self) -> &Input {
        &self.last_input
    }

    /// Advance the game by exactly one tick.
    pub fn tick(&mut self, input: &Input) {
        self.se = SfxSet::EMPTY;
        self.last_input = *input;

        let mut moved = false;
        let mut rotated = false;

        for _ in 0..MAX_FALLTHROUGH {
            match self.state {
                GameState::Ready | GameState::Go => {
                    self.tick_ready_go(input);
                    // The pre-game countdown does not advance
                    // `total_ticks`.
                    self.last_state = self.state;
                    return;
                }

                GameState::Are => {
                    if self.tick_are(input) {
                        continue;
                    }
                    break;
                }

                GameState::NewPiece => {
                    self.tick_new_piece();
                    break;
                }

                GameState::Falling | GameState::Landed => {
                    self.tick_falling(input, &mut moved, &mut rotated);
                    if self.state == GameState::Lines {
                        continue;
                    }
                    break;
                }

                GameState::Lines => {
                    self.tick_lines();
                    continue;
                }

                GameState::Quit | GameState::GameOver | GameState::Unknown => break,
            }
        }

        self.last_state = self.state;
        self.total_ticks += 1;
    }

    /// READY/GO countdown. Hold is special here: there is no piece in
    /// flight, so holding moves the preview head straight into the
    /// hold slot, optionally any number of times.
    fn tick_ready_go(&mut self, input: &Input) {
        if input.extra.contains(InputFlags::HOLD) && self.hold_available {
            let piece = self.next_preview_piece();
            self.hold_piece = Some(piece);
            self.se.insert(SoundEffect::Hold);

            if !self.config.infinite_ready_go_hold {
                self.hold_available = false;
            }
        }

        let ready_ticks = self.config.ticks(self.config.ready_phase_length_ms);
        let go_ticks = self.config.ticks(self.config.go_phase_length_ms);

        if self.generic_counter == 0 {
            self.se.insert(SoundEffect::Ready);
        }
        if self.generic_counter == ready_ticks {
            self.se.insert(SoundEffect::Go);
            self.state = GameState::Go;
        }
        // Not an `else if`: the GO phase may have zero length.
        if self.generic_counter == ready_ticks + go_ticks {
            self.state = GameState::NewPiece;
        }

        self.generic_counter += 1;
    }

    /// Entry delay. Returns true when the tick should fall through to
    /// NEW_PIECE.
    fn tick_are(&mut self, input: &Input) -> bool {
        match self.config.initial_action_style {
            // Latched from the raw keystate: whatever is held on the
            // final delay tick is applied at spawn.
            InitialActionStyle::Persistent => {
                self.irs_amount = if input.keys.contains(KeySet::ROTR) {
                    1
                } else if input.keys.contains(KeySet::ROTL) {
                    -1
                } else if input.keys.contains(KeySet::ROTH) {
                    2
                } else {
                    0
                };
                self.ihs_flag = input.keys.contains(KeySet::HOLD);
            }
            // Latched only from fresh presses during the delay.
            InitialActionStyle::Trigger => {
                if input.rotation != 0 {
                    self.irs_amount = input.rotation;
                }
                if input.extra.contains(InputFlags::HOLD) {
                    self.ihs_flag = true;
                }
            }
            InitialActionStyle::None => {}
        }

        if self.config.are_cancellable
            && (!input.is_idle() || self.ihs_flag || self.irs_amount != 0)
        {
            self.are_timer = 0;
            self.state = GameState::NewPiece;
            return true;
        }

        let elapsed = self.are_timer;
        self.are_timer += 1;
        if elapsed > self.config.ticks(self.config.are_delay_ms) {
            self.are_timer = 0;
            self.state = GameState::NewPiece;
            return true;
        }

        false
    }

    /// Spawn the next piece, apply pending initial actions, and check
    /// for topout.
    fn tick_new_piece(&mut self) {
        self.spawn_piece();

        // Initial rotation goes through the normal resolver, so
        // wallkicks (and floorkick accounting) behave as usual.
        if self.irs_amount != 0 {
            self.try_rotate(self.irs_amount);
        }
        if self.ihs_flag {
            self.try_hold();
        }
        self.irs_amount = 0;
        self.ihs_flag = false;

        // Topout is checked after initial actions: IRS/IHS can rescue
        // a spawn that would otherwise overlap the stack.
        if let Some(piece) = self.piece {
            if self.is_collision(piece, self.x, self.y, self.theta) {
                self.enter_game_over();
                return;
            }
        }

        self.update_hard_drop_y();
        self.state = GameState::Falling;
    }

    /// The main play states: hold, rotation, movement, gravity, lock.
    fn tick_falling(&mut self, input: &Input, moved: &mut bool, rotated: &mut bool) {
        if input.extra.contains(InputFlags::HOLD) {
            self.try_hold();
        }

        if input.extra.contains(InputFlags::FINESSE_DIRECTION) {
            self.finesse_piece_direction += 1;
        }
        if input.extra.contains(InputFlags::FINESSE_ROTATION) {
            self.finesse_piece_rotation += 1;
        }

        if input.rotation != 0 && self.try_rotate(input.rotation) {
            *rotated = true;
        }

        if let Some(piece) = self.piece {
            let mut distance = input.movement as i32;
            while distance < 0 {
                if self.is_collision(piece, self.x - 1, self.y, self.theta) {
                    break;
                }
                self.x -= 1;
                *moved = true;
                distance += 1;
            }
            while distance > 0 {
                if self.is_collision(piece, self.x + 1, self.y, self.theta) {
                    break;
                }
                self.x += 1;
                *moved = true;
                distance -= 1;
            }
        }

        if *moved || *rotated {
            if *moved {
                self.se.insert(SoundEffect::Move);
            }
            if *rotated {
                self.se.insert(SoundEffect::Rotate);
            }
            self.update_hard_drop_y();
        }

        self.apply_gravity(input.gravity);

        if input.extra.contains(InputFlags::HARD_DROP) {
            // Instantaneous drop, then immediate lock.
            self.y = self.hard_drop_y;
            self.actual_y = fixed::from_int(self.y);
            self.state = GameState::Lines;
            return;
        }

        // The piece may have left LANDED again this tick; never lock
        // in mid-air.
        let lock_ticks = self.config.ticks(self.config.lock_delay_ms);
        if self.lock_timer >= lock_ticks && self.state == GameState::Landed {
            self.state = GameState::Lines;
            return;
        }

        if (*moved || *rotated) && self.config.lock_style == LockStyle::Move {
            self.lock_timer = 0;
        }

        // Incremented after the threshold check above, so a landed
        // piece always gets at least one tick of grace.
        if self.state == GameState::Landed {
            self.lock_timer += 1;
        }
    }

    /// Lock the piece, clear lines, and decide what comes next.
    fn tick_lines(&mut self) {
        if let Some(piece) = self.piece {
            self.lock_piece(piece);
            self.se.insert(SoundEffect::for_piece(piece));
        }
        self.piece = None;

        let lines = self.field.clear_lines();
        if let Some(effect) = SoundEffect::for_erase(lines) {
            self.se.insert(effect);
        }
        self.lines_cleared += lines;
        if lines > 0 {
            debug!(lines, total = self.lines_cleared, "lines cleared");
        }

        if self.lines_cleared < self.config.goal {
            self.state = GameState::Are;
        } else {
            self.enter_game_over();
        }
    }

    fn enter_game_over(&mut self) {
        self.state = GameState::GameOver;
        self.se.insert(SoundEffect::GameOver);
        info!(
            blocks = self.blocks_placed,
            lines = self.lines_cleared,
            ticks = self.total_ticks,
            "game over"
        );
    }

    // -----------------------------------------------------------------
    // Piece management
    // -----------------------------------------------------------------

    /// Draw from the randomizer, rebuilding its state first if the
    /// configured policy changed mid-game.
    fn next_random_piece(&mut self) -> Piece {
        if self.randomizer.kind() != self.config.randomizer {
            self.randomizer = Randomizer::new(self.config.randomizer, &mut self.rng);
        }
        self.randomizer.next_piece(&mut self.rng)
    }

    /// Pop the preview head and refill the tail.
    fn next_preview_piece(&mut self) -> Piece {
        let generated = self.next_random_piece();
        let count = self.config.next_piece_count as usize;

        if count == 0 {
            return generated;
        }

        let pending = self.next_pieces[0];
        self.next_pieces.copy_within(1..count, 0);
        self.next_pieces[count - 1] = generated;
        pending
    }

    /// Spawn the next preview piece at the entry position.
    fn spawn_piece(&mut self) {
        self.x = self.field.width() / 2 - 1;
        // Spawning at y = 0 would leave no headroom for entry-state
        // rotations under Sega-style rules.
        self.y = 1;
        self.actual_y = fixed::from_int(self.y);
        self.theta = 0;
        self.lock_timer = 0;
        self.finesse_piece_rotation = 0;
        self.finesse_piece_direction = 0;
        self.floorkick_count = 0;
        let piece = self.next_preview_piece();
        self.piece = Some(piece);
        self.hold_available = true;

        debug!(?piece, x = self.x, "piece spawned");
    }

    /// Attempt to hold. Fails when a hold was already used during this
    /// piece's life.
    fn try_hold(&mut self) -> bool {
        if !self.hold_available {
            return false;
        }
        let Some(current) = self.piece else {
            return false;
        };
        self.hold_available = false;

        match self.hold_piece {
            None => {
                // First hold of the game: stash the piece and bring in
                // the next one.
                self.hold_piece = Some(current);
                self.spawn_piece();
                self.hold_available = false;
            }
            Some(held) => {
                self.hold_piece = Some(current);
                self.piece = Some(held);
                self.x = self.field.width() / 2 - 1;
                self.y = 1;
                self.actual_y = fixed::from_int(self.y);
                self.theta = 0;
                self.floorkick_count = 0;
            }
        }

        self.update_hard_drop_y();
        self.se.insert(SoundEffect::Hold);
        true
    }

    // -----------------------------------------------------------------
    // Geometry and collision
    // -----------------------------------------------------------------

    /// The four cells `piece` fills at a position, honoring the
    /// rotation system's entry offset and theta.
    pub fn piece_to_blocks(
        &self,
        piece: Piece,
        x: i32,
        y: i32,
        theta: u8,
    ) -> [(i32, i32); BLOCKS_PER_PIECE] {
        let rs = rotation_system(self.config.rotation_system);
        let calc_theta = (theta + rs.entry_theta(piece)) & 3;
        let x = x + rs.entry_offset(piece) as i32;

        let mut blocks = [(0, 0); BLOCKS_PER_PIECE];
        for (dst, &(dx, dy)) in blocks.iter_mut().zip(piece.offsets(calc_theta)) {
            *dst = (x + dx as i32, y + dy as i32);
        }
        blocks
    }

    /// Whether `piece` collides with the field at a position.
    fn is_collision(&self, piece: Piece, x: i32, y: i32, theta: u8) -> bool {
        self.piece_to_blocks(piece, x, y, theta)
            .iter()
            .any(|&(bx, by)| self.field.is_occupied(bx, by))
    }

    /// Recompute the lowest valid y for the current piece position.
    fn update_hard_drop_y(&mut self) {
        let Some(piece) = self.piece else {
            return;
        };
        let mut probe = self.y;
        while !self.is_collision(piece, self.x, probe, self.theta) {
            probe += 1;
        }
        self.hard_drop_y = probe - 1;
    }

    // -----------------------------------------------------------------
    // Rotation
    // -----------------------------------------------------------------

    /// Attempt a rotation (+1 CW, -1 CCW, +2 half turn) with
    /// wallkicks. Commits position/theta and returns true on success.
    fn try_rotate(&mut self, direction: i8) -> bool {
        let Some(piece) = self.piece else {
            return false;
        };

        let new_theta = ((self.theta as i8 + 4 + direction) & 3) as u8;
        let rs = rotation_system(self.config.rotation_system);
        let kicks = rs.kicks(piece, direction, self.theta);
        let first_dy = kicks[0].dy;

        for test in kicks {
            // The flagged TGM test: when the field-state exception
            // holds, kicks are forbidden and the rotation fails here.
            if test.arika_ljt && self.arika_ljt_blocked(piece, direction) {
                break;
            }

            let kick_x = self.x + test.dx as i32;
            let kick_y = self.y + test.dy as i32;

            if self.is_collision(piece, kick_x, kick_y, new_theta) {
                continue;
            }

            // A kick is a floorkick when it lifts the piece relative
            // to the table's reference test, not merely when dy is
            // negative (systems may bias the whole table).
            let adjusted_dy = test.dy - first_dy;
            if self.config.floorkick_limit > 0 && adjusted_dy < 0 {
                self.floorkick_count += 1;
                if self.floorkick_count > self.config.floorkick_limit {
                    self.floorkick_count = self.config.floorkick_limit;
                    self.lock_timer = self.config.ticks(self.config.lock_delay_ms);
                }
            }

            // Preserve the fractional drop so rotation cannot be used
            // as an implicit lock reset.
            self.actual_y = fixed::from_int(kick_y) + fixed::frac(self.actual_y);
            self.x = kick_x;
            self.y = kick_y;
            self.theta = new_theta;
            return true;
        }

        false
    }

    /// The classical TGM J/L/T exception: certain occupied cells
    /// around the piece forbid wallkicks for this rotation.
    fn arika_ljt_blocked(&self, piece: Piece, direction: i8) -> bool {
        let rs = rotation_system(self.config.rotation_system);
        // Predicate cells are relative to the bounding box.
        let x = self.x + rs.entry_offset(piece) as i32;
        let y = self.y;
        let occ = |cx: i32, cy: i32| self.field.is_occupied(cx, cy);

        match piece {
            Piece::J => {
                if self.theta == 0
                    && (occ(x + 1, y)
                        || (occ(x + 1, y + 2) && (direction == 1 || !occ(x + 2, y))))
                {
                    return true;
                }
                if self.theta == 2
                    && (occ(x + 1, y)
                        || (occ(x + 1, y + 1) && (direction == -1 || !occ(x + 2, y))))
                {
                    return true;
                }
            }
            Piece::L => {
                if self.theta == 0
                    && (occ(x + 1, y)
                        || (occ(x + 1, y + 2) && (direction == -1 || !occ(x, y))))
                {
                    return true;
                }
                if self.theta == 2
                    && (occ(x + 1, y - 1)
                        || (occ(x + 1, y) && (direction == 1 || !occ(x, y - 1))))
                {
                    return true;
                }
            }
            Piece::T => {
                if self.theta == 0 && occ(x + 1, y) {
                    return true;
                }
                if self.theta == 2 && occ(x + 1, y - 1) {
                    return true;
                }
            }
            _ => {}
        }

        false
    }

    // -----------------------------------------------------------------
    // Gravity and locking
    // -----------------------------------------------------------------

    /// Apply this tick's gravity. `extra` is the soft-drop
    /// contribution from the input.
    fn apply_gravity(&mut self, extra: Fixed) {
        self.actual_y += self.config.gravity * self.config.ms_per_tick as Fixed + extra;

        let hard = fixed::from_int(self.hard_drop_y);
        if self.actual_y >= hard {
            // Overshot the stack: rest on it.
            self.actual_y = hard;
            self.y = self.hard_drop_y;

            if self.state == GameState::Falling {
                self.state = GameState::Landed;
            }
        } else {
            if matches!(self.config.lock_style, LockStyle::Step | LockStyle::Move)
                && fixed::floor(self.actual_y) > self.y
            {
                self.lock_timer = 0;
            }

            self.y = fixed::floor(self.actual_y);
            self.state = GameState::Falling;
        }
    }

    /// Stamp the piece into the field and settle finesse accounting.
    fn lock_piece(&mut self, piece: Piece) {
        let blocks = self.piece_to_blocks(piece, self.x, self.y, self.theta);
        self.blocks_placed += 1;

        for (bx, by) in blocks {
            self.field.set_cell(bx, by, piece.cell_color());
        }

        // Simple finesse model: on a standard field every column is
        // reachable within two directional presses (tap plus DAS), so
        // anything beyond two is waste. Rotation waste is measured
        // against the cheapest press count for the final state; the O
        // piece never needs rotating, so every press on it is waste.
        let wasted_direction = self.finesse_piece_direction.saturating_sub(2);
        let wasted_rotation = self
            .finesse_piece_rotation
            .saturating_sub(OPTIMAL_ROTATIONS[(self.theta & 3) as usize]);
        self.finesse += (wasted_direction + wasted_rotation) as u64;

        debug!(
            ?piece,
            x = self.x,
            y = self.y,
            theta = self.theta,
            "piece locked"
        );
    }

    // -----------------------------------------------------------------
    // Verification
    // -----------------------------------------------------------------

    /// Hash every observable and internal field that defines the game,
    /// in a fixed order. Two runs are identical iff their hashes match
    /// at every tick.
    pub fn state_hash(&self) -> StateHash {
        let mut hasher = StateHasher::for_engine_state();

        for y in 0..self.field.height() {
            hasher.update_bytes(self.field.row(y));
        }

        hasher.update_u8(self.piece.map_or(0xFF, |p| p.index() as u8));
        hasher.update_i32(self.x);
        hasher.update_i32(self.y);
        hasher.update_u8(self.theta);
        hasher.update_fixed(self.actual_y);
        hasher.update_i32(self.hard_drop_y);
        hasher.update_u8(self.hold_piece.map_or(0xFF, |p| p.index() as u8));
        hasher.update_bool(self.hold_available);
        hasher.update_u8(self.state as u8);

        for piece in self.preview() {
            hasher.update_u8(piece.index() as u8);
        }
        for word in self.rng.words() {
            hasher.update_u32(word);
        }

        hasher.update_u32(self.lines_cleared);
        hasher.update_u64(self.blocks_placed);
        hasher.update_u64(self.total_ticks);
        hasher.update_u64(self.finesse);
        hasher.update_u32(self.se.bits());

        hasher.finalize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::input::Controls;
    use crate::game::randomizer::RandomizerKind;
    use crate::game::rotation::RotationSystemKind;
    use proptest::prelude::*;

    fn test_config() -> Config {
        Config {
            seed: Some(1),
            ready_phase_length_ms: 0,
            go_phase_length_ms: 0,
            gravity: 0,
            ..Config::default()
        }
    }

    fn test_engine(config: Config) -> Engine {
        Engine::new(config).unwrap()
    }

    /// Tick through READY/GO until the first piece spawns.
    fn start(engine: &mut Engine) {
        let idle = Input::default();
        for _ in 0..200 {
            if engine.piece.is_some() {
                return;
            }
            engine.tick(&idle);
        }
        panic!("no piece spawned");
    }

    /// Replace the piece in flight, keeping the engine mid-fall.
    fn place_piece(engine: &mut Engine, piece: Piece, x: i32, theta: u8) {
        engine.piece = Some(piece);
        engine.x = x;
        engine.y = 1;
        engine.actual_y = fixed::from_int(1);
        engine.theta = theta;
        engine.lock_timer = 0;
        engine.floorkick_count = 0;
        engine.state = GameState::Falling;
        engine.update_hard_drop_y();
    }

    fn hard_drop() -> Input {
        let mut input = Input::default();
        input.extra.insert(InputFlags::HARD_DROP);
        input
    }

    fn rotate(direction: i8) -> Input {
        Input {
            rotation: direction,
            ..Input::default()
        }
    }

    // -----------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------

    #[test]
    fn test_ready_go_phases() {
        let config = Config {
            ready_phase_length_ms: 833,
            go_phase_length_ms: 833,
            ..test_config()
        };
        let ready_ticks = config.ticks(833); // 52
        let mut engine = test_engine(config);
        let idle = Input::default();

        engine.tick(&idle);
        assert!(engine.se.contains(SoundEffect::Ready));
        assert_eq!(engine.state, GameState::Ready);

        for _ in 0..ready_ticks - 1 {
            engine.tick(&idle);
            assert!(!engine.se.contains(SoundEffect::Go));
        }

        engine.tick(&idle);
        assert!(engine.se.contains(SoundEffect::Go));
        assert_eq!(engine.state, GameState::Go);

        for _ in 0..ready_ticks {
            engine.tick(&idle);
        }
        assert_eq!(engine.state, GameState::NewPiece);
        // The countdown never advances the game clock.
        assert_eq!(engine.total_ticks, 0);

        engine.tick(&idle);
        assert!(engine.piece.is_some());
        assert_eq!(engine.state, GameState::Falling);
        assert_eq!(engine.total_ticks, 1);
    }

    #[test]
    fn test_reset_preserves_config_and_refills_preview() {
        let mut engine = test_engine(test_config());
        start(&mut engine);
        engine.tick(&hard_drop());
        assert_eq!(engine.blocks_placed, 1);

        engine.reset();
        assert_eq!(engine.blocks_placed, 0);
        assert_eq!(engine.state, GameState::Ready);
        assert_eq!(engine.preview().len(), engine.config.next_piece_count as usize);
        assert_eq!(engine.config.goal, 40);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = Config {
            field_width: 30,
            ..Config::default()
        };
        assert!(Engine::new(config).is_err());
    }

    // -----------------------------------------------------------------
    // Spec scenarios (SRS, 10x20)
    // -----------------------------------------------------------------

    #[test]
    fn test_hard_drop_i_locks_row_19() {
        let mut engine = test_engine(test_config());
        start(&mut engine);
        assert_eq!(engine.x, 4);
        assert_eq!(engine.y, 1);
        place_piece(&mut engine, Piece::I, 4, 0);

        engine.tick(&hard_drop());

        for x in 3..=6 {
            assert_eq!(engine.field.cell(x, 19), Piece::I.cell_color(), "col {x}");
        }
        for x in [0, 1, 2, 7, 8, 9] {
            assert_eq!(engine.field.cell(x, 19), 0, "col {x}");
        }
        assert_eq!(engine.blocks_placed, 1);
        assert_eq!(engine.lines_cleared, 0);
        assert!(engine.se.contains(SoundEffect::PieceI));
        assert_eq!(engine.state, GameState::Are);
    }

    #[test]
    fn test_das_to_right_wall() {
        let mut engine = test_engine(test_config());
        start(&mut engine);
        place_piece(&mut engine, Piece::T, 4, 0);

        let mut controls = Controls::new(150, 1); // 9 ticks of charge
        for _ in 0..30 {
            let input = controls.translate(KeySet::RIGHT, &engine.config);
            engine.tick(&input);
        }

        // Rightmost block of T sits in column 9; the piece never
        // collided en route.
        let blocks = engine.piece_to_blocks(Piece::T, engine.x, engine.y, engine.theta);
        let rightmost = blocks.iter().map(|&(x, _)| x).max().unwrap();
        assert_eq!(rightmost, 9);
        assert_eq!(engine.state, GameState::Falling);
    }

    #[test]
    fn test_line_clear_one_row() {
        let mut engine = test_engine(test_config());
        start(&mut engine);

        // Row 19 full except column 0.
        for x in 1..10 {
            engine.field.set_cell(x, 19, Piece::L.cell_color());
        }

        // Vertical J against the left wall drops its long side into
        // column 0, filling the gap.
        place_piece(&mut engine, Piece::J, 0, 1);
        engine.tick(&hard_drop());

        assert_eq!(engine.lines_cleared, 1);
        assert!(engine.se.contains(SoundEffect::Erase1));
        assert!(engine.se.contains(SoundEffect::PieceJ));

        // The rows above the cleared one shifted down intact.
        assert_eq!(engine.field.cell(0, 19), Piece::J.cell_color());
        assert_eq!(engine.field.cell(1, 19), 0);
        assert_eq!(engine.field.cell(0, 18), Piece::J.cell_color());
        assert_eq!(engine.field.cell(1, 18), Piece::J.cell_color());
        assert!(engine.field.row(0).iter().all(|&c| c == 0));
    }

    #[test]
    fn test_irs_persistent_rotates_at_spawn() {
        let config = Config {
            initial_action_style: InitialActionStyle::Persistent,
            ..test_config()
        };
        let mut engine = test_engine(config);
        start(&mut engine);
        engine.tick(&hard_drop());
        assert_eq!(engine.state, GameState::Are);

        // ROTR held through entry delay; the next spawn is an L.
        engine.next_pieces[0] = Piece::L;
        let input = Input {
            keys: KeySet::ROTR,
            ..Input::default()
        };
        engine.tick(&input);

        assert_eq!(engine.piece, Some(Piece::L));
        assert_eq!(engine.theta, 1);
        assert_eq!(engine.state, GameState::Falling);
    }

    #[test]
    fn test_topout_ends_game() {
        let mut engine = test_engine(test_config());
        let idle = Input::default();
        engine.tick(&idle); // READY/GO pass, state -> NewPiece

        // A column through the spawn area.
        for y in 0..=18 {
            engine.field.set_cell(4, y, Piece::L.cell_color());
        }
        engine.next_pieces[0] = Piece::I;

        engine.tick(&idle); // spawn -> collision -> game over
        assert_eq!(engine.state, GameState::GameOver);
        assert!(engine.se.contains(SoundEffect::GameOver));

        // Emitted once, on the entering tick only; nothing further
        // progresses.
        engine.tick(&hard_drop());
        assert!(!engine.se.contains(SoundEffect::GameOver));
        assert_eq!(engine.state, GameState::GameOver);
        assert_eq!(engine.blocks_placed, 0);
    }

    // -----------------------------------------------------------------
    // Boundary behaviors
    // -----------------------------------------------------------------

    #[test]
    fn test_zero_lock_delay_locks_on_landing_tick() {
        let config = Config {
            lock_delay_ms: 0,
            // Fast gravity: a full field per tick.
            gravity: fixed::to_fixed(2.0),
            ..test_config()
        };
        let mut engine = test_engine(config);
        start(&mut engine);

        // One falling tick: land and lock in the same tick.
        engine.tick(&Input::default());
        assert_eq!(engine.blocks_placed, 1);
    }

    #[test]
    fn test_zero_are_spawns_on_tick_after_lines() {
        let mut engine = test_engine(test_config());
        start(&mut engine);
        engine.tick(&hard_drop());
        assert_eq!(engine.state, GameState::Are);
        assert!(engine.piece.is_none());

        engine.tick(&Input::default());
        assert!(engine.piece.is_some());
        assert_eq!(engine.state, GameState::Falling);
    }

    #[test]
    fn test_floorkick_limit_saturates_lock_timer() {
        let config = Config {
            floorkick_limit: 1,
            ..test_config()
        };
        let mut engine = test_engine(config);
        start(&mut engine);

        // T resting on the floor; rotating kicks it upward.
        place_piece(&mut engine, Piece::T, 4, 0);
        engine.y = engine.hard_drop_y;
        engine.actual_y = fixed::from_int(engine.y);

        assert!(engine.try_rotate(1));
        assert_eq!(engine.floorkick_count, 1);
        assert_eq!(engine.lock_timer, 0);

        // Back on the floor for a second floorkick: the limit is
        // exceeded and the lock timer saturates.
        engine.theta = 0;
        engine.y = engine.hard_drop_y;
        engine.actual_y = fixed::from_int(engine.y);
        engine.update_hard_drop_y();

        assert!(engine.try_rotate(1));
        assert_eq!(engine.floorkick_count, 1);
        assert_eq!(engine.lock_timer, engine.config.ticks(engine.config.lock_delay_ms));
    }

    #[test]
    fn test_are_cancellable_ends_early() {
        let config = Config {
            are_delay_ms: 500,
            are_cancellable: true,
            ..test_config()
        };
        let mut engine = test_engine(config);
        start(&mut engine);
        engine.tick(&hard_drop());
        assert_eq!(engine.state, GameState::Are);

        // Idle input: the delay holds.
        engine.tick(&Input::default());
        assert_eq!(engine.state, GameState::Are);

        // Any action cancels into the next spawn immediately.
        let input = Input {
            movement: 1,
            ..Input::default()
        };
        engine.tick(&input);
        assert_eq!(engine.state, GameState::Falling);
        assert!(engine.piece.is_some());
    }

    // -----------------------------------------------------------------
    // Rotation and wallkicks
    // -----------------------------------------------------------------

    #[test]
    fn test_srs_wallkick_off_left_wall() {
        let mut engine = test_engine(test_config());
        start(&mut engine);

        // Vertical T hugging the left wall; rotating to flat needs a
        // one-cell kick to the right.
        place_piece(&mut engine, Piece::T, 0, 1);

        engine.tick(&rotate(-1));
        assert_eq!(engine.theta, 0);
        assert_eq!(engine.x, 1);
        assert!(engine.se.contains(SoundEffect::Rotate));
    }

    #[test]
    fn test_rotation_preserves_fractional_drop() {
        let mut engine = test_engine(test_config());
        start(&mut engine);
        place_piece(&mut engine, Piece::T, 4, 0);

        engine.actual_y = fixed::from_int(1) + fixed::to_fixed(0.75);
        assert!(engine.try_rotate(1));
        assert_eq!(fixed::frac(engine.actual_y), fixed::to_fixed(0.75));
        assert_eq!(fixed::floor(engine.actual_y), engine.y);
    }

    #[test]
    fn test_tgm_exception_blocks_kick() {
        let config = Config {
            rotation_system: RotationSystemKind::Tgm12,
            ..test_config()
        };
        let mut engine = test_engine(config);
        start(&mut engine);

        // J in TGM spawn state (flat side down). A block above the
        // piece's centre both obstructs the basic rotation and
        // triggers the J/L/T exception, so the side kicks are
        // forbidden and the rotation fails outright.
        place_piece(&mut engine, Piece::J, 4, 0);
        engine.field.set_cell(4, 1, Piece::L.cell_color());

        assert!(!engine.try_rotate(1));
        assert_eq!(engine.theta, 0);
    }

    #[test]
    fn test_tgm_kick_succeeds_without_exception() {
        let config = Config {
            rotation_system: RotationSystemKind::Tgm12,
            ..test_config()
        };
        let mut engine = test_engine(config);
        start(&mut engine);

        // Obstruction below-left fails the basic rotation but does
        // not fire the exception; the right kick resolves it.
        place_piece(&mut engine, Piece::J, 4, 0);
        engine.field.set_cell(3, 3, Piece::L.cell_color());

        assert!(engine.try_rotate(1));
        assert_eq!(engine.theta, 1);
        assert_eq!(engine.x, 5);
    }

    // -----------------------------------------------------------------
    // Hold
    // -----------------------------------------------------------------

    #[test]
    fn test_hold_swaps_and_blocks_rehold() {
        let mut engine = test_engine(test_config());
        start(&mut engine);
        let first = engine.piece.unwrap();
        assert!(engine.hold_available());

        let mut input = Input::default();
        input.extra.insert(InputFlags::HOLD);
        engine.tick(&input);

        assert_eq!(engine.hold_piece, Some(first));
        assert!(engine.piece.is_some());
        assert!(!engine.hold_available());
        assert!(engine.se.contains(SoundEffect::Hold));

        // A second hold within the same piece's life does nothing.
        let second = engine.piece.unwrap();
        engine.tick(&input);
        assert_eq!(engine.piece, Some(second));
        assert!(!engine.se.contains(SoundEffect::Hold));

        // After the piece locks and the next spawns, hold swaps.
        engine.tick(&hard_drop());
        engine.tick(&Input::default());
        assert!(engine.hold_available());
        let third = engine.piece.unwrap();
        engine.tick(&input);
        assert_eq!(engine.hold_piece, Some(third));
        assert_eq!(engine.piece, Some(first));
    }

    #[test]
    fn test_ready_go_hold_takes_preview_head() {
        let mut engine = test_engine(test_config());
        let head = engine.preview()[0];

        let mut input = Input::default();
        input.extra.insert(InputFlags::HOLD);
        engine.tick(&input);

        assert_eq!(engine.hold_piece, Some(head));
        assert!(engine.se.contains(SoundEffect::Hold));
        assert!(!engine.hold_available());
    }

    #[test]
    fn test_infinite_ready_go_hold() {
        let config = Config {
            infinite_ready_go_hold: true,
            ready_phase_length_ms: 833,
            ..test_config()
        };
        let mut engine = test_engine(config);

        let mut input = Input::default();
        input.extra.insert(InputFlags::HOLD);
        engine.tick(&input);
        let first_hold = engine.hold_piece;
        assert!(engine.hold_available());

        engine.tick(&input);
        assert!(engine.se.contains(SoundEffect::Hold));
        assert_ne!(engine.hold_piece, None);
        // The previous hold was discarded for the new preview head.
        assert_ne!(engine.hold_piece, first_hold);
    }

    // -----------------------------------------------------------------
    // Goal and finesse
    // -----------------------------------------------------------------

    #[test]
    fn test_goal_reached_ends_game() {
        let config = Config {
            goal: 1,
            ..test_config()
        };
        let mut engine = test_engine(config);
        start(&mut engine);

        for x in 1..10 {
            engine.field.set_cell(x, 19, Piece::L.cell_color());
        }
        place_piece(&mut engine, Piece::J, 0, 1);
        engine.tick(&hard_drop());

        assert_eq!(engine.lines_cleared, 1);
        assert_eq!(engine.state, GameState::GameOver);
        assert!(engine.se.contains(SoundEffect::GameOver));
        assert!(engine.se.contains(SoundEffect::Erase1));
    }

    #[test]
    fn test_finesse_counts_wasted_presses() {
        let mut engine = test_engine(test_config());
        start(&mut engine);
        place_piece(&mut engine, Piece::T, 4, 0);

        // Four direction presses where two would do: two wasted.
        let mut dir = Input::default();
        dir.extra.insert(InputFlags::FINESSE_DIRECTION);
        for _ in 0..4 {
            engine.tick(&dir);
        }
        engine.tick(&hard_drop());
        assert_eq!(engine.finesse, 2);
    }

    #[test]
    fn test_finesse_o_rotations_all_wasted() {
        let mut engine = test_engine(test_config());
        start(&mut engine);
        place_piece(&mut engine, Piece::O, 4, 0);

        // O never needs rotating; each press is waste even though the
        // final state is the spawn state.
        let mut rot = rotate(1);
        rot.extra.insert(InputFlags::FINESSE_ROTATION);
        engine.tick(&rot);
        let mut rot = rotate(-1);
        rot.extra.insert(InputFlags::FINESSE_ROTATION);
        engine.tick(&rot);

        engine.tick(&hard_drop());
        assert_eq!(engine.finesse, 2);
    }

    #[test]
    fn test_finesse_optimal_rotation_not_wasted() {
        let mut engine = test_engine(test_config());
        start(&mut engine);
        place_piece(&mut engine, Piece::T, 4, 0);

        // One press to theta 1 is optimal.
        let mut rot = rotate(1);
        rot.extra.insert(InputFlags::FINESSE_ROTATION);
        engine.tick(&rot);
        engine.tick(&hard_drop());
        assert_eq!(engine.finesse, 0);
    }

    // -----------------------------------------------------------------
    // Gravity and locking
    // -----------------------------------------------------------------

    #[test]
    fn test_gravity_accumulates_subcell() {
        let config = Config {
            // Half a cell per tick: 1/32 cells per ms at 16 ms ticks.
            gravity: fixed::to_fixed(0.03125),
            ..test_config()
        };
        let mut engine = test_engine(config);
        start(&mut engine);
        place_piece(&mut engine, Piece::T, 4, 0);

        let idle = Input::default();
        engine.tick(&idle);
        assert_eq!(engine.y, 1);
        engine.tick(&idle);
        assert_eq!(engine.y, 2);
        assert_eq!(fixed::floor(engine.actual_y), engine.y);
    }

    #[test]
    fn test_soft_drop_adds_input_gravity() {
        let mut engine = test_engine(test_config());
        start(&mut engine);
        place_piece(&mut engine, Piece::T, 4, 0);

        let input = Input {
            gravity: fixed::to_fixed(3.0),
            ..Input::default()
        };
        engine.tick(&input);
        assert_eq!(engine.y, 4);
        assert_eq!(engine.state, GameState::Falling);
    }

    #[test]
    fn test_landed_piece_gets_grace_tick() {
        let config = Config {
            lock_delay_ms: 32, // 2 ticks
            gravity: fixed::to_fixed(2.0),
            ..test_config()
        };
        let mut engine = test_engine(config);
        start(&mut engine);

        let idle = Input::default();
        engine.tick(&idle); // lands
        assert_eq!(engine.state, GameState::Landed);
        assert_eq!(engine.blocks_placed, 0);

        engine.tick(&idle);
        assert_eq!(engine.blocks_placed, 0);

        engine.tick(&idle); // lock timer expires
        assert_eq!(engine.blocks_placed, 1);
    }

    #[test]
    fn test_move_lock_style_resets_timer() {
        let config = Config {
            lock_style: LockStyle::Move,
            lock_delay_ms: 32, // 2 ticks
            gravity: fixed::to_fixed(2.0),
            ..test_config()
        };
        let mut engine = test_engine(config);
        start(&mut engine);

        let idle = Input::default();
        engine.tick(&idle); // lands
        assert_eq!(engine.state, GameState::Landed);

        // Wiggling resets the lock timer every tick; the piece stays
        // unlocked well past the delay.
        for step in 0..6 {
            let input = Input {
                movement: if step % 2 == 0 { 1 } else { -1 },
                ..Input::default()
            };
            engine.tick(&input);
            assert_eq!(engine.blocks_placed, 0, "step {step}");
        }

        engine.tick(&idle);
        engine.tick(&idle);
        engine.tick(&idle);
        assert_eq!(engine.blocks_placed, 1);
    }

    // -----------------------------------------------------------------
    // Determinism
    // -----------------------------------------------------------------

    #[test]
    fn test_identical_runs_identical_hashes() {
        use rand::{rngs::StdRng, Rng, SeedableRng};

        let mut a = test_engine(test_config());
        let mut b = test_engine(test_config());
        let mut controls_a = Controls::default();
        let mut controls_b = Controls::default();

        // Both engines see the same mashed-keyboard stream.
        let mut keys_rng = StdRng::seed_from_u64(0xFA57_57AC);
        for tick in 0..400u32 {
            let keys = KeySet::from_bits(keys_rng.gen::<u16>() & 0x00FF);
            let ia = controls_a.translate(keys, &a.config);
            let ib = controls_b.translate(keys, &b.config);
            a.tick(&ia);
            b.tick(&ib);
            assert_eq!(a.state_hash(), b.state_hash(), "tick {tick}");
        }
    }

    #[test]
    fn test_quit_state_is_inert() {
        let mut engine = test_engine(test_config());
        start(&mut engine);

        engine.state = GameState::Quit;
        let before = engine.blocks_placed;
        engine.tick(&hard_drop());

        assert_eq!(engine.state, GameState::Quit);
        assert_eq!(engine.blocks_placed, before);
        assert!(engine.se.is_empty());
    }

    #[test]
    fn test_seed_changes_piece_sequence() {
        let a = test_engine(test_config());
        let b = test_engine(Config {
            seed: Some(2),
            ..test_config()
        });
        assert_ne!(a.preview(), b.preview());
    }

    #[test]
    fn test_randomizer_swap_mid_game() {
        let mut engine = test_engine(test_config());
        start(&mut engine);

        engine.config.randomizer = RandomizerKind::Tgm1;
        // The next draw rebuilds the randomizer state; play continues.
        for _ in 0..8 {
            engine.tick(&hard_drop());
            engine.tick(&Input::default());
        }
        assert!(engine.blocks_placed >= 8);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        /// Spec invariants hold after every tick of a fuzzed game.
        #[test]
        fn prop_tick_invariants(
            seed in any::<u32>(),
            floorkick_limit in 0u32..3,
            raw_keys in proptest::collection::vec(0u16..0x100, 1..250),
        ) {
            let config = Config {
                seed: Some(seed),
                ready_phase_length_ms: 0,
                go_phase_length_ms: 0,
                floorkick_limit,
                ..Config::default()
            };
            let mut engine = Engine::new(config).unwrap();
            let mut controls = Controls::default();

            for bits in raw_keys {
                let keys = KeySet::from_bits(bits);
                let input = controls.translate(keys, &engine.config);
                engine.tick(&input);

                if let Some(piece) = engine.piece {
                    if matches!(engine.state, GameState::Falling | GameState::Landed) {
                        prop_assert!(!engine.is_collision(
                            piece, engine.x, engine.y, engine.theta
                        ));
                        prop_assert!(engine.y <= engine.hard_drop_y);
                        prop_assert!(engine.is_collision(
                            piece, engine.x, engine.hard_drop_y + 1, engine.theta
                        ));
                        prop_assert!(!engine.is_collision(
                            piece, engine.x, engine.hard_drop_y, engine.theta
                        ));
                        prop_assert_eq!(fixed::floor(engine.actual_y), engine.y);
                    }
                }
                prop_assert!(
                    engine.floorkick_count <= engine.config.floorkick_limit.max(1)
                );
            }
        }
    }
}
