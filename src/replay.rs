//! Replay Recording and Playback
//!
//! A replay is the complete configuration of a game (including the
//! seed) plus the keystate stream that drove it, delta-encoded: only
//! ticks where the keystate changed are stored. Playback rebuilds an
//! engine from the overview and re-derives every tick's input from the
//! recorded transitions, which reproduces the original game exactly -
//! the engine is deterministic and DAS/soft-drop timing is a pure
//! function of the keystate stream.
//!
//! Storage is the caller's concern; this module only defines the data
//! and its binary/JSON codecs.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::game::config::{Config, ConfigError};
use crate::game::engine::Engine;
use crate::game::input::KeySet;

/// Everything needed to reconstruct a game's starting conditions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayOverview {
    /// The full configuration the game ran with (goal included).
    pub config: Config,

    /// The seed the game actually used.
    pub seed: u32,
}

impl ReplayOverview {
    /// Capture the overview of a running engine.
    pub fn from_engine(engine: &Engine) -> Self {
        Self {
            config: engine.config.clone(),
            seed: engine.seed(),
        }
    }

    /// Build a fresh engine configured exactly as recorded.
    pub fn build_engine(&self) -> Result<Engine, ConfigError> {
        let mut config = self.config.clone();
        config.seed = Some(self.seed);
        Engine::new(config)
    }
}

/// A keystate transition: `keys` is held from `tick` until the next
/// delta.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyDelta {
    /// Tick this keystate began.
    pub tick: u32,

    /// The new keystate.
    pub keys: KeySet,
}

/// A complete recorded game.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Replay {
    /// Starting conditions.
    pub overview: ReplayOverview,

    /// Keystate transitions, strictly ordered by tick.
    deltas: Vec<KeyDelta>,

    /// Final tick of the recording (inclusive).
    end_tick: u32,
}

impl Replay {
    /// The recorded transitions.
    pub fn deltas(&self) -> &[KeyDelta] {
        &self.deltas
    }

    /// Final tick of the recording (inclusive).
    pub fn end_tick(&self) -> u32 {
        self.end_tick
    }

    /// The keystate held at `tick`: the most recent delta at or before
    /// it, or no keys before the first delta.
    pub fn keys_at(&self, tick: u32) -> KeySet {
        let idx = self.deltas.partition_point(|d| d.tick <= tick);
        if idx == 0 {
            KeySet::NONE
        } else {
            self.deltas[idx - 1].keys
        }
    }

    /// Iterate over every tick of the recording with its held
    /// keystate.
    pub fn ticks(&self) -> ReplayTicks<'_> {
        ReplayTicks {
            replay: self,
            tick: 0,
            delta_idx: 0,
            keys: KeySet::NONE,
        }
    }

    /// Encode to the compact binary format.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ReplayError> {
        Ok(bincode::serialize(self)?)
    }

    /// Decode from the binary format, validating the delta stream.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ReplayError> {
        let replay: Replay = bincode::deserialize(bytes)?;
        replay.check()?;
        Ok(replay)
    }

    /// Encode the human-readable JSON form.
    pub fn to_json(&self) -> Result<String, ReplayError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Decode from JSON, validating the delta stream.
    pub fn from_json(json: &str) -> Result<Self, ReplayError> {
        let replay: Replay = serde_json::from_str(json)?;
        replay.check()?;
        Ok(replay)
    }

    fn check(&self) -> Result<(), ReplayError> {
        for pair in self.deltas.windows(2) {
            if pair[0].tick >= pair[1].tick {
                return Err(ReplayError::UnorderedDeltas {
                    tick: pair[1].tick,
                });
            }
        }
        if let Some(last) = self.deltas.last() {
            if last.tick > self.end_tick {
                return Err(ReplayError::DeltaPastEnd {
                    tick: last.tick,
                    end_tick: self.end_tick,
                });
            }
        }
        Ok(())
    }
}

/// Per-tick keystate iterator over a replay.
pub struct ReplayTicks<'a> {
    replay: &'a Replay,
    tick: u32,
    delta_idx: usize,
    keys: KeySet,
}

impl Iterator for ReplayTicks<'_> {
    type Item = (u32, KeySet);

    fn next(&mut self) -> Option<Self::Item> {
        if self.tick > self.replay.end_tick {
            return None;
        }

        while let Some(delta) = self.replay.deltas.get(self.delta_idx) {
            if delta.tick > self.tick {
                break;
            }
            self.keys = delta.keys;
            self.delta_idx += 1;
        }

        let item = (self.tick, self.keys);
        self.tick += 1;
        Some(item)
    }
}

/// Records the keystate stream of a live game.
#[derive(Clone, Debug)]
pub struct ReplayRecorder {
    overview: ReplayOverview,
    deltas: Vec<KeyDelta>,
    last_keys: KeySet,
    end_tick: u32,
    started: bool,
}

impl ReplayRecorder {
    /// Start recording a game. Capture the overview before the first
    /// tick so the seed matches.
    pub fn new(engine: &Engine) -> Self {
        Self {
            overview: ReplayOverview::from_engine(engine),
            // A typical game changes keystate a few times per second.
            deltas: Vec::with_capacity(512),
            last_keys: KeySet::NONE,
            end_tick: 0,
            started: false,
        }
    }

    /// Record the keystate fed to the engine at `tick`. Only
    /// transitions are stored.
    pub fn record(&mut self, tick: u32, keys: KeySet) {
        self.end_tick = tick;
        if !self.started || keys != self.last_keys {
            self.deltas.push(KeyDelta { tick, keys });
            self.last_keys = keys;
            self.started = true;
        }
    }

    /// Number of stored transitions.
    pub fn delta_count(&self) -> usize {
        self.deltas.len()
    }

    /// Finish recording and produce the replay.
    pub fn finish(self) -> Replay {
        Replay {
            overview: self.overview,
            deltas: self.deltas,
            end_tick: self.end_tick,
        }
    }
}

/// A replay that could not be decoded or failed validation.
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("binary replay data corrupt: {0}")]
    Binary(#[from] bincode::Error),

    #[error("JSON replay data corrupt: {0}")]
    Json(#[from] serde_json::Error),

    #[error("replay deltas out of order at tick {tick}")]
    UnorderedDeltas { tick: u32 },

    #[error("replay delta at tick {tick} past recording end {end_tick}")]
    DeltaPastEnd { tick: u32, end_tick: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::config::Config;
    use crate::game::engine::GameState;
    use crate::game::input::Controls;

    fn test_engine(seed: u32) -> Engine {
        let config = Config {
            seed: Some(seed),
            ready_phase_length_ms: 0,
            go_phase_length_ms: 0,
            ..Config::default()
        };
        Engine::new(config).unwrap()
    }

    #[test]
    fn test_recorder_stores_only_transitions() {
        let engine = test_engine(1);
        let mut recorder = ReplayRecorder::new(&engine);

        recorder.record(0, KeySet::NONE);
        recorder.record(1, KeySet::NONE);
        recorder.record(2, KeySet::LEFT);
        recorder.record(3, KeySet::LEFT);
        recorder.record(4, KeySet::NONE);

        assert_eq!(recorder.delta_count(), 3);

        let replay = recorder.finish();
        assert_eq!(replay.end_tick(), 4);
        assert_eq!(replay.keys_at(0), KeySet::NONE);
        assert_eq!(replay.keys_at(2), KeySet::LEFT);
        assert_eq!(replay.keys_at(3), KeySet::LEFT);
        assert_eq!(replay.keys_at(4), KeySet::NONE);
        // Past the end the last keystate holds.
        assert_eq!(replay.keys_at(100), KeySet::NONE);
    }

    #[test]
    fn test_ticks_iterator_covers_every_tick() {
        let engine = test_engine(1);
        let mut recorder = ReplayRecorder::new(&engine);
        recorder.record(0, KeySet::NONE);
        recorder.record(3, KeySet::RIGHT);
        recorder.record(5, KeySet::NONE);

        let replay = recorder.finish();
        let frames: Vec<_> = replay.ticks().collect();

        assert_eq!(frames.len(), 6);
        assert_eq!(frames[0], (0, KeySet::NONE));
        assert_eq!(frames[2], (2, KeySet::NONE));
        assert_eq!(frames[3], (3, KeySet::RIGHT));
        assert_eq!(frames[4], (4, KeySet::RIGHT));
        assert_eq!(frames[5], (5, KeySet::NONE));
    }

    #[test]
    fn test_binary_roundtrip() {
        let engine = test_engine(99);
        let mut recorder = ReplayRecorder::new(&engine);
        recorder.record(0, KeySet::NONE);
        recorder.record(10, KeySet::UP);
        let replay = recorder.finish();

        let bytes = replay.to_bytes().unwrap();
        let decoded = Replay::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, replay);
    }

    #[test]
    fn test_json_roundtrip() {
        let engine = test_engine(7);
        let mut recorder = ReplayRecorder::new(&engine);
        recorder.record(0, KeySet::HOLD);
        let replay = recorder.finish();

        let json = replay.to_json().unwrap();
        let decoded = Replay::from_json(&json).unwrap();
        assert_eq!(decoded, replay);
    }

    #[test]
    fn test_garbage_bytes_rejected() {
        assert!(matches!(
            Replay::from_bytes(&[0xFF; 7]),
            Err(ReplayError::Binary(_))
        ));
    }

    #[test]
    fn test_unordered_deltas_rejected() {
        let engine = test_engine(1);
        let replay = Replay {
            overview: ReplayOverview::from_engine(&engine),
            deltas: vec![
                KeyDelta { tick: 5, keys: KeySet::LEFT },
                KeyDelta { tick: 3, keys: KeySet::NONE },
            ],
            end_tick: 10,
        };

        let bytes = bincode::serialize(&replay).unwrap();
        assert!(matches!(
            Replay::from_bytes(&bytes),
            Err(ReplayError::UnorderedDeltas { tick: 3 })
        ));
    }

    #[test]
    fn test_record_and_replay_reproduce_hashes() {
        // Drive a game with a scripted keystate stream, recording it;
        // then rebuild from the overview and replay. Every tick's
        // state hash must match.
        let mut engine = test_engine(0x5EED);
        let mut controls = Controls::default();
        let mut recorder = ReplayRecorder::new(&engine);

        let script = |tick: u32| -> KeySet {
            match tick % 13 {
                0..=2 => KeySet::LEFT,
                3 => KeySet::NONE,
                4..=5 => KeySet::RIGHT.with(KeySet::DOWN),
                6 => KeySet::ROTR,
                7 => KeySet::NONE,
                8 => KeySet::UP,
                _ => KeySet::NONE,
            }
        };

        let mut hashes = Vec::new();
        for tick in 0..600 {
            let keys = script(tick);
            recorder.record(tick, keys);
            let input = controls.translate(keys, &engine.config);
            engine.tick(&input);
            hashes.push(engine.state_hash());
            if engine.state == GameState::GameOver {
                break;
            }
        }

        let replay = recorder.finish();
        let bytes = replay.to_bytes().unwrap();
        let replay = Replay::from_bytes(&bytes).unwrap();

        let mut engine2 = replay.overview.build_engine().unwrap();
        let mut controls2 = Controls::default();
        for (i, (_, keys)) in replay.ticks().enumerate() {
            if i >= hashes.len() {
                break;
            }
            let input = controls2.translate(keys, &engine2.config);
            engine2.tick(&input);
            assert_eq!(engine2.state_hash(), hashes[i], "diverged at tick {i}");
        }
    }
}
