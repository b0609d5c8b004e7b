//! FastStack Demo Driver
//!
//! Runs a scripted game against the engine while recording a replay,
//! then rebuilds the engine from the replay and verifies the final
//! state hash matches. This is the only part of the crate that prints
//! or paces anything; the engine itself is pure state.

use anyhow::{bail, Result};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use faststack::{
    game::GameState, Config, Controls, Engine, KeySet, ReplayRecorder, SoundEffect, VERSION,
};

fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("FastStack engine v{}", VERSION);

    demo_game()
}

/// Script a short game: shift pieces around, soft drop, hard drop.
fn scripted_keys(tick: u32) -> KeySet {
    match tick % 11 {
        0..=1 => KeySet::LEFT,
        2 => KeySet::NONE,
        3..=4 => KeySet::RIGHT,
        5 => KeySet::ROTR,
        6 => KeySet::DOWN,
        7 => KeySet::NONE,
        8 => KeySet::UP,
        _ => KeySet::NONE,
    }
}

fn demo_game() -> Result<()> {
    let config = Config {
        seed: Some(0x5EED_CAFE),
        goal: 5,
        ..Config::default()
    };

    info!(
        seed = config.seed.unwrap_or(0),
        goal = config.goal,
        "=== starting demo game ==="
    );

    let mut engine = Engine::new(config)?;
    let mut controls = Controls::default();
    let mut recorder = ReplayRecorder::new(&engine);

    let mut ticks = 0u32;
    for tick in 0..50_000 {
        let keys = scripted_keys(tick);
        recorder.record(tick, keys);

        let input = controls.translate(keys, &engine.config);
        engine.tick(&input);

        if engine.se.contains(SoundEffect::Go) {
            info!("go!");
        }

        ticks = tick;
        if engine.state == GameState::GameOver {
            break;
        }
    }

    let final_hash = engine.state_hash();
    info!(
        ticks,
        blocks = engine.blocks_placed,
        lines = engine.lines_cleared,
        finesse = engine.finesse,
        hash = %hex::encode(final_hash),
        "demo game finished"
    );

    // Round-trip: serialize the replay, rebuild the engine from it,
    // and confirm the simulation reproduces the same final state.
    let replay = recorder.finish();
    let bytes = replay.to_bytes()?;
    info!(
        deltas = replay.deltas().len(),
        bytes = bytes.len(),
        "replay recorded"
    );

    let replay = faststack::Replay::from_bytes(&bytes)?;
    let mut playback = replay.overview.build_engine()?;
    let mut playback_controls = Controls::default();

    for (_, keys) in replay.ticks() {
        let input = playback_controls.translate(keys, &playback.config);
        playback.tick(&input);
        if playback.state == GameState::GameOver {
            break;
        }
    }

    if playback.state_hash() != final_hash {
        bail!("replay diverged from the recorded game");
    }
    info!("replay verified: state hashes match");

    Ok(())
}
