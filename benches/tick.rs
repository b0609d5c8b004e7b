//! Tick-loop benchmark: a full scripted game per iteration.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use faststack::{Config, Controls, Engine, KeySet};

fn scripted_keys(tick: u32) -> KeySet {
    match tick % 7 {
        0 => KeySet::LEFT,
        1 => KeySet::ROTR,
        2 => KeySet::DOWN,
        3 => KeySet::UP,
        _ => KeySet::NONE,
    }
}

fn bench_tick(c: &mut Criterion) {
    c.bench_function("scripted_game_1000_ticks", |b| {
        b.iter(|| {
            let config = Config {
                seed: Some(1),
                ready_phase_length_ms: 0,
                go_phase_length_ms: 0,
                ..Config::default()
            };
            let mut engine = Engine::new(config).unwrap();
            let mut controls = Controls::default();

            for tick in 0..1000u32 {
                let keys = scripted_keys(tick);
                let input = controls.translate(keys, &engine.config);
                engine.tick(&input);
            }

            black_box(engine.state_hash())
        })
    });
}

criterion_group!(benches, bench_tick);
criterion_main!(benches);
