use criterion::{Criterion, black_box, criterion_group, criterion_main};

use simulation::procgen::{ProcGenConfig, generate_world};
use simulation::sim::{SimConfig, Simulator};

fn bench_full_tick(c: &mut Criterion) {
    let base = generate_world(96, 96, 42, &ProcGenConfig::default());

    c.bench_function("full_tick_96x96", |b| {
        b.iter(|| {
            let mut world = base.clone();
            let mut sim = Simulator::new(SimConfig::default());
            sim.step_once(black_box(&mut world));
            black_box(world.stats().population)
        })
    });
}

fn bench_worldgen(c: &mut Criterion) {
    c.bench_function("generate_world_96x96", |b| {
        b.iter(|| {
            let world = generate_world(96, 96, black_box(42), &ProcGenConfig::default());
            black_box(world.len())
        })
    });
}

criterion_group!(benches, bench_full_tick, bench_worldgen);
criterion_main!(benches);
