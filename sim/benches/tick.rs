//! Tick cost at colony scale.
//!
//! Run with: `cargo bench --bench tick`
//! Add `--features profile` for a per-stage breakdown in the log.
//!
//! Benchmark groups:
//! - colony_tick: 100 gnomes, 2,000 queued digs

use burrow_sim::{Command, SimWorld, TaskPriority, TileCoord, WorldBuilder};
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};

const GNOMES: i32 = 100;
const WIDTH: usize = 204;
const HEIGHT: usize = 40;

/// Flat colony with every gnome on the surface and a 200x10 block of dirt
/// under it designated for digging.
fn colony() -> SimWorld {
    let mut builder = WorldBuilder::flat(WIDTH, HEIGHT);
    let surface = (HEIGHT / 2) as i32;
    for i in 0..GNOMES {
        builder = builder.gnome(TileCoord::new(2 + 2 * i, surface - 1));
    }
    let mut sim = match builder.build() {
        Ok(sim) => sim,
        Err(err) => panic!("bench world failed to build: {err}"),
    };

    let tiles: Vec<TileCoord> = (surface..surface + 10)
        .flat_map(|y| (1..=200).map(move |x| TileCoord::new(x, y)))
        .collect();
    let created = sim.apply(Command::Dig {
        tiles,
        priority: TaskPriority::Normal,
    });
    assert_eq!(created, 2000);
    sim
}

fn bench_colony_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("colony_tick");
    group.sample_size(20);

    // First tick is an assignment pass for every gnome at once.
    group.bench_function("assignment_pass", |b| {
        b.iter_batched(colony, |mut sim| {
            sim.tick();
            black_box(sim)
        }, BatchSize::LargeInput);
    });

    let mut sim = colony();
    group.bench_function("steady_state", |b| {
        b.iter(|| {
            sim.tick();
            black_box(sim.current_tick())
        });
    });

    group.finish();

    #[cfg(feature = "profile")]
    {
        burrow_sim::logging::init(false);
        sim.profiler().log_summary();
    }
}

criterion_group!(benches, bench_colony_tick);
criterion_main!(benches);
