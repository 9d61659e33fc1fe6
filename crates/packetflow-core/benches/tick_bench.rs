//! Criterion benchmarks for the PacketFlow tick pipeline.
//!
//! Three benchmark groups:
//! - `reference`: the five-node reference network
//! - `grid`: 20x20 and 50x50 grids with uniform traffic
//! - `routing`: BFS alone across the 50x50 grid

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use packetflow_core::engine::Simulation;
use packetflow_core::policy::UniformRandom;
use packetflow_core::route::shortest_path;
use packetflow_core::test_utils::*;

fn grid_simulation(side: usize) -> Simulation {
    let topology = grid(side, side, 50.0);
    let rates = uniform_rates(&topology, 10.0);
    Simulation::new(topology, rates, UniformRandom::new(42))
}

fn bench_reference(c: &mut Criterion) {
    let mut group = c.benchmark_group("reference");

    let mut sim = reference_simulation(42);

    group.bench_function("5_nodes_6_links", |b| {
        b.iter(|| {
            sim.step();
        });
    });

    group.finish();
}

fn bench_grid(c: &mut Criterion) {
    let mut group = c.benchmark_group("grid");
    group.sample_size(30);

    let mut small = grid_simulation(20);
    group.bench_function("400_nodes", |b| {
        b.iter(|| {
            small.step();
        });
    });

    let mut large = grid_simulation(50);
    group.bench_function("2500_nodes", |b| {
        b.iter(|| {
            large.step();
        });
    });

    group.finish();
}

fn bench_routing(c: &mut Criterion) {
    let mut group = c.benchmark_group("routing");

    let topology = grid(50, 50, 50.0);
    let (Some(corner), Some(opposite)) = (topology.node_id("n0_0"), topology.node_id("n49_49"))
    else {
        return;
    };

    group.bench_function("corner_to_corner_50x50", |b| {
        b.iter(|| black_box(shortest_path(&topology, corner, opposite)));
    });

    group.finish();
}

criterion_group!(benches, bench_reference, bench_grid, bench_routing);
criterion_main!(benches);
