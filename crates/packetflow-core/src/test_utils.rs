//! Shared test helpers for integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests, integration tests, and benchmarks (via the
//! `test-utils` feature).

use crate::engine::Simulation;
use crate::fixed::Fixed64;
use crate::policy::{RateTable, UniformRandom};
use crate::sim::TickReport;
use crate::topology::{Topology, TopologyBuilder};

// ===========================================================================
// Fixed-point helper
// ===========================================================================

pub fn fixed(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

// ===========================================================================
// Topology constructors
// ===========================================================================

/// Build a topology from explicit node names and `(from, to, capacity)` links.
///
/// Panics on invalid input; tests want to fail loudly.
pub fn network(nodes: &[&str], links: &[(&str, &str, f64)]) -> Topology {
    let mut b = TopologyBuilder::new();
    for &name in nodes {
        b.add_node(name);
    }
    for &(from, to, capacity) in links {
        b.add_link(from, to, fixed(capacity));
    }
    b.build().expect("test topology should be valid")
}

/// Build a topology from links alone. Nodes are added in order of first
/// appearance.
pub fn chain(links: &[(&str, &str, f64)]) -> Topology {
    let mut names: Vec<&str> = Vec::new();
    for &(from, to, _) in links {
        for name in [from, to] {
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }
    network(&names, links)
}

/// The five-node reference network (A–E).
pub fn reference_topology() -> Topology {
    network(
        &["A", "B", "C", "D", "E"],
        &[
            ("A", "B", 100.0),
            ("A", "C", 80.0),
            ("B", "C", 70.0),
            ("C", "D", 90.0),
            ("C", "E", 100.0),
            ("D", "E", 60.0),
        ],
    )
}

/// Fixed generation rates for the reference network.
pub fn reference_rates() -> RateTable {
    RateTable::new()
        .with_rate("A", fixed(50.0))
        .with_rate("B", fixed(30.0))
        .with_rate("C", fixed(40.0))
        .with_rate("D", fixed(20.0))
        .with_rate("E", fixed(60.0))
}

/// Reference network with reference rates and seeded uniform destinations.
pub fn reference_simulation(seed: u64) -> Simulation {
    Simulation::new(reference_topology(), reference_rates(), UniformRandom::new(seed))
}

/// `width` x `height` grid, names `n{row}_{col}`, uniform capacity.
pub fn grid(width: usize, height: usize, capacity: f64) -> Topology {
    let name = |r: usize, c: usize| format!("n{r}_{c}");
    let mut b = TopologyBuilder::new();
    for r in 0..height {
        for c in 0..width {
            b.add_node(name(r, c));
        }
    }
    for r in 0..height {
        for c in 0..width {
            if c + 1 < width {
                b.add_link(name(r, c), name(r, c + 1), fixed(capacity));
            }
            if r + 1 < height {
                b.add_link(name(r, c), name(r + 1, c), fixed(capacity));
            }
        }
    }
    b.build().expect("grid topology should be valid")
}

/// Uniform rate for every node in `topology`.
pub fn uniform_rates(topology: &Topology, rate: f64) -> RateTable {
    topology
        .nodes()
        .map(|(_, n)| (n.name.clone(), fixed(rate)))
        .collect()
}

// ===========================================================================
// Running and checking
// ===========================================================================

/// Step `n` times and return every report.
pub fn run_ticks(sim: &mut Simulation, n: usize) -> Vec<TickReport> {
    (0..n).map(|_| sim.step()).collect()
}

/// Assert the structural state invariants: queues non-negative, loads within
/// `[0, capacity]`.
pub fn assert_state_invariants(topology: &Topology) {
    for (_, node) in topology.nodes() {
        assert!(
            node.queue >= Fixed64::ZERO,
            "node {} has negative queue {}",
            node.name,
            node.queue
        );
    }
    for (_, link) in topology.links() {
        assert!(
            link.load >= Fixed64::ZERO && link.load <= link.capacity,
            "link {}-{} load {} outside [0, {}]",
            topology.name(link.from),
            topology.name(link.to),
            link.load,
            link.capacity
        );
    }
}
