//! PacketFlow Core -- a tick-based packet-switched network simulator.
//!
//! Nodes generate traffic into queues, pick a destination each tick, and
//! push their backlog along the fewest-hop route subject to link capacity.
//! Every tick ends with an immutable snapshot published to subscribers.
//!
//! # Tick Pipeline
//!
//! Each call to [`engine::Simulation::step`] runs:
//!
//! 1. **Generate** -- Refresh node rates from the traffic policy and enqueue.
//! 2. **Route** -- Choose destinations, resolve BFS routes, allocate load.
//! 3. **Publish** -- Hand a [`snapshot::NetworkSnapshot`] to every subscriber.
//! 4. **Reset** -- Zero every link load. Queues carry over.
//! 5. **Bookkeeping** -- Advance the tick counter.
//!
//! # Key Types
//!
//! - [`topology::Topology`] -- Nodes, undirected links and per-tick state.
//! - [`route::shortest_path`] -- Minimum-hop BFS with deterministic ties.
//! - [`allocate::allocate`] -- Per-hop (default) or conserving allocation.
//! - [`engine::Simulation`] -- Owns everything and runs the pipeline.
//! - [`publish::SnapshotBus`] -- Per-tick snapshot delivery.
//! - [`fixed::Fixed64`] -- Q32.32 fixed-point type for deterministic math.

pub mod allocate;
pub mod engine;
pub mod fixed;
pub mod id;
pub mod policy;
pub mod publish;
pub mod rng;
pub mod route;
pub mod sim;
pub mod snapshot;
pub mod topology;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
