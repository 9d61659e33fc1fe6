//! The tick scheduler: owns the topology and runs the per-tick pipeline.
//!
//! # Architecture
//!
//! A [`Simulation`] owns:
//! - A [`Topology`] (nodes with queues and rates, links with capacity and load)
//! - A [`TrafficPolicy`] (generation rate per node per tick)
//! - A [`DestinationPolicy`] (where each node sends this tick)
//! - An [`AllocationPolicy`] (how demand is charged against links)
//! - A [`SimState`] (tick counter)
//! - A [`SnapshotBus`] (subscribers plus the latest published snapshot)
//!
//! # Pipeline
//!
//! Each `step()` runs:
//! 1. **Generate** -- every node's rate is refreshed and added to its queue
//! 2. **Route** -- destinations are chosen for every node in insertion order,
//!    routes are resolved, then each source's queue is allocated along its
//!    route in that same order (earlier nodes win contested capacity)
//! 3. **Publish** -- an immutable snapshot goes to every subscriber
//! 4. **Reset** -- every link load returns to 0; queues carry over
//! 5. **Bookkeeping** -- tick counter advances
//!
//! With the `parallel` feature, route resolution in phase 2 runs on rayon.
//! Allocation stays serial, so results are identical either way.

use crate::allocate::{AllocationPolicy, allocate};
use crate::fixed::{Fixed64, Ticks};
use crate::id::{NodeId, SubscriptionId};
use crate::policy::{DestinationPolicy, TrafficPolicy};
use crate::publish::{SnapshotBus, Subscriber};
use crate::route::{Route, shortest_path};
use crate::sim::{SimState, StateHash, TickReport};
use crate::snapshot::{LinkSnapshot, NetworkSnapshot, NodeSnapshot, snapshot_links, snapshot_nodes};
use crate::topology::Topology;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

/// One simulation run: `new` → repeated `step` → drop.
pub struct Simulation {
    topology: Topology,
    traffic: Box<dyn TrafficPolicy>,
    destinations: Box<dyn DestinationPolicy>,
    allocation: AllocationPolicy,

    /// Simulation state (tick counter).
    pub sim_state: SimState,

    paused: bool,
    bus: SnapshotBus,
    last_state_hash: u64,
}

impl std::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation")
            .field("topology", &self.topology)
            .field("allocation", &self.allocation)
            .field("sim_state", &self.sim_state)
            .field("paused", &self.paused)
            .field("bus", &self.bus)
            .finish_non_exhaustive()
    }
}

impl Simulation {
    /// Create a simulation over `topology` with the default (per-hop)
    /// allocation policy.
    pub fn new(
        topology: Topology,
        traffic: impl TrafficPolicy + 'static,
        destinations: impl DestinationPolicy + 'static,
    ) -> Self {
        Self {
            topology,
            traffic: Box::new(traffic),
            destinations: Box::new(destinations),
            allocation: AllocationPolicy::default(),
            sim_state: SimState::new(),
            paused: false,
            bus: SnapshotBus::new(),
            last_state_hash: 0,
        }
    }

    /// Builder-style override of the allocation policy.
    pub fn with_allocation(mut self, policy: AllocationPolicy) -> Self {
        self.allocation = policy;
        self
    }

    // -----------------------------------------------------------------------
    // Policies
    // -----------------------------------------------------------------------

    pub fn set_traffic_policy(&mut self, traffic: impl TrafficPolicy + 'static) {
        self.traffic = Box::new(traffic);
    }

    pub fn set_destination_policy(&mut self, destinations: impl DestinationPolicy + 'static) {
        self.destinations = Box::new(destinations);
    }

    pub fn allocation_policy(&self) -> AllocationPolicy {
        self.allocation
    }

    // -----------------------------------------------------------------------
    // Topology access
    // -----------------------------------------------------------------------

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Mutable access between ticks (seeding queues in tests, operator tools).
    pub fn topology_mut(&mut self) -> &mut Topology {
        &mut self.topology
    }

    // -----------------------------------------------------------------------
    // Subscriptions and pull queries
    // -----------------------------------------------------------------------

    /// Register a subscriber for per-tick snapshots.
    pub fn subscribe(&mut self, subscriber: Subscriber) -> SubscriptionId {
        self.bus.subscribe(subscriber)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }

    /// The snapshot published by the most recent tick.
    pub fn latest_snapshot(&self) -> Option<&Arc<NetworkSnapshot>> {
        self.bus.latest()
    }

    /// Capture the current state (after reset, loads are 0).
    pub fn snapshot(&self) -> NetworkSnapshot {
        NetworkSnapshot::capture(&self.topology, self.sim_state.tick)
    }

    /// Current node set in insertion order.
    pub fn nodes(&self) -> Vec<NodeSnapshot> {
        snapshot_nodes(&self.topology)
    }

    /// Current link set in insertion order.
    pub fn links(&self) -> Vec<LinkSnapshot> {
        snapshot_links(&self.topology)
    }

    // -----------------------------------------------------------------------
    // Pause / Resume
    // -----------------------------------------------------------------------

    /// Pause the simulation. While paused, `step()` is a no-op.
    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Number of completed ticks.
    pub fn tick(&self) -> Ticks {
        self.sim_state.tick
    }

    /// Hash of queues, rates and loads as published by the most recent tick.
    pub fn state_hash(&self) -> u64 {
        self.last_state_hash
    }

    // -----------------------------------------------------------------------
    // Step
    // -----------------------------------------------------------------------

    /// Run one tick. Returns an empty report when paused.
    pub fn step(&mut self) -> TickReport {
        if self.paused {
            return TickReport::default();
        }

        let tick = self.sim_state.tick + 1;
        let mut report = TickReport {
            tick,
            ..TickReport::default()
        };

        self.phase_generate(tick, &mut report);
        self.phase_route(&mut report);
        report.backlog = self.topology.total_backlog();
        self.phase_publish(tick);
        self.phase_reset();
        self.phase_bookkeeping(tick);

        tracing::debug!(
            tick,
            routed = report.routed,
            unreachable = report.unreachable,
            drained = %report.drained,
            backlog = %report.backlog,
            "tick complete"
        );
        report
    }

    // -----------------------------------------------------------------------
    // Phase 1: Generate
    // -----------------------------------------------------------------------

    fn phase_generate(&mut self, tick: Ticks, report: &mut TickReport) {
        for i in 0..self.topology.node_ids().len() {
            let id = self.topology.node_ids()[i];
            let Some(node) = self.topology.node(id) else {
                continue;
            };
            let rate = self.traffic.rate(node, tick).max(Fixed64::ZERO);
            self.topology.set_rate(id, rate);
            self.topology.enqueue(id, rate);
            report.generated = report.generated.saturating_add(rate);
        }
    }

    // -----------------------------------------------------------------------
    // Phase 2: Route + allocate
    // -----------------------------------------------------------------------

    fn phase_route(&mut self, report: &mut TickReport) {
        let choices = self.choose_destinations();
        let routes = self.resolve_routes(&choices);

        for (&(source, destination), route) in choices.iter().zip(routes) {
            let Some(destination) = destination else {
                report.skipped += 1;
                continue;
            };
            let Some(route) = route else {
                report.unreachable += 1;
                tracing::trace!(
                    source = self.topology.name(source),
                    destination = self.topology.name(destination),
                    "destination unreachable"
                );
                continue;
            };

            let demand = self.topology.queue(source);
            let outcome = allocate(&mut self.topology, &route, demand, self.allocation);
            report.routed += 1;
            report.drained = report.drained.saturating_add(outcome.drained);
            report.delivered = report.delivered.saturating_add(outcome.delivered);
            tracing::trace!(
                source = self.topology.name(source),
                destination = self.topology.name(destination),
                hops = route.hop_count(),
                drained = %outcome.drained,
                "allocated"
            );
        }
    }

    /// Pick a destination for every node, in insertion order.
    fn choose_destinations(&mut self) -> Vec<(NodeId, Option<NodeId>)> {
        let order = self.topology.node_ids();
        let mut candidates: Vec<NodeId> = Vec::with_capacity(order.len());
        let mut choices = Vec::with_capacity(order.len());

        for &source in order {
            candidates.clear();
            candidates.extend(order.iter().copied().filter(|&n| n != source));
            let destination = self
                .destinations
                .choose(&self.topology, source, &candidates);
            choices.push((source, destination));
        }
        choices
    }

    #[cfg(not(feature = "parallel"))]
    fn resolve_routes(&self, choices: &[(NodeId, Option<NodeId>)]) -> Vec<Option<Route>> {
        choices
            .iter()
            .map(|&(source, destination)| {
                destination.and_then(|d| shortest_path(&self.topology, source, d))
            })
            .collect()
    }

    #[cfg(feature = "parallel")]
    fn resolve_routes(&self, choices: &[(NodeId, Option<NodeId>)]) -> Vec<Option<Route>> {
        use rayon::prelude::*;

        let topology = &self.topology;
        choices
            .par_iter()
            .map(|&(source, destination)| {
                destination.and_then(|d| shortest_path(topology, source, d))
            })
            .collect()
    }

    // -----------------------------------------------------------------------
    // Phase 3: Publish
    // -----------------------------------------------------------------------

    fn phase_publish(&mut self, tick: Ticks) {
        self.last_state_hash = self.compute_state_hash(tick);
        let snapshot = Arc::new(NetworkSnapshot::capture(&self.topology, tick));
        self.bus.publish(snapshot);
    }

    // -----------------------------------------------------------------------
    // Phase 4: Reset
    // -----------------------------------------------------------------------

    fn phase_reset(&mut self) {
        self.topology.reset_loads();
    }

    // -----------------------------------------------------------------------
    // Phase 5: Bookkeeping
    // -----------------------------------------------------------------------

    fn phase_bookkeeping(&mut self, tick: Ticks) {
        self.sim_state.tick = tick;
    }

    /// Hash queues, rates and link loads in insertion order.
    fn compute_state_hash(&self, tick: Ticks) -> u64 {
        let mut hasher = StateHash::new();
        hasher.write_u64(tick);
        for (_, node) in self.topology.nodes() {
            hasher.write_fixed64(node.queue);
            hasher.write_fixed64(node.rate);
        }
        for (_, link) in self.topology.links() {
            hasher.write_fixed64(link.load);
        }
        hasher.finish()
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{FixedDestinations, RateTable, UniformRandom};
    use crate::publish::Delivery;
    use crate::test_utils::*;
    use std::sync::Mutex;

    /// A–B (10), B–C (5), A generates 20/tick and always targets C.
    fn chain_sim() -> Simulation {
        Simulation::new(
            chain(&[("A", "B", 10.0), ("B", "C", 5.0)]),
            RateTable::new().with_rate("A", fixed(20.0)),
            FixedDestinations::new().route("A", "C"),
        )
    }

    #[test]
    fn single_tick_chain_scenario() {
        let mut sim = chain_sim();
        let report = sim.step();

        let snap = sim.latest_snapshot().unwrap();
        assert_eq!(snap.tick, 1);
        assert_eq!(snap.node("A").unwrap().queue, 5.0);
        assert_eq!(snap.node("A").unwrap().rate, 20.0);
        assert_eq!(snap.link("A", "B").unwrap().load, 10.0);
        assert_eq!(snap.link("B", "C").unwrap().load, 5.0);

        assert_eq!(report.tick, 1);
        assert_eq!(report.generated, fixed(20.0));
        assert_eq!(report.drained, fixed(15.0));
        assert_eq!(report.delivered, fixed(5.0));
        assert_eq!(report.routed, 1);
        // B and C have no mapping.
        assert_eq!(report.skipped, 2);
    }

    #[test]
    fn loads_reset_after_publish_but_queues_persist() {
        let mut sim = chain_sim();
        sim.step();
        assert!(sim.topology().links().all(|(_, l)| l.load == Fixed64::ZERO));
        let a = sim.topology().node_id("A").unwrap();
        assert_eq!(sim.topology().queue(a), fixed(5.0));

        // Second tick: 5 + 20 = 25 → 10 on A-B, 5 on B-C → 10 left.
        sim.step();
        assert_eq!(sim.topology().queue(a), fixed(10.0));
        assert_eq!(sim.tick(), 2);
    }

    #[test]
    fn unreachable_destination_accumulates_backlog() {
        let topology = network(&["A", "B", "Z"], &[("A", "B", 10.0)]);
        let mut sim = Simulation::new(
            topology,
            RateTable::new().with_rate("Z", fixed(7.0)),
            FixedDestinations::new().route("Z", "A"),
        );

        for tick in 1..=3 {
            let report = sim.step();
            assert_eq!(report.unreachable, 1);
            let snap = sim.latest_snapshot().unwrap();
            assert_eq!(snap.node("Z").unwrap().queue, 7.0 * tick as f64);
            assert!(snap.links.iter().all(|l| l.load == 0.0));
        }
    }

    #[test]
    fn zero_capacity_hop_passes_nothing() {
        let mut sim = Simulation::new(
            chain(&[("A", "B", 0.0), ("B", "C", 5.0)]),
            RateTable::new().with_rate("A", fixed(20.0)),
            FixedDestinations::new().route("A", "C"),
        );
        sim.step();
        let snap = sim.latest_snapshot().unwrap();
        assert_eq!(snap.link("A", "B").unwrap().load, 0.0);
        // Per-hop model: the second hop still draws from A.
        assert_eq!(snap.link("B", "C").unwrap().load, 5.0);
        assert_eq!(snap.node("A").unwrap().queue, 15.0);
    }

    #[test]
    fn conserving_policy_drains_once() {
        let mut sim = chain_sim().with_allocation(AllocationPolicy::Conserving);
        sim.step();
        let snap = sim.latest_snapshot().unwrap();
        assert_eq!(snap.node("A").unwrap().queue, 15.0);
        assert_eq!(snap.link("A", "B").unwrap().load, 5.0);
        assert_eq!(snap.link("B", "C").unwrap().load, 5.0);
    }

    #[test]
    fn earlier_nodes_win_contested_capacity() {
        // A and B send to each other over one link of capacity 5.
        let mut sim = Simulation::new(
            network(&["A", "B"], &[("A", "B", 5.0)]),
            RateTable::new()
                .with_rate("A", fixed(4.0))
                .with_rate("B", fixed(4.0)),
            FixedDestinations::new().route("A", "B").route("B", "A"),
        );
        sim.step();
        let snap = sim.latest_snapshot().unwrap();
        assert_eq!(snap.link("A", "B").unwrap().load, 5.0);
        assert_eq!(snap.node("A").unwrap().queue, 0.0);
        assert_eq!(snap.node("B").unwrap().queue, 3.0);
    }

    #[test]
    fn first_hop_bounds_the_rest_of_the_route() {
        let mut sim = Simulation::new(
            chain(&[("A", "B", 10.0), ("B", "C", 5.0)]),
            RateTable::new()
                .with_rate("A", fixed(4.0))
                .with_rate("B", fixed(4.0)),
            FixedDestinations::new().route("A", "C").route("B", "C"),
        );
        sim.step();
        let snap = sim.latest_snapshot().unwrap();
        // A's whole demand crosses A-B, leaving nothing for B-C.
        // B then sends its own 4 on B-C.
        assert_eq!(snap.link("A", "B").unwrap().load, 4.0);
        assert_eq!(snap.link("B", "C").unwrap().load, 4.0);
        assert_eq!(snap.node("A").unwrap().queue, 0.0);
        assert_eq!(snap.node("B").unwrap().queue, 0.0);
    }

    #[test]
    fn identical_runs_are_deterministic() {
        let build = || {
            Simulation::new(
                reference_topology(),
                reference_rates(),
                UniformRandom::new(1234),
            )
        };
        let mut a = build();
        let mut b = build();
        for _ in 0..25 {
            a.step();
            b.step();
            assert_eq!(a.latest_snapshot(), b.latest_snapshot());
            assert_eq!(a.state_hash(), b.state_hash());
        }
    }

    #[test]
    fn subscribers_receive_each_tick() {
        let mut sim = chain_sim();
        let ticks = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&ticks);
        let id = sim.subscribe(Box::new(move |snap| {
            sink.lock().unwrap().push(snap.tick);
            Delivery::Delivered
        }));

        sim.step();
        sim.step();
        assert!(sim.unsubscribe(id));
        sim.step();

        assert_eq!(*ticks.lock().unwrap(), [1, 2]);
    }

    #[test]
    fn published_snapshot_carries_loads_before_reset() {
        let mut sim = chain_sim();
        let seen = Arc::new(Mutex::new(0.0));
        let sink = Arc::clone(&seen);
        sim.subscribe(Box::new(move |snap| {
            *sink.lock().unwrap() = snap.link("A", "B").map(|l| l.load).unwrap_or(0.0);
            Delivery::Delivered
        }));
        sim.step();
        assert_eq!(*seen.lock().unwrap(), 10.0);
        // Pull query after the tick sees the reset state.
        assert!(sim.links().iter().all(|l| l.load == 0.0));
    }

    #[test]
    fn paused_simulation_does_not_advance() {
        let mut sim = chain_sim();
        sim.pause();
        assert!(sim.is_paused());
        let report = sim.step();
        assert!(!report.ran());
        assert_eq!(sim.tick(), 0);
        assert!(sim.latest_snapshot().is_none());

        sim.resume();
        assert!(sim.step().ran());
        assert_eq!(sim.tick(), 1);
    }

    #[test]
    fn single_node_topology_skips_routing() {
        let mut sim = Simulation::new(
            network(&["solo"], &[]),
            RateTable::new().with_rate("solo", fixed(3.0)),
            UniformRandom::new(1),
        );
        let report = sim.step();
        assert_eq!(report.skipped, 1);
        assert_eq!(sim.nodes()[0].queue, 3.0);
    }

    #[test]
    fn traffic_policy_sees_tick_number() {
        let mut sim = chain_sim();
        sim.set_traffic_policy(|node: &crate::topology::NodeData, tick: Ticks| {
            if node.name == "A" { Fixed64::from_num(tick) } else { Fixed64::ZERO }
        });
        sim.step();
        sim.step();
        assert_eq!(sim.latest_snapshot().unwrap().node("A").unwrap().rate, 2.0);
    }

    #[test]
    fn negative_rates_are_clamped() {
        let mut sim = chain_sim();
        sim.set_traffic_policy(|_: &crate::topology::NodeData, _: Ticks| Fixed64::from_num(-5));
        let report = sim.step();
        assert_eq!(report.generated, Fixed64::ZERO);
        assert!(sim.nodes().iter().all(|n| n.queue == 0.0 && n.rate == 0.0));
    }

    #[test]
    fn snapshot_before_first_tick_is_initial_state() {
        let sim = chain_sim();
        let snap = sim.snapshot();
        assert_eq!(snap.tick, 0);
        assert_eq!(snap.nodes.len(), 3);
        assert_eq!(snap.links.len(), 2);
    }
}
