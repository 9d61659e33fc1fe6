//! Flow Allocator: turns a route and a demand into link load.
//!
//! # Per-hop independent clamping
//!
//! The default [`AllocationPolicy::PerHop`] walks the route hop by hop and,
//! at each hop, sends `min(remaining demand, source queue, residual
//! capacity)`. Whatever is sent is added to that hop's link load and drained
//! from the **source** node's queue, again at every hop. Traffic is not
//! conserved across hops: a route A-B-C with A-B at capacity 10 and B-C at
//! capacity 5 drains 10 + 5 from A. The source's backlog is the ceiling for
//! everything it injects this tick and each link constrains only itself.
//!
//! [`AllocationPolicy::Conserving`] is the alternative: the bottleneck
//! amount is pushed across every hop and drained from the source once.

use crate::fixed::Fixed64;
use crate::id::LinkId;
use crate::route::Route;
use crate::topology::Topology;

/// How demand is charged against the links of a route.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationPolicy {
    /// Each hop is clamped independently and drains the source queue again.
    #[default]
    PerHop,
    /// One bottleneck amount crosses every hop and is drained once.
    Conserving,
}

/// Load placed on a single hop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HopAllocation {
    pub link: LinkId,
    pub sent: Fixed64,
}

/// Outcome of one [`allocate`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Allocation {
    /// Total removed from the source node's queue.
    pub drained: Fixed64,
    /// Amount pushed across the final hop. Zero for a single-node route.
    pub delivered: Fixed64,
    /// One entry per hop whose link was found, in route order.
    pub hops: Vec<HopAllocation>,
}

/// Push `demand` from the route's source along its links.
///
/// Hops whose link is missing are skipped. A non-positive demand, an empty
/// source queue or a saturated link all make the affected hops no-ops.
pub fn allocate(
    topology: &mut Topology,
    route: &Route,
    demand: Fixed64,
    policy: AllocationPolicy,
) -> Allocation {
    match policy {
        AllocationPolicy::PerHop => allocate_per_hop(topology, route, demand),
        AllocationPolicy::Conserving => allocate_conserving(topology, route, demand),
    }
}

fn allocate_per_hop(topology: &mut Topology, route: &Route, demand: Fixed64) -> Allocation {
    let source = route.source();
    let mut remaining = demand.max(Fixed64::ZERO);
    let mut result = Allocation::default();

    for (u, v) in route.hops() {
        let Some(link) = topology.link_between(u, v) else {
            tracing::warn!(from = topology.name(u), to = topology.name(v), "no link for hop, skipping");
            continue;
        };

        let sendable = remaining
            .min(topology.queue(source))
            .min(topology.residual(link));
        let mut sent = Fixed64::ZERO;
        if sendable > Fixed64::ZERO {
            sent = topology.add_load(link, sendable);
            let drained = topology.drain_queue(source, sent);
            remaining -= drained;
            result.drained += drained;
        }
        result.hops.push(HopAllocation { link, sent });
    }

    result.delivered = last_hop_sent(route, &result);
    result
}

fn allocate_conserving(topology: &mut Topology, route: &Route, demand: Fixed64) -> Allocation {
    let source = route.source();
    let links: Vec<LinkId> = route
        .hops()
        .filter_map(|(u, v)| topology.link_between(u, v))
        .collect();

    let bottleneck = links
        .iter()
        .map(|&l| topology.residual(l))
        .fold(demand.min(topology.queue(source)), |acc, r| acc.min(r))
        .max(Fixed64::ZERO);

    let mut result = Allocation::default();
    for &link in &links {
        let sent = topology.add_load(link, bottleneck);
        result.hops.push(HopAllocation { link, sent });
    }
    if !links.is_empty() {
        result.drained = topology.drain_queue(source, bottleneck);
    }
    result.delivered = last_hop_sent(route, &result);
    result
}

fn last_hop_sent(route: &Route, result: &Allocation) -> Fixed64 {
    if route.hop_count() == 0 || result.hops.len() < route.hop_count() {
        // Single-node route, or the final hop had no link.
        return Fixed64::ZERO;
    }
    result.hops.last().map(|h| h.sent).unwrap_or(Fixed64::ZERO)
}
