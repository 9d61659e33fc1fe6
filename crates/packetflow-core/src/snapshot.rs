//! Read-only views of simulation state.
//!
//! Snapshot types are owned copies with no references into the topology, so
//! they can be shared across threads and serialized for the HTTP/WebSocket
//! layer. Quantities are converted to `f64` at this boundary and rounded to
//! [`WIRE_DECIMALS`] places, so a configured `0.1` reads back as `0.1` rather
//! than the nearest Q32.32 value. Field names follow the wire shape consumers
//! expect (`id`, `queue`, `rate`, `from`, `to`, `capacity`, `load`).

use crate::fixed::{Fixed64, Ticks, fixed64_to_f64};
use crate::topology::Topology;
use serde::{Deserialize, Serialize};

/// A single node as seen by observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub id: String,
    pub queue: f64,
    pub rate: f64,
}

/// A single link as seen by observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkSnapshot {
    pub from: String,
    pub to: String,
    pub capacity: f64,
    pub load: f64,
}

/// The full network state at the end of a tick's allocation phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSnapshot {
    /// Tick that produced this snapshot. 0 for the initial state.
    pub tick: Ticks,
    pub nodes: Vec<NodeSnapshot>,
    pub links: Vec<LinkSnapshot>,
}

impl NetworkSnapshot {
    /// Capture the current topology.
    pub fn capture(topology: &Topology, tick: Ticks) -> Self {
        Self {
            tick,
            nodes: snapshot_nodes(topology),
            links: snapshot_links(topology),
        }
    }

    /// Find a node by id.
    pub fn node(&self, id: &str) -> Option<&NodeSnapshot> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Find a link by its endpoints, in either order.
    pub fn link(&self, a: &str, b: &str) -> Option<&LinkSnapshot> {
        self.links
            .iter()
            .find(|l| (l.from == a && l.to == b) || (l.from == b && l.to == a))
    }
}

/// Decimal places kept in snapshot quantities.
pub const WIRE_DECIMALS: i32 = 6;

/// Fixed-point to wire value. Rounding is monotonic, so `load <= capacity`
/// and `queue >= 0` survive the conversion.
fn wire(v: Fixed64) -> f64 {
    let scale = 10f64.powi(WIRE_DECIMALS);
    (fixed64_to_f64(v) * scale).round() / scale
}

/// Current nodes in insertion order.
pub fn snapshot_nodes(topology: &Topology) -> Vec<NodeSnapshot> {
    topology
        .nodes()
        .map(|(_, n)| NodeSnapshot {
            id: n.name.clone(),
            queue: wire(n.queue),
            rate: wire(n.rate),
        })
        .collect()
}

/// Current links in insertion order.
pub fn snapshot_links(topology: &Topology) -> Vec<LinkSnapshot> {
    topology
        .links()
        .map(|(_, l)| LinkSnapshot {
            from: topology.name(l.from).to_string(),
            to: topology.name(l.to).to_string(),
            capacity: wire(l.capacity),
            load: wire(l.load),
        })
        .collect()
}
