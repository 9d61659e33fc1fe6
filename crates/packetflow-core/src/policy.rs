//! Pluggable policies used by the tick scheduler.
//!
//! - [`TrafficPolicy`] decides each node's generation rate per tick.
//! - [`DestinationPolicy`] decides where each node sends its backlog.
//!
//! Both are trait objects owned by the [`Simulation`](crate::engine::Simulation)
//! so tests can swap in deterministic implementations.

use crate::fixed::{Fixed64, Ticks};
use crate::id::NodeId;
use crate::rng::SimRng;
use crate::topology::{NodeData, Topology};
use std::collections::HashMap;

// ---------------------------------------------------------------------------
// Traffic generation
// ---------------------------------------------------------------------------

/// Supplies the generation rate for a node at a given tick.
pub trait TrafficPolicy: Send {
    fn rate(&mut self, node: &NodeData, tick: Ticks) -> Fixed64;
}

impl<F> TrafficPolicy for F
where
    F: FnMut(&NodeData, Ticks) -> Fixed64 + Send,
{
    fn rate(&mut self, node: &NodeData, tick: Ticks) -> Fixed64 {
        self(node, tick)
    }
}

/// Fixed per-node rates keyed by node name. Nodes without an entry generate
/// nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateTable {
    rates: HashMap<String, Fixed64>,
}

impl RateTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with_rate(mut self, name: impl Into<String>, rate: Fixed64) -> Self {
        self.set(name, rate);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, rate: Fixed64) {
        self.rates.insert(name.into(), rate);
    }

    pub fn get(&self, name: &str) -> Option<Fixed64> {
        self.rates.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, Fixed64)> for RateTable {
    fn from_iter<I: IntoIterator<Item = (S, Fixed64)>>(iter: I) -> Self {
        Self {
            rates: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

impl TrafficPolicy for RateTable {
    fn rate(&mut self, node: &NodeData, _tick: Ticks) -> Fixed64 {
        self.get(&node.name).unwrap_or(Fixed64::ZERO)
    }
}

// ---------------------------------------------------------------------------
// Destination selection
// ---------------------------------------------------------------------------

/// Chooses a destination for `source` among `candidates` (every other node,
/// in insertion order). Returning `None` means the source sends nothing
/// this tick.
pub trait DestinationPolicy: Send {
    fn choose(
        &mut self,
        topology: &Topology,
        source: NodeId,
        candidates: &[NodeId],
    ) -> Option<NodeId>;
}

/// Uniform random choice among all other nodes. The production default.
#[derive(Debug, Clone)]
pub struct UniformRandom {
    rng: SimRng,
}

impl UniformRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: SimRng::new(seed),
        }
    }
}

impl DestinationPolicy for UniformRandom {
    fn choose(
        &mut self,
        _topology: &Topology,
        _source: NodeId,
        candidates: &[NodeId],
    ) -> Option<NodeId> {
        if candidates.is_empty() {
            return None;
        }
        Some(candidates[self.rng.below(candidates.len())])
    }
}

/// Explicit source → destination mapping by node name.
///
/// Sources without a mapping, or mapped to a node that is not a candidate
/// (itself, or an unknown name), send nothing.
#[derive(Debug, Clone, Default)]
pub struct FixedDestinations {
    targets: HashMap<String, String>,
}

impl FixedDestinations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn route(mut self, source: impl Into<String>, destination: impl Into<String>) -> Self {
        self.targets.insert(source.into(), destination.into());
        self
    }
}

impl DestinationPolicy for FixedDestinations {
    fn choose(
        &mut self,
        topology: &Topology,
        source: NodeId,
        candidates: &[NodeId],
    ) -> Option<NodeId> {
        let target = self.targets.get(topology.name(source))?;
        let target = topology.node_id(target)?;
        candidates.contains(&target).then_some(target)
    }
}
