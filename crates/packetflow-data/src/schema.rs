//! Serde structs for the on-disk network configuration.
//!
//! Quantities are plain `f64` here; they are validated and converted to
//! fixed-point by [`crate::config`].

use packetflow_core::allocate::AllocationPolicy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

fn default_tick_interval_ms() -> u64 {
    1000
}

/// A complete network definition plus run settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Wall-clock period between ticks when driven by the server.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Seed for random destination choice. `None` seeds from the clock.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    #[serde(default)]
    pub allocation: AllocationPolicy,

    pub nodes: Vec<NodeConfig>,

    #[serde(default)]
    pub links: Vec<LinkConfig>,

    /// Generation rate per node name. Nodes without an entry generate nothing.
    #[serde(default)]
    pub rates: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkConfig {
    pub from: String,
    pub to: String,
    pub capacity: f64,
}

impl NetworkConfig {
    /// The five-node reference network: A through E, six links.
    pub fn reference() -> Self {
        let link = |from: &str, to: &str, capacity: f64| LinkConfig {
            from: from.to_string(),
            to: to.to_string(),
            capacity,
        };
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            seed: None,
            allocation: AllocationPolicy::PerHop,
            nodes: ["A", "B", "C", "D", "E"]
                .into_iter()
                .map(|id| NodeConfig { id: id.to_string() })
                .collect(),
            links: vec![
                link("A", "B", 100.0),
                link("A", "C", 80.0),
                link("B", "C", 70.0),
                link("C", "D", 90.0),
                link("C", "E", 100.0),
                link("D", "E", 60.0),
            ],
            rates: [("A", 50.0), ("B", 30.0), ("C", 40.0), ("D", 20.0), ("E", 60.0)]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        }
    }
}
