//! Validation of a [`NetworkConfig`] and construction of a [`Simulation`].
//!
//! Every check here runs once at startup. Anything that fails is fatal to
//! the run; nothing is repaired silently.

use packetflow_core::engine::Simulation;
use packetflow_core::fixed::{FIXED64_LIMIT, f64_to_fixed64};
use packetflow_core::policy::{RateTable, UniformRandom};
use packetflow_core::topology::{Topology, TopologyBuilder, TopologyError};
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::loader::{DataLoadError, deserialize_file};
use crate::schema::NetworkConfig;

/// Errors from loading or validating a network configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Load(#[from] DataLoadError),

    #[error("invalid topology: {0}")]
    Topology(#[from] TopologyError),

    #[error("network has no nodes")]
    NoNodes,

    #[error("link {from}-{to} has invalid capacity {value}")]
    InvalidCapacity { from: String, to: String, value: f64 },

    #[error("node '{node}' has invalid rate {value}")]
    InvalidRate { node: String, value: f64 },

    #[error("{what} value {value} exceeds the fixed-point maximum {}", FIXED64_LIMIT)]
    OutOfRange { what: String, value: f64 },

    #[error("rate given for unknown node '{0}'")]
    UnknownRateNode(String),

    #[error("tick interval must be at least 1 ms")]
    ZeroTickInterval,
}

/// Read and validate a configuration file (RON, TOML or JSON by extension).
pub fn load_network(path: &Path) -> Result<NetworkConfig, ConfigError> {
    let config: NetworkConfig = deserialize_file(path)?;
    config.validate()?;
    tracing::debug!(
        path = %path.display(),
        nodes = config.nodes.len(),
        links = config.links.len(),
        "loaded network config"
    );
    Ok(config)
}

impl NetworkConfig {
    /// Check everything that does not need a built topology, then build one
    /// to check the rest.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.build_topology()?;
        self.rate_table()?;
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::ZeroTickInterval);
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// The configured seed, or one derived from the clock.
    pub fn seed_or_clock(&self) -> u64 {
        self.seed.unwrap_or_else(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_nanos() as u64)
                .unwrap_or(0)
        })
    }

    /// Build the topology. Queues, rates and loads start at 0.
    pub fn build_topology(&self) -> Result<Topology, ConfigError> {
        if self.nodes.is_empty() {
            return Err(ConfigError::NoNodes);
        }

        let mut builder = TopologyBuilder::new();
        for node in &self.nodes {
            builder.add_node(node.id.as_str());
        }
        for link in &self.links {
            if !link.capacity.is_finite() || link.capacity < 0.0 {
                return Err(ConfigError::InvalidCapacity {
                    from: link.from.clone(),
                    to: link.to.clone(),
                    value: link.capacity,
                });
            }
            if link.capacity >= FIXED64_LIMIT {
                return Err(ConfigError::OutOfRange {
                    what: format!("capacity of link {}-{}", link.from, link.to),
                    value: link.capacity,
                });
            }
            builder.add_link(
                link.from.as_str(),
                link.to.as_str(),
                f64_to_fixed64(link.capacity),
            );
        }
        Ok(builder.build()?)
    }

    /// Fixed-point rate table. Every entry must name a declared node.
    pub fn rate_table(&self) -> Result<RateTable, ConfigError> {
        let mut table = RateTable::new();
        for (name, &value) in &self.rates {
            if !self.nodes.iter().any(|n| &n.id == name) {
                return Err(ConfigError::UnknownRateNode(name.clone()));
            }
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidRate {
                    node: name.clone(),
                    value,
                });
            }
            if value >= FIXED64_LIMIT {
                return Err(ConfigError::OutOfRange {
                    what: format!("rate of node '{name}'"),
                    value,
                });
            }
            table.set(name.as_str(), f64_to_fixed64(value));
        }
        Ok(table)
    }

    /// Build a ready-to-run simulation with uniform random destinations.
    pub fn build_simulation(&self, seed: u64) -> Result<Simulation, ConfigError> {
        let topology = self.build_topology()?;
        let rates = self.rate_table()?;
        Ok(Simulation::new(topology, rates, UniformRandom::new(seed)).with_allocation(self.allocation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{Format, deserialize_str};
    use crate::schema::{LinkConfig, NodeConfig};
    use packetflow_core::allocate::AllocationPolicy;
    use packetflow_core::test_utils::fixed;

    fn parse(content: &str, format: Format) -> NetworkConfig {
        deserialize_str(content, format, Path::new("<test>")).unwrap()
    }

    #[test]
    fn reference_config_is_valid() {
        let config = NetworkConfig::reference();
        config.validate().unwrap();
        let topology = config.build_topology().unwrap();
        assert_eq!(topology.node_count(), 5);
        assert_eq!(topology.link_count(), 6);
        let rates = config.rate_table().unwrap();
        assert_eq!(rates.get("E"), Some(fixed(60.0)));
    }

    #[test]
    fn shipped_reference_file_matches_builtin() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("data/reference.toml");
        let loaded = load_network(&path).unwrap();
        assert_eq!(loaded, NetworkConfig::reference());
    }

    #[test]
    fn toml_with_defaults() {
        let config = parse(
            r#"
            [[nodes]]
            id = "A"
            [[nodes]]
            id = "B"
            [[links]]
            from = "A"
            to = "B"
            capacity = 10
            "#,
            Format::Toml,
        );
        assert_eq!(config.tick_interval_ms, 1000);
        assert_eq!(config.seed, None);
        assert_eq!(config.allocation, AllocationPolicy::PerHop);
        assert!(config.rates.is_empty());
        config.validate().unwrap();
    }

    #[test]
    fn ron_and_json_are_equivalent() {
        let ron = parse(
            r#"(
                tick_interval_ms: 250,
                seed: Some(7),
                allocation: conserving,
                nodes: [(id: "A"), (id: "B")],
                links: [(from: "A", to: "B", capacity: 5.0)],
                rates: {"A": 2.5},
            )"#,
            Format::Ron,
        );
        let json = parse(
            r#"{
                "tick_interval_ms": 250,
                "seed": 7,
                "allocation": "conserving",
                "nodes": [{"id": "A"}, {"id": "B"}],
                "links": [{"from": "A", "to": "B", "capacity": 5}],
                "rates": {"A": 2.5}
            }"#,
            Format::Json,
        );
        assert_eq!(ron, json);
        assert_eq!(ron.tick_interval(), Duration::from_millis(250));
        assert_eq!(ron.seed_or_clock(), 7);
    }

    #[test]
    fn unknown_link_endpoint_is_rejected() {
        let mut config = NetworkConfig::reference();
        config.links.push(LinkConfig {
            from: "A".into(),
            to: "Z".into(),
            capacity: 1.0,
        });
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Topology(TopologyError::UnknownNode { ref missing, .. }) if missing == "Z"
        ));
    }

    #[test]
    fn duplicate_link_is_rejected() {
        let mut config = NetworkConfig::reference();
        config.links.push(LinkConfig {
            from: "B".into(),
            to: "A".into(),
            capacity: 1.0,
        });
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Topology(TopologyError::DuplicateLink { .. }))
        ));
    }

    #[test]
    fn negative_or_nan_capacity_is_rejected() {
        for bad in [-1.0, f64::NAN, f64::INFINITY] {
            let mut config = NetworkConfig::reference();
            config.links[0].capacity = bad;
            assert!(matches!(
                config.validate(),
                Err(ConfigError::InvalidCapacity { .. })
            ));
        }
    }

    #[test]
    fn values_past_fixed_point_range_are_rejected() {
        let mut config = NetworkConfig::reference();
        config.links[0].capacity = 5e9;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { value, .. } if value == 5e9));
        assert!(err.to_string().contains("A-B"), "{err}");

        let mut config = NetworkConfig::reference();
        config.rates.insert("C".into(), FIXED64_LIMIT);
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { .. }));
        assert!(err.to_string().contains("'C'"), "{err}");

        // The largest whole value below the limit is still accepted.
        let mut config = NetworkConfig::reference();
        config.rates.insert("C".into(), FIXED64_LIMIT - 1.0);
        config.links[0].capacity = FIXED64_LIMIT - 1.0;
        config.validate().unwrap();
    }

    #[test]
    fn invalid_rates_are_rejected() {
        let mut config = NetworkConfig::reference();
        config.rates.insert("A".into(), -3.0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidRate { .. })
        ));

        let mut config = NetworkConfig::reference();
        config.rates.insert("Q".into(), 1.0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnknownRateNode(ref n)) if n == "Q"
        ));
    }

    #[test]
    fn empty_network_and_zero_interval_are_rejected() {
        let mut config = NetworkConfig::reference();
        config.nodes.clear();
        assert!(matches!(config.validate(), Err(ConfigError::NoNodes)));

        let mut config = NetworkConfig::reference();
        config.tick_interval_ms = 0;
        assert!(matches!(config.validate(), Err(ConfigError::ZeroTickInterval)));
    }

    #[test]
    fn duplicate_node_is_rejected() {
        let mut config = NetworkConfig::reference();
        config.nodes.push(NodeConfig { id: "C".into() });
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Topology(TopologyError::DuplicateNode(_)))
        ));
    }

    #[test]
    fn built_simulation_uses_configured_policy() {
        let mut config = NetworkConfig::reference();
        config.allocation = AllocationPolicy::Conserving;
        let mut sim = config.build_simulation(3).unwrap();
        assert_eq!(sim.allocation_policy(), AllocationPolicy::Conserving);
        let report = sim.step();
        assert_eq!(report.generated, fixed(200.0));
    }
}
