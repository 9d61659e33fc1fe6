use crate::fixed::Fixed64;
use crate::id::*;
use slotmap::{SecondaryMap, SlotMap};
use std::collections::HashMap;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors detected while building a topology. All of them are fatal
/// configuration errors: a simulation never starts on an inconsistent graph.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TopologyError {
    #[error("node name must not be empty")]
    EmptyName,
    #[error("duplicate node '{0}'")]
    DuplicateNode(String),
    #[error("link {from}-{to} references unknown node '{missing}'")]
    UnknownNode {
        from: String,
        to: String,
        missing: String,
    },
    #[error("duplicate link between '{a}' and '{b}'")]
    DuplicateLink { a: String, b: String },
    #[error("link from '{0}' to itself")]
    SelfLoop(String),
    #[error("link {from}-{to} has negative capacity")]
    InvalidCapacity { from: String, to: String },
}

// ---------------------------------------------------------------------------
// Core data structures
// ---------------------------------------------------------------------------

/// Per-node state stored in the topology.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeData {
    /// Stable, unique identifier ("A", "core-1", ...).
    pub name: String,
    /// Backlog of undelivered traffic units. Never negative.
    pub queue: Fixed64,
    /// Generation rate applied during the most recent tick.
    pub rate: Fixed64,
}

/// Per-link state stored in the topology.
///
/// `from`/`to` only give the link its identity; traffic may cross it in
/// either direction.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkData {
    pub from: NodeId,
    pub to: NodeId,
    /// Maximum load per tick. Immutable for the run.
    pub capacity: Fixed64,
    /// Load carried during the current tick, `0 <= load <= capacity`.
    pub load: Fixed64,
}

impl LinkData {
    /// Capacity still available this tick.
    pub fn residual(&self) -> Fixed64 {
        (self.capacity - self.load).max(Fixed64::ZERO)
    }

    /// The endpoint opposite `node`, or `None` if `node` is not an endpoint.
    pub fn other_end(&self, node: NodeId) -> Option<NodeId> {
        if self.from == node {
            Some(self.to)
        } else if self.to == node {
            Some(self.from)
        } else {
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Collects node names and links, then validates them into a [`Topology`].
///
/// Names are resolved in [`build`](Self::build), so links may be declared
/// before the nodes they reference.
#[derive(Debug, Default)]
pub struct TopologyBuilder {
    nodes: Vec<String>,
    links: Vec<(String, String, Fixed64)>,
}

impl TopologyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node by name.
    pub fn add_node(&mut self, name: impl Into<String>) -> &mut Self {
        self.nodes.push(name.into());
        self
    }

    /// Register a link between two named nodes.
    pub fn add_link(
        &mut self,
        from: impl Into<String>,
        to: impl Into<String>,
        capacity: Fixed64,
    ) -> &mut Self {
        self.links.push((from.into(), to.into(), capacity));
        self
    }

    /// Validate and freeze the topology. Queues, rates and loads start at 0.
    ///
    /// # Examples
    ///
    /// ```
    /// use packetflow_core::fixed::Fixed64;
    /// use packetflow_core::topology::TopologyBuilder;
    ///
    /// let mut builder = TopologyBuilder::new();
    /// builder
    ///     .add_node("A")
    ///     .add_node("B")
    ///     .add_link("A", "B", Fixed64::from_num(10));
    /// let topology = builder.build().unwrap();
    /// let (a, b) = (topology.node_id("A").unwrap(), topology.node_id("B").unwrap());
    /// assert_eq!(topology.link_between(b, a), topology.link_between(a, b));
    /// ```
    pub fn build(self) -> Result<Topology, TopologyError> {
        let mut topology = Topology::empty();

        for name in self.nodes {
            if name.is_empty() {
                return Err(TopologyError::EmptyName);
            }
            if topology.names.contains_key(&name) {
                return Err(TopologyError::DuplicateNode(name));
            }
            let id = topology.nodes.insert(NodeData {
                name: name.clone(),
                queue: Fixed64::ZERO,
                rate: Fixed64::ZERO,
            });
            topology.adjacency.insert(id, Vec::new());
            topology.names.insert(name, id);
            topology.node_order.push(id);
        }

        for (from_name, to_name, capacity) in self.links {
            let resolve = |name: &str| {
                topology
                    .names
                    .get(name)
                    .copied()
                    .ok_or_else(|| TopologyError::UnknownNode {
                        from: from_name.clone(),
                        to: to_name.clone(),
                        missing: name.to_string(),
                    })
            };
            let from = resolve(&from_name)?;
            let to = resolve(&to_name)?;

            if from == to {
                return Err(TopologyError::SelfLoop(from_name));
            }
            if capacity < Fixed64::ZERO {
                return Err(TopologyError::InvalidCapacity {
                    from: from_name,
                    to: to_name,
                });
            }
            let key = LinkKey::new(from, to);
            if topology.pair_index.contains_key(&key) {
                return Err(TopologyError::DuplicateLink {
                    a: from_name,
                    b: to_name,
                });
            }

            let link = topology.links.insert(LinkData {
                from,
                to,
                capacity,
                load: Fixed64::ZERO,
            });
            topology.pair_index.insert(key, link);
            topology.link_order.push(link);
            if let Some(adj) = topology.adjacency.get_mut(from) {
                adj.push(link);
            }
            if let Some(adj) = topology.adjacency.get_mut(to) {
                adj.push(link);
            }
        }

        Ok(topology)
    }
}

// ---------------------------------------------------------------------------
// Topology
// ---------------------------------------------------------------------------

/// The authoritative set of nodes and links for one simulation run.
///
/// Structure is frozen at [`TopologyBuilder::build`]; only the per-tick
/// fields (`queue`, `rate`, `load`) change afterwards. Adjacency is stored in
/// a `SecondaryMap` keyed by `NodeId`, kept in sync with the primary node
/// `SlotMap`. Every mutator clamps so that `queue >= 0` and
/// `0 <= load <= capacity` hold at all times.
#[derive(Debug, Clone)]
pub struct Topology {
    nodes: SlotMap<NodeId, NodeData>,
    links: SlotMap<LinkId, LinkData>,
    /// Links incident to each node, in link insertion order.
    adjacency: SecondaryMap<NodeId, Vec<LinkId>>,
    names: HashMap<String, NodeId>,
    pair_index: HashMap<LinkKey, LinkId>,
    node_order: Vec<NodeId>,
    link_order: Vec<LinkId>,
}

impl Topology {
    fn empty() -> Self {
        Self {
            nodes: SlotMap::with_key(),
            links: SlotMap::with_key(),
            adjacency: SecondaryMap::new(),
            names: HashMap::new(),
            pair_index: HashMap::new(),
            node_order: Vec::new(),
            link_order: Vec::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Look up a node by its name.
    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        self.names.get(name).copied()
    }

    pub fn node(&self, node: NodeId) -> Option<&NodeData> {
        self.nodes.get(node)
    }

    pub fn link(&self, link: LinkId) -> Option<&LinkData> {
        self.links.get(link)
    }

    /// Name of a node, or `""` if the id is unknown.
    pub fn name(&self, node: NodeId) -> &str {
        self.nodes.get(node).map(|n| n.name.as_str()).unwrap_or("")
    }

    /// Find the link joining `a` and `b`, whichever direction it was declared in.
    pub fn link_between(&self, a: NodeId, b: NodeId) -> Option<LinkId> {
        self.pair_index.get(&LinkKey::new(a, b)).copied()
    }

    /// Nodes adjacent to `node`, in link insertion order.
    pub fn neighbors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.adjacency
            .get(node)
            .map(|adj| adj.as_slice())
            .unwrap_or(&[])
            .iter()
            .filter_map(move |&lid| self.links.get(lid).and_then(|l| l.other_end(node)))
    }

    /// Node ids in insertion order.
    pub fn node_ids(&self) -> &[NodeId] {
        &self.node_order
    }

    /// Link ids in insertion order.
    pub fn link_ids(&self) -> &[LinkId] {
        &self.link_order
    }

    /// Iterate over nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &NodeData)> {
        self.node_order
            .iter()
            .filter_map(|&id| self.nodes.get(id).map(|n| (id, n)))
    }

    /// Iterate over links in insertion order.
    pub fn links(&self) -> impl Iterator<Item = (LinkId, &LinkData)> {
        self.link_order
            .iter()
            .filter_map(|&id| self.links.get(id).map(|l| (id, l)))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub fn contains_node(&self, node: NodeId) -> bool {
        self.nodes.contains_key(node)
    }

    /// Current backlog of a node (zero for unknown ids).
    pub fn queue(&self, node: NodeId) -> Fixed64 {
        self.nodes.get(node).map(|n| n.queue).unwrap_or(Fixed64::ZERO)
    }

    /// Capacity left on a link this tick (zero for unknown ids).
    pub fn residual(&self, link: LinkId) -> Fixed64 {
        self.links.get(link).map(|l| l.residual()).unwrap_or(Fixed64::ZERO)
    }

    /// Sum of all node queues.
    pub fn total_backlog(&self) -> Fixed64 {
        self.nodes
            .values()
            .fold(Fixed64::ZERO, |acc, n| acc.saturating_add(n.queue))
    }

    // -----------------------------------------------------------------------
    // Mutation (clamping)
    // -----------------------------------------------------------------------

    /// Overwrite a node's backlog. Negative values clamp to 0.
    pub fn set_queue(&mut self, node: NodeId, queue: Fixed64) {
        if let Some(n) = self.nodes.get_mut(node) {
            n.queue = queue.max(Fixed64::ZERO);
        }
    }

    /// Overwrite a node's generation rate. Negative values clamp to 0.
    pub fn set_rate(&mut self, node: NodeId, rate: Fixed64) {
        if let Some(n) = self.nodes.get_mut(node) {
            n.rate = rate.max(Fixed64::ZERO);
        }
    }

    /// Add traffic to a node's queue (saturating). Returns the new backlog.
    ///
    /// Traffic past `Fixed64::MAX` is dropped. The first enqueue that hits
    /// the ceiling logs a warning; later ones at the ceiling stay quiet.
    pub fn enqueue(&mut self, node: NodeId, amount: Fixed64) -> Fixed64 {
        let Some(n) = self.nodes.get_mut(node) else {
            return Fixed64::ZERO;
        };
        let amount = amount.max(Fixed64::ZERO);
        n.queue = match n.queue.checked_add(amount) {
            Some(queue) => queue,
            None => {
                if n.queue < Fixed64::MAX {
                    tracing::warn!(
                        node = %n.name,
                        dropped = %(amount - (Fixed64::MAX - n.queue)),
                        "queue reached fixed-point ceiling, excess traffic dropped"
                    );
                }
                Fixed64::MAX
            }
        };
        n.queue
    }

    /// Remove up to `amount` from a node's queue. Returns what was removed,
    /// which is never more than the queue held.
    pub fn drain_queue(&mut self, node: NodeId, amount: Fixed64) -> Fixed64 {
        let Some(n) = self.nodes.get_mut(node) else {
            return Fixed64::ZERO;
        };
        let drained = amount.min(n.queue).max(Fixed64::ZERO);
        n.queue -= drained;
        drained
    }

    /// Add up to `amount` load to a link. Returns what was added, which is
    /// never more than the link's residual capacity.
    pub fn add_load(&mut self, link: LinkId, amount: Fixed64) -> Fixed64 {
        let Some(l) = self.links.get_mut(link) else {
            return Fixed64::ZERO;
        };
        let added = amount.min(l.residual()).max(Fixed64::ZERO);
        l.load += added;
        added
    }

    /// Overwrite a link's load, clamped to `[0, capacity]`.
    pub fn set_load(&mut self, link: LinkId, load: Fixed64) {
        if let Some(l) = self.links.get_mut(link) {
            l.load = load.clamp(Fixed64::ZERO, l.capacity.max(Fixed64::ZERO));
        }
    }

    /// Zero every link's load in preparation for the next tick.
    pub fn reset_loads(&mut self) {
        for (_, link) in &mut self.links {
            link.load = Fixed64::ZERO;
        }
    }
}
