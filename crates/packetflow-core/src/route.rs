//! Path Resolver: fewest-hop routes over the undirected topology.
//!
//! Breadth-first search from the source, expanding neighbors in link
//! insertion order, with parent pointers stored in a `SecondaryMap`. The
//! first time the destination is reached the parent chain is a minimum-hop
//! path; ties between equal-length paths go to the neighbor whose link was
//! declared first.

use crate::id::NodeId;
use crate::topology::Topology;
use slotmap::SecondaryMap;
use std::collections::VecDeque;

/// Errors from name-based route lookups.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    #[error("unknown node '{0}'")]
    UnknownNode(String),
}

/// An ordered sequence of nodes from source to destination, inclusive.
/// Always holds at least one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    nodes: Vec<NodeId>,
}

impl Route {
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    pub fn source(&self) -> NodeId {
        self.nodes[0]
    }

    pub fn destination(&self) -> NodeId {
        self.nodes[self.nodes.len() - 1]
    }

    /// Number of links traversed. Zero for a single-node route.
    pub fn hop_count(&self) -> usize {
        self.nodes.len() - 1
    }

    /// Consecutive `(u, v)` pairs along the route.
    pub fn hops(&self) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
        self.nodes.windows(2).map(|w| (w[0], w[1]))
    }
}

/// Resolve a minimum-hop route from `source` to `destination`.
///
/// Returns `None` when the destination is unreachable or either id is not
/// in the topology. `source == destination` yields the single-node route.
pub fn shortest_path(topology: &Topology, source: NodeId, destination: NodeId) -> Option<Route> {
    if !topology.contains_node(source) || !topology.contains_node(destination) {
        return None;
    }
    if source == destination {
        return Some(Route {
            nodes: vec![source],
        });
    }

    let mut parent: SecondaryMap<NodeId, NodeId> = SecondaryMap::new();
    let mut queue: VecDeque<NodeId> = VecDeque::new();
    // The source is its own parent so it is never revisited.
    parent.insert(source, source);
    queue.push_back(source);

    while let Some(node) = queue.pop_front() {
        for next in topology.neighbors(node) {
            if parent.contains_key(next) {
                continue;
            }
            parent.insert(next, node);
            if next == destination {
                return Some(Route {
                    nodes: unwind(&parent, source, destination),
                });
            }
            queue.push_back(next);
        }
    }

    None
}

/// Name-based variant of [`shortest_path`].
pub fn shortest_path_by_name(
    topology: &Topology,
    source: &str,
    destination: &str,
) -> Result<Option<Route>, RouteError> {
    let from = topology
        .node_id(source)
        .ok_or_else(|| RouteError::UnknownNode(source.to_string()))?;
    let to = topology
        .node_id(destination)
        .ok_or_else(|| RouteError::UnknownNode(destination.to_string()))?;
    Ok(shortest_path(topology, from, to))
}

/// Walk parent pointers back from `destination` and reverse.
fn unwind(parent: &SecondaryMap<NodeId, NodeId>, source: NodeId, destination: NodeId) -> Vec<NodeId> {
    let mut nodes = vec![destination];
    let mut current = destination;
    while current != source {
        match parent.get(current) {
            Some(&prev) => {
                nodes.push(prev);
                current = prev;
            }
            None => break,
        }
    }
    nodes.reverse();
    nodes
}
