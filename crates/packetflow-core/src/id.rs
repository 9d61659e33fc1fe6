use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    /// Identifies a node (router/host) in the network topology.
    pub struct NodeId;

    /// Identifies a link between two nodes in the network topology.
    pub struct LinkId;
}

/// Handle returned by [`crate::publish::SnapshotBus::subscribe`]. Used to
/// unsubscribe later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(pub u64);

/// Unordered endpoint pair used to index links regardless of the direction
/// they were declared in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LinkKey(NodeId, NodeId);

impl LinkKey {
    /// Build the key for the pair `(a, b)`. `LinkKey::new(a, b) == LinkKey::new(b, a)`.
    pub fn new(a: NodeId, b: NodeId) -> Self {
        if a <= b { Self(a, b) } else { Self(b, a) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    #[test]
    fn link_key_is_unordered() {
        let mut sm = SlotMap::<NodeId, ()>::with_key();
        let a = sm.insert(());
        let b = sm.insert(());
        assert_eq!(LinkKey::new(a, b), LinkKey::new(b, a));
    }

    #[test]
    fn link_key_distinguishes_pairs() {
        let mut sm = SlotMap::<NodeId, ()>::with_key();
        let a = sm.insert(());
        let b = sm.insert(());
        let c = sm.insert(());
        assert_ne!(LinkKey::new(a, b), LinkKey::new(a, c));
    }

    #[test]
    fn subscription_ids_are_hashable() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(SubscriptionId(0), "ui");
        map.insert(SubscriptionId(1), "api");
        assert_eq!(map[&SubscriptionId(1)], "api");
    }
}
