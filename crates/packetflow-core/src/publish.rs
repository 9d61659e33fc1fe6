//! Snapshot subscription bus.
//!
//! The engine publishes one [`NetworkSnapshot`] per tick. Subscribers are
//! called in registration order with a shared `Arc` of the snapshot; they
//! must not block. A subscriber that reports [`Delivery::Closed`] is removed
//! and never called again. There is no acknowledgment and no retry.

use crate::id::SubscriptionId;
use crate::snapshot::NetworkSnapshot;
use std::sync::Arc;

/// What a subscriber reports after receiving a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Keep the subscription.
    Delivered,
    /// The receiving side is gone; drop the subscription.
    Closed,
}

/// A subscriber callback.
pub type Subscriber = Box<dyn FnMut(&Arc<NetworkSnapshot>) -> Delivery + Send>;

struct Entry {
    id: SubscriptionId,
    subscriber: Subscriber,
}

impl std::fmt::Debug for Entry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entry")
            .field("id", &self.id)
            .field("subscriber", &"<fn>")
            .finish()
    }
}

/// Holds the subscriber list and the most recently published snapshot.
#[derive(Debug, Default)]
pub struct SnapshotBus {
    entries: Vec<Entry>,
    next_id: u64,
    latest: Option<Arc<NetworkSnapshot>>,
    published: u64,
}

impl SnapshotBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber. Returns the id to pass to [`unsubscribe`](Self::unsubscribe).
    pub fn subscribe(&mut self, subscriber: Subscriber) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.entries.push(Entry { id, subscriber });
        id
    }

    /// Remove a subscriber. Returns `false` if it was not registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        self.entries.len() != before
    }

    /// Store `snapshot` as the latest and hand it to every subscriber.
    pub fn publish(&mut self, snapshot: Arc<NetworkSnapshot>) {
        self.entries.retain_mut(|entry| {
            let keep = (entry.subscriber)(&snapshot) == Delivery::Delivered;
            if !keep {
                tracing::debug!(subscription = entry.id.0, "subscriber closed, removing");
            }
            keep
        });
        self.latest = Some(snapshot);
        self.published += 1;
    }

    /// The most recently published snapshot, if any.
    pub fn latest(&self) -> Option<&Arc<NetworkSnapshot>> {
        self.latest.as_ref()
    }

    pub fn subscriber_count(&self) -> usize {
        self.entries.len()
    }

    /// Number of snapshots published so far.
    pub fn published_count(&self) -> u64 {
        self.published
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn snapshot(tick: u64) -> Arc<NetworkSnapshot> {
        Arc::new(NetworkSnapshot {
            tick,
            nodes: Vec::new(),
            links: Vec::new(),
        })
    }

    fn recorder(log: &Arc<Mutex<Vec<u64>>>) -> Subscriber {
        let log = Arc::clone(log);
        Box::new(move |snap| {
            log.lock().unwrap().push(snap.tick);
            Delivery::Delivered
        })
    }

    #[test]
    fn every_subscriber_receives_each_snapshot() {
        let mut bus = SnapshotBus::new();
        let first = Arc::new(Mutex::new(Vec::new()));
        let second = Arc::new(Mutex::new(Vec::new()));
        bus.subscribe(recorder(&first));
        bus.subscribe(recorder(&second));

        bus.publish(snapshot(1));
        bus.publish(snapshot(2));

        assert_eq!(*first.lock().unwrap(), [1, 2]);
        assert_eq!(*second.lock().unwrap(), [1, 2]);
        assert_eq!(bus.published_count(), 2);
        assert_eq!(bus.latest().unwrap().tick, 2);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let mut bus = SnapshotBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let id = bus.subscribe(recorder(&log));

        bus.publish(snapshot(1));
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.publish(snapshot(2));

        assert_eq!(*log.lock().unwrap(), [1]);
    }

    #[test]
    fn closed_subscriber_is_dropped() {
        let mut bus = SnapshotBus::new();
        let mut calls = 0;
        bus.subscribe(Box::new(move |_| {
            calls += 1;
            if calls >= 2 { Delivery::Closed } else { Delivery::Delivered }
        }));
        bus.publish(snapshot(1));
        assert_eq!(bus.subscriber_count(), 1);
        bus.publish(snapshot(2));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn publish_without_subscribers_still_records_latest() {
        let mut bus = SnapshotBus::new();
        assert!(bus.latest().is_none());
        bus.publish(snapshot(7));
        assert_eq!(bus.latest().unwrap().tick, 7);
    }

    #[test]
    fn subscription_ids_are_unique() {
        let mut bus = SnapshotBus::new();
        let a = bus.subscribe(Box::new(|_| Delivery::Delivered));
        let b = bus.subscribe(Box::new(|_| Delivery::Delivered));
        assert_ne!(a, b);
    }
}
