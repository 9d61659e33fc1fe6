//! Periodic tick driver.
//!
//! One tokio task owns the [`Simulation`] and calls `step()` from a single
//! `interval`, so ticks never overlap. Each published snapshot is mirrored
//! into a `watch` channel (latest value, for pull queries) and a `broadcast`
//! channel (push to WebSocket clients). A tick that panics is logged, its
//! node state is rolled back, and the loop retries on the next period.

use packetflow_core::engine::Simulation;
use packetflow_core::fixed::Fixed64;
use packetflow_core::id::NodeId;
use packetflow_core::publish::Delivery;
use packetflow_core::snapshot::NetworkSnapshot;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Snapshots buffered per push subscriber before it starts lagging.
const PUSH_BUFFER: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("driver task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

// ---------------------------------------------------------------------------
// Shutdown signal
// ---------------------------------------------------------------------------

/// Cloneable one-shot stop signal shared by the driver and connection
/// handlers.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once [`trigger`](Self::trigger) has been called.
    pub async fn wait(&self) {
        let mut rx = self.rx.clone();
        // The sender lives as long as `self`, so this only returns on trigger.
        let _ = rx.wait_for(|&stopped| stopped).await;
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

/// Handle to a running driver task.
#[derive(Debug)]
pub struct DriverHandle {
    latest: watch::Receiver<Arc<NetworkSnapshot>>,
    updates: broadcast::Sender<Arc<NetworkSnapshot>>,
    shutdown: Shutdown,
    task: JoinHandle<Simulation>,
}

impl DriverHandle {
    /// The most recently published snapshot (the initial state before the
    /// first tick).
    pub fn latest(&self) -> Arc<NetworkSnapshot> {
        Arc::clone(&self.latest.borrow())
    }

    pub fn latest_receiver(&self) -> watch::Receiver<Arc<NetworkSnapshot>> {
        self.latest.clone()
    }

    pub fn updates(&self) -> broadcast::Sender<Arc<NetworkSnapshot>> {
        self.updates.clone()
    }

    pub fn shutdown(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Wait for the task to exit after the shutdown signal fires, returning
    /// the simulation.
    pub async fn join(self) -> Result<Simulation, DriverError> {
        Ok(self.task.await?)
    }

    /// Trigger shutdown and wait for the task to hand back the simulation.
    pub async fn stop(self) -> Result<Simulation, DriverError> {
        self.shutdown.trigger();
        self.join().await
    }
}

/// Start driving `sim` every `period` until `shutdown` fires.
///
/// Must be called from within a tokio runtime.
pub fn spawn(mut sim: Simulation, period: Duration, shutdown: Shutdown) -> DriverHandle {
    let initial = sim
        .latest_snapshot()
        .cloned()
        .unwrap_or_else(|| Arc::new(sim.snapshot()));
    let (latest_tx, latest_rx) = watch::channel(initial);
    let (updates, _) = broadcast::channel(PUSH_BUFFER);

    let push = updates.clone();
    sim.subscribe(Box::new(move |snapshot: &Arc<NetworkSnapshot>| {
        latest_tx.send_replace(Arc::clone(snapshot));
        // No receivers is not an error; clients come and go.
        let _ = push.send(Arc::clone(snapshot));
        Delivery::Delivered
    }));

    let stop = shutdown.clone();
    let task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        interval.tick().await;

        tracing::info!(
            period_ms = period.as_millis() as u64,
            nodes = sim.topology().node_count(),
            links = sim.topology().link_count(),
            "driver started"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => run_tick(&mut sim),
                _ = stop.wait() => break,
            }
        }

        tracing::info!(tick = sim.tick(), "driver stopped");
        sim
    });

    DriverHandle {
        latest: latest_rx,
        updates,
        shutdown,
        task,
    }
}

/// Run one tick, containing any panic to this tick.
///
/// Queues and rates are restored to their pre-tick values on a fault, so the
/// retry on the next period does not generate the same tick's traffic twice.
/// The destination policy's RNG is not rewound; the retry may pick different
/// destinations than the faulted attempt did.
fn run_tick(sim: &mut Simulation) {
    let saved = save_nodes(sim);
    match std::panic::catch_unwind(AssertUnwindSafe(|| sim.step())) {
        Ok(report) => {
            if report.unreachable > 0 {
                tracing::trace!(
                    tick = report.tick,
                    unreachable = report.unreachable,
                    "some destinations unreachable"
                );
            }
        }
        Err(payload) => {
            restore_nodes(sim, &saved);
            sim.topology_mut().reset_loads();
            tracing::error!(
                tick = sim.tick() + 1,
                reason = panic_message(payload.as_ref()),
                "tick faulted, state rolled back"
            );
        }
    }
}

fn save_nodes(sim: &Simulation) -> Vec<(NodeId, Fixed64, Fixed64)> {
    sim.topology()
        .nodes()
        .map(|(id, node)| (id, node.queue, node.rate))
        .collect()
}

fn restore_nodes(sim: &mut Simulation, saved: &[(NodeId, Fixed64, Fixed64)]) {
    let topology = sim.topology_mut();
    for &(id, queue, rate) in saved {
        topology.set_queue(id, queue);
        topology.set_rate(id, rate);
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}
