//! PacketFlow server: drives a [`Simulation`](packetflow_core::engine::Simulation)
//! on a fixed period and serves its snapshots over HTTP and WebSocket.

pub mod driver;
pub mod http;
pub mod tracing_setup;
