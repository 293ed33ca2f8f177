//! Middleware stack for the Blacklist Gateway.
//!
//! Layer order: Request → Tracing → AccessGate → Handler

pub mod access_gate;
pub mod tracing;

pub use access_gate::{AccessGate, AccessGateLayer, ClientIp, TrustedProxyConfig};
pub use tracing::TracingLayer;
