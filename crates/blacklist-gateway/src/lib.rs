// Allow missing docs for internal items in development
#![allow(missing_docs)]

//! Blacklist Gateway - HTTP service enforcing and managing a ledger-backed IP blacklist.
//!
//! Every request is screened against a cached set of offending IPs before
//! it reaches a handler. The cache is rebuilt from the ledger on each
//! request and by a background scheduler whose interval can be changed at
//! runtime.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       BLACKLIST GATEWAY                         │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   HTTP (axum)  ──→  Tracing  ──→  AccessGate  ──→  Commands      │
//! │                                      │                │         │
//! │                                      ▼                ▼         │
//! │   RefreshScheduler ──────────→ BlacklistCache    IntervalControl│
//! │          │                           ▲                ▲         │
//! │          │                           │                │         │
//! │          └──────────→ LedgerGateway ─┘   set-interval ┘         │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use blacklist_gateway::{BlacklistGatewayService, GatewayConfig, InMemoryLedger};
//!
//! let token = CancellationToken::new();
//! let service = BlacklistGatewayService::new(
//!     GatewayConfig::default(),
//!     Arc::new(InMemoryLedger::new()),
//!     token.clone(),
//! )?;
//! service.start().await?;
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod adapters;
pub mod cache;
pub mod domain;
pub mod middleware;
pub mod ports;
pub mod router;
pub mod scheduler;
pub mod service;

// Re-exports for public API
pub use adapters::InMemoryLedger;
pub use cache::{BlacklistCache, BlacklistSnapshot, RefreshOutcome};
pub use domain::config::GatewayConfig;
pub use domain::error::{ApiError, ApiResult, GatewayError};
pub use domain::types::*;
pub use ports::{LedgerError, LedgerGateway};
pub use scheduler::{
    IntervalControl, RefreshScheduler, SchedulerState, SchedulerStats, MAX_INTERVAL_SECS,
};
pub use service::BlacklistGatewayService;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
