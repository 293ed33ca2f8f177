//! Ports (hexagonal boundaries) of the Blacklist Gateway.

pub mod outbound;

pub use outbound::{LedgerError, LedgerGateway};
