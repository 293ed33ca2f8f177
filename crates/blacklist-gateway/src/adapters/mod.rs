//! Adapters for the Blacklist Gateway.
//!
//! Infrastructure implementations: the in-process ledger and HTTP error
//! conversions.

mod error_conversions;
pub mod in_memory_ledger;

pub use in_memory_ledger::InMemoryLedger;
