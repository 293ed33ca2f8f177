//! Outbound ports for the Blacklist Gateway.

use crate::domain::types::AttackRecord;
use async_trait::async_trait;

/// Ledger errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum LedgerError {
    /// The ledger could not be reached or did not answer
    #[error("ledger unavailable: {0}")]
    Unavailable(String),
    /// The ledger refused the operation
    #[error("ledger rejected operation: {0}")]
    Rejected(String),
}

/// Read/write access to the attack records stored on the ledger.
///
/// The ledger is the source of truth. Implementations must be safe to call
/// from many request tasks and the refresh task at once; a slow call stalls
/// only the task awaiting it.
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// All current records, in ledger order
    async fn list(&self) -> Result<Vec<AttackRecord>, LedgerError>;

    /// Append a record
    async fn append(&self, ip: &str, attack_type: &str) -> Result<(), LedgerError>;

    /// Force a ledger-wide resync; visible to subsequent `list()` calls
    async fn refresh_from_source(&self) -> Result<(), LedgerError>;

    /// Remove every record
    async fn clear_all(&self) -> Result<(), LedgerError>;

    /// Remove the record at `index`. Returns false if there was none.
    async fn delete(&self, index: u64) -> Result<bool, LedgerError>;
}
