//! In-process ledger adapter.
//!
//! Holds records in memory in append order. Used by the node binary when no
//! remote ledger is wired in, and by tests.

use crate::domain::types::AttackRecord;
use crate::ports::outbound::{LedgerError, LedgerGateway};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

#[derive(Debug, Clone)]
struct StoredAttack {
    ip: String,
    attack_type: String,
}

/// Ledger kept in process memory
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    records: RwLock<Vec<StoredAttack>>,
    resyncs: AtomicU64,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a ledger pre-populated with `(ip, attack_type)` pairs
    pub fn with_records<I, S>(records: I) -> Self
    where
        I: IntoIterator<Item = (S, S)>,
        S: Into<String>,
    {
        let records = records
            .into_iter()
            .map(|(ip, attack_type)| StoredAttack {
                ip: ip.into(),
                attack_type: attack_type.into(),
            })
            .collect();
        Self {
            records: RwLock::new(records),
            resyncs: AtomicU64::new(0),
        }
    }

    /// Number of records currently held
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// How many times `refresh_from_source` has been called
    pub fn resync_count(&self) -> u64 {
        self.resyncs.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl LedgerGateway for InMemoryLedger {
    async fn list(&self) -> Result<Vec<AttackRecord>, LedgerError> {
        let records = self.records.read();
        Ok(records
            .iter()
            .enumerate()
            .map(|(index, r)| AttackRecord::new(r.ip.clone(), r.attack_type.clone(), index as u64))
            .collect())
    }

    async fn append(&self, ip: &str, attack_type: &str) -> Result<(), LedgerError> {
        let mut records = self.records.write();
        records.push(StoredAttack {
            ip: ip.to_string(),
            attack_type: attack_type.to_string(),
        });
        debug!(ip = ip, index = records.len() - 1, "Appended attack record");
        Ok(())
    }

    async fn refresh_from_source(&self) -> Result<(), LedgerError> {
        // Nothing to pull: this ledger is its own source
        let n = self.resyncs.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(resyncs = n, "In-memory ledger resync");
        Ok(())
    }

    async fn clear_all(&self) -> Result<(), LedgerError> {
        let mut records = self.records.write();
        let removed = records.len();
        records.clear();
        debug!(removed = removed, "Cleared attack records");
        Ok(())
    }

    async fn delete(&self, index: u64) -> Result<bool, LedgerError> {
        let mut records = self.records.write();
        let Ok(position) = usize::try_from(index) else {
            return Ok(false);
        };
        if position >= records.len() {
            return Ok(false);
        }
        let removed = records.remove(position);
        debug!(index = index, ip = %removed.ip, "Deleted attack record");
        Ok(true)
    }
}
