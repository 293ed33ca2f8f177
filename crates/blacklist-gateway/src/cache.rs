//! Blacklist cache - the in-memory set of offending IPs derived from the ledger.
//!
//! The snapshot is rebuilt wholesale from a full ledger read and swapped in
//! behind an `Arc`, so a reader either sees the old set or the new one,
//! never a half-built one. Readers hold the lock only long enough to clone
//! the `Arc`.
//!
//! Concurrent refreshes are ordered by ticket: each refresh draws a ticket
//! before it reads the ledger, and its result is installed only if no
//! refresh with a later ticket has already been installed. A slow read that
//! started first can therefore never overwrite the result of a read that
//! started after it.

use crate::domain::types::AttackRecord;
use crate::ports::outbound::{LedgerError, LedgerGateway};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Immutable set of blacklisted IPs from one ledger read
#[derive(Debug, Default)]
pub struct BlacklistSnapshot {
    /// Ticket of the refresh that produced this snapshot (0 = initial empty)
    generation: u64,
    ips: HashSet<IpAddr>,
}

impl BlacklistSnapshot {
    /// Project the `ip` field of every record into a set.
    pub fn from_records(generation: u64, records: &[AttackRecord]) -> Self {
        let mut ips = HashSet::with_capacity(records.len());
        for record in records {
            match record.ip_addr() {
                Some(ip) => {
                    ips.insert(ip);
                }
                None => {
                    debug!(ip = %record.ip, index = record.index, "Skipping unparseable record IP");
                }
            }
        }
        Self { generation, ips }
    }

    pub fn contains(&self, ip: &IpAddr) -> bool {
        self.ips.contains(ip)
    }

    pub fn len(&self) -> usize {
        self.ips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ips.is_empty()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Outcome of a successful refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Snapshot replaced; carries the new number of distinct IPs
    Installed(usize),
    /// A refresh that started later had already been installed
    Superseded,
}

/// Concurrency-safe blacklist cache
#[derive(Debug, Default)]
pub struct BlacklistCache {
    current: RwLock<Arc<BlacklistSnapshot>>,
    tickets: AtomicU64,
}

impl BlacklistCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full ledger read followed by an atomic snapshot swap.
    ///
    /// On error the previous snapshot stays in place and the error is
    /// returned for the caller to log.
    pub async fn refresh(&self, ledger: &dyn LedgerGateway) -> Result<RefreshOutcome, LedgerError> {
        let ticket = self.next_ticket();
        let records = ledger.list().await?;
        Ok(self.install(ticket, &records))
    }

    /// Whether `ip` is in the current snapshot
    pub fn contains(&self, ip: &IpAddr) -> bool {
        self.snapshot().contains(ip)
    }

    /// Number of distinct IPs in the current snapshot
    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    /// Current snapshot; stays valid even if a refresh swaps it out
    pub fn snapshot(&self) -> Arc<BlacklistSnapshot> {
        self.current.read().clone()
    }

    fn next_ticket(&self) -> u64 {
        self.tickets.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn install(&self, ticket: u64, records: &[AttackRecord]) -> RefreshOutcome {
        // Build outside the lock
        let snapshot = Arc::new(BlacklistSnapshot::from_records(ticket, records));
        let size = snapshot.len();

        let mut current = self.current.write();
        if current.generation >= ticket {
            debug!(
                ticket = ticket,
                installed = current.generation,
                "Discarding superseded blacklist refresh"
            );
            return RefreshOutcome::Superseded;
        }
        *current = snapshot;
        RefreshOutcome::Installed(size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryLedger;
    use std::net::Ipv4Addr;

    fn ip(a: u8, b: u8, c: u8, d: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(a, b, c, d))
    }

    #[test]
    fn test_snapshot_deduplicates() {
        let records = vec![
            AttackRecord::new("1.1.1.1", "DoS", 0),
            AttackRecord::new("1.1.1.1", "Scan", 1),
            AttackRecord::new("2.2.2.2", "DoS", 2),
            AttackRecord::new("bogus", "DoS", 3),
        ];
        let snapshot = BlacklistSnapshot::from_records(1, &records);
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.contains(&ip(1, 1, 1, 1)));
        assert!(!snapshot.contains(&ip(3, 3, 3, 3)));
    }

    #[test]
    fn test_empty_cache_blocks_nobody() {
        let cache = BlacklistCache::new();
        assert!(cache.is_empty());
        assert!(!cache.contains(&ip(1, 1, 1, 1)));
        assert_eq!(cache.snapshot().generation(), 0);
    }

    #[tokio::test]
    async fn test_refresh_replaces_wholesale() {
        let ledger = InMemoryLedger::with_records([("1.1.1.1", "DoS"), ("2.2.2.2", "DoS")]);
        let cache = BlacklistCache::new();

        assert_eq!(cache.refresh(&ledger).await.unwrap(), RefreshOutcome::Installed(2));
        assert!(cache.contains(&ip(2, 2, 2, 2)));

        ledger.clear_all().await.unwrap();
        ledger.append("3.3.3.3", "Scan").await.unwrap();
        cache.refresh(&ledger).await.unwrap();

        assert_eq!(cache.len(), 1);
        assert!(!cache.contains(&ip(1, 1, 1, 1)));
        assert!(cache.contains(&ip(3, 3, 3, 3)));
    }

    #[test]
    fn test_older_ticket_is_discarded() {
        let cache = BlacklistCache::new();
        let older = cache.next_ticket();
        let newer = cache.next_ticket();

        let newer_records = vec![AttackRecord::new("9.9.9.9", "DoS", 0)];
        let older_records = vec![AttackRecord::new("8.8.8.8", "DoS", 0)];

        assert_eq!(cache.install(newer, &newer_records), RefreshOutcome::Installed(1));
        assert_eq!(cache.install(older, &older_records), RefreshOutcome::Superseded);

        assert!(cache.contains(&ip(9, 9, 9, 9)));
        assert!(!cache.contains(&ip(8, 8, 8, 8)));
    }

    #[test]
    fn test_snapshot_survives_swap() {
        let cache = BlacklistCache::new();
        let t1 = cache.next_ticket();
        cache.install(t1, &[AttackRecord::new("1.1.1.1", "DoS", 0)]);

        let held = cache.snapshot();
        let t2 = cache.next_ticket();
        cache.install(t2, &[]);

        assert!(held.contains(&ip(1, 1, 1, 1)));
        assert!(cache.is_empty());
    }
}
