//! Core types shared by the ledger port, the cache and the HTTP handlers.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// A single attack record as stored on the ledger.
///
/// `index` is assigned by the ledger: it is the zero-based position of the
/// record in the ledger's ordered list at the time it was read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackRecord {
    /// Offending IP address, as written by the reporter
    pub ip: String,
    /// Free-form attack classification (e.g. "DoS Test")
    pub attack_type: String,
    /// Ledger-assigned position
    pub index: u64,
}

impl AttackRecord {
    pub fn new(ip: impl Into<String>, attack_type: impl Into<String>, index: u64) -> Self {
        Self {
            ip: ip.into(),
            attack_type: attack_type.into(),
            index,
        }
    }

    /// Parsed form of `ip`, if it is a valid address. IPv4-mapped IPv6
    /// addresses come back as IPv4.
    pub fn ip_addr(&self) -> Option<IpAddr> {
        self.ip.trim().parse::<IpAddr>().ok().map(|ip| ip.to_canonical())
    }
}

/// Diagnostic batch appended by `POST /blacklist/addTestAttacks`.
pub const TEST_ATTACKS: [(&str, &str); 5] = [
    ("1.1.1.1", "DoS Test"),
    ("2.2.2.2", "DoS Test"),
    ("3.3.3.3", "DoS Test"),
    ("4.4.4.4", "DoS Test"),
    ("5.5.5.5", "DoS Test"),
];

/// Validated body of `POST /blacklist/log`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAttack {
    pub ip: IpAddr,
    pub attack_type: String,
}
