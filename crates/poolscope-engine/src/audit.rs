//! Integrity checks over a shredded record stream.
//!
//! The shredder emits a snapshot's transactions (each followed by its
//! authorizations) before the snapshot record itself, so the audit can close a
//! snapshot's books as soon as its record arrives.

use poolscope_types::{AuthorizationRecord, SnapshotRecord, TransactionRecord};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// One integrity violation found in the record stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditFinding {
    /// Authorization records for a transaction disagree with its `authorization_count`
    AuthorizationCount {
        snapshot_id: String,
        tx_hash: Option<String>,
        declared: u32,
        emitted: u32,
    },
    /// `list_index` values are not `0..n` in order
    ListIndex {
        snapshot_id: String,
        tx_hash: Option<String>,
        expected: u32,
        found: u32,
    },
    /// Authorization emitted without a preceding transaction of the snapshot
    OrphanAuthorization {
        snapshot_id: String,
        tx_hash: Option<String>,
    },
    /// Snapshot counters disagree with the transaction records emitted for it
    SnapshotTotals {
        snapshot_id: String,
        reported: u64,
        emitted: u64,
    },
}

impl fmt::Display for AuditFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hash = |h: &Option<String>| h.clone().unwrap_or_else(|| "<no hash>".to_string());
        match self {
            AuditFinding::AuthorizationCount {
                snapshot_id,
                tx_hash,
                declared,
                emitted,
            } => write!(
                f,
                "{} tx {}: authorization_count {} but {} authorization records",
                snapshot_id,
                hash(tx_hash),
                declared,
                emitted
            ),
            AuditFinding::ListIndex {
                snapshot_id,
                tx_hash,
                expected,
                found,
            } => write!(
                f,
                "{} tx {}: list_index {} where {} was expected",
                snapshot_id,
                hash(tx_hash),
                found,
                expected
            ),
            AuditFinding::OrphanAuthorization {
                snapshot_id,
                tx_hash,
            } => write!(
                f,
                "{} tx {}: authorization without a transaction",
                snapshot_id,
                hash(tx_hash)
            ),
            AuditFinding::SnapshotTotals {
                snapshot_id,
                reported,
                emitted,
            } => write!(
                f,
                "{}: snapshot reports {} transactions but {} were emitted",
                snapshot_id, reported, emitted
            ),
        }
    }
}

#[derive(Debug)]
struct OpenTransaction {
    tx_hash: Option<String>,
    declared: u32,
    emitted: u32,
}

/// Streaming checker fed with the same records a sink receives
#[derive(Debug, Default)]
pub struct ShredAudit {
    current: HashMap<String, OpenTransaction>,
    emitted_per_snapshot: HashMap<String, u64>,
    findings: Vec<AuditFinding>,
    checked_transactions: u64,
    checked_snapshots: u64,
}

impl ShredAudit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transaction(&mut self, tx: &TransactionRecord) {
        self.close_transaction(&tx.snapshot_id);
        *self
            .emitted_per_snapshot
            .entry(tx.snapshot_id.clone())
            .or_insert(0) += 1;
        self.current.insert(
            tx.snapshot_id.clone(),
            OpenTransaction {
                tx_hash: tx.tx_hash.clone(),
                declared: tx.authorization_count,
                emitted: 0,
            },
        );
        self.checked_transactions += 1;
    }

    pub fn authorization(&mut self, auth: &AuthorizationRecord) {
        let open = self
            .current
            .get_mut(&auth.snapshot_id)
            .filter(|open| open.tx_hash == auth.tx_hash);
        let Some(open) = open else {
            self.findings.push(AuditFinding::OrphanAuthorization {
                snapshot_id: auth.snapshot_id.clone(),
                tx_hash: auth.tx_hash.clone(),
            });
            return;
        };

        if auth.list_index != open.emitted {
            self.findings.push(AuditFinding::ListIndex {
                snapshot_id: auth.snapshot_id.clone(),
                tx_hash: auth.tx_hash.clone(),
                expected: open.emitted,
                found: auth.list_index,
            });
        }
        open.emitted += 1;
    }

    pub fn snapshot(&mut self, snapshot: &SnapshotRecord) {
        self.close_transaction(&snapshot.snapshot_id);
        let emitted = self
            .emitted_per_snapshot
            .remove(&snapshot.snapshot_id)
            .unwrap_or(0);
        if emitted != snapshot.observed_tx_count() {
            self.findings.push(AuditFinding::SnapshotTotals {
                snapshot_id: snapshot.snapshot_id.clone(),
                reported: snapshot.observed_tx_count(),
                emitted,
            });
        }
        self.checked_snapshots += 1;
    }

    fn close_transaction(&mut self, snapshot_id: &str) {
        let Some(open) = self.current.remove(snapshot_id) else {
            return;
        };
        if open.declared != open.emitted {
            self.findings.push(AuditFinding::AuthorizationCount {
                snapshot_id: snapshot_id.to_string(),
                tx_hash: open.tx_hash,
                declared: open.declared,
                emitted: open.emitted,
            });
        }
    }

    pub fn checked_transactions(&self) -> u64 {
        self.checked_transactions
    }

    pub fn checked_snapshots(&self) -> u64 {
        self.checked_snapshots
    }

    /// Close whatever is still open and return every finding
    pub fn finish(mut self) -> Vec<AuditFinding> {
        let open: Vec<String> = self.current.keys().cloned().collect();
        for snapshot_id in open {
            self.close_transaction(&snapshot_id);
        }
        self.findings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use poolscope_types::{PartitionDate, PoolStatus};

    fn tx(snapshot: &str, hash: &str, auths: u32) -> TransactionRecord {
        TransactionRecord {
            tx_hash: Some(hash.to_string()),
            from_address: None,
            nonce: Some(0),
            is_eip7702: auths > 0,
            authorization_count: auths,
            snapshot_id: snapshot.to_string(),
            snapshot_date: PartitionDate::Unknown,
            captured_at: None,
            pool_status: PoolStatus::Pending,
            tx_type: None,
            to_address: None,
            gas: None,
            gas_price: None,
            max_fee_per_gas: None,
            max_priority_fee_per_gas: None,
            value: None,
            input_size_bytes: 0,
            source_file: "f".to_string(),
        }
    }

    fn auth(snapshot: &str, hash: &str, index: u32) -> AuthorizationRecord {
        AuthorizationRecord {
            tx_hash: Some(hash.to_string()),
            authority_address: Some("0xaaaa".to_string()),
            chain_id: Some(1),
            nonce: Some(0),
            list_index: index,
            snapshot_id: snapshot.to_string(),
            snapshot_date: PartitionDate::Unknown,
        }
    }

    fn snapshot(id: &str, pending: u64) -> SnapshotRecord {
        SnapshotRecord {
            snapshot_id: id.to_string(),
            captured_at: None,
            pending_count: pending,
            queued_count: 0,
            snapshot_date: PartitionDate::Unknown,
            pending_tx_count: pending,
            queued_tx_count: 0,
            eip7702_tx_count: 0,
            collector_error: None,
            source_file: "f".to_string(),
        }
    }

    #[test]
    fn test_consistent_stream_has_no_findings() {
        let mut audit = ShredAudit::new();
        audit.transaction(&tx("s1", "0xabc", 2));
        audit.authorization(&auth("s1", "0xabc", 0));
        audit.authorization(&auth("s1", "0xabc", 1));
        audit.transaction(&tx("s1", "0xdef", 0));
        audit.snapshot(&snapshot("s1", 2));
        audit.snapshot(&snapshot("s2", 0));

        assert_eq!(audit.checked_transactions(), 2);
        assert_eq!(audit.checked_snapshots(), 2);
        assert!(audit.finish().is_empty());
    }

    #[test]
    fn test_missing_authorization_is_reported() {
        let mut audit = ShredAudit::new();
        audit.transaction(&tx("s1", "0xabc", 2));
        audit.authorization(&auth("s1", "0xabc", 0));
        audit.snapshot(&snapshot("s1", 1));

        let findings = audit.finish();
        assert_eq!(
            findings,
            vec![AuditFinding::AuthorizationCount {
                snapshot_id: "s1".to_string(),
                tx_hash: Some("0xabc".to_string()),
                declared: 2,
                emitted: 1,
            }]
        );
        assert_eq!(
            findings[0].to_string(),
            "s1 tx 0xabc: authorization_count 2 but 1 authorization records"
        );
    }

    #[test]
    fn test_out_of_order_index_and_orphans() {
        let mut audit = ShredAudit::new();
        audit.authorization(&auth("s1", "0x1", 0));
        audit.transaction(&tx("s1", "0x2", 1));
        audit.authorization(&auth("s1", "0x2", 3));
        audit.snapshot(&snapshot("s1", 2));

        let kinds: Vec<_> = audit
            .finish()
            .into_iter()
            .map(|f| match f {
                AuditFinding::AuthorizationCount { .. } => "count",
                AuditFinding::ListIndex { .. } => "index",
                AuditFinding::OrphanAuthorization { .. } => "orphan",
                AuditFinding::SnapshotTotals { .. } => "totals",
            })
            .collect();
        assert_eq!(kinds, vec!["orphan", "index", "totals"]);
    }
}
