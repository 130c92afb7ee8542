use super::PartitionDate;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Pool section a transaction was observed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolStatus {
    Pending,
    Queued,
}

impl PoolStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PoolStatus::Pending => "pending",
            PoolStatus::Queued => "queued",
        }
    }
}

impl fmt::Display for PoolStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One mempool capture.
///
/// `pending_count` / `queued_count` are the counts the collector reported
/// alongside the dump; the `*_tx_count` fields are what the shredder actually
/// found in the nested pool sections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub snapshot_id: String,
    pub captured_at: Option<DateTime<Utc>>,
    pub pending_count: u64,
    pub queued_count: u64,
    pub snapshot_date: PartitionDate,
    pub pending_tx_count: u64,
    pub queued_tx_count: u64,
    pub eip7702_tx_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collector_error: Option<String>,
    pub source_file: String,
}

impl SnapshotRecord {
    pub fn observed_tx_count(&self) -> u64 {
        self.pending_tx_count + self.queued_tx_count
    }
}

/// One pooled transaction observed in a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub tx_hash: Option<String>,
    #[serde(rename = "from")]
    pub from_address: Option<String>,
    pub nonce: Option<u64>,
    pub is_eip7702: bool,
    pub authorization_count: u32,
    pub snapshot_id: String,
    pub snapshot_date: PartitionDate,
    pub captured_at: Option<DateTime<Utc>>,
    pub pool_status: PoolStatus,
    pub tx_type: Option<u64>,
    #[serde(rename = "to")]
    pub to_address: Option<String>,
    pub gas: Option<u64>,
    pub gas_price: Option<u128>,
    pub max_fee_per_gas: Option<u128>,
    pub max_priority_fee_per_gas: Option<u128>,
    /// Kept as the raw hex quantity; wei values overflow 64 bits
    pub value: Option<String>,
    pub input_size_bytes: u64,
    pub source_file: String,
}

/// One EIP-7702 authorization tuple of a transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationRecord {
    pub tx_hash: Option<String>,
    pub authority_address: Option<String>,
    pub chain_id: Option<u64>,
    pub nonce: Option<u64>,
    pub list_index: u32,
    pub snapshot_id: String,
    pub snapshot_date: PartitionDate,
}

/// Output stream a shredded record belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RecordStream {
    Transactions,
    Snapshots,
    Authorizations,
}

impl RecordStream {
    pub const ALL: [RecordStream; 3] = [
        RecordStream::Transactions,
        RecordStream::Snapshots,
        RecordStream::Authorizations,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStream::Transactions => "transactions",
            RecordStream::Snapshots => "snapshots",
            RecordStream::Authorizations => "authorizations",
        }
    }
}

impl fmt::Display for RecordStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
