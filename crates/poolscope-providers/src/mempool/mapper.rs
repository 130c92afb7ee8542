use super::schema::{AuthorizationList, RawTransaction, Scalar};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use poolscope_types::{AuthorizationRecord, PartitionDate, PoolStatus, TransactionRecord};
use uuid::Uuid;

const EIP7702_TX_TYPE: u64 = 4;

/// Identity shared by every record derived from one snapshot document
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SnapshotIdentity {
    pub snapshot_id: String,
    pub captured_at: Option<DateTime<Utc>>,
    pub snapshot_date: PartitionDate,
    pub source_file: String,
    /// Capture date and file-name date disagree
    pub partition_mismatch: bool,
}

impl SnapshotIdentity {
    /// Derive the identity of document `index` of `source_file`.
    ///
    /// The id is a UUIDv5 of the raw timestamp text, so reprocessing yields
    /// the same id; documents without a timestamp fall back to
    /// `<file>#<index>`. The partition comes from the capture time, then the
    /// file-name date, then the unknown partition.
    pub fn resolve(
        raw_timestamp: Option<&str>,
        source_file: &str,
        file_date: Option<NaiveDate>,
        index: u64,
    ) -> Self {
        let captured_at = raw_timestamp.and_then(parse_captured_at);
        let snapshot_id = match raw_timestamp {
            Some(ts) => Uuid::new_v5(&Uuid::NAMESPACE_OID, ts.as_bytes()).to_string(),
            None => format!("{}#{}", source_file, index),
        };

        let captured_date = captured_at.map(|ts| ts.date_naive());
        let partition_mismatch = matches!(
            (captured_date, file_date),
            (Some(captured), Some(named)) if captured != named
        );

        Self {
            snapshot_id,
            captured_at,
            snapshot_date: PartitionDate::from(captured_date.or(file_date)),
            source_file: source_file.to_string(),
            partition_mismatch,
        }
    }
}

/// RFC 3339, or a naive ISO timestamp taken as UTC
pub(crate) fn parse_captured_at(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Records derived from one leaf transaction
#[derive(Debug, Clone)]
pub(crate) struct MappedTransaction {
    pub transaction: TransactionRecord,
    pub authorizations: Vec<AuthorizationRecord>,
    /// Problems found while mapping; non-empty means the record is malformed
    pub issues: Vec<String>,
}

pub(crate) fn map_transaction(
    raw: RawTransaction,
    status: PoolStatus,
    identity: &SnapshotIdentity,
) -> MappedTransaction {
    let mut issues = Vec::new();

    let tx_hash = raw.hash.as_ref().and_then(Scalar::to_text);
    let from_address = raw.from.as_ref().and_then(Scalar::to_text);
    let nonce = raw.nonce.as_ref().and_then(Scalar::as_u64);
    if tx_hash.is_none() {
        issues.push("missing hash".to_string());
    }
    if from_address.is_none() {
        issues.push("missing from".to_string());
    }
    if nonce.is_none() {
        issues.push("missing or undecodable nonce".to_string());
    }

    let input_size_bytes = raw.input_size_bytes();
    let tx_type = raw.tx_type.as_ref().and_then(Scalar::as_u64);
    let is_eip7702 = tx_type == Some(EIP7702_TX_TYPE);

    let entries = match raw.authorization_list {
        Some(AuthorizationList::Entries(entries)) => entries,
        Some(AuthorizationList::Other(serde_json::Value::Null)) | None => Vec::new(),
        Some(AuthorizationList::Other(_)) => {
            issues.push("authorizationList is not a list".to_string());
            Vec::new()
        }
    };

    let authorization_count = entries.len() as u32;
    if let Some(declared) = raw.authorization_count.as_ref() {
        match declared.as_u64() {
            Some(n) if n == u64::from(authorization_count) => {}
            Some(n) => issues.push(format!(
                "declares {} authorizations but lists {}",
                n, authorization_count
            )),
            None => issues.push("undecodable authorizationCount".to_string()),
        }
    }

    let authorizations = entries
        .into_iter()
        .enumerate()
        .map(|(i, entry)| {
            let authority_address = entry.address.as_ref().and_then(Scalar::to_text);
            if authority_address.is_none() {
                issues.push(format!("authorization {} has no address", i));
            }
            AuthorizationRecord {
                tx_hash: tx_hash.clone(),
                authority_address,
                chain_id: entry.chain_id.as_ref().and_then(Scalar::as_u64),
                nonce: entry.nonce.as_ref().and_then(Scalar::as_u64),
                list_index: i as u32,
                snapshot_id: identity.snapshot_id.clone(),
                snapshot_date: identity.snapshot_date,
            }
        })
        .collect();

    let transaction = TransactionRecord {
        tx_hash,
        from_address,
        nonce,
        is_eip7702,
        authorization_count,
        snapshot_id: identity.snapshot_id.clone(),
        snapshot_date: identity.snapshot_date,
        captured_at: identity.captured_at,
        pool_status: status,
        tx_type,
        to_address: raw.to.as_ref().and_then(Scalar::to_text),
        gas: raw.gas.as_ref().and_then(Scalar::as_u64),
        gas_price: raw.gas_price.as_ref().and_then(Scalar::as_u128),
        max_fee_per_gas: raw.max_fee_per_gas.as_ref().and_then(Scalar::as_u128),
        max_priority_fee_per_gas: raw
            .max_priority_fee_per_gas
            .as_ref()
            .and_then(Scalar::as_u128),
        value: raw.value.as_ref().and_then(Scalar::to_text),
        input_size_bytes,
        source_file: identity.source_file.clone(),
    };

    MappedTransaction {
        transaction,
        authorizations,
        issues,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> SnapshotIdentity {
        SnapshotIdentity::resolve(
            Some("2025-05-04T00:00:10Z"),
            "2025-05-04.log",
            NaiveDate::from_ymd_opt(2025, 5, 4),
            0,
        )
    }

    fn raw(json: &str) -> RawTransaction {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_identity_is_stable_and_dated() {
        let a = identity();
        let b = identity();

        assert_eq!(a.snapshot_id, b.snapshot_id);
        assert_eq!(a.snapshot_date.to_string(), "2025-05-04");
        assert!(!a.partition_mismatch);
    }

    #[test]
    fn test_identity_flags_partition_mismatch() {
        let id = SnapshotIdentity::resolve(
            Some("2025-05-05T00:00:01+00:00"),
            "2025-05-04.log",
            NaiveDate::from_ymd_opt(2025, 5, 4),
            3,
        );
        assert!(id.partition_mismatch);
        assert_eq!(id.snapshot_date.to_string(), "2025-05-05");
    }

    #[test]
    fn test_identity_without_timestamp_falls_back() {
        let id = SnapshotIdentity::resolve(None, "dump.log", None, 3);
        assert_eq!(id.snapshot_id, "dump.log#3");
        assert_eq!(id.snapshot_date, PartitionDate::Unknown);

        let id = SnapshotIdentity::resolve(
            Some("garbage"),
            "2025-05-04.log",
            NaiveDate::from_ymd_opt(2025, 5, 4),
            0,
        );
        assert!(id.captured_at.is_none());
        assert_eq!(id.snapshot_date.to_string(), "2025-05-04");
    }

    #[test]
    fn test_collector_isoformat_timestamp_parses() {
        let ts = parse_captured_at("2025-05-04T12:30:00.123456+00:00").unwrap();
        assert_eq!(ts.to_rfc3339(), "2025-05-04T12:30:00.123456+00:00");
    }

    #[test]
    fn test_eip7702_transaction_maps_authorizations() {
        let mapped = map_transaction(
            raw(r#"{"hash":"0xabc","from":"0x01","nonce":"0x5","type":"0x4",
                "authorizationList":[
                    {"chainId":"0x1","address":"0xaa","nonce":"0x0"},
                    {"chainId":"0x1","address":"0xbb","nonce":"0x1"}]}"#),
            PoolStatus::Pending,
            &identity(),
        );

        assert!(mapped.issues.is_empty());
        assert!(mapped.transaction.is_eip7702);
        assert_eq!(mapped.transaction.authorization_count, 2);
        assert_eq!(mapped.transaction.nonce, Some(5));
        let indexes: Vec<u32> = mapped.authorizations.iter().map(|a| a.list_index).collect();
        assert_eq!(indexes, vec![0, 1]);
        assert_eq!(mapped.authorizations[1].authority_address.as_deref(), Some("0xbb"));
    }

    #[test]
    fn test_missing_fields_are_reported_not_dropped() {
        let mapped = map_transaction(raw(r#"{"gas":"0x5208"}"#), PoolStatus::Queued, &identity());

        assert_eq!(mapped.issues.len(), 3);
        assert_eq!(mapped.transaction.tx_hash, None);
        assert_eq!(mapped.transaction.gas, Some(21000));
    }

    #[test]
    fn test_declared_count_mismatch_keeps_list_length() {
        let mapped = map_transaction(
            raw(r#"{"hash":"0xabc","from":"0x01","nonce":"0x1","type":"0x4",
                "authorizationCount":3,
                "authorizationList":[{"chainId":"0x1","address":"0xaa","nonce":"0x0"}]}"#),
            PoolStatus::Pending,
            &identity(),
        );

        assert_eq!(mapped.transaction.authorization_count, 1);
        assert_eq!(mapped.authorizations.len(), 1);
        assert_eq!(mapped.issues.len(), 1);
    }

    #[test]
    fn test_input_size_survives_authorization_list() {
        let mapped = map_transaction(
            raw(r#"{"hash":"0xabc","from":"0x01","nonce":"0x2","type":"0x4","input":"0xdeadbeef",
                "authorizationList":[
                    {"chainId":"0x1","address":"0xaa","nonce":"0x0"},
                    {"chainId":"0x1","address":"0xbb","nonce":"0x1"}]}"#),
            PoolStatus::Queued,
            &identity(),
        );

        assert_eq!(mapped.transaction.input_size_bytes, 4);
        assert_eq!(mapped.authorizations.len(), 2);
        assert!(mapped.issues.is_empty());
    }
}
