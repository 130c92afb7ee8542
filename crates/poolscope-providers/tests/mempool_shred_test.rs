use poolscope_providers::{CollectingSink, MempoolShredder, ShredOptions, shred_snapshot_file};
use poolscope_types::{PartitionDate, PoolStatus};
use std::path::Path;

const SAMPLE: &str = "tests/samples/2025-05-04.log";

fn shred_sample() -> (poolscope_types::ShredStats, CollectingSink) {
    let mut sink = CollectingSink::default();
    let stats = shred_snapshot_file(Path::new(SAMPLE), &mut sink)
        .expect("sample file should shred without a file-level error");
    (stats, sink)
}

#[test]
fn test_sample_counts() {
    let (stats, sink) = shred_sample();

    assert_eq!(stats.documents, 4);
    assert_eq!(stats.malformed_documents, 1);
    assert_eq!(stats.snapshots, 3);
    assert_eq!(stats.transactions, 2);
    assert_eq!(stats.authorizations, 2);
    assert_eq!(stats.eip7702_transactions, 1);
    assert_eq!(stats.partition_mismatches, 0);
    assert!(!stats.is_unusable());

    assert_eq!(sink.snapshots.len(), 3);
    assert_eq!(sink.transactions.len(), 2);
    assert_eq!(sink.authorizations.len(), 2);
}

#[test]
fn test_sample_snapshots_keep_collector_errors() {
    let (_, sink) = shred_sample();

    let ids: Vec<&str> = sink.snapshots.iter().map(|s| s.snapshot_id.as_str()).collect();
    assert_eq!(
        ids,
        vec![
            "b77aec60-d7fa-5490-b3b0-158deb5fdf64",
            "b2c04775-c6da-5824-90fc-7f042a9b9590",
            "e46f114f-1125-5778-9576-4574dd423c41",
        ]
    );

    let first = &sink.snapshots[0];
    assert_eq!(first.pending_tx_count, 1);
    assert_eq!(first.queued_tx_count, 1);
    assert_eq!(first.eip7702_tx_count, 1);

    let failed = &sink.snapshots[1];
    assert_eq!(failed.collector_error.as_deref(), Some("IPC connection refused"));
    assert_eq!(failed.observed_tx_count(), 0);

    assert!(sink.snapshots.iter().all(|s| s.source_file == "2025-05-04.log"));
}

#[test]
fn test_sample_transactions() {
    let (_, sink) = shred_sample();

    let pending = &sink.transactions[0];
    assert_eq!(pending.tx_hash.as_deref(), Some("0xabc"));
    assert_eq!(pending.pool_status, PoolStatus::Pending);
    assert!(pending.is_eip7702);
    assert_eq!(pending.authorization_count, 2);
    assert_eq!(pending.nonce, Some(5));
    assert_eq!(pending.gas, Some(21000));
    assert_eq!(pending.max_fee_per_gas, Some(1_000_000_000));
    assert_eq!(pending.to_address.as_deref(), Some("0x2222"));

    let queued = &sink.transactions[1];
    assert_eq!(queued.tx_hash.as_deref(), Some("0xdef"));
    assert_eq!(queued.pool_status, PoolStatus::Queued);
    assert!(!queued.is_eip7702);
    assert_eq!(queued.authorization_count, 0);
    assert_eq!(queued.input_size_bytes, 4);

    let day = "2025-05-04".parse::<PartitionDate>().unwrap();
    assert!(sink.transactions.iter().all(|t| t.snapshot_date == day));
}

#[test]
fn test_sample_authorizations() {
    let (_, sink) = shred_sample();

    let lines = sink
        .authorizations
        .iter()
        .map(|a| serde_json::to_string(a).unwrap())
        .collect::<Vec<_>>()
        .join("\n");

    insta::assert_snapshot!(lines, @r#"
    {"tx_hash":"0xabc","authority_address":"0xaaaa","chain_id":1,"nonce":0,"list_index":0,"snapshot_id":"b77aec60-d7fa-5490-b3b0-158deb5fdf64","snapshot_date":"2025-05-04"}
    {"tx_hash":"0xabc","authority_address":"0xbbbb","chain_id":1,"nonce":1,"list_index":1,"snapshot_id":"b77aec60-d7fa-5490-b3b0-158deb5fdf64","snapshot_date":"2025-05-04"}
    "#);
}

#[test]
fn test_gzip_copy_matches_plain_file() -> anyhow::Result<()> {
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;

    let dir = tempfile::tempdir()?;
    let gz_path = dir.path().join("2025-05-04.log.gz");
    let mut enc = GzEncoder::new(std::fs::File::create(&gz_path)?, Compression::default());
    enc.write_all(&std::fs::read(SAMPLE)?)?;
    enc.finish()?;

    let (plain_stats, plain) = shred_sample();
    let mut gz = CollectingSink::default();
    let gz_stats = MempoolShredder::new(ShredOptions::default()).shred_file(&gz_path, &mut gz)?;

    assert_eq!(gz_stats.snapshots, plain_stats.snapshots);
    assert_eq!(gz_stats.bytes_read, plain_stats.bytes_read);
    assert_eq!(gz.transactions.len(), plain.transactions.len());
    assert!(gz.snapshots.iter().all(|s| s.source_file == "2025-05-04.log.gz"));
    Ok(())
}

#[test]
fn test_file_of_only_garbage_is_unusable() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("2025-05-04.log");
    std::fs::write(&path, "{\"timestamp\": nope}\n{broken\n")?;

    let mut sink = CollectingSink::default();
    let stats = shred_snapshot_file(&path, &mut sink)?;

    assert_eq!(stats.snapshots, 0);
    assert_eq!(stats.malformed_documents, 2);
    assert!(stats.is_unusable());
    Ok(())
}
