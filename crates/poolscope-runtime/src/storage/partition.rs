use flate2::Compression;
use flate2::write::GzEncoder;
use poolscope_providers::RecordSink;
use poolscope_types::{
    AuthorizationRecord, PartitionDate, RecordStream, SnapshotRecord, TransactionRecord,
    sanitize_component,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Output root of each record stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDirs {
    pub transactions: PathBuf,
    pub snapshots: PathBuf,
    pub authorizations: PathBuf,
}

impl StreamDirs {
    /// Without an explicit authorizations dir, use an `authorizations`
    /// sibling of the transactions dir.
    pub fn new(
        transactions: PathBuf,
        snapshots: PathBuf,
        authorizations: Option<PathBuf>,
    ) -> Self {
        let authorizations = authorizations.unwrap_or_else(|| {
            transactions
                .parent()
                .map(|p| p.join("authorizations"))
                .unwrap_or_else(|| PathBuf::from("authorizations"))
        });
        Self {
            transactions,
            snapshots,
            authorizations,
        }
    }

    pub fn dir(&self, stream: RecordStream) -> &Path {
        match stream {
            RecordStream::Transactions => &self.transactions,
            RecordStream::Snapshots => &self.snapshots,
            RecordStream::Authorizations => &self.authorizations,
        }
    }

    pub fn create_all(&self) -> io::Result<()> {
        for stream in RecordStream::ALL {
            std::fs::create_dir_all(self.dir(stream))?;
        }
        Ok(())
    }
}

/// Part file name for an input file: `part-<sanitized name>.jsonl.gz`
pub fn part_file_name(source_file: &Path) -> String {
    let name = source_file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("part-{}.jsonl.gz", sanitize_component(&name))
}

struct PartWriter {
    path: PathBuf,
    encoder: GzEncoder<BufWriter<File>>,
    records: u64,
}

/// [`RecordSink`] writing gzip JSONL part files, one per stream and
/// partition, for a single input file.
///
/// Part files are opened lazily and truncated on open, so a re-run over the
/// same input rewrites them with identical bytes.
pub struct PartitionedSink {
    dirs: StreamDirs,
    part_name: String,
    level: Compression,
    writers: BTreeMap<(RecordStream, PartitionDate), PartWriter>,
}

impl PartitionedSink {
    pub fn new(dirs: &StreamDirs, source_file: &Path, compression_level: u32) -> Self {
        Self {
            dirs: dirs.clone(),
            part_name: part_file_name(source_file),
            level: Compression::new(compression_level.min(9)),
            writers: BTreeMap::new(),
        }
    }

    pub fn part_path(&self, stream: RecordStream, partition: PartitionDate) -> PathBuf {
        self.dirs
            .dir(stream)
            .join(partition.dir_name())
            .join(&self.part_name)
    }

    fn write<T: Serialize>(
        &mut self,
        stream: RecordStream,
        partition: PartitionDate,
        record: &T,
    ) -> io::Result<()> {
        let key = (stream, partition);
        if !self.writers.contains_key(&key) {
            let path = self.part_path(stream, partition);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = File::create(&path)?;
            log::debug!("writing {}", path.display());
            self.writers.insert(
                key,
                PartWriter {
                    path,
                    encoder: GzEncoder::new(BufWriter::new(file), self.level),
                    records: 0,
                },
            );
        }

        let Some(writer) = self.writers.get_mut(&key) else {
            return Ok(());
        };
        serde_json::to_writer(&mut writer.encoder, record).map_err(io::Error::from)?;
        writer.encoder.write_all(b"\n")?;
        writer.records += 1;
        Ok(())
    }

    /// Finish every part file; returns `(path, records)` in stream/partition order
    pub fn finish(self) -> io::Result<Vec<(PathBuf, u64)>> {
        let mut written = Vec::with_capacity(self.writers.len());
        for (_, writer) in self.writers {
            let mut inner = writer.encoder.finish()?;
            inner.flush()?;
            written.push((writer.path, writer.records));
        }
        Ok(written)
    }

    /// Drop every part file written so far
    pub fn abort(self) {
        for (_, writer) in self.writers {
            drop(writer.encoder);
            if let Err(e) = std::fs::remove_file(&writer.path) {
                log::debug!("could not remove {}: {}", writer.path.display(), e);
            }
        }
    }
}

impl RecordSink for PartitionedSink {
    fn transaction(&mut self, record: &TransactionRecord) -> io::Result<()> {
        self.write(RecordStream::Transactions, record.snapshot_date, record)
    }

    fn authorization(&mut self, record: &AuthorizationRecord) -> io::Result<()> {
        self.write(RecordStream::Authorizations, record.snapshot_date, record)
    }

    fn snapshot(&mut self, record: &SnapshotRecord) -> io::Result<()> {
        self.write(RecordStream::Snapshots, record.snapshot_date, record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::MultiGzDecoder;
    use std::io::Read;
    use tempfile::TempDir;

    fn snapshot(id: &str, date: PartitionDate) -> SnapshotRecord {
        SnapshotRecord {
            snapshot_id: id.to_string(),
            captured_at: None,
            pending_count: 0,
            queued_count: 0,
            snapshot_date: date,
            pending_tx_count: 0,
            queued_tx_count: 0,
            eip7702_tx_count: 0,
            collector_error: None,
            source_file: "2025-05-04.log".to_string(),
        }
    }

    fn gunzip(path: &Path) -> String {
        let mut out = String::new();
        MultiGzDecoder::new(File::open(path).unwrap())
            .read_to_string(&mut out)
            .unwrap();
        out
    }

    #[test]
    fn test_default_authorizations_dir_is_sibling() {
        let dirs = StreamDirs::new(
            PathBuf::from("/out/transactions"),
            PathBuf::from("/out/snapshots"),
            None,
        );
        assert_eq!(dirs.authorizations, PathBuf::from("/out/authorizations"));
    }

    #[test]
    fn test_part_file_name_is_sanitized() {
        assert_eq!(
            part_file_name(Path::new("/in/2025-05-04.log.gz")),
            "part-2025-05-04_log_gz.jsonl.gz"
        );
    }

    #[test]
    fn test_records_land_in_their_partition() -> io::Result<()> {
        let temp = TempDir::new()?;
        let dirs = StreamDirs::new(
            temp.path().join("tx"),
            temp.path().join("snap"),
            None,
        );
        let day: PartitionDate = "2025-05-04".parse().unwrap();

        let mut sink = PartitionedSink::new(&dirs, Path::new("2025-05-04.log"), 6);
        sink.snapshot(&snapshot("a", day))?;
        sink.snapshot(&snapshot("b", PartitionDate::Unknown))?;
        sink.snapshot(&snapshot("c", day))?;
        let written = sink.finish()?;

        assert_eq!(written.len(), 2);
        let day_part = temp
            .path()
            .join("snap/snapshot_date=2025-05-04/part-2025-05-04_log.jsonl.gz");
        assert_eq!(written[0], (day_part.clone(), 2));

        let lines: Vec<String> = gunzip(&day_part).lines().map(String::from).collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"snapshot_id\":\"a\""));
        assert!(
            temp.path()
                .join("snap/snapshot_date=unknown_date/part-2025-05-04_log.jsonl.gz")
                .exists()
        );
        assert!(!temp.path().join("tx").exists());
        Ok(())
    }

    #[test]
    fn test_abort_removes_parts() -> io::Result<()> {
        let temp = TempDir::new()?;
        let dirs = StreamDirs::new(temp.path().join("tx"), temp.path().join("snap"), None);

        let mut sink = PartitionedSink::new(&dirs, Path::new("x.log"), 1);
        sink.snapshot(&snapshot("a", PartitionDate::Unknown))?;
        let path = sink.part_path(RecordStream::Snapshots, PartitionDate::Unknown);
        assert!(path.exists());

        sink.abort();
        assert!(!path.exists());
        Ok(())
    }
}
