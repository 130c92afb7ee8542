use super::mapper::{SnapshotIdentity, map_transaction};
use super::schema::{RawTransaction, Scalar};
use crate::reader::{DocumentRead, DocumentReader};
use crate::traits::RecordSink;
use crate::{Error, Result};
use chrono::NaiveDate;
use poolscope_types::{
    PoolStatus, ShredStats, SnapshotRecord, date_from_file_stem, parse_quantity,
};
use serde::Deserialize;
use serde::de::{self, DeserializeSeed, Deserializer, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;
use std::io;
use std::path::Path;

/// Default threshold for the large-document warning (50 MiB)
pub const DEFAULT_LARGE_DOCUMENT_WARN_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct ShredOptions {
    pub large_document_warn_bytes: u64,
}

impl Default for ShredOptions {
    fn default() -> Self {
        Self {
            large_document_warn_bytes: DEFAULT_LARGE_DOCUMENT_WARN_BYTES,
        }
    }
}

/// Decomposes mempool snapshot files into flat records.
///
/// Each document is walked with a streaming visitor; only one sender's nonce
/// map is held in memory at a time (plus, for documents that place
/// `snapshot` before `timestamp`, the decoded transactions of that document).
#[derive(Debug, Clone, Default)]
pub struct MempoolShredder {
    options: ShredOptions,
}

impl MempoolShredder {
    pub fn new(options: ShredOptions) -> Self {
        Self { options }
    }

    /// Shred every document of `path` into `sink`.
    ///
    /// Malformed documents and records are counted and skipped. Stream
    /// failures and sink failures abort the file.
    pub fn shred_file<S: RecordSink>(&self, path: &Path, sink: &mut S) -> Result<ShredStats> {
        let mut reader = DocumentReader::open(path)?;
        let source_file = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let file_date = date_from_file_stem(path);
        if file_date.is_none() {
            log::debug!("{}: no YYYY-MM-DD in file name", path.display());
        }

        let mut stats = ShredStats::default();

        loop {
            let index = reader.documents_read();
            let mut ctx = DocumentContext::new(&mut *sink, &source_file, file_date, index);
            let read = reader.next_document(|de| DocumentSeed { ctx: &mut ctx }.deserialize(de));

            if let Some(err) = ctx.sink_error.take() {
                stats += &ctx.stats;
                return Err(Error::Sink(err));
            }

            match read? {
                None => {
                    stats += &ctx.stats;
                    break;
                }
                Some(DocumentRead::Parsed(doc)) => {
                    stats.documents += 1;
                    if doc.len > self.options.large_document_warn_bytes {
                        log::warn!(
                            "{}: document {} is very large ({:.2} MiB)",
                            path.display(),
                            doc.index,
                            doc.len as f64 / (1024.0 * 1024.0)
                        );
                    }
                    if doc.value == Shape::Map {
                        ctx.finish().map_err(Error::Sink)?;
                    } else {
                        log::debug!(
                            "{}: document {} is not an object",
                            path.display(),
                            doc.index
                        );
                        stats.malformed_documents += 1;
                    }
                    stats += &ctx.stats;
                }
                Some(DocumentRead::Malformed {
                    index,
                    offset,
                    error,
                }) => {
                    log::debug!(
                        "{}: skipping malformed document {} at byte {}: {}",
                        path.display(),
                        index,
                        offset,
                        error
                    );
                    stats.documents += 1;
                    stats.malformed_documents += 1;
                    ctx.close_truncated(&error).map_err(Error::Sink)?;
                    stats += &ctx.stats;
                }
            }
        }

        stats.bytes_read = reader.bytes_read();
        if stats.partition_mismatches > 0 {
            log::warn!(
                "{}: {} snapshot(s) captured on a different day than the file name says",
                path.display(),
                stats.partition_mismatches
            );
        }
        Ok(stats)
    }
}

// --- Document walk ---

#[derive(Debug, Default)]
struct DocumentHeader {
    pending_count: u64,
    queued_count: u64,
    error: Option<String>,
}

#[derive(Debug, Default)]
struct Observed {
    pending: u64,
    queued: u64,
    eip7702: u64,
}

/// Per-document state threaded through the seeds
struct DocumentContext<'a, S> {
    sink: &'a mut S,
    source_file: &'a str,
    file_date: Option<NaiveDate>,
    index: u64,
    header: DocumentHeader,
    identity: Option<SnapshotIdentity>,
    /// Transactions decoded before the document's timestamp was seen
    held: Vec<(PoolStatus, RawTransaction)>,
    observed: Observed,
    stats: ShredStats,
    sink_error: Option<io::Error>,
}

impl<'a, S: RecordSink> DocumentContext<'a, S> {
    fn new(sink: &'a mut S, source_file: &'a str, file_date: Option<NaiveDate>, index: u64) -> Self {
        Self {
            sink,
            source_file,
            file_date,
            index,
            header: DocumentHeader::default(),
            identity: None,
            held: Vec::new(),
            observed: Observed::default(),
            stats: ShredStats::default(),
            sink_error: None,
        }
    }

    fn set_timestamp(&mut self, raw: Option<String>) {
        if self.identity.is_none() {
            self.resolve_identity(raw.as_deref());
        }
    }

    fn resolve_identity(&mut self, raw: Option<&str>) {
        let identity = SnapshotIdentity::resolve(raw, self.source_file, self.file_date, self.index);
        if identity.partition_mismatch {
            log::debug!(
                "{}: document {} captured at {:?} is filed under {:?}",
                self.source_file,
                self.index,
                identity.captured_at,
                self.file_date
            );
            self.stats.partition_mismatches += 1;
        }
        self.identity = Some(identity);
    }

    /// Stash a sink failure and turn it into a deserializer error that
    /// unwinds the walk
    fn fail<E: de::Error>(&mut self, err: io::Error) -> E {
        let msg = format!("record sink failed: {}", err);
        self.sink_error = Some(err);
        E::custom(msg)
    }

    fn accept_leaf(&mut self, status: PoolStatus, leaf: Value) -> io::Result<()> {
        if !leaf.is_object() {
            log::debug!(
                "{}: document {}: skipping non-object {} transaction",
                self.source_file,
                self.index,
                status
            );
            self.stats.malformed_records += 1;
            return Ok(());
        }

        let raw = match RawTransaction::deserialize(leaf) {
            Ok(raw) => raw,
            Err(e) => {
                log::debug!("{}: undecodable transaction: {}", self.source_file, e);
                self.stats.malformed_records += 1;
                return Ok(());
            }
        };

        if self.identity.is_some() {
            self.emit(status, raw)
        } else {
            self.held.push((status, raw));
            Ok(())
        }
    }

    fn emit(&mut self, status: PoolStatus, raw: RawTransaction) -> io::Result<()> {
        let Some(identity) = self.identity.as_ref() else {
            return Ok(());
        };
        let mapped = map_transaction(raw, status, identity);

        if !mapped.issues.is_empty() {
            log::debug!(
                "{}: document {}: malformed transaction {:?}: {}",
                self.source_file,
                self.index,
                mapped.transaction.tx_hash,
                mapped.issues.join("; ")
            );
            self.stats.malformed_records += 1;
        }

        self.sink.transaction(&mapped.transaction)?;
        for auth in &mapped.authorizations {
            self.sink.authorization(auth)?;
        }

        match status {
            PoolStatus::Pending => self.observed.pending += 1,
            PoolStatus::Queued => self.observed.queued += 1,
        }
        if mapped.transaction.is_eip7702 {
            self.observed.eip7702 += 1;
            self.stats.eip7702_transactions += 1;
        }
        self.stats.transactions += 1;
        self.stats.authorizations += mapped.authorizations.len() as u64;
        Ok(())
    }

    /// Close a document that failed to parse part way through.
    ///
    /// Transactions already in the sink keep their snapshot: it is emitted
    /// with the counts observed so far and the parse error as
    /// `collector_error`. Held transactions were never written and are dropped.
    fn close_truncated(&mut self, error: &dyn fmt::Display) -> io::Result<()> {
        let dropped = std::mem::take(&mut self.held).len();
        if dropped > 0 {
            log::debug!(
                "{}: document {}: dropping {} transactions held before the timestamp",
                self.source_file,
                self.index,
                dropped
            );
        }
        if self.observed.pending + self.observed.queued == 0 {
            return Ok(());
        }

        let reason = format!("truncated document: {}", error);
        self.header.error = Some(match self.header.error.take() {
            Some(collector) => format!("{}; {}", collector, reason),
            None => reason,
        });
        self.finish()
    }

    /// Flush held transactions and emit the snapshot record
    fn finish(&mut self) -> io::Result<()> {
        if self.identity.is_none() {
            self.resolve_identity(None);
        }
        for (status, raw) in std::mem::take(&mut self.held) {
            self.emit(status, raw)?;
        }

        let Some(identity) = self.identity.as_ref() else {
            return Ok(());
        };
        let record = SnapshotRecord {
            snapshot_id: identity.snapshot_id.clone(),
            captured_at: identity.captured_at,
            pending_count: self.header.pending_count,
            queued_count: self.header.queued_count,
            snapshot_date: identity.snapshot_date,
            pending_tx_count: self.observed.pending,
            queued_tx_count: self.observed.queued,
            eip7702_tx_count: self.observed.eip7702,
            collector_error: self.header.error.take(),
            source_file: identity.source_file.clone(),
        };
        self.sink.snapshot(&record)?;
        self.stats.snapshots += 1;
        Ok(())
    }
}

/// What a tolerant visitor found where it expected an object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Map,
    Null,
    Other,
}

/// Accept non-object values instead of failing the whole document
macro_rules! tolerate_non_maps {
    ($de:lifetime) => {
        fn visit_bool<E: de::Error>(self, _: bool) -> std::result::Result<Shape, E> {
            Ok(Shape::Other)
        }

        fn visit_i64<E: de::Error>(self, _: i64) -> std::result::Result<Shape, E> {
            Ok(Shape::Other)
        }

        fn visit_u64<E: de::Error>(self, _: u64) -> std::result::Result<Shape, E> {
            Ok(Shape::Other)
        }

        fn visit_f64<E: de::Error>(self, _: f64) -> std::result::Result<Shape, E> {
            Ok(Shape::Other)
        }

        fn visit_unit<E: de::Error>(self) -> std::result::Result<Shape, E> {
            Ok(Shape::Null)
        }

        fn visit_seq<A: SeqAccess<$de>>(self, mut seq: A) -> std::result::Result<Shape, A::Error> {
            while seq.next_element::<IgnoredAny>()?.is_some() {}
            Ok(Shape::Other)
        }
    };
}

/// Top-level collector record
struct DocumentSeed<'c, 'a, S> {
    ctx: &'c mut DocumentContext<'a, S>,
}

impl<'de, S: RecordSink> DeserializeSeed<'de> for DocumentSeed<'_, '_, S> {
    type Value = Shape;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> std::result::Result<Shape, D::Error> {
        deserializer.deserialize_any(self)
    }
}

impl<'de, S: RecordSink> Visitor<'de> for DocumentSeed<'_, '_, S> {
    type Value = Shape;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a mempool snapshot document")
    }

    tolerate_non_maps!('de);

    fn visit_str<E: de::Error>(self, _: &str) -> std::result::Result<Shape, E> {
        Ok(Shape::Other)
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Shape, A::Error> {
        while let Some(key) = map.next_key::<String>()? {
            match key.as_str() {
                "timestamp" => {
                    let raw: Option<Scalar> = map.next_value()?;
                    self.ctx.set_timestamp(raw.and_then(|s| s.to_text()));
                }
                "pending_count" => {
                    let raw: Option<Scalar> = map.next_value()?;
                    self.ctx.header.pending_count = raw.and_then(|s| s.as_u64()).unwrap_or(0);
                }
                "queued_count" => {
                    let raw: Option<Scalar> = map.next_value()?;
                    self.ctx.header.queued_count = raw.and_then(|s| s.as_u64()).unwrap_or(0);
                }
                "error" => {
                    let raw: Option<Scalar> = map.next_value()?;
                    self.ctx.header.error = raw.and_then(|s| s.to_text());
                }
                "snapshot" => {
                    let shape = map.next_value_seed(SnapshotSeed {
                        ctx: &mut *self.ctx,
                    })?;
                    if shape == Shape::Other {
                        log::debug!(
                            "{}: document {}: snapshot is neither object nor string",
                            self.ctx.source_file,
                            self.ctx.index
                        );
                        self.ctx.stats.malformed_records += 1;
                    }
                }
                _ => {
                    map.next_value::<IgnoredAny>()?;
                }
            }
        }
        Ok(Shape::Map)
    }
}

/// `snapshot` field: `{pending, queued}` or that object encoded as a string
struct SnapshotSeed<'c, 'a, S> {
    ctx: &'c mut DocumentContext<'a, S>,
}

impl<'de, S: RecordSink> DeserializeSeed<'de> for SnapshotSeed<'_, '_, S> {
    type Value = Shape;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> std::result::Result<Shape, D::Error> {
        deserializer.deserialize_any(self)
    }
}

impl<'de, S: RecordSink> Visitor<'de> for SnapshotSeed<'_, '_, S> {
    type Value = Shape;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a txpool content object")
    }

    tolerate_non_maps!('de);

    fn visit_str<E: de::Error>(self, inner: &str) -> std::result::Result<Shape, E> {
        let mut de = serde_json::Deserializer::from_str(inner);
        let parsed = SnapshotSeed {
            ctx: &mut *self.ctx,
        }
        .deserialize(&mut de)
        .and_then(|shape| de.end().map(|_| shape));

        match parsed {
            Ok(shape) => Ok(shape),
            Err(e) if self.ctx.sink_error.is_some() => Err(E::custom(e)),
            Err(e) => {
                log::debug!(
                    "{}: document {}: malformed inner snapshot string: {}",
                    self.ctx.source_file,
                    self.ctx.index,
                    e
                );
                self.ctx.stats.malformed_records += 1;
                Ok(Shape::Null)
            }
        }
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Shape, A::Error> {
        while let Some(key) = map.next_key::<String>()? {
            let status = match key.as_str() {
                "pending" => PoolStatus::Pending,
                "queued" => PoolStatus::Queued,
                _ => {
                    map.next_value::<IgnoredAny>()?;
                    continue;
                }
            };
            let shape = map.next_value_seed(PoolSeed {
                ctx: &mut *self.ctx,
                status,
            })?;
            if shape == Shape::Other {
                self.ctx.stats.malformed_records += 1;
            }
        }
        Ok(Shape::Map)
    }
}

/// `{sender: {nonce: tx}}` section of one pool
struct PoolSeed<'c, 'a, S> {
    ctx: &'c mut DocumentContext<'a, S>,
    status: PoolStatus,
}

impl<'de, S: RecordSink> DeserializeSeed<'de> for PoolSeed<'_, '_, S> {
    type Value = Shape;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> std::result::Result<Shape, D::Error> {
        deserializer.deserialize_any(self)
    }
}

impl<'de, S: RecordSink> Visitor<'de> for PoolSeed<'_, '_, S> {
    type Value = Shape;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map of senders")
    }

    tolerate_non_maps!('de);

    fn visit_str<E: de::Error>(self, _: &str) -> std::result::Result<Shape, E> {
        Ok(Shape::Other)
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Shape, A::Error> {
        while map.next_key::<IgnoredAny>()?.is_some() {
            let shape = map.next_value_seed(SenderSeed {
                ctx: &mut *self.ctx,
                status: self.status,
            })?;
            if shape == Shape::Other {
                self.ctx.stats.malformed_records += 1;
            }
        }
        Ok(Shape::Map)
    }
}

/// Nonce map of one sender; collected and emitted in ascending nonce order
struct SenderSeed<'c, 'a, S> {
    ctx: &'c mut DocumentContext<'a, S>,
    status: PoolStatus,
}

impl<'de, S: RecordSink> DeserializeSeed<'de> for SenderSeed<'_, '_, S> {
    type Value = Shape;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> std::result::Result<Shape, D::Error> {
        deserializer.deserialize_any(self)
    }
}

impl<'de, S: RecordSink> Visitor<'de> for SenderSeed<'_, '_, S> {
    type Value = Shape;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map of nonces to transactions")
    }

    tolerate_non_maps!('de);

    fn visit_str<E: de::Error>(self, _: &str) -> std::result::Result<Shape, E> {
        Ok(Shape::Other)
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Shape, A::Error> {
        let mut leaves: Vec<(NonceKey, Value)> = Vec::new();
        while let Some(key) = map.next_key::<String>()? {
            let leaf: Value = map.next_value()?;
            leaves.push((NonceKey::parse(key), leaf));
        }
        leaves.sort_by(|a, b| a.0.cmp(&b.0));

        for (_, leaf) in leaves {
            if let Err(e) = self.ctx.accept_leaf(self.status, leaf) {
                return Err(self.ctx.fail(e));
            }
        }
        Ok(Shape::Map)
    }
}

/// Ordering key of a nonce map entry: numeric nonces ascending, then
/// undecodable keys lexicographically
#[derive(Debug, Clone, PartialEq, Eq)]
enum NonceKey {
    Numeric(u128),
    Text(String),
}

impl NonceKey {
    fn parse(raw: String) -> Self {
        match parse_quantity(&raw) {
            Some(n) => NonceKey::Numeric(n),
            None => NonceKey::Text(raw),
        }
    }
}

impl Ord for NonceKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (NonceKey::Numeric(a), NonceKey::Numeric(b)) => a.cmp(b),
            (NonceKey::Numeric(_), NonceKey::Text(_)) => Ordering::Less,
            (NonceKey::Text(_), NonceKey::Numeric(_)) => Ordering::Greater,
            (NonceKey::Text(a), NonceKey::Text(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for NonceKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
