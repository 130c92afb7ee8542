use poolscope_types::{AuthorizationRecord, SnapshotRecord, TransactionRecord};
use std::io;

/// Destination of decomposed snapshot records
///
/// Responsibilities:
/// - Accept records in emission order (transactions and their
///   authorizations first, the owning snapshot last)
/// - Route each record to its stream and partition
pub trait RecordSink {
    fn transaction(&mut self, record: &TransactionRecord) -> io::Result<()>;

    fn authorization(&mut self, record: &AuthorizationRecord) -> io::Result<()>;

    fn snapshot(&mut self, record: &SnapshotRecord) -> io::Result<()>;
}

/// In-memory sink, used by tests and small inspections
#[derive(Debug, Default, Clone)]
pub struct CollectingSink {
    pub transactions: Vec<TransactionRecord>,
    pub authorizations: Vec<AuthorizationRecord>,
    pub snapshots: Vec<SnapshotRecord>,
}

impl RecordSink for CollectingSink {
    fn transaction(&mut self, record: &TransactionRecord) -> io::Result<()> {
        self.transactions.push(record.clone());
        Ok(())
    }

    fn authorization(&mut self, record: &AuthorizationRecord) -> io::Result<()> {
        self.authorizations.push(record.clone());
        Ok(())
    }

    fn snapshot(&mut self, record: &SnapshotRecord) -> io::Result<()> {
        self.snapshots.push(record.clone());
        Ok(())
    }
}

impl<S: RecordSink + ?Sized> RecordSink for &mut S {
    fn transaction(&mut self, record: &TransactionRecord) -> io::Result<()> {
        (**self).transaction(record)
    }

    fn authorization(&mut self, record: &AuthorizationRecord) -> io::Result<()> {
        (**self).authorization(record)
    }

    fn snapshot(&mut self, record: &SnapshotRecord) -> io::Result<()> {
        (**self).snapshot(record)
    }
}
