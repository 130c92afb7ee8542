// Error types
pub mod error;

// Sink trait for decomposed records
pub mod traits;

// Line and document readers over plain or gzip input
pub mod reader;

// Mempool snapshot shredder
pub mod mempool;

// Trace log classifier
pub mod trace;

pub use error::{Error, Result};
pub use traits::{CollectingSink, RecordSink};

pub use reader::{
    Document, DocumentRead, DocumentReader, InputStream, JsonDeserializer, LineReader, RawLine,
    open_input,
};

pub use mempool::{
    DEFAULT_LARGE_DOCUMENT_WARN_BYTES, MempoolShredder, ShredOptions, shred_snapshot_file,
};

pub use trace::{
    ClassifierOptions, DEFAULT_MAX_ENTRY_LINES, EntryOutcome, EventMatcher, MatcherDefinition,
    TraceClassifier,
};
