use std::fmt;
use std::path::PathBuf;

/// Result type for poolscope-types operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared by both pipelines.
///
/// `Io` and `Decode` are file-level: they abort the current input file and
/// are surfaced to the operator. `MalformedRecord` and `AggregationKey` are
/// record-level: callers absorb them into counters and keep going.
#[derive(Debug)]
pub enum Error {
    /// File missing or unreadable
    Io {
        path: PathBuf,
        offset: u64,
        source: std::io::Error,
    },

    /// Corrupt compression stream or invalid text encoding
    Decode {
        path: PathBuf,
        offset: u64,
        reason: String,
    },

    /// A record or line matched but carried missing/corrupt fields
    MalformedRecord { context: String, reason: String },

    /// A timestamp could not be mapped to a calendar date
    AggregationKey { timestamp: String },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, offset: u64, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            offset,
            source,
        }
    }

    pub fn decode(path: impl Into<PathBuf>, offset: u64, reason: impl Into<String>) -> Self {
        Error::Decode {
            path: path.into(),
            offset,
            reason: reason.into(),
        }
    }

    pub fn malformed(context: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::MalformedRecord {
            context: context.into(),
            reason: reason.into(),
        }
    }

    /// True for errors that abort processing of the current file
    pub fn is_file_level(&self) -> bool {
        matches!(self, Error::Io { .. } | Error::Decode { .. })
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io {
                path,
                offset,
                source,
            } => write!(
                f,
                "IO error in {} at byte {}: {}",
                path.display(),
                offset,
                source
            ),
            Error::Decode {
                path,
                offset,
                reason,
            } => write!(
                f,
                "Decode error in {} at byte {}: {}",
                path.display(),
                offset,
                reason
            ),
            Error::MalformedRecord { context, reason } => {
                write!(f, "Malformed record ({}): {}", context, reason)
            }
            Error::AggregationKey { timestamp } => {
                write!(f, "Cannot map timestamp '{}' to a date", timestamp)
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io { source, .. } => Some(source),
            Error::Decode { .. } | Error::MalformedRecord { .. } | Error::AggregationKey { .. } => {
                None
            }
        }
    }
}
