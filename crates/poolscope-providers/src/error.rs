use std::fmt;
use std::path::PathBuf;

/// Result type for poolscope-providers operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while reading and decomposing log files
#[derive(Debug)]
pub enum Error {
    /// File-level stream failure (`Io` / `Decode`)
    Stream(poolscope_types::Error),

    /// A JSON document could not be read and the reader could not recover
    Json {
        path: PathBuf,
        offset: u64,
        source: serde_json::Error,
    },

    /// Writing a decomposed record to its sink failed
    Sink(std::io::Error),

    /// A matcher pattern failed to compile
    Pattern(regex::Error),

    /// Invalid matcher definition
    Config(String),
}

impl Error {
    /// True when the error aborts the whole input file
    pub fn is_file_level(&self) -> bool {
        match self {
            Error::Stream(err) => err.is_file_level(),
            Error::Json { .. } | Error::Sink(_) => true,
            Error::Pattern(_) | Error::Config(_) => false,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Stream(err) => write!(f, "{}", err),
            Error::Json {
                path,
                offset,
                source,
            } => write!(
                f,
                "JSON error in {} at byte {}: {}",
                path.display(),
                offset,
                source
            ),
            Error::Sink(err) => write!(f, "Sink error: {}", err),
            Error::Pattern(err) => write!(f, "Pattern error: {}", err),
            Error::Config(msg) => write!(f, "Matcher config error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Stream(err) => Some(err),
            Error::Json { source, .. } => Some(source),
            Error::Sink(err) => Some(err),
            Error::Pattern(err) => Some(err),
            Error::Config(_) => None,
        }
    }
}

impl From<poolscope_types::Error> for Error {
    fn from(err: poolscope_types::Error) -> Self {
        Error::Stream(err)
    }
}

impl From<regex::Error> for Error {
    fn from(err: regex::Error) -> Self {
        Error::Pattern(err)
    }
}
