pub mod config;
pub mod discovery;
pub mod error;
pub mod ops;
pub mod storage;

pub use config::{Config, ShredConfig, TraceConfig, resolve_config_path};
pub use discovery::discover_files;
pub use error::{Error, Result};
pub use ops::{
    AggregateProgress, AggregateRequest, AggregateService, ShredProgress, ShredRequest,
    ShredService,
};
pub use storage::{PartitionedSink, StreamDirs};
