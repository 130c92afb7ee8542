mod partition;

pub use partition::{PartitionedSink, StreamDirs, part_file_name};
