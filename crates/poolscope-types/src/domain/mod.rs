mod partition;
mod record;

pub use partition::*;
pub use record::*;
