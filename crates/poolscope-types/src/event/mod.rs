mod category;
mod log_event;
mod metric;

pub use category::Category;
pub use log_event::LogEvent;
pub use metric::{MetricCounter, MetricKey};
