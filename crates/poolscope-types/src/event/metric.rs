use super::{Category, LogEvent};
use crate::DateBucket;
use serde::{Deserialize, Serialize};

/// Aggregation key `(date, category, metric_name)`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MetricKey {
    pub date: DateBucket,
    pub category: Category,
    pub metric_name: String,
}

impl MetricKey {
    pub fn new(date: DateBucket, category: Category, metric_name: impl Into<String>) -> Self {
        Self {
            date,
            category,
            metric_name: metric_name.into(),
        }
    }

    pub fn for_event(event: &LogEvent) -> Self {
        Self::new(
            event.date_bucket(),
            event.category,
            event.metric_name.clone(),
        )
    }
}

/// Finalized aggregation cell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricCounter {
    pub date: DateBucket,
    pub category: Category,
    pub metric_name: String,
    pub total_count: u64,
}

impl MetricCounter {
    pub fn new(key: MetricKey, total_count: u64) -> Self {
        Self {
            date: key.date,
            category: key.category,
            metric_name: key.metric_name,
            total_count,
        }
    }

    pub fn key(&self) -> MetricKey {
        MetricKey::new(self.date, self.category, self.metric_name.clone())
    }
}
