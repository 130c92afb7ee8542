use poolscope_types::{LogEvent, MetricCounter, MetricKey};
use std::collections::BTreeMap;

/// Running `(date, category, metric_name)` counters.
///
/// Counters only grow during a run and saturate at `u64::MAX`. Two
/// accumulators merge by key-wise summation, so per-file accumulators can be
/// reduced in any order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricAccumulator {
    counters: BTreeMap<MetricKey, u64>,
}

impl MetricAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `event.count` under the event's key
    pub fn record(&mut self, event: &LogEvent) {
        self.add(MetricKey::for_event(event), event.count);
    }

    pub fn add(&mut self, key: MetricKey, count: u64) {
        let counter = self.counters.entry(key).or_insert(0);
        *counter = counter.saturating_add(count);
    }

    pub fn merge(&mut self, other: &MetricAccumulator) {
        for (key, count) in &other.counters {
            self.add(key.clone(), *count);
        }
    }

    pub fn get(&self, key: &MetricKey) -> u64 {
        self.counters.get(key).copied().unwrap_or(0)
    }

    /// Sum of every counter
    pub fn total(&self) -> u64 {
        self.counters
            .values()
            .fold(0u64, |acc, count| acc.saturating_add(*count))
    }

    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MetricKey, u64)> {
        self.counters.iter().map(|(k, v)| (k, *v))
    }

    /// Final rows, ordered by key, zero counters dropped
    pub fn counters(&self) -> Vec<MetricCounter> {
        self.counters
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(key, count)| MetricCounter::new(key.clone(), *count))
            .collect()
    }
}

impl<'a> Extend<&'a LogEvent> for MetricAccumulator {
    fn extend<I: IntoIterator<Item = &'a LogEvent>>(&mut self, events: I) {
        for event in events {
            self.record(event);
        }
    }
}

impl Extend<LogEvent> for MetricAccumulator {
    fn extend<I: IntoIterator<Item = LogEvent>>(&mut self, events: I) {
        for event in events {
            self.record(&event);
        }
    }
}

impl<'a> FromIterator<&'a LogEvent> for MetricAccumulator {
    fn from_iter<I: IntoIterator<Item = &'a LogEvent>>(events: I) -> Self {
        let mut acc = Self::new();
        acc.extend(events);
        acc
    }
}

impl FromIterator<LogEvent> for MetricAccumulator {
    fn from_iter<I: IntoIterator<Item = LogEvent>>(events: I) -> Self {
        let mut acc = Self::new();
        acc.extend(events);
        acc
    }
}

impl FromIterator<MetricAccumulator> for MetricAccumulator {
    fn from_iter<I: IntoIterator<Item = MetricAccumulator>>(parts: I) -> Self {
        parts.into_iter().fold(Self::new(), |mut acc, part| {
            acc.merge(&part);
            acc
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use poolscope_types::{Category, DateBucket};

    fn event(day: Option<u32>, category: Category, metric: &str, count: u64) -> LogEvent {
        LogEvent {
            timestamp: day.map(|d| Utc.with_ymd_and_hms(2025, 5, d, 12, 0, 0).unwrap()),
            raw_timestamp: String::new(),
            category,
            metric_name: metric.to_string(),
            count,
            matched_fields: Default::default(),
            line_number: 1,
            matcher: "test".to_string(),
        }
    }

    fn sample() -> Vec<LogEvent> {
        vec![
            event(Some(4), Category::Invalidation, "underpriced", 1),
            event(Some(4), Category::Invalidation, "underpriced", 1),
            event(Some(4), Category::Removal, "stale", 3),
            event(Some(5), Category::Invalidation, "underpriced", 1),
            event(None, Category::Addition, "executable", 1),
        ]
    }

    #[test]
    fn test_counts_add_event_count() {
        let acc: MetricAccumulator = sample().iter().collect();

        let key = |d: u32, c, m: &str| {
            MetricKey::new(
                DateBucket::Day(chrono::NaiveDate::from_ymd_opt(2025, 5, d).unwrap()),
                c,
                m,
            )
        };
        assert_eq!(acc.get(&key(4, Category::Invalidation, "underpriced")), 2);
        assert_eq!(acc.get(&key(4, Category::Removal, "stale")), 3);
        assert_eq!(acc.get(&key(5, Category::Invalidation, "underpriced")), 1);
        assert_eq!(acc.get(&key(6, Category::Removal, "stale")), 0);
        assert_eq!(acc.total(), 7);
        assert_eq!(acc.len(), 4);
    }

    #[test]
    fn test_unknown_date_bucket_sorts_last() {
        let rows = MetricAccumulator::from_iter(sample()).counters();

        let last = rows.last().unwrap();
        assert!(last.date.is_unknown());
        assert_eq!(last.metric_name, "executable");
    }

    #[test]
    fn test_merge_of_subsets_equals_whole() {
        let events = sample();
        let whole: MetricAccumulator = events.iter().collect();

        for split in 0..=events.len() {
            let (left, right) = events.split_at(split);
            let left: MetricAccumulator = left.iter().collect();
            let right: MetricAccumulator = right.iter().collect();

            let mut lr = left.clone();
            lr.merge(&right);
            let mut rl = right.clone();
            rl.merge(&left);

            assert_eq!(lr, whole);
            assert_eq!(rl, whole);
        }
    }

    #[test]
    fn test_zero_counters_are_not_reported() {
        let mut acc = MetricAccumulator::new();
        acc.add(
            MetricKey::new(DateBucket::Unknown, Category::Replacement, "noop"),
            0,
        );

        assert_eq!(acc.len(), 1);
        assert!(acc.counters().is_empty());
    }

    #[test]
    fn test_counters_saturate_instead_of_wrapping() {
        let key = MetricKey::new(DateBucket::Unknown, Category::Removal, "stale");
        let mut left = MetricAccumulator::new();
        left.add(key.clone(), u64::MAX - 1);
        left.add(key.clone(), 5);
        assert_eq!(left.get(&key), u64::MAX);

        let mut right = MetricAccumulator::new();
        right.add(key.clone(), 3);
        right.add(
            MetricKey::new(DateBucket::Unknown, Category::Addition, "executable"),
            1,
        );
        right.merge(&left);

        assert_eq!(right.get(&key), u64::MAX);
        assert_eq!(right.total(), u64::MAX);
    }
}
