//! Trace log classification.
//!
//! Lines are grouped into logical entries, each entry is matched against an
//! ordered set of tagged matchers, and matches become [`LogEvent`]s.
//!
//! [`LogEvent`]: poolscope_types::LogEvent

mod classifier;
mod fields;
mod matcher;
mod timestamp;

pub use classifier::{ClassifierOptions, DEFAULT_MAX_ENTRY_LINES, EntryOutcome, TraceClassifier};
pub use fields::parse_logfmt;
pub use matcher::{
    CategoryRule, EventMatcher, MatchedEvent, MatcherDefinition, MetricRule, builtin_matchers,
};
pub use timestamp::{LineStamp, Prefix, split_prefix};
