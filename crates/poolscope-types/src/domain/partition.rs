use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Label of the shred partition used when no capture date can be derived
pub const UNKNOWN_PARTITION: &str = "unknown_date";

/// Label of the aggregation bucket for events whose date cannot be resolved
pub const UNKNOWN_DATE_BUCKET: &str = "unknown-date";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Partition key of shredded records (`snapshot_date=<label>` directories)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PartitionDate {
    Day(NaiveDate),
    Unknown,
}

impl PartitionDate {
    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            PartitionDate::Day(date) => Some(*date),
            PartitionDate::Unknown => None,
        }
    }

    /// Directory name of this partition, e.g. `snapshot_date=2025-05-04`
    pub fn dir_name(&self) -> String {
        format!("snapshot_date={}", self)
    }
}

impl fmt::Display for PartitionDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartitionDate::Day(date) => write!(f, "{}", date.format(DATE_FORMAT)),
            PartitionDate::Unknown => f.write_str(UNKNOWN_PARTITION),
        }
    }
}

impl FromStr for PartitionDate {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == UNKNOWN_PARTITION {
            return Ok(PartitionDate::Unknown);
        }
        NaiveDate::parse_from_str(s, DATE_FORMAT).map(PartitionDate::Day)
    }
}

impl From<Option<NaiveDate>> for PartitionDate {
    fn from(date: Option<NaiveDate>) -> Self {
        date.map_or(PartitionDate::Unknown, PartitionDate::Day)
    }
}

impl Serialize for PartitionDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PartitionDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Date component of a metric key
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DateBucket {
    Day(NaiveDate),
    Unknown,
}

impl DateBucket {
    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            DateBucket::Day(date) => Some(*date),
            DateBucket::Unknown => None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, DateBucket::Unknown)
    }
}

impl fmt::Display for DateBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateBucket::Day(date) => write!(f, "{}", date.format(DATE_FORMAT)),
            DateBucket::Unknown => f.write_str(UNKNOWN_DATE_BUCKET),
        }
    }
}

impl FromStr for DateBucket {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == UNKNOWN_DATE_BUCKET {
            return Ok(DateBucket::Unknown);
        }
        NaiveDate::parse_from_str(s, DATE_FORMAT).map(DateBucket::Day)
    }
}

impl From<Option<NaiveDate>> for DateBucket {
    fn from(date: Option<NaiveDate>) -> Self {
        date.map_or(DateBucket::Unknown, DateBucket::Day)
    }
}

impl Serialize for DateBucket {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DateBucket {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
