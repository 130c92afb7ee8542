use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use poolscope_types::Error;
use regex::{Captures, Regex};
use std::sync::LazyLock;

/// `2025-05-04T00:00:05Z payload`, fractional seconds and offsets allowed
static RFC3339_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(\d{4})-(\d{2})-(\d{2})[Tt](\d{2}):(\d{2}):(\d{2})(?:\.(\d{1,9}))?(Z|z|[+-]\d{2}:\d{2})(?:\s+|$)",
    )
    .unwrap()
});

/// Node terminal format: `TRACE[05-04|00:00:05.123] payload`
static TERMINAL_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Z]{4,5})\s*\[(\d{2})-(\d{2})\|(\d{2}):(\d{2}):(\d{2})(?:\.(\d{1,9}))?\]\s*")
        .unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StampDate {
    Full { year: i32, month: u32, day: u32 },
    /// Terminal lines carry no year
    MonthDay { month: u32, day: u32 },
}

/// Timestamp taken from a line prefix.
///
/// The time of day is validated when the prefix is parsed; the calendar date
/// is only checked by [`LineStamp::resolve`], because a terminal-format line
/// needs a year from elsewhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineStamp {
    raw: String,
    date: StampDate,
    time: NaiveTime,
    offset_secs: i32,
}

impl LineStamp {
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// True when the stamp needs an external year
    pub fn needs_year(&self) -> bool {
        matches!(self.date, StampDate::MonthDay { .. })
    }

    /// Map the stamp to an instant, using `year` for terminal-format lines
    pub fn resolve(&self, year: Option<i32>) -> Result<DateTime<Utc>, Error> {
        let unresolvable = || Error::AggregationKey {
            timestamp: self.raw.clone(),
        };

        let (year, month, day) = match self.date {
            StampDate::Full { year, month, day } => (year, month, day),
            StampDate::MonthDay { month, day } => (year.ok_or_else(unresolvable)?, month, day),
        };
        let date = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(unresolvable)?;
        let offset = FixedOffset::east_opt(self.offset_secs).ok_or_else(unresolvable)?;

        offset
            .from_local_datetime(&date.and_time(self.time))
            .single()
            .map(|ts| ts.with_timezone(&Utc))
            .ok_or_else(unresolvable)
    }
}

/// Result of inspecting the start of a line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prefix<'a> {
    Stamped { stamp: LineStamp, payload: &'a str },
    /// Looks like a timestamp prefix but the time of day is impossible
    Corrupt { raw: &'a str },
    Bare,
}

pub fn split_prefix(line: &str) -> Prefix<'_> {
    if let Some(caps) = RFC3339_PREFIX.captures(line) {
        let whole = caps.get(0).map_or("", |m| m.as_str());
        let raw = whole.trim_end();
        let payload = &line[whole.len()..];
        let date = StampDate::Full {
            year: number(&caps, 1) as i32,
            month: number(&caps, 2),
            day: number(&caps, 3),
        };
        return match (time_of_day(&caps, 4), utc_offset(&caps[8])) {
            (Some(time), Some(offset_secs)) => Prefix::Stamped {
                stamp: LineStamp {
                    raw: raw.to_string(),
                    date,
                    time,
                    offset_secs,
                },
                payload,
            },
            _ => Prefix::Corrupt { raw },
        };
    }

    if let Some(caps) = TERMINAL_PREFIX.captures(line) {
        let whole = caps.get(0).map_or("", |m| m.as_str());
        let raw = whole.trim_end();
        let payload = &line[whole.len()..];
        let date = StampDate::MonthDay {
            month: number(&caps, 2),
            day: number(&caps, 3),
        };
        return match time_of_day(&caps, 4) {
            Some(time) => Prefix::Stamped {
                stamp: LineStamp {
                    raw: raw.to_string(),
                    date,
                    time,
                    offset_secs: 0,
                },
                payload,
            },
            None => Prefix::Corrupt { raw },
        };
    }

    Prefix::Bare
}

fn number(caps: &Captures<'_>, i: usize) -> u32 {
    // Groups are all \d{2,4}, which always fits
    caps.get(i).and_then(|m| m.as_str().parse().ok()).unwrap_or(0)
}

/// hour, minute, second in groups `first..first+3`, fraction right after
fn time_of_day(caps: &Captures<'_>, first: usize) -> Option<NaiveTime> {
    let nanos = match caps.get(first + 3) {
        Some(frac) => format!("{:0<9}", frac.as_str()).parse().ok()?,
        None => 0,
    };
    NaiveTime::from_hms_nano_opt(
        number(caps, first),
        number(caps, first + 1),
        number(caps, first + 2),
        nanos,
    )
}

fn utc_offset(raw: &str) -> Option<i32> {
    if raw.eq_ignore_ascii_case("z") {
        return Some(0);
    }
    let sign = if raw.starts_with('-') { -1 } else { 1 };
    let hours: i32 = raw.get(1..3)?.parse().ok()?;
    let minutes: i32 = raw.get(4..6)?.parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }
    Some(sign * (hours * 3600 + minutes * 60))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stamped(line: &str) -> (LineStamp, &str) {
        match split_prefix(line) {
            Prefix::Stamped { stamp, payload } => (stamp, payload),
            other => panic!("expected a stamped line, got {:?}", other),
        }
    }

    #[test]
    fn test_rfc3339_prefix() {
        let (stamp, payload) = stamped("2025-05-04T00:00:05Z [txpool] discarded tx=0xdef");

        assert_eq!(stamp.raw(), "2025-05-04T00:00:05Z");
        assert_eq!(payload, "[txpool] discarded tx=0xdef");
        assert_eq!(
            stamp.resolve(None).unwrap().to_rfc3339(),
            "2025-05-04T00:00:05+00:00"
        );
    }

    #[test]
    fn test_rfc3339_offset_converts_to_utc() {
        let (stamp, _) = stamped("2025-05-04T01:30:00.5+02:00 hello");
        let ts = stamp.resolve(None).unwrap();

        assert_eq!(ts.date_naive(), NaiveDate::from_ymd_opt(2025, 5, 3).unwrap());
        assert_eq!(ts.format("%H:%M:%S%.3f").to_string(), "23:30:00.500");
    }

    #[test]
    fn test_terminal_prefix_needs_a_year() {
        let (stamp, payload) =
            stamped("TRACE[05-04|00:00:05.123] Discarding already known transaction hash=0x1");

        assert!(stamp.needs_year());
        assert_eq!(stamp.raw(), "TRACE[05-04|00:00:05.123]");
        assert_eq!(payload, "Discarding already known transaction hash=0x1");
        assert!(matches!(
            stamp.resolve(None),
            Err(Error::AggregationKey { .. })
        ));
        assert_eq!(
            stamp.resolve(Some(2025)).unwrap().to_rfc3339(),
            "2025-05-04T00:00:05.123+00:00"
        );
    }

    #[test]
    fn test_padded_level_is_accepted() {
        let (_, payload) = stamped("INFO [05-04|10:11:12.000] Promoting queued transaction");
        assert_eq!(payload, "Promoting queued transaction");
    }

    #[test]
    fn test_impossible_date_is_unresolvable_not_corrupt() {
        let (stamp, _) = stamped("TRACE[02-30|10:00:00.000] Demoting pending transaction");
        assert!(matches!(
            stamp.resolve(Some(2025)),
            Err(Error::AggregationKey { .. })
        ));
    }

    #[test]
    fn test_impossible_time_is_corrupt() {
        assert_eq!(
            split_prefix("2025-05-04T25:00:00Z [txpool] added tx=0x1 reason=new"),
            Prefix::Corrupt {
                raw: "2025-05-04T25:00:00Z"
            }
        );
        assert!(matches!(
            split_prefix("TRACE[05-04|10:61:00.000] Promoting queued transaction"),
            Prefix::Corrupt { .. }
        ));
    }

    #[test]
    fn test_bare_lines() {
        assert_eq!(split_prefix("    at frame 3"), Prefix::Bare);
        assert_eq!(split_prefix("hello world"), Prefix::Bare);
        assert_eq!(split_prefix(""), Prefix::Bare);
    }
}
