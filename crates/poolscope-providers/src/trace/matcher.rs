use super::fields::{metric_fragment, parse_logfmt};
use crate::{Error, Result};
use poolscope_types::Category;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap());

/// `err=` substrings of invalid-transaction lines and their metric names.
/// Checked in order; the first contained substring wins.
const INVALID_TX_ERRORS: &[(&str, &str)] = &[
    ("nonce too low", "nonce_low"),
    ("nonce too high", "nonce_high"),
    ("empty authorization list", "auth_list_empty"),
    ("invalid auth signature", "auth_sig_invalid"),
    ("authorization nonce mismatch", "auth_nonce_mismatch"),
    ("authorizer has code", "authorizer_has_code"),
    ("insufficient funds", "insufficient_funds"),
    ("intrinsic gas too low", "intrinsic_gas"),
    ("oversized data", "oversized_data"),
    ("transaction type not supported", "type_not_supported"),
    ("invalid sender", "invalid_sender"),
    ("negative value", "negative_value"),
];

const UNKNOWN_ERROR_METRIC: &str = "other";

/// How a matcher decides the event category
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryRule {
    Fixed(Category),
    /// Category derived from a captured verb (`discarded`, `added`, ...)
    Verb(String),
}

/// How a matcher names the metric
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetricRule {
    /// Literal text with `{field}` placeholders filled from captures/fields
    Template(String),
    /// Look the named field up in the invalid-transaction error table
    ErrorCode(String),
}

/// Matcher as written in the config file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatcherDefinition {
    pub name: String,
    pub pattern: String,
    /// Category name, or `{group}` to take it from a captured verb
    pub category: String,
    /// Metric template, e.g. `blob_rejected` or `{reason}_{pool}`
    pub metric: String,
    /// Capture/field holding a batch count
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<String>,
}

/// A successful match, before timestamp resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedEvent {
    pub matcher: String,
    pub category: Category,
    pub metric_name: String,
    pub count: u64,
    pub fields: BTreeMap<String, String>,
}

/// One tagged pattern of the classifier
#[derive(Debug, Clone)]
pub struct EventMatcher {
    name: String,
    pattern: Regex,
    category: CategoryRule,
    metric: MetricRule,
    count_field: Option<String>,
}

impl EventMatcher {
    pub fn new(name: &str, pattern: &str, category: CategoryRule, metric: MetricRule) -> Result<Self> {
        Ok(Self {
            name: name.to_string(),
            pattern: Regex::new(pattern)?,
            category,
            metric,
            count_field: None,
        })
    }

    pub fn with_count(mut self, field: &str) -> Self {
        self.count_field = Some(field.to_string());
        self
    }

    pub fn from_definition(def: &MatcherDefinition) -> Result<Self> {
        let category = match def
            .category
            .strip_prefix('{')
            .and_then(|c| c.strip_suffix('}'))
        {
            Some(group) => CategoryRule::Verb(group.to_string()),
            None => CategoryRule::Fixed(def.category.parse().map_err(|e: String| {
                Error::Config(format!("matcher '{}': {}", def.name, e))
            })?),
        };
        if def.metric.trim().is_empty() {
            return Err(Error::Config(format!("matcher '{}': empty metric", def.name)));
        }

        let matcher = Self::new(
            &def.name,
            &def.pattern,
            category,
            MetricRule::Template(def.metric.clone()),
        )?;
        Ok(match &def.count {
            Some(field) => matcher.with_count(field),
            None => matcher,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `None` when the pattern does not match; `Some(Err(reason))` when it
    /// matches but a category, metric or count cannot be derived.
    pub fn apply(&self, payload: &str) -> Option<std::result::Result<MatchedEvent, String>> {
        let caps = self.pattern.captures(payload)?;
        Some(self.extract(payload, &caps))
    }

    fn extract(&self, payload: &str, caps: &Captures<'_>) -> std::result::Result<MatchedEvent, String> {
        let mut fields = parse_logfmt(payload);
        for group in self.pattern.capture_names().flatten() {
            if let Some(m) = caps.name(group) {
                fields.insert(group.to_string(), m.as_str().to_string());
            }
        }

        let category = match &self.category {
            CategoryRule::Fixed(category) => *category,
            CategoryRule::Verb(group) => {
                let verb = fields
                    .get(group)
                    .ok_or_else(|| format!("no value for category {{{}}}", group))?;
                Category::from_verb(verb)
                    .or_else(|| verb.parse().ok())
                    .ok_or_else(|| format!("unknown verb '{}'", verb))?
            }
        };

        let metric_name = match &self.metric {
            MetricRule::Template(template) => render_template(template, &fields)?,
            MetricRule::ErrorCode(field) => {
                let haystack = fields.get(field).map(String::as_str).unwrap_or(payload);
                error_metric(haystack).to_string()
            }
        };

        let count = match &self.count_field {
            Some(field) => match fields.get(field) {
                Some(raw) => raw
                    .parse::<u64>()
                    .ok()
                    .filter(|n| i64::try_from(*n).is_ok())
                    .ok_or_else(|| format!("unparseable {}='{}'", field, raw))?,
                None => 1,
            },
            None => 1,
        };

        Ok(MatchedEvent {
            matcher: self.name.clone(),
            category,
            metric_name,
            count,
            fields,
        })
    }
}

fn render_template(template: &str, fields: &BTreeMap<String, String>) -> std::result::Result<String, String> {
    let mut out = String::new();
    let mut last = 0;
    for caps in PLACEHOLDER.captures_iter(template) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        out.push_str(&template[last..whole.start()]);
        let value = fields
            .get(name.as_str())
            .map(|v| metric_fragment(v))
            .filter(|v| !v.is_empty())
            .ok_or_else(|| format!("no value for {{{}}}", name.as_str()))?;
        out.push_str(&value);
        last = whole.end();
    }
    out.push_str(&template[last..]);
    Ok(out)
}

fn error_metric(err: &str) -> &'static str {
    let err = err.to_ascii_lowercase();
    INVALID_TX_ERRORS
        .iter()
        .find(|(needle, _)| err.contains(needle))
        .map(|(_, metric)| *metric)
        .unwrap_or(UNKNOWN_ERROR_METRIC)
}

static BUILTIN: LazyLock<Vec<EventMatcher>> = LazyLock::new(|| {
    use CategoryRule::{Fixed, Verb};
    use poolscope_types::Category::{Addition, Invalidation, Removal, Replacement};

    let fixed = |name: &str| MetricRule::Template(name.to_string());
    let table: Vec<(&str, &str, CategoryRule, MetricRule, Option<&str>)> = vec![
        (
            "invalid",
            r"Discarding invalid transaction",
            Fixed(Invalidation),
            MetricRule::ErrorCode("err".to_string()),
            None,
        ),
        (
            "freshly-underpriced",
            r"Discarding freshly underpriced transaction",
            Fixed(Invalidation),
            fixed("underpriced"),
            None,
        ),
        (
            "underpriced",
            r"Discarding underpriced transaction",
            Fixed(Invalidation),
            fixed("underpriced"),
            None,
        ),
        (
            "already-known",
            r"Discarding already known transaction",
            Fixed(Invalidation),
            fixed("already_known"),
            None,
        ),
        (
            "overflown",
            r"Discarding overflown transaction",
            Fixed(Invalidation),
            fixed("overflown"),
            None,
        ),
        (
            "future-replacing-pending",
            r"Discarding future transaction replacing pending tx",
            Fixed(Replacement),
            fixed("future_replacing_pending"),
            None,
        ),
        (
            "pooled",
            r"Pooled new (?P<kind>executable|future) transaction",
            Fixed(Addition),
            fixed("{kind}"),
            None,
        ),
        (
            "promoted",
            r"Promoting queued transaction",
            Fixed(Addition),
            fixed("promoted"),
            None,
        ),
        (
            "removed-batch",
            r"Removed (?P<reason>[a-z][a-z-]*) (?P<pool>queued|pending) transactions?\b",
            Fixed(Removal),
            fixed("{reason}_{pool}"),
            Some("count"),
        ),
        (
            "demoted",
            r"Demoting pending transaction",
            Fixed(Removal),
            fixed("demoted"),
            None,
        ),
        (
            "generic",
            r"(?s)\[txpool\]\s+(?P<verb>discarded|added|removed|replaced)\b.*\breason=",
            Verb("verb".to_string()),
            fixed("{reason}"),
            Some("count"),
        ),
    ];

    table
        .into_iter()
        .map(|(name, pattern, category, metric, count)| {
            let matcher = EventMatcher::new(name, pattern, category, metric).unwrap();
            match count {
                Some(field) => matcher.with_count(field),
                None => matcher,
            }
        })
        .collect()
});

/// Built-in matchers in priority order (most specific first)
pub fn builtin_matchers() -> &'static [EventMatcher] {
    &BUILTIN
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(payload: &str) -> Option<std::result::Result<MatchedEvent, String>> {
        builtin_matchers().iter().find_map(|m| m.apply(payload))
    }

    fn label(payload: &str) -> (String, String, String, u64) {
        let event = classify(payload).unwrap().unwrap();
        (
            event.matcher,
            event.category.to_string(),
            event.metric_name,
            event.count,
        )
    }

    #[test]
    fn test_invalid_transaction_uses_error_table() {
        let (matcher, category, metric, _) = label(
            r#"Discarding invalid transaction hash=0xabc err="nonce too low: address 0x1, tx: 3 state: 5""#,
        );
        assert_eq!(matcher, "invalid");
        assert_eq!(category, "invalidation");
        assert_eq!(metric, "nonce_low");

        let (_, _, metric, _) =
            label(r#"Discarding invalid transaction hash=0xabc err="something new""#);
        assert_eq!(metric, "other");
    }

    #[test]
    fn test_specific_patterns_win_over_generic_ones() {
        assert_eq!(
            label("Discarding freshly underpriced transaction hash=0x1").0,
            "freshly-underpriced"
        );
        assert_eq!(
            label("Discarding future transaction replacing pending tx hash=0x1").2,
            "future_replacing_pending"
        );
    }

    #[test]
    fn test_batch_removal_counts() {
        let (_, category, metric, count) =
            label("Removed cap-exceeding queued transaction hash=0x1 count=12");
        assert_eq!(category, "removal");
        assert_eq!(metric, "cap_exceeding_queued");
        assert_eq!(count, 12);

        let (_, _, metric, count) = label("Removed old pending transactions hash=0x1");
        assert_eq!(metric, "old_pending");
        assert_eq!(count, 1);
    }

    #[test]
    fn test_generic_txpool_line() {
        let event = classify("[txpool] discarded tx=0xdef reason=underpriced")
            .unwrap()
            .unwrap();

        assert_eq!(event.matcher, "generic");
        assert_eq!(event.category, Category::Invalidation);
        assert_eq!(event.metric_name, "underpriced");
        assert_eq!(event.fields["tx"], "0xdef");
        assert_eq!(event.count, 1);
    }

    #[test]
    fn test_unparseable_count_is_malformed() {
        let outcome = classify("[txpool] removed tx=0x1 reason=stale count=lots").unwrap();
        assert!(outcome.is_err());
    }

    #[test]
    fn test_count_beyond_storable_range_is_malformed() {
        let outcome =
            classify("[txpool] removed tx=0x1 reason=stale count=18446744073709551615").unwrap();
        assert!(outcome.is_err());

        let event = classify("[txpool] removed tx=0x1 reason=stale count=9223372036854775807")
            .unwrap()
            .unwrap();
        assert_eq!(event.count, i64::MAX as u64);
    }

    #[test]
    fn test_unrelated_payload_does_not_match() {
        assert!(classify("Imported new potential chain segment number=1").is_none());
        assert!(classify("[txpool] discarded tx=0x1").is_none());
    }

    #[test]
    fn test_config_definition() {
        let def = MatcherDefinition {
            name: "blob-rejected".to_string(),
            pattern: "Rejecting blob transaction".to_string(),
            category: "invalidation".to_string(),
            metric: "blob_rejected".to_string(),
            count: None,
        };
        let matcher = EventMatcher::from_definition(&def).unwrap();
        let event = matcher
            .apply("Rejecting blob transaction hash=0x1")
            .unwrap()
            .unwrap();
        assert_eq!(event.metric_name, "blob_rejected");

        let bad = MatcherDefinition {
            category: "eviction".to_string(),
            ..def.clone()
        };
        assert!(matches!(
            EventMatcher::from_definition(&bad),
            Err(Error::Config(_))
        ));

        let bad_pattern = MatcherDefinition {
            pattern: "(unclosed".to_string(),
            ..def
        };
        assert!(matches!(
            EventMatcher::from_definition(&bad_pattern),
            Err(Error::Pattern(_))
        ));
    }
}
