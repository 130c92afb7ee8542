use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

static LOGFMT_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:^|\s)([A-Za-z_][A-Za-z0-9_.]*)=("(?:[^"\\]|\\.)*"|[^\s"]*)"#).unwrap()
});

/// Extract `key=value` / `key="quoted value"` pairs from a log payload.
///
/// The first occurrence of a key wins.
pub fn parse_logfmt(payload: &str) -> BTreeMap<String, String> {
    let mut fields = BTreeMap::new();
    for caps in LOGFMT_FIELD.captures_iter(payload) {
        let key = caps[1].to_string();
        let value = unquote(&caps[2]);
        fields.entry(key).or_insert(value);
    }
    fields
}

fn unquote(raw: &str) -> String {
    let Some(inner) = raw.strip_prefix('"').and_then(|r| r.strip_suffix('"')) else {
        return raw.to_string();
    };
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Normalize a captured value into a metric-name fragment
pub fn metric_fragment(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.trim().chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    out.trim_matches('_').to_string()
}
