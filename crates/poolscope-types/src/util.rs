use chrono::NaiveDate;
use std::path::Path;

/// Decode a node quantity: `0x`-prefixed hex or plain decimal.
///
/// `"0x"` alone decodes to zero, matching how the node encodes empty values.
pub fn parse_quantity(raw: &str) -> Option<u128> {
    let raw = raw.trim();
    if let Some(hex) = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        if hex.is_empty() {
            return Some(0);
        }
        return u128::from_str_radix(hex, 16).ok();
    }
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}

/// Like [`parse_quantity`] but rejects values that do not fit in `u64`
pub fn parse_quantity_u64(raw: &str) -> Option<u64> {
    parse_quantity(raw).and_then(|v| u64::try_from(v).ok())
}

/// Byte length of a `0x`-prefixed hex payload (`0x` alone is empty)
pub fn hex_payload_len(raw: &str) -> Option<u64> {
    let hex = raw.strip_prefix("0x")?;
    Some((hex.len() / 2) as u64)
}

/// Make a file name safe to embed in an output part name
pub fn sanitize_component(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Date encoded as the whole stem of a file name: `2025-05-04.log`,
/// `2025-05-04.log.gz` and `2025-05-04.json` all yield 2025-05-04.
pub fn date_from_file_stem(path: &Path) -> Option<NaiveDate> {
    let name = path.file_name()?.to_str()?;
    let name = name.strip_suffix(".gz").unwrap_or(name);
    let stem = name.split('.').next()?;
    NaiveDate::parse_from_str(stem, "%Y-%m-%d").ok()
}

/// First `YYYY-MM-DD` found in the file name, then anywhere in the path
pub fn find_date_in_path(path: &Path) -> Option<NaiveDate> {
    let name = path.file_name().and_then(|n| n.to_str());
    name.and_then(scan_for_date)
        .or_else(|| path.to_str().and_then(scan_for_date))
}

fn scan_for_date(text: &str) -> Option<NaiveDate> {
    let bytes = text.as_bytes();
    if bytes.len() < 10 {
        return None;
    }
    (0..=bytes.len() - 10).find_map(|start| {
        let window = &bytes[start..start + 10];
        let shaped = window.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        });
        if !shaped {
            return None;
        }
        let candidate = std::str::from_utf8(window).ok()?;
        NaiveDate::parse_from_str(candidate, "%Y-%m-%d").ok()
    })
}
