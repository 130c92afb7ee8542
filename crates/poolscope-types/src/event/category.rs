use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of transaction-pool decision a trace event records
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Transaction rejected on entry (invalid, underpriced, already known, ...)
    Invalidation,
    /// Transaction accepted into the pending or queued set
    Addition,
    /// Transaction dropped or demoted after it was pooled
    Removal,
    /// Transaction superseded by another with the same sender and nonce
    Replacement,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Invalidation,
        Category::Addition,
        Category::Removal,
        Category::Replacement,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Invalidation => "invalidation",
            Category::Addition => "addition",
            Category::Removal => "removal",
            Category::Replacement => "replacement",
        }
    }

    /// Map a verb of the compact `[txpool] <verb> ...` trace format
    pub fn from_verb(verb: &str) -> Option<Self> {
        match verb.to_ascii_lowercase().as_str() {
            "discarded" | "rejected" | "invalid" => Some(Category::Invalidation),
            "added" | "pooled" | "promoted" => Some(Category::Addition),
            "removed" | "evicted" | "dropped" | "demoted" => Some(Category::Removal),
            "replaced" => Some(Category::Replacement),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown event category: {}", s))
    }
}
