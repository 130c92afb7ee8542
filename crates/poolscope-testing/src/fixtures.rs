//! Builders for collector-shaped snapshot documents and node trace logs.

use serde_json::{Map, Value, json};

/// One pooled transaction as the txpool RPC returns it
#[derive(Debug, Clone)]
pub struct TxFixture {
    fields: Map<String, Value>,
}

impl TxFixture {
    pub fn new(hash: &str, from: &str, nonce: u64) -> Self {
        let mut fields = Map::new();
        fields.insert("hash".into(), json!(hash));
        fields.insert("from".into(), json!(from));
        fields.insert("nonce".into(), json!(format!("0x{:x}", nonce)));
        fields.insert("type".into(), json!("0x2"));
        fields.insert("gas".into(), json!("0x5208"));
        fields.insert("input".into(), json!("0x"));
        Self { fields }
    }

    /// Type-4 transaction with `count` authorization tuples
    pub fn eip7702(mut self, count: usize) -> Self {
        let list: Vec<Value> = (0..count)
            .map(|i| {
                json!({
                    "chainId": "0x1",
                    "address": format!("0x{:040x}", i + 1),
                    "nonce": format!("0x{:x}", i),
                })
            })
            .collect();
        self.fields.insert("type".into(), json!("0x4"));
        self.fields.insert("authorizationList".into(), Value::Array(list));
        self
    }

    pub fn field(mut self, key: &str, value: Value) -> Self {
        self.fields.insert(key.to_string(), value);
        self
    }

    pub fn without(mut self, key: &str) -> Self {
        self.fields.remove(key);
        self
    }

    pub fn sender(&self) -> String {
        self.fields
            .get("from")
            .and_then(Value::as_str)
            .unwrap_or("0x0")
            .to_string()
    }

    pub fn nonce_key(&self) -> String {
        self.fields
            .get("nonce")
            .and_then(Value::as_str)
            .map(|n| {
                u64::from_str_radix(n.trim_start_matches("0x"), 16)
                    .map(|v| v.to_string())
                    .unwrap_or_else(|_| n.to_string())
            })
            .unwrap_or_else(|| "0".to_string())
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }
}

/// One collector record: `{timestamp, pending_count, queued_count, snapshot}`
/// or `{timestamp, error}`.
#[derive(Debug, Clone)]
pub struct SnapshotDoc {
    timestamp: Option<String>,
    pending: Map<String, Value>,
    queued: Map<String, Value>,
    error: Option<String>,
    snapshot_as_string: bool,
}

impl SnapshotDoc {
    pub fn at(timestamp: &str) -> Self {
        Self {
            timestamp: Some(timestamp.to_string()),
            pending: Map::new(),
            queued: Map::new(),
            error: None,
            snapshot_as_string: false,
        }
    }

    pub fn untimed() -> Self {
        Self {
            timestamp: None,
            ..Self::at("")
        }
    }

    pub fn pending(mut self, tx: TxFixture) -> Self {
        insert_tx(&mut self.pending, tx);
        self
    }

    pub fn queued(mut self, tx: TxFixture) -> Self {
        insert_tx(&mut self.queued, tx);
        self
    }

    /// Collector failure record instead of a dump
    pub fn failed(mut self, error: &str) -> Self {
        self.error = Some(error.to_string());
        self
    }

    /// Encode `snapshot` as a JSON string (older collector output)
    pub fn stringified(mut self) -> Self {
        self.snapshot_as_string = true;
        self
    }

    pub fn to_value(&self) -> Value {
        let mut doc = Map::new();
        if let Some(ts) = &self.timestamp {
            doc.insert("timestamp".into(), json!(ts));
        }
        if let Some(error) = &self.error {
            doc.insert("error".into(), json!(error));
            return Value::Object(doc);
        }

        let count = |pool: &Map<String, Value>| -> usize {
            pool.values()
                .filter_map(Value::as_object)
                .map(|nonces| nonces.len())
                .sum()
        };
        doc.insert("pending_count".into(), json!(count(&self.pending)));
        doc.insert("queued_count".into(), json!(count(&self.queued)));

        let snapshot = json!({
            "pending": Value::Object(self.pending.clone()),
            "queued": Value::Object(self.queued.clone()),
        });
        let snapshot = if self.snapshot_as_string {
            Value::String(snapshot.to_string())
        } else {
            snapshot
        };
        doc.insert("snapshot".into(), snapshot);
        Value::Object(doc)
    }

    /// Single-line form, as the collector appends it
    pub fn to_line(&self) -> String {
        self.to_value().to_string()
    }
}

fn insert_tx(pool: &mut Map<String, Value>, tx: TxFixture) {
    let sender = tx.sender();
    let nonce = tx.nonce_key();
    let nonces = pool
        .entry(sender)
        .or_insert_with(|| Value::Object(Map::new()));
    if let Value::Object(nonces) = nonces {
        nonces.insert(nonce, tx.into_value());
    }
}

/// Newline-joined snapshot documents
pub fn snapshot_file(docs: &[SnapshotDoc]) -> String {
    let mut out = String::new();
    for doc in docs {
        out.push_str(&doc.to_line());
        out.push('\n');
    }
    out
}

/// Node trace log builder
#[derive(Debug, Clone, Default)]
pub struct TraceLog {
    lines: Vec<String>,
}

impl TraceLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// `<rfc3339> <payload>`
    pub fn stamped(mut self, timestamp: &str, payload: &str) -> Self {
        self.lines.push(format!("{} {}", timestamp, payload));
        self
    }

    /// `LEVEL[MM-DD|HH:MM:SS.mmm] <payload>`
    pub fn terminal(mut self, level: &str, stamp: &str, payload: &str) -> Self {
        let level = format!("{:<5}", level);
        self.lines.push(format!("{}[{}] {}", level, stamp, payload));
        self
    }

    /// Indented continuation of the previous entry
    pub fn continued(mut self, text: &str) -> Self {
        self.lines.push(format!("    {}", text));
        self
    }

    pub fn raw(mut self, line: &str) -> Self {
        self.lines.push(line.to_string());
        self
    }

    pub fn blank(self) -> Self {
        self.raw("")
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn build(&self) -> String {
        let mut out = self.lines.join("\n");
        out.push('\n');
        out
    }
}
