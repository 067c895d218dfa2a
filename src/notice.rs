//! Purpose: Define a stable, structured schema for non-fatal stderr notices.
//! Exports: `Notice`, `notice_json`, `notice_time_now`.
//! Role: Shared contract helper for pipeline diagnostics (non-error events).
//! Invariants: Notices are non-fatal and never alter the output table.
//! Invariants: JSON schema is stable once published; fields are additive-only.
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::{Map, Value, json};
use time::format_description::well_known::Rfc3339;

use crate::core::loader::MalformedRow;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: String,
    pub time: String,
    pub stage: String,
    pub source: String,
    pub message: String,
    pub details: Map<String, Value>,
}

impl Notice {
    pub fn malformed_row(row: &MalformedRow, source: &str) -> Self {
        let mut details = Map::new();
        details.insert("row".to_string(), json!(row.row));
        details.insert("line".to_string(), json!(row.line));
        details.insert("fields".to_string(), json!(row.fields));
        details.insert("missing_columns".to_string(), json!(row.missing));

        let missing = row
            .missing
            .iter()
            .map(usize::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        Self {
            kind: "malformed_row".to_string(),
            time: notice_time_now().unwrap_or_default(),
            stage: "load".to_string(),
            source: source.to_string(),
            message: format!(
                "skipping row {} for column(s) {missing}: only {} field(s)",
                row.row, row.fields
            ),
            details,
        }
    }
}

pub fn notice_time_now() -> Option<String> {
    let duration = SystemTime::now().duration_since(UNIX_EPOCH).ok()?;
    let ts = time::OffsetDateTime::from_unix_timestamp_nanos(duration.as_nanos() as i128).ok()?;
    ts.format(&Rfc3339).ok()
}

pub fn notice_json(notice: &Notice) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(notice.kind));
    inner.insert("time".to_string(), json!(notice.time));
    inner.insert("stage".to_string(), json!(notice.stage));
    inner.insert("source".to_string(), json!(notice.source));
    inner.insert("message".to_string(), json!(notice.message));
    inner.insert("details".to_string(), Value::Object(notice.details.clone()));

    let mut outer = Map::new();
    outer.insert("notice".to_string(), Value::Object(inner));
    Value::Object(outer)
}
