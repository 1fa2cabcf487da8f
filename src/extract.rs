//! Turns one raw record into an [`Event`], or rejects it.
//!
//! Rejection is silent: a malformed line, a missing field or an unparsable
//! timestamp yields `None` and the pipeline moves on to the next record.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Hour bucket format; lexical order equals chronological order.
pub const HOUR_KEY_FORMAT: &str = "%Y-%m-%dT%H";

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// A successfully extracted record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Timestamp truncated to the hour, `YYYY-MM-DDTHH`.
    pub hour_key: String,
    /// `"<username> (<id>)"`.
    pub user_key: String,
    pub sentiment: f64,
}

#[derive(Deserialize)]
struct Line {
    doc: Option<Doc>,
}

#[derive(Deserialize)]
struct Doc {
    #[serde(rename = "createdAt")]
    created_at: Option<String>,
    sentiment: Option<f64>,
    account: Option<Account>,
}

#[derive(Deserialize)]
struct Account {
    id: Option<Value>,
    username: Option<String>,
}

/// Decodes one record.
pub fn extract(raw: &[u8]) -> Option<Event> {
    let line: Line = serde_json::from_slice(raw).ok()?;
    let doc = line.doc?;
    let created_at = doc.created_at.filter(|s| !s.is_empty())?;
    let account = doc.account?;
    let id = account.id.as_ref().and_then(render_id)?;
    let username = account.username.filter(|s| !s.is_empty())?;

    let hour_key = hour_key(&created_at)?;
    Some(Event {
        hour_key,
        user_key: user_key(&username, &id),
        sentiment: doc.sentiment.unwrap_or(0.0),
    })
}

/// Builds the composite author identity.
pub fn user_key(username: &str, id: &str) -> String {
    format!("{} ({})", username, id)
}

/// Truncates a timestamp to its hour bucket.
///
/// A single trailing `Z` is ignored. Timestamps with an explicit offset keep
/// their own wall-clock hour.
pub fn hour_key(timestamp: &str) -> Option<String> {
    let ts = timestamp.strip_suffix('Z').unwrap_or(timestamp);
    parse_timestamp(ts).map(|dt| dt.format(HOUR_KEY_FORMAT).to_string())
}

fn parse_timestamp(ts: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(ts) {
        return Some(dt.naive_local());
    }
    for format in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(ts, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(ts, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

// Only non-empty strings and non-zero numbers count as an id.
fn render_id(id: &Value) -> Option<String> {
    match id {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
        _ => None,
    }
}
