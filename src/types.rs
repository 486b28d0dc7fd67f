//! Core types for taskdeck.

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// Opaque task identifier (UUIDv7 string for tasks created here).
pub type TaskId = String;

/// Task priority. Ordering follows display rank: high first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Normal,
    Low,
}

impl Priority {
    /// Sort rank: high(0) < normal(1) < low(2).
    pub fn rank(self) -> u8 {
        match self {
            Priority::High => 0,
            Priority::Normal => 1,
            Priority::Low => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Normal => "normal",
            Priority::Low => "low",
        }
    }

    /// Lenient parse used by edit forms: anything unrecognised is normal.
    pub fn parse_lenient(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "high" => Ok(Priority::High),
            "normal" | "medium" => Ok(Priority::Normal),
            "low" => Ok(Priority::Low),
            other => Err(format!(
                "invalid priority '{}': must be high, normal, or low",
                other
            )),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single to-do item. Field names match the persisted JSON layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub text: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_stored_due")]
    pub due: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "deserialize_priority")]
    pub priority: Priority,
    #[serde(default)]
    pub done: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub notified: bool,
}

impl Task {
    /// Whether the scheduler should consider this task at all.
    pub fn awaits_notification(&self) -> bool {
        self.due.is_some() && !self.notified && !self.done
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// Input for creating a task.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewTask {
    pub text: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_due")]
    pub due: Option<DateTime<Utc>>,
    #[serde(default)]
    pub priority: Priority,
}

impl NewTask {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_due(mut self, due: DateTime<Utc>) -> Self {
        self.due = Some(due);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}

/// Partial update for a task. `None` leaves a field untouched.
///
/// `due` is doubly optional: `Some(None)` clears the due date.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskEdit {
    pub text: Option<String>,
    pub tags: Option<Vec<String>>,
    #[serde(default, deserialize_with = "deserialize_due_edit")]
    pub due: Option<Option<DateTime<Utc>>>,
    pub priority: Option<Priority>,
}

impl TaskEdit {
    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.tags.is_none() && self.due.is_none() && self.priority.is_none()
    }
}

/// Colour theme preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(format!("invalid theme '{}': must be light or dark", other)),
        }
    }
}

/// Normalise a tag list: trim, drop blanks, drop repeats keeping first occurrence.
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.as_ref().trim();
        if !tag.is_empty() && !out.iter().any(|t| t == tag) {
            out.push(tag.to_string());
        }
    }
    out
}

/// Split a comma-separated tag field as typed into a form.
pub fn split_tags(raw: &str) -> Vec<String> {
    normalize_tags(raw.split(','))
}

/// Parse a timestamp as entered by a user or stored by older clients.
///
/// Accepts RFC 3339 (`2025-10-27T15:30:00Z`) and the datetime-local form
/// (`2025-10-27T15:30`, with optional seconds), which is taken as local time.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .and_then(|naive| Local.from_local_datetime(&naive).earliest())
        .map(|local| local.with_timezone(&Utc))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Text(String),
    Millis(i64),
}

/// Any JSON value; used where a bad timestamp must not fail the record.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredTimestamp {
    Known(RawTimestamp),
    Other(serde::de::IgnoredAny),
}

fn raw_to_timestamp<E: serde::de::Error>(raw: RawTimestamp) -> Result<Option<DateTime<Utc>>, E> {
    match raw {
        RawTimestamp::Text(s) if s.trim().is_empty() => Ok(None),
        RawTimestamp::Text(s) => parse_timestamp(&s)
            .map(Some)
            .ok_or_else(|| E::custom(format!("unrecognised timestamp '{}'", s))),
        RawTimestamp::Millis(ms) => DateTime::from_timestamp_millis(ms)
            .map(Some)
            .ok_or_else(|| E::custom(format!("timestamp out of range: {}", ms))),
    }
}

fn deserialize_due<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<RawTimestamp>::deserialize(deserializer)? {
        None => Ok(None),
        Some(raw) => raw_to_timestamp(raw),
    }
}

/// Stored records keep loading when `due` holds something unparseable
/// (older clients saved whatever was typed); the reminder is dropped.
fn deserialize_stored_due<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = match Option::<StoredTimestamp>::deserialize(deserializer)? {
        None => return Ok(None),
        Some(StoredTimestamp::Other(_)) => {
            warn!("ignoring stored due value of unexpected type");
            return Ok(None);
        }
        Some(StoredTimestamp::Known(raw)) => raw,
    };
    let shown = match &raw {
        RawTimestamp::Text(s) => s.clone(),
        RawTimestamp::Millis(ms) => ms.to_string(),
    };
    match raw_to_timestamp::<D::Error>(raw) {
        Ok(due) => Ok(due),
        Err(e) => {
            warn!(due = %shown, error = %e, "ignoring unreadable stored due value");
            Ok(None)
        }
    }
}

/// Absent field → no change; explicit `null` or `""` → clear.
fn deserialize_due_edit<'de, D>(deserializer: D) -> Result<Option<Option<DateTime<Utc>>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<RawTimestamp>::deserialize(deserializer)? {
        None => Ok(Some(None)),
        Some(raw) => raw_to_timestamp(raw).map(Some),
    }
}

fn deserialize_priority<'de, D>(deserializer: D) -> Result<Priority, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.map(|s| Priority::parse_lenient(&s)).unwrap_or_default())
}
