//! Domain models for exported chat data.
//!
//! These are the shapes written to and read from the export log. Remote wire
//! types never appear here; they are adapted in the application layer.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A resolved chat reference, as produced by the locator resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatLocator {
    /// Already-normalized numeric chat id (negative for private supergroups).
    NumericChatId(i64),
    /// Public username or invite token.
    Handle(String),
}

impl std::fmt::Display for ChatLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NumericChatId(id) => write!(f, "{id}"),
            Self::Handle(handle) => write!(f, "@{handle}"),
        }
    }
}

/// A chat the remote service has confirmed we can read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedChat {
    /// Marked peer id of the chat.
    pub id: i64,
    /// Display title, if the remote reported one.
    #[serde(default)]
    pub title: Option<String>,
}

/// Kind of media attached to a message. Absence is encoded as `null`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Photo,
    Video,
    Doc,
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Photo => write!(f, "photo"),
            Self::Video => write!(f, "video"),
            Self::Doc => write!(f, "doc"),
        }
    }
}

/// Rich-text annotation kept in the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TextEntity {
    Bold { offset: i32, length: i32 },
    Italic { offset: i32, length: i32 },
    Code { offset: i32, length: i32 },
    Pre { offset: i32, length: i32 },
    TextUrl { offset: i32, length: i32, url: String },
}

/// One exported message: exactly one line in the export log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRecord {
    pub msg_id: i64,
    pub chat_id: i64,
    #[serde(with = "record_date")]
    pub date: DateTime<Utc>,
    pub sender_id: Option<i64>,
    pub sender_username: Option<String>,
    pub reply_to: Option<i64>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub entities: Vec<TextEntity>,
    pub media_type: Option<MediaKind>,
    pub media_file_id: Option<String>,
}

/// Parses a record date, accepting the legacy `+00:00Z` double-zone suffix.
#[must_use]
pub fn parse_record_date(value: &str) -> Option<DateTime<Utc>> {
    let trimmed = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    let legacy = trimmed.strip_suffix('Z')?;
    DateTime::parse_from_rfc3339(legacy)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Second-precision UTC timestamps, `YYYY-MM-DDTHH:MM:SSZ`.
mod record_date {
    use super::{parse_record_date, DateTime, Deserialize, Deserializer, SecondsFormat, Serializer, Utc};

    pub fn serialize<S: Serializer>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&date.to_rfc3339_opts(SecondsFormat::Secs, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_record_date(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid record date: {raw}")))
    }
}

/// Outcome of one export run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExportSummary {
    /// Records appended during this run (all attempts).
    pub written: u64,
    /// Size of the log after the run, in bytes.
    pub file_size: u64,
    /// Resume point found in the log before the run started.
    pub resumed_from: Option<i64>,
    /// Whether the run stopped at the time cutoff.
    pub reached_cutoff: bool,
    /// Whether a rate-limit retry happened.
    pub retried: bool,
    /// Whether the run stopped early because it was cancelled.
    pub cancelled: bool,
}
