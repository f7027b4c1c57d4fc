//! Clean transform: turns an export log into a compact transcript for
//! reading or feeding to language models.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::domain::{AppError, ExportRecord, Result};

#[allow(clippy::expect_used)]
static LINK_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://\S+|t\.me/\S+").expect("link pattern"));

#[allow(clippy::expect_used)]
static EMPTY_BRACKETS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\s*\]|\(\s*\)").expect("bracket pattern"));

const BOT_USERNAME_MARKERS: [&str; 3] = ["Bot", "bot", "_bot"];
const SPAM_KEYWORDS: [&str; 6] = ["gained", "UPDATE", "FLEX", "scanned it", "🚀", "Market Cap"];

/// Output layout of the clean transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CleanFormat {
    /// `[YYYY-MM-DD HH:MM] user: text` lines.
    #[default]
    Transcript,
    /// One `{time, user, text, replying_to_msg_id?}` object per line.
    JsonLines,
}

impl CleanFormat {
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Transcript => "txt",
            Self::JsonLines => "jsonl",
        }
    }
}

impl FromStr for CleanFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "txt" | "text" | "transcript" => Ok(Self::Transcript),
            "jsonl" | "json" => Ok(Self::JsonLines),
            _ => Err(format!("Unknown format: {s}. Use txt or jsonl.")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanOptions {
    pub filter_bots: bool,
    pub format: CleanFormat,
}

impl Default for CleanOptions {
    fn default() -> Self {
        Self {
            filter_bots: true,
            format: CleanFormat::Transcript,
        }
    }
}

/// Counters reported after a clean run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanStats {
    pub total: u64,
    pub kept: u64,
    pub filtered_bots: u64,
    pub filtered_media_only: u64,
}

#[derive(Debug, Serialize)]
struct CleanMessage {
    time: String,
    user: String,
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    replying_to_msg_id: Option<i64>,
}

impl CleanMessage {
    fn transcript_line(&self) -> String {
        let reply = self
            .replying_to_msg_id
            .map(|id| format!(" (replying to #{id})"))
            .unwrap_or_default();
        format!("[{}] {}{}: {}", self.time, self.user, reply, self.text)
    }
}

/// Strip links, collapse whitespace and drop empty bracket pairs.
#[must_use]
pub fn clean_text(text: &str) -> String {
    let without_links = LINK_PATTERN.replace_all(text, "");
    let collapsed = without_links.split_whitespace().collect::<Vec<_>>().join(" ");
    EMPTY_BRACKETS.replace_all(&collapsed, "").trim().to_string()
}

/// Heuristic bot/spam detection on username and text.
#[must_use]
pub fn is_bot_message(username: Option<&str>, text: &str) -> bool {
    let bot_name = username.is_some_and(|name| BOT_USERNAME_MARKERS.iter().any(|m| name.contains(m)));
    bot_name || SPAM_KEYWORDS.iter().any(|k| text.contains(k))
}

/// Display name: username, else `user_<id>`, else `user_unknown`.
fn display_user(record: &ExportRecord) -> String {
    match (&record.sender_username, record.sender_id) {
        (Some(name), _) => name.clone(),
        (None, Some(id)) => format!("user_{id}"),
        (None, None) => "user_unknown".to_string(),
    }
}

/// Default output path: `<stem>_clean.<ext>` next to the input.
#[must_use]
pub fn default_output_path(input: &Path, format: CleanFormat) -> PathBuf {
    let stem = input
        .file_stem()
        .map_or_else(|| "export".into(), |s| s.to_string_lossy());
    input.with_file_name(format!("{stem}_clean.{}", format.extension()))
}

/// Convert an export log into the clean format.
///
/// # Errors
/// Returns error if the input cannot be read or parsed, or the output cannot
/// be written.
pub fn convert_to_clean_format(input: &Path, output: &Path, options: CleanOptions) -> Result<CleanStats> {
    let file = File::open(input)
        .map_err(|e| AppError::io(format!("Failed to open {}", input.display()), e))?;

    let mut stats = CleanStats::default();
    let mut messages = Vec::new();

    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| AppError::io("Failed to read export log", e))?;
        if line.trim().is_empty() {
            continue;
        }

        let record: ExportRecord = serde_json::from_str(&line).map_err(|e| AppError::InvalidData {
            message: format!("{}:{}: {e}", input.display(), index + 1),
        })?;
        stats.total += 1;

        if options.filter_bots && is_bot_message(record.sender_username.as_deref(), &record.text) {
            stats.filtered_bots += 1;
            continue;
        }

        if record.text.trim().is_empty() && record.media_type.is_some() {
            stats.filtered_media_only += 1;
            continue;
        }

        let text = clean_text(&record.text);
        if text.is_empty() {
            continue;
        }

        messages.push(CleanMessage {
            time: record.date.format("%Y-%m-%d %H:%M").to_string(),
            user: display_user(&record),
            text,
            replying_to_msg_id: record.reply_to.filter(|id| *id != 0),
        });
        stats.kept += 1;
    }

    write_messages(output, &messages, options.format)?;

    tracing::info!(
        total = stats.total,
        kept = stats.kept,
        filtered_bots = stats.filtered_bots,
        filtered_media_only = stats.filtered_media_only,
        output = %output.display(),
        "Clean transform complete"
    );

    Ok(stats)
}

fn write_messages(output: &Path, messages: &[CleanMessage], format: CleanFormat) -> Result<()> {
    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|e| AppError::io("Failed to create output directory", e))?;
        }
    }

    let file = File::create(output)
        .map_err(|e| AppError::io(format!("Failed to create {}", output.display()), e))?;
    let mut writer = BufWriter::new(file);

    for message in messages {
        let line = match format {
            CleanFormat::Transcript => message.transcript_line(),
            CleanFormat::JsonLines => serde_json::to_string(message).map_err(AppError::json_parse)?,
        };
        writeln!(writer, "{line}").map_err(|e| AppError::io("Failed to write clean output", e))?;
    }

    writer
        .flush()
        .map_err(|e| AppError::io("Failed to flush clean output", e))
}

/// First `n` lines of a file, for previews.
///
/// # Errors
/// Returns error if the file cannot be read.
pub fn sample_lines(path: &Path, n: usize) -> Result<Vec<String>> {
    let file = File::open(path)
        .map_err(|e| AppError::io(format!("Failed to open {}", path.display()), e))?;
    BufReader::new(file)
        .lines()
        .take(n)
        .map(|line| line.map_err(|e| AppError::io("Failed to read sample", e)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_log(path: &Path, lines: &[&str]) {
        std::fs::write(path, lines.join("\n") + "\n").unwrap();
    }

    fn line(id: i64, username: Option<&str>, text: &str, media: Option<&str>, reply: Option<i64>) -> String {
        serde_json::json!({
            "msg_id": id,
            "chat_id": -1001,
            "date": "2024-05-01T10:15:42Z",
            "sender_id": 42,
            "sender_username": username,
            "reply_to": reply,
            "text": text,
            "entities": [],
            "media_type": media,
            "media_file_id": media.map(|_| "9"),
        })
        .to_string()
    }

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text("see https://example.com/x  now"), "see now");
        assert_eq!(clean_text("join t.me/somegroup please"), "join please");
        assert_eq!(clean_text("  a\n\tb  "), "a b");
        assert_eq!(clean_text("link [ ] here ( )"), "link  here");
        assert_eq!(clean_text("https://only.link"), "");
    }

    #[test]
    fn test_bot_detection() {
        assert!(is_bot_message(Some("PriceBot"), "hello"));
        assert!(is_bot_message(Some("alerts_bot"), "hello"));
        assert!(is_bot_message(None, "Token gained 50%"));
        assert!(is_bot_message(Some("alice"), "to the moon 🚀"));
        assert!(!is_bot_message(Some("alice"), "hello"));
        assert!(!is_bot_message(None, "update in lowercase"));
    }

    #[test]
    fn test_format_parse() {
        assert_eq!("txt".parse::<CleanFormat>().unwrap(), CleanFormat::Transcript);
        assert_eq!("JSONL".parse::<CleanFormat>().unwrap(), CleanFormat::JsonLines);
        assert!("csv".parse::<CleanFormat>().is_err());
    }

    #[test]
    fn test_default_output_path() {
        let path = default_output_path(Path::new("/tmp/exports/chat.jsonl"), CleanFormat::Transcript);
        assert_eq!(path, PathBuf::from("/tmp/exports/chat_clean.txt"));
    }

    #[test]
    fn test_transcript_conversion() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("chat.jsonl");
        let output = dir.path().join("chat.txt");

        write_log(
            &input,
            &[
                &line(1, Some("alice"), "hello there", None, None),
                &line(2, None, "reply text https://x.y", None, Some(1)),
                &line(3, Some("PriceBot"), "price", None, None),
                &line(4, Some("bob"), "", Some("photo"), None),
                &line(5, Some("bob"), "https://just.a.link", None, None),
            ],
        );

        let stats = convert_to_clean_format(&input, &output, CleanOptions::default()).unwrap();
        assert_eq!(
            stats,
            CleanStats {
                total: 5,
                kept: 2,
                filtered_bots: 1,
                filtered_media_only: 1,
            }
        );

        let content = std::fs::read_to_string(&output).unwrap();
        assert_eq!(
            content,
            "[2024-05-01 10:15] alice: hello there\n\
             [2024-05-01 10:15] user_42 (replying to #1): reply text\n"
        );
    }

    #[test]
    fn test_keep_bots_and_jsonl() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("chat.jsonl");
        let output = dir.path().join("out.jsonl");
        write_log(&input, &[&line(1, Some("PriceBot"), "UPDATE 🚀", None, Some(7))]);

        let options = CleanOptions {
            filter_bots: false,
            format: CleanFormat::JsonLines,
        };
        let stats = convert_to_clean_format(&input, &output, options).unwrap();
        assert_eq!(stats.kept, 1);

        let content = std::fs::read_to_string(&output).unwrap();
        let value: serde_json::Value = serde_json::from_str(content.trim()).unwrap();
        assert_eq!(value["user"], "PriceBot");
        assert_eq!(value["text"], "UPDATE 🚀");
        assert_eq!(value["replying_to_msg_id"], 7);
        assert_eq!(value["time"], "2024-05-01 10:15");
    }

    #[test]
    fn test_legacy_date_and_unknown_user() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("legacy.jsonl");
        let output = dir.path().join("legacy.txt");

        let legacy = r#"{"msg_id":1,"chat_id":-1,"date":"2024-05-01T10:15:42+00:00Z","sender_id":null,"sender_username":null,"reply_to":null,"text":"old","entities":[],"media_type":null,"media_file_id":null}"#;
        write_log(&input, &[legacy]);

        convert_to_clean_format(&input, &output, CleanOptions::default()).unwrap();
        assert_eq!(
            std::fs::read_to_string(&output).unwrap(),
            "[2024-05-01 10:15] user_unknown: old\n"
        );
    }

    #[test]
    fn test_malformed_line_reports_position() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("bad.jsonl");
        write_log(&input, &[&line(1, None, "ok", None, None), "{not json"]);

        let err = convert_to_clean_format(&input, &dir.path().join("o.txt"), CleanOptions::default())
            .unwrap_err();
        assert!(err.to_string().contains("bad.jsonl:2"));
    }

    #[test]
    fn test_sample_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("s.txt");
        std::fs::write(&path, "a\nb\nc\nd\ne\nf\ng\n").unwrap();
        assert_eq!(sample_lines(&path, 5).unwrap(), vec!["a", "b", "c", "d", "e"]);
    }
}
