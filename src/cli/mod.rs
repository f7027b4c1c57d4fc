//! CLI interface using clap.
//!
//! Provides command-line arguments and subcommands for the tool.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};

use crate::application::CleanFormat;

/// tg-export - incrementally export Telegram chat history to JSONL.
///
/// Typical flow: authenticate once, export, then clean for reading.
#[derive(Parser, Debug)]
#[command(name = "tg-export")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging (use multiple times for more verbosity).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Configuration file (default: ~/.tg-export/config.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Log in and store a session token.
    Authenticate {
        /// Phone number in international format (prompted if omitted).
        #[arg(long)]
        phone: Option<String>,
    },

    /// Export a chat into an append-only JSONL log, resuming if it exists.
    Export {
        /// Chat link, @username, or numeric id.
        #[arg(short, long)]
        chat: String,

        /// Output log path.
        #[arg(short, long)]
        out: PathBuf,

        /// Only messages on or after this UTC date (YYYY-MM-DD).
        #[arg(long, value_parser = parse_since, conflicts_with = "last")]
        since: Option<DateTime<Utc>>,

        /// Only messages from the last N hours or days (e.g. 6h, 2d).
        #[arg(long, value_parser = parse_last)]
        last: Option<chrono::Duration>,
    },

    /// Export the last N hours into the quick-export directory.
    QuickExport {
        /// Chat link, @username, or numeric id.
        #[arg(short, long)]
        chat: String,

        /// How many hours back to export.
        #[arg(long, default_value = "1", value_parser = clap::value_parser!(u32).range(1..))]
        hours: u32,

        /// Write a cleaned transcript and drop the raw log (default).
        #[arg(long, overrides_with = "raw")]
        clean: bool,

        /// Keep the raw JSONL log instead of cleaning it.
        #[arg(long, overrides_with = "clean")]
        raw: bool,
    },

    /// Keep a log up to date, re-exporting on an interval.
    Sync {
        /// Chat link, @username, or numeric id.
        #[arg(short, long)]
        chat: String,

        /// Output log path.
        #[arg(short, long)]
        out: PathBuf,

        /// Interval between passes (e.g. 10m, 1h, or seconds).
        #[arg(long, value_parser = parse_every)]
        every: Duration,
    },

    /// Turn an export log into a readable transcript.
    Clean {
        /// Export log to read.
        #[arg(short, long)]
        input: PathBuf,

        /// Output path (default: <input>_clean.<ext>).
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format: txt or jsonl.
        #[arg(short, long, default_value = "txt")]
        format: CleanFormat,

        /// Keep messages that look like bot or spam output.
        #[arg(long)]
        keep_bots: bool,
    },

    /// Show statistics about an export log.
    Inspect {
        /// Export log to read.
        #[arg(short, long)]
        log: PathBuf,

        /// Output format: table or json.
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Run the local status server for quick exports.
    Serve {
        /// Port to listen on (loopback only).
        #[arg(short, long, default_value = "5000")]
        port: u16,
    },

    /// Show configuration or create the default file.
    Config {
        /// Create default config file if it doesn't exist.
        #[arg(long)]
        init: bool,

        /// With --init, overwrite an existing file with defaults.
        #[arg(long, requires = "init")]
        force: bool,
    },
}

impl Commands {
    /// Whether a quick export should produce a cleaned transcript.
    #[must_use]
    pub const fn wants_clean(clean: bool, raw: bool) -> bool {
        clean || !raw
    }
}

fn split_unit(value: &str) -> (&str, Option<char>) {
    let value = value.trim();
    match value.chars().last() {
        Some(c) if c.is_ascii_alphabetic() => (&value[..value.len() - 1], Some(c.to_ascii_lowercase())),
        _ => (value, None),
    }
}

fn parse_count(digits: &str, original: &str) -> Result<u64, String> {
    digits
        .trim()
        .parse::<u64>()
        .map_err(|_| format!("Invalid duration: {original}"))
}

/// `Nh` or `Nd` as a lookback window.
///
/// # Errors
/// Returns a message for any other shape.
pub fn parse_last(value: &str) -> Result<chrono::Duration, String> {
    let (digits, unit) = split_unit(value);
    let count = i64::try_from(parse_count(digits, value)?)
        .map_err(|_| format!("Duration too large: {value}"))?;
    if count == 0 {
        return Err("Duration must be positive".to_string());
    }

    let window = match unit {
        Some('h') => chrono::Duration::try_hours(count),
        Some('d') => chrono::Duration::try_days(count),
        _ => return Err(format!("Invalid --last value: {value}. Use Nh or Nd")),
    };
    window.ok_or_else(|| format!("Duration too large: {value}"))
}

/// Export cutoff from `--since` or a `--last` window ending at `now`.
///
/// # Errors
/// Returns a message if the window reaches before the earliest representable date.
pub fn export_cutoff(
    since: Option<DateTime<Utc>>,
    last: Option<chrono::Duration>,
    now: DateTime<Utc>,
) -> Result<Option<DateTime<Utc>>, String> {
    match (since, last) {
        (Some(since), _) => Ok(Some(since)),
        (None, Some(window)) => now
            .checked_sub_signed(window)
            .map(Some)
            .ok_or_else(|| "--last window is out of range".to_string()),
        (None, None) => Ok(None),
    }
}

/// `Nm`, `Nh`, `Ns`, or a bare number of seconds.
///
/// # Errors
/// Returns a message for any other shape.
pub fn parse_every(value: &str) -> Result<Duration, String> {
    let (digits, unit) = split_unit(value);
    let count = parse_count(digits, value)?;

    let secs = match unit {
        None | Some('s') => Some(count),
        Some('m') => count.checked_mul(60),
        Some('h') => count.checked_mul(3600),
        _ => return Err(format!("Invalid interval: {value}. Use Nm, Nh or seconds")),
    };

    secs.map(Duration::from_secs)
        .ok_or_else(|| format!("Interval too large: {value}"))
}

/// `YYYY-MM-DD` as UTC midnight.
///
/// # Errors
/// Returns a message if the date does not parse.
pub fn parse_since(value: &str) -> Result<DateTime<Utc>, String> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| format!("Invalid date: {value}. Use YYYY-MM-DD"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_last() {
        assert_eq!(parse_last("6h").unwrap(), chrono::Duration::hours(6));
        assert_eq!(parse_last("2D").unwrap(), chrono::Duration::days(2));
        assert!(parse_last("6").is_err());
        assert!(parse_last("0h").is_err());
        assert!(parse_last("3w").is_err());
        assert!(parse_last("h").is_err());
    }

    #[test]
    fn test_parse_last_oversized() {
        assert!(parse_last("99999999999999d").is_err());
        assert!(parse_last("99999999999999999999h").is_err());
    }

    #[test]
    fn test_export_cutoff() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let since = Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap();

        assert_eq!(export_cutoff(None, None, now).unwrap(), None);
        assert_eq!(export_cutoff(Some(since), None, now).unwrap(), Some(since));
        assert_eq!(
            export_cutoff(None, Some(parse_last("12h").unwrap()), now).unwrap(),
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap())
        );

        let huge = parse_last("3000000000h").unwrap();
        assert!(export_cutoff(None, Some(huge), now).is_err());
    }

    #[test]
    fn test_parse_every() {
        assert_eq!(parse_every("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_every("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_every("45").unwrap(), Duration::from_secs(45));
        assert_eq!(parse_every("90s").unwrap(), Duration::from_secs(90));
        assert!(parse_every("soon").is_err());
        assert!(parse_every("5x").is_err());
    }

    #[test]
    fn test_parse_since() {
        assert_eq!(
            parse_since("2024-05-01").unwrap(),
            Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()
        );
        assert!(parse_since("01/05/2024").is_err());
    }

    #[test]
    fn test_quick_export_clean_default() {
        let cli = Cli::try_parse_from(["tg-export", "quick-export", "--chat", "@g"]).unwrap();
        let Commands::QuickExport { clean, raw, hours, .. } = cli.command else {
            panic!("wrong command");
        };
        assert_eq!(hours, 1);
        assert!(Commands::wants_clean(clean, raw));

        let cli = Cli::try_parse_from(["tg-export", "quick-export", "--chat", "@g", "--raw"]).unwrap();
        let Commands::QuickExport { clean, raw, .. } = cli.command else {
            panic!("wrong command");
        };
        assert!(!Commands::wants_clean(clean, raw));
    }

    #[test]
    fn test_since_conflicts_with_last() {
        let result = Cli::try_parse_from([
            "tg-export", "export", "--chat", "@g", "--out", "a.jsonl", "--since", "2024-01-01",
            "--last", "2d",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_clean_format_arg() {
        let cli = Cli::try_parse_from(["tg-export", "clean", "-i", "in.jsonl", "-f", "jsonl"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Clean {
                format: CleanFormat::JsonLines,
                keep_bots: false,
                ..
            }
        ));
    }
}
