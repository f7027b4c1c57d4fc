//! Append-only JSONL export log.
//!
//! One record per line, each line written with a single `write_all` and
//! flushed before `append` returns. The resume point is recovered by reading
//! backward from the end of the file, so lookup cost depends on the size of
//! the last line, not the size of the log.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::domain::{AppError, ExportRecord, Result};

/// Bytes read per step when scanning backward.
const TAIL_CHUNK: usize = 4096;

/// Writer half of the export log.
pub struct ExportLog {
    path: PathBuf,
    file: File,
}

impl ExportLog {
    /// Opens the log for a resumed pass, keeping existing records.
    ///
    /// A torn trailing line (bytes after the last newline) is truncated so the
    /// next record starts on a clean line.
    ///
    /// # Errors
    /// Returns error if the file cannot be opened or repaired.
    pub fn open_append(path: &Path) -> Result<Self> {
        ensure_parent(path)?;

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)
            .map_err(|e| AppError::io(format!("Failed to open {}", path.display()), e))?;

        let len = file
            .seek(SeekFrom::End(0))
            .map_err(|e| AppError::io("Failed to seek export log", e))?;
        let complete = complete_prefix_len(&mut file, len)
            .map_err(|e| AppError::io("Failed to scan export log tail", e))?;

        if complete < len {
            tracing::warn!(
                path = %path.display(),
                dropped_bytes = len - complete,
                "Truncating partial trailing line"
            );
            file.set_len(complete)
                .map_err(|e| AppError::io("Failed to truncate partial line", e))?;
        }

        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    /// Opens the log for a fresh pass, discarding any previous content.
    ///
    /// # Errors
    /// Returns error if the file cannot be created.
    pub fn create(path: &Path) -> Result<Self> {
        ensure_parent(path)?;

        let file = File::create(path)
            .map_err(|e| AppError::io(format!("Failed to create {}", path.display()), e))?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    /// Appends one record as a complete line and flushes it.
    ///
    /// # Errors
    /// Returns error if serialization or the write fails.
    pub fn append(&mut self, record: &ExportRecord) -> Result<()> {
        let mut line = serde_json::to_string(record).map_err(AppError::json_parse)?;
        line.push('\n');

        self.file
            .write_all(line.as_bytes())
            .and_then(|()| self.file.flush())
            .map_err(|e| AppError::io(format!("Failed to append to {}", self.path.display()), e))
    }

    /// Current size of the log in bytes.
    ///
    /// # Errors
    /// Returns error if file metadata cannot be read.
    pub fn size(&self) -> Result<u64> {
        self.file
            .metadata()
            .map(|m| m.len())
            .map_err(|e| AppError::io("Failed to stat export log", e))
    }

    /// Path of the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[derive(Deserialize)]
struct IdOnly {
    msg_id: i64,
}

/// Returns the `msg_id` of the last complete line, or `None` when the file is
/// missing, empty, or its last line cannot be parsed.
#[must_use]
pub fn last_record_id(path: &Path) -> Option<i64> {
    let mut file = File::open(path).ok()?;

    match last_complete_line(&mut file) {
        Ok(Some(line)) => match serde_json::from_slice::<IdOnly>(line.trim_ascii()) {
            Ok(parsed) => Some(parsed.msg_id),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Unreadable trailing record, starting fresh");
                None
            }
        },
        Ok(None) => None,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to read log tail, starting fresh");
            None
        }
    }
}

/// Returns the `msg_id` of the first line, if it parses.
#[must_use]
pub fn first_record_id(path: &Path) -> Option<i64> {
    let file = File::open(path).ok()?;
    let mut line = String::new();
    BufReader::new(file).read_line(&mut line).ok()?;
    if !line.ends_with('\n') {
        return None;
    }
    serde_json::from_str::<IdOnly>(line.trim()).ok().map(|p| p.msg_id)
}

/// Highest id already recorded, or `None` to start fresh.
///
/// A fresh pass writes newest-first and resumed passes append in increasing
/// order, so the highest id is always on the first or the last line. An
/// unreadable last line still means "start fresh".
#[must_use]
pub fn resume_point(path: &Path) -> Option<i64> {
    let last = last_record_id(path)?;
    Some(first_record_id(path).map_or(last, |first| first.max(last)))
}

/// Reads every record in file order.
///
/// # Errors
/// Returns error if the file cannot be read or a line is not a valid record.
pub fn read_records(path: &Path) -> Result<Vec<ExportRecord>> {
    let file = File::open(path)
        .map_err(|e| AppError::io(format!("Failed to open {}", path.display()), e))?;

    let mut records = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| AppError::io("Failed to read export log", e))?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line).map_err(|e| AppError::InvalidData {
            message: format!("line {}: {e}", index + 1),
        })?;
        records.push(record);
    }

    Ok(records)
}

fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent)
            .map_err(|e| AppError::io("Failed to create output directory", e)),
        _ => Ok(()),
    }
}

/// Walks backward from `end` calling `visit` with the absolute offset of each
/// newline until it returns `true`.
fn scan_newlines_backward(
    file: &mut File,
    end: u64,
    mut visit: impl FnMut(u64) -> bool,
) -> std::io::Result<()> {
    let mut chunk = vec![0u8; TAIL_CHUNK];
    let mut pos = end;

    while pos > 0 {
        let step = usize::try_from(pos).map_or(TAIL_CHUNK, |p| p.min(TAIL_CHUNK));
        pos -= step as u64;

        file.seek(SeekFrom::Start(pos))?;
        file.read_exact(&mut chunk[..step])?;

        for (i, byte) in chunk[..step].iter().enumerate().rev() {
            if *byte == b'\n' && visit(pos + i as u64) {
                return Ok(());
            }
        }
    }

    Ok(())
}

/// Length of the prefix made of complete (newline-terminated) lines.
fn complete_prefix_len(file: &mut File, len: u64) -> std::io::Result<u64> {
    let mut complete = 0;
    scan_newlines_backward(file, len, |offset| {
        complete = offset + 1;
        true
    })?;
    Ok(complete)
}

/// Bytes of the last newline-terminated line, without the terminator.
fn last_complete_line(file: &mut File) -> std::io::Result<Option<Vec<u8>>> {
    let len = file.seek(SeekFrom::End(0))?;

    let mut terminator: Option<u64> = None;
    let mut start = 0;
    scan_newlines_backward(file, len, |offset| {
        if terminator.is_none() {
            terminator = Some(offset);
            false
        } else {
            start = offset + 1;
            true
        }
    })?;

    let Some(end) = terminator else {
        return Ok(None);
    };

    let line_len = usize::try_from(end - start)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    let mut line = vec![0u8; line_len];
    file.seek(SeekFrom::Start(start))?;
    file.read_exact(&mut line)?;

    Ok(Some(line))
}
