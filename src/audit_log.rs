//! Append-only, tab-separated record of every processed item.
//!
//! One file per run, named after the run's start time. Lines are written and
//! flushed one at a time; the file is never truncated or rewritten.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset, SecondsFormat};

use crate::state_machine::{ItemStatus, WorkItem};

/// Maximum number of characters of display text kept per line.
pub const TEXT_HEAD_CHARS: usize = 120;

/// One line of the audit log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub response_timestamp: DateTime<FixedOffset>,
    pub item_id: String,
    pub outcome: ItemStatus,
    pub source_timestamp: Option<DateTime<FixedOffset>>,
    pub text_head: String,
}

impl LogRecord {
    pub fn new(item: &WorkItem, outcome: ItemStatus, response_timestamp: DateTime<FixedOffset>) -> Self {
        let offset = *response_timestamp.offset();
        Self {
            response_timestamp,
            item_id: item.id.clone(),
            outcome,
            source_timestamp: item.source_timestamp.map(|ts| ts.with_timezone(&offset)),
            text_head: text_head(&item.text),
        }
    }

    /// `response \t id \t outcome \t source_or_empty \t text_head`
    pub fn to_line(&self) -> String {
        let source = self
            .source_timestamp
            .map(|ts| iso_seconds(&ts))
            .unwrap_or_default();
        format!(
            "{}\t{}\t{}\t{}\t{}\n",
            iso_seconds(&self.response_timestamp),
            self.item_id,
            self.outcome,
            source,
            self.text_head
        )
    }
}

fn iso_seconds(ts: &DateTime<FixedOffset>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, false)
}

/// Flatten line breaks and tabs, trim, keep the first [`TEXT_HEAD_CHARS`] chars.
pub fn text_head(text: &str) -> String {
    let flat: String = text
        .chars()
        .map(|c| if matches!(c, '\n' | '\r' | '\t') { ' ' } else { c })
        .collect();
    flat.trim().chars().take(TEXT_HEAD_CHARS).collect()
}

/// An open audit log for the current run.
#[derive(Debug)]
pub struct AuditLog {
    file: File,
    path: PathBuf,
    filename: String,
}

impl AuditLog {
    /// Create `<dir>/<prefix>_<YYYYmmdd_HHMMSS>.log` and write its header.
    ///
    /// Every run gets a file of its own: when the name is taken (two runs
    /// within one second), `_2`, `_3`, ... is appended to the stem.
    pub fn open(dir: &Path, prefix: &str, now: DateTime<FixedOffset>) -> io::Result<Self> {
        std::fs::create_dir_all(dir)?;
        let stamp = now.format("%Y%m%d_%H%M%S").to_string();
        let (mut file, path, filename) = create_fresh(dir, &format!("{prefix}_{stamp}"))?;

        let header = format!(
            "# xsweep {prefix} log {stamp}\n# timezone: UTC{}\n# format: <response_at_iso>\t<item_id>\t<status>\t<source_at_iso>\t<text(head)>\n",
            now.offset()
        );
        file.write_all(header.as_bytes())?;
        file.flush()?;

        Ok(Self {
            file,
            path,
            filename,
        })
    }

    /// Write one record. Returns only after the line reached the OS.
    pub fn append(&mut self, record: &LogRecord) -> io::Result<()> {
        self.file.write_all(record.to_line().as_bytes())?;
        self.file.flush()
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Upper bound on `_N` suffixes tried for one stem.
const MAX_NAME_ATTEMPTS: u32 = 100;

fn create_fresh(dir: &Path, stem: &str) -> io::Result<(File, PathBuf, String)> {
    for attempt in 1..=MAX_NAME_ATTEMPTS {
        let filename = match attempt {
            1 => format!("{stem}.log"),
            n => format!("{stem}_{n}.log"),
        };
        let path = dir.join(&filename);
        match OpenOptions::new().append(true).create_new(true).open(&path) {
            Ok(file) => return Ok((file, path, filename)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e),
        }
    }
    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("no free log name for {stem}"),
    ))
}

/// Read a previously produced log byte-for-byte.
///
/// Only bare file names are accepted; anything that could walk out of `dir`
/// is reported as `NotFound`.
pub fn read(dir: &Path, filename: &str) -> io::Result<Vec<u8>> {
    if !is_plain_filename(filename) {
        return Err(io::Error::new(io::ErrorKind::NotFound, "no such log"));
    }
    std::fs::read(dir.join(filename))
}

fn is_plain_filename(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
        && !name.starts_with('.')
}
