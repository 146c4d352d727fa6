use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use uuid::Uuid;

use super::phase::Phase;

/// One unit of work handed to the engine by the item source.
///
/// Items are immutable for the lifetime of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: String,
    pub text: String,
    /// Creation time recorded by the source, echoed into the audit log.
    pub source_timestamp: Option<DateTime<FixedOffset>>,
}

impl WorkItem {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            source_timestamp: None,
        }
    }
}

/// Item currently being processed, as shown to observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CurrentItem {
    pub id: String,
    pub text: String,
}

/// How a single item ended, once the processor has returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemStatus {
    Ok,
    /// Non-success status code returned by the remote side.
    Ng(u16),
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemStatus::Ok => write!(f, "OK"),
            ItemStatus::Ng(code) => write!(f, "NG({code})"),
        }
    }
}

/// Live state of the current (or last) run.
///
/// Written only by the engine task, read by everyone else through a cloned
/// copy. Invariants: `done <= total`, `ok + ng == done`.
#[derive(Debug, Clone, Default)]
pub struct JobSnapshot {
    pub job_id: Option<Uuid>,
    pub running: bool,
    pub phase: Phase,
    pub total: u64,
    pub done: u64,
    pub ok: u64,
    pub ng: u64,
    pub current_item: Option<CurrentItem>,
    /// End of the current wait; meaningful only while `phase == Waiting`.
    pub wait_until: Option<Instant>,
    pub started_at: Option<Instant>,
    pub log_filename: Option<String>,
    pub message: String,
    pub(crate) paused_from: Option<Phase>,
}

impl JobSnapshot {
    /// Fresh snapshot for a run that is about to start.
    pub fn starting(job_id: Uuid, total: u64, log_filename: String, now: Instant) -> Self {
        Self {
            job_id: Some(job_id),
            running: true,
            total,
            started_at: Some(now),
            log_filename: Some(log_filename),
            ..Default::default()
        }
    }

    /// Count one committed item. `ok`/`ng` and `done` move together so a
    /// reader never observes `ok + ng != done`.
    pub fn record(&mut self, status: ItemStatus) {
        match status {
            ItemStatus::Ok => self.ok += 1,
            ItemStatus::Ng(_) => self.ng += 1,
        }
        self.done += 1;
        debug_assert!(self.done <= self.total);
        debug_assert_eq!(self.ok + self.ng, self.done);
    }

    pub fn remaining(&self) -> u64 {
        self.total.saturating_sub(self.done)
    }
}
