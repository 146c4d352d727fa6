//! Read-only projection of a [`JobSnapshot`] for observers.
//!
//! Everything here is computed from a cloned snapshot outside the engine's
//! lock; nothing in this module touches shared state.

use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::state_machine::{JobSnapshot, Phase};

/// Sentinel for `wait_remaining` when the job is not waiting.
pub const NOT_WAITING: i64 = -1;

/// Wire shape of `GET /status`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusReport {
    pub running: bool,
    pub total: u64,
    pub done: u64,
    pub ok: u64,
    pub ng: u64,
    pub current_id: Option<String>,
    pub current_text: Option<String>,
    pub phase: Phase,
    pub wait_remaining: i64,
    pub log_filename: Option<String>,
    pub message: String,
    pub pct: u64,
    pub eta_seconds: u64,
    pub eta_hms: String,
}

impl StatusReport {
    /// Derive the report at `now`. `interval` is both the per-item estimate
    /// before anything finished and the floor of the observed average.
    pub fn compute(snapshot: &JobSnapshot, now: Instant, interval: Duration) -> Self {
        let wait_remaining = wait_remaining(snapshot, now);
        let eta_seconds = eta_seconds(snapshot, now, interval, wait_remaining);

        Self {
            running: snapshot.running,
            total: snapshot.total,
            done: snapshot.done,
            ok: snapshot.ok,
            ng: snapshot.ng,
            current_id: snapshot.current_item.as_ref().map(|c| c.id.clone()),
            current_text: snapshot.current_item.as_ref().map(|c| c.text.clone()),
            phase: snapshot.phase,
            wait_remaining,
            log_filename: snapshot.log_filename.clone(),
            message: snapshot.message.clone(),
            pct: percent(snapshot.done, snapshot.total),
            eta_seconds,
            eta_hms: format_hms(eta_seconds),
        }
    }
}

pub fn percent(done: u64, total: u64) -> u64 {
    if total == 0 {
        return 0;
    }
    done.min(total) * 100 / total
}

/// Whole seconds left in the current wait, or [`NOT_WAITING`].
pub fn wait_remaining(snapshot: &JobSnapshot, now: Instant) -> i64 {
    match (snapshot.phase, snapshot.wait_until) {
        (Phase::Waiting, Some(until)) => until.saturating_duration_since(now).as_secs() as i64,
        _ => NOT_WAITING,
    }
}

/// Items left times the observed pace, plus whatever is left of the current wait.
///
/// The pace is `elapsed / done` floored at `interval` so a few fast first
/// items cannot make the estimate optimistic.
pub fn eta_seconds(snapshot: &JobSnapshot, now: Instant, interval: Duration, wait_remaining: i64) -> u64 {
    let Some(started_at) = snapshot.started_at else {
        return 0;
    };
    if snapshot.total == 0 || snapshot.done >= snapshot.total {
        return 0;
    }

    let per_item = if snapshot.done > 0 {
        let elapsed = now.saturating_duration_since(started_at).as_secs_f64();
        (elapsed / snapshot.done as f64).max(interval.as_secs_f64())
    } else {
        interval.as_secs_f64()
    };

    let mut eta = (snapshot.remaining() as f64 * per_item) as u64;
    if wait_remaining > 0 {
        eta += wait_remaining as u64;
    }
    eta
}

/// `3725 -> "1h 2m 5s"`, `65 -> "1m 5s"`, `7 -> "7s"`.
pub fn format_hms(seconds: u64) -> String {
    let h = seconds / 3600;
    let m = (seconds % 3600) / 60;
    let s = seconds % 60;
    if h > 0 {
        format!("{h}h {m}m {s}s")
    } else if m > 0 {
        format!("{m}m {s}s")
    } else {
        format!("{s}s")
    }
}
