//! The sequential job engine.
//!
//! [`JobEngine::start`] spawns one task that walks the items in order, calls
//! the processor once per item, appends to the audit log, then waits out the
//! interval (or the processor's override) before moving on. Pause and cancel
//! are observed before each item and throughout every wait, never in the
//! middle of a processor call.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{FixedOffset, Utc};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Instant, sleep_until};
use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

use crate::audit_log::{AuditLog, LogRecord};
use crate::control::{Command, ControlFlags, Controller};
use crate::error::{ProcessError, SweepError};
use crate::processor::{ItemProcessor, Outcome};
use crate::state_machine::{
    CurrentItem, JobSnapshot, Phase, StateMachine, Transition, WorkItem,
};
use crate::status::StatusReport;

/// Settings for one kind of job (delete, lookup, ...).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Wait after each item unless the processor overrides it.
    pub interval: Duration,
    /// Upper bound on how long pause/cancel can go unnoticed during a wait.
    pub poll_interval: Duration,
    pub log_dir: PathBuf,
    /// Audit log name prefix, e.g. `deleted_ids`.
    pub log_prefix: String,
    pub timezone: FixedOffset,
}

/// How a run ended when it was not a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEnd {
    Finished,
    Canceled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Cancel,
}

/// Returned by [`JobEngine::start`]; the job keeps running if dropped.
#[derive(Debug)]
pub struct JobHandle {
    pub job_id: Uuid,
    pub log_filename: String,
    task: JoinHandle<()>,
}

impl JobHandle {
    /// Resolves once the engine task has published a terminal phase.
    pub async fn wait(self) -> Result<(), JoinError> {
        self.task.await
    }
}

/// Owns the shared job context. Cheap to clone; all clones see the same job.
#[derive(Clone)]
pub struct JobEngine {
    snapshot: Arc<Mutex<JobSnapshot>>,
    controller: Controller,
    config: Arc<EngineConfig>,
}

impl JobEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            snapshot: Arc::new(Mutex::new(JobSnapshot::default())),
            controller: Controller::new(),
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn controller(&self) -> Controller {
        self.controller.clone()
    }

    pub fn signal(&self, command: Command) {
        self.controller.signal(command);
    }

    /// Point-in-time copy of the live state.
    pub fn snapshot(&self) -> JobSnapshot {
        self.snapshot.lock().clone()
    }

    /// Status projection; derived outside the lock.
    pub fn status(&self) -> StatusReport {
        let snapshot = self.snapshot();
        StatusReport::compute(&snapshot, Instant::now(), self.config.interval)
    }

    /// Start processing `items` in order on a background task.
    ///
    /// Fails with [`SweepError::AlreadyRunning`] when another job holds the
    /// engine, and with an I/O error when the audit log cannot be created.
    pub fn start<P: ItemProcessor>(
        &self,
        items: Vec<WorkItem>,
        processor: Arc<P>,
    ) -> Result<JobHandle, SweepError> {
        let job_id = Uuid::new_v4();
        {
            let mut snapshot = self.snapshot.lock();
            if snapshot.running {
                let current = snapshot.job_id.map(|id| id.to_string()).unwrap_or_default();
                return Err(SweepError::AlreadyRunning(current));
            }
            // Claim the engine before touching the filesystem.
            *snapshot = JobSnapshot {
                job_id: Some(job_id),
                running: true,
                ..Default::default()
            };
        }

        let started_wall = Utc::now().with_timezone(&self.config.timezone);
        let log = match AuditLog::open(&self.config.log_dir, &self.config.log_prefix, started_wall) {
            Ok(log) => log,
            Err(e) => {
                let mut snapshot = self.snapshot.lock();
                snapshot.running = false;
                snapshot.message = format!("cannot open audit log: {e}");
                return Err(e.into());
            }
        };
        let log_filename = log.filename().to_string();

        {
            let mut snapshot = self.snapshot.lock();
            *snapshot = JobSnapshot::starting(job_id, items.len() as u64, log_filename.clone(), Instant::now());
            advance(&mut snapshot, Phase::Processing);
        }
        info!(%job_id, total = items.len(), log = %log.path().display(), "job started");

        let run = Run {
            items,
            processor,
            log,
            snapshot: Arc::clone(&self.snapshot),
            control: self.controller.subscribe(),
            config: Arc::clone(&self.config),
        };
        let guard = RunGuard {
            snapshot: Arc::clone(&self.snapshot),
            controller: self.controller.clone(),
            armed: true,
        };
        let span = info_span!("job", %job_id);
        let task = tokio::spawn(run.execute(guard).instrument(span));

        Ok(JobHandle {
            job_id,
            log_filename,
            task,
        })
    }
}

fn advance(snapshot: &mut JobSnapshot, next: Phase) {
    if let Transition::Rejected { from, to } = StateMachine::advance(snapshot, next) {
        warn!(%from, %to, "rejected phase transition");
    }
}

/// Clears `running` and the control flags even if the engine task unwinds.
struct RunGuard {
    snapshot: Arc<Mutex<JobSnapshot>>,
    controller: Controller,
    armed: bool,
}

impl RunGuard {
    fn finish(mut self, result: Result<RunEnd, ProcessError>) {
        // Flags go first: once `running` is false a new job may already
        // own them.
        self.controller.clear();
        {
            let mut snapshot = self.snapshot.lock();
            match &result {
                Ok(RunEnd::Finished) => advance(&mut snapshot, Phase::Finished),
                Ok(RunEnd::Canceled) => advance(&mut snapshot, Phase::Canceled),
                Err(fault) => {
                    advance(&mut snapshot, Phase::Error);
                    snapshot.message = fault.to_string();
                }
            }
            debug_assert!(snapshot.phase.is_terminal(), "ended in {}", snapshot.phase);
            snapshot.running = false;
            info!(
                phase = %snapshot.phase,
                done = snapshot.done,
                ok = snapshot.ok,
                ng = snapshot.ng,
                "job ended"
            );
        }
        self.armed = false;
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        self.controller.clear();
        {
            let mut snapshot = self.snapshot.lock();
            // Forced: the task may have been dropped in any phase, Paused included.
            snapshot.phase = Phase::Error;
            snapshot.wait_until = None;
            snapshot.message = "engine task aborted".to_string();
            snapshot.running = false;
        }
        error!("job aborted without reaching a terminal phase");
    }
}

/// Everything the engine task owns for one run.
struct Run<P> {
    items: Vec<WorkItem>,
    processor: Arc<P>,
    log: AuditLog,
    snapshot: Arc<Mutex<JobSnapshot>>,
    control: watch::Receiver<ControlFlags>,
    config: Arc<EngineConfig>,
}

impl<P: ItemProcessor> Run<P> {
    async fn execute(mut self, guard: RunGuard) {
        let result = self.drive().await;
        if let Err(fault) = &result {
            error!(%fault, "job failed");
        }
        guard.finish(result);
    }

    async fn drive(&mut self) -> Result<RunEnd, ProcessError> {
        let items = std::mem::take(&mut self.items);
        for item in &items {
            if self.gate().await == Flow::Cancel {
                return Ok(RunEnd::Canceled);
            }

            self.update(|s| {
                advance(s, Phase::Processing);
                s.current_item = Some(CurrentItem {
                    id: item.id.clone(),
                    text: item.text.clone(),
                });
            });

            let (status, wait_override) = loop {
                let report = self.processor.process(item).await?;
                if let Some(status) = report.outcome.status() {
                    break (status, report.wait_override);
                }
                if let Outcome::RateLimited(retry_after) = report.outcome {
                    warn!(item_id = %item.id, ?retry_after, "rate limited, retrying same item");
                    if self.countdown(retry_after).await == Flow::Cancel {
                        return Ok(RunEnd::Canceled);
                    }
                    self.update(|s| advance(s, Phase::Processing));
                }
            };
            let responded_at = Utc::now().with_timezone(&self.config.timezone);

            // Committed only once the line is on disk.
            self.log.append(&LogRecord::new(item, status, responded_at))?;
            self.update(|s| s.record(status));
            info!(item_id = %item.id, outcome = %status, "item processed");

            let wait = wait_override.unwrap_or(self.config.interval);
            if self.countdown(wait).await == Flow::Cancel {
                return Ok(RunEnd::Canceled);
            }
        }
        Ok(RunEnd::Finished)
    }

    fn update<R>(&self, f: impl FnOnce(&mut JobSnapshot) -> R) -> R {
        let mut snapshot = self.snapshot.lock();
        f(&mut snapshot)
    }

    fn flags(&mut self) -> ControlFlags {
        *self.control.borrow_and_update()
    }

    /// Checked before every item: stop on cancel, hold while paused.
    async fn gate(&mut self) -> Flow {
        let flags = self.flags();
        if flags.cancel_requested {
            return Flow::Cancel;
        }
        if flags.pause_requested {
            return self.hold_while_paused().await;
        }
        Flow::Continue
    }

    /// Publish `wait_until` and sleep until it passes.
    ///
    /// A pause suspends the countdown: the remaining time is frozen and the
    /// deadline re-armed from the moment of resume.
    async fn countdown(&mut self, wait: Duration) -> Flow {
        let mut deadline = Instant::now() + wait;
        self.update(|s| {
            advance(s, Phase::Waiting);
            s.wait_until = Some(deadline);
        });

        loop {
            let flags = self.flags();
            if flags.cancel_requested {
                return Flow::Cancel;
            }
            if flags.pause_requested {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if self.hold_while_paused().await == Flow::Cancel {
                    return Flow::Cancel;
                }
                deadline = Instant::now() + remaining;
                self.update(|s| s.wait_until = Some(deadline));
                continue;
            }
            if Instant::now() >= deadline {
                return Flow::Continue;
            }
            self.sleep_or_signal(Some(deadline)).await;
        }
    }

    async fn hold_while_paused(&mut self) -> Flow {
        self.update(|s| advance(s, Phase::Paused));
        info!("paused");
        loop {
            self.sleep_or_signal(None).await;
            let flags = self.flags();
            if flags.cancel_requested {
                return Flow::Cancel;
            }
            if !flags.pause_requested {
                self.update(|s| {
                    if let Transition::Rejected { from, to } = StateMachine::resume(s) {
                        warn!(%from, %to, "rejected resume");
                    }
                });
                info!("resumed");
                return Flow::Continue;
            }
        }
    }

    /// Sleep until `deadline`, the next poll tick, or a control change,
    /// whichever comes first.
    async fn sleep_or_signal(&mut self, deadline: Option<Instant>) {
        let tick = Instant::now() + self.config.poll_interval;
        let until = deadline.map_or(tick, |d| d.min(tick));
        tokio::select! {
            _ = sleep_until(until) => {}
            changed = self.control.changed() => {
                if changed.is_err() {
                    // Sender gone; fall back to plain polling.
                    sleep_until(until).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use crate::processor::ItemReport;
    use crate::status::NOT_WAITING;

    const INTERVAL: Duration = Duration::from_secs(20);
    const POLL: Duration = Duration::from_millis(500);

    /// Answers from a script keyed by item id; unknown ids succeed.
    #[derive(Default)]
    struct ScriptedProcessor {
        script: Mutex<HashMap<String, Vec<Result<ItemReport, String>>>>,
        calls: Mutex<Vec<(String, Instant)>>,
    }

    impl ScriptedProcessor {
        fn with(entries: &[(&str, Result<ItemReport, String>)]) -> Self {
            let processor = Self::default();
            {
                let mut script = processor.script.lock();
                for (id, answer) in entries {
                    script.entry(id.to_string()).or_default().push(answer.clone());
                }
            }
            processor
        }

        fn calls(&self) -> Vec<(String, Instant)> {
            self.calls.lock().clone()
        }
    }

    impl ItemProcessor for ScriptedProcessor {
        async fn process(&self, item: &WorkItem) -> Result<ItemReport, ProcessError> {
            self.calls.lock().push((item.id.clone(), Instant::now()));
            let next = {
                let mut script = self.script.lock();
                script.get_mut(&item.id).and_then(|answers| {
                    (!answers.is_empty()).then(|| answers.remove(0))
                })
            };
            match next {
                None => Ok(ItemReport::new(Outcome::Success)),
                Some(Ok(report)) => Ok(report),
                Some(Err(detail)) => Err(ProcessError::Malformed {
                    item_id: item.id.clone(),
                    detail,
                }),
            }
        }
    }

    fn engine(dir: &tempfile::TempDir) -> JobEngine {
        JobEngine::new(EngineConfig {
            interval: INTERVAL,
            poll_interval: POLL,
            log_dir: dir.path().to_path_buf(),
            log_prefix: "deleted_ids".into(),
            timezone: FixedOffset::east_opt(9 * 3600).unwrap(),
        })
    }

    fn items(ids: &[&str]) -> Vec<WorkItem> {
        ids.iter().map(|id| WorkItem::new(*id, format!("text {id}"))).collect()
    }

    fn log_lines(engine: &JobEngine, dir: &tempfile::TempDir) -> Vec<String> {
        let name = engine.snapshot().log_filename.unwrap();
        std::fs::read_to_string(dir.path().join(name))
            .unwrap()
            .lines()
            .filter(|l| !l.starts_with('#'))
            .map(str::to_string)
            .collect()
    }

    async fn wait_for(engine: &JobEngine, pred: impl Fn(&JobSnapshot) -> bool) -> JobSnapshot {
        loop {
            let snapshot = engine.snapshot();
            assert!(snapshot.done <= snapshot.total);
            assert_eq!(snapshot.ok + snapshot.ng, snapshot.done);
            if pred(&snapshot) {
                return snapshot;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn mixed_outcomes_finish_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(&dir);
        let processor = Arc::new(ScriptedProcessor::with(&[(
            "B",
            Ok(ItemReport::new(Outcome::Failure(403))),
        )]));

        let handle = engine.start(items(&["A", "B", "C"]), processor).unwrap();
        handle.wait().await.unwrap();

        let snapshot = engine.snapshot();
        assert_eq!(snapshot.phase, Phase::Finished);
        assert!(!snapshot.running);
        assert_eq!((snapshot.done, snapshot.ok, snapshot.ng), (3, 2, 1));

        let lines = log_lines(&engine, &dir);
        let cols: Vec<(&str, &str)> = lines
            .iter()
            .map(|l| {
                let mut parts = l.split('\t');
                let _ts = parts.next();
                (parts.next().unwrap(), parts.next().unwrap())
            })
            .collect();
        assert_eq!(cols, vec![("A", "OK"), ("B", "NG(403)"), ("C", "OK")]);
    }

    #[tokio::test(start_paused = true)]
    async fn items_are_spaced_by_the_interval() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(&dir);
        let processor = Arc::new(ScriptedProcessor::default());

        let handle = engine.start(items(&["1", "2", "3"]), Arc::clone(&processor)).unwrap();
        handle.wait().await.unwrap();

        let calls = processor.calls();
        assert_eq!(calls.len(), 3);
        for pair in calls.windows(2) {
            assert_eq!(pair[1].1 - pair[0].1, INTERVAL);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_during_wait_stops_before_next_item() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(&dir);
        let processor = Arc::new(ScriptedProcessor::default());

        let handle = engine
            .start(items(&["1", "2", "3", "4", "5"]), Arc::clone(&processor))
            .unwrap();
        wait_for(&engine, |s| s.done == 2 && s.phase == Phase::Waiting).await;

        let signaled_at = Instant::now();
        engine.signal(Command::Cancel);
        handle.wait().await.unwrap();
        assert!(Instant::now() - signaled_at <= POLL);

        let snapshot = engine.snapshot();
        assert_eq!(snapshot.phase, Phase::Canceled);
        assert_eq!(snapshot.done, 2);
        assert!(!snapshot.running);
        assert_eq!(log_lines(&engine, &dir).len(), 2);
        assert_eq!(processor.calls().len(), 2);
        assert_eq!(engine.controller().flags(), ControlFlags::default());
    }

    #[tokio::test(start_paused = true)]
    async fn pause_during_wait_preserves_remaining_time() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(&dir);
        let processor = Arc::new(ScriptedProcessor::default());

        let handle = engine.start(items(&["1", "2"]), Arc::clone(&processor)).unwrap();
        let waiting = wait_for(&engine, |s| s.done == 1 && s.phase == Phase::Waiting).await;
        tokio::time::sleep(Duration::from_secs(5)).await;

        let pause_start = Instant::now();
        let remaining = waiting.wait_until.unwrap() - pause_start;
        engine.signal(Command::Pause);
        tokio::time::sleep(Duration::from_secs(120)).await;

        let paused = engine.snapshot();
        assert_eq!(paused.phase, Phase::Paused);
        assert_eq!(paused.done, 1);
        assert_eq!(engine.status().wait_remaining, NOT_WAITING);

        let resumed_at = Instant::now();
        engine.signal(Command::Resume);
        handle.wait().await.unwrap();

        let calls = processor.calls();
        assert_eq!(calls.len(), 2);
        let waited = calls[1].1 - resumed_at;
        assert!(
            waited >= remaining && waited <= remaining + POLL,
            "waited {waited:?}, expected about {remaining:?}"
        );
        assert_eq!(engine.snapshot().phase, Phase::Finished);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_before_item_holds_processing() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(&dir);
        let processor = Arc::new(ScriptedProcessor::default());

        engine.signal(Command::Pause);
        let handle = engine.start(items(&["1"]), Arc::clone(&processor)).unwrap();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(engine.snapshot().phase, Phase::Paused);
        assert!(processor.calls().is_empty());

        engine.signal(Command::Resume);
        handle.wait().await.unwrap();
        assert_eq!(processor.calls().len(), 1);
        assert_eq!(engine.snapshot().phase, Phase::Finished);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_while_paused() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(&dir);
        let processor = Arc::new(ScriptedProcessor::default());

        let handle = engine.start(items(&["1", "2"]), Arc::clone(&processor)).unwrap();
        wait_for(&engine, |s| s.phase == Phase::Waiting).await;
        engine.signal(Command::Pause);
        wait_for(&engine, |s| s.phase == Phase::Paused).await;
        engine.signal(Command::Cancel);
        handle.wait().await.unwrap();

        let snapshot = engine.snapshot();
        assert_eq!(snapshot.phase, Phase::Canceled);
        assert_eq!(snapshot.done, 1);
        assert_eq!(engine.controller().flags(), ControlFlags::default());
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limited_item_is_retried_without_counting() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(&dir);
        let processor = Arc::new(ScriptedProcessor::with(&[(
            "B",
            Ok(ItemReport::new(Outcome::RateLimited(Duration::from_secs(90)))),
        )]));

        let handle = engine.start(items(&["A", "B", "C"]), Arc::clone(&processor)).unwrap();
        handle.wait().await.unwrap();

        let snapshot = engine.snapshot();
        assert_eq!((snapshot.done, snapshot.ok, snapshot.ng), (3, 3, 0));
        assert_eq!(log_lines(&engine, &dir).len(), 3);

        let calls = processor.calls();
        let b_calls: Vec<Instant> = calls.iter().filter(|(id, _)| id == "B").map(|(_, at)| *at).collect();
        assert_eq!(b_calls.len(), 2);
        assert_eq!(b_calls[1] - b_calls[0], Duration::from_secs(90));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_override_replaces_interval_once() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(&dir);
        let processor = Arc::new(ScriptedProcessor::with(&[(
            "A",
            Ok(ItemReport::new(Outcome::Success).with_wait(Some(Duration::from_secs(3)))),
        )]));

        let handle = engine.start(items(&["A", "B", "C"]), Arc::clone(&processor)).unwrap();
        handle.wait().await.unwrap();

        let calls = processor.calls();
        assert_eq!(calls[1].1 - calls[0].1, Duration::from_secs(3));
        assert_eq!(calls[2].1 - calls[1].1, INTERVAL);
    }

    #[tokio::test(start_paused = true)]
    async fn unclassifiable_response_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(&dir);
        let processor = Arc::new(ScriptedProcessor::with(&[("B", Err("garbage".into()))]));

        let handle = engine.start(items(&["A", "B", "C"]), Arc::clone(&processor)).unwrap();
        handle.wait().await.unwrap();

        let snapshot = engine.snapshot();
        assert_eq!(snapshot.phase, Phase::Error);
        assert!(!snapshot.running);
        assert!(snapshot.message.contains("garbage"), "{}", snapshot.message);
        assert_eq!(snapshot.done, 1);
        assert_eq!(log_lines(&engine, &dir).len(), 1);
        assert_eq!(processor.calls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn second_start_is_rejected_while_running() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(&dir);
        let processor = Arc::new(ScriptedProcessor::default());

        let handle = engine.start(items(&["1", "2"]), Arc::clone(&processor)).unwrap();
        let err = engine.start(items(&["3"]), Arc::clone(&processor)).unwrap_err();
        assert!(matches!(err, SweepError::AlreadyRunning(ref id) if *id == handle.job_id.to_string()));

        engine.signal(Command::Cancel);
        handle.wait().await.unwrap();

        // Free again once the first run is over.
        let handle = engine.start(items(&["3"]), processor).unwrap();
        handle.wait().await.unwrap();
        assert_eq!(engine.snapshot().phase, Phase::Finished);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_source_finishes_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(&dir);
        let handle = engine
            .start(Vec::new(), Arc::new(ScriptedProcessor::default()))
            .unwrap();
        handle.wait().await.unwrap();

        let report = engine.status();
        assert_eq!(report.phase, Phase::Finished);
        assert_eq!(report.pct, 0);
        assert_eq!(report.eta_seconds, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn eta_midway_follows_floored_pace() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(&dir);
        let ids: Vec<String> = (0..10).map(|i| i.to_string()).collect();
        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();

        let handle = engine
            .start(items(&refs), Arc::new(ScriptedProcessor::default()))
            .unwrap();
        let snapshot = wait_for(&engine, |s| s.done == 5 && s.phase == Phase::Waiting).await;

        let now = Instant::now();
        let report = StatusReport::compute(&snapshot, now, INTERVAL);
        let elapsed = (now - snapshot.started_at.unwrap()).as_secs_f64();
        let expected = (5.0 * (elapsed / 5.0).max(20.0)) as u64 + report.wait_remaining.max(0) as u64;
        assert!(report.eta_seconds.abs_diff(expected) <= 1, "{} vs {expected}", report.eta_seconds);
        assert_eq!(report.pct, 50);

        engine.signal(Command::Cancel);
        handle.wait().await.unwrap();
    }

    #[tokio::test]
    async fn start_fails_when_log_dir_is_unusable() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").unwrap();
        let engine = JobEngine::new(EngineConfig {
            log_dir: blocker,
            ..engine(&dir).config().clone()
        });

        let err = engine
            .start(items(&["1"]), Arc::new(ScriptedProcessor::default()))
            .unwrap_err();
        assert!(matches!(err, SweepError::Io(_)));
        let snapshot = engine.snapshot();
        assert!(!snapshot.running);
        assert!(snapshot.message.starts_with("cannot open audit log"));
    }

    #[tokio::test(start_paused = true)]
    async fn back_to_back_runs_write_separate_logs() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(&dir);

        let first = engine
            .start(items(&["A"]), Arc::new(ScriptedProcessor::default()))
            .unwrap();
        let first_log = first.log_filename.clone();
        first.wait().await.unwrap();
        let first_lines = log_lines(&engine, &dir);

        let second = engine
            .start(items(&["B"]), Arc::new(ScriptedProcessor::default()))
            .unwrap();
        let second_log = second.log_filename.clone();
        second.wait().await.unwrap();

        assert_ne!(first_log, second_log);
        assert_eq!(first_lines.len(), 1);
        assert!(first_lines[0].contains("\tA\tOK\t"));
        let second_lines = log_lines(&engine, &dir);
        assert_eq!(second_lines.len(), 1);
        assert!(second_lines[0].contains("\tB\tOK\t"));
    }

    #[tokio::test(start_paused = true)]
    async fn pause_sent_after_a_run_applies_to_the_next() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(&dir);

        let first = engine
            .start(items(&["1"]), Arc::new(ScriptedProcessor::default()))
            .unwrap();
        first.wait().await.unwrap();
        assert!(!engine.snapshot().running);

        engine.signal(Command::Pause);
        let processor = Arc::new(ScriptedProcessor::default());
        let second = engine.start(items(&["2"]), Arc::clone(&processor)).unwrap();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(engine.snapshot().phase, Phase::Paused);
        assert!(processor.calls().is_empty());

        engine.signal(Command::Cancel);
        second.wait().await.unwrap();
        assert_eq!(engine.snapshot().phase, Phase::Canceled);
    }

    #[test]
    fn task_dropped_while_paused_ends_in_error() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(&dir);
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .start_paused(true)
            .build()
            .unwrap();

        runtime.block_on(async {
            engine.signal(Command::Pause);
            let _handle = engine
                .start(items(&["1"]), Arc::new(ScriptedProcessor::default()))
                .unwrap();
            wait_for(&engine, |s| s.phase == Phase::Paused).await;
        });
        // Shutting the runtime down drops the engine task mid-pause.
        drop(runtime);

        let snapshot = engine.snapshot();
        assert_eq!(snapshot.phase, Phase::Error);
        assert!(snapshot.phase.is_terminal());
        assert!(!snapshot.running);
        assert_eq!(snapshot.message, "engine task aborted");
        assert_eq!(engine.controller().flags(), ControlFlags::default());
    }
}
