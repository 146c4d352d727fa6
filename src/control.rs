//! Pause / resume / cancel signalling between observers and the engine.
//!
//! The two flags are level-triggered and independent. They live in a
//! `tokio::sync::watch` channel so the engine can sleep until either a flag
//! flips or its deadline passes, instead of polling.

use tokio::sync::watch;
use tracing::debug;

/// Commands accepted by the control surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Pause,
    Resume,
    Cancel,
}

impl Command {
    /// Parses the wire form (`pause|resume|cancel`). Anything else is `None`
    /// and must be ignored by callers.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "pause" => Some(Command::Pause),
            "resume" => Some(Command::Resume),
            "cancel" => Some(Command::Cancel),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlFlags {
    pub pause_requested: bool,
    pub cancel_requested: bool,
}

/// Write side of the control flags. Cheap to clone; never blocks.
#[derive(Debug, Clone)]
pub struct Controller {
    tx: watch::Sender<ControlFlags>,
}

impl Default for Controller {
    fn default() -> Self {
        Self::new()
    }
}

impl Controller {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ControlFlags::default());
        Self { tx }
    }

    /// Apply a command. Idempotent; only wakes the engine when a flag changes.
    pub fn signal(&self, command: Command) {
        self.tx.send_if_modified(|flags| {
            let before = *flags;
            match command {
                Command::Pause => flags.pause_requested = true,
                Command::Resume => flags.pause_requested = false,
                Command::Cancel => flags.cancel_requested = true,
            }
            *flags != before
        });
        debug!(?command, "control signal");
    }

    pub fn cancel(&self) {
        self.signal(Command::Cancel);
    }

    #[cfg(test)]
    pub fn flags(&self) -> ControlFlags {
        *self.tx.borrow()
    }

    /// Drop both flags so nothing leaks into the next run.
    pub fn clear(&self) {
        self.tx.send_if_modified(|flags| {
            let changed = *flags != ControlFlags::default();
            *flags = ControlFlags::default();
            changed
        });
    }

    pub fn subscribe(&self) -> watch::Receiver<ControlFlags> {
        self.tx.subscribe()
    }
}
