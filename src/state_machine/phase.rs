use std::fmt;

use serde::{Deserialize, Serialize};

use super::job::JobSnapshot;

/// The phases of a sweep job.
///
/// A run flows `Idle → Processing ⇄ Waiting` and ends in one of the terminal
/// phases `Canceled`, `Finished` or `Error`. `Paused` can be entered from
/// `Processing` or `Waiting` and returns to whichever it came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Idle,
    Processing,
    Waiting,
    Paused,
    Canceled,
    Finished,
    Error,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Idle => write!(f, "idle"),
            Phase::Processing => write!(f, "processing"),
            Phase::Waiting => write!(f, "waiting"),
            Phase::Paused => write!(f, "paused"),
            Phase::Canceled => write!(f, "canceled"),
            Phase::Finished => write!(f, "finished"),
            Phase::Error => write!(f, "error"),
        }
    }
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Canceled | Phase::Finished | Phase::Error)
    }

    /// Whether the edge `self → next` exists in the state machine.
    ///
    /// `Paused → Processing | Waiting` is further restricted by the phase the
    /// job was paused from; see [`StateMachine::advance`].
    pub fn can_transition_to(self, next: Phase) -> bool {
        use Phase::*;
        matches!(
            (self, next),
            (Idle, Processing)
                | (Processing, Waiting | Paused | Canceled | Finished | Error)
                | (Waiting, Processing | Paused | Canceled | Finished | Error)
                | (Paused, Processing | Waiting | Canceled)
        )
    }
}

/// The result of asking the state machine to move a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The snapshot moved from `from` to `to`.
    Moved { from: Phase, to: Phase },
    /// Already in the requested phase; nothing changed.
    Unchanged(Phase),
    /// The edge does not exist; the snapshot was left untouched.
    Rejected { from: Phase, to: Phase },
}

/// Drives a [`JobSnapshot`] through the phase graph.
pub struct StateMachine;

impl StateMachine {
    /// Move `snapshot` to `next` if the edge is legal.
    ///
    /// - Entering `Paused` remembers the phase it was entered from.
    /// - Leaving `Paused` for `Processing`/`Waiting` only succeeds towards the
    ///   remembered phase, so a resumed wait is never mistaken for a new item.
    /// - Leaving `Waiting` drops the published `wait_until`.
    pub fn advance(snapshot: &mut JobSnapshot, next: Phase) -> Transition {
        let from = snapshot.phase;
        if from == next {
            return Transition::Unchanged(from);
        }
        if !from.can_transition_to(next) {
            return Transition::Rejected { from, to: next };
        }
        if from == Phase::Paused
            && matches!(next, Phase::Processing | Phase::Waiting)
            && snapshot.paused_from != Some(next)
        {
            return Transition::Rejected { from, to: next };
        }

        match next {
            Phase::Paused => snapshot.paused_from = Some(from),
            _ => snapshot.paused_from = None,
        }
        if !matches!(next, Phase::Waiting | Phase::Paused) {
            snapshot.wait_until = None;
        }
        snapshot.phase = next;
        Transition::Moved { from, to: next }
    }

    /// Leave `Paused` towards the phase the job was paused from.
    pub fn resume(snapshot: &mut JobSnapshot) -> Transition {
        match snapshot.paused_from {
            Some(back) if snapshot.phase == Phase::Paused => Self::advance(snapshot, back),
            _ => Transition::Unchanged(snapshot.phase),
        }
    }
}
