mod job;
mod phase;

pub use job::{CurrentItem, ItemStatus, JobSnapshot, WorkItem};
pub use phase::{Phase, StateMachine, Transition};
