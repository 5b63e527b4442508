//! Job tracking for asynchronous watermark requests.

mod coordinator;
mod state;

pub use coordinator::{CoordinatorStats, JobCoordinator};
pub use state::{IllegalTransition, Job, JobFailure, JobSnapshot, JobState, Transition};
