//! Job records and their state machine.
//!
//! ```text
//! PENDING -> PROCESSING -> COMPLETED
//!                       -> FAILED
//! ```
//!
//! COMPLETED and FAILED are terminal. Every accepted transition is appended
//! to the job's history; a rejected one leaves the job untouched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::error::{ErrorKind, WatermarkError};
use crate::pipeline::{WatermarkOutcome, WatermarkRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Processing => "PROCESSING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn can_transition_to(&self, next: JobState) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing)
                | (Self::Processing, Self::Completed)
                | (Self::Processing, Self::Failed)
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("illegal job transition {from} -> {to}")]
pub struct IllegalTransition {
    pub from: JobState,
    pub to: JobState,
}

/// Classification stored on a failed job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobFailure {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&WatermarkError> for JobFailure {
    fn from(err: &WatermarkError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub state: JobState,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Job {
    id: Uuid,
    state: JobState,
    /// URL or uploaded file name
    input: String,
    request: WatermarkRequest,
    outcome: Option<WatermarkOutcome>,
    failure: Option<JobFailure>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    history: Vec<Transition>,
}

impl Job {
    pub fn new(id: Uuid, input: impl Into<String>, request: WatermarkRequest) -> Self {
        let now = Utc::now();
        Self {
            id,
            state: JobState::Pending,
            input: input.into(),
            request,
            outcome: None,
            failure: None,
            created_at: now,
            updated_at: now,
            history: vec![Transition {
                state: JobState::Pending,
                at: now,
            }],
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn request(&self) -> &WatermarkRequest {
        &self.request
    }

    pub fn outcome(&self) -> Option<&WatermarkOutcome> {
        self.outcome.as_ref()
    }

    pub fn failure(&self) -> Option<&JobFailure> {
        self.failure.as_ref()
    }

    pub fn history(&self) -> &[Transition] {
        &self.history
    }

    fn transition(&mut self, next: JobState) -> Result<(), IllegalTransition> {
        if !self.state.can_transition_to(next) {
            return Err(IllegalTransition {
                from: self.state,
                to: next,
            });
        }
        let now = Utc::now();
        self.state = next;
        self.updated_at = now;
        self.history.push(Transition {
            state: next,
            at: now,
        });
        Ok(())
    }

    pub fn start(&mut self) -> Result<(), IllegalTransition> {
        self.transition(JobState::Processing)
    }

    pub fn complete(&mut self, outcome: WatermarkOutcome) -> Result<(), IllegalTransition> {
        self.transition(JobState::Completed)?;
        self.outcome = Some(outcome);
        Ok(())
    }

    pub fn fail(&mut self, err: &WatermarkError) -> Result<(), IllegalTransition> {
        self.transition(JobState::Failed)?;
        self.failure = Some(JobFailure::from(err));
        Ok(())
    }

    /// Point-in-time view. `artifact_available` tells whether the stored
    /// output can still be downloaded.
    pub fn snapshot(&self, artifact_available: bool) -> JobSnapshot {
        let outcome = self.outcome.as_ref();
        let artifact_expired = outcome.is_some() && !artifact_available;
        JobSnapshot {
            job_id: self.id,
            state: self.state,
            input: self.input.clone(),
            artifact: outcome.map(|o| o.artifact.clone()),
            download_url: outcome
                .filter(|_| artifact_available)
                .map(|o| o.download_url.clone()),
            content_type: outcome.map(|o| o.content_type.clone()),
            expires_at: outcome.map(|o| o.expires_at),
            artifact_expired,
            error: self.failure.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            history: self.history.clone(),
        }
    }
}

/// What callers see when polling a job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSnapshot {
    pub job_id: Uuid,
    pub state: JobState,
    pub input: String,
    pub artifact: Option<String>,
    /// Only present while the artifact can be downloaded
    pub download_url: Option<String>,
    pub content_type: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub artifact_expired: bool,
    pub error: Option<JobFailure>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub history: Vec<Transition>,
}
