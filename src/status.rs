//! Job status snapshots and the reduction into the two alert signals.
//!
//! Every cycle recomputes [`AlertState`] from scratch. Jobs that cannot be
//! resolved contribute nothing, so a flaky server never raises an alert on
//! its own.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Identifier of a CI job. Case-sensitive.
pub type JobName = String;

/// Result of a job's most recent completed build.
///
/// Deserializes from the Jenkins `result` strings; unrecognised values map
/// to [`Outcome::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    Success,
    Unstable,
    Aborted,
    Failure,
    NotBuilt,
    /// No completed build yet, or the result is not available.
    #[default]
    #[serde(other)]
    Unknown,
}

impl Outcome {
    /// Returns true for outcomes that light the alert output.
    pub fn is_error(self) -> bool {
        matches!(
            self,
            Outcome::Unstable | Outcome::Aborted | Outcome::Failure | Outcome::NotBuilt
        )
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Outcome::Success => "SUCCESS",
            Outcome::Unstable => "UNSTABLE",
            Outcome::Aborted => "ABORTED",
            Outcome::Failure => "FAILURE",
            Outcome::NotBuilt => "NOT_BUILT",
            Outcome::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// Snapshot of one job as reported by the CI server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatus {
    pub name: JobName,
    pub result: Outcome,
    pub is_building: bool,
}

impl JobStatus {
    pub fn new(name: impl Into<JobName>, result: Outcome, is_building: bool) -> Self {
        Self {
            name: name.into(),
            result,
            is_building,
        }
    }
}

/// Why a job contributed no signal to a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The job is not in the job set the server reported for this session.
    NotListed,
    /// The job exists but has never completed a build.
    NoBuildHistory,
    /// The status request failed.
    Transport(String),
    /// The status response could not be interpreted.
    Data(String),
}

impl From<&Error> for SkipReason {
    fn from(err: &Error) -> Self {
        match err {
            Error::NoBuildHistory(_) => SkipReason::NoBuildHistory,
            Error::Data(_) | Error::Json(_) => SkipReason::Data(err.to_string()),
            other => SkipReason::Transport(other.to_string()),
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NotListed => f.write_str("not listed by server"),
            SkipReason::NoBuildHistory => f.write_str("no build history"),
            SkipReason::Transport(reason) => write!(f, "transport failure: {reason}"),
            SkipReason::Data(reason) => write!(f, "bad data: {reason}"),
        }
    }
}

/// Outcome of looking up a single job within a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobResolution {
    Resolved(JobStatus),
    Skipped(SkipReason),
}

impl JobResolution {
    /// Returns true if the lookup failed for a reason other than the job
    /// being absent from the listing.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            JobResolution::Skipped(SkipReason::Transport(_) | SkipReason::Data(_))
        )
    }
}

/// The two signals driving the outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct AlertState {
    pub has_errors: bool,
    pub is_building: bool,
}

impl AlertState {
    /// Both outputs cleared.
    pub const SAFE: AlertState = AlertState {
        has_errors: false,
        is_building: false,
    };

    /// Folds one job status into the state.
    pub fn absorb(self, status: &JobStatus) -> Self {
        Self {
            has_errors: self.has_errors || status.result.is_error(),
            is_building: self.is_building || status.is_building,
        }
    }

    /// Reduces a set of already resolved statuses.
    pub fn from_statuses<'a>(statuses: impl IntoIterator<Item = &'a JobStatus>) -> Self {
        statuses
            .into_iter()
            .fold(AlertState::SAFE, |state, status| state.absorb(status))
    }
}

/// Reduces the configured jobs into an [`AlertState`].
///
/// Skipped lookups are logged and contribute nothing. The result is a
/// logical OR over the resolved jobs, so order and duplicates in
/// `jobs_to_check` do not matter.
pub fn reduce<F>(jobs_to_check: &[JobName], mut lookup: F) -> AlertState
where
    F: FnMut(&str) -> JobResolution,
{
    jobs_to_check
        .iter()
        .fold(AlertState::SAFE, |state, name| match lookup(name.as_str()) {
            JobResolution::Resolved(status) => {
                tracing::info!(
                    job = %name,
                    result = %status.result,
                    building = status.is_building,
                    "job status"
                );
                state.absorb(&status)
            }
            JobResolution::Skipped(reason) => {
                tracing::debug!(job = %name, reason = %reason, "skipping job");
                state
            }
        })
}
