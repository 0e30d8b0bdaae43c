//! Generation job handles returned by the proxy, and the polling schedule.
//!
//! The proxy answers a submission with a [`Prediction`] and is polled
//! until the job reaches a terminal status. [`PollPolicy::decide`] is the
//! sans-IO half of that loop: given the attempt number and the latest
//! prediction it says whether to stop, wait, or give up. The caller owns
//! the timer and the HTTP client.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::RequestError;

/// Job status as reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictionStatus {
    /// Queued or booting.
    Starting,
    /// Running.
    Processing,
    /// Finished with output.
    Succeeded,
    /// Finished with an error.
    Failed,
    /// Stopped before finishing.
    Canceled,
}

impl PredictionStatus {
    /// Returns `true` once the job can no longer change.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Canceled)
    }
}

impl fmt::Display for PredictionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Starting => f.write_str("starting"),
            Self::Processing => f.write_str("processing"),
            Self::Succeeded => f.write_str("succeeded"),
            Self::Failed => f.write_str("failed"),
            Self::Canceled => f.write_str("canceled"),
        }
    }
}

/// Output of a finished job: one URI or a list of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PredictionOutput {
    /// A single output URI.
    One(String),
    /// Several output URIs, in provider order.
    Many(Vec<String>),
}

impl PredictionOutput {
    /// All output URIs in order.
    #[must_use]
    pub fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(uri) => vec![uri],
            Self::Many(uris) => uris,
        }
    }
}

/// A generation job.
///
/// Unknown fields from the provider are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prediction {
    /// Provider job id, used to poll.
    pub id: String,
    /// Current status.
    pub status: PredictionStatus,
    /// Result URIs, once succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<PredictionOutput>,
    /// Provider error message, once failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Prediction {
    /// Parse a proxy response body.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::Json`] if the body is not a prediction.
    pub fn from_json(body: &str) -> Result<Self, RequestError> {
        Ok(serde_json::from_str(body)?)
    }

    /// Returns `true` once the job can no longer change.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// First output URI, if any.
    #[must_use]
    pub fn first_output(&self) -> Option<&str> {
        match self.output.as_ref()? {
            PredictionOutput::One(uri) => Some(uri),
            PredictionOutput::Many(uris) => uris.first().map(String::as_str),
        }
    }

    /// Take the job's outcome.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::Pending`] for a job still running,
    /// [`RequestError::PredictionFailed`] or
    /// [`RequestError::PredictionCanceled`] for an unsuccessful one, and
    /// [`RequestError::EmptyOutput`] if it succeeded without output.
    pub fn into_result(self) -> Result<Vec<String>, RequestError> {
        match self.status {
            PredictionStatus::Starting | PredictionStatus::Processing => {
                Err(RequestError::Pending {
                    id: self.id,
                    status: self.status,
                })
            }
            PredictionStatus::Failed => Err(RequestError::PredictionFailed {
                id: self.id,
                message: self.error.unwrap_or_else(|| "unknown error".to_owned()),
            }),
            PredictionStatus::Canceled => Err(RequestError::PredictionCanceled { id: self.id }),
            PredictionStatus::Succeeded => {
                let outputs = self.output.map(PredictionOutput::into_vec).unwrap_or_default();
                if outputs.is_empty() {
                    Err(RequestError::EmptyOutput { id: self.id })
                } else {
                    Ok(outputs)
                }
            }
        }
    }
}

/// What to do after a poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollDecision {
    /// The job succeeded with these output URIs.
    Done(Vec<String>),
    /// Poll again after this delay.
    Wait(Duration),
}

/// How often and how long to poll a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollPolicy {
    /// Polls before giving up.
    pub max_attempts: u32,
    /// Delay between polls.
    pub interval: Duration,
}

impl PollPolicy {
    /// Default number of polls.
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 30;
    /// Default delay between polls.
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(2);

    /// Longest time a job is waited for.
    #[must_use]
    pub fn budget(&self) -> Duration {
        self.interval * self.max_attempts
    }

    /// Decide what follows poll number `attempt` (1-based).
    ///
    /// # Errors
    ///
    /// Returns the job's error (see [`Prediction::into_result`]) once it
    /// has finished unsuccessfully, and [`RequestError::TimedOut`] when
    /// `attempt` reaches `max_attempts` and the job is still running.
    pub fn decide(
        &self,
        attempt: u32,
        prediction: &Prediction,
    ) -> Result<PollDecision, RequestError> {
        if prediction.is_terminal() {
            return prediction.clone().into_result().map(PollDecision::Done);
        }
        if attempt >= self.max_attempts {
            return Err(RequestError::TimedOut {
                id: prediction.id.clone(),
                attempts: attempt,
            });
        }
        Ok(PollDecision::Wait(self.interval))
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
            interval: Self::DEFAULT_INTERVAL,
        }
    }
}
