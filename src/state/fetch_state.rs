//! Per-request fetch state
//!
//! `Attempting → {Succeeded, Backoff → Attempting, PermanentlyFailed}`
use crate::crawler::RetryDecision;
use std::fmt;
use std::time::Duration;

/// Where a single FetchRequest stands in its retry lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchState {
    /// A fetch is about to run (or running) as attempt number `attempt`
    Attempting { attempt: u32 },

    /// Waiting out `delay` before attempt number `next_attempt`
    Backoff { next_attempt: u32, delay: Duration },

    /// The page was fetched
    Succeeded,

    /// Abandoned: permanent status or retries exhausted
    PermanentlyFailed,
}

impl FetchState {
    /// Initial state of a fresh request
    pub fn start(attempt: u32) -> Self {
        Self::Attempting { attempt }
    }

    /// Applies a retry decision to an `Attempting` state
    ///
    /// Terminal states stay where they are.
    pub fn after(self, decision: RetryDecision) -> Self {
        match self {
            Self::Attempting { attempt } => match decision {
                RetryDecision::Succeed => Self::Succeeded,
                RetryDecision::Retry(delay) => Self::Backoff {
                    next_attempt: attempt + 1,
                    delay,
                },
                RetryDecision::GiveUp => Self::PermanentlyFailed,
            },
            other => other,
        }
    }

    /// Leaves `Backoff` once its delay has elapsed
    pub fn resume(self) -> Self {
        match self {
            Self::Backoff { next_attempt, .. } => Self::Attempting {
                attempt: next_attempt,
            },
            other => other,
        }
    }

    /// Returns true if this is a terminal state (no further attempts)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::PermanentlyFailed)
    }

    /// Returns true if this represents a successful completion
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Attempting { .. } => "attempting",
            Self::Backoff { .. } => "backoff",
            Self::Succeeded => "succeeded",
            Self::PermanentlyFailed => "permanently_failed",
        }
    }
}

impl fmt::Display for FetchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
