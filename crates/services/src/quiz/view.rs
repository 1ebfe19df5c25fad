use chrono::{DateTime, Utc};
use std::fmt;

use gateway::{Eligibility, FailureKind, GatewayError};

use super::effect::Effect;

/// Coarse lifecycle state, as a UI would switch on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Loading,
    Intro,
    Active,
    Submitting,
    Results,
    Error,
    Closed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::Loading => "loading",
            Phase::Intro => "intro",
            Phase::Active => "active",
            Phase::Submitting => "submitting",
            Phase::Results => "results",
            Phase::Error => "error",
            Phase::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Why the session landed in `Phase::Error`, phrased for the learner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionFailure {
    pub kind: FailureKind,
    pub message: String,
    /// Set when the quiz service refused to start an attempt.
    pub eligibility: Option<Eligibility>,
}

impl SessionFailure {
    #[must_use]
    pub fn ineligible(eligibility: Eligibility) -> Self {
        Self {
            kind: FailureKind::Eligibility,
            message: eligibility.describe(),
            eligibility: Some(eligibility),
        }
    }

    #[must_use]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Protocol,
            message: message.into(),
            eligibility: None,
        }
    }

    /// Access failures need the learner to sign in or obtain access first.
    #[must_use]
    pub fn retryable(&self) -> bool {
        self.kind != FailureKind::Access
    }

    #[must_use]
    pub fn cooldown_ends_at(&self) -> Option<DateTime<Utc>> {
        self.eligibility.as_ref().and_then(|e| e.cooldown_ends_at)
    }
}

impl From<GatewayError> for SessionFailure {
    fn from(err: GatewayError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
            eligibility: None,
        }
    }
}

/// Snapshot of an active attempt for progress bars and navigation buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuizProgress {
    pub total: usize,
    pub answered: usize,
    pub current_index: usize,
    pub remaining_seconds: Option<u32>,
    pub can_go_back: bool,
}

impl QuizProgress {
    #[must_use]
    pub fn is_last(&self) -> bool {
        self.current_index + 1 >= self.total
    }
}

/// Result of `QuizSession::close`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Closing {
    /// Known only when closing from results.
    pub passed: Option<bool>,
    pub effect: Effect,
}
