use std::fmt;

use gateway::{AttemptTicket, Eligibility, GatewayError};
use learn_core::model::{AnswerSubmission, AttemptId, AttemptOutcome, Quiz, QuizId};

/// Tags an outgoing request so its reply can be matched, or dropped when stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(u64);

impl RequestId {
    pub(crate) fn new(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Side effect requested by a session transition.
///
/// The session never performs I/O itself; a driver executes the effect and
/// feeds the matching [`Reply`] back through `QuizSession::apply`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    None,
    CheckEligibility {
        request: RequestId,
        quiz_id: QuizId,
    },
    FetchQuiz {
        request: RequestId,
        quiz_id: QuizId,
    },
    StartAttempt {
        request: RequestId,
        quiz_id: QuizId,
    },
    SubmitAttempt {
        request: RequestId,
        attempt_id: AttemptId,
        answers: Vec<AnswerSubmission>,
    },
    /// Fire-and-forget. No reply is expected.
    AbandonAttempt { attempt_id: AttemptId },
}

impl Effect {
    #[must_use]
    pub fn is_none(&self) -> bool {
        matches!(self, Effect::None)
    }

    /// The request this effect expects a reply for.
    #[must_use]
    pub fn request(&self) -> Option<RequestId> {
        match self {
            Effect::CheckEligibility { request, .. }
            | Effect::FetchQuiz { request, .. }
            | Effect::StartAttempt { request, .. }
            | Effect::SubmitAttempt { request, .. } => Some(*request),
            Effect::None | Effect::AbandonAttempt { .. } => None,
        }
    }
}

/// Collaborator response for an earlier [`Effect`].
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Eligibility {
        request: RequestId,
        result: Result<Eligibility, GatewayError>,
    },
    Quiz {
        request: RequestId,
        result: Result<Quiz, GatewayError>,
    },
    AttemptStarted {
        request: RequestId,
        result: Result<AttemptTicket, GatewayError>,
    },
    Submitted {
        request: RequestId,
        result: Result<AttemptOutcome, GatewayError>,
    },
}

impl Reply {
    #[must_use]
    pub fn request(&self) -> RequestId {
        match self {
            Reply::Eligibility { request, .. }
            | Reply::Quiz { request, .. }
            | Reply::AttemptStarted { request, .. }
            | Reply::Submitted { request, .. } => *request,
        }
    }
}
