//! Shared error types for the services crate.

use thiserror::Error;

use gateway::GatewayError;
use learn_core::model::{AnswerError, CourseId, LessonId, QuestionId, QuizId};

use crate::quiz::Phase;

/// Errors emitted by `QuizSession` for calls it refuses.
///
/// A refused call leaves the session exactly as it was.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("cannot {action} while the session is {phase}")]
    InvalidTransition { action: &'static str, phase: Phase },
    #[error("{} required question(s) still need an answer", .missing.len())]
    RequiredUnanswered { missing: Vec<QuestionId> },
    #[error("a submission is already in flight")]
    SubmitInFlight,
    #[error("this attempt cannot be retried")]
    RetryNotAllowed,
    #[error("question {0} is not part of this quiz")]
    UnknownQuestion(QuestionId),
    #[error(transparent)]
    Answer(#[from] AnswerError),
}

/// Errors emitted by `CourseProgressService`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("lesson {0} is locked")]
    LessonLocked(LessonId),
    #[error("lesson {0} is not available in this course")]
    UnknownLesson(LessonId),
    #[error("quiz {0} is not available yet")]
    QuizLocked(QuizId),
    #[error("a newer load of course {0} replaced this one")]
    Superseded(CourseId),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}
