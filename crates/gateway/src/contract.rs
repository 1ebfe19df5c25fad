use async_trait::async_trait;
use std::sync::Arc;

use learn_core::model::{
    AnswerSubmission, AttemptId, AttemptOutcome, Course, CourseId, LessonId, ProgressSnapshot,
    Quiz, QuizId,
};

use crate::context::LearnerContext;
use crate::error::GatewayError;
use crate::http::{HttpBackend, HttpConfig};
use crate::memory::InMemoryBackend;
use crate::records::{AttemptTicket, Eligibility, LessonCompletion};

/// Course structure and learner progress, owned by the remote service.
#[async_trait]
pub trait ProgressGateway: Send + Sync {
    /// Fetch the static structure of a course.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::NotFound` for unknown courses, or access/transport errors.
    async fn get_course(
        &self,
        learner: &LearnerContext,
        course_id: CourseId,
    ) -> Result<Course, GatewayError>;

    /// Fetch the learner's progress. `Ok(None)` means "not enrolled".
    ///
    /// # Errors
    ///
    /// Returns `GatewayError` for access or transport failures.
    async fn get_course_progress(
        &self,
        learner: &LearnerContext,
        course_id: CourseId,
    ) -> Result<Option<ProgressSnapshot>, GatewayError>;

    /// Enroll the learner and return the initial snapshot.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError` for access or transport failures.
    async fn enroll(
        &self,
        learner: &LearnerContext,
        course_id: CourseId,
    ) -> Result<ProgressSnapshot, GatewayError>;

    /// Mark a lesson complete, optionally listing the content blocks finished.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Rejected` when the learner is not enrolled, or
    /// access/transport errors.
    async fn complete_lesson(
        &self,
        learner: &LearnerContext,
        lesson_id: LessonId,
        completed_blocks: &[u32],
    ) -> Result<LessonCompletion, GatewayError>;
}

/// Quiz delivery, attempts and grading, owned by the remote service.
#[async_trait]
pub trait QuizGateway: Send + Sync {
    /// # Errors
    ///
    /// Returns `GatewayError` for access or transport failures. A refusal is
    /// an `Ok` with `can_start == false`, not an error.
    async fn can_start_attempt(
        &self,
        learner: &LearnerContext,
        quiz_id: QuizId,
    ) -> Result<Eligibility, GatewayError>;

    /// Quiz metadata and questions with correct answers withheld.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError` for access, transport or validation failures.
    async fn get_quiz_for_learner(
        &self,
        learner: &LearnerContext,
        quiz_id: QuizId,
    ) -> Result<Quiz, GatewayError>;

    /// # Errors
    ///
    /// Returns `GatewayError::Rejected` when the learner may not start.
    async fn start_attempt(
        &self,
        learner: &LearnerContext,
        quiz_id: QuizId,
    ) -> Result<AttemptTicket, GatewayError>;

    /// Submit every question's answer and receive the graded outcome.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::NotFound` for unknown or finished attempts.
    async fn submit_attempt(
        &self,
        learner: &LearnerContext,
        attempt_id: AttemptId,
        answers: &[AnswerSubmission],
    ) -> Result<AttemptOutcome, GatewayError>;

    /// # Errors
    ///
    /// Returns `GatewayError::NotFound` for unknown or finished attempts.
    async fn abandon_attempt(
        &self,
        learner: &LearnerContext,
        attempt_id: AttemptId,
    ) -> Result<(), GatewayError>;
}

/// Both collaborators behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Gateways {
    pub progress: Arc<dyn ProgressGateway>,
    pub quizzes: Arc<dyn QuizGateway>,
}

impl Gateways {
    #[must_use]
    pub fn in_memory(backend: InMemoryBackend) -> Self {
        let progress: Arc<dyn ProgressGateway> = Arc::new(backend.clone());
        let quizzes: Arc<dyn QuizGateway> = Arc::new(backend);
        Self { progress, quizzes }
    }

    /// # Errors
    ///
    /// Returns `GatewayError::Unavailable` if the HTTP client cannot be built.
    pub fn http(config: HttpConfig) -> Result<Self, GatewayError> {
        let backend = Arc::new(HttpBackend::new(config)?);
        let progress: Arc<dyn ProgressGateway> = backend.clone();
        let quizzes: Arc<dyn QuizGateway> = backend;
        Ok(Self { progress, quizzes })
    }
}
