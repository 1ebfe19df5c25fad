use std::sync::Arc;

use tracing::{debug, warn};

use gateway::{LearnerContext, QuizGateway};
use learn_core::model::QuizId;

use super::effect::{Effect, Reply};
use super::session::QuizSession;
use super::view::Closing;
use crate::Clock;
use crate::error::SessionError;

/// Executes session effects against the quiz service on behalf of one learner.
#[derive(Clone)]
pub struct QuizLoopService {
    clock: Clock,
    learner: LearnerContext,
    quizzes: Arc<dyn QuizGateway>,
}

impl QuizLoopService {
    #[must_use]
    pub fn new(clock: Clock, learner: LearnerContext, quizzes: Arc<dyn QuizGateway>) -> Self {
        Self {
            clock,
            learner,
            quizzes,
        }
    }

    #[must_use]
    pub fn learner(&self) -> &LearnerContext {
        &self.learner
    }

    /// A fresh idle session sharing this service's clock.
    #[must_use]
    pub fn session(&self, quiz_id: QuizId) -> QuizSession {
        QuizSession::new(quiz_id, self.clock)
    }

    /// Perform one effect. Returns the reply to feed back into the session, if any.
    ///
    /// Abandoning is best effort: a failure is logged and otherwise ignored.
    pub async fn execute(&self, effect: Effect) -> Option<Reply> {
        let learner = &self.learner;
        match effect {
            Effect::None => None,
            Effect::CheckEligibility { request, quiz_id } => Some(Reply::Eligibility {
                request,
                result: self.quizzes.can_start_attempt(learner, quiz_id).await,
            }),
            Effect::FetchQuiz { request, quiz_id } => Some(Reply::Quiz {
                request,
                result: self.quizzes.get_quiz_for_learner(learner, quiz_id).await,
            }),
            Effect::StartAttempt { request, quiz_id } => Some(Reply::AttemptStarted {
                request,
                result: self.quizzes.start_attempt(learner, quiz_id).await,
            }),
            Effect::SubmitAttempt {
                request,
                attempt_id,
                answers,
            } => Some(Reply::Submitted {
                request,
                result: self
                    .quizzes
                    .submit_attempt(learner, attempt_id, &answers)
                    .await,
            }),
            Effect::AbandonAttempt { attempt_id } => {
                if let Err(err) = self.quizzes.abandon_attempt(learner, attempt_id).await {
                    warn!(%attempt_id, %err, "abandon failed, leaving it to expire");
                }
                None
            }
        }
    }

    /// Execute `effect` and every follow-up effect until the session settles.
    pub async fn drive(&self, session: &mut QuizSession, effect: Effect) {
        let mut effect = effect;
        while let Some(reply) = self.execute(effect).await {
            effect = session.apply(reply);
        }
        debug!(quiz_id = %session.quiz_id(), phase = %session.phase(), "session settled");
    }

    /// Open `quiz_id` and run it up to the intro or an error.
    ///
    /// # Errors
    ///
    /// Never fails for a fresh session; collaborator failures land in the
    /// session's error phase instead.
    pub async fn open(&self, quiz_id: QuizId) -> Result<QuizSession, SessionError> {
        let mut session = self.session(quiz_id);
        let effect = session.open()?;
        self.drive(&mut session, effect).await;
        Ok(session)
    }

    /// # Errors
    ///
    /// Returns the session's refusal when starting is not allowed now.
    pub async fn start(&self, session: &mut QuizSession) -> Result<(), SessionError> {
        let effect = session.start()?;
        self.drive(session, effect).await;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns the session's refusal, e.g. required questions left unanswered.
    pub async fn submit(&self, session: &mut QuizSession) -> Result<(), SessionError> {
        let effect = session.submit()?;
        self.drive(session, effect).await;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns the session's refusal when no retry is available.
    pub async fn retry(&self, session: &mut QuizSession) -> Result<(), SessionError> {
        let effect = session.retry()?;
        self.drive(session, effect).await;
        Ok(())
    }

    /// One scheduled second; submits when the countdown runs out.
    pub async fn tick(&self, session: &mut QuizSession) {
        let effect = session.tick();
        self.drive(session, effect).await;
    }

    /// Close the session, abandoning an active attempt if there is one.
    pub async fn close(&self, session: &mut QuizSession) -> Option<bool> {
        let Closing { passed, effect } = session.close();
        self.drive(session, effect).await;
        passed
    }
}
