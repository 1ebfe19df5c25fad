use chrono::Duration;
use tracing::{debug, info, warn};

use gateway::AttemptTicket;
use learn_core::model::{
    AnswerSheet, Attempt, AttemptOutcome, OptionId, Question, QuestionId, QuestionOption, Quiz,
    QuizId, Response,
};
use learn_core::{Clock, Countdown, CountdownTick};

use super::effect::{Effect, Reply, RequestId};
use super::plan::AttemptPlanner;
use super::view::{Closing, Phase, QuizProgress, SessionFailure};
use crate::error::SessionError;

//
// ─── STATE ─────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadStage {
    /// `then_start` skips the intro when the quiz is already loaded (retries).
    CheckingEligibility { then_start: bool },
    FetchingQuiz,
    StartingAttempt,
}

#[derive(Debug, Clone)]
struct ActiveAttempt {
    attempt: Attempt,
    answers: AnswerSheet,
    current: usize,
    countdown: Countdown,
}

#[derive(Debug, Clone)]
enum State {
    Idle,
    Loading(LoadStage),
    Intro,
    Active(ActiveAttempt),
    Submitting {
        active: ActiveAttempt,
        timed_out: bool,
    },
    Results {
        outcome: AttemptOutcome,
        timed_out: bool,
    },
    Error(SessionFailure),
    Closed {
        passed: Option<bool>,
    },
}

impl State {
    fn phase(&self) -> Phase {
        match self {
            State::Idle => Phase::Idle,
            State::Loading(_) => Phase::Loading,
            State::Intro => Phase::Intro,
            State::Active(_) => Phase::Active,
            State::Submitting { .. } => Phase::Submitting,
            State::Results { .. } => Phase::Results,
            State::Error(_) => Phase::Error,
            State::Closed { .. } => Phase::Closed,
        }
    }
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// One learner's run at a quiz, from the eligibility check to the graded result.
///
/// Transitions are plain method calls. Those that need the quiz service return an
/// [`Effect`]; the driver executes it and hands the [`Reply`] to [`QuizSession::apply`].
/// Only the most recently issued request is accepted; anything older is dropped.
#[derive(Debug, Clone)]
pub struct QuizSession {
    quiz_id: QuizId,
    clock: Clock,
    state: State,
    quiz: Option<Quiz>,
    pending: Option<RequestId>,
    next_request: u64,
}

impl QuizSession {
    #[must_use]
    pub fn new(quiz_id: QuizId, clock: Clock) -> Self {
        Self {
            quiz_id,
            clock,
            state: State::Idle,
            quiz: None,
            pending: None,
            next_request: 0,
        }
    }

    // ─── transitions ───────────────────────────────────────────────────────────

    /// `idle → loading`: ask whether the learner may start.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidTransition` unless the session is idle.
    pub fn open(&mut self) -> Result<Effect, SessionError> {
        match self.state {
            State::Idle => Ok(self.check_eligibility(false)),
            _ => Err(self.refuse("open")),
        }
    }

    /// `intro → loading`: request a new attempt.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidTransition` unless the intro is showing.
    pub fn start(&mut self) -> Result<Effect, SessionError> {
        match self.state {
            State::Intro => Ok(self.start_attempt()),
            _ => Err(self.refuse("start")),
        }
    }

    /// Record an option click on `question_id`. Returns whether the answer changed.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidTransition` outside an active attempt,
    /// `SessionError::UnknownQuestion` or `SessionError::Answer` for bad ids.
    pub fn select_option(
        &mut self,
        question_id: QuestionId,
        option_id: OptionId,
    ) -> Result<bool, SessionError> {
        let (quiz, active) = self.active_mut("select an option")?;
        let question = quiz
            .question(question_id)
            .ok_or(SessionError::UnknownQuestion(question_id))?;
        Ok(active.answers.select_option(question, option_id)?)
    }

    /// Store free text for `question_id`. Non free-text questions ignore it.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidTransition` outside an active attempt and
    /// `SessionError::UnknownQuestion` for ids outside the quiz.
    pub fn set_text(
        &mut self,
        question_id: QuestionId,
        text: impl Into<String>,
    ) -> Result<bool, SessionError> {
        let (quiz, active) = self.active_mut("enter text")?;
        let question = quiz
            .question(question_id)
            .ok_or(SessionError::UnknownQuestion(question_id))?;
        Ok(active.answers.set_text(question, text))
    }

    /// Move to the question at `index` in attempt order.
    ///
    /// Out-of-range targets, and backwards moves when the quiz forbids them, are
    /// no-ops returning `Ok(false)`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidTransition` outside an active attempt.
    pub fn navigate(&mut self, index: usize) -> Result<bool, SessionError> {
        let now = self.clock.now();
        let (quiz, active) = self.active_mut("navigate")?;
        if index >= active.attempt.question_count() || index == active.current {
            return Ok(false);
        }
        if index < active.current && !quiz.settings.allow_back_navigation {
            return Ok(false);
        }
        active.current = index;
        if let Some(question) = active.attempt.question_at(index) {
            active.answers.focus(question, now);
        }
        Ok(true)
    }

    /// # Errors
    ///
    /// Returns `SessionError::InvalidTransition` outside an active attempt.
    pub fn next(&mut self) -> Result<bool, SessionError> {
        let current = self.active_index("navigate")?;
        self.navigate(current + 1)
    }

    /// # Errors
    ///
    /// Returns `SessionError::InvalidTransition` outside an active attempt.
    pub fn previous(&mut self) -> Result<bool, SessionError> {
        let current = self.active_index("navigate")?;
        match current.checked_sub(1) {
            Some(index) => self.navigate(index),
            None => Ok(false),
        }
    }

    /// `active → submitting`, sending every question's answer.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::RequiredUnanswered` when skipping is disabled and a
    /// required question has no answer, `SessionError::SubmitInFlight` while a
    /// submission is pending, `SessionError::InvalidTransition` otherwise.
    pub fn submit(&mut self) -> Result<Effect, SessionError> {
        match &self.state {
            State::Active(_) => {
                let skip_allowed = self.quiz.as_ref().is_none_or(|q| q.settings.allow_skip);
                if !skip_allowed {
                    let missing = self.missing_required();
                    if !missing.is_empty() {
                        debug!(quiz_id = %self.quiz_id, missing = missing.len(), "submit refused");
                        return Err(SessionError::RequiredUnanswered { missing });
                    }
                }
                Ok(self.dispatch_submit(false))
            }
            State::Submitting { .. } => Err(SessionError::SubmitInFlight),
            _ => Err(self.refuse("submit")),
        }
    }

    /// Scheduled one-second tick.
    ///
    /// Counts the timer down while active and auto-submits when it reaches zero,
    /// regardless of skip rules. Ticks during a submission keep counting but never
    /// submit again. A fixed clock also moves forward one second per tick.
    pub fn tick(&mut self) -> Effect {
        if self.clock.is_fixed() {
            self.clock.advance(Duration::seconds(1));
        }
        match &mut self.state {
            State::Active(active) => match active.countdown.tick() {
                CountdownTick::Expired => {
                    info!(quiz_id = %self.quiz_id, "time is up, submitting");
                    self.dispatch_submit(true)
                }
                CountdownTick::Running(_) | CountdownTick::Idle => Effect::None,
            },
            State::Submitting { active, .. } => {
                if active.countdown.tick() == CountdownTick::Expired {
                    debug!(quiz_id = %self.quiz_id, "countdown expired during submission, ignored");
                }
                Effect::None
            }
            _ => Effect::None,
        }
    }

    /// Feed a collaborator reply back in. Replies to anything but the latest
    /// request are dropped.
    pub fn apply(&mut self, reply: Reply) -> Effect {
        let request = reply.request();
        if self.pending != Some(request) {
            debug!(quiz_id = %self.quiz_id, %request, phase = %self.phase(), "dropping stale reply");
            return Effect::None;
        }
        self.pending = None;

        match (std::mem::replace(&mut self.state, State::Idle), reply) {
            (
                State::Loading(LoadStage::CheckingEligibility { then_start }),
                Reply::Eligibility { result, .. },
            ) => match result {
                Ok(eligibility) if eligibility.can_start => {
                    if then_start && self.quiz.is_some() {
                        self.start_attempt()
                    } else {
                        self.fetch_quiz()
                    }
                }
                Ok(eligibility) => self.fail(SessionFailure::ineligible(eligibility)),
                Err(err) => self.fail(err.into()),
            },
            (State::Loading(LoadStage::FetchingQuiz), Reply::Quiz { result, .. }) => match result {
                Ok(quiz) if quiz.id != self.quiz_id => self.fail(SessionFailure::protocol(
                    format!("asked for quiz {}, received quiz {}", self.quiz_id, quiz.id),
                )),
                Ok(quiz) => {
                    self.quiz = Some(quiz);
                    self.transition(State::Intro);
                    Effect::None
                }
                Err(err) => self.fail(err.into()),
            },
            (State::Loading(LoadStage::StartingAttempt), Reply::AttemptStarted { result, .. }) => {
                match result {
                    Ok(ticket) => self.begin(ticket),
                    Err(err) => self.fail(err.into()),
                }
            }
            (State::Submitting { timed_out, .. }, Reply::Submitted { result, .. }) => match result
            {
                Ok(outcome) => {
                    info!(
                        quiz_id = %self.quiz_id,
                        attempt_id = %outcome.attempt_id,
                        score = outcome.score,
                        passed = outcome.passed,
                        "attempt graded"
                    );
                    self.transition(State::Results { outcome, timed_out });
                    Effect::None
                }
                Err(err) => self.fail(err.into()),
            },
            // The request was ours, so nothing else will answer it.
            (state, _) => self.fail(SessionFailure::protocol(format!(
                "reply to request {request} does not fit the {} phase",
                state.phase()
            ))),
        }
    }

    /// Tear the session down. Closing an active attempt asks the service to
    /// abandon it; any request still in flight is forgotten.
    pub fn close(&mut self) -> Closing {
        self.pending = None;
        let (passed, effect) = match std::mem::replace(&mut self.state, State::Idle) {
            State::Results { outcome, .. } => (Some(outcome.passed), Effect::None),
            State::Active(active) => {
                info!(quiz_id = %self.quiz_id, attempt_id = %active.attempt.id(), "abandoning attempt");
                (
                    None,
                    Effect::AbandonAttempt {
                        attempt_id: active.attempt.id(),
                    },
                )
            }
            State::Closed { passed } => (passed, Effect::None),
            State::Loading(_) | State::Submitting { .. } => {
                debug!(quiz_id = %self.quiz_id, "closing with a request in flight");
                (None, Effect::None)
            }
            State::Idle | State::Intro | State::Error(_) => (None, Effect::None),
        };
        self.transition(State::Closed { passed });
        Closing { passed, effect }
    }

    /// Go again from results or a recoverable error.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::RetryNotAllowed` when the outcome or failure rules
    /// it out, `SessionError::InvalidTransition` from other phases.
    pub fn retry(&mut self) -> Result<Effect, SessionError> {
        match &self.state {
            State::Results { outcome, .. } if outcome.retry_available() => {
                Ok(self.check_eligibility(true))
            }
            State::Error(failure) if failure.retryable() => {
                let then_start = self.quiz.is_some();
                Ok(self.check_eligibility(then_start))
            }
            State::Results { .. } | State::Error(_) => Err(SessionError::RetryNotAllowed),
            _ => Err(self.refuse("retry")),
        }
    }

    // ─── queries ───────────────────────────────────────────────────────────────

    #[must_use]
    pub fn quiz_id(&self) -> QuizId {
        self.quiz_id
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self.state, State::Closed { .. })
    }

    #[must_use]
    pub fn quiz(&self) -> Option<&Quiz> {
        self.quiz.as_ref()
    }

    #[must_use]
    pub fn attempt(&self) -> Option<&Attempt> {
        self.active().map(|active| &active.attempt)
    }

    #[must_use]
    pub fn answers(&self) -> Option<&AnswerSheet> {
        self.active().map(|active| &active.answers)
    }

    #[must_use]
    pub fn response(&self, question_id: QuestionId) -> Option<&Response> {
        self.answers()?.response(question_id)
    }

    #[must_use]
    pub fn current_index(&self) -> Option<usize> {
        self.active().map(|active| active.current)
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        let active = self.active()?;
        let id = active.attempt.question_at(active.current)?;
        self.quiz.as_ref()?.question(id)
    }

    /// Options of `question_id` in the order fixed for this attempt.
    #[must_use]
    pub fn options(&self, question_id: QuestionId) -> Vec<&QuestionOption> {
        let Some(question) = self.quiz.as_ref().and_then(|q| q.question(question_id)) else {
            return Vec::new();
        };
        match self
            .attempt()
            .and_then(|attempt| attempt.option_order(question_id))
        {
            Some(order) => order
                .iter()
                .filter_map(|id| question.options.iter().find(|o| o.id == *id))
                .collect(),
            None => question.options.iter().collect(),
        }
    }

    /// Seconds left on the countdown, `None` for untimed attempts.
    #[must_use]
    pub fn remaining_seconds(&self) -> Option<u32> {
        self.active()?.countdown.remaining()
    }

    /// Total time spent on `question_id` so far.
    #[must_use]
    pub fn time_spent(&self, question_id: QuestionId) -> Option<Duration> {
        Some(self.answers()?.time_spent(question_id, self.clock.now()))
    }

    #[must_use]
    pub fn progress(&self) -> Option<QuizProgress> {
        let active = self.active()?;
        Some(QuizProgress {
            total: active.attempt.question_count(),
            answered: active.answers.answered_count(),
            current_index: active.current,
            remaining_seconds: active.countdown.remaining(),
            can_go_back: active.current > 0
                && self
                    .quiz
                    .as_ref()
                    .is_some_and(|q| q.settings.allow_back_navigation),
        })
    }

    /// Required questions without an answer, in attempt order.
    #[must_use]
    pub fn missing_required(&self) -> Vec<QuestionId> {
        let (Some(quiz), Some(active)) = (self.quiz.as_ref(), self.active()) else {
            return Vec::new();
        };
        active
            .attempt
            .question_order()
            .iter()
            .copied()
            .filter(|id| {
                quiz.question(*id).is_some_and(|q| q.required) && !active.answers.is_answered(*id)
            })
            .collect()
    }

    #[must_use]
    pub fn outcome(&self) -> Option<&AttemptOutcome> {
        match &self.state {
            State::Results { outcome, .. } => Some(outcome),
            _ => None,
        }
    }

    /// Whether the shown results came from an auto-submit.
    #[must_use]
    pub fn timed_out(&self) -> bool {
        matches!(self.state, State::Results { timed_out: true, .. })
    }

    #[must_use]
    pub fn failure(&self) -> Option<&SessionFailure> {
        match &self.state {
            State::Error(failure) => Some(failure),
            _ => None,
        }
    }

    #[must_use]
    pub fn pending_request(&self) -> Option<RequestId> {
        self.pending
    }

    // ─── internals ─────────────────────────────────────────────────────────────

    fn active(&self) -> Option<&ActiveAttempt> {
        match &self.state {
            State::Active(active) | State::Submitting { active, .. } => Some(active),
            _ => None,
        }
    }

    fn active_mut(
        &mut self,
        action: &'static str,
    ) -> Result<(&Quiz, &mut ActiveAttempt), SessionError> {
        let phase = self.state.phase();
        match (&self.quiz, &mut self.state) {
            (Some(quiz), State::Active(active)) => Ok((quiz, active)),
            _ => Err(SessionError::InvalidTransition { action, phase }),
        }
    }

    fn active_index(&self, action: &'static str) -> Result<usize, SessionError> {
        match &self.state {
            State::Active(active) => Ok(active.current),
            _ => Err(self.refuse(action)),
        }
    }

    fn refuse(&self, action: &'static str) -> SessionError {
        SessionError::InvalidTransition {
            action,
            phase: self.phase(),
        }
    }

    fn issue(&mut self) -> RequestId {
        self.next_request += 1;
        let request = RequestId::new(self.next_request);
        self.pending = Some(request);
        request
    }

    fn transition(&mut self, next: State) {
        debug!(quiz_id = %self.quiz_id, phase = %next.phase(), "quiz session transition");
        self.state = next;
    }

    fn fail(&mut self, failure: SessionFailure) -> Effect {
        warn!(quiz_id = %self.quiz_id, kind = ?failure.kind, message = %failure.message, "quiz session failed");
        self.transition(State::Error(failure));
        Effect::None
    }

    fn check_eligibility(&mut self, then_start: bool) -> Effect {
        let request = self.issue();
        self.transition(State::Loading(LoadStage::CheckingEligibility { then_start }));
        Effect::CheckEligibility {
            request,
            quiz_id: self.quiz_id,
        }
    }

    fn fetch_quiz(&mut self) -> Effect {
        let request = self.issue();
        self.transition(State::Loading(LoadStage::FetchingQuiz));
        Effect::FetchQuiz {
            request,
            quiz_id: self.quiz_id,
        }
    }

    fn start_attempt(&mut self) -> Effect {
        let request = self.issue();
        self.transition(State::Loading(LoadStage::StartingAttempt));
        Effect::StartAttempt {
            request,
            quiz_id: self.quiz_id,
        }
    }

    fn begin(&mut self, ticket: AttemptTicket) -> Effect {
        let Some(quiz) = self.quiz.as_ref() else {
            return self.fail(SessionFailure::protocol(
                "attempt started before the quiz was loaded",
            ));
        };

        let plan = AttemptPlanner::new(quiz)
            .with_served_order(ticket.question_order)
            .build();
        let limit_secs = ticket
            .time_limit_minutes
            .or(quiz.settings.time_limit_minutes)
            .map(|minutes| minutes.saturating_mul(60));
        let attempt = match Attempt::new(
            ticket.attempt_id,
            quiz,
            plan.question_order,
            plan.option_order,
            ticket.started_at,
            ticket.expires_at,
        ) {
            Ok(attempt) => attempt,
            Err(err) => return self.fail(SessionFailure::protocol(err.to_string())),
        };

        let countdown = match (limit_secs, attempt.expires_at()) {
            (Some(secs), _) => Countdown::armed(secs),
            (None, Some(deadline)) => Countdown::armed(self.clock.seconds_until(deadline)),
            (None, None) => Countdown::disarmed(),
        };

        let mut answers = AnswerSheet::new();
        if let Some(first) = attempt.question_at(0) {
            answers.focus(first, self.clock.now());
        }

        info!(
            quiz_id = %self.quiz_id,
            attempt_id = %attempt.id(),
            questions = attempt.question_count(),
            remaining = ?countdown.remaining(),
            "attempt started"
        );
        self.transition(State::Active(ActiveAttempt {
            attempt,
            answers,
            current: 0,
            countdown,
        }));
        Effect::None
    }

    fn dispatch_submit(&mut self, timed_out: bool) -> Effect {
        let now = self.clock.now();
        let mut active = match std::mem::replace(&mut self.state, State::Idle) {
            State::Active(active) => active,
            other => {
                self.state = other;
                return Effect::None;
            }
        };
        active.answers.flush(now);
        let answers = active
            .answers
            .submissions(active.attempt.question_order(), now);
        let attempt_id = active.attempt.id();
        let request = self.issue();
        self.transition(State::Submitting { active, timed_out });
        Effect::SubmitAttempt {
            request,
            attempt_id,
            answers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use gateway::{Eligibility, FailureKind, GatewayError};
    use learn_core::model::{AnswerCounts, AttemptId, QuestionType, QuizSettings};
    use learn_core::time::{fixed_clock, fixed_now};
    use std::collections::BTreeSet;

    fn quiz(settings: QuizSettings) -> Quiz {
        Quiz::new(
            QuizId::new(1),
            "Quiz",
            vec![
                Question::new(QuestionId::new(1), QuestionType::SingleChoice, "first")
                    .with_option(OptionId::new(11), "a")
                    .with_option(OptionId::new(12), "b")
                    .required(),
                Question::new(QuestionId::new(2), QuestionType::MultipleChoice, "second")
                    .with_option(OptionId::new(21), "a")
                    .with_option(OptionId::new(22), "b")
                    .with_option(OptionId::new(23), "c")
                    .required(),
                Question::new(QuestionId::new(3), QuestionType::FreeText, "third").required(),
            ],
            settings,
        )
        .unwrap()
    }

    fn ticket(order: Option<Vec<u64>>) -> AttemptTicket {
        AttemptTicket {
            attempt_id: AttemptId::new(7),
            question_order: order.map(|ids| ids.into_iter().map(QuestionId::new).collect()),
            started_at: fixed_now(),
            expires_at: None,
            time_limit_minutes: None,
        }
    }

    fn request(effect: &Effect) -> RequestId {
        effect.request().unwrap()
    }

    fn intro(settings: QuizSettings) -> QuizSession {
        let mut session = QuizSession::new(QuizId::new(1), fixed_clock());
        let effect = session.open().unwrap();
        let effect = session.apply(Reply::Eligibility {
            request: request(&effect),
            result: Ok(Eligibility::allowed(0, None)),
        });
        assert!(matches!(effect, Effect::FetchQuiz { .. }));
        let effect = session.apply(Reply::Quiz {
            request: request(&effect),
            result: Ok(quiz(settings)),
        });
        assert!(effect.is_none());
        assert_eq!(session.phase(), Phase::Intro);
        session
    }

    fn active(settings: QuizSettings, served: Option<Vec<u64>>) -> QuizSession {
        let mut session = intro(settings);
        let effect = session.start().unwrap();
        assert_eq!(session.phase(), Phase::Loading);
        session.apply(Reply::AttemptStarted {
            request: request(&effect),
            result: Ok(ticket(served)),
        });
        assert_eq!(session.phase(), Phase::Active);
        session
    }

    fn outcome(passed: bool, can_retry: bool, remaining: Option<u32>) -> AttemptOutcome {
        AttemptOutcome {
            attempt_id: AttemptId::new(7),
            score: if passed { 100.0 } else { 0.0 },
            points_earned: 0,
            points_possible: 3,
            passed,
            counts: AnswerCounts::default(),
            rewards: None,
            can_retry,
            attempts_remaining: remaining,
        }
    }

    fn results(passed: bool, can_retry: bool, remaining: Option<u32>) -> QuizSession {
        let mut session = active(QuizSettings::default(), None);
        let effect = session.submit().unwrap();
        session.apply(Reply::Submitted {
            request: request(&effect),
            result: Ok(outcome(passed, can_retry, remaining)),
        });
        assert_eq!(session.phase(), Phase::Results);
        session
    }

    #[test]
    fn refusal_shows_reason_and_cooldown() {
        let mut session = QuizSession::new(QuizId::new(1), fixed_clock());
        let effect = session.open().unwrap();
        let until = fixed_now() + Duration::hours(2);
        session.apply(Reply::Eligibility {
            request: request(&effect),
            result: Ok(Eligibility {
                can_start: false,
                reason: None,
                attempts_used: 2,
                attempts_remaining: Some(1),
                cooldown_ends_at: Some(until),
            }),
        });

        assert_eq!(session.phase(), Phase::Error);
        let failure = session.failure().unwrap();
        assert_eq!(failure.kind, FailureKind::Eligibility);
        assert_eq!(failure.cooldown_ends_at(), Some(until));
        assert!(failure.message.contains("try again after"));
    }

    #[test]
    fn stale_reply_after_close_is_dropped() {
        let mut session = QuizSession::new(QuizId::new(1), fixed_clock());
        let effect = session.open().unwrap();
        let closing = session.close();
        assert_eq!(closing.passed, None);

        let next = session.apply(Reply::Eligibility {
            request: request(&effect),
            result: Ok(Eligibility::allowed(0, None)),
        });
        assert!(next.is_none());
        assert_eq!(session.phase(), Phase::Closed);
    }

    #[test]
    fn reply_to_superseded_request_is_dropped() {
        let mut session = active(QuizSettings::default(), None);
        let first = session.submit().unwrap();
        session.apply(Reply::Submitted {
            request: request(&first),
            result: Err(GatewayError::Unavailable("timeout".into())),
        });
        assert_eq!(session.phase(), Phase::Error);

        let retry = session.retry().unwrap();
        assert!(matches!(retry, Effect::CheckEligibility { .. }));
        let late = session.apply(Reply::Submitted {
            request: request(&first),
            result: Ok(outcome(true, false, None)),
        });
        assert!(late.is_none());
        assert_eq!(session.phase(), Phase::Loading);
    }

    #[test]
    fn mismatched_reply_fails_instead_of_hanging() {
        let mut session = QuizSession::new(QuizId::new(1), fixed_clock());
        let effect = session.open().unwrap();
        let next = session.apply(Reply::Quiz {
            request: request(&effect),
            result: Ok(quiz(QuizSettings::default())),
        });

        assert!(next.is_none());
        assert_eq!(session.phase(), Phase::Error);
        assert_eq!(session.failure().unwrap().kind, FailureKind::Protocol);
        let retry = session.retry().unwrap();
        assert!(matches!(retry, Effect::CheckEligibility { .. }));
        assert_eq!(session.pending_request(), retry.request());
    }

    #[test]
    fn ticks_after_close_do_nothing() {
        let mut session = active(
            QuizSettings {
                time_limit_minutes: Some(1),
                ..QuizSettings::default()
            },
            None,
        );
        session.close();
        for _ in 0..120 {
            assert!(session.tick().is_none());
        }
        assert_eq!(session.phase(), Phase::Closed);
        assert_eq!(session.remaining_seconds(), None);
    }

    #[test]
    fn transitions_outside_their_phase_are_refused() {
        let mut session = intro(QuizSettings::default());
        let err = session
            .select_option(QuestionId::new(1), OptionId::new(11))
            .unwrap_err();
        assert_eq!(
            err,
            SessionError::InvalidTransition {
                action: "select an option",
                phase: Phase::Intro
            }
        );
        assert!(session.submit().is_err());
        assert!(session.open().is_err());
        assert_eq!(session.phase(), Phase::Intro);
    }

    #[test]
    fn submit_refused_while_required_unanswered_and_skip_disabled() {
        let mut session = active(
            QuizSettings {
                allow_skip: false,
                ..QuizSettings::default()
            },
            None,
        );
        session
            .select_option(QuestionId::new(1), OptionId::new(11))
            .unwrap();
        session
            .select_option(QuestionId::new(2), OptionId::new(23))
            .unwrap();

        let err = session.submit().unwrap_err();
        assert_eq!(
            err,
            SessionError::RequiredUnanswered {
                missing: vec![QuestionId::new(3)]
            }
        );
        assert_eq!(session.phase(), Phase::Active);
        assert!(session.pending_request().is_none());

        session.set_text(QuestionId::new(3), "done").unwrap();
        assert!(matches!(session.submit().unwrap(), Effect::SubmitAttempt { .. }));
    }

    #[test]
    fn skip_allowed_submits_empty_answers() {
        let mut session = active(QuizSettings::default(), None);
        let Effect::SubmitAttempt { answers, .. } = session.submit().unwrap() else {
            panic!("expected a submission");
        };
        assert_eq!(answers.len(), 3);
        assert!(answers.iter().all(|a| a.is_empty()));
    }

    #[test]
    fn countdown_counts_down_and_submits_once() {
        let mut session = active(
            QuizSettings {
                time_limit_minutes: Some(1),
                allow_skip: false,
                ..QuizSettings::default()
            },
            None,
        );
        assert_eq!(session.remaining_seconds(), Some(60));

        let mut last = 60;
        for _ in 0..59 {
            assert!(session.tick().is_none());
            let remaining = session.remaining_seconds().unwrap();
            assert_eq!(remaining, last - 1);
            last = remaining;
        }
        assert_eq!(last, 1);

        let effect = session.tick();
        assert!(matches!(effect, Effect::SubmitAttempt { .. }));
        assert_eq!(session.phase(), Phase::Submitting);
        assert_eq!(session.remaining_seconds(), Some(0));

        for _ in 0..5 {
            assert!(session.tick().is_none());
        }
        assert_eq!(session.submit().unwrap_err(), SessionError::SubmitInFlight);

        session.apply(Reply::Submitted {
            request: request(&effect),
            result: Ok(outcome(false, true, None)),
        });
        assert_eq!(session.phase(), Phase::Results);
        assert!(session.timed_out());
    }

    #[test]
    fn expiry_from_ticket_arms_countdown() {
        let mut session = intro(QuizSettings::default());
        let effect = session.start().unwrap();
        let mut served = ticket(None);
        served.expires_at = Some(fixed_now() + Duration::seconds(90));
        session.apply(Reply::AttemptStarted {
            request: request(&effect),
            result: Ok(served),
        });
        assert_eq!(session.remaining_seconds(), Some(90));
    }

    #[test]
    fn untimed_attempt_never_submits_on_tick() {
        let mut session = active(QuizSettings::default(), None);
        for _ in 0..600 {
            assert!(session.tick().is_none());
        }
        assert_eq!(session.phase(), Phase::Active);
        assert_eq!(session.remaining_seconds(), None);
    }

    #[test]
    fn order_is_fixed_across_navigation() {
        let mut session = active(QuizSettings::default(), Some(vec![3, 1, 2]));
        let order = session.attempt().unwrap().question_order().to_vec();

        session.navigate(2).unwrap();
        session.previous().unwrap();
        session.navigate(0).unwrap();

        assert_eq!(session.attempt().unwrap().question_order(), order.as_slice());
        assert_eq!(session.current_question().unwrap().id, QuestionId::new(3));
    }

    #[test]
    fn back_navigation_can_be_disabled() {
        let mut session = active(
            QuizSettings {
                allow_back_navigation: false,
                ..QuizSettings::default()
            },
            None,
        );
        assert!(session.next().unwrap());
        assert!(!session.previous().unwrap());
        assert!(!session.navigate(0).unwrap());
        assert!(!session.navigate(9).unwrap());
        assert_eq!(session.current_index(), Some(1));
        assert!(!session.progress().unwrap().can_go_back);
    }

    #[test]
    fn time_accumulates_per_question_across_visits() {
        let mut session = active(QuizSettings::default(), None);
        for _ in 0..5 {
            session.tick();
        }
        session.next().unwrap();
        for _ in 0..3 {
            session.tick();
        }
        session.previous().unwrap();
        for _ in 0..2 {
            session.tick();
        }

        assert_eq!(
            session.time_spent(QuestionId::new(1)),
            Some(Duration::seconds(7))
        );
        assert_eq!(
            session.time_spent(QuestionId::new(2)),
            Some(Duration::seconds(3))
        );
        assert_eq!(
            session.time_spent(QuestionId::new(3)),
            Some(Duration::zero())
        );
    }

    #[test]
    fn multiple_choice_toggle_through_session() {
        let mut session = active(QuizSettings::default(), None);
        let q = QuestionId::new(2);
        session.select_option(q, OptionId::new(21)).unwrap();
        session.select_option(q, OptionId::new(22)).unwrap();
        session.select_option(q, OptionId::new(21)).unwrap();
        assert_eq!(
            session.response(q),
            Some(&Response::Choice(BTreeSet::from([OptionId::new(22)])))
        );
        assert_eq!(session.progress().unwrap().answered, 1);
    }

    #[test]
    fn served_order_that_is_not_a_permutation_fails() {
        let mut session = intro(QuizSettings::default());
        let effect = session.start().unwrap();
        session.apply(Reply::AttemptStarted {
            request: request(&effect),
            result: Ok(ticket(Some(vec![1, 2]))),
        });
        assert_eq!(session.phase(), Phase::Error);
        assert_eq!(session.failure().unwrap().kind, FailureKind::Protocol);
    }

    #[test]
    fn closing_active_attempt_abandons_it() {
        let mut session = active(QuizSettings::default(), None);
        let closing = session.close();
        assert_eq!(
            closing.effect,
            Effect::AbandonAttempt {
                attempt_id: AttemptId::new(7)
            }
        );
        assert!(session.is_terminal());
    }

    #[test]
    fn closing_results_reports_pass() {
        let mut session = results(true, false, None);
        let closing = session.close();
        assert_eq!(closing.passed, Some(true));
        assert!(closing.effect.is_none());
        assert_eq!(session.close().passed, Some(true));
    }

    #[test]
    fn retry_from_results_skips_intro() {
        let mut session = results(false, true, Some(2));
        let effect = session.retry().unwrap();
        let effect = session.apply(Reply::Eligibility {
            request: request(&effect),
            result: Ok(Eligibility::allowed(1, Some(2))),
        });
        assert!(matches!(effect, Effect::StartAttempt { .. }));
    }

    #[test]
    fn retry_needs_attempts_left() {
        let mut session = results(false, true, Some(0));
        assert_eq!(session.retry().unwrap_err(), SessionError::RetryNotAllowed);
        let mut passed = results(true, false, None);
        assert_eq!(passed.retry().unwrap_err(), SessionError::RetryNotAllowed);
    }

    #[test]
    fn access_errors_are_not_retryable() {
        let mut session = QuizSession::new(QuizId::new(1), fixed_clock());
        let effect = session.open().unwrap();
        session.apply(Reply::Eligibility {
            request: request(&effect),
            result: Err(GatewayError::SessionExpired),
        });
        assert_eq!(session.failure().unwrap().kind, FailureKind::Access);
        assert_eq!(session.retry().unwrap_err(), SessionError::RetryNotAllowed);
    }

    #[test]
    fn shuffled_options_keep_their_order() {
        let session = active(
            QuizSettings {
                shuffle_options: true,
                ..QuizSettings::default()
            },
            None,
        );
        let first: Vec<OptionId> = session
            .options(QuestionId::new(2))
            .iter()
            .map(|o| o.id)
            .collect();
        let again: Vec<OptionId> = session
            .options(QuestionId::new(2))
            .iter()
            .map(|o| o.id)
            .collect();
        assert_eq!(first, again);
        assert_eq!(first.len(), 3);
        assert!(session.options(QuestionId::new(3)).is_empty());
    }
}
