use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::seq::SliceRandom;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

use learn_core::Clock;
use learn_core::model::{
    AnswerCounts, AnswerSubmission, AttemptId, AttemptOutcome, Course, CourseId, LearnerId,
    LessonId, LessonProgress, OptionId, ProgressSnapshot, ProgressStatus, QuestionId, Quiz,
    QuizId, Rewards, ThemeProgress,
};

use crate::context::LearnerContext;
use crate::contract::{ProgressGateway, QuizGateway};
use crate::error::GatewayError;
use crate::records::{AttemptTicket, Eligibility, LessonCompletion};

/// Correct answer for one question, known only to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpectedAnswer {
    Options(BTreeSet<OptionId>),
    /// Accepted texts, compared trimmed and case-insensitively.
    Text(Vec<String>),
}

impl ExpectedAnswer {
    #[must_use]
    pub fn option(id: OptionId) -> Self {
        Self::Options(BTreeSet::from([id]))
    }

    fn matches(&self, submission: &AnswerSubmission) -> bool {
        match self {
            ExpectedAnswer::Options(expected) => {
                let given: BTreeSet<OptionId> =
                    submission.selected_option_ids.iter().copied().collect();
                given == *expected
            }
            ExpectedAnswer::Text(accepted) => submission.text_answer.as_deref().is_some_and(|text| {
                let text = text.trim().to_lowercase();
                accepted.iter().any(|a| a.trim().to_lowercase() == text)
            }),
        }
    }
}

/// Collaborator operations, used to inject failures and count calls in tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    GetCourse,
    GetProgress,
    Enroll,
    CompleteLesson,
    CanStart,
    GetQuiz,
    StartAttempt,
    SubmitAttempt,
    AbandonAttempt,
}

struct QuizEntry {
    quiz: Quiz,
    key: HashMap<QuestionId, ExpectedAnswer>,
    cooldown: Option<Duration>,
    rewards: Option<Rewards>,
}

struct OpenAttempt {
    learner: LearnerId,
    quiz_id: QuizId,
}

struct FinishedAttempt {
    finished_at: DateTime<Utc>,
    passed: bool,
}

#[derive(Default)]
struct State {
    courses: HashMap<CourseId, Course>,
    progress: HashMap<(LearnerId, CourseId), ProgressSnapshot>,
    quizzes: HashMap<QuizId, QuizEntry>,
    open: HashMap<AttemptId, OpenAttempt>,
    history: HashMap<(LearnerId, QuizId), Vec<FinishedAttempt>>,
    failures: HashMap<Operation, VecDeque<GatewayError>>,
    calls: HashMap<Operation, usize>,
    next_attempt: u64,
}

impl State {
    fn enter(&mut self, op: Operation) -> Result<(), GatewayError> {
        *self.calls.entry(op).or_default() += 1;
        match self.failures.get_mut(&op).and_then(VecDeque::pop_front) {
            Some(err) => {
                debug!(?op, %err, "injected failure");
                Err(err)
            }
            None => Ok(()),
        }
    }

    fn eligibility(
        &self,
        learner: LearnerId,
        quiz_id: QuizId,
        now: DateTime<Utc>,
    ) -> Result<Eligibility, GatewayError> {
        let entry = self.quizzes.get(&quiz_id).ok_or(GatewayError::NotFound)?;
        let history = self
            .history
            .get(&(learner, quiz_id))
            .map_or(&[][..], Vec::as_slice);
        let used = u32::try_from(history.len()).unwrap_or(u32::MAX);
        let remaining = entry
            .quiz
            .settings
            .max_attempts
            .map(|max| max.saturating_sub(used));

        if remaining == Some(0) {
            return Ok(Eligibility {
                can_start: false,
                reason: Some("no attempts left for this quiz".into()),
                attempts_used: used,
                attempts_remaining: remaining,
                cooldown_ends_at: None,
            });
        }

        if let (Some(cooldown), Some(last)) = (entry.cooldown, history.last()) {
            let ends = last.finished_at + cooldown;
            if !last.passed && ends > now {
                return Ok(Eligibility {
                    can_start: false,
                    reason: None,
                    attempts_used: used,
                    attempts_remaining: remaining,
                    cooldown_ends_at: Some(ends),
                });
            }
        }

        Ok(Eligibility::allowed(used, remaining))
    }
}

/// In-memory stand-in for the remote service, for tests and the demo.
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    clock: Clock,
    state: Arc<Mutex<State>>,
}

impl InMemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, GatewayError> {
        self.state
            .lock()
            .map_err(|e| GatewayError::Unavailable(e.to_string()))
    }

    /// # Errors
    ///
    /// Returns `GatewayError::Invalid` for a malformed course and
    /// `GatewayError::Unavailable` if the state lock is poisoned.
    pub fn insert_course(&self, course: Course) -> Result<(), GatewayError> {
        course.validate().map_err(learn_core::Error::from)?;
        let mut state = self.lock()?;
        state.courses.insert(course.id, course);
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `GatewayError::Unavailable` if the state lock is poisoned.
    pub fn insert_progress(&self, snapshot: ProgressSnapshot) -> Result<(), GatewayError> {
        let mut state = self.lock()?;
        state
            .progress
            .insert((snapshot.learner_id, snapshot.course_id), snapshot);
        Ok(())
    }

    /// Register a quiz together with its answer key.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Invalid` for a malformed quiz and
    /// `GatewayError::Unavailable` if the state lock is poisoned.
    pub fn insert_quiz(
        &self,
        quiz: Quiz,
        key: impl IntoIterator<Item = (QuestionId, ExpectedAnswer)>,
    ) -> Result<(), GatewayError> {
        quiz.validate().map_err(learn_core::Error::from)?;
        let mut state = self.lock()?;
        state.quizzes.insert(
            quiz.id,
            QuizEntry {
                quiz,
                key: key.into_iter().collect(),
                cooldown: None,
                rewards: None,
            },
        );
        Ok(())
    }

    /// Block new attempts for `cooldown` after a failed one.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::NotFound` for unknown quizzes.
    pub fn set_cooldown(&self, quiz_id: QuizId, cooldown: Duration) -> Result<(), GatewayError> {
        let mut state = self.lock()?;
        let entry = state.quizzes.get_mut(&quiz_id).ok_or(GatewayError::NotFound)?;
        entry.cooldown = Some(cooldown);
        Ok(())
    }

    /// Rewards attached to passing outcomes of `quiz_id`.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::NotFound` for unknown quizzes.
    pub fn set_rewards(&self, quiz_id: QuizId, rewards: Rewards) -> Result<(), GatewayError> {
        let mut state = self.lock()?;
        let entry = state.quizzes.get_mut(&quiz_id).ok_or(GatewayError::NotFound)?;
        entry.rewards = Some(rewards);
        Ok(())
    }

    /// Make the next call to `op` fail with `error`. Calls queue up in order.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Unavailable` if the state lock is poisoned.
    pub fn fail_next(&self, op: Operation, error: GatewayError) -> Result<(), GatewayError> {
        let mut state = self.lock()?;
        state.failures.entry(op).or_default().push_back(error);
        Ok(())
    }

    /// How many times `op` was invoked, failed calls included.
    #[must_use]
    pub fn calls(&self, op: Operation) -> usize {
        self.lock()
            .map(|state| state.calls.get(&op).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    #[must_use]
    pub fn progress(&self, learner: LearnerId, course: CourseId) -> Option<ProgressSnapshot> {
        self.lock()
            .ok()
            .and_then(|state| state.progress.get(&(learner, course)).cloned())
    }

    #[must_use]
    pub fn open_attempts(&self) -> usize {
        self.lock().map(|state| state.open.len()).unwrap_or(0)
    }
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    // lesson counts are far below f64 precision limits
    #[allow(clippy::cast_precision_loss)]
    let pct = part as f64 * 100.0 / whole as f64;
    pct
}

fn grade(entry: &QuizEntry, attempt_id: AttemptId, answers: &[AnswerSubmission]) -> AttemptOutcome {
    let by_question: HashMap<QuestionId, &AnswerSubmission> =
        answers.iter().map(|a| (a.question_id, a)).collect();

    let mut counts = AnswerCounts::default();
    let mut earned = 0_u32;
    let mut possible = 0_u32;
    for question in &entry.quiz.questions {
        possible = possible.saturating_add(question.points);
        match by_question.get(&question.id).filter(|a| !a.is_empty()) {
            None => counts.unanswered += 1,
            Some(answer) => {
                let correct = entry
                    .key
                    .get(&question.id)
                    .is_some_and(|expected| expected.matches(answer));
                if correct {
                    counts.correct += 1;
                    earned = earned.saturating_add(question.points);
                } else {
                    counts.incorrect += 1;
                }
            }
        }
    }

    let score = if possible == 0 {
        0.0
    } else {
        f64::from(earned) * 100.0 / f64::from(possible)
    };
    let passed = score >= f64::from(entry.quiz.settings.passing_score);

    AttemptOutcome {
        attempt_id,
        score,
        points_earned: earned,
        points_possible: possible,
        passed,
        counts,
        rewards: if passed { entry.rewards.clone() } else { None },
        can_retry: false,
        attempts_remaining: None,
    }
}

#[async_trait]
impl ProgressGateway for InMemoryBackend {
    async fn get_course(
        &self,
        _learner: &LearnerContext,
        course_id: CourseId,
    ) -> Result<Course, GatewayError> {
        let mut state = self.lock()?;
        state.enter(Operation::GetCourse)?;
        state
            .courses
            .get(&course_id)
            .cloned()
            .ok_or(GatewayError::NotFound)
    }

    async fn get_course_progress(
        &self,
        learner: &LearnerContext,
        course_id: CourseId,
    ) -> Result<Option<ProgressSnapshot>, GatewayError> {
        let mut state = self.lock()?;
        state.enter(Operation::GetProgress)?;
        if !state.courses.contains_key(&course_id) {
            return Err(GatewayError::NotFound);
        }
        Ok(state
            .progress
            .get(&(learner.learner_id(), course_id))
            .cloned())
    }

    async fn enroll(
        &self,
        learner: &LearnerContext,
        course_id: CourseId,
    ) -> Result<ProgressSnapshot, GatewayError> {
        let mut guard = self.lock()?;
        guard.enter(Operation::Enroll)?;
        let state = &mut *guard;
        let course = state.courses.get(&course_id).ok_or(GatewayError::NotFound)?;
        let snapshot = state
            .progress
            .entry((learner.learner_id(), course_id))
            .or_insert_with(|| {
                course.themes.iter().fold(
                    ProgressSnapshot::new(course_id, learner.learner_id()),
                    |snapshot, theme| {
                        snapshot.with_theme(ThemeProgress::new(
                            theme.id,
                            ProgressStatus::NotStarted,
                            0.0,
                        ))
                    },
                )
            });
        Ok(snapshot.clone())
    }

    async fn complete_lesson(
        &self,
        learner: &LearnerContext,
        lesson_id: LessonId,
        completed_blocks: &[u32],
    ) -> Result<LessonCompletion, GatewayError> {
        let now = self.clock.now();
        let mut guard = self.lock()?;
        guard.enter(Operation::CompleteLesson)?;
        let state = &mut *guard;

        let (course, theme) = state
            .courses
            .values()
            .find_map(|course| course.lesson(lesson_id).map(|(theme, _)| (course, theme)))
            .ok_or(GatewayError::NotFound)?;
        let snapshot = state
            .progress
            .get_mut(&(learner.learner_id(), course.id))
            .ok_or_else(|| GatewayError::Rejected("not enrolled in this course".into()))?;
        debug!(%lesson_id, blocks = completed_blocks.len(), "completing lesson");

        if snapshot.theme(theme.id).is_none() {
            snapshot
                .themes
                .push(ThemeProgress::new(theme.id, ProgressStatus::NotStarted, 0.0));
        }
        let record = snapshot
            .theme_mut(theme.id)
            .ok_or(GatewayError::NotFound)?;
        match record.lessons.iter_mut().find(|l| l.lesson_id == lesson_id) {
            Some(lesson) if lesson.status == ProgressStatus::Completed => {}
            Some(lesson) => *lesson = LessonProgress::completed(lesson_id, now),
            None => record
                .lessons
                .push(LessonProgress::completed(lesson_id, now)),
        }

        let done_in_theme = theme
            .lessons
            .iter()
            .filter(|l| record.lesson_status(l.id) == ProgressStatus::Completed)
            .count();
        record.progress_percentage = percentage(done_in_theme, theme.lessons.len());
        record.status = if done_in_theme == theme.lessons.len() {
            ProgressStatus::Completed
        } else {
            ProgressStatus::InProgress
        };
        let theme_percentage = record.progress_percentage;

        let done_in_course = course
            .themes
            .iter()
            .flat_map(|t| t.lessons.iter().map(move |l| (t.id, l.id)))
            .filter(|(theme_id, id)| {
                snapshot
                    .theme(*theme_id)
                    .is_some_and(|p| p.lesson_status(*id) == ProgressStatus::Completed)
            })
            .count();
        snapshot.progress_percentage = percentage(done_in_course, course.lesson_count());

        Ok(LessonCompletion {
            lesson_id,
            theme_id: theme.id,
            theme_progress_percentage: theme_percentage,
            course_progress_percentage: snapshot.progress_percentage,
            rewards: None,
        })
    }
}

#[async_trait]
impl QuizGateway for InMemoryBackend {
    async fn can_start_attempt(
        &self,
        learner: &LearnerContext,
        quiz_id: QuizId,
    ) -> Result<Eligibility, GatewayError> {
        let now = self.clock.now();
        let mut state = self.lock()?;
        state.enter(Operation::CanStart)?;
        state.eligibility(learner.learner_id(), quiz_id, now)
    }

    async fn get_quiz_for_learner(
        &self,
        _learner: &LearnerContext,
        quiz_id: QuizId,
    ) -> Result<Quiz, GatewayError> {
        let mut state = self.lock()?;
        state.enter(Operation::GetQuiz)?;
        state
            .quizzes
            .get(&quiz_id)
            .map(|entry| entry.quiz.clone())
            .ok_or(GatewayError::NotFound)
    }

    async fn start_attempt(
        &self,
        learner: &LearnerContext,
        quiz_id: QuizId,
    ) -> Result<AttemptTicket, GatewayError> {
        let now = self.clock.now();
        let mut state = self.lock()?;
        state.enter(Operation::StartAttempt)?;

        let eligibility = state.eligibility(learner.learner_id(), quiz_id, now)?;
        if !eligibility.can_start {
            return Err(GatewayError::Rejected(eligibility.describe()));
        }
        let settings = state
            .quizzes
            .get(&quiz_id)
            .map(|entry| entry.quiz.settings.clone())
            .ok_or(GatewayError::NotFound)?;
        let mut order = state
            .quizzes
            .get(&quiz_id)
            .map(|entry| entry.quiz.question_ids())
            .unwrap_or_default();
        if settings.shuffle_questions {
            order.shuffle(&mut rand::rng());
        }

        state.next_attempt += 1;
        let attempt_id = AttemptId::new(state.next_attempt);
        state.open.insert(
            attempt_id,
            OpenAttempt {
                learner: learner.learner_id(),
                quiz_id,
            },
        );

        Ok(AttemptTicket {
            attempt_id,
            question_order: Some(order),
            started_at: now,
            expires_at: settings
                .time_limit_minutes
                .map(|minutes| now + Duration::minutes(i64::from(minutes))),
            time_limit_minutes: settings.time_limit_minutes,
        })
    }

    async fn submit_attempt(
        &self,
        learner: &LearnerContext,
        attempt_id: AttemptId,
        answers: &[AnswerSubmission],
    ) -> Result<AttemptOutcome, GatewayError> {
        let now = self.clock.now();
        let mut guard = self.lock()?;
        guard.enter(Operation::SubmitAttempt)?;
        let state = &mut *guard;

        let quiz_id = match state.open.get(&attempt_id) {
            Some(open) if open.learner == learner.learner_id() => open.quiz_id,
            _ => return Err(GatewayError::NotFound),
        };
        let entry = state.quizzes.get(&quiz_id).ok_or(GatewayError::NotFound)?;
        let mut outcome = grade(entry, attempt_id, answers);
        let max_attempts = entry.quiz.settings.max_attempts;

        state.open.remove(&attempt_id);
        let history = state
            .history
            .entry((learner.learner_id(), quiz_id))
            .or_default();
        history.push(FinishedAttempt {
            finished_at: now,
            passed: outcome.passed,
        });
        let used = u32::try_from(history.len()).unwrap_or(u32::MAX);
        outcome.attempts_remaining = max_attempts.map(|max| max.saturating_sub(used));
        outcome.can_retry = !outcome.passed && outcome.attempts_remaining != Some(0);
        debug!(%attempt_id, score = outcome.score, passed = outcome.passed, "graded attempt");
        Ok(outcome)
    }

    async fn abandon_attempt(
        &self,
        learner: &LearnerContext,
        attempt_id: AttemptId,
    ) -> Result<(), GatewayError> {
        let now = self.clock.now();
        let mut state = self.lock()?;
        state.enter(Operation::AbandonAttempt)?;
        let quiz_id = match state.open.get(&attempt_id) {
            Some(open) if open.learner == learner.learner_id() => open.quiz_id,
            _ => return Err(GatewayError::NotFound),
        };
        state.open.remove(&attempt_id);
        state
            .history
            .entry((learner.learner_id(), quiz_id))
            .or_default()
            .push(FinishedAttempt {
                finished_at: now,
                passed: false,
            });
        Ok(())
    }
}
