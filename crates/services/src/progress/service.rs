use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info, warn};

use gateway::{LearnerContext, LessonCompletion, ProgressGateway};
use learn_core::model::{
    Course, CourseId, LessonId, LessonProgress, ProgressSnapshot, ProgressStatus, QuizId,
    ThemeProgress,
};
use learn_core::{ResolvedLesson, ResolvedView, resolve};

use crate::error::ProgressError;

/// A course together with the learner's snapshot and its resolved status.
#[derive(Debug, Clone, PartialEq)]
pub struct CourseView {
    pub course: Course,
    pub snapshot: Option<ProgressSnapshot>,
    pub resolved: ResolvedView,
}

impl CourseView {
    #[must_use]
    pub fn new(course: Course, snapshot: Option<ProgressSnapshot>) -> Self {
        let resolved = resolve(&course, snapshot.as_ref());
        Self {
            course,
            snapshot,
            resolved,
        }
    }

    #[must_use]
    pub fn is_enrolled(&self) -> bool {
        self.snapshot.is_some()
    }

    /// Course-wide completion reported by the service, zero when not enrolled.
    #[must_use]
    pub fn progress_percentage(&self) -> f64 {
        self.snapshot
            .as_ref()
            .map_or(0.0, |snapshot| snapshot.progress_percentage)
    }

    /// The lesson exposing `quiz_id`, if a learner may open that quiz now.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::QuizLocked` when no unlocked lesson exposes it.
    pub fn ensure_quiz_unlocked(&self, quiz_id: QuizId) -> Result<&ResolvedLesson, ProgressError> {
        self.resolved
            .quiz_lesson(quiz_id)
            .ok_or(ProgressError::QuizLocked(quiz_id))
    }

    /// This view with `completion` folded into its snapshot, for when the
    /// service's own copy cannot be fetched.
    #[must_use]
    pub fn with_completion(
        &self,
        completion: &LessonCompletion,
        learner: &LearnerContext,
    ) -> Self {
        let mut snapshot = self
            .snapshot
            .clone()
            .unwrap_or_else(|| ProgressSnapshot::new(self.course.id, learner.learner_id()));
        snapshot.progress_percentage = completion.course_progress_percentage;

        if snapshot.theme(completion.theme_id).is_none() {
            snapshot.themes.push(ThemeProgress::new(
                completion.theme_id,
                ProgressStatus::NotStarted,
                0.0,
            ));
        }
        if let Some(theme) = snapshot.theme_mut(completion.theme_id) {
            theme.progress_percentage = completion.theme_progress_percentage;
            theme.status = if completion.theme_progress_percentage >= 100.0 {
                ProgressStatus::Completed
            } else {
                ProgressStatus::InProgress
            };
            match theme
                .lessons
                .iter_mut()
                .find(|lesson| lesson.lesson_id == completion.lesson_id)
            {
                Some(lesson) => lesson.status = ProgressStatus::Completed,
                None => theme.lessons.push(LessonProgress {
                    lesson_id: completion.lesson_id,
                    status: ProgressStatus::Completed,
                    completed_at: None,
                }),
            }
        }

        Self::new(self.course.clone(), Some(snapshot))
    }
}

/// Loads course progress for one learner and keeps the resolver fed with the
/// newest data only.
#[derive(Clone)]
pub struct CourseProgressService {
    learner: LearnerContext,
    progress: Arc<dyn ProgressGateway>,
    generations: Arc<Mutex<HashMap<CourseId, u64>>>,
}

impl CourseProgressService {
    #[must_use]
    pub fn new(learner: LearnerContext, progress: Arc<dyn ProgressGateway>) -> Self {
        Self {
            learner,
            progress,
            generations: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    #[must_use]
    pub fn learner(&self) -> &LearnerContext {
        &self.learner
    }

    /// Fetch course structure and progress, then resolve.
    ///
    /// When a newer `load` of the same course started while this one was in
    /// flight, this one yields `ProgressError::Superseded` instead of stale data.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Gateway` for collaborator failures.
    pub async fn load(&self, course_id: CourseId) -> Result<CourseView, ProgressError> {
        let generation = self.bump(course_id);
        let course = self.progress.get_course(&self.learner, course_id).await?;
        let snapshot = self
            .progress
            .get_course_progress(&self.learner, course_id)
            .await?;

        if self.current(course_id) != generation {
            debug!(%course_id, generation, "dropping superseded course load");
            return Err(ProgressError::Superseded(course_id));
        }
        Ok(CourseView::new(course, snapshot))
    }

    /// Enroll, then load the fresh view.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Gateway` for collaborator failures.
    pub async fn enroll(&self, course_id: CourseId) -> Result<CourseView, ProgressError> {
        self.progress.enroll(&self.learner, course_id).await?;
        info!(%course_id, learner = %self.learner.learner_id(), "enrolled");
        self.load(course_id).await
    }

    /// Mark `lesson_id` complete and return the service's answer with a reloaded view.
    ///
    /// Locked or unknown lessons are refused before any call goes out. Once the
    /// service has accepted the completion it is always returned: if the reload
    /// fails or is superseded, the view is `view` patched with the completion.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::LessonLocked`, `ProgressError::UnknownLesson`,
    /// or `ProgressError::Gateway` when the completion call itself fails.
    pub async fn complete_lesson(
        &self,
        view: &CourseView,
        lesson_id: LessonId,
        completed_blocks: &[u32],
    ) -> Result<(LessonCompletion, CourseView), ProgressError> {
        match view.resolved.lesson(lesson_id) {
            Some(lesson) if lesson.locked => return Err(ProgressError::LessonLocked(lesson_id)),
            Some(_) => {}
            None if view.course.lesson(lesson_id).is_some() => {
                // the lesson sits in a locked theme
                return Err(ProgressError::LessonLocked(lesson_id));
            }
            None => return Err(ProgressError::UnknownLesson(lesson_id)),
        }

        let completion = self
            .progress
            .complete_lesson(&self.learner, lesson_id, completed_blocks)
            .await?;
        info!(
            %lesson_id,
            theme = completion.theme_progress_percentage,
            course = completion.course_progress_percentage,
            "lesson completed"
        );
        let refreshed = match self.load(view.course.id).await {
            Ok(refreshed) => refreshed,
            Err(ProgressError::Superseded(course_id)) => {
                debug!(%course_id, "reload superseded, patching the previous view");
                view.with_completion(&completion, &self.learner)
            }
            Err(err) => {
                warn!(
                    %lesson_id,
                    %err,
                    "reload after completion failed, patching the previous view"
                );
                view.with_completion(&completion, &self.learner)
            }
        };
        Ok((completion, refreshed))
    }

    fn bump(&self, course_id: CourseId) -> u64 {
        let mut generations = self
            .generations
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let generation = generations.entry(course_id).or_insert(0);
        *generation += 1;
        *generation
    }

    fn current(&self, course_id: CourseId) -> u64 {
        self.generations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&course_id)
            .copied()
            .unwrap_or(0)
    }
}
