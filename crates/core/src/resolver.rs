//! Derives theme and lesson accessibility from course structure plus a progress snapshot.
//!
//! The resolver is a single forward pass over themes in declared order. It never
//! fails and holds no state: identical inputs always give identical views.

use serde::Serialize;

use crate::model::{
    Course, LessonId, ProgressSnapshot, ProgressStatus, QuizId, Theme, ThemeId, ThemeProgress,
};

/// Learner-facing status of a theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ThemeStatus {
    Locked,
    InProgress,
    Completed,
}

impl ThemeStatus {
    #[must_use]
    pub fn is_locked(self) -> bool {
        matches!(self, ThemeStatus::Locked)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedLesson {
    pub lesson_id: LessonId,
    pub completed: bool,
    pub locked: bool,
    /// Only exposed while the lesson is unlocked.
    pub quiz_id: Option<QuizId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedTheme {
    pub theme_id: ThemeId,
    pub status: ThemeStatus,
    pub progress_percentage: f64,
    /// Empty when the theme is locked.
    pub lessons: Vec<ResolvedLesson>,
}

/// Resolved status of every theme and lesson, in course order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedView {
    pub enrolled: bool,
    pub themes: Vec<ResolvedTheme>,
}

impl ResolvedView {
    #[must_use]
    pub fn theme(&self, id: ThemeId) -> Option<&ResolvedTheme> {
        self.themes.iter().find(|theme| theme.theme_id == id)
    }

    /// Lessons of locked themes are not part of the view and return `None`.
    #[must_use]
    pub fn lesson(&self, id: LessonId) -> Option<&ResolvedLesson> {
        self.lessons().find(|lesson| lesson.lesson_id == id)
    }

    #[must_use]
    pub fn is_lesson_unlocked(&self, id: LessonId) -> bool {
        self.lesson(id).is_some_and(|lesson| !lesson.locked)
    }

    /// The unlocked lesson that exposes `quiz`, if any.
    #[must_use]
    pub fn quiz_lesson(&self, quiz: QuizId) -> Option<&ResolvedLesson> {
        self.lessons()
            .find(|lesson| !lesson.locked && lesson.quiz_id == Some(quiz))
    }

    /// First unlocked lesson that is not completed yet.
    #[must_use]
    pub fn next_lesson(&self) -> Option<&ResolvedLesson> {
        self.lessons()
            .find(|lesson| !lesson.locked && !lesson.completed)
    }

    #[must_use]
    pub fn completed_lessons(&self) -> usize {
        self.lessons().filter(|lesson| lesson.completed).count()
    }

    /// Lessons visible in the view; locked themes contribute none.
    #[must_use]
    pub fn total_lessons(&self) -> usize {
        self.lessons().count()
    }

    fn lessons(&self) -> impl Iterator<Item = &ResolvedLesson> {
        self.themes.iter().flat_map(|theme| theme.lessons.iter())
    }
}

/// Resolve `course` against the learner's snapshot.
///
/// `None` means the learner is not enrolled. Missing theme records and
/// `NotStarted` records are gated the same way.
#[must_use]
pub fn resolve(course: &Course, snapshot: Option<&ProgressSnapshot>) -> ResolvedView {
    let record = |id: ThemeId| snapshot.and_then(|s| s.theme(id));

    let themes = course
        .themes
        .iter()
        .enumerate()
        .map(|(index, theme)| {
            let progress = record(theme.id);
            let previous = index
                .checked_sub(1)
                .and_then(|prev| course.themes.get(prev))
                .and_then(|prev| record(prev.id));

            let status = match progress.map(|p| p.status) {
                Some(ProgressStatus::Completed) => ThemeStatus::Completed,
                Some(ProgressStatus::InProgress) => ThemeStatus::InProgress,
                Some(ProgressStatus::NotStarted) | None => gate(index, theme, previous),
            };

            let lessons = if status.is_locked() {
                Vec::new()
            } else {
                resolve_lessons(theme, progress)
            };

            ResolvedTheme {
                theme_id: theme.id,
                status,
                progress_percentage: progress.map_or(0.0, |p| p.progress_percentage),
                lessons,
            }
        })
        .collect();

    ResolvedView {
        enrolled: snapshot.is_some(),
        themes,
    }
}

fn gate(index: usize, theme: &Theme, previous: Option<&ThemeProgress>) -> ThemeStatus {
    if index == 0 || !theme.requires_previous_completion {
        return ThemeStatus::InProgress;
    }
    match previous {
        Some(prev) if prev.progress_percentage >= f64::from(theme.unlock_threshold) => {
            ThemeStatus::InProgress
        }
        _ => ThemeStatus::Locked,
    }
}

fn resolve_lessons(theme: &Theme, progress: Option<&ThemeProgress>) -> Vec<ResolvedLesson> {
    let status = |id: LessonId| progress.map_or(ProgressStatus::NotStarted, |p| p.lesson_status(id));

    theme
        .lessons
        .iter()
        .enumerate()
        .map(|(index, lesson)| {
            let locked = lesson.requires_previous_completion
                && index
                    .checked_sub(1)
                    .and_then(|prev| theme.lessons.get(prev))
                    .is_some_and(|prev| status(prev.id) != ProgressStatus::Completed);
            ResolvedLesson {
                lesson_id: lesson.id,
                completed: status(lesson.id) == ProgressStatus::Completed,
                locked,
                quiz_id: if locked { None } else { lesson.quiz_id },
            }
        })
        .collect()
}
