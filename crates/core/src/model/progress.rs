use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::{CourseId, LearnerId, LessonId, ThemeId};

/// Progress status as reported by the backend for themes and lessons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProgressStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonProgress {
    pub lesson_id: LessonId,
    #[serde(default)]
    pub status: ProgressStatus,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl LessonProgress {
    #[must_use]
    pub fn completed(lesson_id: LessonId, at: DateTime<Utc>) -> Self {
        Self {
            lesson_id,
            status: ProgressStatus::Completed,
            completed_at: Some(at),
        }
    }
}

/// A learner's progress through one theme.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeProgress {
    pub theme_id: ThemeId,
    #[serde(default)]
    pub status: ProgressStatus,
    /// 0..=100; may be fractional.
    #[serde(default)]
    pub progress_percentage: f64,
    #[serde(default)]
    pub lessons: Vec<LessonProgress>,
}

impl ThemeProgress {
    #[must_use]
    pub fn new(theme_id: ThemeId, status: ProgressStatus, progress_percentage: f64) -> Self {
        Self {
            theme_id,
            status,
            progress_percentage,
            lessons: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_lesson(mut self, lesson: LessonProgress) -> Self {
        self.lessons.push(lesson);
        self
    }

    #[must_use]
    pub fn lesson(&self, id: LessonId) -> Option<&LessonProgress> {
        self.lessons.iter().find(|lesson| lesson.lesson_id == id)
    }

    /// Status of a lesson; lessons without a record count as not started.
    #[must_use]
    pub fn lesson_status(&self, id: LessonId) -> ProgressStatus {
        self.lesson(id).map_or(ProgressStatus::NotStarted, |l| l.status)
    }
}

/// Per-learner, per-course progress owned by the backend. Read-only to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    pub course_id: CourseId,
    pub learner_id: LearnerId,
    #[serde(default)]
    pub progress_percentage: f64,
    #[serde(default)]
    pub themes: Vec<ThemeProgress>,
}

impl ProgressSnapshot {
    #[must_use]
    pub fn new(course_id: CourseId, learner_id: LearnerId) -> Self {
        Self {
            course_id,
            learner_id,
            progress_percentage: 0.0,
            themes: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_theme(mut self, theme: ThemeProgress) -> Self {
        self.themes.push(theme);
        self
    }

    #[must_use]
    pub fn theme(&self, id: ThemeId) -> Option<&ThemeProgress> {
        self.themes.iter().find(|theme| theme.theme_id == id)
    }

    pub fn theme_mut(&mut self, id: ThemeId) -> Option<&mut ThemeProgress> {
        self.themes.iter_mut().find(|theme| theme.theme_id == id)
    }
}
