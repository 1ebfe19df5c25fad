use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

use crate::model::ids::{CourseId, LessonId, QuizId, ThemeId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CourseError {
    #[error("unlock threshold for theme {theme} must be within 0..=100, got {threshold}")]
    InvalidThreshold { theme: ThemeId, threshold: u8 },

    #[error("theme id {0} appears more than once")]
    DuplicateTheme(ThemeId),

    #[error("lesson id {0} appears more than once")]
    DuplicateLesson(LessonId),
}

//
// ─── STRUCTURE ─────────────────────────────────────────────────────────────────
//

/// Threshold used when the service omits one: the previous theme must be fully done.
pub const DEFAULT_UNLOCK_THRESHOLD: u8 = 100;

fn default_unlock_threshold() -> u8 {
    DEFAULT_UNLOCK_THRESHOLD
}

/// A single unit of content inside a theme, optionally followed by a quiz.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    pub id: LessonId,
    pub title: String,
    #[serde(default)]
    pub requires_previous_completion: bool,
    #[serde(default)]
    pub quiz_id: Option<QuizId>,
}

impl Lesson {
    #[must_use]
    pub fn new(id: LessonId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            requires_previous_completion: false,
            quiz_id: None,
        }
    }

    #[must_use]
    pub fn gated(mut self) -> Self {
        self.requires_previous_completion = true;
        self
    }

    #[must_use]
    pub fn with_quiz(mut self, quiz_id: QuizId) -> Self {
        self.quiz_id = Some(quiz_id);
        self
    }
}

/// Ordered group of lessons, gated as a whole by the previous theme's progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Theme {
    pub id: ThemeId,
    pub title: String,
    #[serde(default)]
    pub requires_previous_completion: bool,
    #[serde(default = "default_unlock_threshold")]
    pub unlock_threshold: u8,
    #[serde(default)]
    pub lessons: Vec<Lesson>,
}

impl Theme {
    #[must_use]
    pub fn new(id: ThemeId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            requires_previous_completion: false,
            unlock_threshold: DEFAULT_UNLOCK_THRESHOLD,
            lessons: Vec::new(),
        }
    }

    /// Require the previous theme to reach `threshold` percent before this one opens.
    #[must_use]
    pub fn gated(mut self, threshold: u8) -> Self {
        self.requires_previous_completion = true;
        self.unlock_threshold = threshold;
        self
    }

    #[must_use]
    pub fn with_lesson(mut self, lesson: Lesson) -> Self {
        self.lessons.push(lesson);
        self
    }
}

/// Static course structure as published by the backend. Read-only to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: CourseId,
    pub title: String,
    #[serde(default)]
    pub themes: Vec<Theme>,
}

impl Course {
    /// Build a course and check its structural invariants.
    ///
    /// # Errors
    ///
    /// Returns `CourseError` if a threshold is out of range or an id repeats.
    pub fn new(
        id: CourseId,
        title: impl Into<String>,
        themes: Vec<Theme>,
    ) -> Result<Self, CourseError> {
        let course = Self {
            id,
            title: title.into(),
            themes,
        };
        course.validate()?;
        Ok(course)
    }

    /// Check id uniqueness and threshold ranges.
    ///
    /// The resolver assumes these hold; gateways call this on everything they hand out.
    ///
    /// # Errors
    ///
    /// Returns the first violation found, in declaration order.
    pub fn validate(&self) -> Result<(), CourseError> {
        let mut themes = HashSet::with_capacity(self.themes.len());
        let mut lessons = HashSet::new();
        for theme in &self.themes {
            if !themes.insert(theme.id) {
                return Err(CourseError::DuplicateTheme(theme.id));
            }
            if theme.unlock_threshold > 100 {
                return Err(CourseError::InvalidThreshold {
                    theme: theme.id,
                    threshold: theme.unlock_threshold,
                });
            }
            for lesson in &theme.lessons {
                if !lessons.insert(lesson.id) {
                    return Err(CourseError::DuplicateLesson(lesson.id));
                }
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn theme(&self, id: ThemeId) -> Option<&Theme> {
        self.themes.iter().find(|theme| theme.id == id)
    }

    /// Find a lesson and the theme that owns it.
    #[must_use]
    pub fn lesson(&self, id: LessonId) -> Option<(&Theme, &Lesson)> {
        self.themes.iter().find_map(|theme| {
            theme
                .lessons
                .iter()
                .find(|lesson| lesson.id == id)
                .map(|lesson| (theme, lesson))
        })
    }

    #[must_use]
    pub fn lesson_count(&self) -> usize {
        self.themes.iter().map(|theme| theme.lessons.len()).sum()
    }
}
