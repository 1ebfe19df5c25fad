use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

use crate::model::ids::{OptionId, QuestionId, QuizId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuizError {
    #[error("quiz has no questions")]
    NoQuestions,

    #[error("question id {0} appears more than once")]
    DuplicateQuestion(QuestionId),

    #[error("question {0} needs at least one option")]
    MissingOptions(QuestionId),

    #[error("true/false question {question} must have exactly two options, found {found}")]
    TrueFalseArity { question: QuestionId, found: usize },

    #[error("option id {option} appears more than once in question {question}")]
    DuplicateOption {
        question: QuestionId,
        option: OptionId,
    },

    #[error("time limit must be at least one minute")]
    ZeroTimeLimit,

    #[error("passing score must be within 0..=100, got {0}")]
    InvalidPassingScore(u8),
}

//
// ─── QUESTIONS ─────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionType {
    SingleChoice,
    MultipleChoice,
    TrueFalse,
    FreeText,
}

impl QuestionType {
    /// Types answered by picking options rather than typing.
    #[must_use]
    pub fn is_choice(self) -> bool {
        match self {
            QuestionType::SingleChoice | QuestionType::MultipleChoice | QuestionType::TrueFalse => {
                true
            }
            QuestionType::FreeText => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionOption {
    pub id: OptionId,
    pub label: String,
}

impl QuestionOption {
    #[must_use]
    pub fn new(id: OptionId, label: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
        }
    }
}

fn default_points() -> u32 {
    1
}

/// A question as delivered to learners. Correct answers are never part of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: QuestionId,
    #[serde(rename = "type")]
    pub kind: QuestionType,
    pub prompt: String,
    #[serde(default)]
    pub options: Vec<QuestionOption>,
    #[serde(default = "default_points")]
    pub points: u32,
    #[serde(default)]
    pub required: bool,
}

impl Question {
    #[must_use]
    pub fn new(id: QuestionId, kind: QuestionType, prompt: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            prompt: prompt.into(),
            options: Vec::new(),
            points: default_points(),
            required: false,
        }
    }

    #[must_use]
    pub fn with_option(mut self, id: OptionId, label: impl Into<String>) -> Self {
        self.options.push(QuestionOption::new(id, label));
        self
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub fn with_points(mut self, points: u32) -> Self {
        self.points = points;
        self
    }

    #[must_use]
    pub fn has_option(&self, id: OptionId) -> bool {
        self.options.iter().any(|option| option.id == id)
    }

    fn validate(&self) -> Result<(), QuizError> {
        match self.kind {
            QuestionType::FreeText => {}
            QuestionType::TrueFalse if self.options.len() != 2 => {
                return Err(QuizError::TrueFalseArity {
                    question: self.id,
                    found: self.options.len(),
                });
            }
            QuestionType::SingleChoice | QuestionType::MultipleChoice | QuestionType::TrueFalse => {
                if self.options.is_empty() {
                    return Err(QuizError::MissingOptions(self.id));
                }
            }
        }
        let mut seen = HashSet::with_capacity(self.options.len());
        for option in &self.options {
            if !seen.insert(option.id) {
                return Err(QuizError::DuplicateOption {
                    question: self.id,
                    option: option.id,
                });
            }
        }
        Ok(())
    }
}

//
// ─── SETTINGS ──────────────────────────────────────────────────────────────────
//

/// Attempt rules for a quiz.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
#[allow(clippy::struct_excessive_bools)]
pub struct QuizSettings {
    /// `None` means untimed.
    pub time_limit_minutes: Option<u32>,
    pub passing_score: u8,
    pub max_attempts: Option<u32>,
    pub allow_back_navigation: bool,
    pub allow_skip: bool,
    pub shuffle_questions: bool,
    pub shuffle_options: bool,
}

impl Default for QuizSettings {
    fn default() -> Self {
        Self {
            time_limit_minutes: None,
            passing_score: 70,
            max_attempts: None,
            allow_back_navigation: true,
            allow_skip: true,
            shuffle_questions: false,
            shuffle_options: false,
        }
    }
}

impl QuizSettings {
    /// Countdown length in seconds, if the quiz is timed.
    #[must_use]
    pub fn time_limit_secs(&self) -> Option<u32> {
        self.time_limit_minutes
            .map(|minutes| minutes.saturating_mul(60))
    }
}

//
// ─── QUIZ ──────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
    pub id: QuizId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub questions: Vec<Question>,
    #[serde(default)]
    pub settings: QuizSettings,
}

impl Quiz {
    /// Build a quiz and check its structural invariants.
    ///
    /// # Errors
    ///
    /// Returns `QuizError` describing the first invalid question or setting.
    pub fn new(
        id: QuizId,
        title: impl Into<String>,
        questions: Vec<Question>,
        settings: QuizSettings,
    ) -> Result<Self, QuizError> {
        let quiz = Self {
            id,
            title: title.into(),
            description: None,
            questions,
            settings,
        };
        quiz.validate()?;
        Ok(quiz)
    }

    /// # Errors
    ///
    /// Returns `QuizError` describing the first invalid question or setting.
    pub fn validate(&self) -> Result<(), QuizError> {
        if self.questions.is_empty() {
            return Err(QuizError::NoQuestions);
        }
        if self.settings.time_limit_minutes == Some(0) {
            return Err(QuizError::ZeroTimeLimit);
        }
        if self.settings.passing_score > 100 {
            return Err(QuizError::InvalidPassingScore(self.settings.passing_score));
        }
        let mut seen = HashSet::with_capacity(self.questions.len());
        for question in &self.questions {
            if !seen.insert(question.id) {
                return Err(QuizError::DuplicateQuestion(question.id));
            }
            question.validate()?;
        }
        Ok(())
    }

    #[must_use]
    pub fn question(&self, id: QuestionId) -> Option<&Question> {
        self.questions.iter().find(|question| question.id == id)
    }

    /// Question ids in declared order.
    #[must_use]
    pub fn question_ids(&self) -> Vec<QuestionId> {
        self.questions.iter().map(|question| question.id).collect()
    }

    #[must_use]
    pub fn total_points(&self) -> u32 {
        self.questions.iter().map(|q| q.points).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yes_no(id: u64) -> Question {
        Question::new(QuestionId::new(id), QuestionType::TrueFalse, "?")
            .with_option(OptionId::new(1), "true")
            .with_option(OptionId::new(2), "false")
    }

    #[test]
    fn true_false_needs_two_options() {
        let question = Question::new(QuestionId::new(1), QuestionType::TrueFalse, "?")
            .with_option(OptionId::new(1), "true");
        let err = Quiz::new(QuizId::new(1), "q", vec![question], QuizSettings::default())
            .unwrap_err();
        assert_eq!(
            err,
            QuizError::TrueFalseArity {
                question: QuestionId::new(1),
                found: 1
            }
        );
    }

    #[test]
    fn free_text_needs_no_options() {
        let question = Question::new(QuestionId::new(1), QuestionType::FreeText, "Explain");
        assert!(Quiz::new(QuizId::new(1), "q", vec![question], QuizSettings::default()).is_ok());
    }

    #[test]
    fn rejects_zero_minute_limit() {
        let settings = QuizSettings {
            time_limit_minutes: Some(0),
            ..QuizSettings::default()
        };
        let err = Quiz::new(QuizId::new(1), "q", vec![yes_no(1)], settings).unwrap_err();
        assert_eq!(err, QuizError::ZeroTimeLimit);
    }

    #[test]
    fn rejects_duplicate_questions() {
        let err = Quiz::new(
            QuizId::new(1),
            "q",
            vec![yes_no(1), yes_no(1)],
            QuizSettings::default(),
        )
        .unwrap_err();
        assert_eq!(err, QuizError::DuplicateQuestion(QuestionId::new(1)));
    }

    #[test]
    fn question_type_uses_kebab_case_on_the_wire() {
        let json = serde_json::to_string(&yes_no(3)).unwrap();
        assert!(json.contains("\"type\":\"true-false\""));
    }

    #[test]
    fn time_limit_converts_to_seconds() {
        let settings = QuizSettings {
            time_limit_minutes: Some(2),
            ..QuizSettings::default()
        };
        assert_eq!(settings.time_limit_secs(), Some(120));
        assert_eq!(QuizSettings::default().time_limit_secs(), None);
    }
}
