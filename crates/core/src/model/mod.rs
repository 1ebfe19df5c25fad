mod answer;
mod attempt;
mod course;
mod ids;
mod outcome;
mod progress;
mod quiz;

pub use ids::{
    AttemptId, CourseId, LearnerId, LessonId, OptionId, ParseIdError, QuestionId, QuizId,
    ThemeId,
};

pub use answer::{AnswerError, AnswerSheet, AnswerSubmission, Response};
pub use attempt::{Attempt, AttemptError};
pub use course::{Course, CourseError, DEFAULT_UNLOCK_THRESHOLD, Lesson, Theme};
pub use outcome::{AnswerCounts, AttemptOutcome, Rewards};
pub use progress::{LessonProgress, ProgressSnapshot, ProgressStatus, ThemeProgress};
pub use quiz::{Question, QuestionOption, QuestionType, Quiz, QuizError, QuizSettings};
