use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

use crate::model::ids::{AttemptId, OptionId, QuestionId, QuizId};
use crate::model::quiz::Quiz;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AttemptError {
    #[error("question order does not match the quiz questions")]
    OrderMismatch,

    #[error("option order for question {0} does not match its options")]
    OptionOrderMismatch(QuestionId),

    #[error("expiry is before the attempt start")]
    InvalidExpiry,
}

/// One attempt at a quiz, from start until a terminal submission or abandonment.
///
/// The question order (and per-question option order) is fixed at construction
/// and never changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    id: AttemptId,
    quiz_id: QuizId,
    question_order: Vec<QuestionId>,
    option_order: BTreeMap<QuestionId, Vec<OptionId>>,
    started_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
}

impl Attempt {
    /// Create an attempt whose question order is a permutation of `quiz`'s questions.
    ///
    /// `option_order` may leave questions out; those keep the declared option order.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::OrderMismatch` if the order is not a permutation,
    /// `AttemptError::OptionOrderMismatch` if an option order is not a permutation
    /// of that question's options, and `AttemptError::InvalidExpiry` if the expiry
    /// precedes the start.
    pub fn new(
        id: AttemptId,
        quiz: &Quiz,
        question_order: Vec<QuestionId>,
        option_order: BTreeMap<QuestionId, Vec<OptionId>>,
        started_at: DateTime<Utc>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<Self, AttemptError> {
        if !is_permutation(&question_order, &quiz.question_ids()) {
            return Err(AttemptError::OrderMismatch);
        }
        for (question_id, order) in &option_order {
            let Some(question) = quiz.question(*question_id) else {
                return Err(AttemptError::OptionOrderMismatch(*question_id));
            };
            let declared: Vec<OptionId> = question.options.iter().map(|o| o.id).collect();
            if !is_permutation(order, &declared) {
                return Err(AttemptError::OptionOrderMismatch(*question_id));
            }
        }
        if expires_at.is_some_and(|at| at < started_at) {
            return Err(AttemptError::InvalidExpiry);
        }

        Ok(Self {
            id,
            quiz_id: quiz.id,
            question_order,
            option_order,
            started_at,
            expires_at,
        })
    }

    #[must_use]
    pub fn id(&self) -> AttemptId {
        self.id
    }

    #[must_use]
    pub fn quiz_id(&self) -> QuizId {
        self.quiz_id
    }

    #[must_use]
    pub fn question_order(&self) -> &[QuestionId] {
        &self.question_order
    }

    #[must_use]
    pub fn question_at(&self, index: usize) -> Option<QuestionId> {
        self.question_order.get(index).copied()
    }

    #[must_use]
    pub fn question_count(&self) -> usize {
        self.question_order.len()
    }

    /// Display order of options for a question, if it was shuffled.
    #[must_use]
    pub fn option_order(&self, question: QuestionId) -> Option<&[OptionId]> {
        self.option_order.get(&question).map(Vec::as_slice)
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }
}

fn is_permutation<T: Copy + Eq + std::hash::Hash>(candidate: &[T], reference: &[T]) -> bool {
    if candidate.len() != reference.len() {
        return false;
    }
    let expected: HashSet<T> = reference.iter().copied().collect();
    let mut seen = HashSet::with_capacity(candidate.len());
    candidate
        .iter()
        .all(|item| expected.contains(item) && seen.insert(*item))
}
