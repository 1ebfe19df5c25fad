use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;

use crate::model::ids::{OptionId, QuestionId};
use crate::model::quiz::{Question, QuestionType};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AnswerError {
    #[error("option {option} does not belong to question {question}")]
    UnknownOption {
        question: QuestionId,
        option: OptionId,
    },
}

/// What the learner has entered for one question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Choice(BTreeSet<OptionId>),
    Text(String),
}

impl Response {
    /// True when the response carries something gradable.
    #[must_use]
    pub fn is_answered(&self) -> bool {
        match self {
            Response::Choice(selected) => !selected.is_empty(),
            Response::Text(text) => !text.trim().is_empty(),
        }
    }
}

/// Per-question record sent to the quiz service on submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerSubmission {
    pub question_id: QuestionId,
    #[serde(default)]
    pub selected_option_ids: Vec<OptionId>,
    #[serde(default)]
    pub text_answer: Option<String>,
    pub time_spent_seconds: u32,
}

impl AnswerSubmission {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.selected_option_ids.is_empty()
            && self
                .text_answer
                .as_deref()
                .is_none_or(|text| text.trim().is_empty())
    }
}

/// Answers captured during an attempt plus the time spent on each question.
///
/// Time is accumulated from clock deltas while a question is current. Totals
/// only ever grow: revisiting a question adds to what it already had.
#[derive(Debug, Clone, Default)]
pub struct AnswerSheet {
    responses: HashMap<QuestionId, Response>,
    time_spent: HashMap<QuestionId, Duration>,
    anchor: Option<(QuestionId, DateTime<Utc>)>,
}

impl AnswerSheet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an option click.
    ///
    /// Single-choice and true/false replace the selection; multiple-choice toggles
    /// membership. Free-text questions ignore the call.
    ///
    /// Returns whether the stored response changed.
    ///
    /// # Errors
    ///
    /// Returns `AnswerError::UnknownOption` if `option` is not one of the question's options.
    pub fn select_option(
        &mut self,
        question: &Question,
        option: OptionId,
    ) -> Result<bool, AnswerError> {
        match question.kind {
            QuestionType::FreeText => return Ok(false),
            QuestionType::SingleChoice | QuestionType::TrueFalse | QuestionType::MultipleChoice => {}
        }
        if !question.has_option(option) {
            return Err(AnswerError::UnknownOption {
                question: question.id,
                option,
            });
        }

        match question.kind {
            QuestionType::SingleChoice | QuestionType::TrueFalse => {
                let next = Response::Choice(BTreeSet::from([option]));
                let previous = self.responses.insert(question.id, next.clone());
                Ok(previous.as_ref() != Some(&next))
            }
            QuestionType::MultipleChoice => {
                let mut selected = match self.responses.remove(&question.id) {
                    Some(Response::Choice(selected)) => selected,
                    _ => BTreeSet::new(),
                };
                if !selected.remove(&option) {
                    selected.insert(option);
                }
                // an emptied set is the same as never having answered
                if !selected.is_empty() {
                    self.responses
                        .insert(question.id, Response::Choice(selected));
                }
                Ok(true)
            }
            QuestionType::FreeText => Ok(false),
        }
    }

    /// Store the text for a free-text question. Other types ignore the call.
    pub fn set_text(&mut self, question: &Question, text: impl Into<String>) -> bool {
        match question.kind {
            QuestionType::FreeText => {
                self.responses
                    .insert(question.id, Response::Text(text.into()));
                true
            }
            QuestionType::SingleChoice | QuestionType::MultipleChoice | QuestionType::TrueFalse => {
                false
            }
        }
    }

    #[must_use]
    pub fn response(&self, question: QuestionId) -> Option<&Response> {
        self.responses.get(&question)
    }

    #[must_use]
    pub fn is_answered(&self, question: QuestionId) -> bool {
        self.responses
            .get(&question)
            .is_some_and(Response::is_answered)
    }

    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.responses.values().filter(|r| r.is_answered()).count()
    }

    /// Make `question` current: close the running segment and start a new one at `now`.
    pub fn focus(&mut self, question: QuestionId, now: DateTime<Utc>) {
        self.flush(now);
        self.anchor = Some((question, now));
    }

    /// Fold the running segment into the current question's total.
    ///
    /// A clock that moved backwards contributes nothing.
    pub fn flush(&mut self, now: DateTime<Utc>) {
        if let Some((question, since)) = self.anchor {
            let delta = (now - since).max(Duration::zero());
            *self.time_spent.entry(question).or_insert_with(Duration::zero) += delta;
            self.anchor = Some((question, now.max(since)));
        }
    }

    /// Total time spent on `question`, including the running segment.
    #[must_use]
    pub fn time_spent(&self, question: QuestionId, now: DateTime<Utc>) -> Duration {
        let stored = self
            .time_spent
            .get(&question)
            .copied()
            .unwrap_or_else(Duration::zero);
        match self.anchor {
            Some((current, since)) if current == question => {
                stored + (now - since).max(Duration::zero())
            }
            _ => stored,
        }
    }

    /// Build one submission record per question in `order`, answered or not.
    #[must_use]
    pub fn submissions(&self, order: &[QuestionId], now: DateTime<Utc>) -> Vec<AnswerSubmission> {
        order
            .iter()
            .map(|&question_id| {
                let (selected_option_ids, text_answer) = match self.responses.get(&question_id) {
                    Some(Response::Choice(selected)) => (selected.iter().copied().collect(), None),
                    Some(Response::Text(text)) => (Vec::new(), Some(text.clone())),
                    None => (Vec::new(), None),
                };
                let seconds = self.time_spent(question_id, now).num_seconds();
                AnswerSubmission {
                    question_id,
                    selected_option_ids,
                    text_answer,
                    time_spent_seconds: u32::try_from(seconds).unwrap_or(u32::MAX),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn multi() -> Question {
        Question::new(QuestionId::new(1), QuestionType::MultipleChoice, "pick")
            .with_option(OptionId::new(1), "A")
            .with_option(OptionId::new(2), "B")
            .with_option(OptionId::new(3), "C")
    }

    fn single() -> Question {
        Question::new(QuestionId::new(2), QuestionType::SingleChoice, "one")
            .with_option(OptionId::new(1), "A")
            .with_option(OptionId::new(2), "B")
    }

    #[test]
    fn multiple_choice_deselect_keeps_the_rest() {
        let question = multi();
        let mut sheet = AnswerSheet::new();
        sheet.select_option(&question, OptionId::new(1)).unwrap();
        sheet.select_option(&question, OptionId::new(2)).unwrap();
        sheet.select_option(&question, OptionId::new(1)).unwrap();

        assert_eq!(
            sheet.response(question.id),
            Some(&Response::Choice(BTreeSet::from([OptionId::new(2)])))
        );
    }

    #[test]
    fn double_toggle_restores_prior_state() {
        let question = multi();
        let mut sheet = AnswerSheet::new();
        sheet.select_option(&question, OptionId::new(3)).unwrap();
        let before = sheet.response(question.id).cloned();

        sheet.select_option(&question, OptionId::new(2)).unwrap();
        sheet.select_option(&question, OptionId::new(2)).unwrap();
        assert_eq!(sheet.response(question.id).cloned(), before);

        let mut empty = AnswerSheet::new();
        empty.select_option(&question, OptionId::new(1)).unwrap();
        empty.select_option(&question, OptionId::new(1)).unwrap();
        assert_eq!(empty.response(question.id), None);
    }

    #[test]
    fn single_choice_replaces_selection() {
        let question = single();
        let mut sheet = AnswerSheet::new();
        assert!(sheet.select_option(&question, OptionId::new(1)).unwrap());
        assert!(sheet.select_option(&question, OptionId::new(2)).unwrap());
        assert!(!sheet.select_option(&question, OptionId::new(2)).unwrap());
        assert_eq!(
            sheet.response(question.id),
            Some(&Response::Choice(BTreeSet::from([OptionId::new(2)])))
        );
    }

    #[test]
    fn unknown_option_is_rejected() {
        let err = AnswerSheet::new()
            .select_option(&single(), OptionId::new(9))
            .unwrap_err();
        assert!(matches!(err, AnswerError::UnknownOption { .. }));
    }

    #[test]
    fn text_and_options_do_not_cross() {
        let text = Question::new(QuestionId::new(3), QuestionType::FreeText, "why");
        let mut sheet = AnswerSheet::new();
        assert!(!sheet.select_option(&text, OptionId::new(1)).unwrap());
        assert!(!sheet.set_text(&single(), "nope"));
        assert!(sheet.set_text(&text, "because"));
        assert!(sheet.is_answered(text.id));

        sheet.set_text(&text, "   ");
        assert!(!sheet.is_answered(text.id));
    }

    #[test]
    fn time_accumulates_across_visits() {
        let now = fixed_now();
        let a = QuestionId::new(1);
        let b = QuestionId::new(2);
        let mut sheet = AnswerSheet::new();

        sheet.focus(a, now);
        sheet.focus(b, now + Duration::seconds(5));
        sheet.focus(a, now + Duration::seconds(8));

        let later = now + Duration::seconds(10);
        assert_eq!(sheet.time_spent(a, later), Duration::seconds(7));
        assert_eq!(sheet.time_spent(b, later), Duration::seconds(3));
    }

    #[test]
    fn backwards_clock_adds_nothing() {
        let now = fixed_now();
        let a = QuestionId::new(1);
        let mut sheet = AnswerSheet::new();
        sheet.focus(a, now);
        sheet.flush(now - Duration::seconds(30));
        assert_eq!(sheet.time_spent(a, now), Duration::zero());
        assert_eq!(sheet.time_spent(a, now + Duration::seconds(2)), Duration::seconds(2));
    }

    #[test]
    fn submissions_cover_every_question() {
        let now = fixed_now();
        let question = single();
        let mut sheet = AnswerSheet::new();
        sheet.focus(question.id, now);
        sheet.select_option(&question, OptionId::new(1)).unwrap();

        let order = [question.id, QuestionId::new(7)];
        let records = sheet.submissions(&order, now + Duration::seconds(4));

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].selected_option_ids, vec![OptionId::new(1)]);
        assert_eq!(records[0].time_spent_seconds, 4);
        assert!(records[1].is_empty());
        assert_eq!(records[1].time_spent_seconds, 0);
    }
}
