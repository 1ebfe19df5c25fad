use rand::rng;
use rand::seq::SliceRandom;
use std::collections::BTreeMap;

use learn_core::model::{OptionId, QuestionId, Quiz};

/// Question and option order chosen once when an attempt starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptPlan {
    pub question_order: Vec<QuestionId>,
    /// Only questions whose options were shuffled appear here.
    pub option_order: BTreeMap<QuestionId, Vec<OptionId>>,
}

/// Derives the attempt order from quiz settings.
pub struct AttemptPlanner<'a> {
    quiz: &'a Quiz,
    served_order: Option<Vec<QuestionId>>,
}

impl<'a> AttemptPlanner<'a> {
    #[must_use]
    pub fn new(quiz: &'a Quiz) -> Self {
        Self {
            quiz,
            served_order: None,
        }
    }

    /// Use the order the quiz service fixed for this attempt instead of deriving one.
    #[must_use]
    pub fn with_served_order(mut self, order: Option<Vec<QuestionId>>) -> Self {
        self.served_order = order;
        self
    }

    /// Build the plan.
    ///
    /// - A served question order wins over local shuffling.
    /// - Otherwise questions keep declared order unless `shuffle_questions` is set.
    /// - With `shuffle_options`, every choice question gets its own option order.
    pub fn build(self) -> AttemptPlan {
        let settings = &self.quiz.settings;
        let mut rng = rng();

        let question_order = match self.served_order {
            Some(order) => order,
            None => {
                let mut order = self.quiz.question_ids();
                if settings.shuffle_questions {
                    order.as_mut_slice().shuffle(&mut rng);
                }
                order
            }
        };

        let mut option_order = BTreeMap::new();
        if settings.shuffle_options {
            for question in self.quiz.questions.iter().filter(|q| q.kind.is_choice()) {
                let mut options: Vec<OptionId> = question.options.iter().map(|o| o.id).collect();
                options.as_mut_slice().shuffle(&mut rng);
                option_order.insert(question.id, options);
            }
        }

        AttemptPlan {
            question_order,
            option_order,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use learn_core::model::{Question, QuestionType, QuizId, QuizSettings};
    use std::collections::BTreeSet;

    fn quiz(settings: QuizSettings) -> Quiz {
        let questions = (1..=8)
            .map(|id| {
                Question::new(QuestionId::new(id), QuestionType::SingleChoice, format!("Q{id}"))
                    .with_option(OptionId::new(id * 10 + 1), "a")
                    .with_option(OptionId::new(id * 10 + 2), "b")
                    .with_option(OptionId::new(id * 10 + 3), "c")
            })
            .chain(std::iter::once(Question::new(
                QuestionId::new(9),
                QuestionType::FreeText,
                "explain",
            )))
            .collect();
        Quiz::new(QuizId::new(1), "Quiz", questions, settings).unwrap()
    }

    #[test]
    fn keeps_declared_order_without_shuffle() {
        let quiz = quiz(QuizSettings::default());
        let plan = AttemptPlanner::new(&quiz).build();
        assert_eq!(plan.question_order, quiz.question_ids());
        assert!(plan.option_order.is_empty());
    }

    #[test]
    fn shuffled_order_is_a_permutation() {
        let quiz = quiz(QuizSettings {
            shuffle_questions: true,
            shuffle_options: true,
            ..QuizSettings::default()
        });
        let plan = AttemptPlanner::new(&quiz).build();

        let planned: BTreeSet<_> = plan.question_order.iter().copied().collect();
        let declared: BTreeSet<_> = quiz.question_ids().into_iter().collect();
        assert_eq!(plan.question_order.len(), quiz.questions.len());
        assert_eq!(planned, declared);

        // free-text questions have nothing to shuffle
        assert_eq!(plan.option_order.len(), 8);
        assert!(!plan.option_order.contains_key(&QuestionId::new(9)));
    }

    #[test]
    fn served_order_wins() {
        let quiz = quiz(QuizSettings {
            shuffle_questions: true,
            ..QuizSettings::default()
        });
        let mut served = quiz.question_ids();
        served.reverse();
        let plan = AttemptPlanner::new(&quiz)
            .with_served_order(Some(served.clone()))
            .build();
        assert_eq!(plan.question_order, served);
    }
}
