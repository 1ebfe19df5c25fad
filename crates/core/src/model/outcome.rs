use serde::{Deserialize, Serialize};

use crate::model::ids::AttemptId;

/// Correct / incorrect / unanswered tallies for a graded attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerCounts {
    pub correct: u32,
    pub incorrect: u32,
    pub unanswered: u32,
}

impl AnswerCounts {
    #[must_use]
    pub fn total(&self) -> u32 {
        self.correct + self.incorrect + self.unanswered
    }
}

/// Reward metadata computed by the backend; displayed, never derived here.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Rewards {
    pub xp: u32,
    pub coins: u32,
    pub badges: Vec<String>,
}

/// Graded result of a submitted attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptOutcome {
    pub attempt_id: AttemptId,
    /// 0..=100
    pub score: f64,
    pub points_earned: u32,
    pub points_possible: u32,
    pub passed: bool,
    #[serde(default)]
    pub counts: AnswerCounts,
    #[serde(default)]
    pub rewards: Option<Rewards>,
    #[serde(default)]
    pub can_retry: bool,
    #[serde(default)]
    pub attempts_remaining: Option<u32>,
}

impl AttemptOutcome {
    /// Whether the learner may go again: the service allows it and attempts remain.
    #[must_use]
    pub fn retry_available(&self) -> bool {
        self.can_retry && self.attempts_remaining != Some(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(can_retry: bool, attempts_remaining: Option<u32>) -> AttemptOutcome {
        AttemptOutcome {
            attempt_id: AttemptId::new(1),
            score: 40.0,
            points_earned: 2,
            points_possible: 5,
            passed: false,
            counts: AnswerCounts {
                correct: 2,
                incorrect: 2,
                unanswered: 1,
            },
            rewards: None,
            can_retry,
            attempts_remaining,
        }
    }

    #[test]
    fn retry_needs_permission_and_attempts() {
        assert!(outcome(true, None).retry_available());
        assert!(outcome(true, Some(2)).retry_available());
        assert!(!outcome(true, Some(0)).retry_available());
        assert!(!outcome(false, Some(3)).retry_available());
    }

    #[test]
    fn counts_total() {
        assert_eq!(outcome(false, None).counts.total(), 5);
    }
}
