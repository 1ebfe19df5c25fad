use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use learn_core::model::{AttemptId, LessonId, QuestionId, Rewards, ThemeId};

/// Answer to "may this learner start the quiz now?".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Eligibility {
    pub can_start: bool,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub attempts_used: u32,
    #[serde(default)]
    pub attempts_remaining: Option<u32>,
    #[serde(default)]
    pub cooldown_ends_at: Option<DateTime<Utc>>,
}

impl Eligibility {
    #[must_use]
    pub fn allowed(attempts_used: u32, attempts_remaining: Option<u32>) -> Self {
        Self {
            can_start: true,
            reason: None,
            attempts_used,
            attempts_remaining,
            cooldown_ends_at: None,
        }
    }

    /// Learner-facing explanation for a refusal.
    #[must_use]
    pub fn describe(&self) -> String {
        if let Some(reason) = self.reason.as_deref().filter(|r| !r.trim().is_empty()) {
            return reason.to_string();
        }
        if let Some(until) = self.cooldown_ends_at {
            return format!("you can try again after {}", until.format("%Y-%m-%d %H:%M UTC"));
        }
        if self.attempts_remaining == Some(0) {
            return "no attempts left for this quiz".to_string();
        }
        "this quiz cannot be started right now".to_string()
    }
}

/// A freshly created attempt as granted by the quiz service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptTicket {
    pub attempt_id: AttemptId,
    /// `None` lets the client derive the order from the quiz settings.
    #[serde(default)]
    pub question_order: Option<Vec<QuestionId>>,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub time_limit_minutes: Option<u32>,
}

/// Result of marking a lesson complete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonCompletion {
    pub lesson_id: LessonId,
    pub theme_id: ThemeId,
    pub theme_progress_percentage: f64,
    pub course_progress_percentage: f64,
    #[serde(default)]
    pub rewards: Option<Rewards>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_prefers_service_reason() {
        let eligibility = Eligibility {
            can_start: false,
            reason: Some("upgrade your plan".into()),
            attempts_used: 1,
            attempts_remaining: Some(0),
            cooldown_ends_at: None,
        };
        assert_eq!(eligibility.describe(), "upgrade your plan");
    }

    #[test]
    fn describe_falls_back_to_attempts() {
        let eligibility = Eligibility {
            can_start: false,
            reason: None,
            attempts_used: 3,
            attempts_remaining: Some(0),
            cooldown_ends_at: None,
        };
        assert_eq!(eligibility.describe(), "no attempts left for this quiz");
    }

    #[test]
    fn ticket_order_is_optional_on_the_wire() {
        let json = r#"{"attemptId":9,"startedAt":"2023-11-14T22:13:20Z"}"#;
        let ticket: AttemptTicket = serde_json::from_str(json).unwrap();
        assert_eq!(ticket.attempt_id, AttemptId::new(9));
        assert!(ticket.question_order.is_none());
        assert!(ticket.time_limit_minutes.is_none());
    }
}
