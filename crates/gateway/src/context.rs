use std::fmt;

use learn_core::model::LearnerId;

/// Who the engine acts for.
///
/// Passed explicitly to every collaborator call instead of being read from
/// ambient state. Token storage and refresh live outside this crate.
#[derive(Clone, PartialEq, Eq)]
pub struct LearnerContext {
    learner_id: LearnerId,
    access_token: Option<String>,
}

impl LearnerContext {
    #[must_use]
    pub fn new(learner_id: LearnerId) -> Self {
        Self {
            learner_id,
            access_token: None,
        }
    }

    #[must_use]
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    #[must_use]
    pub fn learner_id(&self) -> LearnerId {
        self.learner_id
    }

    #[must_use]
    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }
}

impl fmt::Debug for LearnerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LearnerContext")
            .field("learner_id", &self.learner_id)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_hides_token() {
        let ctx = LearnerContext::new(LearnerId::new(3)).with_access_token("secret-token");
        let printed = format!("{ctx:?}");
        assert!(!printed.contains("secret-token"));
        assert!(printed.contains("LearnerId(3)"));
    }
}
