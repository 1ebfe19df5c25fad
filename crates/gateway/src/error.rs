//! Error taxonomy for collaborator calls.

use thiserror::Error;

/// Errors surfaced by gateway backends.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum GatewayError {
    #[error("your session has expired, please sign in again")]
    SessionExpired,

    #[error("access denied: {0}")]
    Forbidden(String),

    #[error("not found")]
    NotFound,

    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("malformed response: {0}")]
    Serialization(String),

    #[error(transparent)]
    Invalid(#[from] learn_core::Error),
}

/// Coarse classification used to pick the session's error presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Expired session, missing entitlement, unknown resource. Not retried.
    Access,
    /// The service said no to starting or continuing. Expected outcome.
    Eligibility,
    /// Network or service hiccup. The learner may retry.
    Transient,
    /// The service answered with data the engine cannot use.
    Protocol,
}

impl GatewayError {
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            GatewayError::SessionExpired | GatewayError::Forbidden(_) | GatewayError::NotFound => {
                FailureKind::Access
            }
            GatewayError::Rejected(_) => FailureKind::Eligibility,
            GatewayError::Unavailable(_) => FailureKind::Transient,
            GatewayError::Serialization(_) | GatewayError::Invalid(_) => FailureKind::Protocol,
        }
    }

    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.kind() == FailureKind::Transient
    }
}
