#![forbid(unsafe_code)]

pub mod error;
pub mod progress;
pub mod quiz;

pub use learn_core::Clock;

pub use error::{ProgressError, SessionError};
pub use progress::{CourseProgressService, CourseView};
pub use quiz::{
    Closing, Effect, Phase, QuizLoopService, QuizProgress, QuizSession, Reply, RequestId,
    SessionFailure,
};
