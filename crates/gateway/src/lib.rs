#![forbid(unsafe_code)]

pub mod context;
pub mod contract;
pub mod error;
pub mod http;
pub mod memory;
pub mod records;

pub use context::LearnerContext;
pub use contract::{Gateways, ProgressGateway, QuizGateway};
pub use error::{FailureKind, GatewayError};
pub use http::{HttpBackend, HttpConfig};
pub use memory::{ExpectedAnswer, InMemoryBackend, Operation};
pub use records::{AttemptTicket, Eligibility, LessonCompletion};
