mod service;

pub use crate::error::ProgressError;
pub use service::{CourseProgressService, CourseView};
