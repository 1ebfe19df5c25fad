mod effect;
mod plan;
mod session;
mod view;
mod workflow;

// Public API of the quiz subsystem.
pub use effect::{Effect, Reply, RequestId};
pub use plan::{AttemptPlan, AttemptPlanner};
pub use session::QuizSession;
pub use view::{Closing, Phase, QuizProgress, SessionFailure};
pub use workflow::QuizLoopService;
