#![forbid(unsafe_code)]

pub mod countdown;
pub mod error;
pub mod model;
pub mod resolver;
pub mod time;

pub use countdown::{Countdown, CountdownTick};
pub use error::Error;
pub use resolver::{ResolvedLesson, ResolvedTheme, ResolvedView, ThemeStatus, resolve};
pub use time::Clock;
