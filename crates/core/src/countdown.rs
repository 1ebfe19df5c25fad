//! One-second countdown driven by explicit ticks.
//!
//! The owner decides when a second has passed and calls [`Countdown::tick`].
//! Nothing here reads the wall clock, so tests can drive it directly.

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownTick {
    /// Not armed or already expired.
    Idle,
    /// Still running with this many seconds left.
    Running(u32),
    /// Reached zero on this tick. Reported exactly once.
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Disarmed,
    Running(u32),
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    state: State,
}

impl Default for Countdown {
    fn default() -> Self {
        Self::disarmed()
    }
}

impl Countdown {
    /// A countdown that never expires.
    #[must_use]
    pub fn disarmed() -> Self {
        Self {
            state: State::Disarmed,
        }
    }

    /// Arm with `seconds` remaining. Zero seconds expires on the first tick.
    #[must_use]
    pub fn armed(seconds: u32) -> Self {
        Self {
            state: State::Running(seconds),
        }
    }

    /// Advance by one second.
    pub fn tick(&mut self) -> CountdownTick {
        match self.state {
            State::Running(remaining) if remaining <= 1 => {
                self.state = State::Expired;
                CountdownTick::Expired
            }
            State::Running(remaining) => {
                self.state = State::Running(remaining - 1);
                CountdownTick::Running(remaining - 1)
            }
            State::Disarmed | State::Expired => CountdownTick::Idle,
        }
    }

    /// Seconds left; `None` when the quiz is untimed.
    #[must_use]
    pub fn remaining(&self) -> Option<u32> {
        match self.state {
            State::Disarmed => None,
            State::Running(remaining) => Some(remaining),
            State::Expired => Some(0),
        }
    }
}
