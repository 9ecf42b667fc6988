//! Consecutive-failure circuit breaker

use crate::crawler::outcome::Outcome;

/// Halts a run after a streak of adverse outcomes
///
/// BLANK, DEAD and UNKNOWN extend the streak, LIVE resets it, STOP and
/// ERROR leave it untouched. A threshold of 0 disables the breaker.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    threshold: u32,
    streak: u32,
}

impl CircuitBreaker {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold,
            streak: 0,
        }
    }

    /// Updates the streak with one applied outcome
    pub fn observe(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Live { .. } => self.streak = 0,
            Outcome::Blank { .. } | Outcome::Dead { .. } | Outcome::Unknown { .. } => {
                self.streak = self.streak.saturating_add(1)
            }
            Outcome::Stop { .. } | Outcome::Error { .. } => {}
        }
    }

    /// Returns true once the streak has reached the threshold
    pub fn should_halt(&self) -> bool {
        self.threshold > 0 && self.streak >= self.threshold
    }

    pub fn streak(&self) -> u32 {
        self.streak
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }
}
