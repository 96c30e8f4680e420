//! The one-time anti-automation challenge token.
//!
//! The portal mints it on request and honours it for only a few seconds, so
//! the workflow acquires it strictly after every other preparatory step and
//! checks the deadline again immediately before the submit POST.

use std::time::{Duration, Instant};

/// A minted token plus the deadline it must be consumed by.
pub struct ChallengeToken {
    value: String,
    acquired: Instant,
    budget: Duration,
}

impl ChallengeToken {
    pub fn new(value: String, budget: Duration) -> Self {
        Self {
            value,
            acquired: Instant::now(),
            budget,
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Has the validity window already closed?
    pub fn is_expired(&self) -> bool {
        self.acquired.elapsed() >= self.budget
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }
}
