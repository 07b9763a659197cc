//! Countdown timer used by actions, sensors and presentation timelines

use serde::{Deserialize, Serialize};

/// Elapsed/duration pair advanced by explicit deltas
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Timer {
    pub t: f32,
    pub duration: f32,
}

impl Timer {
    pub fn new(duration: f32) -> Self {
        Self {
            t: 0.0,
            duration: duration.max(0.0),
        }
    }

    /// Restart from zero keeping the current duration
    pub fn start(&mut self) {
        self.t = 0.0;
    }

    /// Restart from zero with a new duration
    pub fn start_with(&mut self, duration: f32) {
        self.t = 0.0;
        self.duration = duration.max(0.0);
    }

    #[inline]
    pub fn is_complete(&self) -> bool {
        self.t >= self.duration
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.t < self.duration
    }

    pub fn percent_complete(&self) -> f32 {
        if self.duration == 0.0 {
            return 1.0;
        }
        self.t / self.duration
    }

    pub fn remaining(&self) -> f32 {
        (self.duration - self.t).max(0.0)
    }

    /// Advance by `dt`. Completed timers are left untouched.
    pub fn update(&mut self, dt: f32) {
        if self.is_complete() {
            return;
        }
        self.t += dt;
        if self.is_complete() {
            self.t = self.duration;
        }
    }
}
