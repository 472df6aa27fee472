//! Explicit countdown timers advanced by tick deltas
//!
//! Replaces suspended waits: a timer that reaches zero reports it once, inside
//! the tick that crossed the boundary.

use serde::{Deserialize, Serialize};

/// A one-shot countdown in seconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Countdown {
    remaining: f32,
    armed: bool,
}

impl Countdown {
    /// Arm the timer for `duration` seconds (negative durations fire on the next tick)
    pub fn start(&mut self, duration: f32) {
        self.remaining = duration.max(0.0);
        self.armed = true;
    }

    /// Disarm without firing
    pub fn cancel(&mut self) {
        self.armed = false;
        self.remaining = 0.0;
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn remaining(&self) -> f32 {
        if self.armed { self.remaining } else { 0.0 }
    }

    /// Advance by `dt`; returns true exactly on the tick the timer expires
    pub fn tick(&mut self, dt: f32) -> bool {
        if !self.armed {
            return false;
        }
        self.remaining -= dt.max(0.0);
        if self.remaining <= 0.0 {
            self.armed = false;
            self.remaining = 0.0;
            return true;
        }
        false
    }
}
