//! Per-tick input commands
//!
//! Jump, roll, lane steps and retry are edge-triggered: true only on the
//! tick the control goes from released to pressed. Hosts whose devices only
//! report held state can run them through [`InputEdges`].

use serde::{Deserialize, Serialize};

/// Input commands for a single tick (deterministic)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TickInput {
    /// -1 steps one lane left, +1 one lane right, 0 stays
    pub lane_step: i8,
    /// Continuous steering in [-1, 1] (free lateral mode)
    pub lateral_axis: f32,
    pub jump: bool,
    pub roll: bool,
    /// Skip the restart delay after death
    pub retry: bool,
}

/// Rising-edge detector for a single button
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonEdge {
    held: bool,
}

impl ButtonEdge {
    /// Feed the current held state; true only on a press
    pub fn update(&mut self, pressed: bool) -> bool {
        let edge = pressed && !self.held;
        self.held = pressed;
        edge
    }

    pub fn is_held(&self) -> bool {
        self.held
    }
}

/// Held-state snapshot from a device
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HeldButtons {
    pub left: bool,
    pub right: bool,
    pub jump: bool,
    pub roll: bool,
    pub retry: bool,
    pub axis: f32,
}

/// Turns held-state snapshots into [`TickInput`]s
#[derive(Debug, Clone, Copy, Default)]
pub struct InputEdges {
    left: ButtonEdge,
    right: ButtonEdge,
    jump: ButtonEdge,
    roll: ButtonEdge,
    retry: ButtonEdge,
}

impl InputEdges {
    pub fn sample(&mut self, held: HeldButtons) -> TickInput {
        let left = self.left.update(held.left);
        let right = self.right.update(held.right);
        TickInput {
            lane_step: right as i8 - left as i8,
            lateral_axis: held.axis.clamp(-1.0, 1.0),
            jump: self.jump.update(held.jump),
            roll: self.roll.update(held.roll),
            retry: self.retry.update(held.retry),
        }
    }
}
