//! Player locomotion
//!
//! The player is a lane index plus a continuous lateral offset that eases
//! toward it, a vertical body integrated under gravity against a ground
//! query, and a timed roll that shrinks the collision capsule. Everything is
//! scaled by the tick delta so behavior does not depend on frame rate.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::input::TickInput;
use super::path::PathPose;
use super::timer::Countdown;
use crate::consts::{GROUND_SNAP_TOLERANCE, NO_GROUND_HEIGHT};
use crate::tuning::{LateralMode, Tuning};
use crate::{UP, ease_factor};

/// Vertical collision capsule, measured from the player's feet
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Capsule {
    pub radius: f32,
    /// Total height including both caps
    pub height: f32,
    /// Capsule center above the feet
    pub center_y: f32,
}

impl Capsule {
    /// Core segment endpoints for a player standing at `base`
    pub fn segment(&self, base: Vec3) -> (Vec3, Vec3) {
        let half = (self.height * 0.5 - self.radius).max(0.0);
        let center = base + UP * self.center_y;
        (center - UP * half, center + UP * half)
    }
}

/// What changed during a locomotion step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LocomotionEvents {
    pub jumped: bool,
    pub landed: bool,
    pub roll_started: bool,
    pub roll_ended: bool,
}

/// Player state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    /// -1 (left), 0 (center), 1 (right)
    pub lane: i8,
    /// Lateral offset from the path, eased toward the lane target
    pub position_x: f32,
    /// World height of the feet
    pub position_y: f32,
    pub vertical_velocity: f32,
    pub grounded: bool,
    pub rolling: bool,
    pub roll_timer: Countdown,
    /// Current collision capsule (standing or rolling)
    pub capsule: Capsule,
    pub alive: bool,
    /// Cleared on death; locomotion ignores input afterwards
    pub input_enabled: bool,
    /// Backward speed along the path while knocked back
    pub knockback_speed: f32,
}

impl Player {
    pub fn new(tuning: &Tuning, start_height: f32) -> Self {
        Self {
            lane: 0,
            position_x: 0.0,
            position_y: start_height,
            vertical_velocity: 0.0,
            grounded: true,
            rolling: false,
            roll_timer: Countdown::default(),
            capsule: tuning.player.standing_capsule,
            alive: true,
            input_enabled: true,
            knockback_speed: 0.0,
        }
    }

    /// Lane as a pattern column (0..=2)
    #[inline]
    pub fn lane_index(&self) -> u8 {
        (self.lane + 1) as u8
    }

    #[inline]
    pub fn target_x(&self, lane_width: f32) -> f32 {
        self.lane as f32 * lane_width
    }

    /// Feet position in the world given the path frame under the player
    pub fn world_position(&self, pose: &PathPose) -> Vec3 {
        let lateral = pose.lateral(self.position_x);
        Vec3::new(lateral.x, self.position_y, lateral.z)
    }

    /// Origin of the downward ground ray
    pub fn ground_ray_origin(&self, pose: &PathPose) -> Vec3 {
        self.world_position(pose) + UP * crate::consts::GROUND_RAY_LIFT
    }

    /// One locomotion tick: lateral, vertical, then roll
    pub fn step(
        &mut self,
        input: &TickInput,
        ground_height: Option<f32>,
        tuning: &Tuning,
        dt: f32,
    ) -> LocomotionEvents {
        let input = if self.input_enabled {
            *input
        } else {
            TickInput::default()
        };
        self.update_lateral(&input, tuning, dt);
        let (jumped, landed) = self.update_vertical(ground_height, input.jump, tuning, dt);
        let (roll_started, roll_ended) = self.update_roll(input.roll, tuning, dt);
        LocomotionEvents {
            jumped,
            landed,
            roll_started,
            roll_ended,
        }
    }

    fn update_lateral(&mut self, input: &TickInput, tuning: &Tuning, dt: f32) {
        let lanes = &tuning.lanes;
        match lanes.lateral_mode {
            LateralMode::Lanes => {
                if input.lane_step != 0 {
                    self.lane = (self.lane + input.lane_step.signum()).clamp(-1, 1);
                }
                let target = self.target_x(lanes.lane_width);
                let k = ease_factor(lanes.lane_change_sharpness, dt);
                self.position_x += (target - self.position_x) * k;
            }
            LateralMode::Free => {
                let axis = input.lateral_axis.clamp(-1.0, 1.0);
                self.position_x = (self.position_x + axis * lanes.side_speed * dt)
                    .clamp(-lanes.limit_x, lanes.limit_x);
                let lane = (self.position_x / lanes.lane_width).round();
                self.lane = (lane as i8).clamp(-1, 1);
            }
        }
    }

    /// Gravity and jump; returns (jumped, landed)
    fn update_vertical(
        &mut self,
        ground_height: Option<f32>,
        jump: bool,
        tuning: &Tuning,
        dt: f32,
    ) -> (bool, bool) {
        let ground = ground_height.unwrap_or(NO_GROUND_HEIGHT);
        let was_grounded = self.grounded;
        let mut jumped = false;

        if self.position_y <= ground + GROUND_SNAP_TOLERANCE && self.vertical_velocity <= 0.0 {
            self.grounded = true;
            self.vertical_velocity = 0.0;
            self.position_y = ground;

            if jump && !self.rolling {
                self.vertical_velocity = tuning.player.jump_force;
                self.grounded = false;
                jumped = true;
            }
        } else {
            self.grounded = false;
            self.vertical_velocity -= tuning.player.gravity * dt;
        }

        self.position_y += self.vertical_velocity * dt;

        // Land within the tick instead of sinking through the surface
        if !self.grounded
            && self.vertical_velocity <= 0.0
            && ground_height.is_some()
            && self.position_y < ground
        {
            self.position_y = ground;
            self.vertical_velocity = 0.0;
            self.grounded = true;
        }

        (jumped, self.grounded && !was_grounded)
    }

    /// Roll timer and capsule; returns (started, ended)
    fn update_roll(&mut self, roll: bool, tuning: &Tuning, dt: f32) -> (bool, bool) {
        let mut ended = false;
        if self.rolling && self.roll_timer.tick(dt) {
            self.rolling = false;
            self.capsule = tuning.player.standing_capsule;
            ended = true;
        }

        let mut started = false;
        if roll && self.grounded && !self.rolling {
            self.rolling = true;
            self.roll_timer.start(tuning.player.roll_duration);
            self.capsule = tuning.player.rolling_capsule;
            started = true;
        }
        (started, ended)
    }

    /// Freeze input and optionally throw the body back and up
    pub fn kill(&mut self, tuning: &Tuning) {
        self.alive = false;
        self.input_enabled = false;
        if self.rolling {
            self.rolling = false;
            self.roll_timer.cancel();
            self.capsule = tuning.player.standing_capsule;
        }
        if let Some(knockback) = tuning.death.knockback {
            self.vertical_velocity = knockback.upward;
            self.knockback_speed = knockback.backward;
            self.grounded = false;
        }
    }
}
