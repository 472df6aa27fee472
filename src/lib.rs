//! Lane Runner - simulation core of an endless three-lane runner
//!
//! Core modules:
//! - `sim`: Deterministic simulation (path curve, spawning, locomotion, collisions)
//! - `tuning`: Data-driven game balance, loaded from JSON

pub mod sim;
pub mod tuning;

pub use tuning::{Tuning, TuningError};

use glam::Vec3;

/// Game configuration constants
pub mod consts {
    /// Fixed simulation timestep (120 Hz)
    pub const SIM_DT: f32 = 1.0 / 120.0;
    /// Maximum substeps per frame to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 8;

    /// Lanes are always three wide: index 0 (left), 1 (center), 2 (right)
    pub const LANE_COUNT: usize = 3;
    pub const CENTER_LANE: u8 = 1;

    /// Samples used to cache the path arc length
    pub const ARC_LENGTH_SAMPLES: usize = 100;
    /// Hard cap on spawn iterations per tick (guards non-advancing cursors)
    pub const SPAWN_ITERATION_CAP: u32 = 100;

    /// Height reported when the ground query misses
    pub const NO_GROUND_HEIGHT: f32 = -999.0;
    /// Vertical slack when deciding the player touches the ground
    pub const GROUND_SNAP_TOLERANCE: f32 = 0.05;
    /// Ray origin lift above the player's feet for the ground query
    pub const GROUND_RAY_LIFT: f32 = 1.0;
}

/// World up axis
pub const UP: Vec3 = Vec3::Y;

/// Path-local right vector for a (normalized) forward tangent
///
/// With +Z forward this is +X, so lane 0 sits at -X and lane 2 at +X.
#[inline]
pub fn right_of(forward: Vec3) -> Vec3 {
    let right = UP.cross(forward);
    if right.length_squared() < 1e-8 {
        // Vertical tangent: any horizontal axis will do
        Vec3::X
    } else {
        right.normalize()
    }
}

/// Frame-rate independent exponential approach factor in [0, 1)
#[inline]
pub fn ease_factor(sharpness: f32, dt: f32) -> f32 {
    1.0 - (-sharpness.max(0.0) * dt.max(0.0)).exp()
}

/// Linear interpolation between two scalars
#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}
