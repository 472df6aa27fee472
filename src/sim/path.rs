//! Parametric travel path
//!
//! The path is a uniform Catmull-Rom curve through a list of control points,
//! parameterized by t in [0, 1]. Content is scheduled in arc-length distance,
//! so the curve caches an approximate arc length and converts between the two.

use glam::{Mat3, Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::consts::ARC_LENGTH_SAMPLES;
use crate::right_of;

/// What happens to distances past the end of the curve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PathEnd {
    /// Continue in a straight line along the end tangent
    #[default]
    Extrapolate,
    /// Wrap distances modulo the arc length (closed tracks)
    Loop,
}

/// Position and orientation frame at a point on the path
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathPose {
    pub position: Vec3,
    /// Normalized tangent
    pub forward: Vec3,
    /// Normalized lateral axis (lanes are offset along this)
    pub right: Vec3,
}

impl PathPose {
    fn from_tangent(position: Vec3, forward: Vec3) -> Self {
        Self {
            position,
            forward,
            right: right_of(forward),
        }
    }

    /// Rotation mapping local +Z to forward and local +X to right
    pub fn rotation(&self) -> Quat {
        let up = self.forward.cross(self.right).normalize_or(Vec3::Y);
        Quat::from_mat3(&Mat3::from_cols(self.right, up, self.forward)).normalize()
    }

    /// World point offset laterally from the path
    #[inline]
    pub fn lateral(&self, offset: f32) -> Vec3 {
        self.position + self.right * offset
    }
}

/// The travel curve
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathCurve {
    points: Vec<Vec3>,
    end: PathEnd,
    /// Cached arc length (never below the degenerate fallback)
    arc_length: f64,
}

impl PathCurve {
    /// Length used when the control points describe no measurable curve
    pub const DEGENERATE_LENGTH: f64 = 1.0;

    pub fn new(points: Vec<Vec3>, end: PathEnd) -> Self {
        let points = if points.is_empty() {
            vec![Vec3::ZERO]
        } else {
            points
        };
        let mut curve = Self {
            points,
            end,
            arc_length: Self::DEGENERATE_LENGTH,
        };
        curve.arc_length = curve.measure_length();
        curve
    }

    /// A straight path from `start` along `direction` for `length` units
    pub fn straight(start: Vec3, direction: Vec3, length: f32) -> Self {
        let dir = direction.normalize_or(Vec3::Z);
        Self::new(vec![start, start + dir * length], PathEnd::Extrapolate)
    }

    pub fn points(&self) -> &[Vec3] {
        &self.points
    }

    pub fn end_behavior(&self) -> PathEnd {
        self.end
    }

    /// Cached arc length
    #[inline]
    pub fn arc_length(&self) -> f64 {
        self.arc_length
    }

    fn measure_length(&self) -> f64 {
        let mut length = 0.0f64;
        let mut prev = self.position(0.0);
        for i in 1..=ARC_LENGTH_SAMPLES {
            let next = self.position(i as f32 / ARC_LENGTH_SAMPLES as f32);
            length += prev.distance(next) as f64;
            prev = next;
        }
        if length.is_finite() && length > 1e-6 {
            length
        } else {
            Self::DEGENERATE_LENGTH
        }
    }

    /// Control points around segment `i` (ends are reflected)
    fn segment(&self, t: f32) -> Option<([Vec3; 4], f32, f32)> {
        let n = self.points.len();
        if n < 2 {
            return None;
        }
        let segments = (n - 1) as f32;
        let s = t.clamp(0.0, 1.0) * segments;
        let i = (s.floor() as usize).min(n - 2);
        let u = s - i as f32;

        let p1 = self.points[i];
        let p2 = self.points[i + 1];
        let p0 = if i > 0 { self.points[i - 1] } else { 2.0 * p1 - p2 };
        let p3 = if i + 2 < n {
            self.points[i + 2]
        } else {
            2.0 * p2 - p1
        };
        Some(([p0, p1, p2, p3], u, segments))
    }

    /// Position at parameter t (clamped to [0, 1])
    pub fn position(&self, t: f32) -> Vec3 {
        let Some(([p0, p1, p2, p3], u, _)) = self.segment(t) else {
            return self.points[0];
        };
        let u2 = u * u;
        let u3 = u2 * u;
        0.5 * (2.0 * p1
            + (p2 - p0) * u
            + (2.0 * p0 - 5.0 * p1 + 4.0 * p2 - p3) * u2
            + (3.0 * p1 - p0 - 3.0 * p2 + p3) * u3)
    }

    /// Normalized tangent at parameter t
    pub fn tangent(&self, t: f32) -> Vec3 {
        let Some(([p0, p1, p2, p3], u, segments)) = self.segment(t) else {
            return Vec3::Z;
        };
        let d = 0.5
            * ((p2 - p0)
                + 2.0 * (2.0 * p0 - 5.0 * p1 + 4.0 * p2 - p3) * u
                + 3.0 * (3.0 * p1 - p0 - 3.0 * p2 + p3) * u * u)
            * segments;
        if d.length_squared() > 1e-12 {
            return d.normalize();
        }
        // Cusp: fall back to the chord direction
        (p2 - p1).normalize_or(Vec3::Z)
    }

    /// Frame at parameter t
    pub fn pose(&self, t: f32) -> PathPose {
        PathPose::from_tangent(self.position(t), self.tangent(t))
    }

    /// Brute-force closest parameter over `samples + 1` evenly spaced points
    ///
    /// Returns the sample with the smallest squared distance (first wins ties).
    /// Precision scales with `samples`.
    pub fn closest_t(&self, point: Vec3, samples: usize) -> f32 {
        let samples = samples.max(1);
        let mut best_t = 0.0;
        let mut best_d = f32::MAX;
        for i in 0..=samples {
            let t = i as f32 / samples as f32;
            let d = self.position(t).distance_squared(point);
            if d < best_d {
                best_d = d;
                best_t = t;
            }
        }
        best_t
    }

    /// Arc distance of the sample closest to `point`
    pub fn distance_of(&self, point: Vec3, samples: usize) -> f64 {
        self.closest_t(point, samples) as f64 * self.arc_length
    }

    /// Map an arc distance to a curve parameter
    pub fn distance_to_t(&self, distance: f64) -> f32 {
        let d = match self.end {
            PathEnd::Extrapolate => distance,
            PathEnd::Loop => distance.rem_euclid(self.arc_length),
        };
        (d / self.arc_length).clamp(0.0, 1.0) as f32
    }

    /// Frame at an arc distance
    ///
    /// Beyond the end of an extrapolated path the frame continues linearly
    /// along the end tangent.
    pub fn pose_at_distance(&self, distance: f64) -> PathPose {
        if self.end == PathEnd::Extrapolate && distance > self.arc_length {
            let end = self.pose(1.0);
            let overshoot = (distance - self.arc_length) as f32;
            return PathPose {
                position: end.position + end.forward * overshoot,
                ..end
            };
        }
        self.pose(self.distance_to_t(distance))
    }
}

/// Drives an entity along the path at a constant speed
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathFollower {
    pub distance: f64,
    /// Units per second
    pub speed: f32,
    pub attached: bool,
}

impl PathFollower {
    pub fn new(start_distance: f64, speed: f32) -> Self {
        Self {
            distance: start_distance,
            speed,
            attached: true,
        }
    }

    pub fn advance(&mut self, dt: f32) {
        if self.attached {
            self.distance += (self.speed * dt) as f64;
        }
    }

    /// Stop driving; the distance freezes where it is
    pub fn detach(&mut self) {
        self.attached = false;
    }
}
