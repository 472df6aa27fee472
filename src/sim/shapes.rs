//! Collision shapes
//!
//! Obstacle templates describe their geometry with axis-aligned bounds and
//! native collider shapes in local space. At spawn time those are reduced to
//! a single oriented box used for hit detection.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Bracket width, in world units, at which segment searches stop
const SEGMENT_SEARCH_EPSILON: f32 = 1e-5;
/// Bound on search steps; each one keeps two thirds of the bracket
const SEGMENT_SEARCH_MAX_ITERATIONS: u32 = 80;

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn from_center_size(center: Vec3, size: Vec3) -> Self {
        let half = size.abs() * 0.5;
        Self {
            min: center - half,
            max: center + half,
        }
    }

    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    #[inline]
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Smallest box containing both
    pub fn encapsulate(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Union of all boxes, None if the iterator is empty
    pub fn union_all<'a>(boxes: impl IntoIterator<Item = &'a Aabb>) -> Option<Aabb> {
        boxes
            .into_iter()
            .copied()
            .reduce(|acc, b| acc.encapsulate(&b))
    }

    pub fn contains(&self, p: Vec3) -> bool {
        p.cmpge(self.min).all() && p.cmple(self.max).all()
    }

    pub fn closest_point(&self, p: Vec3) -> Vec3 {
        p.clamp(self.min, self.max)
    }
}

/// Native collider attached to an obstacle template (local space)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ColliderShape {
    Box { center: Vec3, size: Vec3 },
    Sphere { center: Vec3, radius: f32 },
    /// Y-aligned capsule; `height` includes both caps
    Capsule { center: Vec3, radius: f32, height: f32 },
}

impl ColliderShape {
    /// Shrink the collider's extents by `scale` around its own center
    pub fn scaled(&self, scale: f32) -> Self {
        match *self {
            ColliderShape::Box { center, size } => ColliderShape::Box {
                center,
                size: size * scale,
            },
            ColliderShape::Sphere { center, radius } => ColliderShape::Sphere {
                center,
                radius: radius * scale,
            },
            ColliderShape::Capsule {
                center,
                radius,
                height,
            } => ColliderShape::Capsule {
                center,
                radius: radius * scale,
                height: height * scale,
            },
        }
    }

    pub fn local_bounds(&self) -> Aabb {
        match *self {
            ColliderShape::Box { center, size } => Aabb::from_center_size(center, size),
            ColliderShape::Sphere { center, radius } => {
                Aabb::from_center_size(center, Vec3::splat(radius * 2.0))
            }
            ColliderShape::Capsule {
                center,
                radius,
                height,
            } => Aabb::from_center_size(
                center,
                Vec3::new(radius * 2.0, height.max(radius * 2.0), radius * 2.0),
            ),
        }
    }
}

/// Rotated box in world space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrientedBox {
    pub center: Vec3,
    pub half_extents: Vec3,
    pub rotation: Quat,
}

impl OrientedBox {
    /// World point expressed in the box's local frame
    #[inline]
    pub fn to_local(&self, p: Vec3) -> Vec3 {
        self.rotation.inverse() * (p - self.center)
    }

    pub fn contains(&self, p: Vec3) -> bool {
        self.to_local(p).abs().cmple(self.half_extents).all()
    }

    pub fn closest_point(&self, p: Vec3) -> Vec3 {
        let local = self.to_local(p).clamp(-self.half_extents, self.half_extents);
        self.center + self.rotation * local
    }

    /// Half of the box's world-space vertical extent (accounts for rotation)
    pub fn vertical_half_extent(&self) -> f32 {
        let axes = [
            self.rotation * Vec3::X,
            self.rotation * Vec3::Y,
            self.rotation * Vec3::Z,
        ];
        axes.iter()
            .zip(self.half_extents.to_array())
            .map(|(axis, h)| axis.y.abs() * h)
            .sum()
    }

    /// Height of the highest point of the box
    #[inline]
    pub fn top_height(&self) -> f32 {
        self.surface_height(1.0)
    }

    /// Center height raised by `fraction` of the vertical half extent
    #[inline]
    pub fn surface_height(&self, fraction: f32) -> f32 {
        self.center.y + self.vertical_half_extent() * fraction
    }

    /// Whether `p` lies over the box's horizontal footprint
    pub fn footprint_contains(&self, p: Vec3) -> bool {
        let local = self.to_local(Vec3::new(p.x, self.center.y, p.z));
        local.x.abs() <= self.half_extents.x && local.z.abs() <= self.half_extents.z
    }

    /// World-space axis-aligned bounds
    pub fn world_bounds(&self) -> Aabb {
        let mut extent = Vec3::ZERO;
        for (axis, h) in [Vec3::X, Vec3::Y, Vec3::Z]
            .into_iter()
            .zip(self.half_extents.to_array())
        {
            extent += (self.rotation * axis).abs() * h;
        }
        Aabb {
            min: self.center - extent,
            max: self.center + extent,
        }
    }

    /// Distance between a segment and the box, plus the segment point that
    /// realises it
    ///
    /// Distance to a convex set is convex along the segment, so a ternary
    /// search over the segment parameter finds the minimum. It stops once the
    /// bracket is shorter than `SEGMENT_SEARCH_EPSILON` in world units.
    pub fn segment_distance(&self, a: Vec3, b: Vec3) -> (f32, Vec3) {
        let ab = b - a;
        let length = ab.length();
        let distance_at = |t: f32| {
            let p = a + ab * t;
            p.distance(self.closest_point(p))
        };
        if length < SEGMENT_SEARCH_EPSILON {
            return (distance_at(0.0), a);
        }

        let (mut lo, mut hi) = (0.0f32, 1.0f32);
        let mut iterations = 0;
        while (hi - lo) * length > SEGMENT_SEARCH_EPSILON
            && iterations < SEGMENT_SEARCH_MAX_ITERATIONS
        {
            let third = (hi - lo) / 3.0;
            let (m1, m2) = (lo + third, hi - third);
            if distance_at(m1) <= distance_at(m2) {
                hi = m2;
            } else {
                lo = m1;
            }
            iterations += 1;
        }
        // The ends can beat the bracket midpoint when the minimum sits on them
        [lo, (lo + hi) * 0.5, hi]
            .into_iter()
            .map(|t| (distance_at(t), a + ab * t))
            .min_by(|x, y| x.0.total_cmp(&y.0))
            .unwrap_or((distance_at(0.0), a))
    }
}

/// Closest point to `p` on segment `a`-`b`
pub fn closest_point_on_segment(a: Vec3, b: Vec3, p: Vec3) -> Vec3 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq < 1e-8 {
        return a;
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    a + ab * t
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_4;

    #[test]
    fn test_aabb_union() {
        let a = Aabb::from_center_size(Vec3::ZERO, Vec3::ONE);
        let b = Aabb::from_center_size(Vec3::new(2.0, 0.0, 0.0), Vec3::ONE);
        let u = Aabb::union_all([a, b].iter()).unwrap();
        assert_eq!(u.min, Vec3::new(-0.5, -0.5, -0.5));
        assert_eq!(u.max, Vec3::new(2.5, 0.5, 0.5));
        assert!(Aabb::union_all(std::iter::empty::<&Aabb>()).is_none());
    }

    #[test]
    fn test_collider_scaled() {
        let cap = ColliderShape::Capsule {
            center: Vec3::Y,
            radius: 0.5,
            height: 2.0,
        };
        match cap.scaled(0.5) {
            ColliderShape::Capsule {
                center,
                radius,
                height,
            } => {
                assert_eq!(center, Vec3::Y);
                assert_eq!(radius, 0.25);
                assert_eq!(height, 1.0);
            }
            other => panic!("unexpected shape {other:?}"),
        }
    }

    #[test]
    fn test_top_height_rotated() {
        let flat = OrientedBox {
            center: Vec3::new(0.0, 1.0, 0.0),
            half_extents: Vec3::new(1.0, 0.5, 1.0),
            rotation: Quat::IDENTITY,
        };
        assert!((flat.top_height() - 1.5).abs() < 1e-5);

        // Yaw does not change the top
        let yawed = OrientedBox {
            rotation: Quat::from_rotation_y(1.2),
            ..flat
        };
        assert!((yawed.top_height() - 1.5).abs() < 1e-5);

        // Rolling onto an edge raises it
        let tilted = OrientedBox {
            rotation: Quat::from_rotation_z(FRAC_PI_4),
            ..flat
        };
        let expected = 1.0 + (1.0 + 0.5) * FRAC_PI_4.cos();
        assert!((tilted.top_height() - expected).abs() < 1e-4);
    }

    #[test]
    fn test_segment_distance() {
        let b = OrientedBox {
            center: Vec3::ZERO,
            half_extents: Vec3::ONE,
            rotation: Quat::IDENTITY,
        };
        let (d, _) = b.segment_distance(Vec3::new(3.0, -2.0, 0.0), Vec3::new(3.0, 2.0, 0.0));
        assert!((d - 2.0).abs() < 1e-4);
        let (d, _) = b.segment_distance(Vec3::new(0.5, -3.0, 0.0), Vec3::new(0.5, 3.0, 0.0));
        assert!(d < 1e-5);
    }

    /// Minimum over a dense sampling of the segment
    fn sampled_distance(b: &OrientedBox, from: Vec3, to: Vec3) -> f32 {
        (0..=20_000)
            .map(|i| {
                let p = from.lerp(to, i as f32 / 20_000.0);
                p.distance(b.closest_point(p))
            })
            .fold(f32::INFINITY, f32::min)
    }

    #[test]
    fn test_segment_distance_grazing_pitched_box() {
        // Long segment nearly parallel to the top face, well off center
        let pitch = Quat::from_rotation_x(0.2);
        let b = OrientedBox {
            center: Vec3::ZERO,
            half_extents: Vec3::ONE,
            rotation: pitch,
        };
        let from = pitch * Vec3::new(-10.0, 1.5, 0.0);
        let to = pitch * Vec3::new(10.0, 1.2, 0.0);

        let (d, point) = b.segment_distance(from, to);
        let expected = sampled_distance(&b, from, to);
        assert!((d - expected).abs() < 1e-3, "{d} vs {expected}");
        assert!((point.distance(b.closest_point(point)) - d).abs() < 1e-5);
        // A capsule of this radius touches the box
        assert!(d <= 0.34);
    }

    #[test]
    fn test_segment_distance_degenerate_segment() {
        let b = OrientedBox {
            center: Vec3::ZERO,
            half_extents: Vec3::ONE,
            rotation: Quat::IDENTITY,
        };
        let p = Vec3::new(0.0, 3.0, 0.0);
        let (d, point) = b.segment_distance(p, p);
        assert!((d - 2.0).abs() < 1e-5);
        assert_eq!(point, p);
    }

    #[test]
    fn test_footprint() {
        let b = OrientedBox {
            center: Vec3::new(0.0, 0.5, 10.0),
            half_extents: Vec3::new(1.0, 0.5, 0.25),
            rotation: Quat::IDENTITY,
        };
        assert!(b.footprint_contains(Vec3::new(0.5, 8.0, 10.1)));
        assert!(!b.footprint_contains(Vec3::new(0.5, 0.5, 11.0)));
    }
}
