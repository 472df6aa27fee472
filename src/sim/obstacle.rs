//! Spawned obstacle instances
//!
//! At creation an instance shrinks its native colliders and builds one
//! simplified hit volume from the template's combined bounds. Only the hit
//! volume is used for contacts; the shrunk colliders stay with the
//! presentation side. Each tick the instance checks whether the player has
//! left it far enough behind to be disposed.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::host::{InstanceBackend, InstanceHandle, Pose};
use super::pattern::{ObstacleKind, ObstacleTypeId, ObstacleVariant};
use super::shapes::{ColliderShape, OrientedBox};

/// Bounds applied to the configured shrink factor
pub const MIN_SHRINK: f32 = 0.1;
pub const MAX_SHRINK: f32 = 1.0;
/// Smallest allowed disposal distance
pub const MIN_DESTROY_BEHIND: f32 = 0.1;

/// Where and what to spawn
#[derive(Debug, Clone, Copy)]
pub struct Placement<'a> {
    pub type_id: ObstacleTypeId,
    pub lane: u8,
    pub variant: &'a ObstacleVariant,
    pub pose: Pose,
    pub spawn_distance: f64,
    pub rollable: bool,
}

/// A live obstacle in the active pool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObstacleInstance {
    pub id: u32,
    pub handle: InstanceHandle,
    pub type_id: ObstacleTypeId,
    pub kind: Option<ObstacleKind>,
    pub template: String,
    pub lane: u8,
    /// Arc distance of the row that spawned this instance
    pub spawn_distance: f64,
    pub pose: Pose,
    pub shrink_scale: f32,
    /// Native colliders after shrinking (presentation only)
    pub colliders: Vec<ColliderShape>,
    /// The only volume contacts are tested against
    pub hit_volume: OrientedBox,
    /// Rolling players pass through
    pub rollable: bool,
    pub destroy_behind_distance: f32,
    pub alive: bool,
}

impl ObstacleInstance {
    pub fn new(
        id: u32,
        handle: InstanceHandle,
        placement: Placement<'_>,
        shrink_scale: f32,
        destroy_behind_distance: f32,
    ) -> Self {
        let shrink_scale = shrink_scale.clamp(MIN_SHRINK, MAX_SHRINK);
        let colliders = placement
            .variant
            .colliders
            .iter()
            .map(|c| c.scaled(shrink_scale))
            .collect();
        let hit_volume = build_hit_volume(placement.variant, placement.pose, shrink_scale);

        Self {
            id,
            handle,
            type_id: placement.type_id,
            kind: ObstacleKind::from_id(placement.type_id),
            template: placement.variant.template.clone(),
            lane: placement.lane,
            spawn_distance: placement.spawn_distance,
            pose: placement.pose,
            shrink_scale,
            colliders,
            hit_volume,
            rollable: placement.rollable,
            destroy_behind_distance: destroy_behind_distance.max(MIN_DESTROY_BEHIND),
            alive: true,
        }
    }

    #[inline]
    pub fn position(&self) -> Vec3 {
        self.pose.position
    }

    /// Signed distance the player is ahead of this instance along `forward`
    #[inline]
    pub fn forward_delta(&self, player_position: Vec3, forward: Vec3) -> f32 {
        forward.dot(player_position - self.pose.position)
    }

    /// Whether the player has moved past by more than the disposal distance
    pub fn is_left_behind(&self, player_position: Vec3, forward: Vec3) -> bool {
        self.forward_delta(player_position, forward) > self.destroy_behind_distance
    }

    /// Mark dead and release the presentation instance; later calls do nothing
    pub fn dispose(&mut self, backend: &mut dyn InstanceBackend) {
        if !self.alive {
            return;
        }
        self.alive = false;
        backend.dispose(self.handle);
    }

    /// Height of the top of the hit volume
    #[inline]
    pub fn top_height(&self) -> f32 {
        self.hit_volume.top_height()
    }

    /// Surface a player counts as standing on, `top_fraction` of the way
    /// from the hit volume's center to its top
    #[inline]
    pub fn stand_on_height(&self, top_fraction: f32) -> f32 {
        self.hit_volume.surface_height(top_fraction)
    }
}

/// One trigger box sized from the template's combined bounds, scaled by
/// `shrink_scale` and oriented with the instance
pub fn build_hit_volume(variant: &ObstacleVariant, pose: Pose, shrink_scale: f32) -> OrientedBox {
    let bounds = variant.local_bounds();
    let mut size = bounds.size();
    if size.length() < 0.001 {
        size = Vec3::ONE;
    }
    OrientedBox {
        center: pose.transform_point(bounds.center()),
        half_extents: size * 0.5 * shrink_scale,
        rotation: pose.rotation,
    }
}
