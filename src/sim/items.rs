//! Collectible placement
//!
//! Items are laid out along the stretch of path that follows each scheduled
//! row, drifting from the previous segment's safe lane toward a lane that is
//! empty in the current row. Placement never lands exactly on a row boundary.

use glam::Vec3;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::host::{Host, InstanceBackend, InstanceHandle, Pose, RunHooks};
use super::path::PathCurve;
use super::pattern::{PatternRow, safe_lanes};
use super::scheduler::{ActivePool, Pooled};
use super::shapes::closest_point_on_segment;
use super::state::GameEvent;
use crate::consts::{CENTER_LANE, LANE_COUNT};
use crate::tuning::{MAX_ITEMS_PER_SEGMENT, Tuning};
use crate::{UP, lerp};

/// Mixed into the run seed so items draw from their own stream
pub const ITEM_STREAM: u64 = 0x9E37_79B9_7F4A_7C15;

/// A live collectible
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemInstance {
    pub id: u32,
    pub handle: InstanceHandle,
    pub spawn_distance: f64,
    pub position: Vec3,
    /// Interpolated lane in [0, 2]
    pub lane_value: f32,
    pub alive: bool,
}

impl ItemInstance {
    /// Mark dead and release the presentation instance; later calls do nothing
    pub fn dispose(&mut self, backend: &mut dyn InstanceBackend) {
        if !self.alive {
            return;
        }
        self.alive = false;
        backend.dispose(self.handle);
    }
}

impl Pooled for ItemInstance {
    fn id(&self) -> u32 {
        self.id
    }

    fn spawn_distance(&self) -> f64 {
        self.spawn_distance
    }
}

/// Fractions and lane values for one segment of `count` items
///
/// Fractions are `i / (count + 1)` for `i = 1..=count`; lanes move linearly
/// from `from_lane` toward `to_lane`, clamped into the lane range.
pub fn interpolate_lanes(from_lane: u8, to_lane: u8, count: u32) -> Vec<(f32, f32)> {
    let max_lane = (LANE_COUNT - 1) as f32;
    (1..=count)
        .map(|i| {
            let fraction = i as f32 / (count + 1) as f32;
            let lane = lerp(from_lane as f32, to_lane as f32, fraction).clamp(0.0, max_lane);
            (fraction, lane)
        })
        .collect()
}

/// Places, retires and collects items
#[derive(Debug, Clone)]
pub struct ItemPlacer {
    rng: Pcg32,
    pool: ActivePool<ItemInstance>,
    next_id: u32,
}

impl ItemPlacer {
    pub fn new(seed: u64, capacity: usize) -> Self {
        Self {
            rng: Pcg32::seed_from_u64(seed ^ ITEM_STREAM),
            pool: ActivePool::new(capacity),
            next_id: 0,
        }
    }

    pub fn pool(&self) -> &ActivePool<ItemInstance> {
        &self.pool
    }

    /// A uniformly chosen empty lane of `row`, or the center lane
    pub fn choose_target(&mut self, row: &PatternRow) -> u8 {
        let safe = safe_lanes(row);
        if safe.is_empty() {
            CENTER_LANE
        } else {
            safe[self.rng.random_range(0..safe.len())]
        }
    }

    /// Lay out one segment between `from` and `to`; updates `last_safe_lane`
    #[allow(clippy::too_many_arguments)]
    pub fn place_segment(
        &mut self,
        last_safe_lane: &mut u8,
        row: &PatternRow,
        from: f64,
        to: f64,
        curve: &PathCurve,
        tuning: &Tuning,
        host: &mut Host<'_>,
        events: &mut Vec<GameEvent>,
    ) -> usize {
        let target = self.choose_target(row);
        let count = tuning.items.items_per_segment.min(MAX_ITEMS_PER_SEGMENT);
        let spawner = &tuning.spawner;

        for (fraction, lane_value) in interpolate_lanes(*last_safe_lane, target, count) {
            let distance = from + (to - from) * fraction as f64;
            let frame = curve.pose_at_distance(distance);
            let mut position = frame.lateral((lane_value - 1.0) * tuning.lanes.lane_width);
            let probe = position + UP * spawner.ground_probe_height;
            if let Some(height) =
                host.ground
                    .raycast_down(probe, spawner.ground_probe_length, spawner.ground_layer)
            {
                position.y = height;
            }
            position.y += tuning.items.hover_height;

            let handle = host
                .backend
                .instantiate(&tuning.items.template, Pose::new(position, frame.rotation()));
            self.next_id += 1;
            let id = self.next_id;
            events.push(GameEvent::ItemSpawned {
                id,
                lane_value,
                distance,
            });
            let reclaimed = self.pool.insert(ItemInstance {
                id,
                handle,
                spawn_distance: distance,
                position,
                lane_value,
                alive: true,
            });
            if let Some(mut old) = reclaimed {
                old.dispose(&mut *host.backend);
            }
        }

        *last_safe_lane = target;
        count as usize
    }

    /// Dispose items more than `behind` units behind the player
    pub fn retire_left_behind(
        &mut self,
        player_position: Vec3,
        forward: Vec3,
        behind: f32,
        backend: &mut dyn InstanceBackend,
    ) -> usize {
        let stale = self
            .pool
            .ids_where(|item| forward.dot(player_position - item.position) > behind);
        for &id in &stale {
            if let Some(mut item) = self.pool.remove(id) {
                item.dispose(backend);
            }
        }
        stale.len()
    }

    /// Collect items within `radius` of the player's capsule core
    ///
    /// Each pickup reports `score` to the hooks and disposes the instance.
    pub fn collect(
        &mut self,
        segment: (Vec3, Vec3),
        radius: f32,
        score: u32,
        backend: &mut dyn InstanceBackend,
        hooks: &mut dyn RunHooks,
        events: &mut Vec<GameEvent>,
    ) -> u32 {
        let (a, b) = segment;
        let touched = self.pool.ids_where(|item| {
            closest_point_on_segment(a, b, item.position).distance(item.position) <= radius
        });
        let mut collected = 0;
        for id in touched {
            let Some(mut item) = self.pool.remove(id) else {
                continue;
            };
            item.dispose(backend);
            hooks.add_score(score);
            events.push(GameEvent::ItemCollected { id, score });
            collected += 1;
        }
        collected
    }
}
