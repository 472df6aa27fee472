//! Obstacle scheduling
//!
//! The scheduler walks a spawn cursor forward along the path in arc-length
//! distance, reading pattern rows and turning occupied cells into obstacle
//! instances. It keeps content spawned up to a lookahead range in front of the
//! player, bounded by the pool capacity and a hard per-tick iteration cap.

use std::f32::consts::PI;

use glam::{Quat, Vec3};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::host::{Host, InstanceBackend, Pose};
use super::items::ItemPlacer;
use super::obstacle::{ObstacleInstance, Placement};
use super::path::PathCurve;
use super::pattern::{PatternCatalog, PatternRow, cell_placement};
use super::state::GameEvent;
use crate::UP;
use crate::consts::{CENTER_LANE, SPAWN_ITERATION_CAP};
use crate::tuning::Tuning;

/// Entries an [`ActivePool`] can hold
pub trait Pooled {
    fn id(&self) -> u32;
    /// Arc distance the entry was spawned at (smallest is reclaimed first)
    fn spawn_distance(&self) -> f64;
}

impl Pooled for ObstacleInstance {
    fn id(&self) -> u32 {
        self.id
    }

    fn spawn_distance(&self) -> f64 {
        self.spawn_distance
    }
}

/// Bounded set of live entries, kept in insertion (id) order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivePool<T> {
    entries: Vec<T>,
    capacity: usize,
}

impl<T: Pooled> ActivePool<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }

    pub fn get(&self, id: u32) -> Option<&T> {
        self.entries.iter().find(|e| e.id() == id)
    }

    /// Add an entry; a full pool first gives up its oldest entry, returned
    /// so the caller can dispose it
    pub fn insert(&mut self, entry: T) -> Option<T> {
        let reclaimed = if self.is_full() {
            self.reclaim_oldest()
        } else {
            None
        };
        self.entries.push(entry);
        reclaimed
    }

    /// Remove the entry with the smallest spawn distance
    pub fn reclaim_oldest(&mut self) -> Option<T> {
        let index = self
            .entries
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| a.spawn_distance().total_cmp(&b.spawn_distance()))
            .map(|(i, _)| i)?;
        Some(self.entries.remove(index))
    }

    /// Remove by id; removing an absent id is a no-op
    pub fn remove(&mut self, id: u32) -> Option<T> {
        match self.entries.iter().position(|e| e.id() == id) {
            Some(index) => Some(self.entries.remove(index)),
            None => {
                log::trace!("Pool remove of absent entry {id} ignored");
                None
            }
        }
    }

    /// Ids of entries matching `pred`, in pool order
    pub fn ids_where(&self, mut pred: impl FnMut(&T) -> bool) -> Vec<u32> {
        self.entries
            .iter()
            .filter(|e| pred(e))
            .map(|e| e.id())
            .collect()
    }
}

/// Where the scheduler is within the pattern sequence
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpawnCursor {
    /// Only ever moves forward
    pub next_spawn_distance: f64,
    pub pattern_index: Option<usize>,
    pub row_index: usize,
    /// Target lane of the last item segment (0..=2)
    pub last_safe_lane: u8,
}

impl SpawnCursor {
    pub fn new(start_distance: f64) -> Self {
        Self {
            next_spawn_distance: start_distance,
            pattern_index: None,
            row_index: 0,
            last_safe_lane: CENTER_LANE,
        }
    }
}

/// Where the player is, as the scheduler sees it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerAnchor {
    pub position: Vec3,
    /// Arc distance from a path follower, when one drives the player
    pub follower_distance: Option<f64>,
}

impl PlayerAnchor {
    /// Follower distance, else the closest sampled point on the curve
    pub fn distance(&self, curve: &PathCurve, samples: usize) -> f64 {
        self.follower_distance
            .unwrap_or_else(|| curve.distance_of(self.position, samples))
    }
}

/// Spawns, reclaims and retires obstacles ahead of the player
#[derive(Debug, Clone)]
pub struct ObstacleScheduler {
    rng: Pcg32,
    catalog: PatternCatalog,
    cursor: SpawnCursor,
    pool: ActivePool<ObstacleInstance>,
    items: Option<ItemPlacer>,
    next_id: u32,
    warned_missing: bool,
}

impl ObstacleScheduler {
    pub fn new(catalog: PatternCatalog, tuning: &Tuning) -> Self {
        let mut rng = Pcg32::seed_from_u64(tuning.seed);
        let mut cursor = SpawnCursor::new(tuning.spawner.initial_spawn_distance);
        cursor.pattern_index = catalog.pick_pattern(&mut rng);
        let items = tuning
            .items
            .enabled
            .then(|| ItemPlacer::new(tuning.seed, tuning.items.capacity));
        Self {
            rng,
            catalog,
            cursor,
            pool: ActivePool::new(tuning.spawner.capacity),
            items,
            next_id: 0,
            warned_missing: false,
        }
    }

    pub fn catalog(&self) -> &PatternCatalog {
        &self.catalog
    }

    pub fn cursor(&self) -> &SpawnCursor {
        &self.cursor
    }

    pub fn pool(&self) -> &ActivePool<ObstacleInstance> {
        &self.pool
    }

    pub fn items(&self) -> Option<&ItemPlacer> {
        self.items.as_ref()
    }

    pub fn items_mut(&mut self) -> Option<&mut ItemPlacer> {
        self.items.as_mut()
    }

    /// One spawn pass; a missing curve or player makes it a no-op
    ///
    /// Returns the number of cursor steps taken.
    pub fn update(
        &mut self,
        curve: Option<&PathCurve>,
        player: Option<PlayerAnchor>,
        tuning: &Tuning,
        host: &mut Host<'_>,
        events: &mut Vec<GameEvent>,
    ) -> u32 {
        let (Some(curve), Some(player)) = (curve, player) else {
            if !self.warned_missing {
                log::warn!("Scheduler has no path or player; skipping spawn pass");
                self.warned_missing = true;
            }
            return 0;
        };
        let distance = player.distance(curve, tuning.spawner.closest_t_samples);
        self.spawn_pass(distance, curve, tuning, host, events)
    }

    /// Spawn until the cursor is past the lookahead range
    pub fn spawn_pass(
        &mut self,
        player_distance: f64,
        curve: &PathCurve,
        tuning: &Tuning,
        host: &mut Host<'_>,
        events: &mut Vec<GameEvent>,
    ) -> u32 {
        let horizon = player_distance + tuning.spawner.lookahead as f64;
        let mut steps = 0;
        while self.cursor.next_spawn_distance < horizon && !self.pool.is_full() {
            if steps >= SPAWN_ITERATION_CAP {
                log::warn!(
                    "Spawn pass hit the {SPAWN_ITERATION_CAP} iteration cap at distance {:.1}",
                    self.cursor.next_spawn_distance
                );
                break;
            }
            steps += 1;
            if !self.spawn_next(curve, tuning, host, events) {
                break;
            }
        }
        steps
    }

    /// Advance the cursor one step; false when there is nothing to spawn from
    fn spawn_next(
        &mut self,
        curve: &PathCurve,
        tuning: &Tuning,
        host: &mut Host<'_>,
        events: &mut Vec<GameEvent>,
    ) -> bool {
        let Some(pattern) = self
            .cursor
            .pattern_index
            .and_then(|i| self.catalog.pattern(i))
        else {
            return false;
        };

        let Some(row) = pattern.row(self.cursor.row_index).copied() else {
            self.cursor.row_index = 0;
            self.cursor.pattern_index = self.catalog.pick_pattern(&mut self.rng);
            self.cursor.next_spawn_distance += tuning.spawner.pattern_gap as f64;
            return true;
        };

        let spacing = &tuning.spawner;
        let (lo, hi) = (
            spacing.min_spacing.min(spacing.max_spacing),
            spacing.min_spacing.max(spacing.max_spacing),
        );
        let gap = self.rng.random_range(lo..=hi) as f64;
        let distance = self.cursor.next_spawn_distance;

        if let Some(items) = self.items.as_mut() {
            items.place_segment(
                &mut self.cursor.last_safe_lane,
                &row,
                distance,
                distance + gap,
                curve,
                tuning,
                host,
                events,
            );
        }
        self.spawn_row(&row, distance, curve, tuning, host, events);

        self.cursor.next_spawn_distance += gap;
        self.cursor.row_index += 1;
        true
    }

    /// Turn the occupied cells of one row into instances at `distance`
    ///
    /// Returns how many instances were created.
    pub fn spawn_row(
        &mut self,
        row: &PatternRow,
        distance: f64,
        curve: &PathCurve,
        tuning: &Tuning,
        host: &mut Host<'_>,
        events: &mut Vec<GameEvent>,
    ) -> usize {
        let spawner = &tuning.spawner;
        let frame = curve.pose_at_distance(distance);
        let path_rotation = frame.rotation();
        let mut spawned = 0;

        for (lane, &type_id) in row.iter().enumerate() {
            let Some((offset, mirrored)) = cell_placement(type_id, lane) else {
                continue;
            };
            let Some(variant) = self.catalog.pick_variant(type_id, &mut self.rng) else {
                log::warn!("No variants registered for obstacle type {type_id}; cell skipped");
                continue;
            };

            let mut position = frame.lateral(offset * tuning.lanes.lane_width);
            let probe = position + UP * spawner.ground_probe_height;
            if let Some(height) =
                host.ground
                    .raycast_down(probe, spawner.ground_probe_length, spawner.ground_layer)
            {
                position.y = height;
            }

            if self
                .pool
                .iter()
                .any(|o| o.position().distance(position) < spawner.min_obstacle_distance)
            {
                log::debug!("Placement of type {type_id} at {distance:.1} too close; dropped");
                continue;
            }

            let mut rotation = path_rotation * Quat::from_rotation_y(variant.yaw_degrees.to_radians());
            if mirrored {
                rotation *= Quat::from_rotation_y(PI);
            }
            let pose = Pose::new(position, rotation);
            let handle = host.backend.instantiate(&variant.template, pose);

            self.next_id += 1;
            let instance = ObstacleInstance::new(
                self.next_id,
                handle,
                Placement {
                    type_id,
                    lane: lane as u8,
                    variant,
                    pose,
                    spawn_distance: distance,
                    rollable: self.catalog.is_rollable(type_id),
                },
                spawner.shrink_scale,
                spawner.destroy_behind_distance,
            );
            events.push(GameEvent::ObstacleSpawned {
                id: instance.id,
                type_id,
                lane: lane as u8,
                distance,
            });
            if let Some(mut old) = self.pool.insert(instance) {
                old.dispose(&mut *host.backend);
                log::debug!("Pool full; reclaimed obstacle {}", old.id);
                events.push(GameEvent::ObstacleReclaimed { id: old.id });
            }
            spawned += 1;
        }

        if spawned > 0 {
            log::debug!("Row {row:?} at {distance:.1}: {spawned} obstacles");
        }
        spawned
    }

    /// Drop an instance from the pool and dispose it; unknown ids are a no-op
    pub fn notify_destroyed(
        &mut self,
        id: u32,
        backend: &mut dyn InstanceBackend,
        events: &mut Vec<GameEvent>,
    ) -> bool {
        match self.pool.remove(id) {
            Some(mut instance) => {
                instance.dispose(backend);
                events.push(GameEvent::ObstacleRetired { id });
                true
            }
            None => false,
        }
    }

    /// Retire every instance the player has left behind
    pub fn retire_left_behind(
        &mut self,
        player_position: Vec3,
        forward: Vec3,
        backend: &mut dyn InstanceBackend,
        events: &mut Vec<GameEvent>,
    ) -> usize {
        let behind = self
            .pool
            .ids_where(|o| o.is_left_behind(player_position, forward));
        for &id in &behind {
            self.notify_destroyed(id, backend, events);
        }
        behind.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::host::{FlatGround, HeadlessBackend, InstanceHandle, RecordingHooks};
    use crate::sim::pattern::Pattern;

    fn no_items() -> Tuning {
        let mut tuning = Tuning::default();
        tuning.items.enabled = false;
        tuning
    }

    fn scheduler_with(patterns: Vec<Vec<PatternRow>>, tuning: &Tuning) -> ObstacleScheduler {
        let catalog = PatternCatalog::new(
            patterns.into_iter().map(Pattern::new).collect(),
            crate::sim::pattern::standard_categories(),
        );
        ObstacleScheduler::new(catalog, tuning)
    }

    #[derive(Debug)]
    struct Entry(u32, f64);

    impl Pooled for Entry {
        fn id(&self) -> u32 {
            self.0
        }
        fn spawn_distance(&self) -> f64 {
            self.1
        }
    }

    #[test]
    fn test_pool_reclaims_smallest_distance() {
        let mut pool = ActivePool::new(3);
        assert!(pool.insert(Entry(1, 20.0)).is_none());
        assert!(pool.insert(Entry(2, 10.0)).is_none());
        assert!(pool.insert(Entry(3, 30.0)).is_none());
        let reclaimed = pool.insert(Entry(4, 40.0)).unwrap();
        assert_eq!(reclaimed.0, 2);
        assert_eq!(pool.len(), 3);
    }

    #[test]
    fn test_pool_remove_idempotent() {
        let mut pool = ActivePool::new(4);
        pool.insert(Entry(7, 1.0));
        assert!(pool.remove(7).is_some());
        assert!(pool.remove(7).is_none());
        assert!(pool.is_empty());
    }

    #[test]
    fn test_row_on_straight_path() {
        let tuning = no_items();
        let mut scheduler = scheduler_with(vec![vec![[0, 2, 0]]], &tuning);
        let curve = PathCurve::straight(Vec3::ZERO, Vec3::Z, 200.0);
        let ground = FlatGround::new(0.5);
        let mut backend = HeadlessBackend::new();
        let mut hooks = RecordingHooks::default();
        let mut host = Host::new(&ground, &mut backend, &mut hooks);
        let mut events = Vec::new();

        let n = scheduler.spawn_row(&[0, 2, 0], 40.0, &curve, &tuning, &mut host, &mut events);
        assert_eq!(n, 1);
        let o = scheduler.pool().iter().next().unwrap();
        assert_eq!(o.lane, 1);
        assert!(o.position().x.abs() < 1e-4);
        assert_eq!(o.position().y, 0.5);
        let expected_z = curve.position(curve.distance_to_t(40.0)).z;
        assert!((o.position().z - expected_z).abs() < 1e-3);
        assert!(matches!(events[0], GameEvent::ObstacleSpawned { type_id: 2, lane: 1, .. }));
    }

    #[test]
    fn test_edge_and_wide_placement() {
        let tuning = no_items();
        let mut scheduler = scheduler_with(vec![vec![[3, 3, 3]]], &tuning);
        let curve = PathCurve::straight(Vec3::ZERO, Vec3::Z, 200.0);
        let ground = FlatGround::new(0.0);
        let mut backend = HeadlessBackend::new();
        let mut hooks = RecordingHooks::default();
        let mut host = Host::new(&ground, &mut backend, &mut hooks);
        let mut events = Vec::new();

        assert_eq!(scheduler.spawn_row(&[3, 3, 3], 20.0, &curve, &tuning, &mut host, &mut events), 2);
        let xs: Vec<f32> = scheduler.pool().iter().map(|o| o.position().x).collect();
        assert!((xs[0] + 3.0).abs() < 1e-4);
        assert!((xs[1] - 3.0).abs() < 1e-4);

        assert_eq!(scheduler.spawn_row(&[0, 0, 4], 40.0, &curve, &tuning, &mut host, &mut events), 1);
        let wide = scheduler.pool().iter().last().unwrap();
        assert!((wide.position().x - 1.5).abs() < 1e-4);
    }

    #[test]
    fn test_min_distance_rejects() {
        let tuning = no_items();
        let mut scheduler = scheduler_with(vec![vec![[4, 4, 0]]], &tuning);
        let curve = PathCurve::straight(Vec3::ZERO, Vec3::Z, 200.0);
        let ground = FlatGround::new(0.0);
        let mut backend = HeadlessBackend::new();
        let mut hooks = RecordingHooks::default();
        let mut host = Host::new(&ground, &mut backend, &mut hooks);
        let mut events = Vec::new();

        // Both wide cells land on the same half-lane offset
        assert_eq!(scheduler.spawn_row(&[4, 4, 0], 20.0, &curve, &tuning, &mut host, &mut events), 1);
    }

    #[test]
    fn test_spawn_pass_fills_lookahead() {
        let tuning = no_items();
        let mut scheduler = scheduler_with(vec![vec![[1, 0, 0], [0, 1, 0]]], &tuning);
        let curve = PathCurve::straight(Vec3::ZERO, Vec3::Z, 500.0);
        let ground = FlatGround::new(0.0);
        let mut backend = HeadlessBackend::new();
        let mut hooks = RecordingHooks::default();
        let mut host = Host::new(&ground, &mut backend, &mut hooks);
        let mut events = Vec::new();

        scheduler.spawn_pass(0.0, &curve, &tuning, &mut host, &mut events);
        assert!(scheduler.cursor().next_spawn_distance >= 50.0);
        assert!(!scheduler.pool().is_empty());
        assert!(scheduler.pool().iter().all(|o| o.spawn_distance < 50.0));
        drop(host);
        assert_eq!(backend.live_count(), scheduler.pool().len());
    }

    #[test]
    fn test_zero_gap_hits_iteration_cap() {
        let mut tuning = no_items();
        tuning.spawner.min_spacing = 0.0;
        tuning.spawner.max_spacing = 0.0;
        tuning.spawner.pattern_gap = 0.0;
        let mut scheduler = scheduler_with(vec![vec![[0, 0, 0]]], &tuning);
        let curve = PathCurve::straight(Vec3::ZERO, Vec3::Z, 100.0);
        let ground = FlatGround::new(0.0);
        let mut backend = HeadlessBackend::new();
        let mut hooks = RecordingHooks::default();
        let mut host = Host::new(&ground, &mut backend, &mut hooks);
        let mut events = Vec::new();

        let steps = scheduler.spawn_pass(0.0, &curve, &tuning, &mut host, &mut events);
        assert_eq!(steps, SPAWN_ITERATION_CAP);
    }

    #[test]
    fn test_empty_variant_list_skips_cell() {
        let tuning = no_items();
        let catalog = PatternCatalog::new(vec![Pattern::new(vec![[1, 1, 1]])], Vec::new());
        let mut scheduler = ObstacleScheduler::new(catalog, &tuning);
        let curve = PathCurve::straight(Vec3::ZERO, Vec3::Z, 100.0);
        let ground = FlatGround::new(0.0);
        let mut backend = HeadlessBackend::new();
        let mut hooks = RecordingHooks::default();
        let mut host = Host::new(&ground, &mut backend, &mut hooks);
        let mut events = Vec::new();

        scheduler.spawn_pass(0.0, &curve, &tuning, &mut host, &mut events);
        assert!(scheduler.pool().is_empty());
        assert!(events.is_empty());
    }

    #[test]
    fn test_retire_and_notify_idempotent() {
        let tuning = no_items();
        let mut scheduler = scheduler_with(vec![vec![[0, 1, 0]]], &tuning);
        let curve = PathCurve::straight(Vec3::ZERO, Vec3::Z, 200.0);
        let ground = FlatGround::new(0.0);
        let mut backend = HeadlessBackend::new();
        let mut hooks = RecordingHooks::default();
        let mut events = Vec::new();
        {
            let mut host = Host::new(&ground, &mut backend, &mut hooks);
            scheduler.spawn_row(&[0, 1, 0], 10.0, &curve, &tuning, &mut host, &mut events);
        }
        let id = scheduler.pool().iter().next().unwrap().id;

        assert_eq!(
            scheduler.retire_left_behind(Vec3::new(0.0, 0.0, 12.0), Vec3::Z, &mut backend, &mut events),
            0
        );
        assert_eq!(
            scheduler.retire_left_behind(Vec3::new(0.0, 0.0, 16.0), Vec3::Z, &mut backend, &mut events),
            1
        );
        assert!(!scheduler.notify_destroyed(id, &mut backend, &mut events));
        assert_eq!(backend.live_count(), 0);
        assert!(!backend.is_live(InstanceHandle(1)));
    }

    #[test]
    fn test_full_pool_row_reclaims_oldest() {
        let mut tuning = no_items();
        tuning.spawner.capacity = 4;
        let mut scheduler = scheduler_with(vec![vec![[0, 1, 0]]], &tuning);
        let curve = PathCurve::straight(Vec3::ZERO, Vec3::Z, 200.0);
        let ground = FlatGround::new(0.0);
        let mut backend = HeadlessBackend::new();
        let mut hooks = RecordingHooks::default();
        let mut events = Vec::new();
        {
            let mut host = Host::new(&ground, &mut backend, &mut hooks);
            // Out of order so the oldest is not the first inserted
            for distance in [20.0, 10.0, 30.0, 40.0] {
                scheduler.spawn_row(&[0, 1, 0], distance, &curve, &tuning, &mut host, &mut events);
            }
        }
        assert!(scheduler.pool().is_full());
        let oldest = scheduler
            .pool()
            .iter()
            .find(|o| o.spawn_distance == 10.0)
            .map(|o| (o.id, o.handle))
            .unwrap();
        events.clear();

        {
            let mut host = Host::new(&ground, &mut backend, &mut hooks);
            let n = scheduler.spawn_row(&[0, 1, 0], 50.0, &curve, &tuning, &mut host, &mut events);
            assert_eq!(n, 1);
        }
        assert_eq!(scheduler.pool().len(), 4);
        assert!(scheduler.pool().get(oldest.0).is_none());
        assert!(events.contains(&GameEvent::ObstacleReclaimed { id: oldest.0 }));
        assert!(!backend.is_live(oldest.1));
        assert_eq!(backend.live_count(), 4);
    }

    #[test]
    fn test_missing_references_noop() {
        let tuning = no_items();
        let mut scheduler = scheduler_with(vec![vec![[1, 1, 1]]], &tuning);
        let ground = FlatGround::new(0.0);
        let mut backend = HeadlessBackend::new();
        let mut hooks = RecordingHooks::default();
        let mut host = Host::new(&ground, &mut backend, &mut hooks);
        let mut events = Vec::new();
        let anchor = PlayerAnchor {
            position: Vec3::ZERO,
            follower_distance: Some(0.0),
        };
        assert_eq!(scheduler.update(None, Some(anchor), &tuning, &mut host, &mut events), 0);
        assert!(scheduler.pool().is_empty());
    }

    #[test]
    fn test_same_seed_same_content() {
        let tuning = no_items();
        let curve = PathCurve::straight(Vec3::ZERO, Vec3::Z, 500.0);
        let ground = FlatGround::new(0.0);
        let run = || {
            let mut scheduler = ObstacleScheduler::new(PatternCatalog::standard(), &tuning);
            let mut backend = HeadlessBackend::new();
            let mut hooks = RecordingHooks::default();
            let mut host = Host::new(&ground, &mut backend, &mut hooks);
            let mut events = Vec::new();
            scheduler.spawn_pass(100.0, &curve, &tuning, &mut host, &mut events);
            drop(host);
            backend.spawned
        };
        assert_eq!(run(), run());
    }
}
