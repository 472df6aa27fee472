//! Host ports
//!
//! The simulation never talks to an engine directly. Ground raycasts,
//! instance creation, death presentation, scoring and scene reloads are
//! reached through the traits here and bundled into a [`Host`] per tick.
//! Deterministic implementations for tests and the headless driver live at
//! the bottom of the module.

use std::collections::BTreeSet;

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use super::collision::DeathCause;

/// Bit mask selecting which surface layers a query may hit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerMask(pub u32);

impl LayerMask {
    pub const ALL: LayerMask = LayerMask(u32::MAX);
    pub const NONE: LayerMask = LayerMask(0);

    #[inline]
    pub fn intersects(self, other: LayerMask) -> bool {
        self.0 & other.0 != 0
    }
}

impl Default for LayerMask {
    fn default() -> Self {
        LayerMask::ALL
    }
}

/// World placement of an instance
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Pose {
    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    #[inline]
    pub fn transform_point(&self, local: Vec3) -> Vec3 {
        self.position + self.rotation * local
    }
}

/// Opaque handle to an instance created by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InstanceHandle(pub u64);

/// Downward ray query against the ground (and anything on the masked layers)
pub trait GroundQuery {
    /// Height of the nearest surface below `origin` within `max_distance`
    fn raycast_down(&self, origin: Vec3, max_distance: f32, mask: LayerMask) -> Option<f32>;
}

impl<F> GroundQuery for F
where
    F: Fn(Vec3, f32, LayerMask) -> Option<f32>,
{
    fn raycast_down(&self, origin: Vec3, max_distance: f32, mask: LayerMask) -> Option<f32> {
        self(origin, max_distance, mask)
    }
}

/// Creates and disposes posed instances of named templates
pub trait InstanceBackend {
    fn instantiate(&mut self, template: &str, pose: Pose) -> InstanceHandle;
    /// Disposing an unknown or already disposed handle must be a no-op
    fn dispose(&mut self, handle: InstanceHandle);
}

/// Fire-and-forget death visuals (fade, shake)
pub trait DeathPresenter {
    fn show_death(&mut self, cause: DeathCause);
}

/// Receives points for collected items
pub trait ScoreSink {
    fn add_score(&mut self, amount: u32);
}

/// Reloads the current level
pub trait SceneTransition {
    fn restart_level(&mut self);
}

/// All outward notifications a run produces
pub trait RunHooks: DeathPresenter + ScoreSink + SceneTransition {}

impl<T: DeathPresenter + ScoreSink + SceneTransition> RunHooks for T {}

/// Collaborators handed to a tick
pub struct Host<'a> {
    pub ground: &'a dyn GroundQuery,
    pub backend: &'a mut dyn InstanceBackend,
    pub hooks: &'a mut dyn RunHooks,
}

impl<'a> Host<'a> {
    pub fn new(
        ground: &'a dyn GroundQuery,
        backend: &'a mut dyn InstanceBackend,
        hooks: &'a mut dyn RunHooks,
    ) -> Self {
        Self {
            ground,
            backend,
            hooks,
        }
    }
}

/// Infinite horizontal ground plane on a single layer
#[derive(Debug, Clone, Copy)]
pub struct FlatGround {
    pub height: f32,
    pub layer: LayerMask,
}

impl FlatGround {
    pub fn new(height: f32) -> Self {
        Self {
            height,
            layer: LayerMask(1),
        }
    }
}

impl GroundQuery for FlatGround {
    fn raycast_down(&self, origin: Vec3, max_distance: f32, mask: LayerMask) -> Option<f32> {
        if !mask.intersects(self.layer) {
            return None;
        }
        let drop = origin.y - self.height;
        (drop >= 0.0 && drop <= max_distance).then_some(self.height)
    }
}

/// Backend that only hands out handles and tracks which are live
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    next: u64,
    live: BTreeSet<InstanceHandle>,
    /// Templates instantiated, in order
    pub spawned: Vec<String>,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn is_live(&self, handle: InstanceHandle) -> bool {
        self.live.contains(&handle)
    }
}

impl InstanceBackend for HeadlessBackend {
    fn instantiate(&mut self, template: &str, _pose: Pose) -> InstanceHandle {
        self.next += 1;
        let handle = InstanceHandle(self.next);
        self.live.insert(handle);
        self.spawned.push(template.to_string());
        handle
    }

    fn dispose(&mut self, handle: InstanceHandle) {
        self.live.remove(&handle);
    }
}

/// Hooks that record everything they receive
#[derive(Debug, Default, Clone, Serialize)]
pub struct RecordingHooks {
    pub deaths: Vec<DeathCause>,
    pub score: u64,
    pub pickups: u32,
    pub restarts: u32,
}

impl DeathPresenter for RecordingHooks {
    fn show_death(&mut self, cause: DeathCause) {
        self.deaths.push(cause);
    }
}

impl ScoreSink for RecordingHooks {
    fn add_score(&mut self, amount: u32) {
        self.score += amount as u64;
        self.pickups += 1;
    }
}

impl SceneTransition for RecordingHooks {
    fn restart_level(&mut self) {
        self.restarts += 1;
    }
}
