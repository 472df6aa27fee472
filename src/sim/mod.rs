//! Deterministic simulation module
//!
//! All runner logic lives here. This module must be pure and deterministic:
//! - Time only advances through explicit tick deltas
//! - Seeded RNG only
//! - Stable iteration order (by entity ID)
//! - No rendering, audio or scene-loading dependencies (those are host ports)

pub mod collision;
pub mod host;
pub mod input;
pub mod items;
pub mod obstacle;
pub mod path;
pub mod pattern;
pub mod player;
pub mod scheduler;
pub mod shapes;
pub mod state;
pub mod tick;
pub mod timer;

pub use collision::{
    Contact, ContactTarget, DeathCause, Resolution, StandOnRule, detect_contacts, resolve_contact,
};
pub use host::{
    DeathPresenter, FlatGround, GroundQuery, HeadlessBackend, Host, InstanceBackend,
    InstanceHandle, LayerMask, Pose, RecordingHooks, RunHooks, SceneTransition, ScoreSink,
};
pub use input::{ButtonEdge, HeldButtons, InputEdges, TickInput};
pub use items::{ItemInstance, ItemPlacer};
pub use obstacle::ObstacleInstance;
pub use path::{PathCurve, PathEnd, PathFollower, PathPose};
pub use pattern::{ObstacleCategory, ObstacleKind, ObstacleVariant, Pattern, PatternCatalog};
pub use player::{Capsule, LocomotionEvents, Player};
pub use scheduler::{ActivePool, ObstacleScheduler, PlayerAnchor, Pooled, SpawnCursor};
pub use shapes::{Aabb, ColliderShape, OrientedBox};
pub use state::{DeathZone, FrameTime, GameEvent, RunPhase, RunnerState};
pub use tick::tick;
pub use timer::Countdown;
