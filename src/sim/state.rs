//! Runner state
//!
//! Everything one run owns: the path and its follower, the player, the
//! scheduler with its pools, the death sequence and the per-tick event log.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::collision::DeathCause;
use super::host::RunHooks;
use super::path::{PathCurve, PathFollower, PathPose};
use super::pattern::{ObstacleTypeId, PatternCatalog};
use super::player::Player;
use super::scheduler::ObstacleScheduler;
use super::shapes::Aabb;
use super::timer::Countdown;
use crate::tuning::Tuning;

/// Run phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunPhase {
    /// Player alive and following the path
    Running,
    /// Death sequence playing; restart timer armed
    Dead,
    /// Restart handed to the scene transition; waiting for teardown
    RestartRequested,
}

/// Region that kills on contact, whatever the player is doing
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DeathZone {
    Volume(Aabb),
    /// Kill plane: feet below this height
    BelowHeight(f32),
}

/// Elapsed time handed to a tick
///
/// `scaled` drives gameplay and honors slow motion; `unscaled` is real time
/// and drives the restart delay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTime {
    pub scaled: f32,
    pub unscaled: f32,
}

impl FrameTime {
    pub fn fixed(dt: f32) -> Self {
        Self {
            scaled: dt,
            unscaled: dt,
        }
    }

    pub fn with_scale(dt: f32, time_scale: f32) -> Self {
        Self {
            scaled: dt * time_scale.max(0.0),
            unscaled: dt,
        }
    }
}

/// Something that happened during a tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum GameEvent {
    ObstacleSpawned {
        id: u32,
        type_id: ObstacleTypeId,
        lane: u8,
        distance: f64,
    },
    ObstacleRetired {
        id: u32,
    },
    /// Dropped to keep the pool under capacity
    ObstacleReclaimed {
        id: u32,
    },
    ItemSpawned {
        id: u32,
        lane_value: f32,
        distance: f64,
    },
    ItemCollected {
        id: u32,
        score: u32,
    },
    PlayerJumped,
    RollStarted,
    RollEnded,
    PlayerDied {
        cause: DeathCause,
    },
    RestartRequested,
}

/// Complete state of one run
#[derive(Debug, Clone)]
pub struct RunnerState {
    pub tuning: Tuning,
    pub curve: PathCurve,
    pub follower: PathFollower,
    /// Arc distance of the player's body; leaves the follower during knockback
    pub body_distance: f64,
    pub player: Player,
    pub scheduler: ObstacleScheduler,
    pub death_zones: Vec<DeathZone>,
    pub phase: RunPhase,
    pub death_cause: Option<DeathCause>,
    /// Runs on unscaled time
    pub restart_timer: Countdown,
    /// Slow-motion factor the host should apply to gameplay time
    pub time_scale: f32,
    pub time_ticks: u64,
    /// Scaled seconds survived
    pub time_alive: f32,
    /// Events of the most recent tick
    pub events: Vec<GameEvent>,
}

impl RunnerState {
    pub fn new(tuning: Tuning, curve: PathCurve) -> Self {
        let catalog = PatternCatalog::from_config(&tuning.catalog);
        let scheduler = ObstacleScheduler::new(catalog, &tuning);
        let start = tuning.player.start_distance;
        let follower = PathFollower::new(start, tuning.player.forward_speed);
        let start_height = curve.pose_at_distance(start).position.y;
        let player = Player::new(&tuning, start_height);
        let death_zones = tuning
            .death
            .kill_plane_height
            .map(DeathZone::BelowHeight)
            .into_iter()
            .collect();

        log::info!(
            "Run started: seed {}, path length {:.1}",
            tuning.seed,
            curve.arc_length()
        );
        Self {
            tuning,
            curve,
            follower,
            body_distance: start,
            player,
            scheduler,
            death_zones,
            phase: RunPhase::Running,
            death_cause: None,
            restart_timer: Countdown::default(),
            time_scale: 1.0,
            time_ticks: 0,
            time_alive: 0.0,
            events: Vec::new(),
        }
    }

    pub fn with_death_zone(mut self, zone: DeathZone) -> Self {
        self.death_zones.push(zone);
        self
    }

    #[inline]
    pub fn is_dead(&self) -> bool {
        !self.player.alive
    }

    /// Path frame under the player
    pub fn player_frame(&self) -> PathPose {
        self.curve.pose_at_distance(self.body_distance)
    }

    /// Player feet in world space
    pub fn player_position(&self) -> Vec3 {
        self.player.world_position(&self.player_frame())
    }

    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    /// Terminal death transition; later calls are no-ops
    pub fn kill(&mut self, cause: DeathCause, hooks: &mut dyn RunHooks) {
        if !self.player.alive {
            return;
        }
        self.player.kill(&self.tuning);
        self.follower.detach();
        self.phase = RunPhase::Dead;
        self.death_cause = Some(cause);
        self.time_scale = self.tuning.death.time_scale;
        self.restart_timer.start(self.tuning.death.restart_delay);
        hooks.show_death(cause);
        self.events.push(GameEvent::PlayerDied { cause });
        log::info!(
            "Player died at distance {:.1}: {:?}",
            self.body_distance,
            cause
        );
    }

    /// Ask for a level reload; only the first request after death counts
    pub fn request_restart(&mut self, hooks: &mut dyn RunHooks) {
        if self.phase != RunPhase::Dead {
            return;
        }
        self.phase = RunPhase::RestartRequested;
        self.restart_timer.cancel();
        self.time_scale = 1.0;
        hooks.restart_level();
        self.events.push(GameEvent::RestartRequested);
        log::info!("Restart requested");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::host::RecordingHooks;

    fn state() -> RunnerState {
        RunnerState::new(
            Tuning::default(),
            PathCurve::straight(Vec3::ZERO, Vec3::Z, 300.0),
        )
    }

    #[test]
    fn test_new_state() {
        let s = state();
        assert_eq!(s.phase, RunPhase::Running);
        assert!(s.player.alive);
        assert_eq!(s.time_scale, 1.0);
        assert_eq!(s.death_zones, vec![DeathZone::BelowHeight(-20.0)]);
        assert_eq!(s.player_position(), Vec3::ZERO);
    }

    #[test]
    fn test_kill_is_idempotent() {
        let mut s = state();
        let mut hooks = RecordingHooks::default();
        let cause = DeathCause::DeathZone { index: 0 };
        s.kill(cause, &mut hooks);
        s.kill(DeathCause::Obstacle { id: 3, type_id: 1 }, &mut hooks);
        assert_eq!(hooks.deaths, vec![cause]);
        assert_eq!(s.death_cause, Some(cause));
        assert!(!s.follower.attached);
        assert_eq!(s.time_scale, s.tuning.death.time_scale);
        assert!(s.restart_timer.is_armed());
    }

    #[test]
    fn test_restart_once() {
        let mut s = state();
        let mut hooks = RecordingHooks::default();
        s.request_restart(&mut hooks);
        assert_eq!(hooks.restarts, 0);

        s.kill(DeathCause::DeathZone { index: 0 }, &mut hooks);
        s.request_restart(&mut hooks);
        s.request_restart(&mut hooks);
        assert_eq!(hooks.restarts, 1);
        assert_eq!(s.time_scale, 1.0);
        assert!(!s.restart_timer.is_armed());
    }

    #[test]
    fn test_frame_time_scale() {
        let t = FrameTime::with_scale(0.01, 0.3);
        assert!((t.scaled - 0.003).abs() < 1e-7);
        assert_eq!(t.unscaled, 0.01);
        assert_eq!(FrameTime::fixed(0.5).scaled, 0.5);
    }
}
