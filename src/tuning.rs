//! Data-driven game balance
//!
//! Every tunable lives here, grouped by the system that reads it. Values
//! load from JSON; any missing section or field falls back to its default.
//! Pattern tables and the stand-on tolerance are configuration too.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::sim::host::LayerMask;
use crate::sim::path::PathEnd;
use crate::sim::pattern::CatalogConfig;
use crate::sim::player::Capsule;

/// Upper bound on items placed per segment
pub const MAX_ITEMS_PER_SEGMENT: u32 = 32;

/// Errors raised while loading or validating tuning
#[derive(Debug, thiserror::Error)]
pub enum TuningError {
    #[error("failed to read tuning file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid tuning JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid tuning value `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

fn invalid(field: &'static str, reason: impl Into<String>) -> TuningError {
    TuningError::Invalid {
        field,
        reason: reason.into(),
    }
}

/// How lateral input moves the player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LateralMode {
    /// Directional steps between the three lanes
    #[default]
    Lanes,
    /// Continuous axis steering inside `limit_x`
    Free,
}

/// Lane geometry and lateral movement
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LaneTuning {
    pub lane_width: f32,
    /// Exponential approach rate toward the target lane (1/s)
    pub lane_change_sharpness: f32,
    pub lateral_mode: LateralMode,
    /// Free mode speed (units/s at full axis)
    pub side_speed: f32,
    /// Free mode lateral clamp
    pub limit_x: f32,
}

impl Default for LaneTuning {
    fn default() -> Self {
        Self {
            lane_width: 3.0,
            lane_change_sharpness: 12.0,
            lateral_mode: LateralMode::Lanes,
            side_speed: 10.0,
            limit_x: 4.5,
        }
    }
}

/// Player locomotion and collision tolerances
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerTuning {
    /// Path follower speed (units/s)
    pub forward_speed: f32,
    pub start_distance: f64,
    pub jump_force: f32,
    pub gravity: f32,
    pub ground_ray_length: f32,
    pub ground_layer: LayerMask,
    pub roll_duration: f32,
    pub standing_capsule: Capsule,
    pub rolling_capsule: Capsule,
    /// Band below an obstacle's top that still counts as standing on it
    pub stand_on_tolerance: f32,
    /// Share of the hit volume's vertical half extent above its center
    /// taken as the surface to stand on
    pub stand_on_top_fraction: f32,
}

impl Default for PlayerTuning {
    fn default() -> Self {
        Self {
            forward_speed: 12.0,
            start_distance: 0.0,
            jump_force: 8.0,
            gravity: 25.0,
            ground_ray_length: 10.0,
            ground_layer: LayerMask::ALL,
            roll_duration: 0.6,
            standing_capsule: Capsule {
                radius: 0.4,
                height: 2.0,
                center_y: 1.0,
            },
            rolling_capsule: Capsule {
                radius: 0.25,
                height: 0.5,
                center_y: 0.25,
            },
            stand_on_tolerance: 0.05,
            stand_on_top_fraction: 0.5,
        }
    }
}

/// Obstacle scheduling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnerTuning {
    pub min_spacing: f32,
    pub max_spacing: f32,
    /// How far ahead of the player content is kept spawned
    pub lookahead: f32,
    /// Extra distance inserted between patterns
    pub pattern_gap: f32,
    pub initial_spawn_distance: f64,
    /// Maximum live obstacles
    pub capacity: usize,
    /// Placements closer than this to a live obstacle are dropped
    pub min_obstacle_distance: f32,
    pub shrink_scale: f32,
    pub destroy_behind_distance: f32,
    /// Samples for the closest-point fallback when no follower drives the player
    pub closest_t_samples: usize,
    /// Ray origin height above the path for snapping obstacles to the ground
    pub ground_probe_height: f32,
    pub ground_probe_length: f32,
    pub ground_layer: LayerMask,
}

impl Default for SpawnerTuning {
    fn default() -> Self {
        Self {
            min_spacing: 4.0,
            max_spacing: 8.0,
            lookahead: 50.0,
            pattern_gap: 5.0,
            initial_spawn_distance: 5.0,
            capacity: 300,
            min_obstacle_distance: 1.0,
            shrink_scale: 0.85,
            destroy_behind_distance: 5.0,
            closest_t_samples: 50,
            ground_probe_height: 10.0,
            ground_probe_length: 20.0,
            ground_layer: LayerMask::ALL,
        }
    }
}

/// Collectible placement
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemTuning {
    pub enabled: bool,
    pub template: String,
    pub items_per_segment: u32,
    /// Height above the ground
    pub hover_height: f32,
    pub pickup_radius: f32,
    pub score_value: u32,
    pub capacity: usize,
    pub destroy_behind_distance: f32,
}

impl Default for ItemTuning {
    fn default() -> Self {
        Self {
            enabled: true,
            template: "coin".to_string(),
            items_per_segment: 3,
            hover_height: 0.5,
            pickup_radius: 0.8,
            score_value: 100,
            capacity: 150,
            destroy_behind_distance: 5.0,
        }
    }
}

/// Impulse applied when the player dies
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Knockback {
    pub backward: f32,
    pub upward: f32,
}

/// Death sequence pacing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeathTuning {
    /// Real-time seconds before the level restarts on its own
    pub restart_delay: f32,
    /// Slow-motion factor the host applies after death
    pub time_scale: f32,
    pub knockback: Option<Knockback>,
    /// Falling below this height kills
    pub kill_plane_height: Option<f32>,
}

impl Default for DeathTuning {
    fn default() -> Self {
        Self {
            restart_delay: 1.0,
            time_scale: 0.3,
            knockback: Some(Knockback {
                backward: 3.0,
                upward: 4.0,
            }),
            kill_plane_height: Some(-20.0),
        }
    }
}

/// Complete tuning set for a run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    pub seed: u64,
    pub path_end: PathEnd,
    pub lanes: LaneTuning,
    pub player: PlayerTuning,
    pub spawner: SpawnerTuning,
    pub items: ItemTuning,
    pub death: DeathTuning,
    pub catalog: CatalogConfig,
}

impl Tuning {
    /// Parse and validate a JSON document
    pub fn from_json_str(json: &str) -> Result<Self, TuningError> {
        let tuning: Tuning = serde_json::from_str(json)?;
        tuning.validate()?;
        Ok(tuning)
    }

    /// Read, parse and validate a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TuningError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| TuningError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let tuning = Self::from_json_str(&json)?;
        log::info!("Loaded tuning from {}", path.display());
        Ok(tuning)
    }

    pub fn to_json_pretty(&self) -> Result<String, TuningError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject values the simulation cannot run with
    ///
    /// Zero spacing and gaps are accepted: the per-tick spawn cap keeps a
    /// non-advancing cursor from stalling the loop.
    pub fn validate(&self) -> Result<(), TuningError> {
        let s = &self.spawner;
        if !(self.lanes.lane_width > 0.0) {
            return Err(invalid("lanes.lane_width", "must be positive"));
        }
        if s.min_spacing < 0.0 || s.max_spacing < 0.0 {
            return Err(invalid("spawner.min_spacing", "spacing cannot be negative"));
        }
        if s.min_spacing > s.max_spacing {
            return Err(invalid(
                "spawner.max_spacing",
                format!("{} is below min_spacing {}", s.max_spacing, s.min_spacing),
            ));
        }
        if s.pattern_gap < 0.0 {
            return Err(invalid("spawner.pattern_gap", "cannot be negative"));
        }
        if s.capacity == 0 {
            return Err(invalid("spawner.capacity", "must be at least 1"));
        }
        if s.closest_t_samples < 2 {
            return Err(invalid("spawner.closest_t_samples", "needs at least 2 samples"));
        }
        if self.player.roll_duration < 0.0 {
            return Err(invalid("player.roll_duration", "cannot be negative"));
        }
        if self.player.stand_on_tolerance < 0.0 {
            return Err(invalid("player.stand_on_tolerance", "cannot be negative"));
        }
        if !(0.0..=1.0).contains(&self.player.stand_on_top_fraction) {
            return Err(invalid("player.stand_on_top_fraction", "must be within [0, 1]"));
        }
        if self.death.restart_delay < 0.0 {
            return Err(invalid("death.restart_delay", "cannot be negative"));
        }
        if self.items.items_per_segment > MAX_ITEMS_PER_SEGMENT {
            return Err(invalid(
                "items.items_per_segment",
                format!("at most {MAX_ITEMS_PER_SEGMENT}"),
            ));
        }
        if self.catalog.patterns.is_empty() {
            return Err(invalid("catalog.patterns", "at least one pattern is required"));
        }
        if let Some(i) = self
            .catalog
            .patterns
            .iter()
            .position(|p| p.row_count() == 0)
        {
            return Err(invalid("catalog.patterns", format!("pattern {i} has no rows")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let tuning = Tuning::default();
        assert!(tuning.validate().is_ok());
        assert_eq!(tuning.spawner.capacity, 300);
        assert_eq!(tuning.catalog.patterns.len(), 8);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let tuning = Tuning::from_json_str(
            r#"{ "seed": 7, "player": { "stand_on_tolerance": 0.1 }, "lanes": { "lateral_mode": "free" } }"#,
        )
        .unwrap();
        assert_eq!(tuning.seed, 7);
        assert_eq!(tuning.player.stand_on_tolerance, 0.1);
        assert_eq!(tuning.player.jump_force, 8.0);
        assert_eq!(tuning.lanes.lateral_mode, LateralMode::Free);
    }

    #[test]
    fn test_rejects_inverted_spacing() {
        let err = Tuning::from_json_str(r#"{ "spawner": { "min_spacing": 9.0, "max_spacing": 2.0 } }"#)
            .unwrap_err();
        assert!(matches!(err, TuningError::Invalid { field: "spawner.max_spacing", .. }));
    }

    #[test]
    fn test_zero_gaps_are_valid() {
        let tuning = Tuning::from_json_str(
            r#"{ "spawner": { "min_spacing": 0.0, "max_spacing": 0.0, "pattern_gap": 0.0 } }"#,
        );
        assert!(tuning.is_ok());
    }

    #[test]
    fn test_rejects_empty_patterns() {
        let err = Tuning::from_json_str(r#"{ "catalog": { "patterns": [[]], "categories": [] } }"#)
            .unwrap_err();
        assert!(matches!(err, TuningError::Invalid { field: "catalog.patterns", .. }));
    }

    #[test]
    fn test_rejects_top_fraction_out_of_range() {
        let err = Tuning::from_json_str(r#"{ "player": { "stand_on_top_fraction": 1.5 } }"#)
            .unwrap_err();
        assert!(matches!(err, TuningError::Invalid { field: "player.stand_on_top_fraction", .. }));
        assert_eq!(Tuning::default().player.stand_on_top_fraction, 0.5);
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(Tuning::from_json_str("{ nope"), Err(TuningError::Parse(_))));
    }

    #[test]
    fn test_missing_file() {
        let err = Tuning::load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, TuningError::Io { .. }));
        assert!(err.to_string().contains("/definitely/not/here.json"));
    }

    #[test]
    fn test_json_round_trip_keeps_patterns() {
        let tuning = Tuning::default();
        let json = tuning.to_json_pretty().unwrap();
        let back = Tuning::from_json_str(&json).unwrap();
        assert_eq!(back.catalog, tuning.catalog);
    }
}
