//! Obstacle patterns and the template registry
//!
//! A pattern is a fixed rows x 3 matrix of obstacle type ids; 0 means the
//! cell is empty. The registry maps each type id to a category holding the
//! template variants a cell may spawn as.

use std::collections::BTreeMap;

use glam::Vec3;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::shapes::{Aabb, ColliderShape};
use crate::consts::{CENTER_LANE, LANE_COUNT};

/// Cell value in a pattern
pub type ObstacleTypeId = u8;

/// One row of a pattern, indexed by lane
pub type PatternRow = [ObstacleTypeId; LANE_COUNT];

/// The closed set of placement behaviors a type id can have
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObstacleKind {
    Empty,
    /// Generic full-height wall
    Wall,
    /// Low barrier, cleared by jumping
    Low,
    /// Only placed on the outer lanes; the right one is mirrored
    EdgeOnly,
    /// Spans two lanes, placed at a half-lane offset
    Wide,
    /// Overhead barrier, passed by rolling
    High,
}

impl ObstacleKind {
    pub fn from_id(id: ObstacleTypeId) -> Option<Self> {
        match id {
            0 => Some(ObstacleKind::Empty),
            1 => Some(ObstacleKind::Wall),
            2 => Some(ObstacleKind::Low),
            3 => Some(ObstacleKind::EdgeOnly),
            4 => Some(ObstacleKind::Wide),
            5 => Some(ObstacleKind::High),
            _ => None,
        }
    }

    pub fn id(self) -> ObstacleTypeId {
        match self {
            ObstacleKind::Empty => 0,
            ObstacleKind::Wall => 1,
            ObstacleKind::Low => 2,
            ObstacleKind::EdgeOnly => 3,
            ObstacleKind::Wide => 4,
            ObstacleKind::High => 5,
        }
    }

    /// Placement behavior for an arbitrary id; unknown ids place like walls
    pub fn placement_of(id: ObstacleTypeId) -> Self {
        Self::from_id(id).unwrap_or(ObstacleKind::Wall)
    }
}

/// Lanes whose cell in `row` is empty
pub fn safe_lanes(row: &PatternRow) -> Vec<u8> {
    row.iter()
        .enumerate()
        .filter(|(_, id)| **id == 0)
        .map(|(lane, _)| lane as u8)
        .collect()
}

/// Lateral offset (in lane widths) and mirroring for an occupied cell
///
/// Returns None when the cell does not spawn anything.
pub fn cell_placement(id: ObstacleTypeId, lane: usize) -> Option<(f32, bool)> {
    if id == 0 {
        return None;
    }
    match ObstacleKind::placement_of(id) {
        ObstacleKind::EdgeOnly if lane == CENTER_LANE as usize => None,
        ObstacleKind::EdgeOnly => Some((lane as f32 - 1.0, lane == LANE_COUNT - 1)),
        ObstacleKind::Wide => {
            let offset = if lane == LANE_COUNT - 1 { 0.5 } else { -0.5 };
            Some((offset, false))
        }
        _ => Some((lane as f32 - 1.0, false)),
    }
}

/// A fixed rows x 3 block of obstacle ids
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pattern {
    rows: Vec<PatternRow>,
}

impl Pattern {
    pub fn new(rows: Vec<PatternRow>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[PatternRow] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn row(&self, index: usize) -> Option<&PatternRow> {
        self.rows.get(index)
    }
}

/// One spawnable template for a category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObstacleVariant {
    /// Template name handed to the instance backend
    pub template: String,
    /// Local bounds of the visual geometry
    #[serde(default)]
    pub visual_bounds: Vec<Aabb>,
    /// Native colliders (shrunk at spawn)
    #[serde(default)]
    pub colliders: Vec<ColliderShape>,
    /// Template's own yaw, applied on top of the path rotation
    #[serde(default)]
    pub yaw_degrees: f32,
}

impl ObstacleVariant {
    /// Combined local bounds: visuals first, colliders otherwise, unit cube
    /// around the pivot as a last resort
    pub fn local_bounds(&self) -> Aabb {
        Aabb::union_all(&self.visual_bounds)
            .or_else(|| {
                let collider_bounds: Vec<Aabb> =
                    self.colliders.iter().map(|c| c.local_bounds()).collect();
                Aabb::union_all(&collider_bounds)
            })
            .unwrap_or_else(|| Aabb::from_center_size(Vec3::ZERO, Vec3::ONE))
    }

    fn boxed(template: &str, center: Vec3, size: Vec3) -> Self {
        Self {
            template: template.to_string(),
            visual_bounds: vec![Aabb::from_center_size(center, size)],
            colliders: vec![ColliderShape::Box { center, size }],
            yaw_degrees: 0.0,
        }
    }
}

/// Registry entry for one type id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObstacleCategory {
    pub id: ObstacleTypeId,
    pub name: String,
    /// Rolling players pass through instances of this category
    #[serde(default)]
    pub rollable: bool,
    /// May be empty; such cells are skipped
    #[serde(default)]
    pub variants: Vec<ObstacleVariant>,
}

/// Serializable catalog description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogConfig {
    pub patterns: Vec<Pattern>,
    pub categories: Vec<ObstacleCategory>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            patterns: standard_patterns(),
            categories: standard_categories(),
        }
    }
}

/// Read-only pattern table plus type id registry
#[derive(Debug, Clone)]
pub struct PatternCatalog {
    patterns: Vec<Pattern>,
    categories: BTreeMap<ObstacleTypeId, ObstacleCategory>,
}

impl PatternCatalog {
    pub fn new(patterns: Vec<Pattern>, categories: Vec<ObstacleCategory>) -> Self {
        let categories = categories.into_iter().map(|c| (c.id, c)).collect();
        Self {
            patterns,
            categories,
        }
    }

    pub fn from_config(config: &CatalogConfig) -> Self {
        let catalog = Self::new(config.patterns.clone(), config.categories.clone());
        log::info!(
            "Catalog loaded: {} patterns, {} categories",
            catalog.patterns.len(),
            catalog.categories.len()
        );
        catalog
    }

    pub fn standard() -> Self {
        Self::new(standard_patterns(), standard_categories())
    }

    pub fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    pub fn pattern(&self, index: usize) -> Option<&Pattern> {
        self.patterns.get(index)
    }

    pub fn category(&self, id: ObstacleTypeId) -> Option<&ObstacleCategory> {
        self.categories.get(&id)
    }

    /// Variants for a type id (empty when unregistered)
    pub fn variants(&self, id: ObstacleTypeId) -> &[ObstacleVariant] {
        self.categories
            .get(&id)
            .map(|c| c.variants.as_slice())
            .unwrap_or(&[])
    }

    pub fn is_rollable(&self, id: ObstacleTypeId) -> bool {
        self.categories.get(&id).is_some_and(|c| c.rollable)
    }

    /// Uniform pattern choice (with repetition)
    pub fn pick_pattern<R: Rng>(&self, rng: &mut R) -> Option<usize> {
        if self.patterns.is_empty() {
            None
        } else {
            Some(rng.random_range(0..self.patterns.len()))
        }
    }

    /// Uniform variant choice for a type id
    pub fn pick_variant<R: Rng>(
        &self,
        id: ObstacleTypeId,
        rng: &mut R,
    ) -> Option<&ObstacleVariant> {
        let variants = self.variants(id);
        if variants.is_empty() {
            return None;
        }
        variants.get(rng.random_range(0..variants.len()))
    }
}

/// Medium-difficulty pattern set
pub fn standard_patterns() -> Vec<Pattern> {
    [
        vec![[0, 1, 0], [1, 0, 1], [0, 1, 0]],
        vec![[2, 2, 2], [0, 0, 0], [3, 0, 3]],
        vec![[4, 0, 0], [0, 0, 4], [2, 2, 2]],
        vec![[1, 2, 1], [3, 0, 3], [1, 0, 1]],
        vec![[0, 1, 1], [1, 1, 0], [0, 1, 1]],
        vec![[3, 1, 3], [2, 0, 2], [3, 1, 3]],
        vec![[4, 0, 0], [0, 0, 0], [0, 0, 4]],
        vec![[5, 5, 5], [0, 1, 0], [2, 5, 2]],
    ]
    .into_iter()
    .map(Pattern::new)
    .collect()
}

/// Default templates, sized for a 3 unit lane
pub fn standard_categories() -> Vec<ObstacleCategory> {
    let overhead = ObstacleVariant {
        template: "overhead_bar".to_string(),
        visual_bounds: vec![
            Aabb::from_center_size(Vec3::new(-1.2, 0.9, 0.0), Vec3::new(0.2, 1.8, 0.2)),
            Aabb::from_center_size(Vec3::new(1.2, 0.9, 0.0), Vec3::new(0.2, 1.8, 0.2)),
            Aabb::from_center_size(Vec3::new(0.0, 1.6, 0.0), Vec3::new(2.6, 0.4, 0.3)),
        ],
        colliders: vec![ColliderShape::Box {
            center: Vec3::new(0.0, 1.6, 0.0),
            size: Vec3::new(2.6, 0.4, 0.3),
        }],
        yaw_degrees: 0.0,
    };
    let barrel = ObstacleVariant {
        template: "barrel".to_string(),
        visual_bounds: Vec::new(),
        colliders: vec![ColliderShape::Capsule {
            center: Vec3::new(0.0, 0.6, 0.0),
            radius: 0.6,
            height: 1.2,
        }],
        yaw_degrees: 0.0,
    };

    vec![
        ObstacleCategory {
            id: ObstacleKind::Wall.id(),
            name: "wall".to_string(),
            rollable: false,
            variants: vec![
                ObstacleVariant::boxed("wall_block", Vec3::new(0.0, 1.0, 0.0), Vec3::new(2.4, 2.0, 0.6)),
                ObstacleVariant::boxed("wall_crate", Vec3::new(0.0, 0.75, 0.0), Vec3::new(2.0, 1.5, 1.5)),
            ],
        },
        ObstacleCategory {
            id: ObstacleKind::Low.id(),
            name: "low".to_string(),
            rollable: false,
            variants: vec![
                ObstacleVariant::boxed("hurdle", Vec3::new(0.0, 0.35, 0.0), Vec3::new(2.4, 0.7, 0.4)),
                barrel,
            ],
        },
        ObstacleCategory {
            id: ObstacleKind::EdgeOnly.id(),
            name: "edge".to_string(),
            rollable: false,
            variants: vec![ObstacleVariant::boxed(
                "edge_ramp",
                Vec3::new(0.3, 0.6, 0.0),
                Vec3::new(2.0, 1.2, 1.0),
            )],
        },
        ObstacleCategory {
            id: ObstacleKind::Wide.id(),
            name: "wide".to_string(),
            rollable: false,
            variants: vec![ObstacleVariant::boxed(
                "wide_wall",
                Vec3::new(0.0, 1.0, 0.0),
                Vec3::new(5.4, 2.0, 0.6),
            )],
        },
        ObstacleCategory {
            id: ObstacleKind::High.id(),
            name: "high".to_string(),
            rollable: true,
            variants: vec![overhead],
        },
    ]
}
