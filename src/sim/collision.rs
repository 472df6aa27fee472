//! Contact detection and resolution
//!
//! Detection plays the role of the trigger world: the player's capsule is
//! tested against each obstacle's simplified hit volume and against the
//! death zones. Resolution decides what a contact means: death zones always
//! kill, rolling passes through rollable obstacles, and landing on top of an
//! obstacle within a small tolerance is standing, not crashing.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use super::obstacle::ObstacleInstance;
use super::pattern::ObstacleTypeId;
use super::player::Player;
use super::scheduler::ActivePool;
use super::shapes::OrientedBox;
use super::state::DeathZone;
use crate::tuning::PlayerTuning;

/// What killed the player
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DeathCause {
    Obstacle { id: u32, type_id: ObstacleTypeId },
    DeathZone { index: usize },
}

/// The entity a contact is with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContactTarget {
    Obstacle(u32),
    DeathZone(usize),
}

/// One overlap found this tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    pub target: ContactTarget,
    /// Point on the capsule core closest to the target
    pub point: Vec3,
}

/// Outcome of resolving a contact
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolution {
    /// No state change (rolling through, stale target, already dead)
    Ignored,
    /// Player is on top of the obstacle
    StoodOn,
    Killed(DeathCause),
}

/// Every death zone and obstacle the capsule overlaps, death zones first
pub fn detect_contacts(
    player: &Player,
    base: Vec3,
    obstacles: &ActivePool<ObstacleInstance>,
    death_zones: &[DeathZone],
) -> Vec<Contact> {
    let radius = player.capsule.radius;
    let (a, b) = player.capsule.segment(base);
    let mut contacts = Vec::new();

    for (index, zone) in death_zones.iter().enumerate() {
        let hit = match zone {
            DeathZone::BelowHeight(height) => (base.y < *height).then_some(base),
            DeathZone::Volume(aabb) => {
                let volume = OrientedBox {
                    center: aabb.center(),
                    half_extents: aabb.size() * 0.5,
                    rotation: Quat::IDENTITY,
                };
                let (distance, point) = volume.segment_distance(a, b);
                (distance <= radius).then_some(point)
            }
        };
        if let Some(point) = hit {
            contacts.push(Contact {
                target: ContactTarget::DeathZone(index),
                point,
            });
        }
    }

    for obstacle in obstacles.iter().filter(|o| o.alive) {
        let (distance, point) = obstacle.hit_volume.segment_distance(a, b);
        if distance <= radius {
            contacts.push(Contact {
                target: ContactTarget::Obstacle(obstacle.id),
                point,
            });
        }
    }

    contacts
}

/// When touching an obstacle counts as standing on it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StandOnRule {
    /// Share of the vertical half extent above the hit volume's center
    /// where the standing surface sits
    pub top_fraction: f32,
    /// Band below that surface that still counts
    pub tolerance: f32,
}

impl StandOnRule {
    pub fn from_tuning(player: &PlayerTuning) -> Self {
        Self {
            top_fraction: player.stand_on_top_fraction,
            tolerance: player.stand_on_tolerance,
        }
    }

    /// Whether feet at `feet_y` are on `obstacle`
    #[inline]
    pub fn holds(&self, feet_y: f32, obstacle: &ObstacleInstance) -> bool {
        feet_y >= obstacle.stand_on_height(self.top_fraction) - self.tolerance
    }
}

impl Default for StandOnRule {
    fn default() -> Self {
        Self::from_tuning(&PlayerTuning::default())
    }
}

/// Decide what a contact does to the player
pub fn resolve_contact(
    player: &Player,
    contact: &Contact,
    obstacles: &ActivePool<ObstacleInstance>,
    stand_on: StandOnRule,
) -> Resolution {
    if !player.alive {
        return Resolution::Ignored;
    }
    match contact.target {
        ContactTarget::DeathZone(index) => Resolution::Killed(DeathCause::DeathZone { index }),
        ContactTarget::Obstacle(id) => {
            let Some(obstacle) = obstacles.get(id) else {
                return Resolution::Ignored;
            };
            if player.rolling && obstacle.rollable {
                return Resolution::Ignored;
            }
            if stand_on.holds(player.position_y, obstacle) {
                Resolution::StoodOn
            } else {
                Resolution::Killed(DeathCause::Obstacle {
                    id,
                    type_id: obstacle.type_id,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Tuning;
    use crate::sim::host::{InstanceHandle, Pose};
    use crate::sim::obstacle::Placement;
    use crate::sim::pattern::PatternCatalog;
    use crate::sim::shapes::Aabb;

    fn pool_with(type_id: u8, z: f32) -> ActivePool<ObstacleInstance> {
        let catalog = PatternCatalog::standard();
        let variant = &catalog.variants(type_id)[0];
        let mut pool = ActivePool::new(8);
        pool.insert(ObstacleInstance::new(
            1,
            InstanceHandle(1),
            Placement {
                type_id,
                lane: 1,
                variant,
                pose: Pose::new(Vec3::new(0.0, 0.0, z), Quat::IDENTITY),
                spawn_distance: z as f64,
                rollable: catalog.is_rollable(type_id),
            },
            1.0,
            5.0,
        ));
        pool
    }

    fn rule(tolerance: f32) -> StandOnRule {
        StandOnRule {
            top_fraction: 0.5,
            tolerance,
        }
    }

    fn player_at(y: f32) -> Player {
        Player::new(&Tuning::default(), y)
    }

    fn base(p: &Player, z: f32) -> Vec3 {
        Vec3::new(p.position_x, p.position_y, z)
    }

    #[test]
    fn test_wall_contact_kills() {
        let pool = pool_with(1, 10.0);
        let p = player_at(0.0);
        let contacts = detect_contacts(&p, base(&p, 10.0), &pool, &[]);
        assert_eq!(contacts.len(), 1);
        let r = resolve_contact(&p, &contacts[0], &pool, rule(0.05));
        assert_eq!(r, Resolution::Killed(DeathCause::Obstacle { id: 1, type_id: 1 }));
    }

    #[test]
    fn test_clear_lane_no_contact() {
        let pool = pool_with(1, 10.0);
        let mut p = player_at(0.0);
        p.position_x = 3.0;
        assert!(detect_contacts(&p, base(&p, 10.0), &pool, &[]).is_empty());
    }

    #[test]
    fn test_standing_on_top_within_tolerance() {
        let pool = pool_with(2, 10.0); // hurdle, center 0.35, half height 0.35
        let hurdle = pool.get(1).unwrap();
        let stand_on = rule(0.05);
        assert!((hurdle.stand_on_height(stand_on.top_fraction) - 0.525).abs() < 1e-5);

        // Above the standing surface but below the geometric top
        let p = player_at(0.55);
        let contacts = detect_contacts(&p, base(&p, 10.0), &pool, &[]);
        assert_eq!(contacts.len(), 1);
        assert_eq!(resolve_contact(&p, &contacts[0], &pool, stand_on), Resolution::StoodOn);

        // Just inside the tolerance band
        let p = player_at(0.48);
        assert_eq!(resolve_contact(&p, &contacts[0], &pool, stand_on), Resolution::StoodOn);

        let p = player_at(0.46);
        assert_eq!(
            resolve_contact(&p, &contacts[0], &pool, stand_on),
            Resolution::Killed(DeathCause::Obstacle { id: 1, type_id: 2 })
        );
    }

    #[test]
    fn test_full_top_fraction_is_stricter() {
        let pool = pool_with(2, 10.0);
        let p = player_at(0.55);
        let contacts = detect_contacts(&p, base(&p, 10.0), &pool, &[]);
        let full = StandOnRule {
            top_fraction: 1.0,
            tolerance: 0.05,
        };
        assert!(matches!(
            resolve_contact(&p, &contacts[0], &pool, full),
            Resolution::Killed(_)
        ));

        let p = player_at(0.66);
        assert_eq!(resolve_contact(&p, &contacts[0], &pool, full), Resolution::StoodOn);
    }

    #[test]
    fn test_standing_surface_follows_rotation() {
        let mut pool = pool_with(2, 10.0);
        let mut hurdle = pool.remove(1).unwrap();
        // Pitched a quarter turn: the 0.4 deep side now points up
        hurdle.hit_volume.rotation = Quat::from_rotation_x(std::f32::consts::FRAC_PI_2);
        pool.insert(hurdle);
        let hurdle = pool.get(1).unwrap();
        assert!((hurdle.stand_on_height(0.5) - (0.35 + 0.2 * 0.5)).abs() < 1e-4);
    }

    #[test]
    fn test_roll_passes_rollable_only() {
        let tuning = Tuning::default();
        let high = pool_with(5, 10.0);
        let mut p = player_at(0.0);
        p.rolling = true;
        p.capsule = tuning.player.rolling_capsule;
        let contact = Contact {
            target: ContactTarget::Obstacle(1),
            point: Vec3::ZERO,
        };
        assert_eq!(resolve_contact(&p, &contact, &high, rule(0.05)), Resolution::Ignored);

        let wall = pool_with(1, 10.0);
        assert!(matches!(
            resolve_contact(&p, &contact, &wall, rule(0.05)),
            Resolution::Killed(_)
        ));
    }

    #[test]
    fn test_rolling_capsule_clears_overhead_bar() {
        let tuning = Tuning::default();
        let mut pool = pool_with(5, 10.0);
        // Treat the bar as solid to check the geometry alone
        let mut bar = pool.remove(1).unwrap();
        bar.hit_volume = OrientedBox {
            center: Vec3::new(0.0, 1.6, 10.0),
            half_extents: Vec3::new(1.3, 0.2, 0.15),
            rotation: Quat::IDENTITY,
        };
        pool.insert(bar);

        let mut p = player_at(0.0);
        assert_eq!(detect_contacts(&p, base(&p, 10.0), &pool, &[]).len(), 1);
        p.rolling = true;
        p.capsule = tuning.player.rolling_capsule;
        assert!(detect_contacts(&p, base(&p, 10.0), &pool, &[]).is_empty());
    }

    #[test]
    fn test_death_zone_unconditional() {
        let zones = [
            DeathZone::Volume(Aabb::from_center_size(Vec3::new(0.0, 0.0, 30.0), Vec3::splat(2.0))),
            DeathZone::BelowHeight(-5.0),
        ];
        let pool = ActivePool::new(4);
        let mut p = player_at(0.5);
        p.rolling = true;
        p.grounded = false;
        p.vertical_velocity = 3.0;

        let contacts = detect_contacts(&p, base(&p, 30.0), &pool, &zones);
        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].target, ContactTarget::DeathZone(0));
        assert_eq!(
            resolve_contact(&p, &contacts[0], &pool, rule(10.0)),
            Resolution::Killed(DeathCause::DeathZone { index: 0 })
        );

        let p = player_at(-6.0);
        let contacts = detect_contacts(&p, base(&p, 0.0), &pool, &zones);
        assert_eq!(contacts[0].target, ContactTarget::DeathZone(1));
    }

    #[test]
    fn test_dead_player_ignores_contacts() {
        let tuning = Tuning::default();
        let pool = pool_with(1, 10.0);
        let mut p = player_at(0.0);
        p.kill(&tuning);
        let contact = Contact {
            target: ContactTarget::DeathZone(0),
            point: Vec3::ZERO,
        };
        assert_eq!(resolve_contact(&p, &contact, &pool, rule(0.05)), Resolution::Ignored);
    }
}
