//! Fixed timestep simulation tick
//!
//! Advances a run deterministically: path travel, locomotion against the
//! ground, the spawn pass, retirement, pickups, then contacts. Locomotion
//! always settles the pose before contacts read it.

use super::collision::{Resolution, StandOnRule, detect_contacts, resolve_contact};
use super::host::{GroundQuery, Host};
use super::input::TickInput;
use super::path::PathPose;
use super::scheduler::PlayerAnchor;
use super::state::{FrameTime, GameEvent, RunPhase, RunnerState};
use crate::consts::GROUND_SNAP_TOLERANCE;

/// Advance the run by one tick
pub fn tick(state: &mut RunnerState, input: &TickInput, time: FrameTime, host: &mut Host<'_>) {
    state.events.clear();
    state.time_ticks += 1;
    let dt = time.scaled.max(0.0);

    // Restart pacing runs on real time so slow motion cannot stretch it
    if state.phase == RunPhase::Dead
        && (input.retry || state.restart_timer.tick(time.unscaled))
    {
        state.request_restart(&mut *host.hooks);
    }

    state.follower.advance(dt);
    if state.player.alive {
        state.body_distance = state.follower.distance;
        state.time_alive += dt;
    } else if !state.player.grounded {
        // Knocked back along the path while airborne
        state.body_distance -= (state.player.knockback_speed * dt) as f64;
    }
    let frame = state.player_frame();

    let ground = ground_height(state, &frame, host.ground);
    let moved = state.player.step(input, ground, &state.tuning, dt);
    if moved.jumped {
        state.events.push(GameEvent::PlayerJumped);
    }
    if moved.roll_started {
        state.events.push(GameEvent::RollStarted);
    }
    if moved.roll_ended {
        state.events.push(GameEvent::RollEnded);
    }
    let position = state.player.world_position(&frame);

    // Keeps running after death until the host tears the run down
    let anchor = PlayerAnchor {
        position,
        follower_distance: Some(state.follower.distance),
    };
    state.scheduler.update(
        Some(&state.curve),
        Some(anchor),
        &state.tuning,
        host,
        &mut state.events,
    );
    state.scheduler.retire_left_behind(
        position,
        frame.forward,
        &mut *host.backend,
        &mut state.events,
    );

    let items = &state.tuning.items;
    if let Some(placer) = state.scheduler.items_mut() {
        placer.retire_left_behind(
            position,
            frame.forward,
            items.destroy_behind_distance,
            &mut *host.backend,
        );
        if state.player.alive {
            placer.collect(
                state.player.capsule.segment(position),
                items.pickup_radius,
                items.score_value,
                &mut *host.backend,
                &mut *host.hooks,
                &mut state.events,
            );
        }
    }

    if !state.player.alive {
        return;
    }
    let pool = state.scheduler.pool();
    let stand_on = StandOnRule::from_tuning(&state.tuning.player);
    let killed = detect_contacts(&state.player, position, pool, &state.death_zones)
        .iter()
        .find_map(|contact| match resolve_contact(&state.player, contact, pool, stand_on) {
            Resolution::Killed(cause) => Some(cause),
            Resolution::Ignored | Resolution::StoodOn => None,
        });
    if let Some(cause) = killed {
        state.kill(cause, &mut *host.hooks);
    }
}

/// Highest surface under the player: the external ground or the top of an
/// obstacle the player is already above
fn ground_height(state: &RunnerState, frame: &PathPose, ground: &dyn GroundQuery) -> Option<f32> {
    let player = &state.player;
    let tuning = &state.tuning.player;
    let origin = player.ground_ray_origin(frame);
    let external = ground.raycast_down(origin, tuning.ground_ray_length, tuning.ground_layer);

    let feet = player.world_position(frame);
    let reach = player.position_y + GROUND_SNAP_TOLERANCE;
    let obstacle_top = state
        .scheduler
        .pool()
        .iter()
        .filter(|o| o.alive && o.hit_volume.footprint_contains(feet))
        .map(|o| o.top_height())
        .filter(|&top| top <= reach && origin.y - top <= tuning.ground_ray_length)
        .reduce(f32::max);

    match (external, obstacle_top) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}
