//! Lane Runner headless driver
//!
//! Runs the simulation on a straight track with a simple autopilot, using
//! the same fixed-timestep accumulator a windowed host would, and prints a
//! JSON summary when done.
//!
//! Usage: `lane-runner [tuning.json] [seconds]`

#[cfg(not(target_arch = "wasm32"))]
mod headless {
    use glam::Vec3;
    use serde::Serialize;

    use lane_runner::Tuning;
    use lane_runner::consts::{LANE_COUNT, MAX_SUBSTEPS, SIM_DT};
    use lane_runner::sim::{
        DeathCause, FlatGround, FrameTime, GameEvent, HeadlessBackend, HeldButtons, Host,
        InputEdges, ObstacleInstance, ObstacleKind, PathCurve, RecordingHooks, RunPhase,
        RunnerState, tick,
    };

    /// Simulated display refresh feeding the accumulator
    const FRAME_DT: f32 = 1.0 / 60.0;
    /// How far ahead the autopilot looks for trouble
    const LOOKAHEAD: f64 = 14.0;
    const TRACK_LENGTH: f32 = 10_000.0;

    #[derive(Debug, Serialize)]
    pub struct RunSummary {
        pub seed: u64,
        pub seconds: f32,
        pub runs: u32,
        pub deaths: Vec<DeathCause>,
        pub best_distance: f64,
        pub score: u64,
        pub pickups: u32,
        pub obstacles_spawned: usize,
        pub live_obstacles: usize,
    }

    fn track() -> PathCurve {
        PathCurve::straight(Vec3::ZERO, Vec3::Z, TRACK_LENGTH)
    }

    /// Lanes an obstacle blocks
    fn covered_lanes(obstacle: &ObstacleInstance) -> Vec<usize> {
        let lane = obstacle.lane as usize;
        match obstacle.kind {
            Some(ObstacleKind::Wide) if lane == LANE_COUNT - 1 => vec![1, 2],
            Some(ObstacleKind::Wide) => vec![0, 1],
            _ => vec![lane],
        }
    }

    /// Steers toward the lane whose next solid obstacle is farthest away,
    /// jumping low barriers and rolling under high ones
    #[derive(Debug, Default)]
    struct Autopilot {
        last: HeldButtons,
    }

    impl Autopilot {
        fn decide(&mut self, state: &RunnerState) -> HeldButtons {
            let here = state.body_distance;
            let lane = state.player.lane_index() as usize;
            let mut blocked = [f64::INFINITY; LANE_COUNT];
            let mut nearest_here: Option<(f64, Option<ObstacleKind>)> = None;

            for obstacle in state.scheduler.pool().iter() {
                let ahead = obstacle.spawn_distance - here;
                if !(-0.5..=LOOKAHEAD).contains(&ahead) {
                    continue;
                }
                let passable = matches!(obstacle.kind, Some(ObstacleKind::Low | ObstacleKind::High));
                for covered in covered_lanes(obstacle) {
                    if !passable {
                        blocked[covered] = blocked[covered].min(ahead);
                    }
                    if covered == lane && nearest_here.is_none_or(|(d, _)| ahead < d) {
                        nearest_here = Some((ahead, obstacle.kind));
                    }
                }
            }

            let best = (0..LANE_COUNT)
                .max_by(|&a, &b| {
                    blocked[a].total_cmp(&blocked[b]).then_with(|| {
                        b.abs_diff(lane).cmp(&a.abs_diff(lane))
                    })
                })
                .unwrap_or(lane);
            let target = if blocked[best] > blocked[lane] { best } else { lane };

            let mut held = HeldButtons {
                left: target < lane && !self.last.left,
                right: target > lane && !self.last.right,
                ..Default::default()
            };
            if let Some((ahead, kind)) = nearest_here {
                held.jump = kind == Some(ObstacleKind::Low) && ahead <= 4.0;
                held.roll = kind == Some(ObstacleKind::High) && ahead <= 3.0;
            }
            self.last = held;
            held
        }
    }

    pub fn run(tuning: Tuning, seconds: f32) -> RunSummary {
        let ground = FlatGround::new(0.0);
        let mut hooks = RecordingHooks::default();
        let mut backend = HeadlessBackend::new();
        let mut state = RunnerState::new(tuning.clone(), track());
        let mut pilot = Autopilot::default();
        let mut edges = InputEdges::default();

        let mut runs = 1u32;
        let mut best_distance = 0.0f64;
        let mut obstacles_spawned = 0;
        let mut accumulator = 0.0f32;
        let mut elapsed = 0.0f32;

        while elapsed < seconds {
            accumulator += FRAME_DT.min(0.1);
            elapsed += FRAME_DT;

            let mut substeps = 0;
            while accumulator >= SIM_DT && substeps < MAX_SUBSTEPS {
                let input = edges.sample(pilot.decide(&state));
                let time = FrameTime::with_scale(SIM_DT, state.time_scale);
                let mut host = Host::new(&ground, &mut backend, &mut hooks);
                tick(&mut state, &input, time, &mut host);
                obstacles_spawned += state
                    .events
                    .iter()
                    .filter(|e| matches!(e, GameEvent::ObstacleSpawned { .. }))
                    .count();
                accumulator -= SIM_DT;
                substeps += 1;

                if state.phase == RunPhase::RestartRequested {
                    best_distance = best_distance.max(state.follower.distance);
                    let mut next = tuning.clone();
                    next.seed = tuning.seed.wrapping_add(runs as u64);
                    runs += 1;
                    backend = HeadlessBackend::new();
                    state = RunnerState::new(next, track());
                }
            }
        }
        best_distance = best_distance.max(state.follower.distance);

        RunSummary {
            seed: tuning.seed,
            seconds: elapsed,
            runs,
            deaths: hooks.deaths.clone(),
            best_distance,
            score: hooks.score,
            pickups: hooks.pickups,
            obstacles_spawned,
            live_obstacles: state.scheduler.pool().len(),
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Lane Runner (headless) starting...");

    let mut args = std::env::args().skip(1);
    let tuning = match args.next() {
        Some(path) => match lane_runner::Tuning::load(&path) {
            Ok(tuning) => tuning,
            Err(e) => {
                log::error!("{e}");
                std::process::exit(1);
            }
        },
        None => lane_runner::Tuning::default(),
    };
    let seconds = args
        .next()
        .and_then(|s| s.parse::<f32>().ok())
        .unwrap_or(60.0);

    let summary = headless::run(tuning, seconds);
    match serde_json::to_string_pretty(&summary) {
        Ok(json) => println!("{json}"),
        Err(e) => log::error!("Failed to encode summary: {e}"),
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // The simulation is a library here; the host drives `tick` itself
}
