//! straight: smallest end-to-end run of the rust_tt streamline tracker.
//!
//! Tracks a grid of seeds through a synthetic "fiber" field: directions
//! circle the volume's z axis, with a little noise, inside a 32³ box mask.
//! Streamlines that run out of the mask or bend too sharply are put
//! through backtrack-and-rollout recovery before they are allowed to stop.
//!
//! ```text
//! cargo run -p straight                  # built-in config
//! cargo run -p straight -- config.json   # TrackingConfig as JSON
//! RUST_LOG=debug cargo run -p straight   # per-step logs
//! ```

mod sink;


use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use tt_core::{Affine, Point3, SeedSelection, StoppingFlags, TrackRng, TrackingConfig};
use tt_criteria::{BoxMask, Looping, MaxCurvature};
use tt_env::{EnvBuilder, EnvObserver, ExportOptions, HeadPosition, MinPoints, Space};
use tt_rollout::{BoundaryDistanceScorer, RandomWalkSampler, RolloutReport};

use crate::sink::CsvSink;

// ── Constants ─────────────────────────────────────────────────────────────────

const VOLUME:      f32   = 32.0;
const GRID:        usize = 6;     // GRID² seeds on the z = 16 plane
const NOISE:       f32   = 0.15;
const VOXEL_MM:    f32   = 2.0;
const OUTPUT_DIR:  &str  = "output/straight";

// ── Policy stand-in ───────────────────────────────────────────────────────────

/// Tangent of the circle around the volume's z axis through `p`, plus noise.
fn field_direction(p: Point3, rng: &mut TrackRng) -> Point3 {
    let c = VOLUME / 2.0;
    let tangent = Point3::new(-(p.y - c), p.x - c, 0.0).scaled_to(1.0);
    tangent + rng.unit_vector() * NOISE
}

// ── Observer ──────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Progress {
    steps:      u64,
    rollouts:   usize,
    recovered:  usize,
    candidates: usize,
}

impl EnvObserver for Progress {
    fn on_step_end(&mut self, step: u64, stepped: usize, stopped: usize) {
        self.steps = step;
        if step.is_multiple_of(25) {
            println!("  step {step:>4}: {stepped:>3} tracked, {stopped:>3} stopped");
        }
    }

    fn on_rollout(&mut self, _step: u64, report: &RolloutReport) {
        self.rollouts += 1;
        self.recovered += report.recovered.len();
        self.candidates += report.candidates_run;
    }
}

// ── main ──────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // 1. Config: from the command line, or the built-in one.
    let config = match std::env::args().nth(1) {
        Some(path) => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config from {path}"))?;
            serde_json::from_str::<TrackingConfig>(&text)
                .with_context(|| format!("failed to parse config from {path}"))?
        }
        None => TrackingConfig {
            seeds:                       SeedSelection::Range { start: 0, end: usize::MAX },
            max_nb_steps:                200,
            step_size:                   0.5,
            do_rollout:                  true,
            roll_n_steps:                1,
            n_rollouts:                  5,
            rollout_horizon:             8,
            backtrack_steps:             4,
            rollout_trigger_probability: 0.5,
            rng_seed:                    42,
        },
    };

    println!("=== straight: rust_tt streamline tracker ===");
    println!(
        "Seeds: {}  |  Max steps: {}  |  Step: {}  |  Rollouts: {}",
        GRID * GRID,
        config.max_nb_steps,
        config.step_size,
        if config.do_rollout { "on" } else { "off" }
    );
    println!();

    // 2. Seed pool: a grid on the middle plane, away from the centre.
    let seeds: Vec<Point3> = (0..GRID * GRID)
        .map(|i| {
            let (gx, gy) = ((i % GRID) as f32, (i / GRID) as f32);
            Point3::new(4.0 + 4.0 * gx, 4.0 + 4.0 * gy, VOLUME / 2.0)
        })
        .collect();

    // 3. Environment.
    let mask = BoxMask::new(Point3::ZERO, Point3::new(VOLUME, VOLUME, VOLUME))?;
    let env = EnvBuilder::new(config.clone(), seeds, HeadPosition)
        .criterion(mask.clone())
        .criterion(MaxCurvature::new(45.0)?)
        .criterion(Looping::new(720.0)?)
        .rollout(RandomWalkSampler { persistence: 0.8 }, BoundaryDistanceScorer { mask })
        .affine(Affine::scale_translate(VOXEL_MM, Point3::new(-VOLUME, -VOLUME, -VOLUME)))
        .filter(MinPoints(10))
        .build()?;

    // 4. Track.
    let mut state = env.reset()?;
    let mut obs = Progress::default();
    let mut rng = TrackRng::new(config.rng_seed);
    let t0 = Instant::now();
    while !state.is_finished() {
        let actions: Vec<Point3> = env
            .states(&state)
            .into_iter()
            .map(|head| field_direction(head, &mut rng))
            .collect();
        env.step(&mut state, &actions, &mut obs)?;
        env.harvest(&mut state, &mut obs)?;
    }
    let elapsed = t0.elapsed();
    tracing::info!(steps = obs.steps, elapsed_s = elapsed.as_secs_f64(), "tracking complete");

    // 5. Export.
    let tractogram = env.finalize(&state, ExportOptions { space: Space::World, filter: true });
    std::fs::create_dir_all(OUTPUT_DIR)?;
    let csv_path = Path::new(OUTPUT_DIR).join("streamlines.csv");
    let mut sink = CsvSink::new(&csv_path)
        .with_context(|| format!("failed to create {}", csv_path.display()))?;
    tractogram.write_to(&mut sink)?;

    // 6. Summary.
    println!();
    println!("Tracking complete in {:.3} s ({} steps)", elapsed.as_secs_f64(), obs.steps);
    println!(
        "  rollout passes: {}  |  recovered: {}  |  candidates: {}",
        obs.rollouts, obs.recovered, obs.candidates
    );
    println!(
        "  exported: {} of {} streamlines, {} points ({:?} space) to {}",
        tractogram.len(),
        state.buffer().count,
        sink.rows(),
        tractogram.space,
        csv_path.display()
    );
    println!();

    println!("{:<10} {:<8}", "Stop", "Count");
    println!("{}", "-".repeat(18));
    for (name, flag) in StoppingFlags::all().iter_names() {
        let n = state.buffer().flags.iter().filter(|f| f.contains(flag)).count();
        println!("{name:<10} {n:<8}");
    }

    Ok(())
}
