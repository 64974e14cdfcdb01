//! Rep Sensing Engine
//!
//! Runs a synthetic dumbbell set through the engine and prints the session
//! tally. An optional first argument names a TOML configuration file; an
//! optional second argument names the exercise (`auto` for identification).
//!
//! This is the entry point for standalone binaries. For library use, see lib.rs.

use std::f32::consts::PI;
use std::process::ExitCode;

use log::{error, info};
use rep_sensing::{EngineConfig, Exercise, ExerciseMode, ImuSample, RepEngine, Result};

const SAMPLE_INTERVAL_MS: u64 = 20;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => {
            info!("loading configuration from {path}");
            EngineConfig::load(path)?
        }
        None => EngineConfig::default(),
    };
    let mode = match args.next().as_deref() {
        None => ExerciseMode::Fixed(Exercise::Curl),
        Some("auto") => ExerciseMode::Auto,
        Some(name) => ExerciseMode::Fixed(name.parse()?),
    };

    println!("Rep Sensing Engine v{}", env!("CARGO_PKG_VERSION"));
    println!("Mode: {mode:?}\n");

    let mut engine = RepEngine::new(config, mode)?;
    for sample in synthetic_curl_set(10, 1000) {
        let output = engine.update(&sample);
        if let Some(rep) = output.rep {
            println!(
                "  rep {:>2} at {:>5} ms: {} form={:?} peak={:.2} energy={:.2}",
                output.stats.current_set.stats.reps(),
                rep.timestamp_ms,
                rep.exercise,
                rep.form,
                rep.peak_value,
                rep.energy
            );
        }
    }

    let stats = engine.stats();
    println!("\nSession:");
    for (exercise, tally) in &stats.per_exercise {
        println!(
            "  {exercise}: {} reps ({} good, {} bad, {} unjudged, {} missed)",
            tally.reps(),
            tally.good,
            tally.bad,
            tally.unjudged,
            tally.missed
        );
    }
    println!("  missed overall: {}", stats.missed_reps);
    Ok(())
}

/// `reps` raised-cosine rotations about the device y axis with gravity on z.
fn synthetic_curl_set(reps: u64, period_ms: u64) -> impl Iterator<Item = ImuSample> {
    let total = reps * period_ms / SAMPLE_INTERVAL_MS;
    (0..total).map(move |i| {
        let t = i * SAMPLE_INTERVAL_MS;
        let phase = (t % period_ms) as f32 / period_ms as f32;
        let rate = 1.5 * (1.0 - (2.0 * PI * phase).cos());
        ImuSample::new(t, [0.0, 0.0, 9.81], [0.0, rate, 0.0])
    })
}
