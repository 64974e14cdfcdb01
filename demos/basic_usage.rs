/// Basic usage example: feed IMU samples, get reps and a session tally
use rep_sensing::{Exercise, ExerciseMode, ImuSample, RepEngine};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("=== Rep Sensing Engine: Basic Example ===\n");

    // Curls are selected up front; ExerciseMode::Auto would infer them
    let mut engine = RepEngine::with_defaults(ExerciseMode::Fixed(Exercise::Curl));

    // Three 1.2 s curls about the device y axis, gravity on z
    let period_ms = 1200;
    let samples: Vec<ImuSample> = (0..3 * period_ms / 20)
        .map(|i| {
            let t = i * 20;
            let phase = (t % period_ms) as f32 / period_ms as f32;
            let rate = 1.6 * (1.0 - (2.0 * std::f32::consts::PI * phase).cos());
            ImuSample::new(t, [0.0, 0.0, 9.81], [0.0, rate, 0.0])
        })
        .collect();

    println!("Processing {} samples...\n", samples.len());

    for sample in &samples {
        let output = engine.update(sample);
        if let Some(rep) = output.rep {
            println!(
                "Rep at {} ms: {} ({:?}), peak {:.2} rad/s",
                rep.timestamp_ms, rep.exercise, rep.form, rep.peak_value
            );
        }
    }

    let curls = engine.stats().get(Exercise::Curl);
    println!(
        "\nCurls: {} total, {} good, {} bad",
        curls.total, curls.good, curls.bad
    );
    println!("Final state: {:?}", engine.state());
}
