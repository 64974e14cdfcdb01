/// Batch example: segment a finished set, label each window, fold into a session
use rep_sensing::session::SessionAggregator;
use rep_sensing::{BatchRepAnalyzer, EngineConfig, Exercise, ImuSample};

fn main() -> rep_sensing::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("=== Rep Sensing Engine: Batch Analysis ===\n");

    let analyzer = BatchRepAnalyzer::new(&EngineConfig::default())?;

    // Eight 1 s presses: rotation about device z with a vertical push
    let samples: Vec<ImuSample> = (0..400u64)
        .map(|i| {
            let phase = (i % 50) as f32 / 50.0;
            let push = 3.0 * (std::f32::consts::PI * phase).sin();
            let twist = 1.2 * (2.0 * std::f32::consts::PI * phase).sin();
            ImuSample::new(i * 20, [0.0, 0.0, 9.81 + push], [0.0, 0.0, twist])
        })
        .collect();

    let Some(analysis) = analyzer.analyze(&samples) else {
        println!("Input too short to analyze");
        return Ok(());
    };

    println!("Segmentation: {:?}", analysis.source);
    for result in &analysis.windows {
        let label = result
            .label
            .map_or("unknown".to_string(), |m| format!("{} (distance {:.2})", m.exercise, m.distance));
        println!(
            "  window {:>5}-{:>5} ms: {label}",
            result.window.start_ms, result.window.end_ms
        );
    }

    let mut session = SessionAggregator::new();
    analysis.apply_to(&mut session, Some(Exercise::Press));
    let press = session.stats().get(Exercise::Press);
    println!("\nPress reps: {}", press.reps());
    match press.accuracy() {
        Some(accuracy) => println!("Labeling accuracy: {:.0}%", accuracy * 100.0),
        None => println!("Labeling accuracy: n/a"),
    }
    Ok(())
}
