//! Integration tests for the complete rep detection pipeline.
//! Feeds realistic synthetic sets through the public engine and checks
//! end-to-end counts, state, and session guarantees.

use std::f32::consts::PI;

use crate::classifier::{channel_std_dev, ReferenceConfig, ReferenceVector};
use crate::config::EngineConfig;
use crate::pipeline::*;
use crate::session::SessionAggregator;
use crate::types::*;

const SAMPLE_INTERVAL_MS: u64 = 20;

/// Helper: device at rest, gravity on z
fn still_profile(num_samples: u64) -> Vec<ImuSample> {
    (0..num_samples)
        .map(|i| ImuSample::new(i * SAMPLE_INTERVAL_MS, [0.0, 0.0, 9.81], [0.0; 3]))
        .collect()
}

/// Helper: device held with gravity on z, one rep per period.
///
/// Rotation about `gyro_axis` rises 0 -> peak -> 0 as a raised cosine. The
/// vertical drive `push` is a sine that lifts during the second half of each
/// cycle, when the rotation peaks.
fn rep_set_profile(
    duration_ms: u64,
    period_ms: u64,
    gyro_axis: usize,
    peak_rad_s: f32,
    push_m_s2: f32,
) -> Vec<ImuSample> {
    (0..duration_ms / SAMPLE_INTERVAL_MS)
        .map(|i| {
            let t = i * SAMPLE_INTERVAL_MS;
            let phase = (t % period_ms) as f32 / period_ms as f32;
            let mut gyro = [0.0; 3];
            gyro[gyro_axis] = peak_rad_s * 0.5 * (1.0 - (2.0 * PI * phase).cos());
            let lift = -push_m_s2 * (2.0 * PI * phase).sin();
            ImuSample::new(t, [0.0, 0.0, 9.81 + lift], gyro)
        })
        .collect()
}

/// Helper: curl, rotation about device y (the gravity frame's u axis)
fn curl_profile(duration_ms: u64, period_ms: u64, peak_rad_s: f32) -> Vec<ImuSample> {
    rep_set_profile(duration_ms, period_ms, 1, peak_rad_s, 0.0)
}

/// Helper: lateral raise, rotation about device x (the frame's v axis)
fn lateral_raise_profile() -> Vec<ImuSample> {
    rep_set_profile(10_000, 1000, 0, 3.0, 0.0)
}

/// Helper: press, forearm turning about gravity while the weight is driven up
fn press_profile() -> Vec<ImuSample> {
    rep_set_profile(15_000, 1500, 2, 3.0, 3.0)
}

/// Helper: squat, little rotation and strong vertical travel
fn squat_profile(push_m_s2: f32) -> Vec<ImuSample> {
    rep_set_profile(20_000, 2000, 1, 0.9, push_m_s2)
}

/// Helper: signed sinusoid on gyro y with a lift bump on accel z
fn batch_profile(cycles: usize, period_samples: usize) -> Vec<ImuSample> {
    (0..cycles * period_samples)
        .map(|i| {
            let phase = (i % period_samples) as f32 / period_samples as f32;
            let bump = if (0.25..0.75).contains(&phase) { 3.0 } else { 0.0 };
            ImuSample::new(
                i as u64 * SAMPLE_INTERVAL_MS,
                [0.0, 0.0, 9.81 + bump],
                [0.0, 2.5 * (2.0 * PI * phase).sin(), 0.0],
            )
        })
        .collect()
}

fn run_engine(engine: &mut RepEngine, samples: &[ImuSample]) -> Vec<EngineOutput> {
    samples.iter().map(|s| engine.update(s)).collect()
}

/// Run a ten-cycle set and check that every cycle became one rep of `exercise`.
fn assert_counts_set(mode: ExerciseMode, samples: &[ImuSample], exercise: Exercise) -> RepEngine {
    let mut engine = RepEngine::with_defaults(mode);
    let reps = engine.process_batch(samples);
    assert!(
        (9..=10).contains(&reps.len()),
        "{mode:?}: expected 9-10 {exercise} reps, got {}",
        reps.len()
    );
    assert!(reps.iter().all(|r| r.exercise == exercise));
    assert!(reps.iter().all(|r| r.form == FormJudgment::Good));
    assert_eq!(engine.current_exercise(), Some(exercise));
    assert_eq!(engine.stats().get(exercise).good as usize, reps.len());
    assert_eq!(engine.state(), MovementState::Idle);
    engine
}

fn assert_tallies_consistent(engine: &RepEngine) {
    for stats in engine.stats().per_exercise.values() {
        assert_eq!(stats.good + stats.bad, stats.total);
    }
}

#[test]
fn test_still_device_counts_nothing() {
    let mut engine = RepEngine::with_defaults(ExerciseMode::Fixed(Exercise::Curl));
    let outputs = run_engine(&mut engine, &still_profile(100));

    assert!(outputs.iter().all(|o| o.state == MovementState::Idle));
    assert!(outputs.iter().all(|o| o.rep.is_none() && !o.missed_rep));
    assert!(outputs.iter().all(|o| o.energy == 0.0));
    assert_eq!(engine.stats().total_reps(), 0);
}

#[test]
fn test_one_hz_curl_set() {
    let mut engine = RepEngine::with_defaults(ExerciseMode::Fixed(Exercise::Curl));
    let outputs = run_engine(&mut engine, &curl_profile(10_000, 1000, 3.0));

    let reps: Vec<RepEvent> = outputs.iter().filter_map(|o| o.rep).collect();
    assert!((9..=10).contains(&reps.len()), "expected 9-10 reps, got {}", reps.len());
    assert!(reps.iter().all(|r| r.exercise == Exercise::Curl));
    assert!(reps.iter().all(|r| r.form == FormJudgment::Good));
    assert_eq!(outputs.last().map(|o| o.state), Some(MovementState::Idle));

    let curl = engine.stats().get(Exercise::Curl);
    assert_eq!(curl.total as usize, reps.len());
    assert_eq!(engine.stats().current_set.stats.total as usize, reps.len());
    assert_tallies_consistent(&engine);
}

#[test]
fn test_rep_timestamps_respect_refractory_period() {
    let mut engine = RepEngine::with_defaults(ExerciseMode::Fixed(Exercise::Curl));
    let min_rep_ms = engine.profiles().get(Exercise::Curl).min_rep_ms;
    let reps = engine.process_batch(&curl_profile(10_000, 1000, 3.0));
    for pair in reps.windows(2) {
        assert!(pair[1].timestamp_ms - pair[0].timestamp_ms > min_rep_ms);
    }
}

#[test]
fn test_slower_cadence_counts_one_rep_per_period() {
    let duration_ms = 14_000;
    let period_ms = 2000;
    let mut engine = RepEngine::with_defaults(ExerciseMode::Fixed(Exercise::Curl));
    let reps = engine.process_batch(&curl_profile(duration_ms, period_ms, 3.0));

    let expected = (duration_ms / period_ms) as i64;
    assert!(
        (reps.len() as i64 - expected).abs() <= 1,
        "expected {expected} +/- 1 reps, got {}",
        reps.len()
    );
}

#[test]
fn test_fixed_mode_records_classification_accuracy() {
    let mut engine = RepEngine::with_defaults(ExerciseMode::Fixed(Exercise::Curl));
    engine.process_batch(&curl_profile(5000, 1000, 3.0));
    let curl = engine.stats().get(Exercise::Curl);
    assert!(curl.total_classifications > 0);
    assert_eq!(curl.total_classifications, curl.reps());
    assert_eq!(curl.accuracy(), Some(1.0));
}

#[test]
fn test_auto_mode_identifies_curl() {
    let mut engine = RepEngine::with_defaults(ExerciseMode::Auto);
    let mut samples = still_profile(50);
    samples.extend(curl_profile(10_000, 1000, 3.0).into_iter().map(|mut s| {
        s.timestamp_ms += 1000;
        s
    }));
    let outputs = run_engine(&mut engine, &samples);

    // Nothing is identified while the device rests
    assert!(outputs[..50].iter().all(|o| o.exercise.is_none()));
    assert_eq!(engine.current_exercise(), Some(Exercise::Curl));

    let reps = outputs.iter().filter(|o| o.rep.is_some()).count();
    assert!((8..=10).contains(&reps), "expected 8-10 reps, got {reps}");
    assert_eq!(engine.stats().get(Exercise::Curl).reps() as usize, reps);
    assert_eq!(engine.stats().current_set.exercise, Some(Exercise::Curl));
}

#[test]
fn test_lateral_raise_set_fixed_and_auto() {
    let samples = lateral_raise_profile();
    let engine = assert_counts_set(ExerciseMode::Fixed(Exercise::LateralRaise), &samples, Exercise::LateralRaise);
    assert_eq!(engine.stats().get(Exercise::LateralRaise).accuracy(), Some(1.0));
    assert_counts_set(ExerciseMode::Auto, &samples, Exercise::LateralRaise);
}

#[test]
fn test_press_set_fixed_and_auto() {
    let samples = press_profile();
    let engine = assert_counts_set(ExerciseMode::Fixed(Exercise::Press), &samples, Exercise::Press);
    assert_eq!(engine.stats().get(Exercise::Press).accuracy(), Some(1.0));
    assert_counts_set(ExerciseMode::Auto, &samples, Exercise::Press);
}

#[test]
fn test_squat_set_fixed_and_auto() {
    let samples = squat_profile(8.0);
    let engine = assert_counts_set(ExerciseMode::Fixed(Exercise::Squat), &samples, Exercise::Squat);
    assert_eq!(engine.stats().get(Exercise::Squat).accuracy(), Some(1.0));
    assert_counts_set(ExerciseMode::Auto, &samples, Exercise::Squat);
}

#[test]
fn test_auto_mode_leaves_gentle_squat_unidentified() {
    // Slow rotation and too little vertical travel to call it a squat:
    // nothing is identified, so nothing is mislabelled or counted
    let mut engine = RepEngine::with_defaults(ExerciseMode::Auto);
    let outputs = run_engine(&mut engine, &squat_profile(4.0));
    assert!(outputs.iter().all(|o| o.exercise.is_none()));
    assert_eq!(engine.stats().total_reps(), 0);

    // The same motion still counts once the exercise is selected
    let mut fixed = RepEngine::with_defaults(ExerciseMode::Fixed(Exercise::Squat));
    let reps = fixed.process_batch(&squat_profile(4.0));
    assert!((9..=10).contains(&reps.len()), "got {} reps", reps.len());
}

#[test]
fn test_exercise_switch_keeps_session_totals() {
    let mut engine = RepEngine::with_defaults(ExerciseMode::Fixed(Exercise::Curl));
    engine.process_batch(&curl_profile(5000, 1000, 3.0));
    let curls = engine.stats().get(Exercise::Curl).reps();
    assert!(curls > 0);

    engine.set_mode(ExerciseMode::Fixed(Exercise::LateralRaise));
    assert_eq!(engine.stats().current_set.exercise, Some(Exercise::LateralRaise));
    assert_eq!(engine.stats().current_set.stats.reps(), 0);
    assert_eq!(engine.stats().get(Exercise::Curl).reps(), curls);
}

#[test]
fn test_weak_sustained_motion_becomes_missed_rep() {
    let mut engine = RepEngine::with_defaults(ExerciseMode::Fixed(Exercise::Curl));
    // Above the movement threshold but never strong enough for a rep
    let samples: Vec<ImuSample> = (0..250)
        .map(|i| ImuSample::new(i * SAMPLE_INTERVAL_MS, [0.0, 0.0, 9.81], [0.0, 1.2, 0.0]))
        .collect();
    let outputs = run_engine(&mut engine, &samples);

    assert!(outputs.iter().any(|o| o.missed_rep));
    assert_eq!(engine.stats().total_reps(), 0);
    assert!(engine.stats().missed_reps >= 1);
    assert_eq!(engine.stats().get(Exercise::Curl).missed, engine.stats().missed_reps);
}

#[test]
fn test_reset_matches_fresh_engine() {
    let samples = curl_profile(6000, 1000, 3.0);

    let mut fresh = RepEngine::with_defaults(ExerciseMode::Fixed(Exercise::Curl));
    let expected = run_engine(&mut fresh, &samples);

    let mut reused = RepEngine::with_defaults(ExerciseMode::Fixed(Exercise::Curl));
    run_engine(&mut reused, &curl_profile(4000, 700, 4.0));
    reused.reset();
    assert_eq!(reused.samples_processed(), 0);
    assert_eq!(reused.stats(), RepEngine::with_defaults(ExerciseMode::Fixed(Exercise::Curl)).stats());

    let actual = run_engine(&mut reused, &samples);
    assert_eq!(actual, expected);
}

#[test]
fn test_auto_reset_forgets_identity() {
    let mut engine = RepEngine::with_defaults(ExerciseMode::Auto);
    engine.process_batch(&curl_profile(2000, 1000, 3.0));
    assert!(engine.current_exercise().is_some());
    engine.reset();
    assert_eq!(engine.current_exercise(), None);
    assert_eq!(engine.stats().total_reps(), 0);
}

#[test]
fn test_edge_case_single_sample() {
    let mut engine = RepEngine::with_defaults(ExerciseMode::Auto);
    let output = engine.update(&ImuSample::new(0, [0.0, 0.0, 9.81], [0.0; 3]));
    assert_eq!(output.state, MovementState::Idle);
    assert!(output.rep.is_none());
    assert_eq!(output.timestamp_ms, 0);
}

#[test]
fn test_edge_case_nan_samples() {
    let mut engine = RepEngine::with_defaults(ExerciseMode::Fixed(Exercise::Curl));
    let mut samples = curl_profile(2000, 1000, 3.0);
    for sample in samples.iter_mut().step_by(7) {
        sample.gyro[1] = f32::NAN;
        sample.accel[0] = f32::INFINITY;
    }
    for output in run_engine(&mut engine, &samples) {
        assert!(output.features.gyro_magnitude.is_finite());
        assert!(output.features.vertical_accel.is_finite());
        assert!(output.filtered_gyro.is_finite());
        assert!(output.energy.is_finite());
    }
    assert_tallies_consistent(&engine);
}

#[test]
fn test_edge_case_zero_vectors() {
    let mut engine = RepEngine::with_defaults(ExerciseMode::Auto);
    for i in 0..100 {
        let output = engine.update(&ImuSample::new(i * SAMPLE_INTERVAL_MS, [0.0; 3], [0.0; 3]));
        assert!(output.features.gravity_dir.is_finite());
        assert!(output.features.axis_ratios.iter().all(|r| r.is_finite()));
        assert!(output.rep.is_none());
    }
}

#[test]
fn test_edge_case_extreme_values() {
    let mut engine = RepEngine::with_defaults(ExerciseMode::Fixed(Exercise::Squat));
    for i in 0..200 {
        let sign = if i % 2 == 0 { 1.0 } else { -1.0 };
        let sample = ImuSample::new(
            i * SAMPLE_INTERVAL_MS,
            [sign * 1.0e6, 0.0, 9.81],
            [0.0, sign * 1.0e4, 0.0],
        );
        let output = engine.update(&sample);
        assert!(output.features.gyro_magnitude.is_finite());
    }
    assert_tallies_consistent(&engine);
}

#[test]
fn test_edge_case_non_monotonic_timestamps() {
    let mut engine = RepEngine::with_defaults(ExerciseMode::Fixed(Exercise::Curl));
    // Producer restarts its clock mid-stream without resetting the engine
    let mut samples = curl_profile(4000, 1000, 3.0);
    samples.extend(curl_profile(4000, 1000, 3.0));
    let outputs = run_engine(&mut engine, &samples);
    assert_eq!(outputs.len(), samples.len());

    let half = samples.len() / 2;
    let before = outputs[..half].iter().filter(|o| o.rep.is_some()).count();
    let after = outputs[half..].iter().filter(|o| o.rep.is_some()).count();
    assert_eq!(before, 4);
    assert_eq!(after, before);
    assert_tallies_consistent(&engine);
}

#[test]
fn test_batch_analysis_segments_set() {
    let samples = batch_profile(10, 50);
    let analyzer = BatchRepAnalyzer::new(&EngineConfig::default()).unwrap();
    let analysis = analyzer.analyze(&samples).unwrap();

    assert!(
        (8..=10).contains(&analysis.windows.len()),
        "expected 8-10 windows, got {}",
        analysis.windows.len()
    );
    let labeled = analysis.windows.iter().filter(|w| w.label.is_some()).count();
    assert_eq!(analysis.reps.len(), labeled);
    for (rep, window) in analysis
        .reps
        .iter()
        .zip(analysis.windows.iter().filter(|w| w.label.is_some()))
    {
        assert_eq!(rep.timestamp_ms, window.window.end_ms);
        assert_eq!(rep.form, FormJudgment::Unknown);
        assert!(rep.energy > 0.0);
    }
}

#[test]
fn test_batch_labels_with_matching_reference() {
    let samples = batch_profile(10, 50);
    let analysis = BatchRepAnalyzer::new(&EngineConfig::default())
        .unwrap()
        .analyze(&samples)
        .unwrap();
    let first = analysis.windows[0].window;
    let std_dev = channel_std_dev(first.slice(&samples)).unwrap();

    let mut config = EngineConfig::default();
    config.batch.reference = ReferenceConfig {
        references: vec![ReferenceVector {
            exercise: Exercise::LateralRaise,
            std_dev,
        }],
        max_distance: 1.0,
    };
    let analysis = BatchRepAnalyzer::new(&config).unwrap().analyze(&samples).unwrap();
    assert_eq!(analysis.reps.len(), analysis.windows.len());
    assert!(analysis.reps.iter().all(|r| r.exercise == Exercise::LateralRaise));

    let mut session = SessionAggregator::new();
    analysis.apply_to(&mut session, Some(Exercise::LateralRaise));
    let raise = session.stats().get(Exercise::LateralRaise);
    assert_eq!(raise.unjudged as usize, analysis.reps.len());
    assert_eq!(raise.accuracy(), Some(1.0));
    assert_eq!(raise.total, 0);
}

#[test]
fn test_strategies_agree_on_clean_set() {
    let samples = curl_profile(10_000, 1000, 3.0);
    let mut config = EngineConfig::default();
    config.batch.reference.max_distance = 100.0;

    let mut strategies: Vec<Box<dyn RepStrategy>> = vec![
        Box::new(RepEngine::new(config.clone(), ExerciseMode::Fixed(Exercise::Curl)).unwrap()),
        Box::new(BatchRepAnalyzer::new(&config).unwrap()),
    ];
    for strategy in strategies.iter_mut() {
        let count = strategy.count_reps(&samples).len();
        assert!((8..=10).contains(&count), "expected 8-10 reps, got {count}");
    }
}

#[test]
fn test_config_from_toml_drives_engine() {
    let config = EngineConfig::from_toml_str(
        r#"
        [profiles.curl]
        min_rep_ms = 1500
        "#,
    )
    .unwrap();
    let mut engine = RepEngine::new(config, ExerciseMode::Fixed(Exercise::Curl)).unwrap();
    let reps = engine.process_batch(&curl_profile(10_000, 1000, 3.0));
    // Every other peak falls inside the longer refractory period
    assert!((4..=6).contains(&reps.len()), "expected 4-6 reps, got {}", reps.len());
}
