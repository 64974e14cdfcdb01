//! Exercise identification.
//!
//! Two strategies:
//! - [`RatioClassifier`]: a streaming rule cascade over the gravity-frame
//!   features of the current sample, gated by [`ClassificationGate`] so the
//!   identity cannot flap mid-set.
//! - [`NearestReferenceClassifier`]: batch classification of a finished rep
//!   window by distance between its per-channel standard deviations and a
//!   table of reference vectors.
//!
//! The reference vectors and distance cutoff were fitted to one sensor and
//! one placement. They are configuration, not invariants.

use log::info;
use serde::{Deserialize, Serialize};

use crate::features::{FeatureSet, FrameAxis};
use crate::types::{Exercise, ImuSample};

/// Rule-cascade thresholds and re-classification cadence.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Below this gyro magnitude only the squat rule can match. Slower
    /// rotation is left unidentified rather than guessed from its ratios.
    pub min_rotation_gyro: f32,
    /// |vertical accel| above which a low-rotation movement is a squat.
    pub squat_vert_min: f32,
    /// Gyro magnitude a squat must stay under.
    pub squat_max_gyro: f32,
    /// `w` ratio above which the movement is a press.
    pub press_rotation_ratio: f32,
    /// Minimum time between identity changes.
    pub cooldown_ms: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            min_rotation_gyro: 1.0,
            squat_vert_min: 3.0,
            squat_max_gyro: 1.0,
            press_rotation_ratio: 0.7,
            cooldown_ms: 5000,
        }
    }
}

/// Ordered heuristics over axis ratios and vertical acceleration.
#[derive(Debug, Clone, PartialEq)]
pub struct RatioClassifier {
    config: ClassifierConfig,
}

impl RatioClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    /// First matching rule wins; `None` when no rule matches.
    pub fn classify(&self, f: &FeatureSet) -> Option<Exercise> {
        let va = f.vertical_accel.abs();
        let c = &self.config;

        if va > c.squat_vert_min && f.gyro_magnitude < c.squat_max_gyro {
            return Some(Exercise::Squat);
        }
        if !(f.gyro_magnitude >= c.min_rotation_gyro) {
            return None;
        }
        if f.ratio(FrameAxis::W) > c.press_rotation_ratio {
            return Some(Exercise::Press);
        }

        // Largest axis ratio; earlier axis keeps ties
        let candidates = [
            (FrameAxis::U, Exercise::Curl),
            (FrameAxis::V, Exercise::LateralRaise),
            (FrameAxis::W, Exercise::Press),
        ];
        let mut best = candidates[0];
        for candidate in &candidates[1..] {
            if f.ratio(candidate.0) > f.ratio(best.0) {
                best = *candidate;
            }
        }
        Some(best.1)
    }
}

impl Default for RatioClassifier {
    fn default() -> Self {
        Self::new(ClassifierConfig::default())
    }
}

/// Holds the current identity and only lets it change after a cooldown.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationGate {
    cooldown_ms: u64,
    current: Option<Exercise>,
    last_change_ms: Option<u64>,
}

impl ClassificationGate {
    pub fn new(cooldown_ms: u64) -> Self {
        Self {
            cooldown_ms,
            current: None,
            last_change_ms: None,
        }
    }

    /// Is a new candidate allowed to replace the current identity now?
    pub fn is_open(&self, timestamp_ms: u64) -> bool {
        match (self.current, self.last_change_ms) {
            (None, _) | (_, None) => true,
            (Some(_), Some(last)) => timestamp_ms.saturating_sub(last) >= self.cooldown_ms,
        }
    }

    /// Offer a classification; returns the identity in force afterwards.
    ///
    /// `None` candidates never clear an existing identity.
    pub fn offer(&mut self, candidate: Option<Exercise>, timestamp_ms: u64) -> Option<Exercise> {
        if let Some(candidate) = candidate {
            if self.current != Some(candidate) && self.is_open(timestamp_ms) {
                info!(
                    "exercise identified as {candidate} at {timestamp_ms} ms (was {:?})",
                    self.current
                );
                self.current = Some(candidate);
                self.last_change_ms = Some(timestamp_ms);
            }
        }
        self.current
    }

    pub fn current(&self) -> Option<Exercise> {
        self.current
    }

    pub fn reset(&mut self) {
        self.current = None;
        self.last_change_ms = None;
    }
}

/// Number of channels in a reference vector: accel x/y/z then gyro x/y/z.
pub const CHANNELS: usize = 6;

/// Per-channel standard deviations typical of one exercise's rep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceVector {
    pub exercise: Exercise,
    pub std_dev: [f32; CHANNELS],
}

/// Reference table and acceptance cutoff.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ReferenceConfig {
    pub references: Vec<ReferenceVector>,
    /// Nearest reference further than this yields no label.
    pub max_distance: f32,
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self {
            references: vec![
                ReferenceVector {
                    exercise: Exercise::Curl,
                    std_dev: [2.0, 1.0, 3.0, 0.4, 2.2, 0.5],
                },
                ReferenceVector {
                    exercise: Exercise::LateralRaise,
                    std_dev: [1.0, 2.5, 2.0, 2.0, 0.4, 0.6],
                },
                ReferenceVector {
                    exercise: Exercise::Press,
                    std_dev: [0.8, 0.8, 3.5, 0.6, 0.7, 0.5],
                },
                ReferenceVector {
                    exercise: Exercise::Squat,
                    std_dev: [0.5, 0.5, 2.0, 0.2, 0.3, 0.2],
                },
            ],
            max_distance: 2.5,
        }
    }
}

/// Label chosen for a window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReferenceMatch {
    pub exercise: Exercise,
    pub distance: f32,
}

/// Population standard deviation of each channel over `samples`.
///
/// `None` for an empty slice.
pub fn channel_std_dev(samples: &[ImuSample]) -> Option<[f32; CHANNELS]> {
    if samples.is_empty() {
        return None;
    }
    let n = samples.len() as f32;
    let channel = |s: &ImuSample, c: usize| if c < 3 { s.accel[c] } else { s.gyro[c - 3] };

    let mut out = [0.0; CHANNELS];
    for (c, slot) in out.iter_mut().enumerate() {
        let mean = samples.iter().map(|s| channel(s, c)).sum::<f32>() / n;
        let variance = samples
            .iter()
            .map(|s| {
                let d = channel(s, c) - mean;
                d * d
            })
            .sum::<f32>()
            / n;
        *slot = variance.sqrt();
    }
    Some(out)
}

/// Nearest-neighbour matching against reference standard deviations.
#[derive(Debug, Clone, PartialEq)]
pub struct NearestReferenceClassifier {
    config: ReferenceConfig,
}

impl NearestReferenceClassifier {
    pub fn new(config: ReferenceConfig) -> Self {
        Self { config }
    }

    /// Nearest reference to `std_dev`, if within the cutoff.
    ///
    /// On equal distances the earlier table entry wins.
    pub fn classify_stats(&self, std_dev: &[f32; CHANNELS]) -> Option<ReferenceMatch> {
        let mut best: Option<ReferenceMatch> = None;
        for reference in &self.config.references {
            let distance = std_dev
                .iter()
                .zip(reference.std_dev.iter())
                .map(|(a, b)| (a - b) * (a - b))
                .sum::<f32>()
                .sqrt();
            if best.map_or(true, |b| distance < b.distance) {
                best = Some(ReferenceMatch {
                    exercise: reference.exercise,
                    distance,
                });
            }
        }
        best.filter(|m| m.distance <= self.config.max_distance)
    }

    pub fn classify_window(&self, samples: &[ImuSample]) -> Option<ReferenceMatch> {
        channel_std_dev(samples).and_then(|stats| self.classify_stats(&stats))
    }

    pub fn references(&self) -> &[ReferenceVector] {
        &self.config.references
    }
}

impl Default for NearestReferenceClassifier {
    fn default() -> Self {
        Self::new(ReferenceConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn features(ratios: [f32; 3], gyro_magnitude: f32, vertical_accel: f32) -> FeatureSet {
        FeatureSet {
            axis_ratios: ratios,
            gyro_magnitude,
            vertical_accel,
            ..Default::default()
        }
    }

    #[test]
    fn test_still_sample_is_unknown() {
        let classifier = RatioClassifier::default();
        assert_eq!(classifier.classify(&features([0.0; 3], 0.0, 0.0)), None);
    }

    #[test]
    fn test_vertical_travel_with_low_rotation_is_squat() {
        let classifier = RatioClassifier::default();
        assert_eq!(
            classifier.classify(&features([0.5, 0.5, 0.1], 0.4, -4.0)),
            Some(Exercise::Squat)
        );
    }

    #[test]
    fn test_slow_rotation_without_vertical_travel_is_unknown() {
        let classifier = RatioClassifier::default();
        // Start of a slow squat: too little rotation to judge by ratios
        assert_eq!(classifier.classify(&features([0.9, 0.3, 0.2], 0.9, 1.0)), None);
        assert_eq!(classifier.classify(&features([0.9, 0.3, 0.2], 0.9, -3.5)), Some(Exercise::Squat));
    }

    #[test]
    fn test_high_w_ratio_is_press() {
        let classifier = RatioClassifier::default();
        assert_eq!(
            classifier.classify(&features([0.3, 0.3, 0.9], 2.0, 0.0)),
            Some(Exercise::Press)
        );
    }

    #[test]
    fn test_fallback_to_largest_ratio() {
        let classifier = RatioClassifier::default();
        assert_eq!(
            classifier.classify(&features([0.9, 0.3, 0.2], 2.0, 0.0)),
            Some(Exercise::Curl)
        );
        assert_eq!(
            classifier.classify(&features([0.3, 0.9, 0.2], 2.0, 0.0)),
            Some(Exercise::LateralRaise)
        );
        // Tie between u and v keeps the earlier axis
        assert_eq!(
            classifier.classify(&features([0.6, 0.6, 0.5], 2.0, 0.0)),
            Some(Exercise::Curl)
        );
    }

    #[test]
    fn test_gate_holds_identity_during_cooldown() {
        let mut gate = ClassificationGate::new(5000);
        assert_eq!(gate.offer(Some(Exercise::Curl), 1000), Some(Exercise::Curl));
        assert_eq!(gate.offer(Some(Exercise::Press), 3000), Some(Exercise::Curl));
        assert_eq!(gate.offer(None, 4000), Some(Exercise::Curl));
        assert_eq!(gate.offer(Some(Exercise::Press), 6000), Some(Exercise::Press));
        assert_eq!(gate.offer(Some(Exercise::Curl), 7000), Some(Exercise::Press));
    }

    #[test]
    fn test_gate_reset_clears_identity() {
        let mut gate = ClassificationGate::new(5000);
        gate.offer(Some(Exercise::Squat), 0);
        gate.reset();
        assert_eq!(gate.current(), None);
        assert_eq!(gate.offer(Some(Exercise::Curl), 10), Some(Exercise::Curl));
    }

    #[test]
    fn test_std_dev_of_constant_window_is_zero() {
        let samples = vec![ImuSample::new(0, [0.0, 0.0, 9.81], [0.1, 0.2, 0.3]); 10];
        let stats = channel_std_dev(&samples).unwrap();
        assert!(stats.iter().all(|s| s.abs() < 1e-5));
        assert!(channel_std_dev(&[]).is_none());
    }

    #[test]
    fn test_std_dev_alternating_values() {
        let samples: Vec<ImuSample> = (0..10)
            .map(|i| {
                let a = if i % 2 == 0 { 1.0 } else { -1.0 };
                ImuSample::new(i, [a, 0.0, 0.0], [0.0, 0.0, 2.0 * a])
            })
            .collect();
        let stats = channel_std_dev(&samples).unwrap();
        assert_relative_eq!(stats[0], 1.0, epsilon = 1e-5);
        assert_relative_eq!(stats[5], 2.0, epsilon = 1e-5);
    }

    #[test]
    fn test_exact_reference_match_selects_label() {
        let classifier = NearestReferenceClassifier::default();
        for reference in classifier.references() {
            let m = classifier.classify_stats(&reference.std_dev).unwrap();
            assert_eq!(m.exercise, reference.exercise);
            assert_eq!(m.distance, 0.0);
        }
    }

    #[test]
    fn test_far_from_every_reference_is_unknown() {
        let classifier = NearestReferenceClassifier::default();
        assert!(classifier.classify_stats(&[20.0; CHANNELS]).is_none());
    }

    #[test]
    fn test_empty_reference_table_is_unknown() {
        let classifier = NearestReferenceClassifier::new(ReferenceConfig {
            references: Vec::new(),
            max_distance: 10.0,
        });
        assert!(classifier.classify_stats(&[0.0; CHANNELS]).is_none());
    }
}
