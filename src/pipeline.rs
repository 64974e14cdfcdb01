//! End-to-end rep detection.
//!
//! Data flows one way:
//! 1. **Feature extraction**: gravity frame, projected gyro/accel, ratios
//! 2. **Identification**: fixed exercise, or ratio cascade behind a cooldown gate
//! 3. **Rep state machine**: hysteresis, peaks, refractory, validity, form
//! 4. **Aggregation**: per-exercise and per-set tallies
//!
//! [`RepEngine`] runs this per sample. [`BatchRepAnalyzer`] is the
//! alternative that segments a whole recorded set at once. Both implement
//! [`RepStrategy`], so callers can swap them.
//!
//! # Concurrency
//! One engine owns all of its state. It is synchronous and single-threaded;
//! callers deliver samples from one stream at a time.

use log::{info, warn};
use serde::Serialize;

use crate::classifier::{ClassificationGate, NearestReferenceClassifier, RatioClassifier, ReferenceMatch};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::features::{FeatureSet, GravityFrameExtractor};
use crate::profile::ProfileTable;
use crate::rep_detection::RepStateMachine;
use crate::segmentation::{
    select_windows, AccelThresholdSegmenter, RepWindow, SegmentationSource, Segmenter,
    ZeroCrossingSegmenter,
};
use crate::session::{SessionAggregator, SessionStats};
use crate::types::{Exercise, FormJudgment, ImuSample, MovementState, RepEvent};

/// How the engine knows which exercise is being performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExerciseMode {
    /// Selected externally; its profile is used for every sample.
    Fixed(Exercise),
    /// Inferred from the motion by the ratio cascade.
    Auto,
}

/// Interchangeable rep counting strategies.
pub trait RepStrategy {
    /// Count the reps in `samples`.
    fn count_reps(&mut self, samples: &[ImuSample]) -> Vec<RepEvent>;
}

/// Per-sample engine output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineOutput {
    pub timestamp_ms: u64,
    pub features: FeatureSet,
    pub state: MovementState,
    /// Smoothed gyro magnitude fed to the peak detector.
    pub filtered_gyro: f32,
    pub energy: f32,
    /// Rep confirmed on this sample.
    pub rep: Option<RepEvent>,
    /// A stuck movement episode was closed as a missed rep.
    pub missed_rep: bool,
    /// Exercise in force for this sample.
    pub exercise: Option<Exercise>,
    pub stats: SessionStats,
}

/// Streaming rep detector for one sample stream.
#[derive(Debug, Clone)]
pub struct RepEngine {
    config: EngineConfig,
    profiles: ProfileTable,
    mode: ExerciseMode,
    extractor: GravityFrameExtractor,
    machine: RepStateMachine,
    classifier: RatioClassifier,
    gate: ClassificationGate,
    session: SessionAggregator,
    samples_processed: u64,
}

impl RepEngine {
    /// Create an engine; fails on invalid configuration or profile keys.
    pub fn new(config: EngineConfig, mode: ExerciseMode) -> Result<Self> {
        config.validate()?;
        let profiles = config.profile_table()?;
        Ok(Self::from_parts(config, profiles, mode))
    }

    /// Engine with default configuration.
    pub fn with_defaults(mode: ExerciseMode) -> Self {
        Self::from_parts(EngineConfig::default(), ProfileTable::default(), mode)
    }

    /// Engine with an explicit profile table (e.g. per-user calibration).
    pub fn with_profiles(config: EngineConfig, profiles: ProfileTable, mode: ExerciseMode) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_parts(config, profiles, mode))
    }

    fn from_parts(config: EngineConfig, profiles: ProfileTable, mode: ExerciseMode) -> Self {
        let mut engine = Self {
            extractor: GravityFrameExtractor::new(&config.filter),
            machine: RepStateMachine::new(&config.detection, &config.filter, config.sample_rate_hz),
            classifier: RatioClassifier::new(config.classifier.clone()),
            gate: ClassificationGate::new(config.classifier.cooldown_ms),
            session: SessionAggregator::new(),
            samples_processed: 0,
            config,
            profiles,
            mode,
        };
        engine.start_set();
        engine
    }

    /// Process one sample to completion.
    pub fn update(&mut self, sample: &ImuSample) -> EngineOutput {
        if !sample.is_finite() {
            warn!(
                "non-finite sample at {} ms, zeroing invalid components",
                sample.timestamp_ms
            );
        }
        let timestamp_ms = sample.timestamp_ms;
        let features = self.extractor.extract(sample.gyro_vec(), sample.accel_vec());

        let exercise = match self.mode {
            ExerciseMode::Fixed(exercise) => Some(exercise),
            ExerciseMode::Auto => {
                let before = self.gate.current();
                let candidate = self.classifier.classify(&features);
                let after = self.gate.offer(candidate, timestamp_ms);
                if after != before {
                    self.session.start_set(after);
                }
                after
            }
        };

        let profile = exercise.map(|e| self.profiles.get(e));
        let step = self.machine.update(&features, timestamp_ms, profile);

        if let Some(rep) = &step.rep {
            self.session.apply(rep);
            if let ExerciseMode::Fixed(selected) = self.mode {
                let predicted = self.classifier.classify(&features);
                self.session.record_classification(selected, predicted);
            }
        }
        if step.missed_rep {
            self.session.record_missed(exercise);
        }
        self.samples_processed += 1;

        EngineOutput {
            timestamp_ms,
            features,
            state: step.state,
            filtered_gyro: step.filtered_gyro,
            energy: step.energy,
            rep: step.rep,
            missed_rep: step.missed_rep,
            exercise,
            stats: self.session.stats().clone(),
        }
    }

    /// Process a batch of samples and return all reps detected.
    pub fn process_batch(&mut self, samples: &[ImuSample]) -> Vec<RepEvent> {
        samples.iter().filter_map(|s| self.update(s).rep).collect()
    }

    /// Switch exercise mode. Detection state restarts and a new set begins;
    /// the gravity estimate and session totals are kept.
    pub fn set_mode(&mut self, mode: ExerciseMode) {
        info!("exercise mode {:?} -> {:?}", self.mode, mode);
        self.mode = mode;
        self.machine.reset();
        self.gate.reset();
        self.start_set();
    }

    /// Full reset: behaves exactly like a freshly constructed engine.
    pub fn reset(&mut self) {
        info!("engine reset after {} samples", self.samples_processed);
        self.extractor.reset();
        self.machine.reset();
        self.gate.reset();
        self.session.reset();
        self.samples_processed = 0;
        self.start_set();
    }

    fn start_set(&mut self) {
        let exercise = match self.mode {
            ExerciseMode::Fixed(exercise) => Some(exercise),
            ExerciseMode::Auto => None,
        };
        self.session.start_set(exercise);
    }

    pub fn mode(&self) -> ExerciseMode {
        self.mode
    }

    pub fn state(&self) -> MovementState {
        self.machine.state()
    }

    pub fn current_exercise(&self) -> Option<Exercise> {
        match self.mode {
            ExerciseMode::Fixed(exercise) => Some(exercise),
            ExerciseMode::Auto => self.gate.current(),
        }
    }

    pub fn stats(&self) -> &SessionStats {
        self.session.stats()
    }

    pub fn profiles(&self) -> &ProfileTable {
        &self.profiles
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn samples_processed(&self) -> u64 {
        self.samples_processed
    }
}

impl RepStrategy for RepEngine {
    fn count_reps(&mut self, samples: &[ImuSample]) -> Vec<RepEvent> {
        self.process_batch(samples)
    }
}

/// Classification of one batch window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WindowClassification {
    pub window: RepWindow,
    /// Nearest reference within the cutoff, `None` when unknown.
    pub label: Option<ReferenceMatch>,
}

/// Result of analyzing one recorded set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchAnalysis {
    pub source: SegmentationSource,
    pub windows: Vec<WindowClassification>,
    /// One rep per window with a known label.
    pub reps: Vec<RepEvent>,
}

impl BatchAnalysis {
    /// Fold this analysis into a session. With an `expected` exercise each
    /// window also counts towards classification accuracy.
    pub fn apply_to(&self, session: &mut SessionAggregator, expected: Option<Exercise>) {
        if let Some(expected) = expected {
            for window in &self.windows {
                session.record_classification(expected, window.label.map(|m| m.exercise));
            }
        }
        for rep in &self.reps {
            session.apply(rep);
        }
    }
}

/// Batch rep counter: segment a finished set, then label each window.
#[derive(Debug, Clone)]
pub struct BatchRepAnalyzer {
    zero_crossing: ZeroCrossingSegmenter,
    accel_threshold: AccelThresholdSegmenter,
    reference: NearestReferenceClassifier,
    sample_rate_hz: f32,
    min_samples: usize,
}

impl BatchRepAnalyzer {
    pub fn new(config: &EngineConfig) -> Result<Self> {
        config.validate()?;
        let batch = &config.batch;
        Ok(Self {
            zero_crossing: ZeroCrossingSegmenter::new(batch.zero_crossing.clone(), config.sample_rate_hz),
            accel_threshold: AccelThresholdSegmenter::new(batch.accel_threshold.clone()),
            reference: NearestReferenceClassifier::new(batch.reference.clone()),
            sample_rate_hz: config.sample_rate_hz,
            min_samples: batch
                .accel_threshold
                .min_window_samples
                .max(batch.zero_crossing.min_crossing_gap)
                .max(1),
        })
    }

    /// Segment and classify `samples`.
    ///
    /// Returns `None` when the input is shorter than the minimum window.
    pub fn analyze(&self, samples: &[ImuSample]) -> Option<BatchAnalysis> {
        if samples.len() < self.min_samples {
            return None;
        }
        let clean: Vec<ImuSample> = samples
            .iter()
            .map(|s| ImuSample::new(s.timestamp_ms, s.accel_vec().sanitized().to_array(), s.gyro_vec().sanitized().to_array()))
            .collect();

        let segmentation = select_windows(
            self.zero_crossing.segment(&clean),
            self.accel_threshold.segment(&clean),
        );

        let mut windows = Vec::with_capacity(segmentation.windows.len());
        let mut reps = Vec::new();
        for window in segmentation.windows {
            let slice = window.slice(&clean);
            let label = self.reference.classify_window(slice);
            if let Some(label) = label {
                let energy = slice.iter().map(ImuSample::gyro_magnitude).sum::<f32>() / self.sample_rate_hz;
                let peak_value = slice.iter().map(ImuSample::gyro_magnitude).fold(0.0f32, f32::max);
                reps.push(RepEvent {
                    exercise: label.exercise,
                    timestamp_ms: window.end_ms,
                    form: FormJudgment::Unknown,
                    energy,
                    peak_value,
                });
            }
            windows.push(WindowClassification { window, label });
        }

        Some(BatchAnalysis {
            source: segmentation.source,
            windows,
            reps,
        })
    }
}

impl RepStrategy for BatchRepAnalyzer {
    fn count_reps(&mut self, samples: &[ImuSample]) -> Vec<RepEvent> {
        self.analyze(samples).map(|a| a.reps).unwrap_or_default()
    }
}
