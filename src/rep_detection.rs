//! Movement state machine and rep confirmation.
//!
//! Per sample:
//! 1. Smooth gyro magnitude (α distinct from gravity tracking).
//! 2. Feed the smoothed value to the [`PeakDetector`].
//! 3. Apply IDLE/MOVING hysteresis on the raw gyro magnitude.
//! 4. Integrate energy: `energy += filtered / sample_rate_hz`.
//! 5. On a peak while MOVING, check amplitude and the refractory period, then
//!    the exercise validity predicate. A valid rep resets to `{IDLE, 0}`.
//! 6. Stuck-movement recovery: a MOVING episode that outlives the timeout
//!    with enough energy is counted as a missed rep and forced back to IDLE.
//!
//! Energy uses the nominal sample rate, so irregular arrival skews it. That
//! error is accepted; intervals (refractory, timeout) use timestamps.

use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};

use crate::features::FeatureSet;
use crate::filter::{FilterConfig, RecursiveFilter};
use crate::peak::{Peak, PeakDetector, DEFAULT_PEAK_HISTORY, DEFAULT_PEAK_WINDOW};
use crate::profile::ExerciseProfile;
use crate::types::{MovementState, RepEvent};

/// State machine timing and hysteresis parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// MOVING exits below `min_gyro * idle_exit_ratio`.
    pub idle_exit_ratio: f32,
    /// A MOVING episode without a rep for this long may be a missed rep.
    pub stuck_timeout_ms: u64,
    /// Peak detector window (samples).
    pub peak_window: usize,
    /// Number of peaks kept in history.
    pub peak_history: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            idle_exit_ratio: 0.3,
            stuck_timeout_ms: 3000,
            peak_window: DEFAULT_PEAK_WINDOW,
            peak_history: DEFAULT_PEAK_HISTORY,
        }
    }
}

/// Why a peak did not become a rep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PeakRejection {
    /// Peak arrived while IDLE.
    NotMoving,
    /// Peak below `min_rep_gyro`.
    TooWeak,
    /// Inside the refractory period of the previous rep.
    Refractory,
    /// Exercise validity predicate failed.
    InvalidMotion,
}

/// Result of one state machine step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RepStep {
    pub state: MovementState,
    pub filtered_gyro: f32,
    pub energy: f32,
    pub peak: Option<Peak>,
    pub rep: Option<RepEvent>,
    pub rejection: Option<PeakRejection>,
    pub missed_rep: bool,
}

/// IDLE/MOVING gating with energy accumulation and rep confirmation.
#[derive(Debug, Clone, PartialEq)]
pub struct RepStateMachine {
    config: DetectionConfig,
    sample_rate_hz: f32,
    gyro_filter: RecursiveFilter,
    peaks: PeakDetector,
    state: MovementState,
    energy: f32,
    last_rep_ms: Option<u64>,
    moving_since_ms: u64,
}

impl RepStateMachine {
    pub fn new(config: &DetectionConfig, filter: &FilterConfig, sample_rate_hz: f32) -> Self {
        Self {
            config: config.clone(),
            sample_rate_hz,
            gyro_filter: RecursiveFilter::new(filter.gyro_alpha, filter.gyro_seed),
            peaks: PeakDetector::new(config.peak_window, config.peak_history),
            state: MovementState::Idle,
            energy: 0.0,
            last_rep_ms: None,
            moving_since_ms: 0,
        }
    }

    /// Advance one sample.
    ///
    /// With no profile (exercise not yet identified) the machine still
    /// filters and integrates, but stays IDLE and confirms nothing.
    pub fn update(
        &mut self,
        features: &FeatureSet,
        timestamp_ms: u64,
        profile: Option<&ExerciseProfile>,
    ) -> RepStep {
        self.handle_clock_restart(timestamp_ms);
        let filtered_gyro = self.gyro_filter.update(features.gyro_magnitude);
        let peak = self.peaks.detect(filtered_gyro, timestamp_ms);

        if let Some(profile) = profile {
            self.apply_hysteresis(features.gyro_magnitude, timestamp_ms, profile);
        } else {
            self.state = MovementState::Idle;
        }

        self.energy += filtered_gyro / self.sample_rate_hz;

        let mut step = RepStep {
            state: self.state,
            filtered_gyro,
            energy: self.energy,
            peak,
            rep: None,
            rejection: None,
            missed_rep: false,
        };

        let Some(profile) = profile else {
            return step;
        };

        if let Some(peak) = peak {
            match self.evaluate_peak(peak, features, profile) {
                Ok(rep) => step.rep = Some(rep),
                Err(reason) => step.rejection = Some(reason),
            }
        }

        if step.rep.is_none() && self.is_stuck(timestamp_ms, profile) {
            debug!(
                "{}: missed rep, energy {:.2} without a qualifying peak",
                profile.exercise, self.energy
            );
            self.settle();
            step.missed_rep = true;
        }

        step.state = self.state;
        step.energy = self.energy;
        step
    }

    fn apply_hysteresis(&mut self, gyro_magnitude: f32, timestamp_ms: u64, profile: &ExerciseProfile) {
        match self.state {
            MovementState::Idle if gyro_magnitude > profile.min_gyro => {
                trace!("IDLE -> MOVING at {timestamp_ms} ms (gyro {gyro_magnitude:.2})");
                self.state = MovementState::Moving;
                self.energy = 0.0;
                self.moving_since_ms = timestamp_ms;
            }
            MovementState::Moving
                if gyro_magnitude < profile.min_gyro * self.config.idle_exit_ratio =>
            {
                trace!("MOVING -> IDLE at {timestamp_ms} ms (gyro {gyro_magnitude:.2})");
                self.state = MovementState::Idle;
            }
            _ => {}
        }
    }

    fn evaluate_peak(
        &mut self,
        peak: Peak,
        features: &FeatureSet,
        profile: &ExerciseProfile,
    ) -> Result<RepEvent, PeakRejection> {
        if self.state != MovementState::Moving {
            return Err(PeakRejection::NotMoving);
        }
        if !(peak.value > profile.min_rep_gyro) {
            return Err(PeakRejection::TooWeak);
        }
        if let Some(last) = self.last_rep_ms {
            if peak.timestamp_ms.saturating_sub(last) <= profile.min_rep_ms {
                return Err(PeakRejection::Refractory);
            }
        }
        if !profile.is_valid_rep(features) {
            debug!(
                "{}: peak {:.2} at {} ms rejected by validity check",
                profile.exercise, peak.value, peak.timestamp_ms
            );
            return Err(PeakRejection::InvalidMotion);
        }

        let rep = RepEvent {
            exercise: profile.exercise,
            timestamp_ms: peak.timestamp_ms,
            form: profile.judge_form(features),
            energy: self.energy,
            peak_value: peak.value,
        };
        debug!(
            "{}: rep at {} ms, peak {:.2}, energy {:.2}, form {:?}",
            rep.exercise, rep.timestamp_ms, rep.peak_value, rep.energy, rep.form
        );
        self.last_rep_ms = Some(peak.timestamp_ms);
        self.settle();
        Ok(rep)
    }

    /// Stuck if MOVING past the timeout with more than half the energy scale.
    ///
    /// The timeout runs from the start of the current episode. A confirmed
    /// rep always ends the episode, so that start is never before the last
    /// rep, and a long rest does not make the next set's first rep look
    /// overdue.
    fn is_stuck(&self, timestamp_ms: u64, profile: &ExerciseProfile) -> bool {
        self.state == MovementState::Moving
            && timestamp_ms.saturating_sub(self.moving_since_ms) > self.config.stuck_timeout_ms
            && self.energy > profile.energy_thresh * 0.5
    }

    /// A timestamp behind the last rep means the producer restarted its
    /// clock. Interval state from the old timeline would hold every later
    /// peak in the refractory period, so it is dropped.
    fn handle_clock_restart(&mut self, timestamp_ms: u64) {
        if self.last_rep_ms.is_some_and(|last| timestamp_ms < last) {
            warn!(
                "timestamp {timestamp_ms} ms precedes last rep at {:?} ms, treating as clock restart",
                self.last_rep_ms
            );
            self.last_rep_ms = None;
        }
        if timestamp_ms < self.moving_since_ms {
            self.moving_since_ms = timestamp_ms;
        }
    }

    fn settle(&mut self) {
        self.state = MovementState::Idle;
        self.energy = 0.0;
    }

    pub fn state(&self) -> MovementState {
        self.state
    }

    pub fn energy(&self) -> f32 {
        self.energy
    }

    pub fn last_rep_ms(&self) -> Option<u64> {
        self.last_rep_ms
    }

    pub fn recent_peaks(&self) -> impl Iterator<Item = &Peak> {
        self.peaks.recent_peaks()
    }

    /// Back to the freshly constructed state.
    pub fn reset(&mut self) {
        self.gyro_filter.reset();
        self.peaks.reset();
        self.state = MovementState::Idle;
        self.energy = 0.0;
        self.last_rep_ms = None;
        self.moving_since_ms = 0;
    }
}
