//! Per-exercise threshold profiles and rep predicates.
//!
//! Each exercise has an immutable [`ExerciseProfile`]. Two predicates run
//! when a peak is confirmed:
//! - the *validity* predicate decides whether the peak counts as a rep;
//! - the *form* predicate judges a valid rep good or bad. It feeds
//!   statistics only and never gates the count.
//!
//! All comparisons are strict. When two ratios are exactly equal, or a value
//! sits exactly on a bound, the comparison fails and the rep is judged bad
//! form. This tie-break is intentional.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::features::{FeatureSet, FrameAxis};
use crate::types::{Exercise, FormJudgment};

/// Thresholds for one exercise kind. Units: rad/s, m/s², ms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ExerciseProfile {
    pub exercise: Exercise,
    /// Gyro magnitude that moves the state machine from IDLE to MOVING.
    pub min_gyro: f32,
    /// Minimum smoothed gyro peak for a rep.
    pub min_rep_gyro: f32,
    /// Episode energy scale; half of it arms the stuck-movement recovery.
    pub energy_thresh: f32,
    /// Refractory period between confirmed reps.
    pub min_rep_ms: u64,
    /// `(lo, hi)` bounds on |vertical accel|.
    pub vert_accel_bounds: (f32, f32),
    /// Rotation ratio about gravity a press must exceed.
    pub peak_thresh: f32,
    /// `(lo, hi)` bounds on the axis ratio used for form.
    pub form_ratio_bounds: (f32, f32),
}

impl ExerciseProfile {
    /// Built-in profile for `exercise`, tuned for a 50 Hz stream.
    pub fn builtin(exercise: Exercise) -> Self {
        match exercise {
            Exercise::Curl => Self {
                exercise,
                min_gyro: 1.0,
                min_rep_gyro: 1.5,
                energy_thresh: 2.0,
                min_rep_ms: 800,
                vert_accel_bounds: (0.5, 4.0),
                peak_thresh: 0.4,
                form_ratio_bounds: (0.7, 1.0),
            },
            Exercise::LateralRaise => Self {
                exercise,
                min_gyro: 0.8,
                min_rep_gyro: 1.2,
                energy_thresh: 1.8,
                min_rep_ms: 900,
                vert_accel_bounds: (0.5, 4.0),
                peak_thresh: 0.4,
                form_ratio_bounds: (0.7, 1.0),
            },
            Exercise::Press => Self {
                exercise,
                min_gyro: 0.6,
                min_rep_gyro: 1.0,
                energy_thresh: 1.5,
                min_rep_ms: 1000,
                vert_accel_bounds: (0.8, 6.0),
                peak_thresh: 0.4,
                form_ratio_bounds: (0.7, 1.0),
            },
            Exercise::Squat => Self {
                exercise,
                min_gyro: 0.4,
                min_rep_gyro: 0.6,
                energy_thresh: 1.0,
                min_rep_ms: 1200,
                vert_accel_bounds: (1.0, 6.0),
                peak_thresh: 0.3,
                form_ratio_bounds: (0.0, 0.5),
            },
        }
    }

    /// Does the confirmed peak count as a rep of this exercise?
    pub fn is_valid_rep(&self, f: &FeatureSet) -> bool {
        let va = f.vertical_accel.abs();
        let (vert_lo, vert_hi) = self.vert_accel_bounds;
        match self.exercise {
            // Swing in a vertical plane: rotation axis is horizontal
            Exercise::Curl | Exercise::LateralRaise => {
                f.horizontal_ratio() > f.ratio(FrameAxis::W)
            }
            // Forearm turns about the vertical while the weight travels up
            Exercise::Press => f.ratio(FrameAxis::W) > self.peak_thresh,
            Exercise::Squat => va > vert_lo && va < vert_hi,
        }
    }

    /// Form predicate for a valid rep.
    pub fn judge_form(&self, f: &FeatureSet) -> FormJudgment {
        let va = f.vertical_accel.abs();
        let (vert_lo, vert_hi) = self.vert_accel_bounds;
        let (form_lo, form_hi) = self.form_ratio_bounds;
        let (r_u, r_v, r_w) = (
            f.ratio(FrameAxis::U),
            f.ratio(FrameAxis::V),
            f.ratio(FrameAxis::W),
        );
        let good = match self.exercise {
            Exercise::Curl => r_u > r_v && r_u > form_lo && va < vert_hi,
            Exercise::LateralRaise => r_v > r_u && r_v > form_lo && va < vert_hi,
            Exercise::Press => va > vert_lo && va < vert_hi && r_w > form_lo,
            Exercise::Squat => r_w < form_hi,
        };
        FormJudgment::from_bool(good)
    }

    /// Apply the fields present in `patch`.
    pub fn apply(&mut self, patch: &ProfileOverride) {
        if let Some(v) = patch.min_gyro {
            self.min_gyro = v;
        }
        if let Some(v) = patch.min_rep_gyro {
            self.min_rep_gyro = v;
        }
        if let Some(v) = patch.energy_thresh {
            self.energy_thresh = v;
        }
        if let Some(v) = patch.min_rep_ms {
            self.min_rep_ms = v;
        }
        if let Some(v) = patch.vert_accel_bounds {
            self.vert_accel_bounds = (v[0], v[1]);
        }
        if let Some(v) = patch.peak_thresh {
            self.peak_thresh = v;
        }
        if let Some(v) = patch.form_ratio_bounds {
            self.form_ratio_bounds = (v[0], v[1]);
        }
    }

    fn validate(&self) -> Result<()> {
        let ordered = |(lo, hi): (f32, f32)| lo.is_finite() && hi.is_finite() && lo <= hi;
        if !(self.min_gyro > 0.0) || !(self.min_rep_gyro > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "{}: gyro thresholds must be positive",
                self.exercise
            )));
        }
        if !ordered(self.vert_accel_bounds) || !ordered(self.form_ratio_bounds) {
            return Err(Error::InvalidConfig(format!(
                "{}: bounds must be finite and ordered (lo <= hi)",
                self.exercise
            )));
        }
        Ok(())
    }
}

/// Partial profile read from configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProfileOverride {
    pub min_gyro: Option<f32>,
    pub min_rep_gyro: Option<f32>,
    pub energy_thresh: Option<f32>,
    pub min_rep_ms: Option<u64>,
    pub vert_accel_bounds: Option<[f32; 2]>,
    pub peak_thresh: Option<f32>,
    pub form_ratio_bounds: Option<[f32; 2]>,
}

/// One profile per supported exercise.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileTable {
    profiles: BTreeMap<Exercise, ExerciseProfile>,
}

impl ProfileTable {
    /// Built-in profiles patched by `overrides`, keyed by exercise name.
    pub fn with_overrides(overrides: &BTreeMap<String, ProfileOverride>) -> Result<Self> {
        let mut table = Self::default();
        for (key, patch) in overrides {
            let exercise: Exercise = key.parse()?;
            table.profiles.entry(exercise).and_modify(|p| p.apply(patch));
        }
        for profile in table.profiles.values() {
            profile.validate()?;
        }
        Ok(table)
    }

    pub fn get(&self, exercise: Exercise) -> &ExerciseProfile {
        // Every variant is inserted at construction
        &self.profiles[&exercise]
    }

    /// Look up a profile by configuration key.
    pub fn lookup(&self, key: &str) -> Result<&ExerciseProfile> {
        let exercise: Exercise = key.parse()?;
        Ok(self.get(exercise))
    }

    /// Replace one profile, e.g. with a per-user calibration.
    pub fn insert(&mut self, profile: ExerciseProfile) {
        self.profiles.insert(profile.exercise, profile);
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExerciseProfile> {
        self.profiles.values()
    }
}

impl Default for ProfileTable {
    fn default() -> Self {
        Self {
            profiles: Exercise::ALL
                .into_iter()
                .map(|e| (e, ExerciseProfile::builtin(e)))
                .collect(),
        }
    }
}
