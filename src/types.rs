//! Core data types for the rep-sensing engine.
//!
//! These types form the contract with the surrounding layers: transports
//! decode their payloads into [`ImuSample`]s, presentation and export layers
//! consume [`RepEvent`]s and session snapshots.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::vector::Vec3;

/// A single raw 6-axis sample from the dumbbell sensor.
///
/// Accel is in m/s² (gravity ≈ 9.81 magnitude), gyro in rad/s. The timestamp
/// is monotonic milliseconds; interval math uses it rather than sample index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImuSample {
    pub timestamp_ms: u64,
    pub accel: [f32; 3],
    pub gyro: [f32; 3],
}

impl ImuSample {
    pub fn new(timestamp_ms: u64, accel: [f32; 3], gyro: [f32; 3]) -> Self {
        Self {
            timestamp_ms,
            accel,
            gyro,
        }
    }

    pub fn accel_vec(&self) -> Vec3 {
        Vec3::from_array(self.accel)
    }

    pub fn gyro_vec(&self) -> Vec3 {
        Vec3::from_array(self.gyro)
    }

    /// True when every component is a finite number.
    pub fn is_finite(&self) -> bool {
        self.accel_vec().is_finite() && self.gyro_vec().is_finite()
    }

    pub fn accel_magnitude(&self) -> f32 {
        self.accel_vec().magnitude()
    }

    pub fn gyro_magnitude(&self) -> f32 {
        self.gyro_vec().magnitude()
    }
}

/// Movement gating state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum MovementState {
    #[default]
    Idle,
    Moving,
}

/// Supported exercise kinds.
///
/// The set is closed: per-exercise behavior is a `match`, never a trait
/// object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Exercise {
    /// Biceps curl: rotation about the horizontal `u` axis.
    Curl,
    /// Lateral raise: rotation about the horizontal `v` axis.
    LateralRaise,
    /// Overhead press: vertical travel with little twisting.
    Press,
    /// Goblet squat: vertical travel with low rotation.
    Squat,
}

impl Exercise {
    pub const ALL: [Exercise; 4] = [
        Exercise::Curl,
        Exercise::LateralRaise,
        Exercise::Press,
        Exercise::Squat,
    ];

    /// Configuration key for this exercise.
    pub fn key(&self) -> &'static str {
        match self {
            Exercise::Curl => "curl",
            Exercise::LateralRaise => "lateral_raise",
            Exercise::Press => "press",
            Exercise::Squat => "squat",
        }
    }
}

impl fmt::Display for Exercise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Exercise {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase().replace(|c: char| c == '-' || c == ' ', "_");
        Exercise::ALL
            .into_iter()
            .find(|e| e.key() == key)
            .ok_or_else(|| Error::UnknownExercise(s.to_string()))
    }
}

/// Good/bad form judgment for a confirmed rep.
///
/// `Unknown` is used when no form predicate applies (batch classification).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum FormJudgment {
    Good,
    Bad,
    #[default]
    Unknown,
}

impl FormJudgment {
    pub fn from_bool(good: bool) -> Self {
        if good {
            FormJudgment::Good
        } else {
            FormJudgment::Bad
        }
    }

    pub fn is_good(&self) -> Option<bool> {
        match self {
            FormJudgment::Good => Some(true),
            FormJudgment::Bad => Some(false),
            FormJudgment::Unknown => None,
        }
    }
}

/// One validated repetition. Emitted at most once per rep.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RepEvent {
    pub exercise: Exercise,
    /// Timestamp of the confirming peak (streaming) or window end (batch).
    pub timestamp_ms: u64,
    pub form: FormJudgment,
    /// Accumulated motion energy of the episode.
    pub energy: f32,
    /// Smoothed gyro magnitude at the peak (rad/s).
    pub peak_value: f32,
}
