//! Engine configuration.
//!
//! Every section has defaults carrying the canonical 50 Hz constants, so a
//! TOML file only needs the values it changes:
//!
//! ```toml
//! sample_rate_hz = 50.0
//!
//! [filter]
//! gyro_alpha = 0.25
//!
//! [profiles.curl]
//! min_rep_ms = 700
//! ```
//!
//! Everything here is calibrated for 50 Hz; other rates need retuned α
//! values and thresholds.

use std::collections::BTreeMap;
use std::path::Path;

use log::warn;
use serde::Deserialize;

use crate::classifier::{ClassifierConfig, ReferenceConfig};
use crate::error::{Error, Result};
use crate::filter::FilterConfig;
use crate::profile::{ProfileOverride, ProfileTable};
use crate::rep_detection::DetectionConfig;
use crate::segmentation::{AccelThresholdConfig, ZeroCrossingConfig};

/// Nominal sample rate the constants are tuned for.
pub const CANONICAL_SAMPLE_RATE_HZ: f32 = 50.0;

/// Batch segmentation and reference classification.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub zero_crossing: ZeroCrossingConfig,
    pub accel_threshold: AccelThresholdConfig,
    pub reference: ReferenceConfig,
}

/// Complete configuration for a [`RepEngine`](crate::pipeline::RepEngine)
/// or [`BatchRepAnalyzer`](crate::pipeline::BatchRepAnalyzer).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Nominal input rate, used for the energy integral.
    pub sample_rate_hz: f32,
    pub filter: FilterConfig,
    pub detection: DetectionConfig,
    pub classifier: ClassifierConfig,
    pub batch: BatchConfig,
    /// Per-exercise overrides keyed by exercise name.
    pub profiles: BTreeMap<String, ProfileOverride>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: CANONICAL_SAMPLE_RATE_HZ,
            filter: FilterConfig::default(),
            detection: DetectionConfig::default(),
            classifier: ClassifierConfig::default(),
            batch: BatchConfig::default(),
            profiles: BTreeMap::new(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Check ranges and build the profile table once to surface bad keys.
    pub fn validate(&self) -> Result<()> {
        if !(self.sample_rate_hz > 0.0) || !self.sample_rate_hz.is_finite() {
            return Err(Error::InvalidConfig(format!(
                "sample_rate_hz must be positive, got {}",
                self.sample_rate_hz
            )));
        }
        for (name, alpha) in [
            ("filter.gravity_alpha", self.filter.gravity_alpha),
            ("filter.gyro_alpha", self.filter.gyro_alpha),
        ] {
            if !(alpha > 0.0 && alpha <= 1.0) {
                return Err(Error::InvalidConfig(format!(
                    "{name} must be in (0, 1], got {alpha}"
                )));
            }
        }
        if self.filter.average_window == 0 {
            return Err(Error::InvalidConfig("filter.average_window must be at least 1".into()));
        }
        if !(self.detection.idle_exit_ratio > 0.0 && self.detection.idle_exit_ratio <= 1.0) {
            return Err(Error::InvalidConfig(format!(
                "detection.idle_exit_ratio must be in (0, 1], got {}",
                self.detection.idle_exit_ratio
            )));
        }
        if self.detection.peak_window < 3 {
            return Err(Error::InvalidConfig("detection.peak_window must be at least 3".into()));
        }
        if (self.sample_rate_hz - CANONICAL_SAMPLE_RATE_HZ).abs() > f32::EPSILON {
            warn!(
                "sample rate {} Hz differs from the {} Hz the default thresholds are tuned for",
                self.sample_rate_hz, CANONICAL_SAMPLE_RATE_HZ
            );
        }
        self.profile_table().map(|_| ())
    }

    /// Built-in profiles with this configuration's overrides applied.
    pub fn profile_table(&self) -> Result<ProfileTable> {
        ProfileTable::with_overrides(&self.profiles)
    }
}
