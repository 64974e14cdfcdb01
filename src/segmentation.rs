//! Batch rep segmentation.
//!
//! Splits a recorded set into per-rep windows after the fact, as opposed to
//! the streaming peak detector in `rep_detection`. Two segmenters are
//! available and the better-populated result is kept:
//! - zero crossings of the highest-variance gyro axis;
//! - amplitude-threshold windows on smoothed acceleration magnitude.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::features::RingBuffer;
use crate::types::ImuSample;

/// Standard gravity used as the accel magnitude baseline (m/s²).
pub const STANDARD_GRAVITY: f32 = 9.81;

/// Fewer windows than this makes a segmentation unconvincing.
const MIN_PREFERRED_WINDOWS: usize = 3;

/// Which segmenter produced a set of windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SegmentationSource {
    GyroZeroCrossing,
    AccelThreshold,
}

/// Half-open sample range `[start, end)` covering one rep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RepWindow {
    pub start: usize,
    pub end: usize,
    pub start_ms: u64,
    pub end_ms: u64,
}

impl RepWindow {
    fn new(samples: &[ImuSample], start: usize, end: usize) -> Self {
        Self {
            start,
            end,
            start_ms: samples[start].timestamp_ms,
            end_ms: samples[end - 1].timestamp_ms,
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn slice<'a>(&self, samples: &'a [ImuSample]) -> &'a [ImuSample] {
        &samples[self.start..self.end]
    }
}

/// Windows from one segmenter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Segmentation {
    pub source: SegmentationSource,
    pub windows: Vec<RepWindow>,
}

/// A batch segmentation strategy.
pub trait Segmenter {
    fn source(&self) -> SegmentationSource;

    /// Split `samples` into rep windows. Short input yields no windows.
    fn windows(&self, samples: &[ImuSample]) -> Vec<RepWindow>;

    fn segment(&self, samples: &[ImuSample]) -> Segmentation {
        Segmentation {
            source: self.source(),
            windows: self.windows(samples),
        }
    }
}

/// Zero-crossing segmenter parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ZeroCrossingConfig {
    /// Crossings closer than this many samples to the last accepted one are noise.
    pub min_crossing_gap: usize,
    /// Minimum Σ|signal| / rate over a cycle (rad).
    pub min_cycle_energy: f32,
}

impl Default for ZeroCrossingConfig {
    fn default() -> Self {
        Self {
            min_crossing_gap: 15, // 300ms at 50Hz
            min_cycle_energy: 0.3,
        }
    }
}

/// Counts upward zero crossings on the gyro axis with the largest variance.
#[derive(Debug, Clone, PartialEq)]
pub struct ZeroCrossingSegmenter {
    config: ZeroCrossingConfig,
    sample_rate_hz: f32,
}

impl ZeroCrossingSegmenter {
    pub fn new(config: ZeroCrossingConfig, sample_rate_hz: f32) -> Self {
        Self {
            config,
            sample_rate_hz,
        }
    }

    /// Index of the gyro axis with the largest variance.
    pub fn dominant_axis(samples: &[ImuSample]) -> usize {
        let mut best_axis = 0;
        let mut best_variance = f32::NEG_INFINITY;
        for axis in 0..3 {
            let variance = variance(samples.iter().map(|s| s.gyro[axis]));
            if variance > best_variance {
                best_axis = axis;
                best_variance = variance;
            }
        }
        best_axis
    }
}

impl Segmenter for ZeroCrossingSegmenter {
    fn source(&self) -> SegmentationSource {
        SegmentationSource::GyroZeroCrossing
    }

    fn windows(&self, samples: &[ImuSample]) -> Vec<RepWindow> {
        if samples.len() < self.config.min_crossing_gap.max(2) {
            return Vec::new();
        }

        let axis = Self::dominant_axis(samples);
        let mean = samples.iter().map(|s| s.gyro[axis]).sum::<f32>() / samples.len() as f32;
        let signal: Vec<f32> = samples.iter().map(|s| s.gyro[axis] - mean).collect();

        // prefix[i] = Σ|signal[..i]|
        let mut prefix = Vec::with_capacity(signal.len() + 1);
        prefix.push(0.0f32);
        for x in &signal {
            let last = prefix[prefix.len() - 1];
            prefix.push(last + x.abs());
        }

        let mut windows = Vec::new();
        let mut anchor: Option<usize> = None;
        for i in 1..signal.len() {
            if !(signal[i - 1] < 0.0 && signal[i] >= 0.0) {
                continue;
            }
            let Some(start) = anchor else {
                anchor = Some(i);
                continue;
            };
            if i - start < self.config.min_crossing_gap {
                continue;
            }
            let energy = (prefix[i] - prefix[start]) / self.sample_rate_hz;
            if energy >= self.config.min_cycle_energy {
                windows.push(RepWindow::new(samples, start, i));
            }
            anchor = Some(i);
        }
        windows
    }
}

/// Accel-threshold segmenter parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AccelThresholdConfig {
    /// Moving-average length applied to accel magnitude.
    pub smoothing_len: usize,
    /// Deviation from gravity that opens a window (m/s²).
    pub enter_threshold: f32,
    /// Deviation from gravity that closes it (m/s²).
    pub exit_threshold: f32,
    /// Shorter windows are discarded.
    pub min_window_samples: usize,
}

impl Default for AccelThresholdConfig {
    fn default() -> Self {
        Self {
            smoothing_len: 5,
            enter_threshold: 1.5,
            exit_threshold: 0.7,
            min_window_samples: 10,
        }
    }
}

/// Windows where smoothed |accel| departs from gravity.
#[derive(Debug, Clone, PartialEq)]
pub struct AccelThresholdSegmenter {
    config: AccelThresholdConfig,
}

impl AccelThresholdSegmenter {
    pub fn new(config: AccelThresholdConfig) -> Self {
        Self { config }
    }
}

impl Segmenter for AccelThresholdSegmenter {
    fn source(&self) -> SegmentationSource {
        SegmentationSource::AccelThreshold
    }

    fn windows(&self, samples: &[ImuSample]) -> Vec<RepWindow> {
        if samples.len() < self.config.min_window_samples {
            return Vec::new();
        }

        let mut smoother = RingBuffer::new(self.config.smoothing_len);
        let mut windows = Vec::new();
        let mut open: Option<usize> = None;

        for (i, sample) in samples.iter().enumerate() {
            smoother.push(sample.accel_magnitude());
            let deviation = (smoother.mean() - STANDARD_GRAVITY).abs();

            match open {
                None if deviation > self.config.enter_threshold => open = Some(i),
                Some(start) if deviation < self.config.exit_threshold => {
                    if i - start >= self.config.min_window_samples {
                        windows.push(RepWindow::new(samples, start, i));
                    }
                    open = None;
                }
                _ => {}
            }
        }
        // A window still open at the end is an unfinished rep
        windows
    }
}

/// Pick between gyro- and accel-based segmentations.
///
/// Among results with at least three windows the larger count wins, with
/// the accelerometer winning ties. With no such result the accelerometer
/// segmentation is used.
pub fn select_windows(gyro: Segmentation, accel: Segmentation) -> Segmentation {
    let gyro_ok = gyro.windows.len() >= MIN_PREFERRED_WINDOWS;
    let accel_ok = accel.windows.len() >= MIN_PREFERRED_WINDOWS;
    let chosen = if gyro_ok && (!accel_ok || gyro.windows.len() > accel.windows.len()) {
        gyro
    } else {
        accel
    };
    debug!(
        "batch segmentation: using {:?} with {} windows",
        chosen.source,
        chosen.windows.len()
    );
    chosen
}

fn variance(values: impl Iterator<Item = f32> + Clone) -> f32 {
    let (sum, count) = values.clone().fold((0.0f32, 0usize), |(s, n), v| (s + v, n + 1));
    if count == 0 {
        return 0.0;
    }
    let mean = sum / count as f32;
    values.map(|v| (v - mean) * (v - mean)).sum::<f32>() / count as f32
}
