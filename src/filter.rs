//! Single-pole recursive smoothing.
//!
//! `y[n] = α·x[n] + (1-α)·y[n-1]`, seeded at a fixed baseline instead of the
//! first sample. The same filter shape is used for gravity tracking (3-axis)
//! and for smoothing gyro magnitude before peak detection, each with its own α.
//!
//! Note: this is a plain exponential moving average, not a designed low-pass
//! with an accurate cutoff. Thresholds downstream are tuned against it.

use serde::Deserialize;

use crate::vector::Vec3;

/// Filter constants, canonical for a 50 Hz stream.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Smoothing factor for the gravity estimate. Range: (0.0, 1.0].
    pub gravity_alpha: f32,
    /// Baseline the gravity estimate starts from (m/s², device frame).
    pub gravity_seed: [f32; 3],
    /// Smoothing factor for gyro magnitude. Range: (0.0, 1.0].
    pub gyro_alpha: f32,
    /// Baseline the smoothed gyro magnitude starts from (rad/s).
    pub gyro_seed: f32,
    /// Capacity of the moving-average ring buffers.
    pub average_window: usize,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            gravity_alpha: 0.1,
            gravity_seed: [0.0, 0.0, 9.81],
            gyro_alpha: 0.3,
            gyro_seed: 0.0,
            average_window: 20,
        }
    }
}

/// Scalar exponential smoother.
#[derive(Debug, Clone, PartialEq)]
pub struct RecursiveFilter {
    alpha: f32,
    seed: f32,
    state: f32,
}

impl RecursiveFilter {
    /// Create a filter whose prior state is `seed`.
    ///
    /// `alpha` is clamped to [0, 1].
    pub fn new(alpha: f32, seed: f32) -> Self {
        Self {
            alpha: alpha.clamp(0.0, 1.0),
            seed,
            state: seed,
        }
    }

    /// Blend a raw value into the state and return the smoothed value.
    pub fn update(&mut self, raw: f32) -> f32 {
        self.state = self.alpha * raw + (1.0 - self.alpha) * self.state;
        self.state
    }

    /// Current smoothed value.
    pub fn state(&self) -> f32 {
        self.state
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    /// Return to the seed baseline.
    pub fn reset(&mut self) {
        self.state = self.seed;
    }
}

/// Three independent [`RecursiveFilter`]s sharing one α.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorFilter {
    axes: [RecursiveFilter; 3],
}

impl VectorFilter {
    pub fn new(alpha: f32, seed: Vec3) -> Self {
        Self {
            axes: [
                RecursiveFilter::new(alpha, seed.x),
                RecursiveFilter::new(alpha, seed.y),
                RecursiveFilter::new(alpha, seed.z),
            ],
        }
    }

    pub fn update(&mut self, raw: Vec3) -> Vec3 {
        Vec3::new(
            self.axes[0].update(raw.x),
            self.axes[1].update(raw.y),
            self.axes[2].update(raw.z),
        )
    }

    pub fn state(&self) -> Vec3 {
        Vec3::new(self.axes[0].state(), self.axes[1].state(), self.axes[2].state())
    }

    pub fn reset(&mut self) {
        for axis in &mut self.axes {
            axis.reset();
        }
    }
}
