//! Gravity-relative feature extraction.
//!
//! Each sample is projected into an orthonormal frame `{u, v, w}` built from
//! the running gravity estimate: `w` points along gravity, `u` and `v` span
//! the horizontal plane. Rep detection then works on frame components, which
//! makes it independent of how the dumbbell is held.
//!
//! The frame is recomputed on every sample; only the gravity estimate and the
//! two moving-average buffers persist between calls.

use std::collections::VecDeque;

use serde::Serialize;

use crate::filter::{FilterConfig, VectorFilter};
use crate::vector::Vec3;

/// Below this length the first horizontal axis candidate is degenerate
/// (gravity nearly parallel to the device x axis).
const DEGENERATE_AXIS_LEN: f32 = 0.1;

/// One axis of the gravity frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FrameAxis {
    U,
    V,
    W,
}

impl FrameAxis {
    pub fn index(self) -> usize {
        match self {
            FrameAxis::U => 0,
            FrameAxis::V => 1,
            FrameAxis::W => 2,
        }
    }
}

/// Orthonormal triple aligned with gravity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisFrame {
    pub u: Vec3,
    pub v: Vec3,
    pub w: Vec3,
}

impl AxisFrame {
    /// Build the frame from a unit gravity direction.
    pub fn from_gravity(gravity_dir: Vec3) -> Self {
        let mut u = gravity_dir.cross(Vec3::X).normalize();
        if u.magnitude() < DEGENERATE_AXIS_LEN {
            u = gravity_dir.cross(Vec3::Y).normalize();
        }
        let v = gravity_dir.cross(u);
        Self {
            u,
            v,
            w: gravity_dir,
        }
    }

    /// Components of `vector` along `(u, v, w)`.
    pub fn project(&self, vector: Vec3) -> Vec3 {
        Vec3::new(vector.dot(self.u), vector.dot(self.v), vector.dot(self.w))
    }
}

/// Bounded FIFO of scalars; the oldest value is evicted when full.
#[derive(Debug, Clone, PartialEq)]
pub struct RingBuffer {
    values: VecDeque<f32>,
    capacity: usize,
}

impl RingBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, value: f32) {
        if self.values.len() == self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    /// Mean of the buffered values, 0 when empty.
    pub fn mean(&self) -> f32 {
        if self.values.is_empty() {
            return 0.0;
        }
        self.values.iter().sum::<f32>() / self.values.len() as f32
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}

/// Per-sample features in the gravity frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct FeatureSet {
    /// Gyro projected on `(u, v, w)` in rad/s.
    pub gyro_frame: Vec3,
    /// Accel projected on `(u, v, w)` in m/s².
    pub accel_frame: Vec3,
    /// Magnitude of the projected gyro.
    pub gyro_magnitude: f32,
    /// Magnitude of the raw accel.
    pub accel_magnitude: f32,
    /// Linear acceleration along gravity (gravity magnitude removed).
    pub vertical_accel: f32,
    /// Moving average of `gyro_magnitude`.
    pub gyro_average: f32,
    /// Moving average of `accel_magnitude`.
    pub accel_average: f32,
    /// Index of the largest absolute projected gyro component.
    pub dominant_axis: usize,
    /// `|g_axis| / gyro_magnitude` for u, v, w.
    pub axis_ratios: [f32; 3],
    /// Unit gravity direction used for this sample.
    pub gravity_dir: Vec3,
}

impl FeatureSet {
    pub fn ratio(&self, axis: FrameAxis) -> f32 {
        self.axis_ratios[axis.index()]
    }

    /// Largest of the two horizontal-axis ratios.
    pub fn horizontal_ratio(&self) -> f32 {
        self.axis_ratios[0].max(self.axis_ratios[1])
    }

    pub fn dominant(&self) -> FrameAxis {
        match self.dominant_axis {
            0 => FrameAxis::U,
            1 => FrameAxis::V,
            _ => FrameAxis::W,
        }
    }
}

/// Tracks gravity and projects raw samples into the gravity frame.
#[derive(Debug, Clone, PartialEq)]
pub struct GravityFrameExtractor {
    gravity: VectorFilter,
    gyro_history: RingBuffer,
    accel_history: RingBuffer,
}

impl GravityFrameExtractor {
    pub fn new(config: &FilterConfig) -> Self {
        Self {
            gravity: VectorFilter::new(config.gravity_alpha, Vec3::from_array(config.gravity_seed)),
            gyro_history: RingBuffer::new(config.average_window),
            accel_history: RingBuffer::new(config.average_window),
        }
    }

    /// Update the gravity estimate and derive this sample's features.
    ///
    /// Never fails. Non-finite inputs are zeroed first, and all-zero inputs
    /// produce near-zero features rather than NaN.
    pub fn extract(&mut self, gyro: Vec3, accel: Vec3) -> FeatureSet {
        let gyro = gyro.sanitized();
        let accel = accel.sanitized();

        let gravity_raw = self.gravity.update(accel);
        let gravity_dir = gravity_raw.normalize();
        let frame = AxisFrame::from_gravity(gravity_dir);

        let gyro_frame = frame.project(gyro);
        let accel_frame = frame.project(accel);

        let gyro_magnitude = gyro_frame.magnitude();
        let accel_magnitude = accel.magnitude();
        let vertical_accel = accel_frame.z - gravity_raw.magnitude();

        self.gyro_history.push(gyro_magnitude);
        self.accel_history.push(accel_magnitude);

        let abs = gyro_frame.abs();
        let components = [abs.x, abs.y, abs.z];
        let mut dominant_axis = 0;
        for (i, value) in components.iter().enumerate().skip(1) {
            if *value > components[dominant_axis] {
                dominant_axis = i;
            }
        }

        let denominator = if gyro_magnitude > 0.0 { gyro_magnitude } else { 1.0 };
        let axis_ratios = components.map(|c| c / denominator);

        FeatureSet {
            gyro_frame,
            accel_frame,
            gyro_magnitude,
            accel_magnitude,
            vertical_accel,
            gyro_average: self.gyro_history.mean(),
            accel_average: self.accel_history.mean(),
            dominant_axis,
            axis_ratios,
            gravity_dir,
        }
    }

    /// Current (unnormalised) gravity estimate.
    pub fn gravity(&self) -> Vec3 {
        self.gravity.state()
    }

    pub fn reset(&mut self) {
        self.gravity.reset();
        self.gyro_history.clear();
        self.accel_history.clear();
    }
}
