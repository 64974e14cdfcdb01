//! Rep Sensing Library
//!
//! Streaming repetition detection for a wrist- or dumbbell-mounted IMU.
//! Raw accelerometer/gyroscope samples go in; confirmed reps, form
//! judgments and session tallies come out.
//!
//! # Design Philosophy
//!
//! - **Orientation-independent**: every feature is expressed in a frame
//!   built from the tracked gravity direction, not the device axes.
//! - **Never fails per sample**: invalid input is zeroed and logged, and
//!   degenerate geometry falls back to fixed axes instead of producing NaN.
//! - **O(1) per sample**: fixed-size filters and ring buffers only.
//! - **Deterministic**: `reset()` returns an engine to its freshly
//!   constructed state.
//!
//! # Example
//!
//! ```
//! use rep_sensing::{Exercise, ExerciseMode, ImuSample, RepEngine};
//!
//! let mut engine = RepEngine::with_defaults(ExerciseMode::Fixed(Exercise::Curl));
//! let output = engine.update(&ImuSample::new(0, [0.0, 0.0, 9.81], [0.0; 3]));
//! assert!(output.rep.is_none());
//! ```

pub mod classifier;
pub mod config;
pub mod error;
pub mod features;
pub mod filter;
pub mod peak;
pub mod pipeline;
pub mod profile;
pub mod rep_detection;
pub mod segmentation;
pub mod session;
pub mod types;
pub mod vector;

#[cfg(test)]
mod integration_tests;

// Re-export commonly used types
pub use config::EngineConfig;
pub use error::{Error, Result};
pub use features::FeatureSet;
pub use pipeline::{BatchAnalysis, BatchRepAnalyzer, EngineOutput, ExerciseMode, RepEngine, RepStrategy};
pub use profile::{ExerciseProfile, ProfileTable};
pub use session::{ExerciseStats, SessionStats};
pub use types::{Exercise, FormJudgment, ImuSample, MovementState, RepEvent};
pub use vector::Vec3;
