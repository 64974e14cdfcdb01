//! Centered local-maximum detection over a short sliding window.
//!
//! A sample is reported as a peak once it sits in the middle of the window
//! and no other buffered sample exceeds it. Because the candidate is the
//! middle element, a peak is only known once `window / 2` newer samples have
//! arrived (two samples for the default 5-sample window). Callers correlating
//! peaks with live data must tolerate that lag.

use std::collections::VecDeque;

use serde::Serialize;

/// Default number of samples in the detection window.
pub const DEFAULT_PEAK_WINDOW: usize = 5;
/// Default number of reported peaks kept in history.
pub const DEFAULT_PEAK_HISTORY: usize = 10;

/// Minimum number of buffered samples before a peak can be tested.
const MIN_SAMPLES: usize = 3;

/// A detected local maximum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Peak {
    /// Filtered value at the peak.
    pub value: f32,
    /// Timestamp of the peak sample (not of the sample that revealed it).
    pub timestamp_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct WindowEntry {
    value: f32,
    timestamp_ms: u64,
    index: u64,
}

/// Fixed-window centered peak detector with recent-peak history.
#[derive(Debug, Clone, PartialEq)]
pub struct PeakDetector {
    window: VecDeque<WindowEntry>,
    window_size: usize,
    history: VecDeque<Peak>,
    history_size: usize,
    /// Sample index of the last reported peak, for debouncing.
    last_peak_index: Option<u64>,
    samples_seen: u64,
}

impl PeakDetector {
    pub fn new(window_size: usize, history_size: usize) -> Self {
        let window_size = window_size.max(MIN_SAMPLES);
        Self {
            window: VecDeque::with_capacity(window_size),
            window_size,
            history: VecDeque::with_capacity(history_size),
            history_size: history_size.max(1),
            last_peak_index: None,
            samples_seen: 0,
        }
    }

    /// Push a value and report the middle sample if it is a local maximum.
    ///
    /// The test is non-strict (ties with other window samples still count),
    /// but a peak whose predecessor is still inside the window is suppressed,
    /// so a plateau yields one peak per window span.
    pub fn detect(&mut self, value: f32, timestamp_ms: u64) -> Option<Peak> {
        let index = self.samples_seen;
        self.samples_seen += 1;

        if self.window.len() == self.window_size {
            self.window.pop_front();
        }
        self.window.push_back(WindowEntry { value, timestamp_ms, index });

        if self.window.len() < MIN_SAMPLES {
            return None;
        }

        let center = self.window[self.window.len() / 2];
        if !center.value.is_finite() {
            return None;
        }
        let is_max = self.window.iter().all(|e| e.value <= center.value);
        if !is_max {
            return None;
        }

        let oldest = self.window.front().map(|e| e.index).unwrap_or(center.index);
        if let Some(last) = self.last_peak_index {
            if last >= oldest {
                return None;
            }
        }

        let peak = Peak {
            value: center.value,
            timestamp_ms: center.timestamp_ms,
        };
        self.last_peak_index = Some(center.index);
        if self.history.len() == self.history_size {
            self.history.pop_front();
        }
        self.history.push_back(peak);
        Some(peak)
    }

    /// Most recent peaks, oldest first.
    pub fn recent_peaks(&self) -> impl Iterator<Item = &Peak> {
        self.history.iter()
    }

    pub fn last_peak(&self) -> Option<Peak> {
        self.history.back().copied()
    }

    pub fn reset(&mut self) {
        self.window.clear();
        self.history.clear();
        self.last_peak_index = None;
        self.samples_seen = 0;
    }
}

impl Default for PeakDetector {
    fn default() -> Self {
        Self::new(DEFAULT_PEAK_WINDOW, DEFAULT_PEAK_HISTORY)
    }
}
