//! Session-level rep tallies.
//!
//! The aggregator is the only owner of [`SessionStats`]; counts change only
//! by applying [`RepEvent`]s, missed reps and classification outcomes.
//! `good + bad == total` holds for every exercise at all times. Reps without
//! a form judgment are tallied separately as `unjudged`.

use std::collections::BTreeMap;

use log::info;
use serde::Serialize;

use crate::types::{Exercise, FormJudgment, RepEvent};

/// Tally for one exercise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ExerciseStats {
    pub good: u32,
    pub bad: u32,
    /// Judged reps: always `good + bad`.
    pub total: u32,
    /// Reps counted without a form judgment.
    pub unjudged: u32,
    /// Movement episodes that timed out without a qualifying peak.
    pub missed: u32,
    pub correct_classifications: u32,
    pub total_classifications: u32,
}

impl ExerciseStats {
    /// All counted reps, judged or not.
    pub fn reps(&self) -> u32 {
        self.total + self.unjudged
    }

    /// Share of reps whose automatic classification matched, if any were checked.
    pub fn accuracy(&self) -> Option<f32> {
        if self.total_classifications == 0 {
            return None;
        }
        Some(self.correct_classifications as f32 / self.total_classifications as f32)
    }

    fn record(&mut self, form: FormJudgment) {
        match form {
            FormJudgment::Good => {
                self.good += 1;
                self.total += 1;
            }
            FormJudgment::Bad => {
                self.bad += 1;
                self.total += 1;
            }
            FormJudgment::Unknown => self.unjudged += 1,
        }
    }

    fn record_classification(&mut self, correct: bool) {
        self.total_classifications += 1;
        if correct {
            self.correct_classifications += 1;
        }
    }
}

/// Tally of the active exercise since it was selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SetStats {
    pub exercise: Option<Exercise>,
    pub stats: ExerciseStats,
}

/// Snapshot of everything counted so far.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SessionStats {
    pub per_exercise: BTreeMap<Exercise, ExerciseStats>,
    /// Missed reps across the session, including ones before identification.
    pub missed_reps: u32,
    pub current_set: SetStats,
}

impl SessionStats {
    pub fn get(&self, exercise: Exercise) -> ExerciseStats {
        self.per_exercise.get(&exercise).copied().unwrap_or_default()
    }

    pub fn total_reps(&self) -> u32 {
        self.per_exercise.values().map(ExerciseStats::reps).sum()
    }
}

/// Accumulates rep events into [`SessionStats`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionAggregator {
    stats: SessionStats,
}

impl SessionAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one confirmed rep.
    pub fn apply(&mut self, rep: &RepEvent) {
        self.stats
            .per_exercise
            .entry(rep.exercise)
            .or_default()
            .record(rep.form);
        if self.stats.current_set.exercise != Some(rep.exercise) {
            self.start_set(Some(rep.exercise));
        }
        self.stats.current_set.stats.record(rep.form);
    }

    /// Count a missed rep, attributed to `exercise` when known.
    pub fn record_missed(&mut self, exercise: Option<Exercise>) {
        self.stats.missed_reps += 1;
        if let Some(exercise) = exercise {
            self.stats.per_exercise.entry(exercise).or_default().missed += 1;
            if self.stats.current_set.exercise == Some(exercise) {
                self.stats.current_set.stats.missed += 1;
            }
        }
    }

    /// Record whether automatic classification agreed with the selected exercise.
    pub fn record_classification(&mut self, expected: Exercise, predicted: Option<Exercise>) {
        let correct = predicted == Some(expected);
        self.stats
            .per_exercise
            .entry(expected)
            .or_default()
            .record_classification(correct);
        if self.stats.current_set.exercise == Some(expected) {
            self.stats.current_set.stats.record_classification(correct);
        }
    }

    /// Begin a new set; the current-set tally starts from zero.
    pub fn start_set(&mut self, exercise: Option<Exercise>) {
        if self.stats.current_set.exercise != exercise {
            info!("new set: {:?} -> {:?}", self.stats.current_set.exercise, exercise);
        }
        self.stats.current_set = SetStats {
            exercise,
            stats: ExerciseStats::default(),
        };
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Zero every counter.
    pub fn reset(&mut self) {
        self.stats = SessionStats::default();
    }
}
