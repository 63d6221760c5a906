//! Confidence gate between raw classifier output and exercise state.

use crate::types::{ExerciseLabels, ExerciseState, Prediction, StateTransition};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Probability above which a class is accepted.
    pub entry_threshold: f32,
    /// Probability below which the current exercise is abandoned.
    pub exit_threshold: f32,
    /// Allowed deviation of the probability sum from 1.
    pub sum_tolerance: f32,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            entry_threshold: 0.75,
            exit_threshold: 0.4,
            sum_tolerance: 0.05,
        }
    }
}

/// Malformed classifier output. Dropped, never fatal.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PredictionRejected {
    #[error("Class {class_id} out of range for {classes} classes")]
    UnknownClass { class_id: usize, classes: usize },
    #[error("Expected {expected} probabilities, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("Probability {value} at index {index} is not a valid probability")]
    InvalidProbability { index: usize, value: f32 },
    #[error("Probabilities sum to {sum}")]
    BadSum { sum: f32 },
}

pub struct ClassificationGate {
    config: GateConfig,
    labels: ExerciseLabels,
    state: ExerciseState,
    active: bool,
}

impl ClassificationGate {
    pub fn new(config: GateConfig, labels: ExerciseLabels) -> Self {
        Self {
            config,
            labels,
            state: ExerciseState::Idle,
            active: false,
        }
    }

    pub fn state(&self) -> ExerciseState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn labels(&self) -> &ExerciseLabels {
        &self.labels
    }

    /// Begin accepting predictions from `Idle`.
    pub fn start(&mut self) {
        self.active = true;
        self.state = ExerciseState::Idle;
    }

    pub fn stop(&mut self) {
        self.active = false;
    }

    /// Apply one prediction at time `now`.
    ///
    /// Accepted exercises emit a transition every time, including
    /// `InExercise(c) -> InExercise(c)`; entering `Resting` or `Idle` emits only
    /// on change. Probabilities between the thresholds hold the state.
    pub fn on_prediction(
        &mut self,
        prediction: &Prediction,
        now: f64,
    ) -> Result<Option<StateTransition>, PredictionRejected> {
        if !self.active {
            return Ok(None);
        }
        self.validate(prediction)?;

        let probabilities = &prediction.probabilities;
        let confidence = probabilities[prediction.class_id];
        let entry = self.config.entry_threshold;

        let next = if confidence > entry && !self.labels.is_rest(prediction.class_id) {
            Some(ExerciseState::InExercise(prediction.class_id))
        } else if self
            .labels
            .rest
            .and_then(|rest| probabilities.get(rest))
            .is_some_and(|&p| p > entry)
        {
            Some(ExerciseState::Resting).filter(|_| self.state != ExerciseState::Resting)
        } else if confidence < self.config.exit_threshold {
            Some(ExerciseState::Idle).filter(|_| self.state != ExerciseState::Idle)
        } else {
            None
        };

        Ok(next.map(|to| {
            let transition = StateTransition {
                from: self.state,
                to,
                timestamp: now,
                confidence,
            };
            if transition.is_change() {
                tracing::debug!(from = ?transition.from, to = ?to, confidence, "Exercise state changed");
            }
            self.state = to;
            transition
        }))
    }

    fn validate(&self, prediction: &Prediction) -> Result<(), PredictionRejected> {
        let classes = self.labels.len();
        if prediction.class_id >= classes {
            return Err(PredictionRejected::UnknownClass {
                class_id: prediction.class_id,
                classes,
            });
        }
        if prediction.probabilities.len() != classes {
            return Err(PredictionRejected::LengthMismatch {
                expected: classes,
                actual: prediction.probabilities.len(),
            });
        }
        if let Some((index, &value)) = prediction
            .probabilities
            .iter()
            .enumerate()
            .find(|(_, p)| !p.is_finite() || **p < 0.0)
        {
            return Err(PredictionRejected::InvalidProbability { index, value });
        }
        let sum: f32 = prediction.probabilities.iter().sum();
        if (sum - 1.0).abs() > self.config.sum_tolerance {
            return Err(PredictionRejected::BadSum { sum });
        }
        Ok(())
    }
}
