use repsense_features::{FeatureVector, FRAME_LEN};
use repsense_imu::STANDARD_GRAVITY;
use repsense_pipeline::{Classifier, ClassifierError};
use repsense_session::{ExerciseLabels, Prediction};
use std::time::Duration;

/// Smoothed gyro magnitude (rad/s) that reads as full-confidence exercise.
const ROTATION_SCALE: f32 = 0.5;
/// Deviation of |accel| from gravity (m/s^2) that reads as full-confidence exercise.
const ACCEL_SCALE: f32 = 2.0;

/// Stand-in for a trained model.
///
/// Scores the latest frame of each vector by how much it moves: rotation or
/// gravity-free acceleration votes for the first non-rest label, stillness
/// for rest. `latency` sleeps the calling thread to mimic blocking model
/// inference, so callers on an async runtime must move off the reactor.
pub struct MotionHeuristic {
    classes: usize,
    exercise: usize,
    rest: Option<usize>,
    latency: Duration,
}

impl MotionHeuristic {
    pub fn new(labels: &ExerciseLabels, latency: Duration) -> Self {
        let exercise = (0..labels.len()).find(|&i| !labels.is_rest(i)).unwrap_or(0);
        Self {
            classes: labels.len(),
            exercise,
            rest: labels.rest.filter(|&r| r != exercise),
            latency,
        }
    }

    fn exercise_probability(frame: &[f32]) -> f32 {
        let rotation = frame[7] / ROTATION_SCALE;
        let shake = (frame[6] - STANDARD_GRAVITY).abs() / ACCEL_SCALE;
        0.05 + 0.9 * rotation.max(shake).clamp(0.0, 1.0)
    }
}

impl Classifier for MotionHeuristic {
    fn predict(&mut self, features: &FeatureVector) -> Result<Prediction, ClassifierError> {
        let frame = features.last_frame().ok_or(ClassifierError::InputShape {
            expected: FRAME_LEN,
            actual: features.len(),
        })?;
        if self.classes == 0 {
            return Err(ClassifierError::Inference("no labels configured".into()));
        }
        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }

        let p = Self::exercise_probability(frame);
        let mut probabilities = vec![0.0; self.classes];
        match self.rest {
            Some(rest) => {
                probabilities[self.exercise] = p;
                probabilities[rest] = 1.0 - p;
            }
            None if self.classes > 1 => {
                let share = (1.0 - p) / (self.classes - 1) as f32;
                for (i, value) in probabilities.iter_mut().enumerate() {
                    *value = if i == self.exercise { p } else { share };
                }
            }
            None => probabilities[self.exercise] = 1.0,
        }

        Prediction::from_probabilities(probabilities)
            .ok_or_else(|| ClassifierError::Inference("empty distribution".into()))
    }
}
