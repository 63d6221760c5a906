use serde::{Deserialize, Serialize};

/// Classifier output for one feature vector.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// Predicted class index into [`ExerciseLabels`].
    pub class_id: usize,
    /// Probability per class, `K` entries summing to ~1.
    pub probabilities: Vec<f32>,
}

impl Prediction {
    pub fn new(class_id: usize, probabilities: Vec<f32>) -> Self {
        Self {
            class_id,
            probabilities,
        }
    }

    /// Prediction for the most probable class. `None` for an empty distribution.
    pub fn from_probabilities(probabilities: Vec<f32>) -> Option<Self> {
        let class_id = probabilities
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(i, _)| i)?;
        Some(Self::new(class_id, probabilities))
    }

    /// Probability of the predicted class.
    pub fn confidence(&self) -> Option<f32> {
        self.probabilities.get(self.class_id).copied()
    }
}

/// Class names in classifier output order, plus which one means "resting".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExerciseLabels {
    pub names: Vec<String>,
    /// Index of the rest class, if the classifier has one.
    pub rest: Option<usize>,
}

impl Default for ExerciseLabels {
    fn default() -> Self {
        Self {
            names: ["Squat", "Push-Up", "Lunge", "Jumping Jack", "Rest"]
                .into_iter()
                .map(String::from)
                .collect(),
            rest: Some(4),
        }
    }
}

impl ExerciseLabels {
    /// Number of classes (`K`).
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn name(&self, class_id: usize) -> &str {
        self.names.get(class_id).map_or("Unknown", String::as_str)
    }

    pub fn is_rest(&self, class_id: usize) -> bool {
        self.rest == Some(class_id)
    }
}

/// What the user is currently doing, as far as the gate is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExerciseState {
    #[default]
    Idle,
    InExercise(usize),
    Resting,
}

impl ExerciseState {
    pub fn exercise(&self) -> Option<usize> {
        match self {
            Self::InExercise(class_id) => Some(*class_id),
            _ => None,
        }
    }
}

/// Emitted by the gate; `from == to` for a confirmed repeat of the same exercise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateTransition {
    pub from: ExerciseState,
    pub to: ExerciseState,
    /// Seconds, same clock as the sample timestamps.
    pub timestamp: f64,
    /// Probability of the predicted class that triggered the transition.
    pub confidence: f32,
}

impl StateTransition {
    pub fn is_change(&self) -> bool {
        self.from != self.to
    }
}
