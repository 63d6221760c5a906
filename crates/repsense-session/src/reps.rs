use crate::types::{ExerciseState, StateTransition};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RepConfig {
    /// Minimum seconds between two counted repetitions.
    pub cooldown_s: f64,
}

impl Default for RepConfig {
    fn default() -> Self {
        Self { cooldown_s: 1.8 }
    }
}

/// Counts repetitions from gate transitions.
///
/// A rep is credited when the gate confirms the exercise that is already
/// current and the cooldown has elapsed since the previous rep. The first
/// confirmation of an exercise only makes it current; only `Idle` forgets it.
#[derive(Debug, Clone)]
pub struct RepCounter {
    cooldown_s: f64,
    count: u32,
    current: Option<usize>,
    last_rep: Option<f64>,
}

impl RepCounter {
    pub fn new(config: &RepConfig) -> Self {
        Self {
            cooldown_s: config.cooldown_s,
            count: 0,
            current: None,
            last_rep: None,
        }
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn current_exercise(&self) -> Option<usize> {
        self.current
    }

    pub fn last_rep(&self) -> Option<f64> {
        self.last_rep
    }

    /// Feed one transition. Returns the new count when a rep was credited.
    pub fn on_transition(&mut self, transition: &StateTransition) -> Option<u32> {
        let class_id = match transition.to {
            ExerciseState::InExercise(class_id) => class_id,
            ExerciseState::Idle => {
                self.current = None;
                return None;
            }
            // A confident rest keeps the exercise current.
            ExerciseState::Resting => return None,
        };

        let now = transition.timestamp;
        let cooled_down = self.last_rep.map_or(true, |last| now - last > self.cooldown_s);
        let credited = self.current == Some(class_id) && cooled_down;
        self.current = Some(class_id);

        if !credited {
            return None;
        }
        self.count += 1;
        self.last_rep = Some(now);
        Some(self.count)
    }

    pub fn reset(&mut self) {
        self.count = 0;
        self.current = None;
        self.last_rep = None;
    }
}
