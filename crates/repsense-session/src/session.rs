use crate::gate::{ClassificationGate, GateConfig, PredictionRejected};
use crate::reps::{RepConfig, RepCounter};
use crate::types::{ExerciseLabels, ExerciseState, Prediction};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub labels: ExerciseLabels,
    pub gate: GateConfig,
    pub reps: RepConfig,
}

/// Why a feature vector or prediction never reached the counter.
#[derive(Debug, Clone, PartialEq)]
pub enum DiscardReason {
    Rejected(PredictionRejected),
    /// Window closed `lag` seconds before the newest sample.
    Stale { lag: f64 },
    ClassifierFailed { message: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    ExerciseChanged(ExerciseState),
    RepCounted { class_id: usize, count: u32 },
    SessionEnded { final_count: u32 },
    PredictionDiscarded(DiscardReason),
}

/// One workout: a classification gate feeding a rep counter.
pub struct Session {
    gate: ClassificationGate,
    counter: RepCounter,
}

impl Session {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            gate: ClassificationGate::new(config.gate.clone(), config.labels.clone()),
            counter: RepCounter::new(&config.reps),
        }
    }

    /// Activate and reset the count.
    pub fn start(&mut self) {
        self.counter.reset();
        self.gate.start();
        tracing::info!("Session started");
    }

    /// Deactivate. `None` if the session was not running.
    pub fn stop(&mut self) -> Option<SessionEvent> {
        if !self.gate.is_active() {
            return None;
        }
        self.gate.stop();
        let final_count = self.counter.count();
        tracing::info!(final_count, "Session ended");
        Some(SessionEvent::SessionEnded { final_count })
    }

    pub fn is_active(&self) -> bool {
        self.gate.is_active()
    }

    pub fn count(&self) -> u32 {
        self.counter.count()
    }

    pub fn state(&self) -> ExerciseState {
        self.gate.state()
    }

    pub fn labels(&self) -> &ExerciseLabels {
        self.gate.labels()
    }

    pub fn on_prediction(&mut self, prediction: &Prediction, now: f64) -> Vec<SessionEvent> {
        let transition = match self.gate.on_prediction(prediction, now) {
            Ok(Some(transition)) => transition,
            Ok(None) => return Vec::new(),
            Err(e) => {
                tracing::debug!(error = %e, "Prediction rejected");
                return vec![SessionEvent::PredictionDiscarded(DiscardReason::Rejected(e))];
            }
        };

        let mut events = Vec::new();
        if transition.is_change() {
            events.push(SessionEvent::ExerciseChanged(transition.to));
        }
        if let Some(count) = self.counter.on_transition(&transition) {
            let class_id = prediction.class_id;
            tracing::info!(count, exercise = self.labels().name(class_id), "Rep counted");
            events.push(SessionEvent::RepCounted { class_id, count });
        }
        events
    }
}
