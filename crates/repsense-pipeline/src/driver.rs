use crate::classifier::Classifier;
use crate::tracker::{BodyTracker, TrackerConfig};
use repsense_features::FeatureVector;
use repsense_imu::ImuSample;
use repsense_session::{DiscardReason, SessionEvent};
use std::time::Instant;

/// Running totals for one pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub samples: u64,
    pub dropped_ticks: u64,
    pub vectors: u64,
    pub classified: u64,
    pub stale: u64,
    pub classifier_failures: u64,
}

/// Synchronous driver: samples in, session events out.
///
/// Feature vectors are classified as soon as their window closes. A vector
/// that is already more than one window period behind the newest sample of
/// its batch is dropped instead of classified.
pub struct Pipeline<C> {
    tracker: BodyTracker,
    classifier: C,
    stats: PipelineStats,
}

impl<C: Classifier> Pipeline<C> {
    pub fn new(config: &TrackerConfig, classifier: C) -> Self {
        Self {
            tracker: BodyTracker::new(config),
            classifier,
            stats: PipelineStats::default(),
        }
    }

    pub fn start(&mut self) {
        self.tracker.start();
    }

    pub fn stop(&mut self) -> Option<SessionEvent> {
        self.tracker.stop()
    }

    /// Process a single sample.
    pub fn process(&mut self, sample: &ImuSample) -> Vec<SessionEvent> {
        self.process_batch(std::slice::from_ref(sample))
    }

    /// Process every sample that was available at one wake-up, in order.
    pub fn process_batch(&mut self, samples: &[ImuSample]) -> Vec<SessionEvent> {
        let newest = samples
            .iter()
            .map(|s| s.timestamp)
            .fold(f64::NEG_INFINITY, f64::max);
        let mut events = Vec::new();

        for sample in samples {
            self.stats.samples += 1;
            let output = match self.tracker.on_sample(sample) {
                Ok(output) => output,
                Err(_) => {
                    self.stats.dropped_ticks += 1;
                    continue;
                }
            };
            if let Some(vector) = output.features {
                self.stats.vectors += 1;
                events.extend(self.classify(&vector, newest));
            }
        }
        events
    }

    fn classify(&mut self, vector: &FeatureVector, newest: f64) -> Vec<SessionEvent> {
        if !self.tracker.session().is_active() {
            return Vec::new();
        }

        let period = self.tracker.window_period();
        let lag = newest - vector.window_end;
        if lag > period {
            self.stats.stale += 1;
            tracing::debug!(lag, sequence = vector.sequence, "Dropping stale feature vector");
            return vec![SessionEvent::PredictionDiscarded(DiscardReason::Stale { lag })];
        }

        let started = Instant::now();
        let result = self.classifier.predict(vector);
        let latency = started.elapsed().as_secs_f64();
        if latency > period {
            tracing::warn!(
                latency_ms = latency * 1000.0,
                budget_ms = period * 1000.0,
                "Classifier overran the window period"
            );
        }

        match result {
            Ok(prediction) => {
                self.stats.classified += 1;
                self.tracker.on_prediction(&prediction, vector.window_end)
            }
            Err(e) => {
                self.stats.classifier_failures += 1;
                tracing::warn!(error = %e, sequence = vector.sequence, "Classifier failed");
                vec![SessionEvent::PredictionDiscarded(DiscardReason::ClassifierFailed {
                    message: e.to_string(),
                })]
            }
        }
    }

    pub fn tracker(&self) -> &BodyTracker {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut BodyTracker {
        &mut self.tracker
    }

    pub fn classifier(&self) -> &C {
        &self.classifier
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }
}
