use repsense_features::FeatureVector;
use repsense_session::Prediction;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("Feature vector has {actual} values, classifier expects {expected}")]
    InputShape { expected: usize, actual: usize },
    #[error("Inference failed: {0}")]
    Inference(String),
}

/// External exercise classifier: one feature vector in, one distribution out.
///
/// Called synchronously once per window; it should return well within one
/// window period.
pub trait Classifier {
    fn predict(&mut self, features: &FeatureVector) -> Result<Prediction, ClassifierError>;
}

impl<F> Classifier for F
where
    F: FnMut(&FeatureVector) -> Result<Prediction, ClassifierError>,
{
    fn predict(&mut self, features: &FeatureVector) -> Result<Prediction, ClassifierError> {
        self(features)
    }
}
