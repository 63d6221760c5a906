//! Per-body composition of the attitude filter, feature assembly and session,
//! and the synchronous driver that feeds feature vectors to a [`Classifier`].

pub mod classifier;
pub mod driver;
pub mod tracker;

pub use classifier::{Classifier, ClassifierError};
pub use driver::{Pipeline, PipelineStats};
pub use tracker::{BodyTracker, TickOutput, TrackerConfig};
