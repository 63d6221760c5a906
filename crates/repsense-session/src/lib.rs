//! Classifier output to exercise state and repetition counts.
//!
//! Predictions pass through a [`ClassificationGate`] (confidence hysteresis)
//! whose transitions drive a [`RepCounter`] (same-exercise cooldown). A
//! [`Session`] owns both and reports [`SessionEvent`]s.

mod gate;
mod reps;
mod session;
mod types;

pub use gate::{ClassificationGate, GateConfig, PredictionRejected};
pub use reps::{RepConfig, RepCounter};
pub use session::{DiscardReason, Session, SessionConfig, SessionEvent};
pub use types::*;
