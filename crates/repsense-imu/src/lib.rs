//! Attitude estimation for inertial sample streams.
//!
//! One [`AttitudeFilter`] per tracked body turns SI-unit [`ImuSample`]s into a
//! unit-quaternion [`Orientation`] using a Madgwick, Mahony or complementary
//! estimator, and derives gravity-free acceleration and body-frame rates.

pub mod complementary;
pub mod fusion;
pub mod madgwick;
pub mod mahony;
pub mod quaternion;
pub mod types;

pub use fusion::{AttitudeFilter, FilterAlgorithm, FusionConfig, TickError};
pub use types::*;
