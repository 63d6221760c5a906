use crate::quaternion::{integrate, normalized, rate_derivative, unit};
use glam::{Quat, Vec3};

/// Complementary filter: gyro integration blended toward the accelerometer tilt.
///
/// No gain tuning beyond `alpha`, the weight kept on the gyro path each tick.
/// Heading is never corrected, so the magnetometer is ignored.
#[derive(Debug, Clone, Copy)]
pub struct Complementary {
    alpha: f32,
}

impl Complementary {
    pub fn new(alpha: f32) -> Self {
        Self { alpha }
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn update(&self, q: Quat, gyro: Vec3, accel: Vec3, dt: f32) -> Option<Quat> {
        let accel = unit(accel)?;
        let predicted = integrate(q, rate_derivative(q, gyro), dt)?;

        // Smallest rotation that makes the predicted gravity match the measured one.
        let gravity = predicted.conjugate() * Vec3::Z;
        let measured = predicted * Quat::from_rotation_arc(accel, gravity);

        normalized(predicted.slerp(measured, 1.0 - self.alpha))
    }
}
