//! Mahony PI-feedback AHRS.

use crate::quaternion::{integrate, magnetic_reference, rate_derivative, unit};
use glam::{Quat, Vec3};

#[derive(Debug, Clone, Copy)]
pub struct Mahony {
    kp: f32,
    ki: f32,
    /// Accumulated integral feedback (gyro bias estimate), rad/s.
    integral: Vec3,
}

impl Mahony {
    pub fn new(kp: f32, ki: f32) -> Self {
        Self {
            kp,
            ki,
            integral: Vec3::ZERO,
        }
    }

    pub fn integral(&self) -> Vec3 {
        self.integral
    }

    pub fn reset_integral(&mut self) {
        self.integral = Vec3::ZERO;
    }

    /// Advance `q` by one sample. `None` leaves the estimate and the integral
    /// untouched (zero-norm accel or mag, non-finite gyro or dt).
    pub fn update(&mut self, q: Quat, gyro: Vec3, accel: Vec3, mag: Option<Vec3>, dt: f32) -> Option<Quat> {
        if !(dt.is_finite() && gyro.is_finite()) {
            return None;
        }
        let accel = unit(accel)?;
        let mag = match mag {
            Some(m) => Some(unit(m)?),
            None => None,
        };

        // Error is the cross product between measured and estimated field directions.
        let gravity = q.conjugate() * Vec3::Z;
        let mut error = accel.cross(gravity);
        if let Some(mag) = mag {
            let field = q.conjugate() * magnetic_reference(q, mag);
            error += mag.cross(field);
        }

        let mut omega = gyro;
        if self.ki > 0.0 {
            self.integral += error * self.ki * dt;
            omega += self.integral;
        } else {
            self.integral = Vec3::ZERO;
        }
        omega += error * self.kp;

        integrate(q, rate_derivative(q, omega), dt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn integral_stays_zero_without_integral_gain() {
        let mut filter = Mahony::new(1.0, 0.0);
        let accel = Vec3::new(0.0, 0.5, 1.0);
        let mut q = Quat::IDENTITY;
        for _ in 0..50 {
            q = filter.update(q, Vec3::ZERO, accel, None, 0.01).unwrap();
            assert_eq!(filter.integral(), Vec3::ZERO);
        }
    }

    #[test]
    fn integral_accumulates_with_integral_gain() {
        let mut filter = Mahony::new(1.0, 0.5);
        filter
            .update(Quat::IDENTITY, Vec3::ZERO, Vec3::new(0.0, 0.5, 1.0), None, 0.01)
            .unwrap();
        assert!(filter.integral().length() > 0.0);

        filter.reset_integral();
        assert_eq!(filter.integral(), Vec3::ZERO);
    }

    #[test]
    fn integral_learns_constant_gyro_bias() {
        let mut filter = Mahony::new(2.0, 1.0);
        let tilt = Vec3::new(0.0, 0.4, 1.0).normalize();
        let offset = Vec3::new(0.02, -0.01, 0.0);
        let mut q = Quat::IDENTITY;
        for _ in 0..6000 {
            q = filter.update(q, offset, tilt, None, 0.01).unwrap();
        }
        // The integral cancels the bias on the observable (horizontal) axes.
        assert_abs_diff_eq!(filter.integral().x, -offset.x, epsilon = 2e-3);
        assert_abs_diff_eq!((q.conjugate() * Vec3::Z).dot(tilt), 1.0, epsilon = 1e-3);
    }

    #[test]
    fn degenerate_input_leaves_integral_untouched() {
        let mut filter = Mahony::new(1.0, 0.5);
        filter
            .update(Quat::IDENTITY, Vec3::ZERO, Vec3::new(0.0, 0.5, 1.0), None, 0.01)
            .unwrap();
        let before = filter.integral();
        assert!(filter
            .update(Quat::IDENTITY, Vec3::ZERO, Vec3::ZERO, None, 0.01)
            .is_none());
        assert!(filter
            .update(Quat::IDENTITY, Vec3::ZERO, Vec3::Z, Some(Vec3::ZERO), 0.01)
            .is_none());
        assert_eq!(filter.integral(), before);
    }

    #[test]
    fn non_finite_step_leaves_integral_untouched() {
        let mut filter = Mahony::new(1.0, 0.5);
        let tilt = Vec3::new(0.0, 0.5, 1.0);
        filter.update(Quat::IDENTITY, Vec3::ZERO, tilt, None, 0.01).unwrap();
        let before = filter.integral();

        assert!(filter.update(Quat::IDENTITY, Vec3::ZERO, tilt, None, f32::NAN).is_none());
        assert!(filter
            .update(Quat::IDENTITY, Vec3::new(f32::INFINITY, 0.0, 0.0), tilt, None, 0.01)
            .is_none());
        assert_eq!(filter.integral(), before);
        assert!(filter.update(Quat::IDENTITY, Vec3::ZERO, tilt, None, 0.01).is_some());
    }

    #[test]
    fn magnetometer_pulls_heading_toward_north() {
        let mut filter = Mahony::new(2.0, 0.0);
        // Sensor yawed 30 degrees; only the field reading reveals it.
        let truth = Quat::from_rotation_z(30f32.to_radians());
        let field = Vec3::new(0.4, 0.0, -0.9).normalize();
        let mag = truth.conjugate() * field;
        let accel = truth.conjugate() * Vec3::Z;

        let mut q = Quat::IDENTITY;
        for _ in 0..3000 {
            q = filter.update(q, Vec3::ZERO, accel, Some(mag), 0.01).unwrap();
        }

        let yaw_error = q.angle_between(truth).to_degrees();
        assert!(yaw_error < 2.0, "yaw error {yaw_error}");
    }
}
