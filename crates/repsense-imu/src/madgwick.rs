//! Madgwick gradient-descent AHRS.
//!
//! Each step integrates the gyro rate and walks the estimate down the
//! normalized gradient of the measurement objective, scaled by `beta`.
//! Without a magnetometer reading the objective is gravity only (6-DOF form);
//! with one it also aligns the measured field with the earth reference (9-DOF).
//!
//! Reference: Madgwick, S. O. H. (2010). "An efficient orientation filter
//! for inertial and inertial/magnetic sensor arrays."

use crate::quaternion::{integrate, magnetic_reference, rate_derivative, unit};
use glam::{Quat, Vec3};
use nalgebra::{Matrix3x4, Matrix6x4, Vector3, Vector4, Vector6};

#[derive(Debug, Clone, Copy)]
pub struct Madgwick {
    beta: f32,
}

impl Madgwick {
    pub fn new(beta: f32) -> Self {
        Self { beta }
    }

    pub fn beta(&self) -> f32 {
        self.beta
    }

    /// Advance `q` by one sample. `None` means the sample was degenerate
    /// (zero-norm accel or mag) and the estimate must be left as it was.
    pub fn update(&self, q: Quat, gyro: Vec3, accel: Vec3, mag: Option<Vec3>, dt: f32) -> Option<Quat> {
        let accel = unit(accel)?;
        let gradient = match mag {
            Some(mag) => marg_gradient(q, accel, unit(mag)?),
            None => imu_gradient(q, accel),
        };

        let mut q_dot = rate_derivative(q, gyro);
        // A zero gradient means the estimate already satisfies the measurement.
        let norm = gradient.norm();
        if norm > 0.0 && norm.is_finite() {
            let step = gradient / norm;
            q_dot = q_dot - Quat::from_xyzw(step[1], step[2], step[3], step[0]) * self.beta;
        }

        integrate(q, q_dot, dt)
    }
}

/// `Jᵀ·f` for the gravity objective. Components in `(w, x, y, z)` order.
fn imu_gradient(q: Quat, a: Vec3) -> Vector4<f32> {
    let (w, x, y, z) = (q.w, q.x, q.y, q.z);

    let f = Vector3::new(
        2.0 * (x * z - w * y) - a.x,
        2.0 * (w * x + y * z) - a.y,
        2.0 * (0.5 - x * x - y * y) - a.z,
    );
    #[rustfmt::skip]
    let j = Matrix3x4::new(
        -2.0 * y,  2.0 * z, -2.0 * w, 2.0 * x,
         2.0 * x,  2.0 * w,  2.0 * z, 2.0 * y,
         0.0,     -4.0 * x, -4.0 * y, 0.0,
    );

    j.transpose() * f
}

/// `Jᵀ·f` for the combined gravity + magnetic field objective.
fn marg_gradient(q: Quat, a: Vec3, m: Vec3) -> Vector4<f32> {
    let (w, x, y, z) = (q.w, q.x, q.y, q.z);
    let b = magnetic_reference(q, m);
    let (bx, bz) = (b.x, b.z);

    let f = Vector6::new(
        2.0 * (x * z - w * y) - a.x,
        2.0 * (w * x + y * z) - a.y,
        2.0 * (0.5 - x * x - y * y) - a.z,
        2.0 * bx * (0.5 - y * y - z * z) + 2.0 * bz * (x * z - w * y) - m.x,
        2.0 * bx * (x * y - w * z) + 2.0 * bz * (w * x + y * z) - m.y,
        2.0 * bx * (w * y + x * z) + 2.0 * bz * (0.5 - x * x - y * y) - m.z,
    );
    #[rustfmt::skip]
    let j = Matrix6x4::new(
        -2.0 * y,                      2.0 * z,                      -2.0 * w,                      2.0 * x,
         2.0 * x,                      2.0 * w,                       2.0 * z,                      2.0 * y,
         0.0,                         -4.0 * x,                      -4.0 * y,                      0.0,
        -2.0 * bz * y,                 2.0 * bz * z,                 -4.0 * bx * y - 2.0 * bz * w, -4.0 * bx * z + 2.0 * bz * x,
        -2.0 * bx * z + 2.0 * bz * x,  2.0 * bx * y + 2.0 * bz * w,   2.0 * bx * x + 2.0 * bz * z, -2.0 * bx * w + 2.0 * bz * y,
         2.0 * bx * y,                 2.0 * bx * z - 4.0 * bz * x,   2.0 * bx * w - 4.0 * bz * y,  2.0 * bx * x,
    );

    j.transpose() * f
}
