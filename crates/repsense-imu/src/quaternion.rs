//! Integration core shared by every attitude estimator.

use glam::{Quat, Vec3};

/// Normalize a measurement vector. A zero (or non-finite) norm yields `None`.
pub fn unit(v: Vec3) -> Option<Vec3> {
    let norm = v.length();
    if norm == 0.0 || !norm.is_finite() {
        return None;
    }
    Some(v / norm)
}

/// Rescale a quaternion to unit length. A zero (or non-finite) norm yields `None`.
pub fn normalized(q: Quat) -> Option<Quat> {
    let norm = q.length();
    if norm == 0.0 || !norm.is_finite() {
        return None;
    }
    Some(q * (1.0 / norm))
}

/// Quaternion rate of change for a body rotating at `omega` (rad/s): `0.5 * q ⊗ (0, ω)`.
pub fn rate_derivative(q: Quat, omega: Vec3) -> Quat {
    q * Quat::from_xyzw(omega.x, omega.y, omega.z, 0.0) * 0.5
}

/// One explicit Euler step followed by renormalization.
///
/// Returns `None` when the integrated quaternion collapses to zero norm; the
/// caller keeps its previous estimate in that case.
pub fn integrate(q: Quat, q_dot: Quat, dt: f32) -> Option<Quat> {
    normalized(q + q_dot * dt)
}

/// Earth-frame magnetic reference `(bx, 0, bz)` for a sensor-frame unit reading.
///
/// The measured field is rotated into the earth frame and its horizontal part
/// collapsed onto the x axis, which removes any heading error from the reference.
pub fn magnetic_reference(q: Quat, mag: Vec3) -> Vec3 {
    let h = q * mag;
    Vec3::new((h.x * h.x + h.y * h.y).sqrt(), 0.0, h.z)
}
