use crate::complementary::Complementary;
use crate::madgwick::Madgwick;
use crate::mahony::Mahony;
use crate::types::{ImuSample, MotionSignals, Orientation, STANDARD_GRAVITY};
use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Attitude algorithm and its gains, chosen once at construction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterAlgorithm {
    /// Gradient descent. Higher `beta` = faster convergence, more noise.
    Madgwick { beta: f32 },
    /// Proportional-integral feedback on the field direction error.
    Mahony { kp: f32, ki: f32 },
    /// Gyro integration slerped toward the accelerometer tilt at `1 - alpha`.
    Complementary { alpha: f32 },
}

impl Default for FilterAlgorithm {
    fn default() -> Self {
        Self::Madgwick { beta: 0.1 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    pub algorithm: FilterAlgorithm,
    /// Fuse magnetometer readings when the sample carries one.
    pub use_magnetometer: bool,
    /// Number of samples averaged into the gyro bias before filtering starts.
    /// Zero disables calibration.
    pub calibration_samples: u32,
    /// Largest timestamp gap (seconds) trusted as a dt; longer gaps fall back
    /// to the nominal period.
    pub max_dt: f32,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            algorithm: FilterAlgorithm::default(),
            use_magnetometer: true,
            calibration_samples: 0,
            max_dt: 0.1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum TickError {
    #[error("Sample timestamp {timestamp} does not advance past {previous}")]
    NonMonotonic { previous: f64, timestamp: f64 },
    #[error("Sample timestamp {timestamp} is not finite")]
    InvalidTimestamp { timestamp: f64 },
}

enum Estimator {
    Madgwick(Madgwick),
    Mahony(Mahony),
    Complementary(Complementary),
}

impl Estimator {
    fn from_algorithm(algorithm: FilterAlgorithm) -> Self {
        match algorithm {
            FilterAlgorithm::Madgwick { beta } => Self::Madgwick(Madgwick::new(beta)),
            FilterAlgorithm::Mahony { kp, ki } => Self::Mahony(Mahony::new(kp, ki)),
            FilterAlgorithm::Complementary { alpha } => Self::Complementary(Complementary::new(alpha)),
        }
    }
}

enum CalibrationState {
    Collecting { samples: Vec<Vec3>, target: usize },
    Calibrated,
}

impl CalibrationState {
    fn collecting(target: u32) -> Self {
        if target == 0 {
            return Self::Calibrated;
        }
        Self::Collecting {
            samples: Vec::with_capacity(target as usize),
            target: target as usize,
        }
    }
}

/// Attitude estimate for one tracked body.
///
/// Consumes SI samples (see [`crate::SensorConfig::to_si`]) and keeps a unit
/// quaternion up to date. Degenerate readings hold the previous estimate.
pub struct AttitudeFilter {
    estimator: Estimator,
    orientation: Orientation,
    use_magnetometer: bool,
    nominal_dt: f32,
    max_dt: f32,
    last_timestamp: Option<f64>,
    /// Gyroscope bias (average of calibration samples).
    gyro_bias: Vec3,
    calibration: CalibrationState,
    /// Reference quaternion for "set zero".
    zero_ref: Quat,
}

impl AttitudeFilter {
    pub fn new(config: &FusionConfig, sample_rate_hz: f32) -> Self {
        tracing::debug!(algorithm = ?config.algorithm, sample_rate_hz, "Attitude filter created");
        Self {
            estimator: Estimator::from_algorithm(config.algorithm),
            orientation: Orientation::default(),
            use_magnetometer: config.use_magnetometer,
            nominal_dt: 1.0 / sample_rate_hz,
            max_dt: config.max_dt,
            last_timestamp: None,
            gyro_bias: Vec3::ZERO,
            calibration: CalibrationState::collecting(config.calibration_samples),
            zero_ref: Quat::IDENTITY,
        }
    }

    /// Process one sample and return the current orientation.
    ///
    /// A timestamp that is not finite or does not advance is rejected and
    /// leaves all state untouched.
    pub fn update(&mut self, sample: &ImuSample) -> Result<Orientation, TickError> {
        let dt = self.advance_clock(sample.timestamp)?;

        if let CalibrationState::Collecting { samples, target } = &mut self.calibration {
            samples.push(sample.gyro);
            if samples.len() >= *target {
                let sum: Vec3 = samples.iter().copied().sum();
                self.gyro_bias = sum / samples.len() as f32;
                self.calibration = CalibrationState::Calibrated;
                tracing::info!(
                    bias_x = self.gyro_bias.x,
                    bias_y = self.gyro_bias.y,
                    bias_z = self.gyro_bias.z,
                    "Gyro calibration complete"
                );
            }
            return Ok(self.orientation);
        }

        let q = self.orientation.quaternion;
        let gyro = sample.gyro - self.gyro_bias;
        let mag = sample.mag.filter(|_| self.use_magnetometer);

        let next = match &mut self.estimator {
            Estimator::Madgwick(f) => f.update(q, gyro, sample.accel, mag, dt),
            Estimator::Mahony(f) => f.update(q, gyro, sample.accel, mag, dt),
            Estimator::Complementary(f) => f.update(q, gyro, sample.accel, dt),
        };

        match next {
            Some(q) => self.orientation.quaternion = q,
            None => tracing::trace!(timestamp = sample.timestamp, "Degenerate sample, holding orientation"),
        }

        Ok(self.orientation)
    }

    fn advance_clock(&mut self, timestamp: f64) -> Result<f32, TickError> {
        if !timestamp.is_finite() {
            return Err(TickError::InvalidTimestamp { timestamp });
        }
        let dt = match self.last_timestamp {
            Some(previous) if timestamp <= previous => {
                return Err(TickError::NonMonotonic {
                    previous,
                    timestamp,
                });
            }
            Some(previous) => {
                let dt = (timestamp - previous) as f32;
                if dt > self.max_dt {
                    self.nominal_dt
                } else {
                    dt
                }
            }
            None => self.nominal_dt,
        };
        self.last_timestamp = Some(timestamp);
        Ok(dt)
    }

    /// Linear acceleration and body-frame angular velocity for `sample`
    /// under the current orientation.
    pub fn motion_signals(&self, sample: &ImuSample) -> MotionSignals {
        let inverse = self.orientation.quaternion.conjugate();
        MotionSignals {
            linear_accel: sample.accel - inverse * Vec3::new(0.0, 0.0, STANDARD_GRAVITY),
            body_gyro: inverse * (sample.gyro - self.gyro_bias),
        }
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    /// Orientation relative to the reference captured by [`Self::set_zero`].
    pub fn relative(&self) -> Orientation {
        Orientation {
            quaternion: self.zero_ref.conjugate() * self.orientation.quaternion,
        }
    }

    /// Set current orientation as the zero reference.
    pub fn set_zero(&mut self) {
        self.zero_ref = self.orientation.quaternion;
        tracing::info!("Zero reference set");
    }

    /// Restart gyro bias calibration.
    pub fn recalibrate(&mut self, samples: u32) {
        self.calibration = CalibrationState::collecting(samples);
        self.gyro_bias = Vec3::ZERO;
        tracing::info!(samples, "Recalibration started");
    }

    /// Whether calibration is complete.
    pub fn is_calibrated(&self) -> bool {
        matches!(self.calibration, CalibrationState::Calibrated)
    }

    pub fn gyro_bias(&self) -> Vec3 {
        self.gyro_bias
    }

    /// Back to identity with a fresh clock. Calibration and bias are kept.
    pub fn reset(&mut self) {
        self.orientation = Orientation::default();
        self.zero_ref = Quat::IDENTITY;
        self.last_timestamp = None;
        if let Estimator::Mahony(f) = &mut self.estimator {
            f.reset_integral();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;

    const RATE: f32 = 100.0;

    fn filter(algorithm: FilterAlgorithm) -> AttitudeFilter {
        AttitudeFilter::new(
            &FusionConfig {
                algorithm,
                ..Default::default()
            },
            RATE,
        )
    }

    fn tick(i: usize) -> f64 {
        i as f64 / RATE as f64
    }

    fn settles_on_gravity(algorithm: FilterAlgorithm, ticks: usize) {
        let mut f = filter(algorithm);
        let tilt = Vec3::new(0.0, 0.5, 0.866).normalize();
        let accel = tilt * STANDARD_GRAVITY;

        let mut history = Vec::new();
        for i in 0..ticks {
            let o = f.update(&ImuSample::new(accel, Vec3::ZERO, tick(i))).unwrap();
            history.push(o.gravity_direction());
        }

        let last = history[history.len() - 1];
        assert_abs_diff_eq!(last.dot(tilt), 1.0, epsilon = 1e-4);
        // No drift once settled.
        for g in &history[history.len() - 100..] {
            assert!((*g - last).length() < 1e-2, "{algorithm:?} drifted");
        }
    }

    #[test]
    fn madgwick_settles_on_gravity() {
        settles_on_gravity(FilterAlgorithm::Madgwick { beta: 0.1 }, 1500);
    }

    #[test]
    fn mahony_settles_on_gravity() {
        settles_on_gravity(FilterAlgorithm::Mahony { kp: 1.0, ki: 0.0 }, 1500);
    }

    #[test]
    fn complementary_settles_on_gravity() {
        settles_on_gravity(FilterAlgorithm::Complementary { alpha: 0.98 }, 1500);
    }

    #[test]
    fn level_and_still_stays_at_identity() {
        for algorithm in [
            FilterAlgorithm::Madgwick { beta: 0.1 },
            FilterAlgorithm::Mahony { kp: 1.0, ki: 0.1 },
        ] {
            let mut f = filter(algorithm);
            for i in 0..500 {
                f.update(&ImuSample::new(Vec3::Z * STANDARD_GRAVITY, Vec3::ZERO, tick(i)))
                    .unwrap();
            }
            assert_abs_diff_eq!(f.orientation().quaternion.w, 1.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn zero_accel_holds_orientation() {
        let mut f = filter(FilterAlgorithm::default());
        let before = f
            .update(&ImuSample::new(Vec3::new(0.0, 3.0, 9.0), Vec3::X, 0.0))
            .unwrap();
        let after = f
            .update(&ImuSample::new(Vec3::ZERO, Vec3::X, 0.01))
            .unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn non_monotonic_timestamp_is_rejected() {
        let mut f = filter(FilterAlgorithm::default());
        f.update(&ImuSample::new(Vec3::Z, Vec3::ZERO, 1.0)).unwrap();

        let err = f
            .update(&ImuSample::new(Vec3::Z, Vec3::X, 1.0))
            .unwrap_err();
        assert_eq!(
            err,
            TickError::NonMonotonic {
                previous: 1.0,
                timestamp: 1.0
            }
        );
        assert!(f.update(&ImuSample::new(Vec3::Z, Vec3::ZERO, 0.5)).is_err());
        assert!(f.update(&ImuSample::new(Vec3::Z, Vec3::ZERO, 1.01)).is_ok());
    }

    #[test]
    fn non_finite_timestamp_leaves_state_intact() {
        let mut f = filter(FilterAlgorithm::Mahony { kp: 1.0, ki: 0.1 });
        f.update(&ImuSample::new(Vec3::Z, Vec3::ZERO, 0.0)).unwrap();

        for bad in [f64::NAN, f64::INFINITY] {
            let err = f
                .update(&ImuSample::new(Vec3::Z, Vec3::X, bad))
                .unwrap_err();
            assert!(matches!(err, TickError::InvalidTimestamp { .. }));
        }

        let accel = Quat::from_rotation_x(0.5).conjugate() * Vec3::Z * STANDARD_GRAVITY;
        for i in 1..2000 {
            let o = f
                .update(&ImuSample::new(accel, Vec3::ZERO, tick(i)))
                .unwrap();
            assert!(o.quaternion.is_finite());
        }
        assert_abs_diff_eq!(f.orientation().gravity_direction().dot(accel.normalize()), 1.0, epsilon = 1e-3);
    }

    #[test]
    fn magnetometer_can_be_disabled() {
        let mut with_mag_disabled = AttitudeFilter::new(
            &FusionConfig {
                use_magnetometer: false,
                ..Default::default()
            },
            RATE,
        );
        let mut without_mag = filter(FilterAlgorithm::default());

        for i in 0..200 {
            let accel = Vec3::new(1.0, 0.5, 9.5);
            let gyro = Vec3::new(0.1, 0.0, -0.2);
            let a = with_mag_disabled
                .update(&ImuSample::new(accel, gyro, tick(i)).with_mag(Vec3::new(0.3, 0.1, -0.9)))
                .unwrap();
            let b = without_mag
                .update(&ImuSample::new(accel, gyro, tick(i)))
                .unwrap();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn calibration_estimates_gyro_bias_then_filters() {
        let mut f = AttitudeFilter::new(
            &FusionConfig {
                calibration_samples: 50,
                ..Default::default()
            },
            RATE,
        );
        let bias = Vec3::new(0.01, -0.02, 0.005);
        for i in 0..50 {
            assert!(!f.is_calibrated());
            let o = f
                .update(&ImuSample::new(Vec3::Z * STANDARD_GRAVITY, bias, tick(i)))
                .unwrap();
            assert_eq!(o, Orientation::default());
        }
        assert!(f.is_calibrated());
        assert_abs_diff_eq!(f.gyro_bias().y, bias.y, epsilon = 1e-6);

        // Bias is removed, so a still sensor stays still.
        for i in 50..300 {
            f.update(&ImuSample::new(Vec3::Z * STANDARD_GRAVITY, bias, tick(i)))
                .unwrap();
        }
        assert_abs_diff_eq!(f.orientation().quaternion.w, 1.0, epsilon = 1e-5);

        f.recalibrate(10);
        assert!(!f.is_calibrated());
        assert_eq!(f.gyro_bias(), Vec3::ZERO);
    }

    #[test]
    fn motion_signals_remove_gravity() {
        let mut f = filter(FilterAlgorithm::Mahony { kp: 2.0, ki: 0.0 });
        let tilt = Quat::from_rotation_x(0.6);
        let accel = tilt.conjugate() * Vec3::Z * STANDARD_GRAVITY;
        for i in 0..2000 {
            f.update(&ImuSample::new(accel, Vec3::ZERO, tick(i))).unwrap();
        }

        let push = Vec3::new(0.5, 0.0, 0.0);
        let gyro = Vec3::new(0.0, 0.0, 1.0);
        let signals = f.motion_signals(&ImuSample::new(accel + push, gyro, tick(2000)));
        assert_abs_diff_eq!(signals.linear_accel.x, 0.5, epsilon = 1e-3);
        assert_abs_diff_eq!(signals.linear_accel.y, 0.0, epsilon = 1e-3);
        assert_abs_diff_eq!(signals.linear_accel.z, 0.0, epsilon = 1e-3);
        assert_abs_diff_eq!(signals.body_gyro.length(), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn zero_reference_gives_relative_orientation() {
        let mut f = filter(FilterAlgorithm::Mahony { kp: 2.0, ki: 0.0 });
        let accel = Quat::from_rotation_x(0.4).conjugate() * Vec3::Z;
        for i in 0..1000 {
            f.update(&ImuSample::new(accel, Vec3::ZERO, tick(i))).unwrap();
        }
        f.set_zero();
        assert_abs_diff_eq!(f.relative().quaternion.w.abs(), 1.0, epsilon = 1e-6);
        assert!(f.orientation().quaternion.w < 0.99);
    }

    #[test]
    fn reset_returns_to_identity() {
        let mut f = filter(FilterAlgorithm::Mahony { kp: 1.0, ki: 0.5 });
        for i in 0..100 {
            f.update(&ImuSample::new(Vec3::new(0.0, 1.0, 1.0), Vec3::X, tick(i)))
                .unwrap();
        }
        f.reset();
        assert_eq!(f.orientation(), Orientation::default());
        // Clock was cleared, so an earlier timestamp is accepted again.
        assert!(f.update(&ImuSample::new(Vec3::Z, Vec3::ZERO, 0.0)).is_ok());
    }

    fn vec3(range: f32) -> impl Strategy<Value = Vec3> {
        (-range..range, -range..range, -range..range).prop_map(|(x, y, z)| Vec3::new(x, y, z))
    }

    fn algorithm() -> impl Strategy<Value = FilterAlgorithm> {
        prop_oneof![
            (0.01f32..1.0).prop_map(|beta| FilterAlgorithm::Madgwick { beta }),
            (0.1f32..5.0, 0.0f32..1.0).prop_map(|(kp, ki)| FilterAlgorithm::Mahony { kp, ki }),
            (0.5f32..0.999).prop_map(|alpha| FilterAlgorithm::Complementary { alpha }),
        ]
    }

    proptest! {
        #[test]
        fn orientation_stays_unit_norm(
            algorithm in algorithm(),
            samples in prop::collection::vec((vec3(30.0), vec3(10.0), prop::option::of(vec3(1.0))), 1..200),
        ) {
            let mut f = filter(algorithm);
            for (i, (accel, gyro, mag)) in samples.into_iter().enumerate() {
                let mut sample = ImuSample::new(accel, gyro, tick(i));
                sample.mag = mag;
                let o = f.update(&sample).unwrap();
                prop_assert!((o.norm() - 1.0).abs() <= 1e-4, "norm {}", o.norm());
            }
        }
    }
}
