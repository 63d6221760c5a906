use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Standard gravity in m/s^2.
pub const STANDARD_GRAVITY: f32 = 9.80665;

/// One inertial reading as delivered by a sample source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImuSample {
    /// Accelerometer reading (units declared in [`SensorConfig`]).
    pub accel: Vec3,
    /// Gyroscope angular velocity (units declared in [`SensorConfig`]).
    pub gyro: Vec3,
    /// Magnetometer reading, if the source has one. Only the direction is used.
    pub mag: Option<Vec3>,
    /// Monotonic timestamp in seconds.
    pub timestamp: f64,
}

impl ImuSample {
    pub fn new(accel: Vec3, gyro: Vec3, timestamp: f64) -> Self {
        Self {
            accel,
            gyro,
            mag: None,
            timestamp,
        }
    }

    pub fn with_mag(mut self, mag: Vec3) -> Self {
        self.mag = Some(mag);
        self
    }
}

/// Unit the accelerometer reports in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccelUnit {
    #[default]
    MetersPerSecondSquared,
    /// Multiples of standard gravity (phone sensor APIs commonly report this).
    StandardGravity,
}

/// Unit the gyroscope reports in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GyroUnit {
    #[default]
    RadiansPerSecond,
    DegreesPerSecond,
}

/// Static description of the sample source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// Nominal sample rate in Hz.
    pub sample_rate_hz: f32,
    pub accel_unit: AccelUnit,
    pub gyro_unit: GyroUnit,
    /// Rotation from the sensor's axes into the body frame used for fusion.
    #[serde(with = "quat_serde")]
    pub mount_rotation: Quat,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 100.0,
            accel_unit: AccelUnit::default(),
            gyro_unit: GyroUnit::default(),
            mount_rotation: Quat::IDENTITY,
        }
    }
}

impl SensorConfig {
    /// Nominal time between samples in seconds.
    pub fn nominal_period(&self) -> f32 {
        1.0 / self.sample_rate_hz
    }

    /// Convert a raw sample to SI units (m/s^2, rad/s) in the body frame.
    pub fn to_si(&self, raw: &ImuSample) -> ImuSample {
        let accel = match self.accel_unit {
            AccelUnit::MetersPerSecondSquared => raw.accel,
            AccelUnit::StandardGravity => raw.accel * STANDARD_GRAVITY,
        };
        let gyro = match self.gyro_unit {
            GyroUnit::RadiansPerSecond => raw.gyro,
            GyroUnit::DegreesPerSecond => raw.gyro * std::f32::consts::PI / 180.0,
        };
        let mount = self.mount_rotation;
        ImuSample {
            accel: mount * accel,
            gyro: mount * gyro,
            mag: raw.mag.map(|m| mount * m),
            timestamp: raw.timestamp,
        }
    }
}

/// Fused orientation output from the attitude filter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Orientation {
    /// Orientation as a unit quaternion.
    pub quaternion: Quat,
}

impl Default for Orientation {
    fn default() -> Self {
        Self {
            quaternion: Quat::IDENTITY,
        }
    }
}

impl Orientation {
    pub fn norm(&self) -> f32 {
        self.quaternion.length()
    }

    /// Components in `(w, x, y, z)` order.
    pub fn wxyz(&self) -> [f32; 4] {
        let q = self.quaternion;
        [q.w, q.x, q.y, q.z]
    }

    /// Direction of gravity as seen from the sensor frame (unit vector).
    pub fn gravity_direction(&self) -> Vec3 {
        self.quaternion.conjugate() * Vec3::Z
    }

    /// Roll, pitch and yaw in radians. Pitch saturates at +/- pi/2.
    pub fn euler_angles(&self) -> Vec3 {
        let q = self.quaternion;
        let (x, y, z, w) = (q.x, q.y, q.z, q.w);

        let roll = (2.0 * (w * x + y * z)).atan2(1.0 - 2.0 * (x * x + y * y));

        let sinp = 2.0 * (w * y - z * x);
        let pitch = if sinp.abs() >= 1.0 {
            std::f32::consts::FRAC_PI_2.copysign(sinp)
        } else {
            sinp.asin()
        };

        let yaw = (2.0 * (w * z + x * y)).atan2(1.0 - 2.0 * (y * y + z * z));

        Vec3::new(roll, pitch, yaw)
    }

    /// Angle in degrees of the rotation taking `self` onto `other`.
    ///
    /// With one orientation per body segment this is the joint angle between them.
    pub fn joint_angle_deg(&self, other: &Orientation) -> f32 {
        let relative = self.quaternion.conjugate() * other.quaternion;
        let w = relative.w.abs().clamp(0.0, 1.0);
        (2.0 * w.acos()).to_degrees()
    }
}

/// Per-tick signals derived from the current orientation.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MotionSignals {
    /// Acceleration with gravity removed, sensor frame (m/s^2).
    pub linear_accel: Vec3,
    /// Gyro vector rotated by the inverse orientation (rad/s).
    pub body_gyro: Vec3,
}

// Quaternions are stored as `[x, y, z, w]` arrays for a compact TOML form.
pub mod quat_serde {
    use glam::Quat;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(q: &Quat, s: S) -> Result<S::Ok, S::Error> {
        [q.x, q.y, q.z, q.w].serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Quat, D::Error> {
        let [x, y, z, w] = <[f32; 4]>::deserialize(d)?;
        Ok(Quat::from_xyzw(x, y, z, w))
    }
}
