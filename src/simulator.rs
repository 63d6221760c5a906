use glam::{Quat, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use repsense_config::SimulationConfig;
use repsense_imu::{AccelUnit, GyroUnit, ImuSample, SensorConfig, STANDARD_GRAVITY};
use std::f32::consts::{PI, TAU};

/// Peak torso pitch rate during a squat, rad/s.
const PEAK_PITCH_RATE: f32 = 0.8;

/// Synthetic chest-worn sensor doing squats.
///
/// The torso pitches about the sensor X axis while the body moves along
/// `motion_axis`; both follow one sine per rep. Samples come out in the
/// units and mounting the sensor config declares, so they take the same
/// conversion path as real hardware.
pub struct SquatSimulator {
    sensor: SensorConfig,
    axis: Vec3,
    amplitude: f32,
    rep_period: f32,
    noise: f32,
    total: u64,
    tick: u64,
    rng: StdRng,
}

impl SquatSimulator {
    pub fn new(sensor: &SensorConfig, simulation: &SimulationConfig, seed: u64) -> Self {
        Self {
            sensor: sensor.clone(),
            axis: simulation.motion_axis.normalize_or_zero(),
            amplitude: simulation.amplitude,
            rep_period: simulation.rep_period_s,
            noise: simulation.noise,
            total: (simulation.duration_s * sensor.sample_rate_hz).round() as u64,
            tick: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn total_samples(&self) -> u64 {
        self.total
    }

    fn jitter(&mut self) -> Vec3 {
        if self.noise <= 0.0 {
            return Vec3::ZERO;
        }
        let n = self.noise;
        Vec3::new(
            self.rng.gen_range(-n..=n),
            self.rng.gen_range(-n..=n),
            self.rng.gen_range(-n..=n),
        )
    }

    fn sample_at(&mut self, timestamp: f64) -> ImuSample {
        let phase = TAU * timestamp as f32 / self.rep_period;
        let pitch = PEAK_PITCH_RATE * self.rep_period / TAU * phase.sin();
        let pitch_rate = PEAK_PITCH_RATE * phase.cos();

        let gravity = Quat::from_rotation_x(pitch).conjugate() * Vec3::Z * STANDARD_GRAVITY;
        let accel = gravity + self.axis * (self.amplitude * phase.sin()) + self.jitter();
        let gyro = Vec3::X * pitch_rate + self.jitter();

        let (accel, gyro) = self.to_raw(accel, gyro);
        ImuSample::new(accel, gyro, timestamp)
    }

    /// Inverse of [`SensorConfig::to_si`].
    fn to_raw(&self, accel: Vec3, gyro: Vec3) -> (Vec3, Vec3) {
        let unmount = self.sensor.mount_rotation.conjugate();
        let accel = unmount * accel;
        let gyro = unmount * gyro;
        let accel = match self.sensor.accel_unit {
            AccelUnit::MetersPerSecondSquared => accel,
            AccelUnit::StandardGravity => accel / STANDARD_GRAVITY,
        };
        let gyro = match self.sensor.gyro_unit {
            GyroUnit::RadiansPerSecond => gyro,
            GyroUnit::DegreesPerSecond => gyro * (180.0 / PI),
        };
        (accel, gyro)
    }
}

impl Iterator for SquatSimulator {
    type Item = ImuSample;

    fn next(&mut self) -> Option<ImuSample> {
        if self.tick >= self.total {
            return None;
        }
        let timestamp = self.tick as f64 / self.sensor.sample_rate_hz as f64;
        self.tick += 1;
        Some(self.sample_at(timestamp))
    }
}
