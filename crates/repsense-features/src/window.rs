//! Sliding window of recent accel/gyro vectors and the statistics computed over it.

use glam::Vec3;
use repsense_imu::MotionSignals;
use std::collections::VecDeque;

/// Below this many buffered samples the energy estimate is reported as 0.
pub const MIN_ENERGY_SAMPLES: usize = 10;

/// Snapshot of the window statistics, in the order they are appended to
/// extended feature vectors.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WindowStats {
    pub accel_rms: f32,
    pub gyro_rms: f32,
    pub accel_crossing_rate: f32,
    pub gyro_crossing_rate: f32,
    pub signal_energy: f32,
    pub motion_intensity: f32,
}

impl WindowStats {
    pub const LEN: usize = 6;

    pub fn to_array(&self) -> [f32; Self::LEN] {
        [
            self.accel_rms,
            self.gyro_rms,
            self.accel_crossing_rate,
            self.gyro_crossing_rate,
            self.signal_energy,
            self.motion_intensity,
        ]
    }
}

/// Bounded FIFO of the last `capacity` accel and gyro readings.
///
/// Both buffers are evicted together, so index `i` always refers to the same tick.
#[derive(Debug, Clone)]
pub struct FeatureWindow {
    accel: VecDeque<Vec3>,
    gyro: VecDeque<Vec3>,
    capacity: usize,
    motion_intensity: f32,
}

impl FeatureWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            accel: VecDeque::with_capacity(capacity + 1),
            gyro: VecDeque::with_capacity(capacity + 1),
            capacity,
            motion_intensity: 0.0,
        }
    }

    /// Window holding `round(sample_rate_hz * duration_s)` samples.
    pub fn from_duration(sample_rate_hz: f32, duration_s: f32) -> Self {
        Self::new((sample_rate_hz * duration_s).round() as usize)
    }

    pub fn push(&mut self, accel: Vec3, gyro: Vec3) {
        self.accel.push_back(accel);
        self.gyro.push_back(gyro);
        if self.accel.len() > self.capacity {
            self.accel.pop_front();
            self.gyro.pop_front();
        }
    }

    /// Track the intensity of the latest tick: mean of linear-accel and gyro magnitudes.
    pub fn record_motion(&mut self, signals: &MotionSignals) {
        self.motion_intensity = (signals.linear_accel.length() + signals.body_gyro.length()) / 2.0;
    }

    pub fn len(&self) -> usize {
        self.accel.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accel.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.accel.len() == self.capacity
    }

    pub fn accel(&self) -> &VecDeque<Vec3> {
        &self.accel
    }

    pub fn gyro(&self) -> &VecDeque<Vec3> {
        &self.gyro
    }

    pub fn motion_intensity(&self) -> f32 {
        self.motion_intensity
    }

    /// Variance of the buffered accel vectors around their mean.
    pub fn signal_energy(&self) -> f32 {
        let count = self.accel.len();
        if count < MIN_ENERGY_SAMPLES {
            return 0.0;
        }
        let mean = self.accel.iter().copied().sum::<Vec3>() / count as f32;
        let spread: f32 = self
            .accel
            .iter()
            .map(|a| (*a - mean).length_squared())
            .sum();
        spread / count as f32
    }

    pub fn stats(&self) -> WindowStats {
        WindowStats {
            accel_rms: rms(&self.accel),
            gyro_rms: rms(&self.gyro),
            accel_crossing_rate: mean_crossing_rate(&self.accel),
            gyro_crossing_rate: mean_crossing_rate(&self.gyro),
            signal_energy: self.signal_energy(),
            motion_intensity: self.motion_intensity,
        }
    }

    pub fn clear(&mut self) {
        self.accel.clear();
        self.gyro.clear();
        self.motion_intensity = 0.0;
    }
}

/// `sqrt(mean(|v|²))`; 0 for an empty sequence.
pub fn rms<'a, I>(signals: I) -> f32
where
    I: IntoIterator<Item = &'a Vec3>,
{
    let (sum, count) = signals
        .into_iter()
        .fold((0.0f32, 0usize), |(sum, n), v| (sum + v.length_squared(), n + 1));
    if count == 0 {
        return 0.0;
    }
    (sum / count as f32).sqrt()
}

/// Fraction of consecutive-sample, per-axis transitions that cross the window mean.
///
/// Crossings are counted on all three axes and divided by `3 * (count - 1)`;
/// fewer than two samples give 0.
pub fn mean_crossing_rate<'a, I>(signals: I) -> f32
where
    I: IntoIterator<Item = &'a Vec3>,
    I::IntoIter: Clone,
{
    let iter = signals.into_iter();
    let count = iter.clone().count();
    if count < 2 {
        return 0.0;
    }
    let mean = iter.clone().copied().sum::<Vec3>() / count as f32;

    let crossings: usize = iter
        .clone()
        .zip(iter.skip(1))
        .map(|(prev, next)| {
            let a = *prev - mean;
            let b = *next - mean;
            usize::from(a.x * b.x < 0.0) + usize::from(a.y * b.y < 0.0) + usize::from(a.z * b.z < 0.0)
        })
        .sum();

    crossings as f32 / (3 * (count - 1)) as f32
}
