use anyhow::{bail, Result};
use glam::Vec3;
use repsense_features::FeatureConfig;
use repsense_imu::{FilterAlgorithm, FusionConfig, SensorConfig};
use repsense_pipeline::TrackerConfig;
use repsense_session::SessionConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Sample source description (rate, units, mounting).
    pub sensor: SensorConfig,
    /// Attitude filter selection and gains.
    pub fusion: FusionConfig,
    /// Feature window and vector layout.
    pub features: FeatureConfig,
    /// Labels, gate thresholds and rep cooldown.
    pub session: SessionConfig,
    /// Synthetic source used by the demo binary.
    pub simulation: SimulationConfig,
}

impl AppConfig {
    /// Per-body tracker configuration.
    pub fn tracker(&self) -> TrackerConfig {
        TrackerConfig {
            sensor: self.sensor.clone(),
            fusion: self.fusion.clone(),
            features: self.features.clone(),
            session: self.session.clone(),
        }
    }

    /// Reject values no component can run with.
    pub fn validate(&self) -> Result<()> {
        let rate = self.sensor.sample_rate_hz;
        if !(rate.is_finite() && rate > 0.0) {
            bail!("sensor.sample_rate_hz must be positive, got {rate}");
        }
        if !(self.fusion.max_dt > 0.0) {
            bail!("fusion.max_dt must be positive, got {}", self.fusion.max_dt);
        }
        match self.fusion.algorithm {
            FilterAlgorithm::Madgwick { beta } if beta < 0.0 => {
                bail!("fusion.algorithm.beta must not be negative, got {beta}")
            }
            FilterAlgorithm::Mahony { kp, ki } if kp < 0.0 || ki < 0.0 => {
                bail!("fusion.algorithm gains must not be negative, got kp={kp} ki={ki}")
            }
            FilterAlgorithm::Complementary { alpha } if !(0.0..=1.0).contains(&alpha) => {
                bail!("fusion.algorithm.alpha must be within [0, 1], got {alpha}")
            }
            _ => {}
        }

        let features = &self.features;
        if !(features.window_duration_s > 0.0) {
            bail!(
                "features.window_duration_s must be positive, got {}",
                features.window_duration_s
            );
        }
        if !(0.0..1.0).contains(&features.smoothing_factor) {
            bail!(
                "features.smoothing_factor must be within [0, 1), got {}",
                features.smoothing_factor
            );
        }

        let gate = &self.session.gate;
        for (name, value) in [
            ("entry_threshold", gate.entry_threshold),
            ("exit_threshold", gate.exit_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                bail!("session.gate.{name} must be within [0, 1], got {value}");
            }
        }
        if gate.exit_threshold > gate.entry_threshold {
            bail!(
                "session.gate.exit_threshold ({}) exceeds entry_threshold ({})",
                gate.exit_threshold,
                gate.entry_threshold
            );
        }
        if !(gate.sum_tolerance >= 0.0) {
            bail!("session.gate.sum_tolerance must not be negative");
        }
        if !(self.session.reps.cooldown_s >= 0.0) {
            bail!("session.reps.cooldown_s must not be negative");
        }

        let labels = &self.session.labels;
        if labels.is_empty() {
            bail!("session.labels.names must not be empty");
        }
        if let Some(rest) = labels.rest {
            if rest >= labels.len() {
                bail!("session.labels.rest = {rest} is out of range for {} labels", labels.len());
            }
        }

        self.simulation.validate()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Seconds of motion to generate.
    pub duration_s: f32,
    /// Seconds per simulated squat.
    pub rep_period_s: f32,
    /// Peak linear acceleration of the movement (m/s^2).
    pub amplitude: f32,
    /// Body-frame axis the movement runs along.
    #[serde(with = "vec3_serde")]
    pub motion_axis: Vec3,
    /// Half-width of the uniform sensor noise (m/s^2 and rad/s).
    pub noise: f32,
    /// Artificial inference delay of the stand-in classifier.
    pub classifier_latency_ms: u64,
    /// Samples delivered per wake-up of the source task.
    pub burst: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            duration_s: 20.0,
            rep_period_s: 2.5,
            amplitude: 3.0,
            motion_axis: Vec3::Z,
            noise: 0.05,
            classifier_latency_ms: 0,
            burst: 1,
        }
    }
}

impl SimulationConfig {
    fn validate(&self) -> Result<()> {
        if !(self.duration_s > 0.0 && self.rep_period_s > 0.0) {
            bail!("simulation.duration_s and simulation.rep_period_s must be positive");
        }
        if self.motion_axis.length_squared() == 0.0 {
            bail!("simulation.motion_axis must be non-zero");
        }
        if self.burst == 0 {
            bail!("simulation.burst must be at least 1");
        }
        Ok(())
    }
}

mod vec3_serde {
    use glam::Vec3;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(v: &Vec3, s: S) -> Result<S::Ok, S::Error> {
        [v.x, v.y, v.z].serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec3, D::Error> {
        let [x, y, z] = <[f32; 3]>::deserialize(d)?;
        Ok(Vec3::new(x, y, z))
    }
}
