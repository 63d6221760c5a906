use repsense_features::{FeatureAssembler, FeatureConfig, FeatureVector, FeatureWindow, TickContext};
use repsense_imu::{
    AttitudeFilter, FusionConfig, ImuSample, MotionSignals, Orientation, SensorConfig, TickError,
};
use repsense_session::{Prediction, Session, SessionConfig, SessionEvent};
use serde::{Deserialize, Serialize};

/// Everything needed to track one body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub sensor: SensorConfig,
    pub fusion: FusionConfig,
    pub features: FeatureConfig,
    pub session: SessionConfig,
}

/// Result of one accepted tick.
#[derive(Debug, Clone)]
pub struct TickOutput {
    pub orientation: Orientation,
    pub signals: MotionSignals,
    /// Present on the tick that closes a window.
    pub features: Option<FeatureVector>,
}

/// Filter, window, assembler and session for a single tracked body.
pub struct BodyTracker {
    sensor: SensorConfig,
    filter: AttitudeFilter,
    window: FeatureWindow,
    assembler: FeatureAssembler,
    session: Session,
    dropped_ticks: u64,
}

impl BodyTracker {
    pub fn new(config: &TrackerConfig) -> Self {
        let rate = config.sensor.sample_rate_hz;
        let assembler = FeatureAssembler::new(&config.features, rate);
        Self {
            sensor: config.sensor.clone(),
            filter: AttitudeFilter::new(&config.fusion, rate),
            window: FeatureWindow::new(assembler.window_size()),
            assembler,
            session: Session::new(&config.session),
            dropped_ticks: 0,
        }
    }

    /// Run one raw sample through fusion and feature assembly.
    ///
    /// A rejected tick changes nothing except the dropped-tick counter.
    pub fn on_sample(&mut self, raw: &ImuSample) -> Result<TickOutput, TickError> {
        let sample = self.sensor.to_si(raw);
        let orientation = match self.filter.update(&sample) {
            Ok(orientation) => orientation,
            Err(e) => {
                self.dropped_ticks += 1;
                tracing::debug!(error = %e, dropped = self.dropped_ticks, "Tick dropped");
                return Err(e);
            }
        };

        let signals = self.filter.motion_signals(&sample);
        self.window.push(sample.accel, sample.gyro);
        self.window.record_motion(&signals);

        let features = self.assembler.on_sample(&TickContext {
            sample: &sample,
            orientation: &orientation,
            signals: &signals,
            window: &self.window,
        });

        Ok(TickOutput {
            orientation,
            signals,
            features,
        })
    }

    pub fn on_prediction(&mut self, prediction: &Prediction, now: f64) -> Vec<SessionEvent> {
        self.session.on_prediction(prediction, now)
    }

    pub fn start(&mut self) {
        self.session.start();
    }

    pub fn stop(&mut self) -> Option<SessionEvent> {
        self.session.stop()
    }

    /// Seconds covered by one feature window; also the classification budget.
    pub fn window_period(&self) -> f64 {
        self.assembler.window_size() as f64 / self.sensor.sample_rate_hz as f64
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn filter(&self) -> &AttitudeFilter {
        &self.filter
    }

    /// Mutable filter access for zeroing and recalibration.
    pub fn filter_mut(&mut self) -> &mut AttitudeFilter {
        &mut self.filter
    }

    pub fn window(&self) -> &FeatureWindow {
        &self.window
    }

    pub fn dropped_ticks(&self) -> u64 {
        self.dropped_ticks
    }
}
