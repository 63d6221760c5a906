//! Per-window feature vectors for the exercise classifier.
//!
//! Every tick produces one frame of 10 features:
//! - 0..3: ax, ay, az (m/s^2, optionally smoothed)
//! - 3..6: gx, gy, gz (rad/s, optionally smoothed)
//! - 6: |accel|
//! - 7: |gyro|
//! - 8: atan2(ay, az)
//! - 9: atan2(ax, az)
//!
//! A vector is emitted once per `window_size` ticks; what it contains depends
//! on the [`FeatureLayout`].

use crate::window::{FeatureWindow, WindowStats};
use repsense_imu::{ImuSample, MotionSignals, Orientation};
use serde::{Deserialize, Serialize};

/// Number of features in one frame.
pub const FRAME_LEN: usize = 10;

/// Features of a single tick.
pub type FeatureFrame = [f32; FRAME_LEN];

/// Raw channels the smoothing filter runs over (accel xyz, gyro xyz).
const SMOOTHED_CHANNELS: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureLayout {
    /// The frame of the tick that closed the window.
    #[default]
    Frame,
    /// Frame, orientation (w, x, y, z), linear accel, body gyro, then [`WindowStats`].
    Extended,
    /// Every frame of the window, oldest first (`[window, features]` row-major).
    Sequence,
}

impl FeatureLayout {
    pub fn len(&self, window_size: usize) -> usize {
        match self {
            Self::Frame => FRAME_LEN,
            Self::Extended => FRAME_LEN + 4 + 3 + 3 + WindowStats::LEN,
            Self::Sequence => FRAME_LEN * window_size,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Window length in seconds; also the emission cadence.
    pub window_duration_s: f32,
    pub smoothing: bool,
    /// Weight kept on the previous smoothed value, in `[0, 1)`.
    pub smoothing_factor: f32,
    pub layout: FeatureLayout,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            window_duration_s: 0.5,
            smoothing: true,
            smoothing_factor: 0.9,
            layout: FeatureLayout::Frame,
        }
    }
}

impl FeatureConfig {
    /// Samples per window at the given rate (at least 1).
    pub fn window_size(&self, sample_rate_hz: f32) -> usize {
        ((sample_rate_hz * self.window_duration_s).round() as usize).max(1)
    }
}

/// One classifier input.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    pub values: Vec<f32>,
    /// Timestamp of the sample that closed the window.
    pub window_end: f64,
    /// Zero-based count of vectors emitted before this one.
    pub sequence: u64,
    /// How `values` is laid out.
    pub layout: FeatureLayout,
}

impl FeatureVector {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The most recent frame contained in the vector.
    pub fn last_frame(&self) -> Option<&[f32]> {
        let len = self.values.len();
        if len < FRAME_LEN {
            return None;
        }
        match self.layout {
            FeatureLayout::Frame | FeatureLayout::Extended => Some(&self.values[..FRAME_LEN]),
            FeatureLayout::Sequence => Some(&self.values[len - FRAME_LEN..]),
        }
    }
}

/// Everything the assembler reads on one tick.
pub struct TickContext<'a> {
    pub sample: &'a ImuSample,
    pub orientation: &'a Orientation,
    pub signals: &'a MotionSignals,
    pub window: &'a FeatureWindow,
}

pub struct FeatureAssembler {
    window_size: usize,
    layout: FeatureLayout,
    smoothing_factor: Option<f32>,
    smoothed: [f32; SMOOTHED_CHANNELS],
    counter: usize,
    frames: Vec<FeatureFrame>,
    emitted: u64,
}

impl FeatureAssembler {
    pub fn new(config: &FeatureConfig, sample_rate_hz: f32) -> Self {
        let window_size = config.window_size(sample_rate_hz);
        tracing::debug!(window_size, layout = ?config.layout, "Feature assembler created");
        Self {
            window_size,
            layout: config.layout,
            smoothing_factor: config.smoothing.then_some(config.smoothing_factor),
            smoothed: [0.0; SMOOTHED_CHANNELS],
            counter: 0,
            frames: Vec::with_capacity(match config.layout {
                FeatureLayout::Sequence => window_size,
                _ => 0,
            }),
            emitted: 0,
        }
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Length of every vector this assembler emits.
    pub fn vector_len(&self) -> usize {
        self.layout.len(self.window_size)
    }

    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    /// Fold one tick in. Returns a vector only when this tick completes a window.
    pub fn on_sample(&mut self, tick: &TickContext<'_>) -> Option<FeatureVector> {
        let frame = self.frame(tick.sample);
        if self.layout == FeatureLayout::Sequence {
            self.frames.push(frame);
        }

        self.counter += 1;
        if self.counter < self.window_size {
            return None;
        }
        self.counter = 0;

        let values = match self.layout {
            FeatureLayout::Frame => frame.to_vec(),
            FeatureLayout::Extended => {
                let mut values = Vec::with_capacity(self.vector_len());
                values.extend_from_slice(&frame);
                values.extend_from_slice(&tick.orientation.wxyz());
                values.extend_from_slice(&tick.signals.linear_accel.to_array());
                values.extend_from_slice(&tick.signals.body_gyro.to_array());
                values.extend_from_slice(&tick.window.stats().to_array());
                values
            }
            FeatureLayout::Sequence => self.frames.drain(..).flatten().collect(),
        };

        let vector = FeatureVector {
            values,
            window_end: tick.sample.timestamp,
            sequence: self.emitted,
            layout: self.layout,
        };
        self.emitted += 1;
        tracing::trace!(sequence = vector.sequence, len = vector.len(), "Feature vector assembled");
        Some(vector)
    }

    fn frame(&mut self, sample: &ImuSample) -> FeatureFrame {
        let raw = [
            sample.accel.x,
            sample.accel.y,
            sample.accel.z,
            sample.gyro.x,
            sample.gyro.y,
            sample.gyro.z,
        ];
        match self.smoothing_factor {
            Some(alpha) => {
                for (s, r) in self.smoothed.iter_mut().zip(raw) {
                    *s = r * (1.0 - alpha) + *s * alpha;
                }
            }
            None => self.smoothed = raw,
        }

        let [ax, ay, az, gx, gy, gz] = self.smoothed;
        [
            ax,
            ay,
            az,
            gx,
            gy,
            gz,
            (ax * ax + ay * ay + az * az).sqrt(),
            (gx * gx + gy * gy + gz * gz).sqrt(),
            ay.atan2(az),
            ax.atan2(az),
        ]
    }
}
