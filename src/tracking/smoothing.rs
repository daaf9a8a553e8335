//! Temporal smoothing of tracked channels.
//!
//! Exponential moving average per channel:
//! `smoothed[t] = α·smoothed[t-1] + (1-α)·raw[t]`, where α is the weight on
//! history. Each smoother owns its own history; nothing is shared between
//! tracker instances.

use serde::{Deserialize, Serialize};

use crate::config::SmoothingConfig;
use crate::tracking::channel::{Channel, ChannelSet};
use crate::tracking::frame::TrackingFrame;

/// Upper bound for a history weight; 1.0 would freeze the output.
pub const MAX_HISTORY_WEIGHT: f32 = 0.99;

/// Which smoothing algorithm to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmoothingMode {
    Ema,
    None,
}

impl Default for SmoothingMode {
    fn default() -> Self {
        Self::Ema
    }
}

impl SmoothingMode {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "ema" | "exponential" => Self::Ema,
            "none" | "off" | "disabled" => Self::None,
            _ => Self::Ema,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ema => "ema",
            Self::None => "none",
        }
    }

    pub const ALL: [SmoothingMode; 2] = [Self::Ema, Self::None];
}

/// Per-channel history weights resolved from config.
///
/// Group overrides (head/eyes/mouth) win over the global weight.
pub fn history_weights(config: &SmoothingConfig) -> ChannelSet<f32> {
    ChannelSet::from_fn(|ch| {
        let group = match ch {
            Channel::HeadYaw | Channel::HeadPitch | Channel::HeadRoll => config.head_history_weight,
            Channel::EyeLeft | Channel::EyeRight => config.eye_history_weight,
            Channel::MouthOpen | Channel::MouthWide => config.mouth_history_weight,
        };
        group
            .unwrap_or(config.history_weight)
            .clamp(0.0, MAX_HISTORY_WEIGHT)
    })
}

/// Per-instance EMA smoother over the seven channels.
#[derive(Debug, Clone)]
pub struct TrackingSmoother {
    /// History weight α per channel
    weights: ChannelSet<f32>,
    /// Previous smoothed values; `None` until the first face frame
    state: Option<ChannelSet<f32>>,
    mode: SmoothingMode,
}

impl TrackingSmoother {
    pub fn new(config: &SmoothingConfig) -> Self {
        Self {
            weights: history_weights(config),
            state: None,
            mode: config.mode,
        }
    }

    /// Smooth one frame.
    ///
    /// The first face frame after creation or reset seeds the state as-is.
    /// A frame without a face comes out as the neutral no-face frame and
    /// resets the state, so tracking restarts cleanly when the face returns.
    pub fn smooth(&mut self, frame: &TrackingFrame) -> TrackingFrame {
        if !frame.face_detected {
            if self.state.is_some() {
                tracing::debug!("Face lost, resetting smoother");
            }
            self.reset();
            return TrackingFrame::no_face();
        }

        if self.mode == SmoothingMode::None {
            return *frame;
        }

        let raw = frame.channels();
        let smoothed = match &self.state {
            None => raw,
            Some(prev) => ChannelSet::from_fn(|ch| {
                let alpha = self.weights[ch];
                alpha * prev[ch] + (1.0 - alpha) * raw[ch]
            }),
        };

        self.state = Some(smoothed);
        TrackingFrame::from_channels(smoothed, true)
    }

    /// Forget history; the next face frame seeds the state.
    pub fn reset(&mut self) {
        self.state = None;
    }

    /// Whether a previous frame is held.
    pub fn is_primed(&self) -> bool {
        self.state.is_some()
    }

    /// Apply new weights/mode from the next frame on.
    ///
    /// History is kept unless the mode changes.
    pub fn set_config(&mut self, config: &SmoothingConfig) {
        self.weights = history_weights(config);
        if config.mode != self.mode {
            self.mode = config.mode;
            self.reset();
        }
    }

    pub fn weights(&self) -> ChannelSet<f32> {
        self.weights
    }

    pub fn mode(&self) -> SmoothingMode {
        self.mode
    }
}
