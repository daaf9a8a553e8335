//! Precision mode: a switchable sensitivity boost for subtle expressions.
//!
//! When enabled, boosted channel groups are multiplied by the precision
//! multiplier, changes smaller than the noise threshold are held at the
//! previous output, and every channel is clamped to its valid range.
//! When disabled, frames pass through untouched.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::tracking::channel::{Channel, ChannelSet};
use crate::tracking::frame::TrackingFrame;

/// Precision mode configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrecisionConfig {
    /// Start with precision mode on
    pub enabled: bool,
    /// Gain applied to boosted groups
    pub multiplier: f32,
    /// Hold channels whose change is below `noise_threshold`
    pub noise_reduction: bool,
    pub noise_threshold: f32,
    /// Boost yaw/pitch/roll
    pub head: bool,
    /// Boost eye openness
    pub eyes: bool,
    /// Boost mouth channels
    pub mouth: bool,
}

impl Default for PrecisionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            multiplier: 1.5,
            noise_reduction: true,
            noise_threshold: 0.01,
            head: true,
            eyes: true,
            mouth: true,
        }
    }
}

impl PrecisionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_multiplier(self.multiplier)?;
        if !(self.noise_threshold.is_finite() && self.noise_threshold >= 0.0) {
            return Err(ConfigError::InvalidValue {
                field: "precision.noise_threshold".to_string(),
                message: "Noise threshold must be a finite value >= 0.0".to_string(),
            });
        }
        Ok(())
    }

    /// Whether `ch` belongs to a boosted group.
    pub fn boosts(&self, ch: Channel) -> bool {
        match ch {
            Channel::HeadYaw | Channel::HeadPitch | Channel::HeadRoll => self.head,
            Channel::EyeLeft | Channel::EyeRight => self.eyes,
            Channel::MouthOpen | Channel::MouthWide => self.mouth,
        }
    }
}

fn validate_multiplier(value: f32) -> Result<f32, ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::InvalidValue {
            field: "precision.multiplier".to_string(),
            message: format!("Multiplier must be finite and positive, got {}", value),
        })
    }
}

/// Per-instance precision stage with its own hold state.
#[derive(Debug, Clone)]
pub struct PrecisionStage {
    config: PrecisionConfig,
    /// Last emitted values; `None` until the first face frame
    prev: Option<ChannelSet<f32>>,
}

impl PrecisionStage {
    pub fn new(config: &PrecisionConfig) -> Self {
        Self {
            config: config.clone(),
            prev: None,
        }
    }

    pub fn config(&self) -> &PrecisionConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Turn precision mode on with the given multiplier.
    pub fn enable(&mut self, multiplier: f32) -> Result<(), ConfigError> {
        self.config.multiplier = validate_multiplier(multiplier)?;
        if !self.config.enabled {
            self.prev = None;
        }
        self.config.enabled = true;
        tracing::info!("Precision mode enabled with multiplier {}", multiplier);
        Ok(())
    }

    pub fn disable(&mut self) {
        if self.config.enabled {
            tracing::info!("Precision mode disabled");
        }
        self.config.enabled = false;
        self.prev = None;
    }

    pub fn reset(&mut self) {
        self.prev = None;
    }

    pub fn apply(&mut self, frame: &TrackingFrame) -> TrackingFrame {
        if !self.config.enabled {
            return *frame;
        }
        if !frame.face_detected {
            self.prev = None;
            return *frame;
        }

        let input = frame.channels();
        let out = ChannelSet::from_fn(|ch| {
            let mut v = input[ch];
            if self.config.boosts(ch) {
                v *= self.config.multiplier;
            }
            if self.config.noise_reduction {
                if let Some(prev) = &self.prev {
                    if (v - prev[ch]).abs() < self.config.noise_threshold {
                        v = prev[ch];
                    }
                }
            }
            let (lo, hi) = ch.range();
            v.clamp(lo, hi)
        });

        self.prev = Some(out);
        TrackingFrame::from_channels(out, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face(values: [f32; 7]) -> TrackingFrame {
        TrackingFrame::from_channels(ChannelSet::from_array(values), true)
    }

    fn enabled(multiplier: f32) -> PrecisionStage {
        let mut stage = PrecisionStage::new(&PrecisionConfig::default());
        stage.enable(multiplier).unwrap();
        stage
    }

    #[test]
    fn test_disabled_passes_through() {
        let mut stage = PrecisionStage::new(&PrecisionConfig::default());
        let frame = face([0.1, 0.05, 0.02, 0.1, 0.15, 0.2, 0.15]);
        assert_eq!(stage.apply(&frame), frame);
        assert!(!stage.is_enabled());
    }

    #[test]
    fn test_boost_scales_channels() {
        let mut stage = enabled(2.0);
        let out = stage.apply(&face([0.1, 0.05, 0.02, 0.1, 0.15, 0.2, 0.15]));
        assert!((out.head_yaw - 0.2).abs() < 1e-6);
        assert!((out.eye_left - 0.2).abs() < 1e-6);
        assert!((out.mouth_open - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_group_toggles() {
        let mut stage = PrecisionStage::new(&PrecisionConfig {
            enabled: true,
            multiplier: 2.0,
            eyes: false,
            ..PrecisionConfig::default()
        });
        let out = stage.apply(&face([0.1, 0.0, 0.0, 0.3, 0.3, 0.2, 0.0]));
        assert_eq!(out.eye_left, 0.3);
        assert!((out.head_yaw - 0.2).abs() < 1e-6);
        assert!((out.mouth_open - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_output_clamped_to_channel_ranges() {
        let mut stage = enabled(3.0);
        let out = stage.apply(&face([0.5, -0.6, 0.1, 0.9, 0.2, 0.7, 0.4]));
        assert_eq!(out.head_yaw, 1.0);
        assert_eq!(out.head_pitch, -1.0);
        assert_eq!(out.eye_left, 1.0);
        assert_eq!(out.mouth_open, 1.0);
        for (ch, v) in out.channels().iter() {
            let (lo, hi) = ch.range();
            assert!(v >= lo && v <= hi);
        }
    }

    #[test]
    fn test_small_changes_held() {
        let mut stage = enabled(1.0);
        stage.apply(&face([0.2, 0.0, 0.0, 0.5, 0.5, 0.3, 0.0]));

        // 0.005 below the 0.01 threshold: held; 0.05 above it: follows
        let out = stage.apply(&face([0.205, 0.0, 0.0, 0.55, 0.5, 0.3, 0.0]));
        assert_eq!(out.head_yaw, 0.2);
        assert!((out.eye_left - 0.55).abs() < 1e-6);
    }

    #[test]
    fn test_hold_disabled() {
        let mut stage = PrecisionStage::new(&PrecisionConfig {
            enabled: true,
            multiplier: 1.0,
            noise_reduction: false,
            ..PrecisionConfig::default()
        });
        stage.apply(&face([0.2; 7]));
        let out = stage.apply(&face([0.205; 7]));
        assert!((out.head_yaw - 0.205).abs() < 1e-6);
    }

    #[test]
    fn test_no_face_clears_hold() {
        let mut stage = enabled(1.0);
        stage.apply(&face([0.2; 7]));
        assert_eq!(stage.apply(&TrackingFrame::no_face()), TrackingFrame::no_face());
        let out = stage.apply(&face([0.205; 7]));
        assert!((out.head_yaw - 0.205).abs() < 1e-6);
    }

    #[test]
    fn test_invalid_multiplier_refused() {
        let mut stage = PrecisionStage::new(&PrecisionConfig::default());
        assert!(stage.enable(f32::NAN).is_err());
        assert!(stage.enable(0.0).is_err());
        assert!(!stage.is_enabled());
        assert!(PrecisionConfig {
            noise_threshold: -0.1,
            ..PrecisionConfig::default()
        }
        .validate()
        .is_err());
    }

    #[test]
    fn test_disable_restores_pass_through() {
        let mut stage = enabled(2.0);
        stage.apply(&face([0.1; 7]));
        stage.disable();
        let frame = face([0.1; 7]);
        assert_eq!(stage.apply(&frame), frame);
    }
}
