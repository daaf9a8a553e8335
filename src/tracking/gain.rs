//! Sensitivity and deadzone stage.
//!
//! Per channel: subtract the calibration offset and clamp into the channel's
//! range, suppress deviations from the rest value inside the deadzone,
//! rescale the remainder so the output leaves rest continuously at the
//! deadzone boundary, then apply the multiplier.
//!
//! Eye channels rest at 1.0 (open), so their deadzone gates `1.0 - v`.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::tracking::channel::{Channel, ChannelSet};
use crate::tracking::frame::TrackingFrame;

/// Largest accepted deadzone radius. The rescale divides by `1 - radius`.
pub const MAX_DEADZONE: f32 = 0.95;

/// Gain and suppression settings for one channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Gain applied after deadzone suppression
    pub multiplier: f32,
    /// Values with |v| below this are zeroed
    pub deadzone_radius: f32,
    /// Baseline subtracted before the deadzone (set by calibration)
    pub offset: f32,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            multiplier: 1.0,
            deadzone_radius: 0.05,
            offset: 0.0,
        }
    }
}

impl ChannelConfig {
    /// Run one raw value of channel `ch` through offset, deadzone and gain.
    pub fn apply(&self, ch: Channel, raw: f32) -> f32 {
        let (lo, hi) = ch.range();
        let v = (raw - self.offset).clamp(lo, hi);
        let rest = ch.rest_value();
        (rest + apply_deadzone(v - rest, self.deadzone_radius)) * self.multiplier
    }
}

/// Zero values inside `radius`, rescale the rest to stay continuous.
///
/// `sign(v) * (|v| - r) / (1 - r)`: 0 at the boundary, and ±1 stays ±1.
pub fn apply_deadzone(value: f32, radius: f32) -> f32 {
    if value.abs() < radius {
        return 0.0;
    }
    let scale = 1.0 - radius;
    if scale <= f32::EPSILON {
        return 0.0;
    }
    value.signum() * (value.abs() - radius) / scale
}

/// Per-channel gain/deadzone/offset bank for one tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerConfig {
    channels: ChannelSet<ChannelConfig>,
    calibrated: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self::new(
            &ChannelSet::default_multipliers(),
            &ChannelSet::default_deadzones(),
        )
    }
}

impl TrackerConfig {
    /// Build from banks that already passed [`validate_multiplier`] and
    /// [`clamp_deadzone`].
    pub(crate) fn new(multipliers: &ChannelSet<f32>, deadzones: &ChannelSet<f32>) -> Self {
        Self {
            channels: ChannelSet::from_fn(|ch| ChannelConfig {
                multiplier: multipliers[ch],
                deadzone_radius: deadzones[ch],
                offset: 0.0,
            }),
            calibrated: false,
        }
    }

    pub fn channel(&self, ch: Channel) -> ChannelConfig {
        self.channels[ch]
    }

    pub fn channels(&self) -> &ChannelSet<ChannelConfig> {
        &self.channels
    }

    pub fn multipliers(&self) -> ChannelSet<f32> {
        self.channels.map(|_, c| c.multiplier)
    }

    pub fn deadzones(&self) -> ChannelSet<f32> {
        self.channels.map(|_, c| c.deadzone_radius)
    }

    pub fn offsets(&self) -> ChannelSet<f32> {
        self.channels.map(|_, c| c.offset)
    }

    /// Whether the bank holds calibration-derived values.
    pub fn is_calibrated(&self) -> bool {
        self.calibrated
    }

    /// Replace every multiplier. Refuses the whole update if any value is
    /// not finite.
    pub fn set_multipliers(&mut self, multipliers: &ChannelSet<f32>) -> Result<(), ConfigError> {
        for (ch, v) in multipliers.iter() {
            validate_multiplier(ch, v)?;
        }
        for (ch, v) in multipliers.iter() {
            self.channels[ch].multiplier = v;
        }
        Ok(())
    }

    pub fn set_multiplier(&mut self, ch: Channel, value: f32) -> Result<(), ConfigError> {
        self.channels[ch].multiplier = validate_multiplier(ch, value)?;
        Ok(())
    }

    /// Replace every deadzone radius. Out-of-range radii are clamped;
    /// non-finite radii refuse the whole update.
    pub fn set_deadzones(&mut self, radii: &ChannelSet<f32>) -> Result<(), ConfigError> {
        let clamped = clamp_deadzones(radii)?;
        for (ch, r) in clamped.iter() {
            self.channels[ch].deadzone_radius = r;
        }
        Ok(())
    }

    pub fn set_deadzone(&mut self, ch: Channel, radius: f32) -> Result<(), ConfigError> {
        self.channels[ch].deadzone_radius = clamp_deadzone(ch, radius)?;
        Ok(())
    }

    /// Install calibration-derived values and mark the bank calibrated.
    pub(crate) fn commit_calibration(&mut self, derived: &ChannelSet<ChannelConfig>) {
        self.channels = *derived;
        self.calibrated = true;
    }

    /// Apply offset, deadzone and gain to a raw frame.
    ///
    /// A frame without a face stays the neutral no-face frame.
    pub fn apply(&self, raw: &TrackingFrame) -> TrackingFrame {
        if !raw.face_detected {
            return TrackingFrame::no_face();
        }
        let raw_channels = raw.channels();
        let out = ChannelSet::from_fn(|ch| self.channels[ch].apply(ch, raw_channels[ch]));
        TrackingFrame::from_channels(out, true)
    }
}

/// Multipliers must be finite.
pub fn validate_multiplier(ch: Channel, value: f32) -> Result<f32, ConfigError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ConfigError::InvalidValue {
            field: format!("sensitivity.{}", ch),
            message: format!("Multiplier must be finite, got {}", value),
        })
    }
}

/// Deadzones must be finite; they are clamped into `[0, MAX_DEADZONE]`.
pub fn clamp_deadzone(ch: Channel, radius: f32) -> Result<f32, ConfigError> {
    if !radius.is_finite() {
        return Err(ConfigError::InvalidValue {
            field: format!("deadzones.{}", ch),
            message: format!("Deadzone radius must be finite, got {}", radius),
        });
    }
    let clamped = radius.clamp(0.0, MAX_DEADZONE);
    if clamped != radius {
        tracing::warn!(
            "Deadzone for {} clamped from {} to {}",
            ch,
            radius,
            clamped
        );
    }
    Ok(clamped)
}

/// Clamp a whole bank. Radii already in range come back unchanged and
/// without a warning.
pub fn clamp_deadzones(radii: &ChannelSet<f32>) -> Result<ChannelSet<f32>, ConfigError> {
    let mut clamped = *radii;
    for (ch, r) in radii.iter() {
        clamped[ch] = clamp_deadzone(ch, r)?;
    }
    Ok(clamped)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face(values: [f32; 7]) -> TrackingFrame {
        TrackingFrame::from_channels(ChannelSet::from_array(values), true)
    }

    #[test]
    fn test_deadzone_suppresses_small_values() {
        assert_eq!(apply_deadzone(0.03, 0.05), 0.0);
        assert_eq!(apply_deadzone(-0.049, 0.05), 0.0);
    }

    #[test]
    fn test_deadzone_continuity_at_boundary() {
        let r = 0.1;
        assert_eq!(apply_deadzone(r, r), 0.0);
        assert_eq!(apply_deadzone(-r, r), 0.0);

        let just_outside = apply_deadzone(r + 1e-4, r);
        assert!(just_outside > 0.0 && just_outside < 1e-3);
        let just_inside = apply_deadzone(r - 1e-4, r);
        assert!((just_outside - just_inside).abs() < 1e-3);
    }

    #[test]
    fn test_deadzone_preserves_full_scale() {
        assert!((apply_deadzone(1.0, 0.2) - 1.0).abs() < 1e-6);
        assert!((apply_deadzone(-1.0, 0.2) + 1.0).abs() < 1e-6);
        assert!((apply_deadzone(0.6, 0.2) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_zero_deadzone_is_identity() {
        for v in [-0.7, -0.01, 0.0, 0.33] {
            assert_eq!(apply_deadzone(v, 0.0), v);
        }
    }

    #[test]
    fn test_default_bank() {
        let config = TrackerConfig::default();
        for ch in Channel::ALL {
            assert_eq!(config.channel(ch).multiplier, 1.0);
            assert_eq!(config.channel(ch).deadzone_radius, 0.05);
            assert_eq!(config.channel(ch).offset, 0.0);
        }
        assert!(!config.is_calibrated());
    }

    #[test]
    fn test_multiplier_scales_post_deadzone_value() {
        let raw = face([0.3, 0.0, 0.0, 0.8, 0.8, 0.0, 0.0]);
        let mut config = TrackerConfig::default();
        let base = config.apply(&raw);

        config.set_multiplier(Channel::EyeLeft, 2.0).unwrap();
        let gained = config.apply(&raw);

        assert!((gained.eye_left - 2.0 * base.eye_left).abs() < 1e-6);
        assert_eq!(gained.eye_right, base.eye_right);
        assert_eq!(gained.head_yaw, base.head_yaw);
    }

    #[test]
    fn test_offset_applied_before_deadzone() {
        let mut config = TrackerConfig::default();
        let mut derived = *config.channels();
        derived[Channel::HeadYaw].offset = 0.2;
        config.commit_calibration(&derived);

        let out = config.apply(&face([0.22, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0]));
        assert_eq!(out.head_yaw, 0.0);
        assert!(config.is_calibrated());
    }

    #[test]
    fn test_no_face_passes_through_neutral() {
        let mut config = TrackerConfig::default();
        config.set_multiplier(Channel::MouthOpen, 3.0).unwrap();
        let out = config.apply(&TrackingFrame::no_face());
        assert_eq!(out, TrackingFrame::no_face());
    }

    #[test]
    fn test_non_finite_multiplier_refused() {
        let mut config = TrackerConfig::default();
        let bad = ChannelSet {
            head_pitch: f32::INFINITY,
            ..ChannelSet::splat(2.0)
        };
        assert!(config.set_multipliers(&bad).is_err());
        // Whole update refused
        assert_eq!(config.multipliers(), ChannelSet::default_multipliers());
        assert!(config.set_multiplier(Channel::HeadRoll, f32::NAN).is_err());
    }

    #[test]
    fn test_eye_deadzone_gates_around_open() {
        let mut config = TrackerConfig::default();
        config.set_deadzone(Channel::EyeLeft, 0.06).unwrap();

        // Small dip below open is jitter; a real blink passes
        let out = config.apply(&face([0.0, 0.0, 0.0, 0.97, 0.5, 0.0, 0.0]));
        assert_eq!(out.eye_left, 1.0);
        assert!(out.eye_right > 0.5 && out.eye_right < 0.55);

        let closed = config.apply(&face([0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]));
        assert!(closed.eye_left.abs() < 1e-6);
    }

    #[test]
    fn test_offset_result_clamped_to_range() {
        let mut config = TrackerConfig::default();
        let mut derived = *config.channels();
        derived[Channel::EyeLeft].offset = -0.2;
        derived[Channel::HeadYaw].offset = -0.5;
        config.commit_calibration(&derived);

        let out = config.apply(&face([0.8, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0]));
        assert_eq!(out.eye_left, 1.0);
        assert_eq!(out.head_yaw, 1.0);
    }

    #[test]
    fn test_clamp_deadzones_is_stable() {
        let radii = ChannelSet {
            eye_right: 3.0,
            ..ChannelSet::splat(-0.1)
        };
        let once = clamp_deadzones(&radii).unwrap();
        assert_eq!(clamp_deadzones(&once).unwrap(), once);
        assert_eq!(once.eye_right, MAX_DEADZONE);
        assert_eq!(once.head_yaw, 0.0);
    }

    #[test]
    fn test_deadzones_clamped() {
        let mut config = TrackerConfig::default();
        let radii = ChannelSet {
            head_yaw: -0.3,
            mouth_wide: 4.0,
            ..ChannelSet::splat(0.1)
        };
        config.set_deadzones(&radii).unwrap();
        assert_eq!(config.channel(Channel::HeadYaw).deadzone_radius, 0.0);
        assert_eq!(config.channel(Channel::MouthWide).deadzone_radius, MAX_DEADZONE);
        assert_eq!(config.channel(Channel::EyeLeft).deadzone_radius, 0.1);
        assert!(config.set_deadzone(Channel::EyeLeft, f32::NAN).is_err());
    }
}
