//! Tracker facade.
//!
//! Owns one instance of every pipeline stage and runs
//! extract → gain/deadzone → smooth → precision for each frame. All calls
//! lock a single mutex, so frames, configuration updates and calibration
//! calls are serialized in arrival order. Instances share nothing.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::{Config, SmoothingConfig};
use crate::error::{CalibrationError, Result};
use crate::tracking::calibration::{CalibrationController, CalibrationStatus};
use crate::tracking::channel::{Channel, ChannelSet};
use crate::tracking::extractor::SignalExtractor;
use crate::tracking::frame::TrackingFrame;
use crate::tracking::gain::{clamp_deadzone, clamp_deadzones, TrackerConfig};
use crate::tracking::precision::PrecisionStage;
use crate::tracking::smoothing::TrackingSmoother;

#[derive(Debug)]
struct Inner {
    extractor: SignalExtractor,
    /// Live gain bank, possibly calibration-derived
    gain: TrackerConfig,
    /// Gain bank as last set by the user; restored on calibration reset
    configured: TrackerConfig,
    smoother: TrackingSmoother,
    precision: PrecisionStage,
    calibration: CalibrationController,
    frames: u64,
}

/// Face tracking session.
///
/// `Tracker` is `Send + Sync`; share it through an `Arc` to feed frames from
/// several threads.
#[derive(Debug)]
pub struct Tracker {
    inner: Mutex<Inner>,
    initialized: AtomicBool,
}

impl Default for Tracker {
    fn default() -> Self {
        let config = Config::default();
        Self::from_parts(&config, TrackerConfig::default())
    }
}

impl Tracker {
    /// Create a tracker from a validated configuration.
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;

        let mut gain = TrackerConfig::default();
        gain.set_multipliers(&config.multipliers())?;
        gain.set_deadzones(&config.deadzone_radii())?;

        Ok(Self::from_parts(config, gain))
    }

    fn from_parts(config: &Config, gain: TrackerConfig) -> Self {
        Self {
            inner: Mutex::new(Inner {
                extractor: SignalExtractor::new(&config.extractor),
                configured: gain.clone(),
                gain,
                smoother: TrackingSmoother::new(&config.smoothing),
                precision: PrecisionStage::new(&config.precision),
                calibration: CalibrationController::new(&config.calibration),
                frames: 0,
            }),
            initialized: AtomicBool::new(false),
        }
    }

    /// Mark the tracker ready. Idempotent; always returns true.
    pub fn initialize(&self) -> bool {
        if !self.initialized.swap(true, Ordering::AcqRel) {
            let inner = self.inner.lock();
            let extractor = inner.extractor.config();
            tracing::info!(
                layout = ?extractor.layout,
                topology = ?extractor.topology,
                "Tracker initialized"
            );
        }
        true
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Run one landmark buffer through the pipeline.
    ///
    /// While a calibration session is collecting (and auto-collect is on),
    /// the raw extractor frame is also offered to the session.
    pub fn process_frame(&self, landmarks: &[f32], count: usize) -> TrackingFrame {
        let mut inner = self.inner.lock();
        let Inner {
            extractor,
            gain,
            smoother,
            precision,
            calibration,
            frames,
            ..
        } = &mut *inner;

        let raw = extractor.extract(landmarks, count);

        if calibration.config().auto_collect && calibration.is_collecting() {
            calibration.collect(&raw, gain);
        }

        let out = precision.apply(&smoother.smooth(&gain.apply(&raw)));
        *frames += 1;
        tracing::trace!(frame = *frames, face = out.face_detected, "Frame processed");
        out
    }

    /// Replace every multiplier. Non-finite values refuse the whole update.
    pub fn update_sensitivity(&self, multipliers: ChannelSet<f32>) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.gain.set_multipliers(&multipliers)?;
        inner.configured.set_multipliers(&multipliers)?;
        tracing::debug!("Sensitivity updated: {:?}", multipliers.to_array());
        Ok(())
    }

    /// Replace every deadzone radius. Radii are clamped into range;
    /// non-finite values refuse the whole update.
    pub fn update_deadzones(&self, radii: ChannelSet<f32>) -> Result<()> {
        let radii = clamp_deadzones(&radii)?;
        let mut inner = self.inner.lock();
        inner.gain.set_deadzones(&radii)?;
        inner.configured.set_deadzones(&radii)?;
        tracing::debug!("Deadzones updated: {:?}", radii.to_array());
        Ok(())
    }

    pub fn set_multiplier(&self, ch: Channel, value: f32) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.gain.set_multiplier(ch, value)?;
        inner.configured.set_multiplier(ch, value)?;
        Ok(())
    }

    pub fn set_deadzone(&self, ch: Channel, radius: f32) -> Result<()> {
        let radius = clamp_deadzone(ch, radius)?;
        let mut inner = self.inner.lock();
        inner.gain.set_deadzone(ch, radius)?;
        inner.configured.set_deadzone(ch, radius)?;
        Ok(())
    }

    /// Snapshot of the live gain bank.
    pub fn config(&self) -> TrackerConfig {
        self.inner.lock().gain.clone()
    }

    /// Swap smoothing weights. History is kept unless the mode changes.
    pub fn update_smoothing(&self, config: &SmoothingConfig) -> Result<()> {
        config.validate()?;
        self.inner.lock().smoother.set_config(config);
        tracing::debug!(mode = config.mode.as_str(), "Smoothing updated");
        Ok(())
    }

    /// Forget smoothing history; the next face frame seeds it.
    pub fn reset_smoothing(&self) {
        let mut inner = self.inner.lock();
        inner.smoother.reset();
        inner.precision.reset();
    }

    /// Boost subtle movement by `multiplier` after smoothing.
    ///
    /// Output stays clamped to channel ranges; changes below the configured
    /// noise threshold are held.
    pub fn enable_precision_mode(&self, multiplier: f32) -> Result<()> {
        self.inner.lock().precision.enable(multiplier)?;
        Ok(())
    }

    pub fn disable_precision_mode(&self) {
        self.inner.lock().precision.disable();
    }

    pub fn is_precision_mode(&self) -> bool {
        self.inner.lock().precision.is_enabled()
    }

    /// Begin (or restart) a calibration session.
    pub fn start_calibration(&self) {
        self.inner.lock().calibration.start();
    }

    /// Offer a raw extractor frame to the active session.
    ///
    /// Returns false when idle or when the frame is unusable.
    pub fn collect_calibration_sample(&self, frame: &TrackingFrame) -> bool {
        let mut inner = self.inner.lock();
        let Inner {
            gain, calibration, ..
        } = &mut *inner;
        calibration.collect(frame, gain)
    }

    /// Commit the active session before it reaches the required count.
    pub fn finish_calibration(&self) -> std::result::Result<(), CalibrationError> {
        let mut inner = self.inner.lock();
        let Inner {
            gain, calibration, ..
        } = &mut *inner;
        calibration.finish(gain)
    }

    /// Drop the active session without touching the gain bank.
    pub fn abort_calibration(&self) -> bool {
        self.inner.lock().calibration.abort()
    }

    /// Drop any session and return to the user-configured gain bank.
    pub fn reset_calibration(&self) {
        let mut inner = self.inner.lock();
        inner.calibration.abort();
        inner.gain = inner.configured.clone();
        tracing::info!("Calibration reset");
    }

    pub fn calibration_status(&self) -> CalibrationStatus {
        let inner = self.inner.lock();
        inner.calibration.status(inner.gain.is_calibrated())
    }

    /// Whether the gain bank holds calibration-derived values.
    pub fn is_calibrated(&self) -> bool {
        self.inner.lock().gain.is_calibrated()
    }

    pub fn frames_processed(&self) -> u64 {
        self.inner.lock().frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::extractor::fixtures::*;
    use glam::Mat3;
    use std::sync::Arc;

    fn turned(yaw_deg: f32) -> Vec<f32> {
        flatten_xyz(&face_68(
            Expression::default(),
            Mat3::from_rotation_y(yaw_deg.to_radians()),
        ))
    }

    #[test]
    fn test_initialize_idempotent() {
        let tracker = Tracker::default();
        assert!(!tracker.is_initialized());
        assert!(tracker.initialize());
        assert!(tracker.initialize());
        assert!(tracker.is_initialized());
    }

    #[test]
    fn test_empty_input_is_neutral_no_face() {
        let tracker = Tracker::default();
        let out = tracker.process_frame(&[], 0);
        assert_eq!(out, TrackingFrame::no_face());
    }

    #[test]
    fn test_valid_face_in_range() {
        let tracker = Tracker::default();
        let data = flatten_xyz(&face_68(
            Expression {
                eye_left: 0.7,
                mouth_open: 0.4,
                ..Expression::default()
            },
            Mat3::from_rotation_z(0.1) * Mat3::from_rotation_y(0.2),
        ));
        let out = tracker.process_frame(&data, 68);
        assert!(out.face_detected);
        for ch in Channel::ALL {
            let (lo, hi) = ch.range();
            let v = out.get(ch);
            assert!(v >= lo && v <= hi, "{} = {} out of range", ch, v);
        }
    }

    #[test]
    fn test_eye_multiplier_doubles_output() {
        let data = flatten_xyz(&face_68(
            Expression {
                eye_left: 0.6,
                ..Expression::default()
            },
            Mat3::IDENTITY,
        ));

        let base = Tracker::default();
        let gained = Tracker::default();
        gained
            .update_sensitivity(ChannelSet {
                eye_left: 2.0,
                ..ChannelSet::default_multipliers()
            })
            .unwrap();

        let a = base.process_frame(&data, 68);
        let b = gained.process_frame(&data, 68);
        assert!(a.eye_left > 0.0);
        assert!((b.eye_left - 2.0 * a.eye_left).abs() < 1e-5);
        assert_eq!(b.eye_right, a.eye_right);
    }

    #[test]
    fn test_instances_do_not_share_smoothing() {
        let a = Tracker::default();
        let b = Tracker::default();
        let neutral = neutral_xyz();

        a.process_frame(&turned(20.0), 68);
        let out_a = a.process_frame(&neutral, 68);
        let out_b = b.process_frame(&neutral, 68);

        assert!(out_a.head_yaw.abs() > 0.1);
        assert_eq!(out_b.head_yaw, 0.0);
    }

    #[test]
    fn test_smoothing_converges_on_repeated_input() {
        let tracker = Tracker::default();
        tracker.process_frame(&neutral_xyz(), 68);
        let data = turned(15.0);
        let single = Tracker::default().process_frame(&data, 68);

        let mut out = TrackingFrame::no_face();
        for _ in 0..60 {
            out = tracker.process_frame(&data, 68);
        }
        assert!((out.head_yaw - single.head_yaw).abs() < 1e-4);
    }

    #[test]
    fn test_auto_collect_calibration() {
        let tracker = Tracker::default();
        let data = turned(3.0);
        assert!(!tracker.is_calibrated());

        tracker.start_calibration();
        for _ in 0..30 {
            tracker.process_frame(&data, 68);
        }
        assert!(tracker.is_calibrated());
        assert_eq!(tracker.calibration_status(), CalibrationStatus::Calibrated);

        tracker.reset_smoothing();
        let out = tracker.process_frame(&data, 68);
        assert_eq!(out.head_yaw, 0.0);
    }

    #[test]
    fn test_manual_collection_and_abort() {
        let mut config = Config::default();
        config.calibration.auto_collect = false;
        let tracker = Tracker::new(&config).unwrap();
        let before = tracker.config();

        let sample = TrackingFrame::from_channels(
            ChannelSet::from_array([0.1, 0.0, 0.0, 0.9, 0.9, 0.0, 0.0]),
            true,
        );
        assert!(!tracker.collect_calibration_sample(&sample));

        tracker.start_calibration();
        tracker.process_frame(&neutral_xyz(), 68);
        assert_eq!(
            tracker.calibration_status(),
            CalibrationStatus::Collecting {
                collected: 0,
                required: 30
            }
        );

        for _ in 0..12 {
            assert!(tracker.collect_calibration_sample(&sample));
        }
        assert!(tracker.abort_calibration());
        assert!(!tracker.is_calibrated());
        assert_eq!(tracker.config(), before);
    }

    #[test]
    fn test_finish_and_reset_calibration() {
        let tracker = Tracker::default();
        tracker.set_multiplier(Channel::MouthOpen, 1.5).unwrap();
        let sample = TrackingFrame::from_channels(
            ChannelSet::from_array([0.1, 0.0, 0.0, 0.9, 0.9, 0.0, 0.0]),
            true,
        );

        tracker.start_calibration();
        for _ in 0..3 {
            tracker.collect_calibration_sample(&sample);
        }
        assert!(matches!(
            tracker.finish_calibration(),
            Err(CalibrationError::InsufficientSamples { collected: 3, .. })
        ));
        for _ in 0..7 {
            tracker.collect_calibration_sample(&sample);
        }
        assert!(tracker.finish_calibration().is_ok());
        assert!(tracker.is_calibrated());

        tracker.reset_calibration();
        assert!(!tracker.is_calibrated());
        let config = tracker.config();
        assert_eq!(config.channel(Channel::HeadYaw).offset, 0.0);
        assert_eq!(config.channel(Channel::MouthOpen).multiplier, 1.5);
    }

    #[test]
    fn test_sensitivity_update_keeps_calibration() {
        let tracker = Tracker::default();
        let data = neutral_xyz();
        tracker.start_calibration();
        for _ in 0..30 {
            tracker.process_frame(&data, 68);
        }
        tracker
            .update_sensitivity(ChannelSet::splat(1.2))
            .unwrap();
        assert!(tracker.is_calibrated());
    }

    #[test]
    fn test_invalid_updates_refused() {
        let tracker = Tracker::default();
        assert!(tracker
            .update_sensitivity(ChannelSet {
                head_roll: f32::NAN,
                ..ChannelSet::default_multipliers()
            })
            .is_err());
        assert!(tracker.set_deadzone(Channel::EyeLeft, f32::INFINITY).is_err());
        assert_eq!(tracker.config(), TrackerConfig::default());

        tracker.update_deadzones(ChannelSet::splat(-1.0)).unwrap();
        assert_eq!(tracker.config().deadzones(), ChannelSet::splat(0.0));
    }

    #[test]
    fn test_deadzone_update_clamped_once_and_kept_on_reset() {
        let tracker = Tracker::default();
        tracker
            .update_deadzones(ChannelSet {
                mouth_open: 2.0,
                ..ChannelSet::default_deadzones()
            })
            .unwrap();
        tracker.set_deadzone(Channel::HeadYaw, -0.5).unwrap();

        tracker.reset_calibration();
        let config = tracker.config();
        assert_eq!(config.channel(Channel::MouthOpen).deadzone_radius, 0.95);
        assert_eq!(config.channel(Channel::HeadYaw).deadzone_radius, 0.0);
    }

    #[test]
    fn test_sensitivity_change_applies_from_next_frame() {
        let tracker = Tracker::default();
        let data = turned(15.0);
        tracker.process_frame(&data, 68);
        let steady = tracker.process_frame(&data, 68);
        assert!(steady.head_yaw.abs() > 0.05 && steady.head_yaw.abs() < 0.5);

        tracker
            .update_sensitivity(ChannelSet {
                head_yaw: 2.0,
                ..ChannelSet::default_multipliers()
            })
            .unwrap();

        // History is kept: 0.7 of the old value plus 0.3 of the doubled one
        let out = tracker.process_frame(&data, 68);
        assert!((out.head_yaw - 1.3 * steady.head_yaw).abs() < 1e-5);
    }

    #[test]
    fn test_update_smoothing_keeps_history() {
        let tracker = Tracker::default();
        let data = turned(15.0);
        let first = tracker.process_frame(&data, 68);
        let decayed = tracker.process_frame(&neutral_xyz(), 68);
        assert!((decayed.head_yaw - 0.7 * first.head_yaw).abs() < 1e-5);

        tracker
            .update_smoothing(&SmoothingConfig {
                history_weight: 0.5,
                ..SmoothingConfig::default()
            })
            .unwrap();
        let out = tracker.process_frame(&data, 68);
        assert!((out.head_yaw - 0.85 * first.head_yaw).abs() < 1e-5);

        assert!(tracker
            .update_smoothing(&SmoothingConfig {
                history_weight: 1.5,
                ..SmoothingConfig::default()
            })
            .is_err());
    }

    #[test]
    fn test_precision_mode_boosts_and_clamps() {
        let data = turned(15.0);
        let base = Tracker::default().process_frame(&data, 68);

        let tracker = Tracker::default();
        assert!(!tracker.is_precision_mode());
        tracker.enable_precision_mode(2.0).unwrap();
        assert!(tracker.is_precision_mode());
        let boosted = tracker.process_frame(&data, 68);
        assert!((boosted.head_yaw - 2.0 * base.head_yaw).abs() < 1e-5);

        tracker.enable_precision_mode(10.0).unwrap();
        let out = tracker.process_frame(&turned(30.0), 68);
        for ch in Channel::ALL {
            let (lo, hi) = ch.range();
            let v = out.get(ch);
            assert!(v >= lo && v <= hi, "{} = {} out of range", ch, v);
        }
        assert_eq!(out.eye_left, 1.0);

        assert!(tracker.enable_precision_mode(f32::NAN).is_err());
        tracker.disable_precision_mode();
        assert!(!tracker.is_precision_mode());
        tracker.reset_smoothing();
        let plain = tracker.process_frame(&data, 68);
        assert!((plain.head_yaw - base.head_yaw).abs() < 1e-6);
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let mut config = Config::default();
        config.smoothing.history_weight = 1.5;
        assert!(Tracker::new(&config).is_err());
    }

    #[test]
    fn test_shared_across_threads() {
        let tracker = Arc::new(Tracker::default());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let tracker = Arc::clone(&tracker);
                std::thread::spawn(move || {
                    let data = neutral_xyz();
                    for _ in 0..50 {
                        let out = tracker.process_frame(&data, 68);
                        assert!(out.face_detected);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(tracker.frames_processed(), 200);
    }
}
