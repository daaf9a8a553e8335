//! Calibration controller.
//!
//! Collects raw extractor frames while the user holds a neutral pose (and
//! optionally sweeps through extreme poses), then derives per-channel
//! baselines, deadzones and gains from robust statistics:
//!   - offset = median - rest value
//!   - deadzone = 3 × median absolute deviation
//!   - multiplier = 1 / peak deviation, for channels whose extremes were seen
//!
//! Lifecycle: Idle → Collecting → (committed | aborted) → Idle.

use std::fmt;

use crate::config::CalibrationConfig;
use crate::error::CalibrationError;
use crate::tracking::channel::{Channel, ChannelSet};
use crate::tracking::frame::TrackingFrame;
use crate::tracking::gain::{ChannelConfig, TrackerConfig};

/// Bounds for a derived deadzone radius
pub const MIN_DERIVED_DEADZONE: f32 = 0.01;
pub const MAX_DERIVED_DEADZONE: f32 = 0.25;
/// Bounds for a derived multiplier
pub const MIN_DERIVED_MULTIPLIER: f32 = 0.25;
pub const MAX_DERIVED_MULTIPLIER: f32 = 4.0;
/// MAD → deadzone factor
const DEADZONE_MADS: f32 = 3.0;

/// Observable calibration state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationStatus {
    /// No session and no calibration committed
    Idle,
    /// A session is collecting samples
    Collecting { collected: usize, required: usize },
    /// The tracker holds calibration-derived values
    Calibrated,
}

impl CalibrationStatus {
    /// Session progress in [0, 1]. 1.0 once calibrated.
    pub fn progress(&self) -> f32 {
        match self {
            Self::Idle => 0.0,
            Self::Collecting { collected, required } => {
                if *required == 0 {
                    1.0
                } else {
                    (*collected as f32 / *required as f32).min(1.0)
                }
            }
            Self::Calibrated => 1.0,
        }
    }
}

impl fmt::Display for CalibrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("Not calibrated"),
            Self::Collecting { .. } => {
                write!(f, "Calibrating... {:.0}%", self.progress() * 100.0)
            }
            Self::Calibrated => f.write_str("Calibrated"),
        }
    }
}

/// Samples gathered by one session.
#[derive(Debug, Clone, Default)]
pub struct CalibrationSession {
    samples: Vec<ChannelSet<f32>>,
}

impl CalibrationSession {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Derive a calibrated bank from the collected samples.
    ///
    /// Multipliers of channels without an observed extreme are taken from
    /// `current`.
    pub fn derive(
        &self,
        current: &ChannelSet<ChannelConfig>,
        min_extreme_range: f32,
    ) -> ChannelSet<ChannelConfig> {
        ChannelSet::from_fn(|ch| {
            let mut values: Vec<f32> = self.samples.iter().map(|s| s[ch]).collect();
            derive_channel(ch, &mut values, current[ch], min_extreme_range)
        })
    }
}

fn derive_channel(
    ch: Channel,
    values: &mut [f32],
    current: ChannelConfig,
    min_extreme_range: f32,
) -> ChannelConfig {
    let Some(center) = median(values) else {
        return current;
    };

    let mut deviations: Vec<f32> = values.iter().map(|v| (v - center).abs()).collect();
    let mad = median(&mut deviations).unwrap_or(0.0);
    let peak = deviations.iter().copied().fold(0.0f32, f32::max);

    let multiplier = if ch.rest_value() == 0.0 && peak >= min_extreme_range {
        (1.0 / peak).clamp(MIN_DERIVED_MULTIPLIER, MAX_DERIVED_MULTIPLIER)
    } else {
        current.multiplier
    };

    ChannelConfig {
        multiplier,
        deadzone_radius: (DEADZONE_MADS * mad).clamp(MIN_DERIVED_DEADZONE, MAX_DERIVED_DEADZONE),
        offset: center - ch.rest_value(),
    }
}

/// Median of finite values; sorts in place.
fn median(values: &mut [f32]) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

/// Drives one tracker's calibration sessions.
#[derive(Debug, Clone)]
pub struct CalibrationController {
    config: CalibrationConfig,
    session: Option<CalibrationSession>,
}

impl CalibrationController {
    pub fn new(config: &CalibrationConfig) -> Self {
        Self {
            config: config.clone(),
            session: None,
        }
    }

    pub fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    pub fn is_collecting(&self) -> bool {
        self.session.is_some()
    }

    /// Begin a session. An active session is discarded and restarted.
    pub fn start(&mut self) {
        if self.session.is_some() {
            tracing::info!("Restarting calibration session");
        } else {
            tracing::info!(
                "Calibration started, collecting {} samples",
                self.config.required_samples
            );
        }
        self.session = Some(CalibrationSession {
            samples: Vec::with_capacity(self.config.required_samples),
        });
    }

    /// Offer a raw extractor frame to the session.
    ///
    /// Returns whether the sample was accepted. Frames are rejected while
    /// idle, without a face, or with non-finite channels. Reaching
    /// `required_samples` commits into `target` and ends the session.
    pub fn collect(&mut self, frame: &TrackingFrame, target: &mut TrackerConfig) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        if !frame.face_detected || !frame.is_finite() {
            tracing::trace!("Calibration sample rejected");
            return false;
        }

        session.samples.push(frame.channels());
        tracing::trace!(
            "Calibration sample {}/{}",
            session.len(),
            self.config.required_samples
        );

        if session.len() >= self.config.required_samples {
            self.commit(target);
        }
        true
    }

    /// Commit early once `min_samples` are in.
    ///
    /// With too few samples the session keeps collecting.
    pub fn finish(&mut self, target: &mut TrackerConfig) -> Result<(), CalibrationError> {
        let Some(session) = self.session.as_ref() else {
            return Err(CalibrationError::NotCollecting);
        };
        if session.len() < self.config.min_samples {
            return Err(CalibrationError::InsufficientSamples {
                collected: session.len(),
                required: self.config.min_samples,
            });
        }
        self.commit(target);
        Ok(())
    }

    /// Discard the session. Returns whether one was active.
    pub fn abort(&mut self) -> bool {
        match self.session.take() {
            Some(session) => {
                tracing::info!("Calibration aborted after {} samples", session.len());
                true
            }
            None => false,
        }
    }

    pub fn status(&self, calibrated: bool) -> CalibrationStatus {
        match &self.session {
            Some(session) => CalibrationStatus::Collecting {
                collected: session.len(),
                required: self.config.required_samples,
            },
            None if calibrated => CalibrationStatus::Calibrated,
            None => CalibrationStatus::Idle,
        }
    }

    fn commit(&mut self, target: &mut TrackerConfig) {
        let Some(session) = self.session.take() else {
            return;
        };
        let derived = session.derive(target.channels(), self.config.min_extreme_range);
        target.commit_calibration(&derived);
        tracing::info!("Calibration committed from {} samples", session.len());
        for (ch, c) in derived.iter() {
            tracing::debug!(
                "  {}: offset={:.3} deadzone={:.3} multiplier={:.3}",
                ch,
                c.offset,
                c.deadzone_radius,
                c.multiplier
            );
        }
    }
}
