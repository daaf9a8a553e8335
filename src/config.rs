//! Configuration parsing and management for kaotrack

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, KaotrackError};
use crate::tracking::channel::{Channel, ChannelSet};
use crate::tracking::landmarks::{LandmarkLayout, TopologyKind};
use crate::tracking::precision::PrecisionConfig;
use crate::tracking::smoothing::SmoothingMode;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub extractor: ExtractorConfig,
    /// Per-channel multipliers; unset channels keep 1.0
    pub sensitivity: ChannelOverrides,
    /// Per-channel deadzone radii; unset channels keep 0.05
    pub deadzones: ChannelOverrides,
    pub smoothing: SmoothingConfig,
    pub calibration: CalibrationConfig,
    pub precision: PrecisionConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, KaotrackError> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ConfigError::ReadFile(format!("{}: {}", path.as_ref().display(), e))
        })?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string
    pub fn from_str(s: &str) -> Result<Self, KaotrackError> {
        toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()).into())
    }

    /// Load configuration from default paths
    pub fn load() -> Result<Self, KaotrackError> {
        let paths = [
            PathBuf::from("kaotrack.toml"),
            PathBuf::from("config/default.toml"),
            dirs_path().join("kaotrack.toml"),
        ];

        for path in &paths {
            if path.exists() {
                tracing::info!("Loading config from: {}", path.display());
                return Self::from_file(path);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Multiplier bank with defaults filled in
    pub fn multipliers(&self) -> ChannelSet<f32> {
        self.sensitivity.resolve(ChannelSet::default_multipliers())
    }

    /// Deadzone bank with defaults filled in
    pub fn deadzone_radii(&self) -> ChannelSet<f32> {
        self.deadzones.resolve(ChannelSet::default_deadzones())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), KaotrackError> {
        if self.extractor.min_landmarks == 0 {
            return Err(invalid(
                "extractor.min_landmarks",
                "Minimum landmark count must be greater than 0",
            ));
        }

        if !(0.0..=1.0).contains(&self.extractor.min_confidence) {
            return Err(invalid(
                "extractor.min_confidence",
                "Confidence threshold must be between 0.0 and 1.0",
            ));
        }

        for (ch, v) in self.multipliers().iter() {
            if !v.is_finite() {
                return Err(invalid(
                    &format!("sensitivity.{}", ch),
                    "Multiplier must be finite",
                ));
            }
        }

        // Out-of-range radii are clamped when applied; only garbage is refused
        for (ch, r) in self.deadzone_radii().iter() {
            if !r.is_finite() {
                return Err(invalid(
                    &format!("deadzones.{}", ch),
                    "Deadzone radius must be finite",
                ));
            }
        }

        self.smoothing.validate()?;
        self.precision.validate()?;

        if self.calibration.required_samples == 0 {
            return Err(invalid(
                "calibration.required_samples",
                "Required sample count must be greater than 0",
            ));
        }

        if self.calibration.min_samples == 0
            || self.calibration.min_samples > self.calibration.required_samples
        {
            return Err(invalid(
                "calibration.min_samples",
                "Minimum sample count must be between 1 and required_samples",
            ));
        }

        if !(self.calibration.min_extreme_range > 0.0 && self.calibration.min_extreme_range <= 1.0)
        {
            return Err(invalid(
                "calibration.min_extreme_range",
                "Extreme range threshold must be in (0.0, 1.0]",
            ));
        }

        Ok(())
    }
}

fn invalid(field: &str, message: &str) -> KaotrackError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        message: message.to_string(),
    }
    .into()
}

/// Landmark input configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Packing of the flat landmark buffer: "xy", "xyz", or "xy_confidence"
    pub layout: LandmarkLayout,
    /// Index scheme: "auto", "ibug68", or "mediapipe468"
    pub topology: TopologyKind,
    /// Fewer points than this is treated as no face
    pub min_landmarks: usize,
    /// Mean key-point confidence below this is treated as no face
    /// (only for the `xy_confidence` layout)
    pub min_confidence: f32,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            layout: LandmarkLayout::Xyz,
            topology: TopologyKind::Auto,
            min_landmarks: 10,
            min_confidence: 0.5,
        }
    }
}

/// Partial per-channel values as written in TOML.
///
/// ```toml
/// [sensitivity]
/// eye_left = 1.5
/// head_yaw = 1.2
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChannelOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head_yaw: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head_pitch: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head_roll: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eye_left: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eye_right: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mouth_open: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mouth_wide: Option<f32>,
}

impl ChannelOverrides {
    pub fn get(&self, ch: Channel) -> Option<f32> {
        match ch {
            Channel::HeadYaw => self.head_yaw,
            Channel::HeadPitch => self.head_pitch,
            Channel::HeadRoll => self.head_roll,
            Channel::EyeLeft => self.eye_left,
            Channel::EyeRight => self.eye_right,
            Channel::MouthOpen => self.mouth_open,
            Channel::MouthWide => self.mouth_wide,
        }
    }

    /// Fill unset channels from `defaults`.
    pub fn resolve(&self, defaults: ChannelSet<f32>) -> ChannelSet<f32> {
        defaults.map(|ch, d| self.get(ch).unwrap_or(d))
    }
}

/// Temporal smoothing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    /// Smoothing algorithm: "ema" or "none"
    pub mode: SmoothingMode,
    /// Weight on the previous smoothed value (0.0 = no smoothing)
    pub history_weight: f32,
    /// Overrides for yaw/pitch/roll
    pub head_history_weight: Option<f32>,
    /// Overrides for eye openness
    pub eye_history_weight: Option<f32>,
    /// Overrides for mouth channels
    pub mouth_history_weight: Option<f32>,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            mode: SmoothingMode::Ema,
            history_weight: 0.7,
            head_history_weight: None,
            eye_history_weight: None,
            mouth_history_weight: None,
        }
    }
}

impl SmoothingConfig {
    /// Every history weight must lie in [0.0, 1.0).
    pub fn validate(&self) -> Result<(), ConfigError> {
        let weights = [
            ("smoothing.history_weight", Some(self.history_weight)),
            ("smoothing.head_history_weight", self.head_history_weight),
            ("smoothing.eye_history_weight", self.eye_history_weight),
            ("smoothing.mouth_history_weight", self.mouth_history_weight),
        ];
        for (field, weight) in weights {
            if let Some(w) = weight {
                if !(0.0..1.0).contains(&w) {
                    return Err(ConfigError::InvalidValue {
                        field: field.to_string(),
                        message: "History weight must be in [0.0, 1.0)".to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Calibration session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Samples after which the session commits on its own
    pub required_samples: usize,
    /// Samples needed before an explicit finish is accepted
    pub min_samples: usize,
    /// Peak deviation needed before a channel's multiplier is re-derived
    pub min_extreme_range: f32,
    /// Feed every raw extractor frame into an active session
    pub auto_collect: bool,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            required_samples: 30,
            min_samples: 10,
            min_extreme_range: 0.2,
            auto_collect: true,
        }
    }
}

/// Get the platform-specific configuration directory
fn dirs_path() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        if let Some(config_dir) = std::env::var_os("XDG_CONFIG_HOME") {
            return PathBuf::from(config_dir).join("kaotrack");
        }
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(".config/kaotrack");
        }
    }

    #[cfg(target_os = "macos")]
    {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join("Library/Application Support/kaotrack");
        }
    }

    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata).join("kaotrack");
        }
    }

    PathBuf::from(".")
}
