//! kaotrack - Real-time face tracking signal pipeline
//!
//! Turns per-frame face landmarks from an upstream detector into a small,
//! stable set of animation channels:
//! - Head yaw, pitch and roll from landmark geometry
//! - Eye openness, mouth open and mouth width from landmark distances
//! - Per-channel sensitivity and deadzone gating
//! - Per-instance exponential smoothing
//! - Sample-driven calibration of baselines, deadzones and gains

pub mod config;
pub mod error;
pub mod replay;
pub mod tracker;
pub mod tracking;

pub use config::Config;
pub use error::{KaotrackError, Result};
pub use tracker::Tracker;
pub use tracking::{Channel, ChannelSet, TrackingFrame};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
