//! Tracking module
//!
//! The per-frame signal pipeline, leaves first:
//! - Landmark buffers and topologies
//! - Signal extraction (pose and expression from landmark geometry)
//! - Sensitivity and deadzone gating
//! - Temporal smoothing
//! - Precision mode
//! - Calibration

pub mod calibration;
pub mod channel;
pub mod extractor;
pub mod frame;
pub mod gain;
pub mod landmarks;
pub mod precision;
pub mod smoothing;

pub use calibration::{CalibrationController, CalibrationStatus};
pub use channel::{Channel, ChannelSet};
pub use extractor::SignalExtractor;
pub use frame::{TrackingFrame, FRAME_SIZE};
pub use gain::{ChannelConfig, TrackerConfig};
pub use landmarks::{LandmarkBuffer, LandmarkLayout, TopologyKind};
pub use precision::{PrecisionConfig, PrecisionStage};
pub use smoothing::{SmoothingMode, TrackingSmoother};
