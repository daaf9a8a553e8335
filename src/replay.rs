//! JSON-lines landmark replay.
//!
//! One packet per line:
//! ```text
//! {"landmarks": [x0, y0, z0, x1, ...], "count": 68}
//! {"calibrate": "start"}
//! ```
//! `count` may be omitted; it then defaults to the number of whole points in
//! `landmarks` for the configured layout. Blank lines and lines starting with
//! `#` are skipped.

use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::error::TrackingError;
use crate::tracking::frame::TrackingFrame;
use crate::tracking::landmarks::LandmarkLayout;

/// Calibration control carried in a replay stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalibrationCommand {
    Start,
    Finish,
    Abort,
    Reset,
}

/// A single replay packet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReplayPacket {
    Landmarks {
        landmarks: Vec<f32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        count: Option<usize>,
    },
    Calibrate {
        calibrate: CalibrationCommand,
    },
}

impl ReplayPacket {
    /// Parse one line. `Ok(None)` for blank and comment lines.
    pub fn parse_line(line: &str) -> Result<Option<Self>, TrackingError> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }
        serde_json::from_str(line)
            .map(Some)
            .map_err(|e| TrackingError::PacketParse(format!("JSON parse error: {}", e)))
    }
}

/// Declared point count of a landmark packet.
pub fn point_count(landmarks: &[f32], count: Option<usize>, layout: LandmarkLayout) -> usize {
    count.unwrap_or(landmarks.len() / layout.stride())
}

/// Output encoding for processed frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameFormat {
    /// One JSON object per line
    #[default]
    Json,
    /// Raw 29-byte little-endian records
    Binary,
}

/// Write one frame in the chosen encoding.
pub fn write_frame<W: Write>(
    writer: &mut W,
    frame: &TrackingFrame,
    format: FrameFormat,
) -> std::io::Result<()> {
    match format {
        FrameFormat::Json => {
            serde_json::to_writer(&mut *writer, frame)?;
            writer.write_all(b"\n")
        }
        FrameFormat::Binary => writer.write_all(&frame.to_le_bytes()),
    }
}
