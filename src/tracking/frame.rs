//! Per-frame output record and its fixed binary layout.
//!
//! Layout (29 bytes, little-endian):
//!   - 7×f32 channels (28 bytes): head_yaw, head_pitch, head_roll,
//!     eye_left, eye_right, mouth_open, mouth_wide
//!   - u8 face_detected (1 byte)

use serde::{Deserialize, Serialize};

use crate::error::TrackingError;
use crate::tracking::channel::{Channel, ChannelSet};

/// Size of an encoded frame in bytes
pub const FRAME_SIZE: usize = 7 * 4 + 1;

/// One processed tracking observation.
///
/// Angles are normalized so that ±1.0 corresponds to ±30°. Eye channels are
/// openness (1.0 = open), mouth channels are 0.0 at rest.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TrackingFrame {
    pub head_yaw: f32,
    pub head_pitch: f32,
    pub head_roll: f32,
    pub eye_left: f32,
    pub eye_right: f32,
    pub mouth_open: f32,
    pub mouth_wide: f32,
    pub face_detected: bool,
}

impl TrackingFrame {
    /// The "no face" observation: every channel neutral at 0.0.
    pub fn no_face() -> Self {
        Self::default()
    }

    pub fn from_channels(channels: ChannelSet<f32>, face_detected: bool) -> Self {
        Self {
            head_yaw: channels.head_yaw,
            head_pitch: channels.head_pitch,
            head_roll: channels.head_roll,
            eye_left: channels.eye_left,
            eye_right: channels.eye_right,
            mouth_open: channels.mouth_open,
            mouth_wide: channels.mouth_wide,
            face_detected,
        }
    }

    pub fn channels(&self) -> ChannelSet<f32> {
        ChannelSet {
            head_yaw: self.head_yaw,
            head_pitch: self.head_pitch,
            head_roll: self.head_roll,
            eye_left: self.eye_left,
            eye_right: self.eye_right,
            mouth_open: self.mouth_open,
            mouth_wide: self.mouth_wide,
        }
    }

    pub fn get(&self, ch: Channel) -> f32 {
        self.channels()[ch]
    }

    /// Whether every channel holds a finite value.
    pub fn is_finite(&self) -> bool {
        self.channels().iter().all(|(_, v)| v.is_finite())
    }

    /// Encode into the fixed 29-byte wire layout.
    pub fn to_le_bytes(&self) -> [u8; FRAME_SIZE] {
        let mut buf = [0u8; FRAME_SIZE];
        for (i, (_, v)) in self.channels().iter().enumerate() {
            buf[i * 4..i * 4 + 4].copy_from_slice(&v.to_le_bytes());
        }
        buf[FRAME_SIZE - 1] = u8::from(self.face_detected);
        buf
    }

    /// Decode a frame from the start of `buf`.
    pub fn from_le_bytes(buf: &[u8]) -> Result<Self, TrackingError> {
        if buf.len() < FRAME_SIZE {
            return Err(TrackingError::FrameParse(format!(
                "Buffer too short: need {} bytes, have {}",
                FRAME_SIZE,
                buf.len()
            )));
        }

        let mut values = [0.0f32; 7];
        for (i, v) in values.iter_mut().enumerate() {
            let mut word = [0u8; 4];
            word.copy_from_slice(&buf[i * 4..i * 4 + 4]);
            *v = f32::from_le_bytes(word);
        }

        let face_detected = match buf[FRAME_SIZE - 1] {
            0 => false,
            1 => true,
            other => {
                return Err(TrackingError::FrameParse(format!(
                    "Invalid face_detected byte: {}",
                    other
                )))
            }
        };

        Ok(Self::from_channels(
            ChannelSet::from_array(values),
            face_detected,
        ))
    }
}
