//! The seven tracked channels and a named per-channel container.

use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};

/// One of the seven scalar quantities the tracker produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    HeadYaw,
    HeadPitch,
    HeadRoll,
    EyeLeft,
    EyeRight,
    MouthOpen,
    MouthWide,
}

impl Channel {
    /// All channels in wire order.
    pub const ALL: [Channel; 7] = [
        Self::HeadYaw,
        Self::HeadPitch,
        Self::HeadRoll,
        Self::EyeLeft,
        Self::EyeRight,
        Self::MouthOpen,
        Self::MouthWide,
    ];

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "head_yaw" | "yaw" => Some(Self::HeadYaw),
            "head_pitch" | "pitch" => Some(Self::HeadPitch),
            "head_roll" | "roll" => Some(Self::HeadRoll),
            "eye_left" => Some(Self::EyeLeft),
            "eye_right" => Some(Self::EyeRight),
            "mouth_open" => Some(Self::MouthOpen),
            "mouth_wide" => Some(Self::MouthWide),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HeadYaw => "head_yaw",
            Self::HeadPitch => "head_pitch",
            Self::HeadRoll => "head_roll",
            Self::EyeLeft => "eye_left",
            Self::EyeRight => "eye_right",
            Self::MouthOpen => "mouth_open",
            Self::MouthWide => "mouth_wide",
        }
    }

    /// Head rotation channels are signed angles in [-1, 1].
    pub fn is_angle(&self) -> bool {
        matches!(self, Self::HeadYaw | Self::HeadPitch | Self::HeadRoll)
    }

    /// Value this channel reads when the face is at rest.
    ///
    /// Eyes rest fully open; every other channel rests at zero.
    pub fn rest_value(&self) -> f32 {
        match self {
            Self::EyeLeft | Self::EyeRight => 1.0,
            _ => 0.0,
        }
    }

    /// Valid output range of the raw extractor value.
    pub fn range(&self) -> (f32, f32) {
        if self.is_angle() {
            (-1.0, 1.0)
        } else {
            (0.0, 1.0)
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value per channel, addressable by field name or by [`Channel`].
///
/// Used for multiplier banks, deadzone banks, calibration offsets and
/// smoothing weights.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelSet<T> {
    pub head_yaw: T,
    pub head_pitch: T,
    pub head_roll: T,
    pub eye_left: T,
    pub eye_right: T,
    pub mouth_open: T,
    pub mouth_wide: T,
}

impl<T: Copy> ChannelSet<T> {
    /// Same value on every channel.
    pub fn splat(value: T) -> Self {
        Self {
            head_yaw: value,
            head_pitch: value,
            head_roll: value,
            eye_left: value,
            eye_right: value,
            mouth_open: value,
            mouth_wide: value,
        }
    }

    /// Build from a function of the channel.
    pub fn from_fn<F: FnMut(Channel) -> T>(mut f: F) -> Self {
        Self {
            head_yaw: f(Channel::HeadYaw),
            head_pitch: f(Channel::HeadPitch),
            head_roll: f(Channel::HeadRoll),
            eye_left: f(Channel::EyeLeft),
            eye_right: f(Channel::EyeRight),
            mouth_open: f(Channel::MouthOpen),
            mouth_wide: f(Channel::MouthWide),
        }
    }

    pub fn map<U: Copy, F: FnMut(Channel, T) -> U>(&self, mut f: F) -> ChannelSet<U> {
        ChannelSet::from_fn(|ch| f(ch, self[ch]))
    }

    /// Iterate `(channel, value)` pairs in wire order.
    pub fn iter(&self) -> impl Iterator<Item = (Channel, T)> + '_ {
        Channel::ALL.into_iter().map(move |ch| (ch, self[ch]))
    }

    pub fn to_array(&self) -> [T; 7] {
        Channel::ALL.map(|ch| self[ch])
    }
}

impl ChannelSet<f32> {
    /// Default gain bank: unity on every channel.
    pub fn default_multipliers() -> Self {
        Self::splat(1.0)
    }

    /// Default deadzone bank.
    pub fn default_deadzones() -> Self {
        Self::splat(0.05)
    }

    pub fn from_array(values: [f32; 7]) -> Self {
        Self::from_fn(|ch| values[ch as usize])
    }
}

impl<T> Index<Channel> for ChannelSet<T> {
    type Output = T;

    fn index(&self, ch: Channel) -> &T {
        match ch {
            Channel::HeadYaw => &self.head_yaw,
            Channel::HeadPitch => &self.head_pitch,
            Channel::HeadRoll => &self.head_roll,
            Channel::EyeLeft => &self.eye_left,
            Channel::EyeRight => &self.eye_right,
            Channel::MouthOpen => &self.mouth_open,
            Channel::MouthWide => &self.mouth_wide,
        }
    }
}

impl<T> IndexMut<Channel> for ChannelSet<T> {
    fn index_mut(&mut self, ch: Channel) -> &mut T {
        match ch {
            Channel::HeadYaw => &mut self.head_yaw,
            Channel::HeadPitch => &mut self.head_pitch,
            Channel::HeadRoll => &mut self.head_roll,
            Channel::EyeLeft => &mut self.eye_left,
            Channel::EyeRight => &mut self.eye_right,
            Channel::MouthOpen => &mut self.mouth_open,
            Channel::MouthWide => &mut self.mouth_wide,
        }
    }
}
