//! Landmark buffer access and landmark topologies.
//!
//! The upstream detector hands over a flat `f32` slice. Its stride depends on
//! the [`LandmarkLayout`]; which index means which facial feature depends on
//! the [`Topology`]. Two topologies are built in:
//!   - iBUG 300-W 68 points (dlib, OpenSeeFace)
//!   - MediaPipe FaceMesh 468 points (478 with iris refinement)
//!
//! Coordinates follow the camera convention: x right, y down, z away from
//! the camera.

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// How points are packed in the flat buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LandmarkLayout {
    /// `[x, y]` per point
    Xy,
    /// `[x, y, z]` per point
    Xyz,
    /// `[x, y, confidence]` per point
    XyConfidence,
}

impl Default for LandmarkLayout {
    fn default() -> Self {
        Self::Xyz
    }
}

impl LandmarkLayout {
    /// Number of floats per point
    pub fn stride(&self) -> usize {
        match self {
            Self::Xy => 2,
            Self::Xyz | Self::XyConfidence => 3,
        }
    }

    /// Whether the third component is depth.
    pub fn has_depth(&self) -> bool {
        matches!(self, Self::Xyz)
    }
}

/// Topology selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopologyKind {
    /// Pick by point count
    Auto,
    Ibug68,
    Mediapipe468,
}

impl Default for TopologyKind {
    fn default() -> Self {
        Self::Auto
    }
}

impl TopologyKind {
    /// Resolve to a concrete topology for `count` points, if one fits.
    pub fn resolve(&self, count: usize) -> Option<&'static Topology> {
        let topology = match self {
            Self::Auto => {
                if count >= MEDIAPIPE_468.min_points {
                    &MEDIAPIPE_468
                } else {
                    &IBUG_68
                }
            }
            Self::Ibug68 => &IBUG_68,
            Self::Mediapipe468 => &MEDIAPIPE_468,
        };

        (count >= topology.min_points).then_some(topology)
    }
}

/// Indices of the six eye-contour points used for the eye aspect ratio.
///
/// Order: outer corner, upper lid ×2, inner corner, lower lid ×2, so that
/// `(p1, p5)` and `(p2, p4)` are vertical pairs and `(p0, p3)` is the width.
pub type EyeContour = [usize; 6];

/// Semantic landmark indices for one detector scheme.
///
/// "Left"/"right" are the subject's own sides. On an unmirrored camera image
/// the subject's right eye appears on the image left.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    pub name: &'static str,
    /// Minimum number of points this scheme requires
    pub min_points: usize,
    pub nose_tip: usize,
    /// Outer corner of the subject's right eye (image left)
    pub right_eye_outer: usize,
    /// Outer corner of the subject's left eye (image right)
    pub left_eye_outer: usize,
    pub right_eye: EyeContour,
    pub left_eye: EyeContour,
    /// Mouth corner on the subject's right (image left)
    pub mouth_right: usize,
    /// Mouth corner on the subject's left (image right)
    pub mouth_left: usize,
    pub inner_lip_upper: usize,
    pub inner_lip_lower: usize,
}

impl Topology {
    /// Indices whose confidence gates face detection.
    pub fn key_points(&self) -> [usize; 7] {
        [
            self.nose_tip,
            self.right_eye_outer,
            self.left_eye_outer,
            self.mouth_right,
            self.mouth_left,
            self.inner_lip_upper,
            self.inner_lip_lower,
        ]
    }
}

/// iBUG 300-W 68-point scheme.
pub const IBUG_68: Topology = Topology {
    name: "ibug68",
    min_points: 68,
    nose_tip: 30,
    right_eye_outer: 36,
    left_eye_outer: 45,
    right_eye: [36, 37, 38, 39, 40, 41],
    left_eye: [45, 44, 43, 42, 47, 46],
    mouth_right: 48,
    mouth_left: 54,
    inner_lip_upper: 62,
    inner_lip_lower: 66,
};

/// MediaPipe FaceMesh scheme.
pub const MEDIAPIPE_468: Topology = Topology {
    name: "mediapipe468",
    min_points: 468,
    nose_tip: 1,
    right_eye_outer: 33,
    left_eye_outer: 263,
    right_eye: [33, 160, 158, 133, 153, 144],
    left_eye: [263, 387, 385, 362, 380, 373],
    mouth_right: 61,
    mouth_left: 291,
    inner_lip_upper: 13,
    inner_lip_lower: 14,
};

/// Read-only view over a caller-owned landmark slice.
///
/// Valid only for the duration of one call; never copies the points.
#[derive(Debug, Clone, Copy)]
pub struct LandmarkBuffer<'a> {
    data: &'a [f32],
    layout: LandmarkLayout,
    count: usize,
}

impl<'a> LandmarkBuffer<'a> {
    /// Wrap `data` holding `count` declared points.
    ///
    /// If the slice is shorter than the declared count, the count is
    /// truncated to the whole points actually present.
    pub fn new(data: &'a [f32], count: usize, layout: LandmarkLayout) -> Self {
        let available = data.len() / layout.stride();
        Self {
            data,
            layout,
            count: count.min(available),
        }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn layout(&self) -> LandmarkLayout {
        self.layout
    }

    /// Point `i` as a 3D vector. z is 0.0 for layouts without depth.
    pub fn point(&self, i: usize) -> Option<Vec3> {
        if i >= self.count {
            return None;
        }
        let s = self.layout.stride();
        let p = &self.data[i * s..i * s + s];
        let z = if self.layout.has_depth() { p[2] } else { 0.0 };
        Some(Vec3::new(p[0], p[1], z))
    }

    /// Per-point confidence. 1.0 for layouts that carry none.
    pub fn confidence(&self, i: usize) -> Option<f32> {
        if i >= self.count {
            return None;
        }
        match self.layout {
            LandmarkLayout::XyConfidence => Some(self.data[i * 3 + 2]),
            _ => Some(1.0),
        }
    }

    /// Mean confidence over a set of indices.
    pub fn mean_confidence(&self, indices: &[usize]) -> Option<f32> {
        if indices.is_empty() {
            return None;
        }
        let mut sum = 0.0;
        for &i in indices {
            sum += self.confidence(i)?;
        }
        Some(sum / indices.len() as f32)
    }
}
