//! Signal extractor: landmark geometry to raw channel values.
//!
//! Head pose comes from an orthonormal head basis built from the eye line and
//! the eye-to-mouth direction, decomposed as `R = Rz(roll)·Ry(yaw)·Rx(pitch)`.
//! When the buffer carries no depth the basis only yields roll, so yaw and
//! pitch are recovered from the nose tip's offset using average facial
//! proportions.
//!
//! Expression channels are ratios of landmark distances to the inter-ocular
//! distance (IOD), so they do not depend on the face's size in the image.

use glam::Vec3;

use crate::config::ExtractorConfig;
use crate::tracking::channel::ChannelSet;
use crate::tracking::frame::TrackingFrame;
use crate::tracking::landmarks::{EyeContour, LandmarkBuffer, LandmarkLayout, Topology};

/// Head angle mapped to ±1.0 (30°)
pub const MAX_ANGLE_RAD: f32 = std::f32::consts::PI / 6.0;

/// Eye aspect ratio of a closed eye
pub const EAR_CLOSED: f32 = 0.15;
/// Eye aspect ratio of a fully open eye
pub const EAR_OPEN: f32 = 0.30;

/// Inner-lip gap / IOD at which the mouth reads fully open
pub const MOUTH_OPEN_FULL: f32 = 0.5;
/// Mouth-corner distance / IOD of a relaxed mouth
pub const MOUTH_WIDE_NEUTRAL: f32 = 0.55;
/// Extra mouth-corner distance / IOD of a full smile
pub const MOUTH_WIDE_SPAN: f32 = 0.20;

/// Nose-tip protrusion in front of the eye plane / IOD
pub const NOSE_DEPTH_RATIO: f32 = 0.35;
/// Eye-line to mouth-line distance / IOD
pub const FACE_HEIGHT_RATIO: f32 = 0.75;
/// Nose-tip drop below the eye line / eye-to-mouth distance, facing the camera
pub const NOSE_DROP_RATIO: f32 = 0.55;

const NOSE_DEPTH_TO_FACE_HEIGHT: f32 = NOSE_DEPTH_RATIO / FACE_HEIGHT_RATIO;

/// Lengths below this are treated as collapsed geometry
const MIN_LENGTH: f32 = 1e-6;
/// z-spread (relative to IOD) below which a buffer is treated as flat
const DEPTH_EPSILON: f32 = 1e-3;

/// Head orientation frame: x along the eye line, y toward the mouth, z = x × y.
#[derive(Debug, Clone, Copy)]
struct HeadBasis {
    ex: Vec3,
    ey: Vec3,
    ez: Vec3,
}

impl HeadBasis {
    fn new(across: Vec3, down: Vec3) -> Option<Self> {
        let ex = across.try_normalize()?;
        let ey = (down - ex * down.dot(ex)).try_normalize()?;
        let ez = ex.cross(ey);
        Some(Self { ex, ey, ez })
    }

    fn roll(&self) -> f32 {
        self.ex.y.atan2(self.ex.x)
    }

    fn yaw(&self) -> f32 {
        (-self.ex.z).atan2((self.ex.x * self.ex.x + self.ex.y * self.ex.y).sqrt())
    }

    fn pitch(&self) -> f32 {
        self.ey.z.atan2(self.ez.z)
    }
}

/// Converts landmark buffers into raw (pre-gain) tracking frames.
#[derive(Debug, Clone)]
pub struct SignalExtractor {
    config: ExtractorConfig,
}

impl SignalExtractor {
    pub fn new(config: &ExtractorConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Extract a raw frame from `count` points packed in `data`.
    ///
    /// Never fails: missing, short, degenerate or low-confidence input yields
    /// [`TrackingFrame::no_face`].
    pub fn extract(&self, data: &[f32], count: usize) -> TrackingFrame {
        if data.is_empty() || count < self.config.min_landmarks {
            tracing::trace!(count, "Landmark count below minimum, no face");
            return TrackingFrame::no_face();
        }

        let buf = LandmarkBuffer::new(data, count, self.config.layout);
        if buf.len() < self.config.min_landmarks {
            tracing::debug!(
                declared = count,
                available = buf.len(),
                "Landmark buffer shorter than declared count"
            );
            return TrackingFrame::no_face();
        }

        let Some(topology) = self.config.topology.resolve(buf.len()) else {
            tracing::debug!(count = buf.len(), "No landmark topology fits point count");
            return TrackingFrame::no_face();
        };

        match self.measure(&buf, topology) {
            Some(channels) => TrackingFrame::from_channels(channels, true),
            None => TrackingFrame::no_face(),
        }
    }

    fn measure(&self, buf: &LandmarkBuffer<'_>, topo: &Topology) -> Option<ChannelSet<f32>> {
        if buf.layout() == LandmarkLayout::XyConfidence {
            let confidence = buf.mean_confidence(&topo.key_points())?;
            if confidence.is_nan() || confidence < self.config.min_confidence {
                tracing::debug!(confidence, "Landmark confidence too low");
                return None;
            }
        }

        let point = |i: usize| buf.point(i).filter(|p| p.is_finite());

        let eye_r = point(topo.right_eye_outer)?;
        let eye_l = point(topo.left_eye_outer)?;
        let nose = point(topo.nose_tip)?;
        let mouth_r = point(topo.mouth_right)?;
        let mouth_l = point(topo.mouth_left)?;
        let lip_upper = point(topo.inner_lip_upper)?;
        let lip_lower = point(topo.inner_lip_lower)?;

        let across = eye_l - eye_r;
        let iod = across.length();
        if iod < MIN_LENGTH {
            tracing::debug!("Degenerate inter-ocular distance");
            return None;
        }

        let eye_mid = (eye_r + eye_l) * 0.5;
        let mouth_mid = (mouth_r + mouth_l) * 0.5;
        let basis = HeadBasis::new(across, mouth_mid - eye_mid)?;

        let key_z = [eye_r.z, eye_l.z, nose.z, mouth_r.z, mouth_l.z];
        let z_min = key_z.iter().copied().fold(f32::INFINITY, f32::min);
        let z_max = key_z.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let has_depth = buf.layout().has_depth() && (z_max - z_min) > DEPTH_EPSILON * iod;

        let roll = basis.roll();
        let (yaw, pitch) = if has_depth {
            (basis.yaw(), basis.pitch())
        } else {
            planar_yaw_pitch(&basis, nose - eye_mid, iod, (mouth_mid - eye_mid).dot(basis.ey))
        };

        let eye_left = eye_openness(buf, &topo.left_eye)?;
        let eye_right = eye_openness(buf, &topo.right_eye)?;

        let mouth_open = ((lip_lower - lip_upper).length() / iod / MOUTH_OPEN_FULL).clamp(0.0, 1.0);
        let mouth_wide =
            (((mouth_l - mouth_r).length() / iod - MOUTH_WIDE_NEUTRAL) / MOUTH_WIDE_SPAN).clamp(0.0, 1.0);

        Some(ChannelSet {
            head_yaw: normalize_angle(yaw),
            head_pitch: normalize_angle(pitch),
            head_roll: normalize_angle(roll),
            eye_left,
            eye_right,
            mouth_open,
            mouth_wide,
        })
    }
}

/// Yaw and pitch from the nose tip's image-plane offset.
///
/// Turning by θ moves the nose tip sideways by `depth·sinθ` while the eye line
/// shortens by `cosθ`, so the offset/IOD ratio is `-NOSE_DEPTH_RATIO·tanθ`.
/// Pitch works the same way against the eye-to-mouth height.
fn planar_yaw_pitch(basis: &HeadBasis, nose_offset: Vec3, iod: f32, face_height: f32) -> (f32, f32) {
    let u = nose_offset.dot(basis.ex) / iod;
    let yaw = (-u / NOSE_DEPTH_RATIO).atan();

    let pitch = if face_height > MIN_LENGTH {
        let v = nose_offset.dot(basis.ey) / face_height;
        ((v - NOSE_DROP_RATIO) / NOSE_DEPTH_TO_FACE_HEIGHT).atan()
    } else {
        0.0
    };

    (yaw, pitch)
}

/// Eye openness in [0, 1] from the six-point eye aspect ratio.
fn eye_openness(buf: &LandmarkBuffer<'_>, contour: &EyeContour) -> Option<f32> {
    let mut p = [Vec3::ZERO; 6];
    for (slot, &i) in p.iter_mut().zip(contour.iter()) {
        *slot = buf.point(i).filter(|v| v.is_finite())?;
    }

    let width = p[0].distance(p[3]);
    if width < MIN_LENGTH {
        return None;
    }
    let ear = (p[1].distance(p[5]) + p[2].distance(p[4])) / (2.0 * width);

    Some(((ear - EAR_CLOSED) / (EAR_OPEN - EAR_CLOSED)).clamp(0.0, 1.0))
}

/// Radians to the ±1 range, saturating at ±30°.
fn normalize_angle(rad: f32) -> f32 {
    (rad / MAX_ANGLE_RAD).clamp(-1.0, 1.0)
}
