//! Face and landmark provider seam
//!
//! Face localization and 68-point landmark extraction run outside this
//! crate. Whatever model does that work implements `LandmarkProvider`.

use camera_capture::VideoFrame;
use serde::{Deserialize, Serialize};

use crate::geometry::LandmarkSet;
use crate::DmsError;

/// Face bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceRegion {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
}

/// One detected face with its landmarks
#[derive(Debug, Clone, PartialEq)]
pub struct FaceObservation {
    pub region: FaceRegion,
    pub landmarks: LandmarkSet,
}

/// Locates faces and their landmarks in a frame
pub trait LandmarkProvider: Send {
    /// Every face found in `frame`; empty when there is none.
    fn detect(&mut self, frame: &VideoFrame) -> Result<Vec<FaceObservation>, DmsError>;
}

impl<F> LandmarkProvider for F
where
    F: FnMut(&VideoFrame) -> Result<Vec<FaceObservation>, DmsError> + Send,
{
    fn detect(&mut self, frame: &VideoFrame) -> Result<Vec<FaceObservation>, DmsError> {
        self(frame)
    }
}

/// Most confident face at or above `min_confidence`
pub fn select_face(faces: &[FaceObservation], min_confidence: f32) -> Option<&FaceObservation> {
    faces
        .iter()
        .filter(|f| f.region.confidence >= min_confidence)
        .max_by(|a, b| a.region.confidence.total_cmp(&b.region.confidence))
}
