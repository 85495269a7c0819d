//! Facial landmark geometry: eye and mouth aspect ratios

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::DmsError;

/// Number of points in the canonical facial landmark layout
pub const LANDMARK_COUNT: usize = 68;

/// Reference distances below this are treated as degenerate
pub const MIN_REFERENCE_DISTANCE: f64 = 1e-6;

const LEFT_EYE_START: usize = 36;
const RIGHT_EYE_START: usize = 42;
const MOUTH_START: usize = 48;

/// 2D image coordinate
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point
    pub fn distance(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Midpoint between two points
    pub fn midpoint(&self, other: &Point) -> Point {
        Point::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    pub fn scaled(&self, k: f64) -> Point {
        Point::new(self.x * k, self.y * k)
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Point::new(x, y)
    }
}

/// One eye contour, 6 points starting at the outer corner going clockwise
pub type EyeContour = [Point; 6];

/// Outer lip contour, 12 points starting at the left mouth corner
pub type MouthContour = [Point; 12];

/// Full 68-point landmark set for one face
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkSet {
    points: [Point; LANDMARK_COUNT],
}

impl LandmarkSet {
    pub fn new(points: [Point; LANDMARK_COUNT]) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[Point; LANDMARK_COUNT] {
        &self.points
    }

    pub fn left_eye(&self) -> EyeContour {
        self.slice(LEFT_EYE_START)
    }

    pub fn right_eye(&self) -> EyeContour {
        self.slice(RIGHT_EYE_START)
    }

    pub fn mouth(&self) -> MouthContour {
        self.slice(MOUTH_START)
    }

    /// Both eye contours, left first (12 points)
    pub fn eye_points(&self) -> [Point; 12] {
        self.slice(LEFT_EYE_START)
    }

    /// Midpoint of the two outer eye corners (landmarks 36 and 45)
    pub fn eye_center(&self) -> Point {
        self.points[LEFT_EYE_START].midpoint(&self.points[RIGHT_EYE_START + 3])
    }

    fn slice<const N: usize>(&self, start: usize) -> [Point; N] {
        std::array::from_fn(|i| self.points[start + i])
    }
}

impl TryFrom<Vec<Point>> for LandmarkSet {
    type Error = DmsError;

    fn try_from(points: Vec<Point>) -> Result<Self, Self::Error> {
        let count = points.len();
        let points: [Point; LANDMARK_COUNT] = points
            .try_into()
            .map_err(|_| DmsError::LandmarkCount(count))?;
        Ok(Self { points })
    }
}

/// Per-frame geometric features. `None` marks a degenerate measurement.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureFrame {
    pub ear: Option<f64>,
    pub mar: Option<f64>,
    pub timestamp: Duration,
}

/// Eye aspect ratio: mean of the two vertical gaps over twice the eye width
pub fn ear(eye: &EyeContour) -> Option<f64> {
    ratio(
        eye[1].distance(&eye[5]),
        eye[2].distance(&eye[4]),
        eye[0].distance(&eye[3]),
    )
}

/// Mouth aspect ratio: upper-to-lower lip gaps over twice the mouth width
pub fn mar(mouth: &MouthContour) -> Option<f64> {
    ratio(
        mouth[2].distance(&mouth[10]),
        mouth[4].distance(&mouth[8]),
        mouth[0].distance(&mouth[6]),
    )
}

fn ratio(a: f64, b: f64, reference: f64) -> Option<f64> {
    if !reference.is_finite() || reference < MIN_REFERENCE_DISTANCE {
        return None;
    }
    let value = (a + b) / (2.0 * reference);
    value.is_finite().then_some(value)
}

/// Compute EAR (mean over non-degenerate eyes) and MAR for one face
pub fn extract_features(landmarks: &LandmarkSet, timestamp: Duration) -> FeatureFrame {
    let eyes = [ear(&landmarks.left_eye()), ear(&landmarks.right_eye())];
    let valid: Vec<f64> = eyes.into_iter().flatten().collect();
    let ear = if valid.is_empty() {
        None
    } else {
        Some(valid.iter().sum::<f64>() / valid.len() as f64)
    };

    FeatureFrame {
        ear,
        mar: mar(&landmarks.mouth()),
        timestamp,
    }
}
