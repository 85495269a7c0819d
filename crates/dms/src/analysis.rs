//! DMS analysis results and verdicts

use serde::Serialize;

use crate::belief::{EyeBba, MouthBba};
use crate::detector::FaceRegion;
use crate::geometry::{FeatureFrame, Point};
use crate::state::TemporalState;

/// What pushed the verdict to drowsy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DrowsinessCause {
    /// Fused eye belief concentrated on fatigue
    EyeFatigue,
    /// Fused mouth belief concentrated on yawning
    Yawning,
    /// Closed-eye frame counter reached its trigger
    ClosedFrames,
}

/// Per-frame decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Verdict {
    pub is_drowsy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<DrowsinessCause>,
}

impl Verdict {
    pub fn alert() -> Self {
        Self::default()
    }

    pub fn drowsy(cause: DrowsinessCause) -> Self {
        Self {
            is_drowsy: true,
            cause: Some(cause),
        }
    }
}

/// Complete analysis of a frame in which a face was found
#[derive(Debug, Clone, Serialize)]
pub struct FrameAnalysis {
    /// Face the analysis was computed on
    pub face: FaceRegion,

    /// EAR / MAR for this frame
    pub features: FeatureFrame,

    /// Tracker state after this frame
    pub temporal: TemporalState,

    /// Eye belief fused on this frame; `None` in counter mode or when the
    /// eye ratio was unusable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eye_belief: Option<EyeBba>,

    /// Mouth belief fused on this frame; `None` in counter mode or when the
    /// mouth ratio was unusable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mouth_belief: Option<MouthBba>,

    /// Kalman-stabilized eye center
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eye_center: Option<Point>,

    /// Exponentially smoothed eye landmarks (left eye first)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eye_points: Option<Vec<Point>>,

    /// Raw mouth landmarks, for overlays
    #[serde(skip)]
    pub mouth_points: Vec<Point>,

    pub verdict: Verdict,
}

/// Outcome of one frame
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FrameOutcome {
    /// No usable face; no state was touched
    NoFace,
    /// Face analyzed
    Analyzed(Box<FrameAnalysis>),
}

impl FrameOutcome {
    /// Verdict, if the frame produced one
    pub fn verdict(&self) -> Option<Verdict> {
        match self {
            FrameOutcome::NoFace => None,
            FrameOutcome::Analyzed(analysis) => Some(analysis.verdict),
        }
    }

    pub fn analysis(&self) -> Option<&FrameAnalysis> {
        match self {
            FrameOutcome::NoFace => None,
            FrameOutcome::Analyzed(analysis) => Some(analysis),
        }
    }

    pub fn is_drowsy(&self) -> bool {
        self.verdict().is_some_and(|v| v.is_drowsy)
    }
}
