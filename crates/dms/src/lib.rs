//! Driver Monitoring System (DMS)
//!
//! Drowsiness estimation from facial landmarks:
//! - Eye / mouth aspect ratios
//! - Closed-eye and yawn episode tracking
//! - Landmark stabilization (Kalman, exponential)
//! - Belief fusion over time
//! - Fusion- or counter-based alert decision

pub mod analysis;
pub mod belief;
pub mod config;
pub mod detector;
pub mod geometry;
pub mod overlay;
pub mod policy;
pub mod stabilizer;
pub mod state;
pub mod tracker;
pub mod worker;

pub use analysis::{DrowsinessCause, FrameAnalysis, FrameOutcome, Verdict};
pub use belief::{EyeBba, EyeHypothesis, FusionHistory, MouthBba, MouthHypothesis};
pub use config::{DecisionMode, DmsConfig};
pub use detector::{FaceObservation, FaceRegion, LandmarkProvider};
pub use geometry::{FeatureFrame, LandmarkSet, Point};
pub use state::TemporalState;
pub use worker::{DmsWorker, FrameReport, FrameSender, SubmitOutcome};

use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use belief::{FusionEngine, MassModel};
use policy::DecisionPolicy;
use stabilizer::{EyeCenterStabilizer, PointSmoother};
use tracker::TemporalTracker;

/// DMS error types
#[derive(Error, Debug)]
pub enum DmsError {
    #[error("Configuration error: {0}")]
    InvalidConfig(String),

    #[error("Expected 68 landmarks, got {0}")]
    LandmarkCount(usize),

    #[error("Landmark provider failed: {0}")]
    Provider(String),

    #[error("Overlay rendering failed: {0}")]
    Overlay(String),
}

/// Drowsiness detector for one video stream.
///
/// Holds all per-stream state; frames must be fed strictly in order.
pub struct DrowsinessDetector {
    config: DmsConfig,
    tracker: TemporalTracker,
    eye_center: EyeCenterStabilizer,
    eye_smoother: PointSmoother<12>,
    masses: MassModel,
    fusion: FusionEngine,
    policy: DecisionPolicy,
    drowsy: bool,
}

impl DrowsinessDetector {
    /// Create a detector with a validated configuration
    pub fn new(config: DmsConfig) -> Result<Self, DmsError> {
        config.validate()?;
        info!(
            "Creating drowsiness detector (mode={:?}, danger={}, yawn={})",
            config.mode, config.eye_danger_threshold, config.mouth_yawn_threshold
        );
        Ok(Self {
            tracker: TemporalTracker::new(&config),
            eye_center: EyeCenterStabilizer::new(
                config.kalman_process_noise,
                config.kalman_measurement_noise,
            ),
            eye_smoother: PointSmoother::new(config.smoothing_weight),
            masses: MassModel::from_config(&config),
            fusion: FusionEngine::new(config.mass_floor),
            policy: DecisionPolicy::from_config(&config),
            drowsy: false,
            config,
        })
    }

    pub fn config(&self) -> &DmsConfig {
        &self.config
    }

    pub fn temporal_state(&self) -> &TemporalState {
        self.tracker.state()
    }

    pub fn fusion_history(&self) -> &FusionHistory {
        self.fusion.history()
    }

    /// Analyze one frame's face observations.
    ///
    /// Without a usable face nothing is updated and `NoFace` is returned.
    pub fn process(&mut self, timestamp: Duration, faces: &[FaceObservation]) -> FrameOutcome {
        let Some(face) = detector::select_face(faces, self.config.min_face_confidence) else {
            debug!("No face at {:?} ({} candidates)", timestamp, faces.len());
            return FrameOutcome::NoFace;
        };

        let features = geometry::extract_features(&face.landmarks, timestamp);
        if features.ear.is_none() {
            warn!("Degenerate eye geometry at {:?}, skipping eye update", timestamp);
        }
        self.tracker.update(&features);

        let eye_center = self
            .config
            .track_eye_center
            .then(|| self.eye_center.update(face.landmarks.eye_center()));
        let eye_points = self
            .config
            .smooth_eye_points
            .then(|| self.eye_smoother.update(&face.landmarks.eye_points()).to_vec());

        let (eye_belief, mouth_belief) = match self.policy.mode() {
            DecisionMode::Fusion => self.fuse(&features),
            DecisionMode::Counter => (None, None),
        };

        let verdict = self.policy.decide(self.fusion.history(), self.tracker.state());
        self.log_transition(verdict, timestamp);

        debug!(
            "Frame {:?}: ear={:?} mar={:?} drowsy={}",
            timestamp, features.ear, features.mar, verdict.is_drowsy
        );

        FrameOutcome::Analyzed(Box::new(FrameAnalysis {
            face: face.region,
            features,
            temporal: self.tracker.state().clone(),
            eye_belief,
            mouth_belief,
            eye_center,
            eye_points,
            mouth_points: face.landmarks.mouth().to_vec(),
            verdict,
        }))
    }

    fn fuse(&mut self, features: &FeatureFrame) -> (Option<EyeBba>, Option<MouthBba>) {
        let state = self.tracker.state();
        let eye = features
            .ear
            .map(|ear| self.masses.eye_bba(ear, state.eye_closed_duration));
        let mouth = features
            .mar
            .map(|mar| self.masses.mouth_bba(mar, state.yawn_duration));

        // A channel skipped this frame reports no belief
        (
            eye.map(|bba| self.fusion.fuse_eye(bba)),
            mouth.map(|bba| self.fusion.fuse_mouth(bba)),
        )
    }

    fn log_transition(&mut self, verdict: Verdict, timestamp: Duration) {
        if verdict.is_drowsy == self.drowsy {
            return;
        }
        self.drowsy = verdict.is_drowsy;
        if verdict.is_drowsy {
            warn!("Drowsiness detected at {:?} ({:?})", timestamp, verdict.cause);
        } else {
            info!("Driver alert again at {:?}", timestamp);
        }
    }

    /// Reset driver state (on driver change)
    pub fn reset_state(&mut self) {
        self.tracker.reset();
        self.eye_center.reset();
        self.eye_smoother.reset();
        self.fusion.reset();
        self.drowsy = false;
        info!("Drowsiness detector state reset");
    }
}
