//! DMS configuration

use serde::{Deserialize, Serialize};

use crate::DmsError;

/// Which policy turns per-frame evidence into a verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionMode {
    /// Fused eye/mouth beliefs against the high-fatigue threshold
    #[default]
    Fusion,
    /// Consecutive closed-eye frame counter
    Counter,
}

/// DMS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DmsConfig {
    /// Decision policy
    pub mode: DecisionMode,

    /// EAR below this is the fatigue zone and closes the eye episode
    pub eye_danger_threshold: f64,

    /// EAR below this (and above danger) is the medium zone
    pub eye_warning_threshold: f64,

    /// MAR above this (and below yawn) is the speaking zone
    pub mouth_speak_threshold: f64,

    /// MAR above this is the yawning zone and opens the yawn episode
    pub mouth_yawn_threshold: f64,

    /// Closed-eye episode length that boosts fatigue belief (milliseconds)
    pub eye_closed_threshold_ms: u64,

    /// Yawn episode length that boosts yawning belief (milliseconds)
    pub yawn_threshold_ms: u64,

    /// Fused fatigue/yawning mass above which the driver is drowsy
    pub high_fatigue_threshold: f64,

    /// EAR below this counts as a closed frame in counter mode
    pub counter_ear_threshold: f64,

    /// Consecutive closed frames that trigger counter mode
    pub closed_frame_trigger: u32,

    /// Belief assigned to the occupied zone
    pub base_mass: f64,

    /// Belief assigned to the occupied zone after a long episode
    pub boosted_mass: f64,

    /// Minimum belief for unoccupied zones
    pub epsilon_mass: f64,

    /// Fused masses are clamped to at least this value. Bounds how certain
    /// the history can get against a hypothesis, and so how many contrary
    /// frames it takes to flip: about `ln(19 / floor) / ln(18)` with the
    /// default masses (19 frames, ~600 ms at 30 fps).
    pub mass_floor: f64,

    /// Kalman process noise magnitude
    pub kalman_process_noise: f64,

    /// Kalman measurement noise magnitude
    pub kalman_measurement_noise: f64,

    /// Weight of the previous value in exponential point smoothing
    pub smoothing_weight: f64,

    /// Track the eye center with the Kalman filter
    pub track_eye_center: bool,

    /// Smooth the 12 eye landmarks exponentially
    pub smooth_eye_points: bool,

    /// Face detections below this confidence are ignored
    pub min_face_confidence: f32,

    /// Frames that may wait for the processing task before new ones are dropped
    pub queue_depth: usize,

    /// Draw the diagnostic overlay for every processed frame
    pub render_overlay: bool,
}

impl Default for DmsConfig {
    fn default() -> Self {
        Self {
            mode: DecisionMode::Fusion,
            eye_danger_threshold: 0.16,
            eye_warning_threshold: 0.22,
            mouth_speak_threshold: 0.35,
            mouth_yawn_threshold: 0.6,
            eye_closed_threshold_ms: 1500,
            yawn_threshold_ms: 3000,
            high_fatigue_threshold: 0.95,
            counter_ear_threshold: 0.21,
            closed_frame_trigger: 15,
            base_mass: 0.9,
            boosted_mass: 0.98,
            epsilon_mass: 0.005,
            mass_floor: 1e-22,
            kalman_process_noise: 1e-4,
            kalman_measurement_noise: 1e-1,
            smoothing_weight: 0.7,
            track_eye_center: true,
            smooth_eye_points: true,
            min_face_confidence: 0.5,
            queue_depth: 1,
            render_overlay: false,
        }
    }
}

impl DmsConfig {
    /// Create strict config (earlier alerts)
    pub fn strict() -> Self {
        Self {
            eye_danger_threshold: 0.18,
            eye_warning_threshold: 0.24,
            eye_closed_threshold_ms: 1000,
            yawn_threshold_ms: 2000,
            high_fatigue_threshold: 0.9,
            closed_frame_trigger: 10,
            ..Default::default()
        }
    }

    /// Create lenient config (fewer false alarms)
    pub fn lenient() -> Self {
        Self {
            eye_danger_threshold: 0.14,
            eye_warning_threshold: 0.2,
            eye_closed_threshold_ms: 2500,
            yawn_threshold_ms: 4000,
            high_fatigue_threshold: 0.98,
            closed_frame_trigger: 25,
            ..Default::default()
        }
    }

    /// Check that thresholds are ordered and masses form valid beliefs
    pub fn validate(&self) -> Result<(), DmsError> {
        fn check(ok: bool, msg: &str) -> Result<(), DmsError> {
            if ok {
                Ok(())
            } else {
                Err(DmsError::InvalidConfig(msg.to_string()))
            }
        }

        check(
            self.eye_danger_threshold > 0.0
                && self.eye_danger_threshold < self.eye_warning_threshold,
            "eye thresholds must satisfy 0 < danger < warning",
        )?;
        check(
            self.mouth_speak_threshold > 0.0
                && self.mouth_speak_threshold < self.mouth_yawn_threshold,
            "mouth thresholds must satisfy 0 < speak < yawn",
        )?;
        check(
            self.epsilon_mass > 0.0
                && self.epsilon_mass < self.base_mass
                && self.base_mass <= self.boosted_mass
                && self.boosted_mass < 1.0,
            "masses must satisfy 0 < epsilon < base <= boosted < 1",
        )?;
        check(
            self.boosted_mass + 2.0 * self.epsilon_mass <= 1.0,
            "boosted mass leaves no room for epsilon masses",
        )?;
        check(
            self.mass_floor >= 0.0 && self.mass_floor < 1.0 / 3.0,
            "mass floor must lie in [0, 1/3)",
        )?;
        check(
            self.high_fatigue_threshold > 0.0 && self.high_fatigue_threshold < 1.0,
            "high fatigue threshold must lie in (0, 1)",
        )?;
        check(self.closed_frame_trigger > 0, "closed frame trigger must be positive")?;
        check(
            self.kalman_process_noise > 0.0 && self.kalman_measurement_noise > 0.0,
            "Kalman noise magnitudes must be positive",
        )?;
        check(
            (0.0..1.0).contains(&self.smoothing_weight),
            "smoothing weight must lie in [0, 1)",
        )?;
        check(self.queue_depth > 0, "queue depth must be positive")?;
        Ok(())
    }
}
