//! Alert decision policies

use crate::analysis::{DrowsinessCause, Verdict};
use crate::belief::{EyeHypothesis, FusionHistory, MouthHypothesis};
use crate::state::TemporalState;
use crate::{DecisionMode, DmsConfig};

/// Mutually exclusive verdict strategies
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DecisionPolicy {
    /// Drowsy when fused fatigue or yawning mass exceeds the threshold
    Fusion { high_fatigue_threshold: f64 },
    /// Drowsy when the closed-frame counter reaches the trigger
    Counter { closed_frame_trigger: u32 },
}

impl DecisionPolicy {
    pub fn from_config(config: &DmsConfig) -> Self {
        match config.mode {
            DecisionMode::Fusion => DecisionPolicy::Fusion {
                high_fatigue_threshold: config.high_fatigue_threshold,
            },
            DecisionMode::Counter => DecisionPolicy::Counter {
                closed_frame_trigger: config.closed_frame_trigger,
            },
        }
    }

    pub fn mode(&self) -> DecisionMode {
        match self {
            DecisionPolicy::Fusion { .. } => DecisionMode::Fusion,
            DecisionPolicy::Counter { .. } => DecisionMode::Counter,
        }
    }

    /// Verdict from the fused history (fusion) or tracker state (counter)
    pub fn decide(&self, fused: &FusionHistory, state: &TemporalState) -> Verdict {
        match *self {
            DecisionPolicy::Fusion {
                high_fatigue_threshold,
            } => {
                let fatigue = fused.eye.map_or(0.0, |b| b.mass(EyeHypothesis::Fatigue));
                let yawning = fused.mouth.map_or(0.0, |b| b.mass(MouthHypothesis::Yawning));
                if fatigue > high_fatigue_threshold {
                    Verdict::drowsy(DrowsinessCause::EyeFatigue)
                } else if yawning > high_fatigue_threshold {
                    Verdict::drowsy(DrowsinessCause::Yawning)
                } else {
                    Verdict::alert()
                }
            }
            DecisionPolicy::Counter {
                closed_frame_trigger,
            } => {
                if state.closed_frame_counter >= closed_frame_trigger {
                    Verdict::drowsy(DrowsinessCause::ClosedFrames)
                } else {
                    Verdict::alert()
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::belief::{EyeBba, MouthBba};

    fn fusion() -> DecisionPolicy {
        DecisionPolicy::from_config(&DmsConfig::default())
    }

    #[test]
    fn test_fusion_eye_channel() {
        let history = FusionHistory {
            eye: EyeBba::from_masses([0.01, 0.01, 0.98]),
            mouth: Some(MouthBba::uniform()),
        };
        let verdict = fusion().decide(&history, &TemporalState::default());
        assert!(verdict.is_drowsy);
        assert_eq!(verdict.cause, Some(DrowsinessCause::EyeFatigue));
    }

    #[test]
    fn test_fusion_mouth_channel_is_ored() {
        let history = FusionHistory {
            eye: EyeBba::from_masses([0.98, 0.01, 0.01]),
            mouth: MouthBba::from_masses([0.01, 0.01, 0.98]),
        };
        let verdict = fusion().decide(&history, &TemporalState::default());
        assert_eq!(verdict.cause, Some(DrowsinessCause::Yawning));
    }

    #[test]
    fn test_fusion_ignores_counter() {
        let state = TemporalState {
            closed_frame_counter: 100,
            ..Default::default()
        };
        let verdict = fusion().decide(&FusionHistory::default(), &state);
        assert!(!verdict.is_drowsy);
    }

    #[test]
    fn test_counter_fires_at_trigger() {
        let policy = DecisionPolicy::Counter {
            closed_frame_trigger: 15,
        };
        let history = FusionHistory {
            eye: EyeBba::from_masses([0.0, 0.0, 1.0]),
            mouth: None,
        };

        let below = TemporalState {
            closed_frame_counter: 14,
            ..Default::default()
        };
        assert!(!policy.decide(&history, &below).is_drowsy);

        let at = TemporalState {
            closed_frame_counter: 15,
            ..Default::default()
        };
        let verdict = policy.decide(&history, &at);
        assert!(verdict.is_drowsy);
        assert_eq!(verdict.cause, Some(DrowsinessCause::ClosedFrames));
    }

    #[test]
    fn test_mode_round_trip() {
        let config = DmsConfig {
            mode: DecisionMode::Counter,
            ..Default::default()
        };
        assert_eq!(DecisionPolicy::from_config(&config).mode(), DecisionMode::Counter);
        assert_eq!(fusion().mode(), DecisionMode::Fusion);
    }
}
