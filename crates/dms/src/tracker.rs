//! Open/closed episode tracking for eyes and mouth

use std::time::Duration;

use tracing::debug;

use crate::geometry::FeatureFrame;
use crate::state::TemporalState;
use crate::DmsConfig;

/// Episode transitions observed on one frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackerEvents {
    pub eye_closed: bool,
    /// Length of the closed-eye episode that just ended
    pub eye_reopened: Option<Duration>,
    pub yawn_started: bool,
    /// Length of the yawn that just ended
    pub yawn_ended: Option<Duration>,
}

/// Thresholds the tracker needs, copied out of `DmsConfig`
#[derive(Debug, Clone, Copy)]
struct Thresholds {
    eye_danger: f64,
    mouth_yawn: f64,
    counter_ear: f64,
}

/// Eye, mouth and closed-frame tracking for one stream
#[derive(Debug, Clone)]
pub struct TemporalTracker {
    thresholds: Thresholds,
    state: TemporalState,
}

impl TemporalTracker {
    pub fn new(config: &DmsConfig) -> Self {
        Self {
            thresholds: Thresholds {
                eye_danger: config.eye_danger_threshold,
                mouth_yawn: config.mouth_yawn_threshold,
                counter_ear: config.counter_ear_threshold,
            },
            state: TemporalState::default(),
        }
    }

    pub fn state(&self) -> &TemporalState {
        &self.state
    }

    /// Advance all state machines by one frame. A `None` ratio leaves the
    /// corresponding machine untouched.
    pub fn update(&mut self, features: &FeatureFrame) -> TrackerEvents {
        let now = features.timestamp;
        let mut events = TrackerEvents::default();
        let state = &mut self.state;

        if let Some(ear) = features.ear {
            if ear < self.thresholds.eye_danger {
                if !state.eye_closed {
                    state.eye_closed = true;
                    state.eye_close_start = Some(now);
                    events.eye_closed = true;
                    debug!("Eyes closed at {:?} (ear={:.3})", now, ear);
                }
            } else if state.eye_closed {
                state.eye_closed = false;
                let start = state.eye_close_start.take().unwrap_or(now);
                state.eye_closed_duration = now.saturating_sub(start);
                events.eye_reopened = Some(state.eye_closed_duration);
                debug!("Eyes reopened after {:?}", state.eye_closed_duration);
            }

            if ear < self.thresholds.counter_ear {
                state.closed_frame_counter = state.closed_frame_counter.saturating_add(1);
            } else {
                state.closed_frame_counter = 0;
            }
        }

        if let Some(mar) = features.mar {
            if mar > self.thresholds.mouth_yawn {
                if !state.yawning {
                    state.yawning = true;
                    state.yawn_start = Some(now);
                    events.yawn_started = true;
                    debug!("Yawn started at {:?} (mar={:.3})", now, mar);
                }
            } else if state.yawning {
                state.yawning = false;
                let start = state.yawn_start.take().unwrap_or(now);
                state.yawn_duration = now.saturating_sub(start);
                events.yawn_ended = Some(state.yawn_duration);
                debug!("Yawn ended after {:?}", state.yawn_duration);
            }
        }

        events
    }

    pub fn reset(&mut self) {
        self.state.reset();
    }
}
