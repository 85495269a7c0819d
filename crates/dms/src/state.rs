//! Driver state tracking

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Per-stream temporal state, mutated once per analyzed frame
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemporalState {
    /// Eyes currently closed (EAR below the danger threshold)
    pub eye_closed: bool,

    /// Start of the current closed-eye episode
    pub eye_close_start: Option<Duration>,

    /// Length of the last completed closed-eye episode
    pub eye_closed_duration: Duration,

    /// Mouth currently in a yawn (MAR above the yawn threshold)
    pub yawning: bool,

    /// Start of the current yawn
    pub yawn_start: Option<Duration>,

    /// Length of the last completed yawn
    pub yawn_duration: Duration,

    /// Consecutive frames with EAR below the counter threshold
    pub closed_frame_counter: u32,
}

impl TemporalState {
    /// Reset state (on driver change)
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
