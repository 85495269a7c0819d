//! Recorded landmark traces
//!
//! A trace is JSON lines, one record per captured frame:
//!
//! ```text
//! {"timestamp_ms": 33, "faces": [{"region": {"x": 0, "y": 0, "width": 120, "height": 140, "confidence": 0.9}, "landmarks": [[x, y], ...]}]}
//! ```
//!
//! Blank lines and lines starting with `#` are skipped. A face with an empty
//! landmark list is treated as not detected.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::Duration;

use camera_capture::VideoFrame;
use dms::{DmsError, FaceObservation, FaceRegion, LandmarkProvider, LandmarkSet, Point};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum TraceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Line {line}: {source}")]
    Landmarks {
        line: usize,
        #[source]
        source: DmsError,
    },
}

/// One line of a trace file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceRecord {
    pub timestamp_ms: u64,
    #[serde(default)]
    pub faces: Vec<TraceFace>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceFace {
    pub region: FaceRegion,
    #[serde(default)]
    pub landmarks: Vec<[f64; 2]>,
}

impl TraceFace {
    fn into_observation(self) -> Result<Option<FaceObservation>, DmsError> {
        if self.landmarks.is_empty() {
            return Ok(None);
        }
        let points: Vec<Point> = self.landmarks.into_iter().map(|[x, y]| Point::new(x, y)).collect();
        Ok(Some(FaceObservation {
            region: self.region,
            landmarks: LandmarkSet::try_from(points)?,
        }))
    }
}

/// A parsed trace record
#[derive(Debug, Clone)]
pub struct TraceFrame {
    pub timestamp: Duration,
    pub faces: Vec<FaceObservation>,
}

/// Parse a whole trace
pub fn parse_trace<R: BufRead>(reader: R) -> Result<Vec<TraceFrame>, TraceError> {
    let mut frames = Vec::new();

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let number = idx + 1;
        let record: TraceRecord = serde_json::from_str(trimmed)
            .map_err(|source| TraceError::Parse { line: number, source })?;

        let mut faces = Vec::with_capacity(record.faces.len());
        for face in record.faces {
            let observation = face
                .into_observation()
                .map_err(|source| TraceError::Landmarks { line: number, source })?;
            faces.extend(observation);
        }

        frames.push(TraceFrame {
            timestamp: Duration::from_millis(record.timestamp_ms),
            faces,
        });
    }

    debug!("Parsed {} trace frames", frames.len());
    Ok(frames)
}

/// Open and parse a trace file
pub fn load_trace(path: &Path) -> Result<Vec<TraceFrame>, TraceError> {
    parse_trace(BufReader::new(File::open(path)?))
}

/// Landmark provider that answers from recorded observations, keyed by
/// frame sequence number
#[derive(Debug, Default)]
pub struct TraceProvider {
    observations: HashMap<u32, Vec<FaceObservation>>,
}

impl TraceProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, sequence: u32, faces: Vec<FaceObservation>) {
        self.observations.insert(sequence, faces);
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}

impl LandmarkProvider for TraceProvider {
    fn detect(&mut self, frame: &VideoFrame) -> Result<Vec<FaceObservation>, DmsError> {
        // Each frame is consumed once
        Ok(self.observations.remove(&frame.sequence).unwrap_or_default())
    }
}
