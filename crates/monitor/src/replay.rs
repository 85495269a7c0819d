//! Trace replay through the frame worker

use std::time::Duration;

use camera_capture::VideoFrame;
use dms::{DecisionMode, DmsError, DmsWorker, DrowsinessDetector, SubmitOutcome, TemporalState};
use serde::Serialize;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::settings::MonitorSettings;
use crate::trace::{TraceFrame, TraceProvider};

#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("Detector error: {0}")]
    Detector(#[from] DmsError),

    #[error("Worker task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),

    #[error("Worker stopped after {0} frames")]
    Closed(u64),
}

/// Counts collected over one replay
#[derive(Debug, Clone, Serialize)]
pub struct ReplaySummary {
    pub mode: DecisionMode,
    pub frames: u64,
    pub processed: u64,
    pub dropped: u64,
    pub no_face_frames: u64,
    pub drowsy_frames: u64,
    pub final_state: TemporalState,
}

/// Feed every trace frame to a fresh detector and wait for the worker to
/// drain.
///
/// In realtime mode frames are paced by their timestamps and submitted
/// without waiting, so a slow worker drops frames. Otherwise every frame is
/// processed.
pub async fn run_replay(
    settings: &MonitorSettings,
    frames: Vec<TraceFrame>,
) -> Result<ReplaySummary, ReplayError> {
    let detector = DrowsinessDetector::new(settings.dms.clone())?;
    let (sender, worker) = DmsWorker::channel(settings.dms.queue_depth);

    let mut provider = TraceProvider::new();
    let mut timestamps = Vec::with_capacity(frames.len());
    for (sequence, frame) in (0u32..).zip(frames) {
        provider.insert(sequence, frame.faces);
        timestamps.push(frame.timestamp);
    }

    info!(
        "Replaying {} frames ({:?} mode, realtime={})",
        timestamps.len(),
        settings.dms.mode,
        settings.realtime
    );

    let handle = tokio::spawn(worker.run(detector, provider));
    let stats = sender.shared_stats();
    let start = Instant::now();
    let (width, height) = (settings.camera.width, settings.camera.height);

    for (sequence, timestamp) in (0u32..).zip(timestamps.iter().copied()) {
        let frame = VideoFrame::blank(width, height, duration_ns(timestamp), sequence);

        let outcome = if settings.realtime {
            tokio::time::sleep_until(start + timestamp).await;
            sender.submit(frame)
        } else {
            sender.send(frame).await
        };

        if outcome == SubmitOutcome::Closed {
            warn!("Worker stopped early at frame {}", sequence);
            return Err(ReplayError::Closed(stats.processed()));
        }
    }

    drop(sender);
    let detector = handle.await?;

    let summary = ReplaySummary {
        mode: settings.dms.mode,
        frames: timestamps.len() as u64,
        processed: stats.processed(),
        dropped: stats.dropped(),
        no_face_frames: stats.no_face(),
        drowsy_frames: stats.drowsy(),
        final_state: detector.temporal_state().clone(),
    };

    info!(
        "Replay finished: processed={} dropped={} drowsy={}",
        summary.processed, summary.dropped, summary.drowsy_frames
    );
    Ok(summary)
}

fn duration_ns(timestamp: Duration) -> u64 {
    u64::try_from(timestamp.as_nanos()).unwrap_or(u64::MAX)
}
