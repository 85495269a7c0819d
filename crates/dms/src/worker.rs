//! Frame processing task
//!
//! Capture pushes frames through a bounded channel into a single task that
//! owns the stream's detector. When the queue is full the incoming frame is
//! dropped instead of blocking the capture side.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use camera_capture::VideoFrame;
use image::RgbImage;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::analysis::FrameOutcome;
use crate::detector::LandmarkProvider;
use crate::overlay;
use crate::DrowsinessDetector;

/// Result of handing a frame to the worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Queued for processing
    Accepted,
    /// Worker busy and queue full; frame discarded
    Dropped,
    /// Worker has stopped
    Closed,
}

/// Latest processed frame, published for renderers
#[derive(Debug, Clone)]
pub struct FrameReport {
    pub sequence: u32,
    pub timestamp: Duration,
    pub outcome: FrameOutcome,
    pub overlay: Option<RgbImage>,
}

/// Frame counters shared between capture and worker
#[derive(Debug, Default)]
pub struct WorkerStats {
    submitted: AtomicU64,
    dropped: AtomicU64,
    processed: AtomicU64,
    no_face: AtomicU64,
    drowsy: AtomicU64,
}

impl WorkerStats {
    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn no_face(&self) -> u64 {
        self.no_face.load(Ordering::Relaxed)
    }

    pub fn drowsy(&self) -> u64 {
        self.drowsy.load(Ordering::Relaxed)
    }
}

/// Capture-side handle
#[derive(Debug, Clone)]
pub struct FrameSender {
    tx: mpsc::Sender<VideoFrame>,
    stats: Arc<WorkerStats>,
}

impl FrameSender {
    /// Queue a frame without waiting; drops it if the worker is behind
    pub fn submit(&self, frame: VideoFrame) -> SubmitOutcome {
        self.stats.submitted.fetch_add(1, Ordering::Relaxed);
        match self.tx.try_send(frame) {
            Ok(()) => SubmitOutcome::Accepted,
            Err(mpsc::error::TrySendError::Full(frame)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                metrics::counter!("dms_frames_dropped_total").increment(1);
                debug!("Worker busy, dropping frame {}", frame.sequence);
                SubmitOutcome::Dropped
            }
            Err(mpsc::error::TrySendError::Closed(_)) => SubmitOutcome::Closed,
        }
    }

    /// Queue a frame, waiting for room. For offline replay where no frame
    /// may be lost; live capture uses `submit`.
    pub async fn send(&self, frame: VideoFrame) -> SubmitOutcome {
        self.stats.submitted.fetch_add(1, Ordering::Relaxed);
        match self.tx.send(frame).await {
            Ok(()) => SubmitOutcome::Accepted,
            Err(_) => SubmitOutcome::Closed,
        }
    }

    pub fn stats(&self) -> &WorkerStats {
        &self.stats
    }

    pub fn shared_stats(&self) -> Arc<WorkerStats> {
        Arc::clone(&self.stats)
    }
}

/// Single processing task for one stream
pub struct DmsWorker {
    receiver: mpsc::Receiver<VideoFrame>,
    reports: watch::Sender<Option<FrameReport>>,
    stats: Arc<WorkerStats>,
}

impl DmsWorker {
    /// Create the capture handle and worker, with room for `queue_depth`
    /// frames waiting behind the one being processed
    pub fn channel(queue_depth: usize) -> (FrameSender, Self) {
        let (tx, receiver) = mpsc::channel(queue_depth.max(1));
        let (reports, _) = watch::channel(None);
        let stats = Arc::new(WorkerStats::default());
        (
            FrameSender {
                tx,
                stats: Arc::clone(&stats),
            },
            Self {
                receiver,
                reports,
                stats,
            },
        )
    }

    /// Receiver for the most recent report
    pub fn subscribe(&self) -> watch::Receiver<Option<FrameReport>> {
        self.reports.subscribe()
    }

    /// Process frames until every `FrameSender` is dropped. Returns the
    /// detector so its state can be inspected or reused.
    pub async fn run<P: LandmarkProvider>(
        mut self,
        mut detector: DrowsinessDetector,
        mut provider: P,
    ) -> DrowsinessDetector {
        info!("Starting DMS worker");

        while let Some(frame) = self.receiver.recv().await {
            let faces = match provider.detect(&frame) {
                Ok(faces) => faces,
                Err(e) => {
                    warn!("Landmark provider failed on frame {}: {}", frame.sequence, e);
                    Vec::new()
                }
            };

            let outcome = detector.process(frame.timestamp(), &faces);

            let overlay = match outcome.analysis() {
                Some(analysis) if detector.config().render_overlay => {
                    match overlay::annotate(&frame, analysis) {
                        Ok(img) => Some(img),
                        Err(e) => {
                            warn!("Overlay failed on frame {}: {}", frame.sequence, e);
                            None
                        }
                    }
                }
                _ => None,
            };

            self.stats.processed.fetch_add(1, Ordering::Relaxed);
            metrics::counter!("dms_frames_processed_total").increment(1);
            match outcome.verdict() {
                None => {
                    self.stats.no_face.fetch_add(1, Ordering::Relaxed);
                }
                Some(verdict) if verdict.is_drowsy => {
                    self.stats.drowsy.fetch_add(1, Ordering::Relaxed);
                    metrics::counter!("dms_drowsy_frames_total").increment(1);
                }
                Some(_) => {}
            }

            self.reports.send_replace(Some(FrameReport {
                sequence: frame.sequence,
                timestamp: frame.timestamp(),
                outcome,
                overlay,
            }));
        }

        info!(
            "DMS worker stopped (processed={}, dropped={})",
            self.stats.processed(),
            self.stats.dropped()
        );
        detector
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::{FaceObservation, FaceRegion};
    use crate::geometry::fixtures::face;
    use crate::{DecisionMode, DmsConfig, DmsError};

    fn frame(sequence: u32) -> VideoFrame {
        VideoFrame::blank(64, 48, u64::from(sequence) * 33_000_000, sequence)
    }

    fn provider(ear: f64) -> impl LandmarkProvider {
        move |_: &VideoFrame| -> Result<Vec<FaceObservation>, DmsError> {
            Ok(vec![FaceObservation {
                region: FaceRegion {
                    x: 4.0,
                    y: 4.0,
                    width: 40.0,
                    height: 40.0,
                    confidence: 0.9,
                },
                landmarks: face(ear, 0.1),
            }])
        }
    }

    #[test]
    fn test_full_queue_drops_incoming_frames() {
        let (sender, _worker) = DmsWorker::channel(1);

        assert_eq!(sender.submit(frame(0)), SubmitOutcome::Accepted);
        assert_eq!(sender.submit(frame(1)), SubmitOutcome::Dropped);
        assert_eq!(sender.submit(frame(2)), SubmitOutcome::Dropped);

        assert_eq!(sender.stats().submitted(), 3);
        assert_eq!(sender.stats().dropped(), 2);
    }

    #[test]
    fn test_submit_after_worker_gone() {
        let (sender, worker) = DmsWorker::channel(1);
        drop(worker);
        assert_eq!(sender.submit(frame(0)), SubmitOutcome::Closed);
    }

    #[tokio::test]
    async fn test_processes_frames_in_order() {
        let config = DmsConfig {
            mode: DecisionMode::Counter,
            closed_frame_trigger: 3,
            ..Default::default()
        };
        let detector = DrowsinessDetector::new(config).unwrap();
        let (sender, worker) = DmsWorker::channel(1);
        let mut reports = worker.subscribe();
        let handle = tokio::spawn(worker.run(detector, provider(0.1)));

        for seq in 0..3 {
            assert_eq!(sender.submit(frame(seq)), SubmitOutcome::Accepted);
            reports.changed().await.unwrap();
            let report = reports.borrow_and_update().clone().unwrap();
            assert_eq!(report.sequence, seq);
            assert_eq!(report.outcome.is_drowsy(), seq == 2);
            assert!(report.overlay.is_none());
        }

        assert_eq!(sender.stats().processed(), 3);
        assert_eq!(sender.stats().drowsy(), 1);

        drop(sender);
        let detector = handle.await.unwrap();
        assert_eq!(detector.temporal_state().closed_frame_counter, 3);
    }

    #[tokio::test]
    async fn test_send_waits_instead_of_dropping() {
        let detector = DrowsinessDetector::new(DmsConfig::default()).unwrap();
        let (sender, worker) = DmsWorker::channel(1);
        let handle = tokio::spawn(worker.run(detector, provider(0.3)));

        for seq in 0..20 {
            assert_eq!(sender.send(frame(seq)).await, SubmitOutcome::Accepted);
        }
        let stats = sender.shared_stats();
        drop(sender);
        handle.await.unwrap();

        assert_eq!(stats.processed(), 20);
        assert_eq!(stats.dropped(), 0);
    }

    #[tokio::test]
    async fn test_provider_error_yields_no_face() {
        let detector = DrowsinessDetector::new(DmsConfig::default()).unwrap();
        let (sender, worker) = DmsWorker::channel(1);
        let mut reports = worker.subscribe();
        let failing = |_: &VideoFrame| -> Result<Vec<FaceObservation>, DmsError> {
            Err(DmsError::Provider("model unavailable".into()))
        };
        let handle = tokio::spawn(worker.run(detector, failing));

        sender.submit(frame(0));
        reports.changed().await.unwrap();
        let report = reports.borrow().clone().unwrap();
        assert!(matches!(report.outcome, FrameOutcome::NoFace));
        assert_eq!(sender.stats().no_face(), 1);

        drop(sender);
        let detector = handle.await.unwrap();
        assert_eq!(detector.temporal_state(), &crate::TemporalState::default());
    }

    #[tokio::test]
    async fn test_overlay_rendered_when_enabled() {
        let config = DmsConfig {
            render_overlay: true,
            ..Default::default()
        };
        let detector = DrowsinessDetector::new(config).unwrap();
        let (sender, worker) = DmsWorker::channel(1);
        let mut reports = worker.subscribe();
        let handle = tokio::spawn(worker.run(detector, provider(0.3)));

        sender.submit(frame(0));
        reports.changed().await.unwrap();
        let report = reports.borrow().clone().unwrap();
        let overlay = report.overlay.expect("overlay");
        assert_eq!(overlay.dimensions(), (64, 48));

        drop(sender);
        handle.await.unwrap();
    }
}
