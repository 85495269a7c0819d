//! Drowsiness Monitor
//!
//! Offline driver for the DMS pipeline: loads layered settings, reads a
//! recorded landmark trace and pushes it through the frame worker the same
//! way the cabin camera would.

pub mod replay;
pub mod settings;
pub mod trace;

pub use replay::{run_replay, ReplayError, ReplaySummary};
pub use settings::{load_settings, load_settings_with_prefix, MonitorSettings};
pub use trace::{load_trace, parse_trace, TraceError, TraceFrame, TraceProvider};

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Initialize logging. `RUST_LOG` wins over `level` when set.
///
/// Calling this twice is harmless; the second global subscriber is ignored.
pub fn init_logging(level: &str, json: bool) -> Result<(), TryInitError> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = Registry::default().with(env_filter);

    let result = if json {
        registry
            .with(fmt::layer().with_target(true).json())
            .try_init()
    } else {
        registry.with(fmt::layer().with_target(true)).try_init()
    };

    match result {
        Err(e) if !e.to_string().contains("already been set") => Err(e),
        _ => Ok(()),
    }
}

/// Install the global Prometheus recorder for the pipeline counters
pub fn install_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

#[cfg(test)]
mod tests {
    use super::*;
    use camera_capture::VideoFrame;
    use dms::DmsWorker;

    #[test]
    fn test_init_logging_is_idempotent() {
        init_logging("debug", false).unwrap();
        init_logging("info", true).unwrap();
    }

    #[test]
    fn test_dropped_frames_reach_prometheus() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            let (sender, _worker) = DmsWorker::channel(1);
            sender.submit(VideoFrame::blank(8, 8, 0, 0));
            sender.submit(VideoFrame::blank(8, 8, 1, 1));
        });

        assert!(handle.render().contains("dms_frames_dropped_total 1"));
    }
}
