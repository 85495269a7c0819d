//! Layered monitor settings
//!
//! Defaults, then an optional TOML file, then `MONITOR_`-prefixed environment
//! variables. Nested keys use a double underscore, e.g.
//! `MONITOR_DMS__MODE=counter` or `MONITOR_CAMERA__FPS=15`.

use std::path::Path;

use camera_capture::CameraConfig;
use config::{Config, ConfigError, Environment, File};
use dms::DmsConfig;
use serde::{Deserialize, Serialize};

pub const ENV_PREFIX: &str = "MONITOR";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    /// Frame geometry and rate of the recorded stream
    pub camera: CameraConfig,
    pub dms: DmsConfig,
    /// Default log filter when `RUST_LOG` is unset
    pub log_level: String,
    /// Emit JSON log lines
    pub log_json: bool,
    /// Pace frames by their timestamps and drop frames when the worker is
    /// busy, as live capture would
    pub realtime: bool,
    /// Print the Prometheus rendering of pipeline counters after the summary
    pub print_metrics: bool,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            camera: CameraConfig::default(),
            dms: DmsConfig::default(),
            log_level: "info".to_string(),
            log_json: false,
            realtime: false,
            print_metrics: false,
        }
    }
}

/// Build settings from defaults, `path` (must exist when given) and the
/// environment
pub fn load_settings(path: Option<&Path>) -> Result<MonitorSettings, ConfigError> {
    load_settings_with_prefix(path, ENV_PREFIX)
}

/// `load_settings` reading environment variables under `env_prefix`
pub fn load_settings_with_prefix(
    path: Option<&Path>,
    env_prefix: &str,
) -> Result<MonitorSettings, ConfigError> {
    let mut builder = Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(File::from(path));
    }

    builder
        .add_source(
            Environment::with_prefix(env_prefix)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()
}
