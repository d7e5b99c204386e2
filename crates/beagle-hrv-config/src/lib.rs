//! Layered configuration for the HRV signal pipeline.
//!
//! Resolution order is env-var-first, then an optional TOML file, then
//! hardcoded defaults — the same order `beagle_config::beagle_data_dir`
//! uses for locating the data directory.

use std::path::{Path, PathBuf};

use anyhow::Context;
use beagle_hrv_signal::PipelineConfig;
use serde::Deserialize;

const ENV_W_RR: &str = "BEAGLE_HRV_W_RR";
const ENV_W_PHASE: &str = "BEAGLE_HRV_W_PHASE";
const ENV_SOFTMAX_TEMPERATURE: &str = "BEAGLE_HRV_SOFTMAX_TEMPERATURE";
const ENV_COHERENCE_LAG: &str = "BEAGLE_HRV_COHERENCE_LAG";
const ENV_RUPTURE_WINDOW: &str = "BEAGLE_HRV_RUPTURE_WINDOW";
const ENV_SCHEMA_VERSION: &str = "BEAGLE_HRV_SCHEMA_VERSION";
const ENV_CONFIG_PATH: &str = "BEAGLE_HRV_CONFIG_PATH";

const DEFAULT_CONFIG_FILE: &str = "beagle-hrv.toml";

/// Partial configuration as read from a TOML file; every field optional so
/// a file can override only the settings it cares about.
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    w_rr: Option<usize>,
    w_phase: Option<usize>,
    softmax_temperature: Option<f64>,
    coherence_lag: Option<usize>,
    rupture_window: Option<usize>,
    schema_version: Option<String>,
}

/// The config file path: `BEAGLE_HRV_CONFIG_PATH` if set, else
/// `./beagle-hrv.toml` if it exists, else none.
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(ENV_CONFIG_PATH) {
        return Some(PathBuf::from(path));
    }
    let default_path = Path::new(DEFAULT_CONFIG_FILE);
    if default_path.exists() {
        Some(default_path.to_path_buf())
    } else {
        None
    }
}

fn load_file_config() -> anyhow::Result<FileConfig> {
    match config_file_path() {
        None => Ok(FileConfig::default()),
        Some(path) => {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("reading HRV pipeline config file at {}", path.display()))?;
            toml::from_str(&contents).with_context(|| format!("parsing HRV pipeline config file at {}", path.display()))
        }
    }
}

fn env_parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse::<T>().ok())
}

/// Resolve the effective `PipelineConfig`: defaults, overlaid by an
/// optional TOML file, overlaid by environment variables.
pub fn load() -> anyhow::Result<PipelineConfig> {
    let defaults = PipelineConfig::default();
    let file = load_file_config()?;

    let mut resolved = PipelineConfig {
        w_rr: file.w_rr.unwrap_or(defaults.w_rr),
        w_phase: file.w_phase.unwrap_or(defaults.w_phase),
        softmax_temperature: file.softmax_temperature.unwrap_or(defaults.softmax_temperature),
        coherence_lag: file.coherence_lag.unwrap_or(defaults.coherence_lag),
        rupture_window: file.rupture_window.unwrap_or(defaults.rupture_window),
        schema_version: file.schema_version.unwrap_or(defaults.schema_version),
    };

    if let Some(v) = env_parsed::<usize>(ENV_W_RR) {
        resolved.w_rr = v;
    }
    if let Some(v) = env_parsed::<usize>(ENV_W_PHASE) {
        resolved.w_phase = v;
    }
    if let Some(v) = env_parsed::<f64>(ENV_SOFTMAX_TEMPERATURE) {
        resolved.softmax_temperature = v;
    }
    if let Some(v) = env_parsed::<usize>(ENV_COHERENCE_LAG) {
        resolved.coherence_lag = v;
    }
    if let Some(v) = env_parsed::<usize>(ENV_RUPTURE_WINDOW) {
        resolved.rupture_window = v;
    }
    if let Ok(v) = std::env::var(ENV_SCHEMA_VERSION) {
        resolved.schema_version = v;
    }

    tracing::debug!(
        w_rr = resolved.w_rr,
        w_phase = resolved.w_phase,
        softmax_temperature = resolved.softmax_temperature,
        coherence_lag = resolved.coherence_lag,
        rupture_window = resolved.rupture_window,
        schema_version = %resolved.schema_version,
        "resolved HRV pipeline configuration"
    );

    Ok(resolved)
}
