//! Engine and platform configuration.
//!
//! Values come from layered `.env` files and `ORBITA_*` process variables
//! (process variables win). Every field has a default, so an empty
//! environment yields a working [`EngineConfig`].

use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::acquisition::Sensor;

const ENV_PREFIX: &str = "ORBITA_";

/// Tunables of the analysis pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Root export folder; jobs write to `{output_base}/{job_id}/...`
    #[serde(default = "default_output_base")]
    pub output_base: String,
    /// Scene-level cloud cover limit, percent
    #[serde(default = "default_cloud_threshold_pct")]
    pub cloud_threshold_pct: f64,
    /// Analysis pixel size in meters
    #[serde(default = "default_scale_m")]
    pub scale_m: f64,
    #[serde(default = "default_max_pixels")]
    pub max_pixels: u64,
    /// Years of imagery fetched before `start` for the temporal context
    #[serde(default = "default_history_years")]
    pub history_years: u32,
    #[serde(default = "default_seasonal_window_days")]
    pub seasonal_window_days: u32,
    #[serde(default = "default_seasonal_min_samples")]
    pub seasonal_min_samples: usize,
    #[serde(default = "default_seasonal_min_std")]
    pub seasonal_min_std: f64,
    /// NDVI below this counts as stressed
    #[serde(default = "default_stress_threshold")]
    pub stress_threshold: f64,
    #[serde(default = "default_vra_clusters")]
    pub vra_clusters: usize,
    #[serde(default = "default_vra_sample_size")]
    pub vra_sample_size: usize,
    #[serde(default = "default_vra_seed")]
    pub vra_seed: u64,
    /// Composite pixels with fewer valid scenes are masked
    #[serde(default = "default_min_observations")]
    pub min_observations: usize,
    #[serde(default = "default_sensors")]
    pub sensors: Vec<Sensor>,
    /// Where job manifests are persisted as JSON, if anywhere
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest_dir: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            output_base: default_output_base(),
            cloud_threshold_pct: default_cloud_threshold_pct(),
            scale_m: default_scale_m(),
            max_pixels: default_max_pixels(),
            history_years: default_history_years(),
            seasonal_window_days: default_seasonal_window_days(),
            seasonal_min_samples: default_seasonal_min_samples(),
            seasonal_min_std: default_seasonal_min_std(),
            stress_threshold: default_stress_threshold(),
            vra_clusters: default_vra_clusters(),
            vra_sample_size: default_vra_sample_size(),
            vra_seed: default_vra_seed(),
            min_observations: default_min_observations(),
            sensors: default_sensors(),
            manifest_dir: None,
        }
    }
}

impl EngineConfig {
    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let output_base = self.output_base.trim_matches('/');
        if output_base.is_empty() {
            return Err(ConfigError::invalid("OUTPUT_BASE", &self.output_base, "must not be empty"));
        }
        if !(0.0..=100.0).contains(&self.cloud_threshold_pct) {
            return Err(ConfigError::invalid(
                "CLOUD_THRESHOLD_PCT",
                self.cloud_threshold_pct,
                "must be between 0 and 100",
            ));
        }
        if !(self.scale_m > 0.0) || !self.scale_m.is_finite() {
            return Err(ConfigError::invalid("SCALE_M", self.scale_m, "must be positive"));
        }
        if self.max_pixels == 0 {
            return Err(ConfigError::invalid("MAX_PIXELS", self.max_pixels, "must be positive"));
        }
        if self.seasonal_window_days > 183 {
            return Err(ConfigError::invalid(
                "SEASONAL_WINDOW_DAYS",
                self.seasonal_window_days,
                "must be at most 183",
            ));
        }
        if !(-1.0..=1.0).contains(&self.stress_threshold) {
            return Err(ConfigError::invalid(
                "STRESS_THRESHOLD",
                self.stress_threshold,
                "must be an NDVI value in [-1, 1]",
            ));
        }
        if self.vra_clusters < 2 {
            return Err(ConfigError::invalid("VRA_CLUSTERS", self.vra_clusters, "must be at least 2"));
        }
        // zone ids are exported as bytes, 0 is nodata
        if self.vra_clusters > MAX_VRA_CLUSTERS {
            return Err(ConfigError::invalid("VRA_CLUSTERS", self.vra_clusters, "must be at most 255"));
        }
        if self.vra_sample_size < self.vra_clusters {
            return Err(ConfigError::invalid(
                "VRA_SAMPLE_SIZE",
                self.vra_sample_size,
                "must be at least the number of clusters",
            ));
        }
        if self.min_observations == 0 {
            return Err(ConfigError::invalid("MIN_OBSERVATIONS", 0, "must be at least 1"));
        }
        if self.sensors.is_empty() {
            return Err(ConfigError::invalid("SENSORS", "", "at least one sensor is required"));
        }
        Ok(())
    }
}

/// How to reach the compute platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// Gateway base URL; `None` selects the in-memory platform
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing)]
    pub token: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            token: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Everything [`ConfigLoader::load`] produces.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrbitaConfig {
    pub engine: EngineConfig,
    pub platform: PlatformConfig,
}

fn default_output_base() -> String {
    "Orbita_Output".to_string()
}

fn default_cloud_threshold_pct() -> f64 {
    20.0
}

fn default_scale_m() -> f64 {
    10.0
}

fn default_max_pixels() -> u64 {
    1_000_000_000
}

fn default_history_years() -> u32 {
    3
}

fn default_seasonal_window_days() -> u32 {
    21
}

fn default_seasonal_min_samples() -> usize {
    3
}

fn default_seasonal_min_std() -> f64 {
    0.001
}

fn default_stress_threshold() -> f64 {
    0.35
}

/// Largest zone count that fits the byte zone raster
pub const MAX_VRA_CLUSTERS: usize = u8::MAX as usize;

fn default_vra_clusters() -> usize {
    3
}

fn default_vra_sample_size() -> usize {
    5000
}

fn default_vra_seed() -> u64 {
    42
}

fn default_min_observations() -> usize {
    1
}

fn default_sensors() -> Vec<Sensor> {
    Sensor::ALL.to_vec()
}

fn default_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load environment file {path}: {source}")]
    EnvFile {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },
    #[error("invalid value '{value}' for ORBITA_{key}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    fn invalid(key: &'static str, value: impl ToString, reason: &str) -> Self {
        ConfigError::InvalidValue {
            key,
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Loads configuration from `.env`, `.env.local` and `ORBITA_*` variables.
pub struct ConfigLoader {
    base_dir: PathBuf,
    process_env: bool,
}

impl ConfigLoader {
    /// Loader rooted at the current working directory.
    pub fn new() -> Self {
        Self {
            base_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            process_env: true,
        }
    }

    /// Loader rooted at `base_dir` (useful for tests).
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self {
            base_dir,
            process_env: true,
        }
    }

    /// Ignore process variables; only the `.env` files count.
    pub fn without_process_env(mut self) -> Self {
        self.process_env = false;
        self
    }

    pub fn load(&self) -> Result<OrbitaConfig, ConfigError> {
        let mut layered = BTreeMap::new();
        self.merge_dotenv(self.base_dir.join(".env"), &mut layered)?;
        self.merge_dotenv(self.base_dir.join(".env.local"), &mut layered)?;

        if self.process_env {
            for (key, value) in env::vars() {
                if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                    layered.insert(stripped.to_string(), value);
                }
            }
        }

        let defaults = EngineConfig::default();
        let engine = EngineConfig {
            output_base: take_string(&mut layered, "OUTPUT_BASE").unwrap_or(defaults.output_base),
            cloud_threshold_pct: take_parsed(&mut layered, "CLOUD_THRESHOLD_PCT")?
                .unwrap_or(defaults.cloud_threshold_pct),
            scale_m: take_parsed(&mut layered, "SCALE_M")?.unwrap_or(defaults.scale_m),
            max_pixels: take_parsed(&mut layered, "MAX_PIXELS")?.unwrap_or(defaults.max_pixels),
            history_years: take_parsed(&mut layered, "HISTORY_YEARS")?
                .unwrap_or(defaults.history_years),
            seasonal_window_days: take_parsed(&mut layered, "SEASONAL_WINDOW_DAYS")?
                .unwrap_or(defaults.seasonal_window_days),
            seasonal_min_samples: take_parsed(&mut layered, "SEASONAL_MIN_SAMPLES")?
                .unwrap_or(defaults.seasonal_min_samples),
            seasonal_min_std: take_parsed(&mut layered, "SEASONAL_MIN_STD")?
                .unwrap_or(defaults.seasonal_min_std),
            stress_threshold: take_parsed(&mut layered, "STRESS_THRESHOLD")?
                .unwrap_or(defaults.stress_threshold),
            vra_clusters: take_parsed(&mut layered, "VRA_CLUSTERS")?
                .unwrap_or(defaults.vra_clusters),
            vra_sample_size: take_parsed(&mut layered, "VRA_SAMPLE_SIZE")?
                .unwrap_or(defaults.vra_sample_size),
            vra_seed: take_parsed(&mut layered, "VRA_SEED")?.unwrap_or(defaults.vra_seed),
            min_observations: take_parsed(&mut layered, "MIN_OBSERVATIONS")?
                .unwrap_or(defaults.min_observations),
            sensors: match take_string(&mut layered, "SENSORS") {
                Some(list) => list
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(|s| {
                        s.parse::<Sensor>()
                            .map_err(|reason| ConfigError::invalid("SENSORS", s, &reason))
                    })
                    .collect::<Result<Vec<_>, _>>()?,
                None => defaults.sensors,
            },
            manifest_dir: take_string(&mut layered, "MANIFEST_DIR").map(PathBuf::from),
        };
        engine.validate()?;

        let platform = PlatformConfig {
            base_url: take_string(&mut layered, "PLATFORM_URL"),
            token: take_string(&mut layered, "PLATFORM_TOKEN"),
            timeout_secs: take_parsed(&mut layered, "PLATFORM_TIMEOUT_SECS")?
                .unwrap_or_else(default_timeout_secs),
        };

        Ok(OrbitaConfig { engine, platform })
    }

    fn merge_dotenv(
        &self,
        path: PathBuf,
        values: &mut BTreeMap<String, String>,
    ) -> Result<(), ConfigError> {
        match dotenvy::from_path_iter(&path) {
            Ok(iter) => {
                for item in iter {
                    let (key, value) = item.map_err(|source| ConfigError::EnvFile {
                        path: path.clone(),
                        source,
                    })?;
                    if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                        values.insert(stripped.to_string(), value);
                    }
                }
                Ok(())
            }
            Err(dotenvy::Error::Io(ref io_err)) if io_err.kind() == std::io::ErrorKind::NotFound => {
                Ok(())
            }
            Err(err) => Err(ConfigError::EnvFile { path, source: err }),
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn take_string(values: &mut BTreeMap<String, String>, key: &str) -> Option<String> {
    values
        .remove(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn take_parsed<T: FromStr>(
    values: &mut BTreeMap<String, String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    match take_string(values, key) {
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::invalid(key, raw, "not a valid number")),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn defaults_are_valid() {
        let config = EngineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.output_base, "Orbita_Output");
        assert_eq!(config.vra_clusters, 3);
        assert_eq!(config.sensors.len(), 3);
    }

    #[test]
    fn empty_directory_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = ConfigLoader::with_base_dir(dir.path().to_path_buf())
            .without_process_env()
            .load()
            .unwrap();
        assert_eq!(loaded, OrbitaConfig::default());
    }

    #[test]
    fn dotenv_layers_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(".env"),
            "ORBITA_STRESS_THRESHOLD=0.4\nORBITA_SENSORS=sentinel2\nOTHER=ignored\n",
        )
        .unwrap();
        fs::write(
            dir.path().join(".env.local"),
            "ORBITA_STRESS_THRESHOLD=0.3\nORBITA_PLATFORM_URL=https://gw.example.com\n",
        )
        .unwrap();

        let loaded = ConfigLoader::with_base_dir(dir.path().to_path_buf())
            .without_process_env()
            .load()
            .unwrap();
        assert_eq!(loaded.engine.stress_threshold, 0.3);
        assert_eq!(loaded.engine.sensors, vec![Sensor::Sentinel2]);
        assert_eq!(loaded.platform.base_url.as_deref(), Some("https://gw.example.com"));
    }

    #[test]
    fn bad_values_are_reported_with_their_key() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".env"), "ORBITA_VRA_CLUSTERS=three\n").unwrap();
        let err = ConfigLoader::with_base_dir(dir.path().to_path_buf())
            .without_process_env()
            .load()
            .unwrap_err();
        assert!(err.to_string().contains("ORBITA_VRA_CLUSTERS"), "{err}");

        fs::write(dir.path().join(".env"), "ORBITA_CLOUD_THRESHOLD_PCT=140\n").unwrap();
        let err = ConfigLoader::with_base_dir(dir.path().to_path_buf())
            .without_process_env()
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "CLOUD_THRESHOLD_PCT", .. }));
    }

    #[test]
    fn cluster_count_must_fit_a_byte() {
        let at_limit = EngineConfig {
            vra_clusters: MAX_VRA_CLUSTERS,
            vra_sample_size: 5000,
            ..EngineConfig::default()
        };
        at_limit.validate().unwrap();

        let over = EngineConfig {
            vra_clusters: 256,
            vra_sample_size: 5000,
            ..EngineConfig::default()
        };
        assert!(matches!(
            over.validate(),
            Err(ConfigError::InvalidValue { key: "VRA_CLUSTERS", .. })
        ));
    }

    #[test]
    fn token_is_never_serialized() {
        let platform = PlatformConfig {
            base_url: Some("https://gw.example.com".into()),
            token: Some("secret".into()),
            timeout_secs: 30,
        };
        let json = serde_json::to_string(&platform).unwrap();
        assert!(!json.contains("secret"));
    }
}
