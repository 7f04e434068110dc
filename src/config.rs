// Runtime configuration
// Defaults mirror the constants of the analysis; a TOML file may override any field

use crate::spectral::QTransformSettings;
use crate::strain::{CacheError, StrainCache};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config value: {0}")]
    Invalid(String),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Root for plots, comparisons and the trace file
    pub output_dir: PathBuf,

    pub audio_dir: PathBuf,

    /// Open-data archive base URL
    pub archive_url: String,

    pub timeout_secs: u64,

    /// Reuse previously downloaded strain files
    pub use_cache: bool,

    /// Download cache location; the platform cache directory when absent
    pub cache_dir: Option<PathBuf>,

    pub qtransform: QTransformSettings,

    /// Half-width in seconds of the audio window around the event time
    pub audio_window: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            output_dir: PathBuf::from("results"),
            audio_dir: PathBuf::from("audio"),
            archive_url: "https://gwosc.org".to_string(),
            timeout_secs: 60,
            use_cache: false,
            cache_dir: None,
            qtransform: QTransformSettings::default(),
            audio_window: 1.5,
        }
    }
}

impl AnalysisConfig {
    /// Parse TOML text; absent fields keep their defaults
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: AnalysisConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        let config = Self::from_toml(&text)?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeout_secs must be positive".to_string()));
        }
        let (low, high) = self.qtransform.frange;
        if !(low > 0.0 && high > low) {
            return Err(ConfigError::Invalid(format!(
                "frequency range {}-{} Hz is empty or inverted",
                low, high
            )));
        }
        if !(self.audio_window > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "audio window must be positive, got {}",
                self.audio_window
            )));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn plots_dir(&self) -> PathBuf {
        self.output_dir.join("plots")
    }

    pub fn comparisons_dir(&self) -> PathBuf {
        self.output_dir.join("comparisons")
    }

    pub fn trace_path(&self) -> PathBuf {
        self.output_dir.join("trace.jsonl")
    }

    /// Download cache, or None when caching is disabled
    pub fn cache(&self) -> Result<Option<StrainCache>, ConfigError> {
        if !self.use_cache {
            return Ok(None);
        }
        let cache = match &self.cache_dir {
            Some(dir) => StrainCache::new(dir.clone()),
            None => StrainCache::default_location()?,
        };
        Ok(Some(cache))
    }
}
