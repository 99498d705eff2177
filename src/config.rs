use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::constants::{
    DEFAULT_BASE_DELAY_MS, DEFAULT_CONCURRENCY, DEFAULT_GEOCODER_BASE_URL, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_OUTPUT_PATH, DEFAULT_RECORD_DELAY_MS, DEFAULT_TIMEOUT_SECONDS, OUTPUT_ENV_VARS,
    SOURCE_ENV_VARS, TOKEN_ENV_VARS,
};
use crate::error::{Result, StationError};
use crate::pipeline::ingestion::InputSource;

/// Runtime configuration. Layered as defaults, then an optional TOML file,
/// then environment variables; the CLI applies its flags last.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub geocoder: GeocoderSettings,
    pub pipeline: PipelineSettings,
    /// Input URL or path. Environment or CLI only.
    #[serde(skip)]
    pub source: Option<String>,
    /// Geocoding access token. Environment only.
    #[serde(skip)]
    pub mapbox_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeocoderSettings {
    pub base_url: String,
    /// Total attempts per address, including the first.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub timeout_seconds: u64,
    pub country: Option<String>,
    pub language: Option<String>,
}

impl Default for GeocoderSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_GEOCODER_BASE_URL.to_string(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            country: None,
            language: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Pause after each record in the sequential driver.
    pub record_delay_ms: u64,
    /// When non-zero the driver paces with a token bucket instead of a fixed delay.
    pub requests_per_minute: u64,
    /// Worker count for the bounded-parallel enricher.
    pub concurrency: usize,
    pub skip_tunnel_warning: bool,
    pub output: String,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            record_delay_ms: DEFAULT_RECORD_DELAY_MS,
            requests_per_minute: 0,
            concurrency: DEFAULT_CONCURRENCY,
            skip_tunnel_warning: true,
            output: DEFAULT_OUTPUT_PATH.to_string(),
        }
    }
}

impl Config {
    /// Defaults, overlaid by `path` if given, overlaid by the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_with(|name| std::env::var(name).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            StationError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let first = |names: &[&str]| {
            names
                .iter()
                .filter_map(|name| lookup(name))
                .map(|v| v.trim().to_string())
                .find(|v| !v.is_empty())
        };

        if let Some(source) = first(SOURCE_ENV_VARS) {
            self.source = Some(source);
        }
        if let Some(token) = first(TOKEN_ENV_VARS) {
            self.mapbox_token = Some(token);
        }
        if let Some(output) = first(OUTPUT_ENV_VARS) {
            self.pipeline.output = output;
        }
    }

    pub fn input_source(&self) -> Result<InputSource> {
        self.source
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(InputSource::parse)
            .ok_or_else(|| {
                StationError::MissingConfig(format!(
                    "station source not set (use --source or {})",
                    SOURCE_ENV_VARS.join(" / ")
                ))
            })
    }

    pub fn output_path(&self) -> PathBuf {
        PathBuf::from(&self.pipeline.output)
    }

    pub fn token(&self) -> Option<&str> {
        self.mapbox_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}
