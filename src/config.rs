use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ProcessingError;

/// Default number of URLs handed to the engine per chunk
pub const DEFAULT_CHUNK_SIZE: usize = 1000;
/// Smallest chunk the scheduler will ever use
pub const MIN_CHUNK_SIZE: usize = 100;
/// Chunk cap while the memory probe reports pressure
pub const PRESSURE_CHUNK_SIZE: usize = 500;
/// Number of non-blank lines processed in preview mode
pub const PREVIEW_LIMIT: usize = 1000;

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "URL_SIFTER";

/// Configuration for the URL processor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    /// Chunk size used when the caller does not pick one
    pub chunk_size: usize,

    /// Floor applied to every chunk size
    pub min_chunk_size: usize,

    /// Chunk cap under memory pressure
    pub pressure_chunk_size: usize,

    /// Memory used-ratio above which chunks shrink
    pub memory_high_water: f64,

    /// Prefix size used when `process_all` is off
    pub preview_limit: usize,

    /// Input size at which offloading is preferred
    pub offload_threshold: usize,

    /// How long to wait for the offload context to report ready
    pub offload_init_timeout_ms: u64,

    /// Wall-clock budget for one call
    pub timeout_ms: u64,

    /// Minimum spacing between offload progress messages
    pub progress_interval_ms: u64,

    /// LRU result cache capacity, 0 disables caching
    pub cache_capacity: usize,

    /// Extra compound suffixes such as `ac.jp`, merged into the built-in table
    pub compound_tlds: Vec<String>,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            min_chunk_size: MIN_CHUNK_SIZE,
            pressure_chunk_size: PRESSURE_CHUNK_SIZE,
            memory_high_water: 0.8,
            preview_limit: PREVIEW_LIMIT,
            offload_threshold: 10_000,
            offload_init_timeout_ms: 5_000,
            timeout_ms: 120_000,
            progress_interval_ms: 100,
            cache_capacity: 10_000,
            compound_tlds: Vec::new(),
        }
    }
}

impl ProcessorConfig {
    /// Loads configuration from defaults, an optional file and the environment
    ///
    /// Later sources win: defaults, then the file (if given), then
    /// `URL_SIFTER_*` environment variables.
    ///
    /// # Arguments
    /// * `path` - Optional configuration file; its format is inferred from the extension
    ///
    /// # Returns
    /// * `Result<ProcessorConfig, ProcessingError>` - The validated configuration
    pub fn load(path: Option<&Path>) -> Result<Self, ProcessingError> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Some(path) = path {
            debug!("Loading configuration file: {}", path.display());
            builder = builder.add_source(File::from(path).required(true));
        }

        let loaded: Self = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("compound_tlds"),
            )
            .build()?
            .try_deserialize()?;

        loaded.validate()?;
        Ok(loaded)
    }

    /// Rejects settings the scheduler cannot work with
    pub fn validate(&self) -> Result<(), ProcessingError> {
        if self.min_chunk_size == 0 {
            return Err(ProcessingError::Configuration("min_chunk_size must be positive".into()));
        }
        if self.chunk_size < self.min_chunk_size {
            return Err(ProcessingError::Configuration(format!(
                "chunk_size {} is below min_chunk_size {}",
                self.chunk_size, self.min_chunk_size
            )));
        }
        if self.pressure_chunk_size < self.min_chunk_size {
            return Err(ProcessingError::Configuration(format!(
                "pressure_chunk_size {} is below min_chunk_size {}",
                self.pressure_chunk_size, self.min_chunk_size
            )));
        }
        if !(self.memory_high_water > 0.0 && self.memory_high_water <= 1.0) {
            return Err(ProcessingError::Configuration(format!(
                "memory_high_water must be in (0, 1], got {}",
                self.memory_high_water
            )));
        }
        if self.preview_limit == 0 {
            return Err(ProcessingError::Configuration("preview_limit must be positive".into()));
        }
        if self.timeout_ms == 0 || self.offload_init_timeout_ms == 0 {
            return Err(ProcessingError::Configuration("timeouts must be positive".into()));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn offload_init_timeout(&self) -> Duration {
        Duration::from_millis(self.offload_init_timeout_ms)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }
}
