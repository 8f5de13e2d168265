//! Caller-facing configuration for a cube source
//!
//! This module provides the configuration surface consumed from callers:
//! flow identifier, ordered dimension-id list, optional label attribute,
//! cache TTL and depth. Supports TOML files with environment variable
//! overrides and sensible defaults.

use crate::error::Error;
use crate::types::{DataStructure, Dimension, FlowRef};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration of one logical cube source
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
    /// Flow identifier
    pub flow: String,

    /// Ordered dimension ids, comma-separated
    pub dimensions: String,

    /// Series attribute used as display label, if any
    #[serde(default)]
    pub label_attribute: Option<String>,

    /// Cache time-to-live in seconds (0 disables caching)
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: i64,

    /// Number of trailing key slots resolved eagerly on a bulk fetch
    #[serde(default = "default_cache_depth")]
    pub cache_depth: i64,

    /// Data file path, for file-backed sources
    #[serde(default)]
    pub file: Option<PathBuf>,
}

fn default_cache_ttl_secs() -> i64 {
    300
}

fn default_cache_depth() -> i64 {
    0
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            flow: String::new(),
            dimensions: String::new(),
            label_attribute: None,
            cache_ttl_secs: default_cache_ttl_secs(),
            cache_depth: default_cache_depth(),
            file: None,
        }
    }
}

/// Split a comma-separated dimension-id list, trimming entries and dropping
/// empty ones
pub fn parse_dimension_list(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl SourceConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &str) -> Result<Self, Error> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("Failed to read config file {}: {}", path, e))
        })?;
        toml::from_str(&contents).map_err(|e| {
            Error::Configuration(format!("Failed to parse config file {}: {}", path, e))
        })
    }

    /// Load configuration with environment variable overrides applied
    pub fn from_file_with_env(path: &str) -> Result<Self, Error> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(flow) = std::env::var("SDMX_CUBE_FLOW") {
            self.flow = flow;
        }
        if let Ok(dims) = std::env::var("SDMX_CUBE_DIMENSIONS") {
            self.dimensions = dims;
        }
        if let Ok(label) = std::env::var("SDMX_CUBE_LABEL_ATTRIBUTE") {
            self.label_attribute = if label.is_empty() { None } else { Some(label) };
        }
        if let Ok(ttl) = std::env::var("SDMX_CUBE_CACHE_TTL_SECS") {
            if let Ok(t) = ttl.parse() {
                self.cache_ttl_secs = t;
            }
        }
        if let Ok(depth) = std::env::var("SDMX_CUBE_CACHE_DEPTH") {
            if let Ok(d) = depth.parse() {
                self.cache_depth = d;
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), Error> {
        if self.flow.trim().is_empty() {
            return Err(Error::Configuration("Flow cannot be empty".to_string()));
        }
        if self.dimension_ids().is_empty() {
            return Err(Error::Configuration(
                "Dimension list cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// The flow reference
    pub fn flow_ref(&self) -> FlowRef {
        FlowRef::new(self.flow.trim())
    }

    /// Ordered dimension ids (trimmed, empties dropped)
    pub fn dimension_ids(&self) -> Vec<String> {
        parse_dimension_list(&self.dimensions)
    }

    /// Cache TTL as a duration; negative values clamp to zero
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs.max(0) as u64)
    }

    /// Cache depth; negative values clamp to zero
    pub fn cache_depth(&self) -> usize {
        self.cache_depth.max(0) as usize
    }

    /// Build the data structure the dimension list describes
    ///
    /// Dimension ids double as labels here; a richer structure document can
    /// replace this when the source supplies one.
    pub fn data_structure(&self) -> Result<DataStructure, Error> {
        let dimensions: Vec<Dimension> = self
            .dimension_ids()
            .into_iter()
            .enumerate()
            .map(|(i, id)| Dimension::new(id.clone(), id, i + 1))
            .collect();
        DataStructure::new(
            self.flow.trim(),
            self.flow.trim(),
            dimensions,
            "TIME_PERIOD",
            "OBS_VALUE",
        )
    }
}
