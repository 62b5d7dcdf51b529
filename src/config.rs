//! Application Configuration
//!
//! This module provides configuration management for the harness. Values are
//! layered: built-in defaults, then an optional YAML file, then environment
//! variables, then command-line flags (applied by the binary).

use crate::gateway::config::GatewayBackend;
use crate::gateway::mock_store::Consistency;
use crate::gateway::MAX_CHUNK_SIZE;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Default configuration file, read from the working directory
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

/// Configuration problems, all detected before any probe starts
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("{field} must be a positive integer, got {value}")]
    NotPositive { field: &'static str, value: usize },

    #[error("bucket name must not be empty")]
    EmptyBucket,

    #[error("max_attempts must be at least 1")]
    NoAttempts,

    #[error("chunk size {0} bytes cannot be allocated on this platform")]
    ChunkTooLarge(u64),

    #[error("invalid {var}: {message}")]
    InvalidEnv { var: &'static str, message: String },
}

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Object store under test
    pub gateway: GatewayConfig,
    /// Probe campaign settings
    pub campaign: CampaignConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Object gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Gateway backend type
    pub backend: GatewayBackend,
    /// Bucket the probes write into; must already exist
    pub bucket: String,
    /// Custom endpoint URL for S3-compatible services
    pub endpoint: Option<String>,
    /// Region; `None` uses the AWS default resolution
    pub region: Option<String>,
    /// Path-style addressing, needed by most non-AWS stores
    pub force_path_style: bool,
    /// Per-operation timeout in seconds
    pub timeout_secs: u64,
    /// Attempts per request, including the first one
    pub max_attempts: u32,
    /// Consistency model simulated by the mock backend
    pub mock_consistency: Consistency,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            backend: GatewayBackend::S3,
            bucket: "s3consistency".to_string(),
            endpoint: None,
            region: Some("us-east-1".to_string()),
            force_path_style: false,
            timeout_secs: 30,
            max_attempts: 3,
            mock_consistency: Consistency::Strong,
        }
    }
}

/// Campaign configuration shared by all five probes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CampaignConfig {
    /// Iterations per worker per probe
    pub iterations: usize,
    /// Concurrent workers per probe
    pub workers: usize,
    /// Size in bytes of created objects
    pub chunk_size: u64,
}

impl Default for CampaignConfig {
    fn default() -> Self {
        Self {
            iterations: 5,
            workers: 5,
            chunk_size: 1,
        }
    }
}

impl CampaignConfig {
    /// Cap the chunk size at 5 GiB. Oversized values are clamped, not rejected.
    pub fn clamp_chunk_size(&mut self) {
        if self.chunk_size > MAX_CHUNK_SIZE {
            warn!(
                "chunk-size {} exceeds the 5GB limit, using {} instead",
                self.chunk_size, MAX_CHUNK_SIZE
            );
            self.chunk_size = MAX_CHUNK_SIZE;
        }
    }

    /// Validate counts and return the payload length to allocate
    pub fn validate(&self) -> Result<usize, ConfigError> {
        if self.iterations == 0 {
            return Err(ConfigError::NotPositive { field: "iterations", value: self.iterations });
        }
        if self.workers == 0 {
            return Err(ConfigError::NotPositive { field: "workers", value: self.workers });
        }
        let chunk = self.chunk_size.min(MAX_CHUNK_SIZE);
        // +1 for the overwrite payload
        usize::try_from(chunk)
            .ok()
            .filter(|len| len.checked_add(1).is_some())
            .ok_or(ConfigError::ChunkTooLarge(chunk))
    }

    /// Number of probe iterations per probe: iterations x workers
    pub fn attempts_per_probe(&self) -> u64 {
        (self.iterations as u64) * (self.workers as u64)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Path to a log4rs YAML file; used when it exists
    pub config_file: Option<String>,
    /// Log file written when no log4rs file is present
    pub log_file: String,
    /// Root level for the built-in configuration
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            config_file: Some("consistency_log.yaml".to_string()),
            log_file: "consistency.log".to_string(),
            level: "debug".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from `path`, falling back to defaults when the file
    /// does not exist. Runs before logging is set up, so the caller reports
    /// which of the two happened (see [`AppConfig::describe_source`]).
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        if !Path::new(path).exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })
    }

    /// Log where the configuration came from
    pub fn describe_source(path: &str) {
        if Path::new(path).exists() {
            info!("Loaded configuration from {}", path);
        } else {
            warn!("Config file {} not found, using defaults", path);
        }
    }

    /// Apply environment overrides
    ///
    /// - `S3_BUCKET_NAME`: bucket under test
    /// - `CONSISTENCY_BACKEND`: `s3` or `mock`
    /// - `CONSISTENCY_ENDPOINT`: custom endpoint URL
    /// - `CONSISTENCY_REGION`: region
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(bucket) = env::var("S3_BUCKET_NAME") {
            info!("Using bucket from environment: {}", bucket);
            self.gateway.bucket = bucket;
        }
        if let Ok(backend) = env::var("CONSISTENCY_BACKEND") {
            self.gateway.backend = backend
                .parse::<GatewayBackend>()
                .map_err(|message| ConfigError::InvalidEnv { var: "CONSISTENCY_BACKEND", message })?;
            info!("Using gateway backend from environment: {:?}", self.gateway.backend);
        }
        if let Ok(endpoint) = env::var("CONSISTENCY_ENDPOINT") {
            debug!("Using endpoint from environment: {}", endpoint);
            self.gateway.endpoint = Some(endpoint);
        }
        if let Ok(region) = env::var("CONSISTENCY_REGION") {
            debug!("Using region from environment: {}", region);
            self.gateway.region = Some(region);
        }
        Ok(())
    }

    /// Clamp the chunk size and check everything a campaign needs
    pub fn validate(&mut self) -> Result<usize, ConfigError> {
        if self.gateway.bucket.trim().is_empty() {
            return Err(ConfigError::EmptyBucket);
        }
        if self.gateway.max_attempts == 0 {
            return Err(ConfigError::NoAttempts);
        }
        self.campaign.clamp_chunk_size();
        self.campaign.validate()
    }
}
