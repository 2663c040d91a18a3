//! Configuration data structures for codescope.
//!
//! Defines the YAML config format: server binding, job limits, and stream
//! timing. Every field has a default so partial files are valid.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Root configuration.
///
/// Loaded from YAML files and environment variables; see
/// [`crate::config::loader::load_config`] for the priority order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Config format version (currently "1.0").
    #[serde(default = "default_version")]
    pub version: String,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub jobs: JobsConfig,

    #[serde(default)]
    pub stream: StreamConfig,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            server: ServerConfig::default(),
            jobs: JobsConfig::default(),
            stream: StreamConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

/// HTTP front door settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address to bind, e.g. `127.0.0.1:8000`.
    #[serde(default = "default_addr")]
    pub addr: String,

    /// Largest accepted request body.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_addr(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

// ---------------------------------------------------------------------------
// JobsConfig
// ---------------------------------------------------------------------------

/// Dispatcher and result-channel limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobsConfig {
    /// Analyses allowed to run at the same time.
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,

    /// How long unclaimed results and finished job records are kept.
    #[serde(default = "default_job_ttl_secs")]
    pub job_ttl_secs: u64,

    /// Largest accepted source text.
    #[serde(default = "default_max_source_bytes")]
    pub max_source_bytes: usize,

    /// Period of the background eviction sweep.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl JobsConfig {
    pub fn job_ttl(&self) -> Duration {
        Duration::from_secs(self.job_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: default_max_concurrent_jobs(),
            job_ttl_secs: default_job_ttl_secs(),
            max_source_bytes: default_max_source_bytes(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

// ---------------------------------------------------------------------------
// StreamConfig
// ---------------------------------------------------------------------------

/// Streaming endpoint timing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Upper bound a stream waits for its job's message.
    #[serde(default = "default_stream_timeout_secs")]
    pub timeout_secs: u64,

    /// Interval between SSE keep-alive comments; 0 disables them.
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
}

impl StreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn keep_alive(&self) -> Option<Duration> {
        (self.keep_alive_secs > 0).then(|| Duration::from_secs(self.keep_alive_secs))
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_stream_timeout_secs(),
            keep_alive_secs: default_keep_alive_secs(),
        }
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

fn default_version() -> String {
    "1.0".to_string()
}

fn default_addr() -> String {
    "127.0.0.1:8000".to_string()
}

fn default_max_body_bytes() -> usize {
    2 * 1024 * 1024
}

fn default_max_concurrent_jobs() -> usize {
    8
}

fn default_job_ttl_secs() -> u64 {
    300
}

fn default_max_source_bytes() -> usize {
    1024 * 1024
}

fn default_sweep_interval_secs() -> u64 {
    30
}

fn default_stream_timeout_secs() -> u64 {
    60
}

fn default_keep_alive_secs() -> u64 {
    15
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
