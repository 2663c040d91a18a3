//! Config loading: file discovery, environment overrides, validation.
//!
//! Priority, highest first:
//! 1. environment variables (`CODESCOPE_*`)
//! 2. an explicit `--config` path
//! 3. `<project_root>/.codescope.yaml`
//! 4. `<user config dir>/codescope/config.yaml`
//! 5. built-in defaults
//!
//! Only the first config file found is read; files are not merged.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;

use super::schema::AnalyzerConfig;
use crate::error::{AnalyzerError, Result};

/// Project-local config file name.
pub const PROJECT_CONFIG_FILE: &str = ".codescope.yaml";

pub const ENV_ADDR: &str = "CODESCOPE_ADDR";
pub const ENV_STREAM_TIMEOUT_SECS: &str = "CODESCOPE_STREAM_TIMEOUT_SECS";
pub const ENV_JOB_TTL_SECS: &str = "CODESCOPE_JOB_TTL_SECS";
pub const ENV_MAX_CONCURRENT_JOBS: &str = "CODESCOPE_MAX_CONCURRENT_JOBS";

/// Load the effective configuration.
///
/// An explicit path that does not exist is an error; missing discovered files
/// are skipped silently.
pub fn load_config(explicit: Option<&Path>, project_root: Option<&Path>) -> Result<AnalyzerConfig> {
    let mut config = match explicit {
        Some(path) => read_config_file(path)?,
        None => match discover_config_file(project_root) {
            Some(path) => read_config_file(&path)?,
            None => AnalyzerConfig::default(),
        },
    };
    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    validate(&config)?;
    Ok(config)
}

/// First existing config file among the discovery locations.
pub fn discover_config_file(project_root: Option<&Path>) -> Option<PathBuf> {
    let project = project_root.map(|root| root.join(PROJECT_CONFIG_FILE));
    let user = ProjectDirs::from("", "", "codescope").map(|d| d.config_dir().join("config.yaml"));
    [project, user].into_iter().flatten().find(|p| p.is_file())
}

/// Parse one YAML config file.
pub fn read_config_file(path: &Path) -> Result<AnalyzerConfig> {
    let text = std::fs::read_to_string(path)?;
    let config: AnalyzerConfig = serde_yaml::from_str(&text)?;
    tracing::debug!(path = %path.display(), "loaded config file");
    Ok(config)
}

/// Apply `CODESCOPE_*` overrides read through `lookup`.
///
/// Taking the lookup as a closure keeps tests independent of the process
/// environment.
pub fn apply_env_overrides(
    config: &mut AnalyzerConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<()> {
    if let Some(addr) = lookup(ENV_ADDR) {
        config.server.addr = addr;
    }
    if let Some(v) = lookup(ENV_STREAM_TIMEOUT_SECS) {
        config.stream.timeout_secs = parse_env(ENV_STREAM_TIMEOUT_SECS, &v)?;
    }
    if let Some(v) = lookup(ENV_JOB_TTL_SECS) {
        config.jobs.job_ttl_secs = parse_env(ENV_JOB_TTL_SECS, &v)?;
    }
    if let Some(v) = lookup(ENV_MAX_CONCURRENT_JOBS) {
        config.jobs.max_concurrent_jobs = parse_env(ENV_MAX_CONCURRENT_JOBS, &v)?;
    }
    Ok(())
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| AnalyzerError::Config(format!("{key}: invalid value {value:?}")))
}

/// Reject values that would make the pipeline unusable.
pub fn validate(config: &AnalyzerConfig) -> Result<()> {
    if config.jobs.max_concurrent_jobs == 0 {
        return Err(AnalyzerError::Config(
            "jobs.max_concurrent_jobs must be at least 1".into(),
        ));
    }
    if config.stream.timeout_secs == 0 {
        return Err(AnalyzerError::Config(
            "stream.timeout_secs must be at least 1".into(),
        ));
    }
    if config.jobs.job_ttl_secs == 0 {
        return Err(AnalyzerError::Config(
            "jobs.job_ttl_secs must be at least 1".into(),
        ));
    }
    if config.jobs.sweep_interval_secs == 0 {
        return Err(AnalyzerError::Config(
            "jobs.sweep_interval_secs must be at least 1".into(),
        ));
    }
    if config.server.addr.trim().is_empty() {
        return Err(AnalyzerError::Config("server.addr must not be empty".into()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
