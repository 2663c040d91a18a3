//! Service configuration: YAML schema and loader.

pub mod loader;
pub mod schema;

pub use loader::load_config;
pub use schema::{AnalyzerConfig, JobsConfig, ServerConfig, StreamConfig};
