//! codescope: Python source structure analysis behind a submit/stream API.
//!
//! A client submits source text and an analysis kind, gets a job id back
//! immediately, and then reads the single result (or error) message for that
//! job from a server-sent-events stream.

pub mod analysis;
pub mod config;
pub mod error;
pub mod indexer;
pub mod jobs;
pub mod observability;
pub mod server;
pub mod types;
