//! Structured logging and job metrics.
//!
//! This module provides:
//! - [`init_logging`]: one-time structured logging setup with `RUST_LOG` support
//! - [`JobMetrics`]: lock-free counters for the job pipeline

use std::sync::atomic::{AtomicU64, Ordering};

use tracing_subscriber::EnvFilter;

/// Initialize structured logging with `RUST_LOG` environment variable support.
///
/// Defaults to `codescope=info,tower_http=info` when `RUST_LOG` is not set.
/// Call once at program startup; subsequent calls are silently ignored by
/// `tracing_subscriber`.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("codescope=info,tower_http=info"));

    // try_init so double-init in tests doesn't panic
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Counters for the submit/observe pipeline.
///
/// Shared behind an `Arc`; every method takes `&self`.
#[derive(Debug, Default)]
pub struct JobMetrics {
    submitted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    rejected: AtomicU64,
}

impl JobMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// A submission that failed validation.
    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    /// Jobs accepted but not yet terminal.
    pub fn in_flight(&self) -> u64 {
        self.submitted()
            .saturating_sub(self.completed() + self.failed())
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "submitted": self.submitted(),
            "completed": self.completed(),
            "failed": self.failed(),
            "rejected": self.rejected(),
            "inFlight": self.in_flight(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
