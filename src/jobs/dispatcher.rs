//! Job dispatcher: validate, accept, run in the background.
//!
//! `submit` never waits for the analysis. It validates the request, records
//! the job, opens its result slot and spawns a worker task, then returns the
//! job id. The worker converts every outcome of the handler (success, typed
//! failure, or panic) into exactly one [`JobMessage`] posted to the slot.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use super::channel::ResultChannel;
use super::table::JobTable;
use crate::analysis::CapabilityRegistry;
use crate::config::JobsConfig;
use crate::error::{AnalyzerError, Result};
use crate::observability::JobMetrics;
use crate::types::{AnalysisKind, AnalysisRequest, JobId, JobMessage};

/// Acknowledgement returned to the submitter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub job_id: JobId,
    pub accepted: bool,
}

/// Shared entry point for submissions. Cheap to clone.
#[derive(Clone)]
pub struct JobDispatcher {
    registry: Arc<CapabilityRegistry>,
    channel: ResultChannel,
    table: JobTable,
    metrics: Arc<JobMetrics>,
    permits: Arc<Semaphore>,
    max_source_bytes: usize,
}

impl JobDispatcher {
    pub fn new(registry: CapabilityRegistry, config: &JobsConfig) -> Self {
        Self {
            registry: Arc::new(registry),
            channel: ResultChannel::new(config.job_ttl()),
            table: JobTable::new(config.job_ttl()),
            metrics: Arc::new(JobMetrics::new()),
            permits: Arc::new(Semaphore::new(config.max_concurrent_jobs.max(1))),
            max_source_bytes: config.max_source_bytes,
        }
    }

    pub fn channel(&self) -> &ResultChannel {
        &self.channel
    }

    pub fn table(&self) -> &JobTable {
        &self.table
    }

    pub fn metrics(&self) -> &JobMetrics {
        &self.metrics
    }

    /// Check a raw submission body and turn it into a request.
    pub fn validate(&self, body: &Value) -> Result<AnalysisRequest> {
        let Some(object) = body.as_object() else {
            return Err(AnalyzerError::Validation(
                "request body must be a JSON object".into(),
            ));
        };

        let source_text = match object.get("file") {
            None | Some(Value::Null) => {
                return Err(AnalyzerError::Validation("missing field `file`".into()))
            }
            Some(Value::String(s)) => s,
            Some(_) => {
                return Err(AnalyzerError::Validation(
                    "field `file` must be a string".into(),
                ))
            }
        };

        let tag = match object.get("type") {
            None | Some(Value::Null) => {
                return Err(AnalyzerError::Validation("missing field `type`".into()))
            }
            Some(Value::String(s)) => s,
            Some(_) => {
                return Err(AnalyzerError::Validation(
                    "field `type` must be a string".into(),
                ))
            }
        };

        let Some(kind) = AnalysisKind::from_wire(tag) else {
            let known: Vec<&str> = AnalysisKind::ALL.iter().map(|k| k.as_str()).collect();
            return Err(AnalyzerError::Validation(format!(
                "unknown analysis type {tag:?}; expected one of: {}",
                known.join(", ")
            )));
        };

        if source_text.len() > self.max_source_bytes {
            return Err(AnalyzerError::Validation(format!(
                "field `file` is {} bytes; the limit is {} bytes",
                source_text.len(),
                self.max_source_bytes
            )));
        }

        Ok(AnalysisRequest {
            source_text: source_text.clone(),
            kind,
        })
    }

    /// Validate `body` and start a job for it.
    ///
    /// Must be called inside a tokio runtime.
    pub fn submit(&self, body: &Value) -> Result<Submission> {
        match self.validate(body) {
            Ok(request) => Ok(self.submit_request(request)),
            Err(e) => {
                self.metrics.record_rejected();
                tracing::debug!(error = %e, "submission rejected");
                Err(e)
            }
        }
    }

    /// Start a job for an already validated request.
    pub fn submit_request(&self, request: AnalysisRequest) -> Submission {
        let job_id = JobId::generate();
        self.table.create(job_id.clone(), request.kind);
        self.channel.open(job_id.clone());
        self.metrics.record_submitted();
        tracing::info!(job = %job_id, kind = %request.kind, bytes = request.source_text.len(), "job accepted");

        let worker = self.clone();
        let id = job_id.clone();
        tokio::spawn(async move { worker.run_job(id, request).await });

        Submission {
            job_id,
            accepted: true,
        }
    }

    async fn run_job(self, job_id: JobId, request: AnalysisRequest) {
        // Acquire only fails on a closed semaphore, and this one is never closed.
        let _permit = self.permits.clone().acquire_owned().await.ok();
        self.table.mark_running(&job_id);

        let handler = self.registry.resolve(request.kind);
        let AnalysisRequest { source_text, kind } = request;
        let joined = tokio::task::spawn_blocking(move || handler.analyze(&source_text)).await;

        let message = match joined {
            Ok(Ok(facts)) => JobMessage::Result(facts),
            Ok(Err(e)) => JobMessage::Error(e.to_string()),
            Err(join_error) => {
                let detail = if join_error.is_panic() {
                    format!("handler panicked: {}", panic_message(join_error.into_panic()))
                } else {
                    "handler was cancelled".to_string()
                };
                JobMessage::Error(AnalyzerError::Internal(detail).to_string())
            }
        };

        match &message {
            JobMessage::Result(_) => {
                self.table.complete(&job_id);
                self.metrics.record_completed();
                tracing::info!(job = %job_id, %kind, "job completed");
            }
            JobMessage::Error(text) => {
                self.table.fail(&job_id, text);
                self.metrics.record_failed();
                tracing::info!(job = %job_id, %kind, error = %text, "job failed");
            }
        }

        if let Err(e) = self.channel.post(&job_id, message) {
            tracing::warn!(job = %job_id, error = %e, "could not post job message");
        }
    }

    /// Periodically evict expired result slots and finished job records.
    pub fn spawn_sweeper(&self, interval: Duration) -> JoinHandle<()> {
        let channel = self.channel.clone();
        let table = self.table.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let slots = channel.evict_expired();
                let jobs = table.evict_expired();
                if slots + jobs > 0 {
                    tracing::debug!(slots, jobs, "sweeper evicted expired entries");
                }
            }
        })
    }
}

impl std::fmt::Debug for JobDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobDispatcher")
            .field("registry", &self.registry)
            .field("channel", &self.channel)
            .field("jobs", &self.table.len())
            .field("max_source_bytes", &self.max_source_bytes)
            .finish()
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
