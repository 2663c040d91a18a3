//! Job table: lifecycle bookkeeping for accepted jobs.
//!
//! Tracks each job's [`JobState`] from submission to its terminal state so the
//! status endpoint can report progress. Entries are evicted once they have
//! been terminal for longer than the TTL; jobs that are still `Created` or
//! `Running` are owned by their worker and are never evicted.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::types::{AnalysisKind, JobId, JobState};

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// Snapshot of one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobEntry {
    pub job_id: JobId,
    pub kind: AnalysisKind,
    pub state: JobState,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
    /// Failure message, once the job has failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Thread-safe job registry.
///
/// All methods acquire the inner lock briefly and return; none of them hold
/// it across an `.await`.
#[derive(Clone)]
pub struct JobTable {
    inner: Arc<Mutex<HashMap<JobId, JobEntry>>>,
    ttl: Duration,
}

impl JobTable {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            ttl,
        }
    }

    /// Record a new job in `Created` state.
    pub fn create(&self, job_id: JobId, kind: AnalysisKind) {
        self.evict_expired();
        let now = now_ms();
        let mut jobs = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        jobs.insert(
            job_id.clone(),
            JobEntry {
                job_id,
                kind,
                state: JobState::Created,
                created_at_ms: now,
                updated_at_ms: now,
                error: None,
            },
        );
    }

    /// `Created → Running`. Returns `false` for unknown jobs or any other
    /// starting state.
    pub fn mark_running(&self, job_id: &JobId) -> bool {
        self.transition(job_id, |entry| {
            if entry.state != JobState::Created {
                return false;
            }
            entry.state = JobState::Running;
            true
        })
    }

    /// Move a live job to `Completed`.
    pub fn complete(&self, job_id: &JobId) -> bool {
        self.transition(job_id, |entry| {
            if entry.state.is_terminal() {
                return false;
            }
            entry.state = JobState::Completed;
            true
        })
    }

    /// Move a live job to `Failed`, recording why.
    pub fn fail(&self, job_id: &JobId, error: &str) -> bool {
        self.transition(job_id, |entry| {
            if entry.state.is_terminal() {
                return false;
            }
            entry.state = JobState::Failed;
            entry.error = Some(error.to_string());
            true
        })
    }

    pub fn get(&self, job_id: &JobId) -> Option<JobEntry> {
        let jobs = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        jobs.get(job_id).cloned()
    }

    pub fn len(&self) -> usize {
        let jobs = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove terminal jobs whose last update is older than the TTL.
    pub fn evict_expired(&self) -> usize {
        let now = now_ms();
        let ttl_ms = u64::try_from(self.ttl.as_millis()).unwrap_or(u64::MAX);
        let mut jobs = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let before = jobs.len();
        jobs.retain(|_, entry| {
            !entry.state.is_terminal() || now.saturating_sub(entry.updated_at_ms) < ttl_ms
        });
        before - jobs.len()
    }

    fn transition(&self, job_id: &JobId, apply: impl FnOnce(&mut JobEntry) -> bool) -> bool {
        let mut jobs = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let Some(entry) = jobs.get_mut(job_id) else {
            return false;
        };
        let from = entry.state;
        let changed = apply(entry);
        if changed {
            entry.updated_at_ms = now_ms();
            tracing::debug!(job = %job_id, %from, to = %entry.state, "job state changed");
        }
        changed
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> JobTable {
        JobTable::new(Duration::from_secs(300))
    }

    #[test]
    fn create_run_complete() {
        let t = table();
        let id = JobId::from("j1");
        t.create(id.clone(), AnalysisKind::Structure);
        assert_eq!(t.get(&id).unwrap().state, JobState::Created);

        assert!(t.mark_running(&id));
        assert_eq!(t.get(&id).unwrap().state, JobState::Running);

        assert!(t.complete(&id));
        let entry = t.get(&id).unwrap();
        assert_eq!(entry.state, JobState::Completed);
        assert!(entry.error.is_none());
        assert!(entry.updated_at_ms >= entry.created_at_ms);
    }

    #[test]
    fn fail_records_error() {
        let t = table();
        let id = JobId::from("j2");
        t.create(id.clone(), AnalysisKind::Complexity);
        t.mark_running(&id);
        assert!(t.fail(&id, "Complexity analysis not implemented"));

        let entry = t.get(&id).unwrap();
        assert_eq!(entry.state, JobState::Failed);
        assert_eq!(
            entry.error.as_deref(),
            Some("Complexity analysis not implemented")
        );
    }

    #[test]
    fn terminal_states_are_final() {
        let t = table();
        let id = JobId::from("j3");
        t.create(id.clone(), AnalysisKind::Structure);
        t.mark_running(&id);
        t.complete(&id);

        assert!(!t.fail(&id, "late"));
        assert!(!t.complete(&id));
        assert!(!t.mark_running(&id));
        assert_eq!(t.get(&id).unwrap().state, JobState::Completed);
    }

    #[test]
    fn unknown_job_transitions_are_noops() {
        let t = table();
        let id = JobId::from("nope");
        assert!(!t.mark_running(&id));
        assert!(!t.complete(&id));
        assert!(t.get(&id).is_none());
    }

    #[test]
    fn eviction_only_touches_terminal_jobs() {
        let t = JobTable::new(Duration::ZERO);
        let done = JobId::from("done");
        let live = JobId::from("live");
        t.create(done.clone(), AnalysisKind::Structure);
        t.create(live.clone(), AnalysisKind::Structure);
        t.mark_running(&done);
        t.complete(&done);
        t.mark_running(&live);

        assert_eq!(t.evict_expired(), 1);
        assert!(t.get(&done).is_none());
        assert_eq!(t.get(&live).unwrap().state, JobState::Running);
    }

    #[test]
    fn entry_serializes_camel_case() {
        let t = table();
        let id = JobId::from("j4");
        t.create(id.clone(), AnalysisKind::Dependencies);
        let json = serde_json::to_value(t.get(&id).unwrap()).unwrap();
        assert_eq!(json["jobId"], "j4");
        assert_eq!(json["kind"], "dependencies");
        assert_eq!(json["state"], "created");
        assert!(json["createdAtMs"].is_u64());
        assert!(json.get("error").is_none());
    }

    #[test]
    fn concurrent_access() {
        use std::thread;

        let t = table();
        let t2 = t.clone();
        let handle = thread::spawn(move || {
            for i in 0..50 {
                let id = JobId::from(format!("a-{i}"));
                t2.create(id.clone(), AnalysisKind::Structure);
                t2.mark_running(&id);
            }
        });
        for i in 0..50 {
            let id = JobId::from(format!("b-{i}"));
            t.create(id.clone(), AnalysisKind::Structure);
            t.mark_running(&id);
        }
        handle.join().unwrap();
        assert_eq!(t.len(), 100);
    }
}
