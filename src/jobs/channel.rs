//! Result channel: an id-keyed table of single-use delivery slots.
//!
//! Each accepted job gets one slot holding a tokio `oneshot` pair. The worker
//! posts the terminal [`JobMessage`] into the sender; exactly one stream
//! handler claims the receiver and waits on it. Keying by job id means a
//! stream can only ever observe its own job's message.
//!
//! # Slot lifecycle
//!
//! 1. [`ResultChannel::open`] at submission.
//! 2. [`ResultChannel::post`] by the worker (at most once).
//! 3. [`ResultChannel::claim`] by the stream handler (at most once), yielding
//!    a [`PendingDelivery`].
//! 4. The slot is removed when the `PendingDelivery` is dropped, whether the
//!    message was delivered, the wait timed out, or the client went away.
//!
//! Slots nobody claims are evicted after their TTL by
//! [`ResultChannel::evict_expired`].
//!
//! The table lock is held only for map operations, never across `.await`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::oneshot;

use crate::error::{AnalyzerError, Result};
use crate::types::{JobId, JobMessage};

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// What happened to a posted message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostOutcome {
    /// Stored in the slot; the waiter (now or later) will receive it.
    Stored,
    /// The slot is gone (evicted, or its waiter disconnected). Message dropped.
    Dropped,
}

/// Result of waiting for a job's message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AwaitOutcome {
    Delivered(JobMessage),
    /// No message arrived within the bound.
    Timeout,
    /// The sending side went away without posting.
    Closed,
    /// Unknown, expired, or already-claimed job id.
    NotFound,
}

// ---------------------------------------------------------------------------
// Slot table
// ---------------------------------------------------------------------------

struct Slot {
    tx: Option<oneshot::Sender<JobMessage>>,
    rx: Option<oneshot::Receiver<JobMessage>>,
    opened_at: Instant,
}

/// Thread-safe, cheaply cloneable handle to the slot table.
#[derive(Clone)]
pub struct ResultChannel {
    slots: Arc<Mutex<HashMap<JobId, Slot>>>,
    ttl: Duration,
}

impl ResultChannel {
    /// `ttl` bounds how long an unclaimed slot survives.
    pub fn new(ttl: Duration) -> Self {
        Self {
            slots: Arc::new(Mutex::new(HashMap::new())),
            ttl,
        }
    }

    /// Create the slot for a newly accepted job.
    ///
    /// Evicts expired slots first so orphaned jobs cannot accumulate.
    pub fn open(&self, job_id: JobId) {
        self.evict_expired();
        let (tx, rx) = oneshot::channel();
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.insert(
            job_id,
            Slot {
                tx: Some(tx),
                rx: Some(rx),
                opened_at: Instant::now(),
            },
        );
    }

    /// Store the terminal message for `job_id`, waking its waiter if any.
    ///
    /// A second post for a live slot is an invariant violation and returns
    /// [`AnalyzerError::Internal`]; the first message stays intact.
    pub fn post(&self, job_id: &JobId, message: JobMessage) -> Result<PostOutcome> {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        let Some(slot) = slots.get_mut(job_id) else {
            tracing::debug!(job = %job_id, "no slot for job, dropping message");
            return Ok(PostOutcome::Dropped);
        };
        let Some(tx) = slot.tx.take() else {
            return Err(AnalyzerError::Internal(format!(
                "duplicate message posted for job {job_id}"
            )));
        };
        match tx.send(message) {
            Ok(()) => Ok(PostOutcome::Stored),
            Err(_) => {
                slots.remove(job_id);
                tracing::debug!(job = %job_id, "waiter gone, dropping message");
                Ok(PostOutcome::Dropped)
            }
        }
    }

    /// Take the receiver for `job_id`. Only the first claim succeeds.
    pub fn claim(&self, job_id: &JobId) -> Option<PendingDelivery> {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        let rx = slots.get_mut(job_id)?.rx.take()?;
        Some(PendingDelivery {
            job_id: job_id.clone(),
            rx,
            channel: self.clone(),
            delivered: false,
        })
    }

    /// Claim and wait in one step.
    pub async fn await_message(&self, job_id: &JobId, timeout: Duration) -> AwaitOutcome {
        match self.claim(job_id) {
            Some(pending) => pending.wait(timeout).await,
            None => AwaitOutcome::NotFound,
        }
    }

    /// Remove unclaimed slots older than the TTL. Claimed slots belong to a
    /// waiter whose own timeout bounds them.
    ///
    /// Returns the number of slots evicted.
    pub fn evict_expired(&self) -> usize {
        let ttl = self.ttl;
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        let before = slots.len();
        slots.retain(|_, slot| slot.rx.is_none() || slot.opened_at.elapsed() < ttl);
        let evicted = before - slots.len();
        if evicted > 0 {
            tracing::debug!(evicted, "evicted expired result slots");
        }
        evicted
    }

    /// Whether a slot exists for `job_id`.
    pub fn contains(&self, job_id: &JobId) -> bool {
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.contains_key(job_id)
    }

    /// Number of live slots.
    pub fn len(&self) -> usize {
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn remove(&self, job_id: &JobId) {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.remove(job_id);
    }
}

impl std::fmt::Debug for ResultChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultChannel")
            .field("slots", &self.len())
            .field("ttl", &self.ttl)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// PendingDelivery
// ---------------------------------------------------------------------------

/// A claimed slot. Dropping it frees the slot.
pub struct PendingDelivery {
    job_id: JobId,
    rx: oneshot::Receiver<JobMessage>,
    channel: ResultChannel,
    delivered: bool,
}

impl PendingDelivery {
    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    /// Wait up to `timeout` for the job's message.
    pub async fn wait(mut self, timeout: Duration) -> AwaitOutcome {
        match tokio::time::timeout(timeout, &mut self.rx).await {
            Ok(Ok(message)) => {
                self.delivered = true;
                AwaitOutcome::Delivered(message)
            }
            Ok(Err(_)) => AwaitOutcome::Closed,
            Err(_) => {
                tracing::debug!(job = %self.job_id, ?timeout, "timed out waiting for job");
                AwaitOutcome::Timeout
            }
        }
    }
}

impl Drop for PendingDelivery {
    fn drop(&mut self) {
        if !self.delivered {
            tracing::debug!(job = %self.job_id, "pending delivery released without a message");
        }
        self.channel.remove(&self.job_id);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
