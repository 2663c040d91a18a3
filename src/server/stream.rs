//! Server-sent-events endpoint that delivers a job's single message.
//!
//! The slot is claimed before the response starts, so an unknown or already
//! observed job id is answered with a plain `404` instead of an event stream.
//! Once claimed, the response carries exactly one `data:` frame and ends.
//! If the client disconnects first, the stream (and with it the
//! [`PendingDelivery`]) is dropped, which frees the slot.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use super::router::AppState;
use crate::jobs::{AwaitOutcome, PendingDelivery};
use crate::types::{JobId, JobMessage};

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    job: Option<String>,
}

/// `GET /stream?job=<id>`
pub async fn stream_by_query(
    State(state): State<Arc<AppState>>,
    Query(params): Query<StreamQuery>,
) -> Response {
    match params.job.filter(|id| !id.is_empty()) {
        Some(id) => open_stream(&state, JobId::from(id)),
        None => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "missing query parameter `job`" })),
        )
            .into_response(),
    }
}

/// `GET /stream/{job_id}`
pub async fn stream_by_path(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Response {
    open_stream(&state, JobId::from(job_id))
}

fn open_stream(state: &AppState, job_id: JobId) -> Response {
    let Some(pending) = state.dispatcher.channel().claim(&job_id) else {
        tracing::debug!(job = %job_id, "stream requested for unknown job");
        return (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": format!("job {job_id} not found") })),
        )
            .into_response();
    };
    tracing::debug!(job = %job_id, "stream opened");

    let timeout = state.stream.timeout();
    let events = futures::stream::once(deliver(pending, timeout));
    let sse = Sse::new(events);
    match state.stream.keep_alive() {
        Some(interval) => sse
            .keep_alive(KeepAlive::new().interval(interval))
            .into_response(),
        None => sse.into_response(),
    }
}

async fn deliver(
    pending: PendingDelivery,
    timeout: Duration,
) -> Result<Event, Infallible> {
    let job_id = pending.job_id().clone();
    let outcome = pending.wait(timeout).await;
    let message = message_for_outcome(&job_id, outcome, timeout);
    Ok(Event::default().data(message.to_json()))
}

/// The message sent to the client for each way a wait can end.
pub fn message_for_outcome(job_id: &JobId, outcome: AwaitOutcome, timeout: Duration) -> JobMessage {
    match outcome {
        AwaitOutcome::Delivered(message) => message,
        AwaitOutcome::Timeout => JobMessage::Error(format!(
            "timed out after {}s waiting for job {job_id}",
            timeout.as_secs()
        )),
        AwaitOutcome::Closed => JobMessage::Error(format!("job {job_id} ended without a result")),
        AwaitOutcome::NotFound => JobMessage::Error(format!("job {job_id} not found")),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StructuralFacts;
    use pretty_assertions::assert_eq;

    #[test]
    fn delivered_message_passes_through() {
        let msg = JobMessage::Result(StructuralFacts::default());
        let out = message_for_outcome(
            &JobId::from("a"),
            AwaitOutcome::Delivered(msg.clone()),
            Duration::from_secs(1),
        );
        assert_eq!(out, msg);
    }

    #[test]
    fn timeout_names_the_bound_and_job() {
        let out = message_for_outcome(
            &JobId::from("abc"),
            AwaitOutcome::Timeout,
            Duration::from_secs(60),
        );
        assert_eq!(
            out,
            JobMessage::Error("timed out after 60s waiting for job abc".into())
        );
    }

    #[test]
    fn closed_sender_is_reported() {
        let out = message_for_outcome(&JobId::from("abc"), AwaitOutcome::Closed, Duration::ZERO);
        assert_eq!(out, JobMessage::Error("job abc ended without a result".into()));
    }
}
