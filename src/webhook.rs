
use crate::entities::{Event, Task, WebhookPayload};
use crate::events::build_tasks;
use crate::queue::{EnqueueReport, QueueError};
use crate::routes::AppState;
use crate::signing::{verify_signature, SigningError, SIGNATURE_HEADER};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use std::future::Future;
use tracing::{error, event, info, Level};

#[derive(Debug)]
pub enum WebhookError {
    InvalidSignature(String),
    ParseFailure(String),
    EnqueueFailure(String),
}

impl WebhookError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebhookError::InvalidSignature(_) => StatusCode::BAD_REQUEST,
            WebhookError::ParseFailure(_) | WebhookError::EnqueueFailure(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Authenticates a webhook body and extracts its events.
pub fn parse_request(
    channel_secret: &str,
    signature: Option<&str>,
    body: &[u8],
) -> Result<Vec<Event>, WebhookError> {
    verify_signature(channel_secret, body, signature).map_err(|e| match e {
        SigningError::KeyError(msg) => WebhookError::ParseFailure(msg),
        other => WebhookError::InvalidSignature(format!("{:?}", other)),
    })?;
    let payload = serde_json::from_slice::<WebhookPayload>(body).map_err(|e| {
        WebhookError::ParseFailure(format!("Failed to parse webhook body:\n{:?}", e))
    })?;
    Ok(payload.events)
}

/// Submits one task per event in a single batched call. Failed indices in the
/// returned report refer to positions in `events`.
pub async fn enqueue_events<F, FutF>(
    events: &[Event],
    add_multi_fn: F,
) -> Result<EnqueueReport, WebhookError>
where
    F: FnOnce(Vec<Task>) -> FutF,
    FutF: Future<Output = Result<EnqueueReport, QueueError>>,
{
    let (indexed_tasks, encode_failures) = build_tasks(events);
    let mut failed: Vec<(usize, String)> = encode_failures
        .into_iter()
        .map(|(index, error)| (index, format!("{:?}", error)))
        .collect();
    if indexed_tasks.is_empty() {
        return Ok(EnqueueReport {
            enqueued: 0,
            failed,
        });
    }
    let (event_indices, tasks): (Vec<usize>, Vec<Task>) = indexed_tasks.into_iter().unzip();
    let batch_report = add_multi_fn(tasks)
        .await
        .map_err(|e| WebhookError::EnqueueFailure(format!("{:?}", e)))?;
    for (batch_index, reason) in batch_report.failed {
        match event_indices.get(batch_index) {
            Some(event_index) => failed.push((*event_index, reason)),
            None => failed.push((usize::MAX, reason)),
        }
    }
    failed.sort_by_key(|(index, _)| *index);
    Ok(EnqueueReport {
        enqueued: batch_report.enqueued,
        failed,
    })
}

pub async fn handle_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());
    let events = match parse_request(&state.config.channel_secret, signature, &body) {
        Ok(events) => events,
        Err(error) => {
            error!("Rejected webhook delivery: {:?}", error);
            return error.status_code();
        }
    };
    if events.is_empty() {
        event!(Level::INFO, "Webhook delivery carried no events");
        return StatusCode::OK;
    }
    let queue = state.queue.clone();
    match enqueue_events(&events, |tasks| async move { queue.add_multi(tasks).await }).await {
        Ok(report) if report.is_complete() => {
            info!(events = events.len(), "Enqueued webhook events");
            StatusCode::OK
        }
        Ok(report) => {
            error!(
                events = events.len(),
                enqueued = report.enqueued,
                "Some webhook events were not enqueued: {:?}", report.failed
            );
            StatusCode::INTERNAL_SERVER_ERROR
        }
        Err(error) => {
            error!("Failed to enqueue webhook events: {:?}", error);
            error.status_code()
        }
    }
}
