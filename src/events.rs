#[cfg(test)]
mod test_events;

use crate::entities::{Event, Task};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use uuid::Uuid;

pub const TASK_TARGET: &str = "/task";

#[derive(Debug)]
pub enum EventCodecError {
    SerializationFailure(String),
    DecodeFailure(String),
    ParseFailure(String),
}

pub fn encode_event(event: &Event) -> Result<String, EventCodecError> {
    let json = serde_json::to_vec(event).map_err(|e| {
        EventCodecError::SerializationFailure(format!("Failed to serialize event:\n{:?}", e))
    })?;
    Ok(STANDARD.encode(json))
}

pub fn decode_event(data: &str) -> Result<Event, EventCodecError> {
    let json = STANDARD.decode(data).map_err(|e| {
        EventCodecError::DecodeFailure(format!("Task data is not valid base64:\n{:?}", e))
    })?;
    serde_json::from_slice::<Event>(&json).map_err(|e| {
        EventCodecError::ParseFailure(format!("Task data is not a valid event:\n{:?}", e))
    })
}

pub fn new_task(event: &Event) -> Result<Task, EventCodecError> {
    Ok(Task {
        name: Uuid::new_v4().to_string(),
        target: TASK_TARGET.to_string(),
        data: encode_event(event)?,
    })
}

/// Encodes every event, keeping going past failures. Tasks come back in event
/// order, each paired with the index of the event it carries.
pub fn build_tasks(events: &[Event]) -> (Vec<(usize, Task)>, Vec<(usize, EventCodecError)>) {
    let mut tasks = Vec::with_capacity(events.len());
    let mut failures = vec![];
    for (index, event) in events.iter().enumerate() {
        match new_task(event) {
            Ok(task) => tasks.push((index, task)),
            Err(error) => failures.push((index, error)),
        }
    }
    (tasks, failures)
}
