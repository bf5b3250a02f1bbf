
use crate::bot_client::{BotClient, ClientError};
use crate::dispatcher::{RETRY_COUNT_HEADER, TASK_NAME_HEADER};
use crate::entities::{Event, OutgoingMessage};
use crate::events::{decode_event, EventCodecError};
use crate::routes::AppState;
use axum::extract::rejection::FormRejection;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Form;
use serde::Deserialize;
use std::future::Future;
use tracing::{error, info};

pub const ACK_TEXT: &str = "ok";

#[derive(Deserialize, Debug)]
pub struct TaskForm {
    data: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TaskStage {
    Received,
    Decoded,
    ClientReady,
    Replied,
}

#[derive(Debug)]
pub enum TaskError {
    MissingData(String),
    DecodeFailure(String),
    ParseFailure(String),
    MissingReplyToken(String),
    ClientConstruction(String),
    ReplyRejected(String),
    ReplyDeliveryFailure(String),
}

impl TaskError {
    /// Stage the task had reached when it failed.
    pub fn stage(&self) -> TaskStage {
        match self {
            TaskError::MissingData(_)
            | TaskError::DecodeFailure(_)
            | TaskError::ParseFailure(_) => TaskStage::Received,
            TaskError::MissingReplyToken(_) | TaskError::ClientConstruction(_) => {
                TaskStage::Decoded
            }
            TaskError::ReplyRejected(_) | TaskError::ReplyDeliveryFailure(_) => {
                TaskStage::ClientReady
            }
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            TaskError::MissingData(_)
            | TaskError::DecodeFailure(_)
            | TaskError::ParseFailure(_)
            | TaskError::MissingReplyToken(_) => StatusCode::BAD_REQUEST,
            TaskError::ReplyRejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
            TaskError::ClientConstruction(_) => StatusCode::INTERNAL_SERVER_ERROR,
            TaskError::ReplyDeliveryFailure(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl From<EventCodecError> for TaskError {
    fn from(error: EventCodecError) -> Self {
        match error {
            EventCodecError::DecodeFailure(msg) => TaskError::DecodeFailure(msg),
            EventCodecError::ParseFailure(msg) | EventCodecError::SerializationFailure(msg) => {
                TaskError::ParseFailure(msg)
            }
        }
    }
}

impl From<ClientError> for TaskError {
    fn from(error: ClientError) -> Self {
        match error {
            ClientError::UrlParseFailure(msg) | ClientError::MissingChannelToken(msg) => {
                TaskError::ClientConstruction(msg)
            }
            ClientError::ReplyRejected(msg) => TaskError::ReplyRejected(msg),
            ClientError::ReplyDeliveryFailure(msg) => TaskError::ReplyDeliveryFailure(msg),
        }
    }
}

/// Runs one task through decode, client construction and reply.
/// `reply_fn` is called at most once, with the client and the reply token.
pub async fn process_task<C, F, G, FutG>(
    data: Option<&str>,
    new_client_fn: F,
    reply_fn: G,
) -> Result<Event, TaskError>
where
    F: FnOnce() -> Result<C, TaskError>,
    G: FnOnce(C, String) -> FutG,
    FutG: Future<Output = Result<(), TaskError>>,
{
    let data = match data {
        Some(data) if !data.is_empty() => data,
        _ => return Err(TaskError::MissingData("No data".to_owned())),
    };
    let event = decode_event(data)?;
    let reply_token = match &event.reply_token {
        Some(token) if !token.is_empty() => token.clone(),
        _ => {
            return Err(TaskError::MissingReplyToken(format!(
                "Event of type {} carries no reply token",
                event.event_type
            )))
        }
    };
    let client = new_client_fn()?;
    info!(
        event_type = %event.event_type,
        event_message = ?event.message,
        "Replying to event"
    );
    reply_fn(client, reply_token).await?;
    Ok(event)
}

pub async fn reply_ack(client: BotClient, reply_token: String) -> Result<(), TaskError> {
    client
        .reply_message(&reply_token, vec![OutgoingMessage::text(ACK_TEXT)])
        .await
        .map_err(TaskError::from)
}

pub async fn handle_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    form: Result<Form<TaskForm>, FormRejection>,
) -> StatusCode {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("-")
            .to_string()
    };
    let task_name = header(TASK_NAME_HEADER);
    let retry_count = header(RETRY_COUNT_HEADER);
    let data = match &form {
        Ok(Form(form)) => form.data.as_deref(),
        Err(rejection) => {
            error!(task = %task_name, retry_count = %retry_count, "Unreadable task form: {:?}", rejection);
            None
        }
    };
    let factory = &state.bot_factory;
    let new_client_fn = || factory.new_client().map_err(TaskError::from);
    match process_task(data, new_client_fn, reply_ack).await {
        Ok(event) => {
            info!(
                task = %task_name,
                event_type = %event.event_type,
                stage = ?TaskStage::Replied,
                "Task processed"
            );
            StatusCode::OK
        }
        Err(error) => {
            error!(
                task = %task_name,
                retry_count = %retry_count,
                stage = ?error.stage(),
                "Task failed: {:?}", error
            );
            error.status_code()
        }
    }
}
