
use crate::config::RetryPolicy;
use crate::entities::Task;
use crate::queue::sqs::SqsQueue;
use aws_sdk_sqs::types::{Message, MessageSystemAttributeName};
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::Receiver;
use tokio::sync::Semaphore;
use tracing::{error, event, info, warn, Level};

pub const TASK_NAME_HEADER: &str = "x-task-name";
pub const RETRY_COUNT_HEADER: &str = "x-task-retry-count";

const MAX_BACKOFF: Duration = Duration::from_secs(600);
const SQS_WAIT_SECS: i32 = 20;
const SQS_MAX_MESSAGES: i32 = 10;
// upper bound SQS accepts for a message's visibility timeout
const SQS_MAX_VISIBILITY_SECS: u64 = 43_200;
const VISIBILITY_MARGIN: Duration = Duration::from_secs(30);

#[derive(Debug, PartialEq)]
pub enum DeliveryOutcome {
    Delivered,
    Discard(String),
    Retry(String),
}

pub fn classify_status(status: StatusCode) -> DeliveryOutcome {
    if status.is_success() {
        DeliveryOutcome::Delivered
    } else if status.is_client_error() {
        DeliveryOutcome::Discard(format!("task endpoint answered {}", status))
    } else {
        DeliveryOutcome::Retry(format!("task endpoint answered {}", status))
    }
}

/// Exponential backoff for the n-th retry (0-based), capped at ten minutes.
pub fn backoff_delay(policy: &RetryPolicy, retry_count: u32) -> Duration {
    policy
        .base_delay
        .checked_mul(1u32 << retry_count.min(16))
        .map_or(MAX_BACKOFF, |delay| delay.min(MAX_BACKOFF))
}

#[derive(Debug, PartialEq)]
pub enum SqsDisposition {
    Delete,
    Release { after: Duration },
}

/// What to do with a received message once its delivery attempt finished.
pub fn sqs_disposition(
    outcome: &DeliveryOutcome,
    receive_count: u32,
    policy: &RetryPolicy,
) -> SqsDisposition {
    match outcome {
        DeliveryOutcome::Delivered | DeliveryOutcome::Discard(_) => SqsDisposition::Delete,
        DeliveryOutcome::Retry(_) if receive_count >= policy.max_attempts => SqsDisposition::Delete,
        DeliveryOutcome::Retry(_) => SqsDisposition::Release {
            after: backoff_delay(policy, receive_count.saturating_sub(1)),
        },
    }
}

pub fn read_task(message: &Message) -> Result<Task, String> {
    match message.body() {
        Some(body) => serde_json::from_str::<Task>(body).map_err(|e| format!("{:?}", e)),
        None => Err("message has no body".to_owned()),
    }
}

/// Visibility timeout in whole seconds, clamped to what SQS accepts.
pub fn visibility_secs(duration: Duration) -> i32 {
    duration.as_secs().min(SQS_MAX_VISIBILITY_SECS) as i32
}

/// Pushes tasks back into this process's `/task` endpoint. At most
/// `max_in_flight` tasks are taken off the queue at once; the rest wait in it.
#[derive(Debug)]
pub struct Dispatcher {
    http: Client,
    base_url: String,
    retry_policy: RetryPolicy,
    deadline: Duration,
    in_flight: Arc<Semaphore>,
}

impl Dispatcher {
    pub fn new(
        http: Client,
        base_url: &str,
        retry_policy: RetryPolicy,
        deadline: Duration,
        max_in_flight: usize,
    ) -> Self {
        Dispatcher {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry_policy,
            deadline,
            in_flight: Arc::new(Semaphore::new(max_in_flight.max(1))),
        }
    }

    pub async fn deliver_task(&self, task: &Task, retry_count: u32) -> DeliveryOutcome {
        let result = self
            .http
            .post(format!("{}{}", self.base_url, task.target))
            .header(TASK_NAME_HEADER, &task.name)
            .header(RETRY_COUNT_HEADER, retry_count.to_string())
            .timeout(self.deadline)
            .form(&[("data", &task.data)])
            .send()
            .await;
        match result {
            Ok(response) => classify_status(response.status()),
            Err(error) => DeliveryOutcome::Retry(format!("{:?}", error)),
        }
    }

    /// Delivers one task, sleeping between attempts. Returns true once delivered.
    pub async fn deliver_with_retries(&self, task: &Task) -> bool {
        let mut retry_count = 0;
        loop {
            match self.deliver_task(task, retry_count).await {
                DeliveryOutcome::Delivered => return true,
                DeliveryOutcome::Discard(reason) => {
                    error!(task = %task.name, retry_count, "Dropping task: {}", reason);
                    return false;
                }
                DeliveryOutcome::Retry(reason) => {
                    if retry_count + 1 >= self.retry_policy.max_attempts {
                        error!(
                            task = %task.name,
                            attempts = retry_count + 1,
                            "Giving up on task: {}", reason
                        );
                        return false;
                    }
                    let delay = backoff_delay(&self.retry_policy, retry_count);
                    warn!(task = %task.name, retry_count, ?delay, "Task will be retried: {}", reason);
                    tokio::time::sleep(delay).await;
                    retry_count += 1;
                }
            }
        }
    }

    /// Drains the local queue. A task only leaves the channel once a delivery
    /// slot is free, so a stalled endpoint fills the channel instead of memory.
    pub async fn run_local(self: Arc<Self>, mut receiver: Receiver<Task>) {
        info!("Local task dispatcher started");
        loop {
            let permit = match self.in_flight.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            let task = match receiver.recv().await {
                Some(task) => task,
                None => break,
            };
            let dispatcher = self.clone();
            tokio::spawn(async move {
                dispatcher.deliver_with_retries(&task).await;
                drop(permit);
            });
        }
        info!("Local task queue closed, dispatcher stopping");
    }

    pub async fn run_sqs(self: Arc<Self>, queue: SqsQueue) {
        info!(queue_url = %queue.queue_url(), "SQS task dispatcher started");
        let mut consecutive_errors: u32 = 0;
        loop {
            let result = queue
                .client()
                .receive_message()
                .queue_url(queue.queue_url())
                .max_number_of_messages(SQS_MAX_MESSAGES)
                .wait_time_seconds(SQS_WAIT_SECS)
                .message_system_attribute_names(MessageSystemAttributeName::ApproximateReceiveCount)
                .send()
                .await;
            let output = match result {
                Ok(output) => {
                    consecutive_errors = 0;
                    output
                }
                Err(error) => {
                    consecutive_errors += 1;
                    let backoff_secs = 1u64 << consecutive_errors.min(6);
                    error!(consecutive_errors, backoff_secs, "ReceiveMessage failed: {:?}", error);
                    tokio::time::sleep(Duration::from_secs(backoff_secs)).await;
                    continue;
                }
            };
            for message in output.messages() {
                let permit = match self.in_flight.clone().acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return,
                };
                let dispatcher = self.clone();
                let queue = queue.clone();
                let message = message.clone();
                tokio::spawn(async move {
                    dispatcher.handle_sqs_message(&queue, &message).await;
                    drop(permit);
                });
            }
        }
    }

    async fn handle_sqs_message(&self, queue: &SqsQueue, message: &Message) {
        let receive_count = receive_count(message);
        let task = match read_task(message) {
            Ok(task) => task,
            Err(reason) => {
                error!(
                    message_id = message.message_id().unwrap_or_default(),
                    "Deleting unreadable queue message: {}", reason
                );
                delete_message(queue, message).await;
                return;
            }
        };
        // keep the message hidden for as long as the delivery may take
        change_visibility(queue, message, self.deadline + VISIBILITY_MARGIN).await;
        let retry_count = receive_count.saturating_sub(1);
        let outcome = self.deliver_task(&task, retry_count).await;
        match (&outcome, sqs_disposition(&outcome, receive_count, &self.retry_policy)) {
            (DeliveryOutcome::Delivered, _) => delete_message(queue, message).await,
            (DeliveryOutcome::Discard(reason), _) => {
                error!(task = %task.name, retry_count, "Dropping task: {}", reason);
                delete_message(queue, message).await;
            }
            (DeliveryOutcome::Retry(reason), SqsDisposition::Delete) => {
                error!(task = %task.name, attempts = receive_count, "Giving up on task: {}", reason);
                delete_message(queue, message).await;
            }
            (DeliveryOutcome::Retry(reason), SqsDisposition::Release { after }) => {
                warn!(task = %task.name, retry_count, ?after, "Task will be retried: {}", reason);
                change_visibility(queue, message, after).await;
            }
        }
    }
}

pub fn receive_count(message: &Message) -> u32 {
    message
        .attributes()
        .and_then(|attributes| attributes.get(&MessageSystemAttributeName::ApproximateReceiveCount))
        .and_then(|count| count.parse::<u32>().ok())
        .unwrap_or(1)
}

async fn delete_message(queue: &SqsQueue, message: &Message) {
    let handle = match message.receipt_handle() {
        Some(handle) => handle,
        None => {
            event!(Level::ERROR, "Queue message has no receipt handle");
            return;
        }
    };
    if let Err(error) = queue
        .client()
        .delete_message()
        .queue_url(queue.queue_url())
        .receipt_handle(handle)
        .send()
        .await
    {
        error!("DeleteMessage failed: {:?}", error);
    }
}

async fn change_visibility(queue: &SqsQueue, message: &Message, timeout: Duration) {
    let handle = match message.receipt_handle() {
        Some(handle) => handle,
        None => return,
    };
    if let Err(error) = queue
        .client()
        .change_message_visibility()
        .queue_url(queue.queue_url())
        .receipt_handle(handle)
        .visibility_timeout(visibility_secs(timeout))
        .send()
        .await
    {
        warn!("ChangeMessageVisibility failed: {:?}", error);
    }
}
