use super::{EnqueueReport, QueueError};
use crate::entities::Task;
use aws_sdk_sqs::types::SendMessageBatchRequestEntry;
use aws_sdk_sqs::Client;
use tracing::{event, Level};

/// SendMessageBatch accepts at most ten entries per call.
pub const MAX_BATCH_ENTRIES: usize = 10;

#[derive(Clone, Debug)]
pub struct SqsQueue {
    client: Client,
    queue_url: String,
}

impl SqsQueue {
    pub fn new(client: Client, queue_url: &str) -> Self {
        SqsQueue {
            client,
            queue_url: queue_url.to_string(),
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn queue_url(&self) -> &str {
        &self.queue_url
    }

    pub async fn add_multi(&self, tasks: Vec<Task>) -> Result<EnqueueReport, QueueError> {
        let entries = build_entries(&tasks)?;
        let mut report = EnqueueReport::default();
        for chunk in entries.chunks(MAX_BATCH_ENTRIES) {
            let result = self
                .client
                .send_message_batch()
                .queue_url(&self.queue_url)
                .set_entries(Some(chunk.iter().map(|(_, entry)| entry.clone()).collect()))
                .send()
                .await;
            match result {
                Ok(output) => {
                    report.enqueued += output.successful().len();
                    for failure in output.failed() {
                        let index = failure.id().parse::<usize>().unwrap_or(usize::MAX);
                        report.failed.push((
                            index,
                            format!(
                                "{}: {}",
                                failure.code(),
                                failure.message().unwrap_or("no message")
                            ),
                        ));
                    }
                }
                Err(error) => {
                    event!(Level::ERROR, "SendMessageBatch failed: {:?}", error);
                    for (index, _) in chunk {
                        report.failed.push((*index, format!("{:?}", error)));
                    }
                }
            }
        }
        Ok(report)
    }
}

/// One entry per task; entry ids are the task's index in the batch.
pub fn build_entries(
    tasks: &[Task],
) -> Result<Vec<(usize, SendMessageBatchRequestEntry)>, QueueError> {
    let mut entries = Vec::with_capacity(tasks.len());
    for (index, task) in tasks.iter().enumerate() {
        let body = serde_json::to_string(task).map_err(|e| {
            QueueError::SerializationFailure(format!("Failed to serialize task:\n{:?}", e))
        })?;
        let entry = SendMessageBatchRequestEntry::builder()
            .id(index.to_string())
            .message_body(body)
            .build()
            .map_err(|e| {
                QueueError::BatchBuildFailure(format!("Failed to build batch entry:\n{:?}", e))
            })?;
        entries.push((index, entry));
    }
    Ok(entries)
}
