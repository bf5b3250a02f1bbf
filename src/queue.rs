pub mod local;
pub mod sqs;
#[cfg(test)]
mod test_queue;

use crate::entities::Task;
use local::LocalQueue;
use sqs::SqsQueue;

#[derive(Debug)]
pub enum QueueError {
    QueueClosed(String),
    SerializationFailure(String),
    BatchBuildFailure(String),
}

/// Outcome of a batched enqueue. Indices refer to positions in the submitted batch.
#[derive(Debug, Default, PartialEq)]
pub struct EnqueueReport {
    pub enqueued: usize,
    pub failed: Vec<(usize, String)>,
}

impl EnqueueReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Clone, Debug)]
pub enum TaskQueue {
    Local(LocalQueue),
    Sqs(SqsQueue),
}

impl TaskQueue {
    pub async fn add_multi(&self, tasks: Vec<Task>) -> Result<EnqueueReport, QueueError> {
        match self {
            TaskQueue::Local(queue) => queue.add_multi(tasks),
            TaskQueue::Sqs(queue) => queue.add_multi(tasks).await,
        }
    }
}
