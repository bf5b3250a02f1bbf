use super::{EnqueueReport, QueueError};
use crate::entities::Task;
use tokio::sync::mpsc::{self, error::TrySendError, Receiver, Sender};

/// In-process queue backed by a bounded channel; the dispatcher owns the receiving end.
#[derive(Clone, Debug)]
pub struct LocalQueue {
    sender: Sender<Task>,
}

impl LocalQueue {
    pub fn new(capacity: usize) -> (LocalQueue, Receiver<Task>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (LocalQueue { sender }, receiver)
    }

    pub fn add_multi(&self, tasks: Vec<Task>) -> Result<EnqueueReport, QueueError> {
        if self.sender.is_closed() {
            return Err(QueueError::QueueClosed(
                "Local dispatcher is no longer receiving tasks.".to_owned(),
            ));
        }
        let mut report = EnqueueReport::default();
        for (index, task) in tasks.into_iter().enumerate() {
            match self.sender.try_send(task) {
                Ok(()) => report.enqueued += 1,
                Err(TrySendError::Full(_)) => {
                    report.failed.push((index, "queue is at capacity".to_owned()))
                }
                Err(TrySendError::Closed(_)) => {
                    report.failed.push((index, "queue is closed".to_owned()))
                }
            }
        }
        Ok(report)
    }
}
