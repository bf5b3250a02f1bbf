use super::local::LocalQueue;
use super::sqs::{build_entries, MAX_BATCH_ENTRIES};
use super::*;
use rand;
use tokio_test::{assert_err, assert_ok};

fn dummy_task(i: usize) -> Task {
    Task {
        name: format!("task{}-{}", i, rand::random::<u32>()),
        target: String::from("/task"),
        data: format!("ZGF0YQ{}", i),
    }
}

#[tokio::test]
async fn add_multi_test_local_delivers_in_order() {
    let (queue, mut receiver) = LocalQueue::new(8);
    let queue = TaskQueue::Local(queue);
    let tasks: Vec<Task> = (0..3).map(dummy_task).collect();
    let report = assert_ok!(queue.add_multi(tasks.clone()).await);
    assert_eq!(report.enqueued, 3);
    assert!(report.is_complete());
    for task in tasks {
        assert_eq!(receiver.recv().await.unwrap(), task);
    }
}

#[tokio::test]
async fn add_multi_test_local_reports_overflow_indices() {
    let (queue, _receiver) = LocalQueue::new(2);
    let report = assert_ok!(queue.add_multi((0..4).map(dummy_task).collect()));
    assert_eq!(report.enqueued, 2);
    let failed: Vec<usize> = report.failed.iter().map(|(i, _)| *i).collect();
    assert_eq!(failed, vec![2, 3]);
    assert!(!report.is_complete());
}

#[tokio::test]
async fn add_multi_test_local_closed_queue() {
    let (queue, receiver) = LocalQueue::new(2);
    drop(receiver);
    assert_err!(queue.add_multi(vec![dummy_task(0)]));
}

#[test]
fn build_entries_test_ids_are_batch_indices() {
    let tasks: Vec<Task> = (0..MAX_BATCH_ENTRIES + 3).map(dummy_task).collect();
    let entries = build_entries(&tasks).unwrap();
    assert_eq!(entries.len(), tasks.len());
    for (i, (index, entry)) in entries.iter().enumerate() {
        assert_eq!(*index, i);
        assert_eq!(entry.id(), i.to_string());
        let body: Task = serde_json::from_str(entry.message_body()).unwrap();
        assert_eq!(body, tasks[i]);
    }
    assert_eq!(entries.chunks(MAX_BATCH_ENTRIES).count(), 2);
}
