use super::state::TestExecutionResult;
use crate::parser::types::TestCase;
use std::collections::VecDeque;
use std::sync::Arc;

/// How the scheduler drains the queue, which decides where retries go
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleMode {
    Sequential,
    Parallel,
}

impl ScheduleMode {
    pub fn for_concurrency(max_concurrency: usize) -> Self {
        if max_concurrency <= 1 {
            ScheduleMode::Sequential
        } else {
            ScheduleMode::Parallel
        }
    }
}

/// A pending test case plus its retry bookkeeping
#[derive(Debug, Clone)]
pub struct QueuedItem {
    pub test_case: Arc<TestCase>,
    pub retry_count: u32,
    /// Arrival order, kept across retries
    pub priority: usize,
}

/// Ordered worklist of test cases waiting to run
#[derive(Debug, Default)]
pub struct ExecutionQueue {
    items: VecDeque<QueuedItem>,
    next_priority: usize,
}

impl ExecutionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, test_case: Arc<TestCase>) {
        let priority = self.next_priority;
        self.next_priority += 1;
        self.items.push_back(QueuedItem {
            test_case,
            retry_count: 0,
            priority,
        });
    }

    pub fn dequeue_next(&mut self) -> Option<QueuedItem> {
        self.items.pop_front()
    }

    /// Sequential retries go to the front so they run before any later
    /// first attempt; parallel retries go to the back so they don't grab
    /// the slot that just freed.
    pub fn requeue_for_retry(&mut self, mut item: QueuedItem, mode: ScheduleMode) {
        item.retry_count += 1;
        log::debug!(
            "requeue {} for retry {} ({:?})",
            item.test_case.id,
            item.retry_count,
            mode
        );
        match mode {
            ScheduleMode::Sequential => self.items.push_front(item),
            ScheduleMode::Parallel => self.items.push_back(item),
        }
    }

    /// Empty the queue, producing a zero-duration `skipped` result per item
    pub fn drain_all_as_skipped(&mut self) -> Vec<TestExecutionResult> {
        self.items
            .drain(..)
            .map(|item| TestExecutionResult::skipped(&item.test_case, item.retry_count))
            .collect()
    }

    pub fn peek(&self) -> Option<&QueuedItem> {
        self.items.front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::state::TestStatus;

    fn queue_of(ids: &[&str]) -> ExecutionQueue {
        let mut queue = ExecutionQueue::new();
        for id in ids {
            queue.enqueue(Arc::new(TestCase::new(id, id)));
        }
        queue
    }

    #[test]
    fn test_fifo_with_arrival_priority() {
        let mut queue = queue_of(&["a", "b", "c"]);
        let first = queue.dequeue_next().unwrap();
        assert_eq!(first.test_case.id, "a");
        assert_eq!(first.retry_count, 0);
        assert_eq!(first.priority, 0);
        assert_eq!(queue.peek().unwrap().priority, 1);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_sequential_retry_goes_first() {
        let mut queue = queue_of(&["a", "b", "c"]);
        let item = queue.dequeue_next().unwrap();
        queue.requeue_for_retry(item, ScheduleMode::Sequential);

        let next = queue.dequeue_next().unwrap();
        assert_eq!(next.test_case.id, "a");
        assert_eq!(next.retry_count, 1);
        assert_eq!(next.priority, 0);
    }

    #[test]
    fn test_parallel_retry_goes_last() {
        let mut queue = queue_of(&["a", "b", "c"]);
        let item = queue.dequeue_next().unwrap();
        queue.requeue_for_retry(item, ScheduleMode::Parallel);

        let order: Vec<String> = std::iter::from_fn(|| queue.dequeue_next())
            .map(|i| i.test_case.id.clone())
            .collect();
        assert_eq!(order, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_drain_as_skipped() {
        let mut queue = queue_of(&["a", "b"]);
        let item = queue.dequeue_next().unwrap();
        queue.requeue_for_retry(item, ScheduleMode::Parallel);

        let skipped = queue.drain_all_as_skipped();
        assert!(queue.is_empty());
        assert_eq!(skipped.len(), 2);
        assert!(skipped.iter().all(|r| r.status == TestStatus::Skipped));
        assert!(skipped.iter().all(|r| r.duration_ms == 0));
        assert_eq!(skipped[1].test_case_id, "a");
        assert_eq!(skipped[1].attempt, 1);
    }

    #[test]
    fn test_mode_from_concurrency() {
        assert_eq!(ScheduleMode::for_concurrency(0), ScheduleMode::Sequential);
        assert_eq!(ScheduleMode::for_concurrency(1), ScheduleMode::Sequential);
        assert_eq!(ScheduleMode::for_concurrency(4), ScheduleMode::Parallel);
    }
}
