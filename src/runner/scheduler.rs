use super::context::{RetryPolicy, RunContext};
use super::events::TestEvent;
use super::executor::TestExecutor;
use super::hooks::RunCallbacks;
use super::queue::{ExecutionQueue, QueuedItem, ScheduleMode};
use super::state::{RunProgress, TestExecutionResult, TestStatus};
use crate::parser::types::TestCase;
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Drains the execution queue and owns the run's result list.
///
/// Attempts only return values; appending results, recomputing progress and
/// notifying observers all happen here, one result at a time.
pub struct Scheduler<'a> {
    ctx: &'a RunContext,
    callbacks: &'a RunCallbacks,
    queue: ExecutionQueue,
    results: Vec<TestExecutionResult>,
    total: usize,
}

impl<'a> Scheduler<'a> {
    pub fn new(
        ctx: &'a RunContext,
        callbacks: &'a RunCallbacks,
        test_cases: Vec<Arc<TestCase>>,
    ) -> Self {
        let total = test_cases.len();
        let mut queue = ExecutionQueue::new();
        for case in test_cases {
            queue.enqueue(case);
        }
        Self {
            ctx,
            callbacks,
            queue,
            results: Vec::with_capacity(total),
            total,
        }
    }

    /// Run everything and return the finalized results in finalization order
    pub async fn run(mut self) -> Vec<TestExecutionResult> {
        let limit = self.ctx.options.concurrency();
        match ScheduleMode::for_concurrency(limit) {
            ScheduleMode::Sequential => self.drain_sequential().await,
            ScheduleMode::Parallel => self.drain_parallel(limit).await,
        }
        self.results
    }

    async fn drain_sequential(&mut self) {
        while !self.ctx.is_halted() {
            let Some(item) = self.queue.dequeue_next() else {
                break;
            };

            let result = TestExecutor::new(self.ctx).execute(&item).await;

            if let Some(policy) = self.retry_policy_for(&item, &result) {
                self.announce_retry(&item, &policy);
                wait_for_retry(self.ctx.halt_token(), policy.delay).await;
                self.queue.requeue_for_retry(item, ScheduleMode::Sequential);
                continue;
            }

            let stop = self.stops_run(&result);
            self.finalize(result);
            if stop {
                log::info!("stopping after first failure");
                self.ctx.halt();
            }
        }

        self.skip_remaining();
    }

    async fn drain_parallel(&mut self, limit: usize) {
        let ctx = self.ctx;
        let mut in_flight = FuturesUnordered::new();
        // Attempts sitting out their retry delay; they hold no slot
        let mut retry_wait: FuturesUnordered<BoxFuture<'static, QueuedItem>> =
            FuturesUnordered::new();

        loop {
            while !ctx.is_halted() && in_flight.len() < limit {
                let Some(item) = self.queue.dequeue_next() else {
                    break;
                };
                log::debug!(
                    "dispatch {} ({} in flight)",
                    item.test_case.id,
                    in_flight.len() + 1
                );
                in_flight.push(async move {
                    let result = TestExecutor::new(ctx).execute(&item).await;
                    (item, result)
                });
            }

            if in_flight.is_empty() && retry_wait.is_empty() {
                break;
            }

            tokio::select! {
                Some((item, result)) = in_flight.next(), if !in_flight.is_empty() => {
                    if let Some(policy) = self.retry_policy_for(&item, &result) {
                        self.announce_retry(&item, &policy);
                        let halt = ctx.halt_token();
                        retry_wait.push(
                            async move {
                                wait_for_retry(halt, policy.delay).await;
                                item
                            }
                            .boxed(),
                        );
                    } else {
                        let stop = self.stops_run(&result);
                        self.finalize(result);
                        if stop {
                            log::info!("stopping after first failure, {} still in flight", in_flight.len());
                            ctx.halt();
                        }
                    }
                }
                Some(item) = retry_wait.next(), if !retry_wait.is_empty() => {
                    self.queue.requeue_for_retry(item, ScheduleMode::Parallel);
                }
                else => break,
            }
        }

        self.skip_remaining();
    }

    /// Only `failed` is retried; `error` (crash, timeout, hook) never is
    fn retry_policy_for(
        &self,
        item: &QueuedItem,
        result: &TestExecutionResult,
    ) -> Option<RetryPolicy> {
        if result.status != TestStatus::Failed || self.ctx.is_halted() {
            return None;
        }
        let policy = self.ctx.retry_policy(&item.test_case)?;
        (item.retry_count < policy.max_retries).then_some(policy)
    }

    fn stops_run(&self, result: &TestExecutionResult) -> bool {
        self.ctx.options.stop_on_first_failure && result.status.is_failure()
    }

    fn announce_retry(&self, item: &QueuedItem, policy: &RetryPolicy) {
        let attempt = item.retry_count + 1;
        log::info!(
            "{} failed, retry {}/{} in {}ms",
            item.test_case.id,
            attempt,
            policy.max_retries,
            policy.delay.as_millis()
        );
        self.ctx.emitter.emit(TestEvent::TestRetrying {
            test_id: item.test_case.id.clone(),
            name: item.test_case.name.clone(),
            attempt,
            max_retries: policy.max_retries,
            delay_ms: policy.delay.as_millis() as u64,
        });
    }

    fn skip_remaining(&mut self) {
        if self.queue.is_empty() {
            return;
        }
        log::info!("skipping {} queued tests", self.queue.len());
        for result in self.queue.drain_all_as_skipped() {
            self.finalize(result);
        }
    }

    fn finalize(&mut self, result: TestExecutionResult) {
        self.ctx.emitter.emit(TestEvent::TestFinished {
            result: Box::new(result.clone()),
        });
        self.results.push(result);

        let progress = self.progress();
        if let Some(last) = self.results.last() {
            self.callbacks.notify(last, &progress);
        }
        self.ctx.emitter.emit(TestEvent::Progress(progress));
    }

    fn progress(&self) -> RunProgress {
        let completed = self.results.len();
        let (mut passed, mut failed, mut skipped) = (0, 0, 0);
        for r in &self.results {
            if r.status == TestStatus::Passed {
                passed += 1;
            } else if r.status.is_failure() {
                failed += 1;
            } else if r.status.is_skipped() {
                skipped += 1;
            }
        }

        let elapsed_ms = self.ctx.elapsed().as_millis() as u64;
        let remaining = self.total.saturating_sub(completed);
        let estimated_remaining_ms = (completed > 0)
            .then(|| (elapsed_ms as f64 / completed as f64 * remaining as f64).round() as u64);
        let percentage = if self.total == 0 {
            100.0
        } else {
            completed as f64 / self.total as f64 * 100.0
        };

        RunProgress {
            total: self.total,
            completed,
            passed,
            failed,
            skipped,
            percentage,
            elapsed_ms,
            estimated_remaining_ms,
            current_test: self.queue.peek().map(|i| i.test_case.name.clone()),
        }
    }
}

/// Sleep out a retry delay; cancellation ends the wait early
async fn wait_for_retry(halt: CancellationToken, delay: Duration) {
    tokio::select! {
        _ = tokio::time::sleep(delay) => {}
        _ = halt.cancelled() => {}
    }
}
