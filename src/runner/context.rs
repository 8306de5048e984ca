use super::events::EventEmitter;
use super::hooks::RunHooks;
use crate::driver::traits::StepExecutor;
use crate::parser::types::TestCase;
use crate::utils::config::{RunConfig, RunnerConfig};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Retry policy in effect for one test case
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay: Duration,
}

/// Run-scoped, read-only state shared by the scheduler and every attempt
pub struct RunContext {
    pub config: RunConfig,
    pub options: RunnerConfig,
    pub steps: Arc<dyn StepExecutor>,
    pub hooks: Arc<dyn RunHooks>,
    pub emitter: EventEmitter,

    /// Set by `TestRunner::cancel`
    cancel: CancellationToken,

    /// Child of `cancel`; also set when `stop_on_first_failure` trips
    halt: CancellationToken,

    pub started_at: DateTime<Utc>,
    clock: Instant,
}

impl RunContext {
    pub fn new(
        config: RunConfig,
        options: RunnerConfig,
        steps: Arc<dyn StepExecutor>,
        hooks: Arc<dyn RunHooks>,
        emitter: EventEmitter,
        cancel: CancellationToken,
    ) -> Self {
        let halt = cancel.child_token();
        Self {
            config,
            options,
            steps,
            hooks,
            emitter,
            cancel,
            halt,
            started_at: Utc::now(),
            clock: Instant::now(),
        }
    }

    /// True once no new step or test may start
    pub fn is_halted(&self) -> bool {
        self.halt.is_cancelled()
    }

    /// True only for user cancellation
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Stop scheduling new work without marking the run cancelled
    pub fn halt(&self) {
        self.halt.cancel();
    }

    pub fn halt_token(&self) -> CancellationToken {
        self.halt.clone()
    }

    pub fn elapsed(&self) -> Duration {
        self.clock.elapsed()
    }

    /// A case's own retry config takes precedence over the runner defaults
    pub fn retry_policy(&self, test_case: &TestCase) -> Option<RetryPolicy> {
        if let Some(retry) = test_case.retry_config {
            return Some(RetryPolicy {
                max_retries: retry.max_retries,
                delay: Duration::from_millis(retry.retry_delay_ms),
            });
        }
        if self.options.retry_failed_tests {
            return Some(RetryPolicy {
                max_retries: self.options.max_retries,
                delay: Duration::from_millis(self.options.retry_delay_ms),
            });
        }
        None
    }

    /// Per-test deadline, `None` when disabled
    pub fn timeout_for(&self, test_case: &TestCase) -> Option<Duration> {
        match test_case.timeout_ms.unwrap_or(self.options.timeout_ms) {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}
