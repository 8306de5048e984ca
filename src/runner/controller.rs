use super::context::RunContext;
use super::error::RunnerError;
use super::events::{EventEmitter, TestEvent};
use super::hooks::{NoopHooks, RunCallbacks, RunHooks};
use super::scheduler::Scheduler;
use super::state::{
    elapsed_ms, RunStatus, RunnerStats, TestExecutionResult, TestRunResult, TestStatus,
};
use crate::driver::traits::StepExecutor;
use crate::parser::types::TestCase;
use crate::utils::config::{RunConfig, RunnerConfig};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// Top-level entry point: filters, schedules and aggregates runs.
///
/// One run at a time. `cancel` may be called from anywhere while a run
/// is in progress (share the runner behind an `Arc`).
pub struct TestRunner {
    steps: Arc<dyn StepExecutor>,
    hooks: Arc<dyn RunHooks>,
    callbacks: RunCallbacks,
    options: RunnerConfig,
    emitter: EventEmitter,
    running: AtomicBool,
    cancel: Mutex<CancellationToken>,
    stats: Mutex<RunnerStats>,
}

/// Clears the running flag however the run ends
struct RunningGuard<'a>(&'a AtomicBool);

impl<'a> RunningGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, RunnerError> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| Self(flag))
            .map_err(|_| RunnerError::AlreadyRunning)
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl TestRunner {
    pub fn new(steps: Arc<dyn StepExecutor>, options: RunnerConfig) -> Self {
        Self {
            steps,
            hooks: Arc::new(NoopHooks),
            callbacks: RunCallbacks::default(),
            options,
            emitter: EventEmitter::default(),
            running: AtomicBool::new(false),
            cancel: Mutex::new(CancellationToken::new()),
            stats: Mutex::new(RunnerStats::default()),
        }
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn RunHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_callbacks(mut self, callbacks: RunCallbacks) -> Self {
        self.callbacks = callbacks;
        self
    }

    /// Subscribe to run execution events
    pub fn subscribe(&self) -> broadcast::Receiver<TestEvent> {
        self.emitter.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Run a single test case, bypassing the tag filter
    pub async fn run(
        &self,
        test_case: &TestCase,
        config: Option<RunConfig>,
    ) -> Result<TestExecutionResult, RunnerError> {
        let guard = RunningGuard::acquire(&self.running)?;
        let run = self
            .execute(vec![Arc::new(test_case.clone())], config.unwrap_or_default())
            .await?;
        drop(guard);

        Ok(run
            .results
            .into_iter()
            .next()
            .unwrap_or_else(|| TestExecutionResult::skipped(test_case, 0)))
    }

    /// Run every test case that passes the config's tag filter
    pub async fn run_all(
        &self,
        test_cases: &[TestCase],
        config: Option<RunConfig>,
    ) -> Result<TestRunResult, RunnerError> {
        let _guard = RunningGuard::acquire(&self.running)?;
        let config = config.unwrap_or_default();

        let wanted = config.normalized_tags();
        let selected: Vec<Arc<TestCase>> = test_cases
            .iter()
            .filter(|case| wanted.is_empty() || case.matches_any_tag(&wanted))
            .map(|case| Arc::new(case.clone()))
            .collect();
        if selected.len() < test_cases.len() {
            log::info!(
                "tag filter {:?} selected {}/{} tests",
                config.tags,
                selected.len(),
                test_cases.len()
            );
        }

        self.execute(selected, config).await
    }

    /// Run the test cases whose id is listed, keeping their input order
    pub async fn run_by_ids(
        &self,
        test_cases: &[TestCase],
        ids: &[String],
        config: Option<RunConfig>,
    ) -> Result<TestRunResult, RunnerError> {
        let selected: Vec<TestCase> = test_cases
            .iter()
            .filter(|case| ids.contains(&case.id))
            .cloned()
            .collect();
        self.run_all(&selected, config).await
    }

    /// Cooperative: in-flight steps finish, nothing new starts
    pub fn cancel(&self) {
        if self.is_running() {
            log::info!("cancellation requested");
        }
        lock(&self.cancel).cancel();
    }

    pub fn get_stats(&self) -> RunnerStats {
        lock(&self.stats).clone()
    }

    pub fn reset_stats(&self) {
        *lock(&self.stats) = RunnerStats::default();
    }

    /// Caller holds the running guard
    async fn execute(
        &self,
        selected: Vec<Arc<TestCase>>,
        config: RunConfig,
    ) -> Result<TestRunResult, RunnerError> {
        let cancel = {
            let mut current = lock(&self.cancel);
            *current = CancellationToken::new();
            current.clone()
        };

        self.emitter.emit(TestEvent::RunStarted {
            run_id: config.run_id.clone(),
            name: config.name.clone(),
            total_tests: selected.len(),
            max_concurrency: self.options.concurrency(),
        });

        if selected.is_empty() {
            let now = Utc::now();
            let result = build_run_result(&config, now, Vec::new(), false);
            self.finish(&result);
            return Ok(result);
        }

        log::info!(
            "run {} started: {} tests, concurrency {}",
            config.run_id,
            selected.len(),
            self.options.concurrency()
        );
        self.hooks
            .before_all(&config)
            .await
            .map_err(RunnerError::BeforeAllHook)?;

        let ctx = RunContext::new(
            config,
            self.options.clone(),
            self.steps.clone(),
            self.hooks.clone(),
            self.emitter.clone(),
            cancel,
        );
        let results = Scheduler::new(&ctx, &self.callbacks, selected).run().await;
        let result = build_run_result(&ctx.config, ctx.started_at, results, ctx.is_cancelled());

        if let Err(e) = self.hooks.after_all(&result).await {
            log::warn!("afterAll hook failed: {:#}", e);
        }

        self.finish(&result);
        Ok(result)
    }

    fn finish(&self, result: &TestRunResult) {
        log::info!(
            "run {} finished [{}]: {} passed, {} failed, {} skipped",
            result.run_id,
            result.status.as_str(),
            result.passed_tests,
            result.failed_tests,
            result.skipped_tests
        );
        lock(&self.stats).record(result);
        self.emitter.emit(TestEvent::RunFinished {
            run_id: result.run_id.clone(),
            status: result.status,
            passed: result.passed_tests,
            failed: result.failed_tests,
            skipped: result.skipped_tests,
            duration_ms: result.duration_ms,
        });
    }
}

fn build_run_result(
    config: &RunConfig,
    start_time: DateTime<Utc>,
    results: Vec<TestExecutionResult>,
    cancelled: bool,
) -> TestRunResult {
    let passed_tests = results
        .iter()
        .filter(|r| r.status == TestStatus::Passed)
        .count();
    let failed_tests = results.iter().filter(|r| r.status.is_failure()).count();
    let skipped_tests = results.iter().filter(|r| r.status.is_skipped()).count();

    let status = if cancelled {
        RunStatus::Cancelled
    } else if failed_tests > 0 {
        RunStatus::Failed
    } else {
        RunStatus::Passed
    };

    let end_time = Utc::now();
    TestRunResult {
        run_id: config.run_id.clone(),
        name: config.name.clone(),
        environment: config.environment.clone(),
        status,
        start_time,
        end_time,
        duration_ms: elapsed_ms(start_time, end_time),
        total_tests: results.len(),
        passed_tests,
        failed_tests,
        skipped_tests,
        results,
        metadata: config.metadata.clone(),
    }
}
