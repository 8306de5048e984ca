use super::context::RunContext;
use super::events::TestEvent;
use super::queue::QueuedItem;
use super::state::{elapsed_ms, StepResult, StepStatus, TestExecutionResult, TestStatus};
use crate::driver::traits::StepContext;
use crate::parser::types::TestCase;
use chrono::Utc;

/// What one pass over a test case's steps produced
#[derive(Debug, Default)]
struct AttemptOutcome {
    steps: Vec<StepResult>,
    screenshots: Vec<String>,
    error: Option<String>,
    failed: bool,
    /// Executor error, hook error or timeout
    broken: bool,
    interrupted: bool,
}

impl AttemptOutcome {
    fn broken(error: String) -> Self {
        Self {
            error: Some(error),
            broken: true,
            ..Default::default()
        }
    }

    fn status(&self) -> TestStatus {
        if self.broken {
            TestStatus::Error
        } else if self.failed {
            TestStatus::Failed
        } else if self.interrupted {
            TestStatus::Cancelled
        } else {
            TestStatus::Passed
        }
    }
}

/// Runs every step of one test case and produces one attempt's result
pub struct TestExecutor<'a> {
    ctx: &'a RunContext,
}

impl<'a> TestExecutor<'a> {
    pub fn new(ctx: &'a RunContext) -> Self {
        Self { ctx }
    }

    pub async fn execute(&self, item: &QueuedItem) -> TestExecutionResult {
        let test_case = item.test_case.as_ref();
        let start_time = Utc::now();

        self.ctx.emitter.emit(TestEvent::TestStarted {
            test_id: test_case.id.clone(),
            name: test_case.name.clone(),
            attempt: item.retry_count,
            step_count: test_case.steps.len(),
        });
        log::debug!(
            "start {} (attempt {}, {} steps)",
            test_case.id,
            item.retry_count,
            test_case.steps.len()
        );

        let outcome = match self.ctx.hooks.before_each(test_case).await {
            Ok(()) => self.run_with_deadline(test_case).await,
            Err(e) => AttemptOutcome::broken(format!("beforeEach hook failed: {:#}", e)),
        };

        let end_time = Utc::now();
        let result = TestExecutionResult {
            test_case_id: test_case.id.clone(),
            test_case_name: test_case.name.clone(),
            status: outcome.status(),
            start_time,
            end_time,
            duration_ms: elapsed_ms(start_time, end_time),
            attempt: item.retry_count,
            error: outcome.error,
            steps: outcome.steps,
            screenshots: outcome.screenshots,
        };

        if let Err(e) = self.ctx.hooks.after_each(&result).await {
            log::warn!("afterEach hook failed for {}: {:#}", test_case.id, e);
        }

        result
    }

    async fn run_with_deadline(&self, test_case: &TestCase) -> AttemptOutcome {
        let Some(deadline) = self.ctx.timeout_for(test_case) else {
            return self.run_steps(test_case).await;
        };

        match tokio::time::timeout(deadline, self.run_steps(test_case)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                let ms = deadline.as_millis();
                log::warn!("{} timed out after {}ms", test_case.id, ms);
                AttemptOutcome::broken(format!("Test timeout after {}ms", ms))
            }
        }
    }

    async fn run_steps(&self, test_case: &TestCase) -> AttemptOutcome {
        let mut outcome = AttemptOutcome::default();
        // A retry config means the author wants every failure, not just the first
        let collect_all = test_case.retry_config.is_some();

        for (index, step) in test_case.steps.iter().enumerate() {
            if self.ctx.is_halted() {
                outcome.interrupted = true;
                outcome
                    .steps
                    .extend(test_case.steps[index..].iter().map(StepResult::skipped));
                break;
            }

            let step_ctx = StepContext {
                test_case,
                step_index: index,
                variables: &self.ctx.config.variables,
                base_url: self.ctx.config.base_url.as_deref(),
            };

            let step_result = match self.ctx.steps.execute(step, step_ctx).await {
                Ok(r) => r,
                Err(e) => {
                    outcome.broken = true;
                    outcome.error = Some(format!("Step {} crashed: {:#}", index, e));
                    break;
                }
            };

            let failed = step_result.status == StepStatus::Failed;
            if failed {
                outcome.failed = true;
                if outcome.error.is_none() {
                    outcome.error = Some(
                        step_result
                            .error
                            .clone()
                            .unwrap_or_else(|| format!("Step {} failed", index)),
                    );
                }
                if let Some(ref shot) = step_result.screenshot {
                    outcome.screenshots.push(shot.clone());
                }
            }
            outcome.steps.push(step_result);

            if failed && !collect_all {
                break;
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::events::EventEmitter;
    use crate::runner::hooks::{NoopHooks, RunHooks};
    use crate::runner::test_support::{RecordingHooks, ScriptedSteps};
    use crate::utils::config::{RunConfig, RunnerConfig};
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    fn context_with(
        steps: Arc<ScriptedSteps>,
        hooks: Arc<dyn RunHooks>,
        options: RunnerConfig,
    ) -> RunContext {
        RunContext::new(
            RunConfig::default().with_variable("user", "alice"),
            options,
            steps,
            hooks,
            EventEmitter::default(),
            CancellationToken::new(),
        )
    }

    fn item(case: TestCase) -> QueuedItem {
        QueuedItem {
            test_case: Arc::new(case),
            retry_count: 0,
            priority: 0,
        }
    }

    #[tokio::test]
    async fn test_fail_fast_without_retry_config() {
        let steps = Arc::new(ScriptedSteps::default());
        let ctx = context_with(steps.clone(), Arc::new(NoopHooks), RunnerConfig::default());
        let case = TestCase::new("t", "T")
            .with_step("fail", serde_json::json!("A broke"))
            .with_step("pass", serde_json::Value::Null);

        let result = TestExecutor::new(&ctx).execute(&item(case)).await;
        assert_eq!(result.status, TestStatus::Failed);
        assert_eq!(result.steps.len(), 1);
        assert_eq!(result.steps[0].status, StepStatus::Failed);
        assert_eq!(result.error.as_deref(), Some("A broke"));
        assert_eq!(steps.calls(), 1);
    }

    #[tokio::test]
    async fn test_retry_config_collects_all_failures() {
        let steps = Arc::new(ScriptedSteps::default());
        let ctx = context_with(steps.clone(), Arc::new(NoopHooks), RunnerConfig::default());
        let case = TestCase::new("t", "T")
            .with_step("fail", serde_json::json!("first"))
            .with_step("pass", serde_json::Value::Null)
            .with_step("fail", serde_json::json!("third"))
            .with_retry(0, 0);

        let result = TestExecutor::new(&ctx).execute(&item(case)).await;
        assert_eq!(result.status, TestStatus::Failed);
        assert_eq!(result.steps.len(), 3);
        assert_eq!(result.count_steps(StepStatus::Failed), 2);
        assert_eq!(result.error.as_deref(), Some("first"));
    }

    #[tokio::test]
    async fn test_failed_step_screenshots_pass_through() {
        let steps = Arc::new(ScriptedSteps::default());
        let ctx = context_with(steps, Arc::new(NoopHooks), RunnerConfig::default());
        let case = TestCase::new("t", "T")
            .with_step("snap", serde_json::json!("ok.png"))
            .with_step("failSnap", serde_json::json!("broken.png"));

        let result = TestExecutor::new(&ctx).execute(&item(case)).await;
        assert_eq!(result.screenshots, vec!["broken.png".to_string()]);
    }

    #[tokio::test]
    async fn test_timeout_reports_error() {
        let steps = Arc::new(ScriptedSteps::default());
        let ctx = context_with(steps, Arc::new(NoopHooks), RunnerConfig::default());
        let case = TestCase::new("t", "T")
            .with_step("sleep", serde_json::json!(500))
            .with_timeout(20);

        let result = TestExecutor::new(&ctx).execute(&item(case)).await;
        assert_eq!(result.status, TestStatus::Error);
        assert_eq!(result.error.as_deref(), Some("Test timeout after 20ms"));
    }

    #[tokio::test]
    async fn test_executor_error_is_error_status() {
        let steps = Arc::new(ScriptedSteps::default());
        let ctx = context_with(steps, Arc::new(NoopHooks), RunnerConfig::default());
        let case = TestCase::new("t", "T")
            .with_step("crash", serde_json::Value::Null)
            .with_step("pass", serde_json::Value::Null);

        let result = TestExecutor::new(&ctx).execute(&item(case)).await;
        assert_eq!(result.status, TestStatus::Error);
        assert!(result.steps.is_empty());
        assert!(result.error.unwrap().contains("crashed"));
    }

    #[tokio::test]
    async fn test_halted_run_skips_remaining_steps() {
        let steps = Arc::new(ScriptedSteps::default());
        let ctx = context_with(steps.clone(), Arc::new(NoopHooks), RunnerConfig::default());
        ctx.halt();
        let case = TestCase::new("t", "T")
            .with_step("pass", serde_json::Value::Null)
            .with_step("pass", serde_json::Value::Null);

        let result = TestExecutor::new(&ctx).execute(&item(case)).await;
        assert_eq!(result.status, TestStatus::Cancelled);
        assert_eq!(result.count_steps(StepStatus::Skipped), 2);
        assert_eq!(result.steps[1].step_index, 1);
        assert_eq!(steps.calls(), 0);
    }

    #[tokio::test]
    async fn test_skipped_steps_keep_recorded_index() {
        let steps = Arc::new(ScriptedSteps::default());
        let ctx = context_with(steps, Arc::new(NoopHooks), RunnerConfig::default());
        ctx.halt();
        let mut case = TestCase::new("t", "T")
            .with_step("pass", serde_json::Value::Null)
            .with_step("pass", serde_json::Value::Null);
        // Recorded indices need not match list position
        case.steps[0].index = 4;
        case.steps[1].index = 7;

        let result = TestExecutor::new(&ctx).execute(&item(case)).await;
        let indices: Vec<usize> = result.steps.iter().map(|s| s.step_index).collect();
        assert_eq!(indices, vec![4, 7]);
    }

    #[tokio::test]
    async fn test_variables_reach_step_executor() {
        let steps = Arc::new(ScriptedSteps::default());
        let ctx = context_with(steps, Arc::new(NoopHooks), RunnerConfig::default());
        let case = TestCase::new("t", "T").with_step("expectVar", serde_json::json!("user=alice"));

        let result = TestExecutor::new(&ctx).execute(&item(case)).await;
        assert_eq!(result.status, TestStatus::Passed);
    }

    #[tokio::test]
    async fn test_before_each_failure_still_runs_after_each() {
        let steps = Arc::new(ScriptedSteps::default());
        let hooks = Arc::new(RecordingHooks {
            fail_before_each: true,
            fail_after_each: true,
            ..Default::default()
        });
        let ctx = context_with(steps.clone(), hooks.clone(), RunnerConfig::default());
        let case = TestCase::new("t", "T").with_step("pass", serde_json::Value::Null);

        let result = TestExecutor::new(&ctx).execute(&item(case)).await;
        assert_eq!(result.status, TestStatus::Error);
        assert!(result.error.unwrap().starts_with("beforeEach hook failed"));
        assert_eq!(steps.calls(), 0);
        assert_eq!(hooks.count("afterEach"), 1);
    }
}
