use super::state::{RunProgress, TestExecutionResult, TestRunResult};
use crate::parser::types::TestCase;
use crate::utils::config::RunConfig;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Lifecycle hooks around a run. Every method defaults to a no-op.
///
/// An error from `before_all` aborts the run and an error from `before_each`
/// aborts the attempt. Errors from `after_all` and `after_each` are logged
/// and dropped so they never mask a test outcome.
#[async_trait]
pub trait RunHooks: Send + Sync {
    async fn before_all(&self, _config: &RunConfig) -> Result<()> {
        Ok(())
    }

    async fn after_all(&self, _result: &TestRunResult) -> Result<()> {
        Ok(())
    }

    async fn before_each(&self, _test_case: &TestCase) -> Result<()> {
        Ok(())
    }

    async fn after_each(&self, _result: &TestExecutionResult) -> Result<()> {
        Ok(())
    }
}

pub struct NoopHooks;

impl RunHooks for NoopHooks {}

pub type ProgressCallback = Arc<dyn Fn(&RunProgress) + Send + Sync>;
pub type TestCompleteCallback = Arc<dyn Fn(&TestExecutionResult) + Send + Sync>;

/// Observers invoked after every finalized result: `on_test_complete`
/// first, then `on_progress`.
#[derive(Clone, Default)]
pub struct RunCallbacks {
    pub on_progress: Option<ProgressCallback>,
    pub on_test_complete: Option<TestCompleteCallback>,
}

impl RunCallbacks {
    pub fn on_progress(mut self, f: impl Fn(&RunProgress) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Arc::new(f));
        self
    }

    pub fn on_test_complete(
        mut self,
        f: impl Fn(&TestExecutionResult) + Send + Sync + 'static,
    ) -> Self {
        self.on_test_complete = Some(Arc::new(f));
        self
    }

    pub(crate) fn notify(&self, result: &TestExecutionResult, progress: &RunProgress) {
        if let Some(ref f) = self.on_test_complete {
            f(result);
        }
        if let Some(ref f) = self.on_progress {
            f(progress);
        }
    }
}
