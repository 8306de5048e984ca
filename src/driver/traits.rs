use crate::parser::types::{RecordedStep, TestCase};
use crate::runner::state::StepResult;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;

/// Everything a step executor may read while performing one step
#[derive(Debug, Clone, Copy)]
pub struct StepContext<'a> {
    pub test_case: &'a TestCase,
    pub step_index: usize,
    /// Run variables, shared read-only by every step of every test in the run
    pub variables: &'a HashMap<String, String>,
    pub base_url: Option<&'a str>,
}

/// Performs a single recorded step against the target.
///
/// A step that ran but did not succeed is reported through
/// `StepResult::status`. Returning `Err` means the executor itself broke,
/// which ends the attempt with an `error` status and is never retried.
///
/// Whether to capture a screenshot is up to the implementation; a payload
/// attached to a failed step is passed through to the test result.
#[async_trait]
pub trait StepExecutor: Send + Sync {
    async fn execute(&self, step: &RecordedStep, ctx: StepContext<'_>) -> Result<StepResult>;
}
