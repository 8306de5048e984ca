use crate::parser::types::{RecordedStep, TestCase};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Outcome of a single step
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Passed,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    pub step_id: String,
    pub step_index: usize,
    pub status: StepStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_ms: u64,
    pub attempts: u32,
    pub error: Option<String>,
    /// Screenshot payload (path or encoded image), opaque to the runner
    pub screenshot: Option<String>,
}

impl StepResult {
    pub fn passed(step: &RecordedStep, started_at: DateTime<Utc>) -> Self {
        Self::finish(step, started_at, StepStatus::Passed, None)
    }

    pub fn failed(step: &RecordedStep, started_at: DateTime<Utc>, error: impl Into<String>) -> Self {
        Self::finish(step, started_at, StepStatus::Failed, Some(error.into()))
    }

    /// Zero-duration placeholder for a step that never ran
    pub fn skipped(step: &RecordedStep) -> Self {
        let now = Utc::now();
        Self {
            step_id: step.id.clone(),
            step_index: step.index,
            status: StepStatus::Skipped,
            start_time: now,
            end_time: now,
            duration_ms: 0,
            attempts: 0,
            error: None,
            screenshot: None,
        }
    }

    pub fn with_screenshot(mut self, screenshot: impl Into<String>) -> Self {
        self.screenshot = Some(screenshot.into());
        self
    }

    fn finish(
        step: &RecordedStep,
        started_at: DateTime<Utc>,
        status: StepStatus,
        error: Option<String>,
    ) -> Self {
        let end_time = Utc::now();
        Self {
            step_id: step.id.clone(),
            step_index: step.index,
            status,
            start_time: started_at,
            end_time,
            duration_ms: elapsed_ms(started_at, end_time),
            attempts: 1,
            error,
            screenshot: None,
        }
    }
}

/// Status of one test case attempt
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Pending,
    Running,
    Passed,
    Failed,
    Skipped,
    Cancelled,
    Error,
}

impl TestStatus {
    pub fn is_failure(&self) -> bool {
        matches!(self, TestStatus::Failed | TestStatus::Error)
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, TestStatus::Skipped | TestStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TestStatus::Pending => "pending",
            TestStatus::Running => "running",
            TestStatus::Passed => "passed",
            TestStatus::Failed => "failed",
            TestStatus::Skipped => "skipped",
            TestStatus::Cancelled => "cancelled",
            TestStatus::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TestExecutionResult {
    pub test_case_id: String,
    pub test_case_name: String,
    pub status: TestStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_ms: u64,
    /// 0-based: the number of failed attempts before this one
    pub attempt: u32,
    pub error: Option<String>,
    pub steps: Vec<StepResult>,
    pub screenshots: Vec<String>,
}

impl TestExecutionResult {
    /// Result for a test that was never started
    pub fn skipped(test_case: &TestCase, attempt: u32) -> Self {
        let now = Utc::now();
        Self {
            test_case_id: test_case.id.clone(),
            test_case_name: test_case.name.clone(),
            status: TestStatus::Skipped,
            start_time: now,
            end_time: now,
            duration_ms: 0,
            attempt,
            error: None,
            steps: Vec::new(),
            screenshots: Vec::new(),
        }
    }

    pub fn count_steps(&self, status: StepStatus) -> usize {
        self.steps.iter().filter(|s| s.status == status).count()
    }
}

/// Overall status of a run
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Passed,
    Failed,
    Cancelled,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Passed => "passed",
            RunStatus::Failed => "failed",
            RunStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TestRunResult {
    pub run_id: String,
    pub name: Option<String>,
    pub environment: Option<String>,
    pub status: RunStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_ms: u64,
    pub total_tests: usize,
    pub passed_tests: usize,
    /// Failed and errored tests
    pub failed_tests: usize,
    /// Skipped and cancelled tests
    pub skipped_tests: usize,
    pub results: Vec<TestExecutionResult>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl TestRunResult {
    pub fn failures(&self) -> impl Iterator<Item = &TestExecutionResult> {
        self.results.iter().filter(|r| r.status.is_failure())
    }
}

/// Snapshot of run progress, recomputed after every finalized result
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RunProgress {
    pub total: usize,
    pub completed: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub percentage: f64,
    pub elapsed_ms: u64,
    pub estimated_remaining_ms: Option<u64>,
    /// Name of the test case at the head of the queue
    pub current_test: Option<String>,
}

/// Counters accumulated across every run of one runner
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RunnerStats {
    pub total_runs: u64,
    pub cancelled_runs: u64,
    pub total_tests: u64,
    pub passed_tests: u64,
    pub failed_tests: u64,
    pub skipped_tests: u64,
    pub total_duration_ms: u64,
    pub last_run_id: Option<String>,
}

impl RunnerStats {
    pub fn record(&mut self, run: &TestRunResult) {
        self.total_runs += 1;
        if run.status == RunStatus::Cancelled {
            self.cancelled_runs += 1;
        }
        self.total_tests += run.total_tests as u64;
        self.passed_tests += run.passed_tests as u64;
        self.failed_tests += run.failed_tests as u64;
        self.skipped_tests += run.skipped_tests as u64;
        self.total_duration_ms += run.duration_ms;
        self.last_run_id = Some(run.run_id.clone());
    }
}

pub(crate) fn elapsed_ms(start: DateTime<Utc>, end: DateTime<Utc>) -> u64 {
    (end - start).num_milliseconds().max(0) as u64
}
