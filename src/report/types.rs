use crate::runner::state::{RunStatus, TestStatus};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FailedTest {
    pub id: String,
    pub name: String,
    pub error: Option<String>,
}

/// Headline numbers for a completed run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SummaryReport {
    pub run_id: String,
    pub name: Option<String>,
    pub status: RunStatus,
    pub total_tests: usize,
    pub passed_tests: usize,
    pub failed_tests: usize,
    pub skipped_tests: usize,
    /// Rounded percentage, 100 for an empty run
    pub pass_rate: u32,
    pub duration_ms: u64,
    pub duration: String,
    pub failures: Vec<FailedTest>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TestDetail {
    pub id: String,
    pub name: String,
    pub status: TestStatus,
    pub attempt: u32,
    pub duration_ms: u64,
    pub duration: String,
    pub total_steps: usize,
    pub passed_steps: usize,
    pub failed_steps: usize,
    pub skipped_steps: usize,
    pub error: Option<String>,
    pub screenshots: Vec<String>,
    pub started_at: String,
    pub finished_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DetailedReport {
    pub summary: SummaryReport,
    pub environment: Option<String>,
    pub started_at: String,
    pub finished_at: String,
    pub tests: Vec<TestDetail>,
}
