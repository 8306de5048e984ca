use serde::{Deserialize, Serialize};

/// A recorded test case: an ordered list of steps plus metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    pub id: String,

    pub name: String,

    #[serde(default)]
    pub steps: Vec<RecordedStep>,

    #[serde(default)]
    pub tags: Vec<String>,

    /// Per-case retry policy. Its presence also switches the step loop
    /// from fail-fast to collect-all-failures.
    #[serde(default, alias = "retry")]
    pub retry_config: Option<RetryConfig>,

    /// Per-case deadline override (ms)
    #[serde(default, alias = "timeout")]
    pub timeout_ms: Option<u64>,
}

impl TestCase {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            steps: Vec::new(),
            tags: Vec::new(),
            retry_config: None,
            timeout_ms: None,
        }
    }

    pub fn with_step(mut self, step_type: &str, value: serde_json::Value) -> Self {
        let index = self.steps.len();
        self.steps.push(RecordedStep {
            id: format!("{}-{}", self.id, index),
            step_type: step_type.to_string(),
            index,
            label: None,
            value,
        });
        self
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn with_retry(mut self, max_retries: u32, retry_delay_ms: u64) -> Self {
        self.retry_config = Some(RetryConfig {
            max_retries,
            retry_delay_ms,
        });
        self
    }

    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// True if any of the case's tags appears in `wanted` (already lowercased)
    pub fn matches_any_tag(&self, wanted: &[String]) -> bool {
        self.tags
            .iter()
            .any(|tag| wanted.contains(&tag.to_lowercase()))
    }
}

/// One recorded user action. Opaque to the engine beyond id/type/index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecordedStep {
    pub id: String,

    #[serde(rename = "type")]
    pub step_type: String,

    pub index: usize,

    #[serde(default)]
    pub label: Option<String>,

    #[serde(default)]
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RetryConfig {
    #[serde(default)]
    pub max_retries: u32,

    #[serde(default, alias = "retryDelay")]
    pub retry_delay_ms: u64,
}
