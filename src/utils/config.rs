use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Engine options, fixed for the lifetime of a runner
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct RunnerConfig {
    /// Upper bound on concurrently executing test cases (1 = sequential)
    pub max_concurrency: usize,

    /// Per-test deadline (ms), 0 disables it
    pub timeout_ms: u64,

    /// Retry failed tests even when they carry no retry config of their own
    pub retry_failed_tests: bool,

    /// Default retry count for failed tests
    pub max_retries: u32,

    /// Delay between retries (ms)
    pub retry_delay_ms: u64,

    /// Skip everything still queued after the first finalized failure
    pub stop_on_first_failure: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 1,
            timeout_ms: 30_000,
            retry_failed_tests: false,
            max_retries: 2,
            retry_delay_ms: 1000,
            stop_on_first_failure: false,
        }
    }
}

impl RunnerConfig {
    /// Load from a YAML file; missing keys keep their defaults
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_yaml(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn concurrency(&self) -> usize {
        self.max_concurrency.max(1)
    }
}

/// Per-run inputs, created once per `run_all` call
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct RunConfig {
    pub run_id: String,
    pub name: Option<String>,
    pub environment: Option<String>,
    /// Overrides the target base URL handed to step executors
    pub base_url: Option<String>,
    /// Only cases carrying at least one of these tags run (case-insensitive)
    pub tags: Vec<String>,
    pub variables: HashMap<String, String>,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            name: None,
            environment: None,
            base_url: None,
            tags: Vec::new(),
            variables: HashMap::new(),
            metadata: HashMap::new(),
        }
    }
}

impl RunConfig {
    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn with_variable(mut self, key: &str, value: &str) -> Self {
        self.variables.insert(key.to_string(), value.to_string());
        self
    }

    pub(crate) fn normalized_tags(&self) -> Vec<String> {
        self.tags.iter().map(|t| t.trim().to_lowercase()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = RunnerConfig::from_yaml("maxConcurrency: 4\nretryFailedTests: true\n").unwrap();
        assert_eq!(config.max_concurrency, 4);
        assert!(config.retry_failed_tests);
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.timeout_ms, 30_000);
    }

    #[test]
    fn test_zero_concurrency_is_sequential() {
        let config = RunnerConfig {
            max_concurrency: 0,
            ..Default::default()
        };
        assert_eq!(config.concurrency(), 1);
    }

    #[test]
    fn test_run_ids_are_unique() {
        assert_ne!(RunConfig::default().run_id, RunConfig::default().run_id);
    }
}
