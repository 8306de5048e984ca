use super::hooks::RunHooks;
use super::state::{StepResult, TestExecutionResult, TestRunResult};
use crate::driver::traits::{StepContext, StepExecutor};
use crate::parser::types::{RecordedStep, TestCase};
use crate::utils::config::RunConfig;
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Step executor driven by the step type:
/// `pass`, `fail: msg`, `sleep: ms`, `snap: shot`, `failSnap: shot`,
/// `crash`, `expectVar: "k=v"`, `flaky: n` (fails the first n calls).
#[derive(Default)]
pub struct ScriptedSteps {
    calls: AtomicUsize,
    flaky: Mutex<HashMap<String, u64>>,
    starts: Mutex<Vec<(String, Instant)>>,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedSteps {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of `sleep` steps seen running at once
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn starts(&self) -> Vec<(String, Instant)> {
        self.starts.lock().unwrap().clone()
    }
}

#[async_trait]
impl StepExecutor for ScriptedSteps {
    async fn execute(&self, step: &RecordedStep, ctx: StepContext<'_>) -> Result<StepResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.starts
            .lock()
            .unwrap()
            .push((ctx.test_case.id.clone(), Instant::now()));
        let started = Utc::now();
        let text = step.value.as_str().unwrap_or_default().to_string();

        let result = match step.step_type.as_str() {
            "pass" => StepResult::passed(step, started),
            "fail" => StepResult::failed(step, started, text),
            "sleep" => {
                let ms = step.value.as_u64().unwrap_or(0);
                let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak.fetch_max(now_active, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(ms)).await;
                self.active.fetch_sub(1, Ordering::SeqCst);
                StepResult::passed(step, started)
            }
            "snap" => StepResult::passed(step, started).with_screenshot(text),
            "failSnap" => StepResult::failed(step, started, "snap failed").with_screenshot(text),
            "crash" => anyhow::bail!("executor exploded"),
            "expectVar" => {
                let (key, want) = text.split_once('=').unwrap_or((text.as_str(), ""));
                match ctx.variables.get(key) {
                    Some(v) if v == want => StepResult::passed(step, started),
                    other => StepResult::failed(step, started, format!("{} was {:?}", key, other)),
                }
            }
            "flaky" => {
                let fail_times = step.value.as_u64().unwrap_or(0);
                let mut seen = self.flaky.lock().unwrap();
                let count = seen.entry(step.id.clone()).or_insert(0);
                *count += 1;
                if *count <= fail_times {
                    StepResult::failed(step, started, format!("flaky failure {}", count))
                } else {
                    StepResult::passed(step, started)
                }
            }
            other => anyhow::bail!("unknown scripted step {}", other),
        };
        Ok(result)
    }
}

/// Hooks that record every invocation and can be told to fail
#[derive(Default)]
pub struct RecordingHooks {
    pub fail_before_all: bool,
    pub fail_after_all: bool,
    pub fail_before_each: bool,
    pub fail_after_each: bool,
    pub(crate) events: Mutex<Vec<String>>,
}

impl RecordingHooks {
    pub fn count(&self, name: &str) -> usize {
        self.events.lock().unwrap().iter().filter(|e| *e == name).count()
    }

    pub fn total(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    fn record(&self, name: &str, fail: bool) -> Result<()> {
        self.events.lock().unwrap().push(name.to_string());
        if fail {
            anyhow::bail!("{} exploded", name);
        }
        Ok(())
    }
}

#[async_trait]
impl RunHooks for RecordingHooks {
    async fn before_all(&self, _config: &RunConfig) -> Result<()> {
        self.record("beforeAll", self.fail_before_all)
    }

    async fn after_all(&self, _result: &TestRunResult) -> Result<()> {
        self.record("afterAll", self.fail_after_all)
    }

    async fn before_each(&self, _test_case: &TestCase) -> Result<()> {
        self.record("beforeEach", self.fail_before_each)
    }

    async fn after_each(&self, _result: &TestExecutionResult) -> Result<()> {
        self.record("afterEach", self.fail_after_each)
    }
}

pub fn passing_case(id: &str) -> TestCase {
    TestCase::new(id, id).with_step("pass", serde_json::Value::Null)
}

pub fn failing_case(id: &str) -> TestCase {
    TestCase::new(id, id).with_step("fail", serde_json::json!(format!("{} failed", id)))
}

pub fn sleeping_case(id: &str, ms: u64) -> TestCase {
    TestCase::new(id, id).with_step("sleep", serde_json::json!(ms))
}
