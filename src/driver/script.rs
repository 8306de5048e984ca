use super::traits::{StepContext, StepExecutor};
use crate::parser::types::RecordedStep;
use crate::runner::state::StepResult;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::Duration;

/// `${name}` where name may contain dots
static VAR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([a-zA-Z0-9_.]+)\}").expect("valid variable pattern"));

#[derive(Debug, Deserialize)]
struct AssertVarParams {
    name: String,
    equals: String,
}

/// Step executor for the built-in scripted vocabulary used by YAML suites
#[derive(Debug, Default, Clone)]
pub struct ScriptedExecutor;

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StepExecutor for ScriptedExecutor {
    async fn execute(&self, step: &RecordedStep, ctx: StepContext<'_>) -> Result<StepResult> {
        let started_at = Utc::now();
        let vars = ctx.variables;

        let outcome = match step.step_type.as_str() {
            "pass" => Ok(()),
            "fail" => {
                let message = match text_param(&step.value) {
                    Some(m) => substitute_vars(&m, vars),
                    None => "Step failed".to_string(),
                };
                Err(message)
            }
            "log" => {
                let message = substitute_vars(&text_param(&step.value).unwrap_or_default(), vars);
                log::info!("[{}] {}", ctx.test_case.id, message);
                Ok(())
            }
            "wait" => {
                let ms = wait_millis(&step.value, vars)?;
                tokio::time::sleep(Duration::from_millis(ms)).await;
                Ok(())
            }
            "shell" => {
                let command = text_param(&step.value)
                    .ok_or_else(|| anyhow::anyhow!("shell step requires a command"))?;
                run_shell(&substitute_vars(&command, vars), ctx).await?
            }
            "assertVar" => {
                let params: AssertVarParams = serde_json::from_value(step.value.clone())
                    .context("assertVar expects { name, equals }")?;
                let expected = substitute_vars(&params.equals, vars);
                match lookup(&params.name, vars) {
                    Some(actual) if actual == expected => Ok(()),
                    Some(actual) => Err(format!(
                        "Variable '{}' expected '{}' but was '{}'",
                        params.name, expected, actual
                    )),
                    None => Err(format!("Variable '{}' is not set", params.name)),
                }
            }
            other => Err(format!("Unsupported step type: {}", other)),
        };

        Ok(match outcome {
            Ok(()) => StepResult::passed(step, started_at),
            Err(message) => StepResult::failed(step, started_at, message),
        })
    }
}

fn text_param(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn wait_millis(value: &serde_json::Value, vars: &HashMap<String, String>) -> Result<u64> {
    if let Some(ms) = value.as_u64() {
        return Ok(ms);
    }
    let raw = text_param(value).ok_or_else(|| anyhow::anyhow!("wait step requires milliseconds"))?;
    substitute_vars(&raw, vars)
        .trim()
        .parse()
        .with_context(|| format!("Invalid wait duration: {}", raw))
}

/// Non-zero exit is a step failure; failing to spawn `sh` is an executor error.
/// The child is killed if the step is dropped, e.g. by the test deadline.
async fn run_shell(command: &str, ctx: StepContext<'_>) -> Result<std::result::Result<(), String>> {
    let mut cmd = tokio::process::Command::new("sh");
    cmd.arg("-c").arg(command).envs(ctx.variables).kill_on_drop(true);
    if let Some(base_url) = ctx.base_url {
        cmd.env("BASE_URL", base_url);
    }

    let output = cmd
        .output()
        .await
        .with_context(|| format!("Failed to spawn shell for: {}", command))?;

    if output.status.success() {
        log::debug!(
            "shell ok: {}",
            String::from_utf8_lossy(&output.stdout).trim()
        );
        Ok(Ok(()))
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        Ok(Err(if stderr.is_empty() {
            format!("Command exited with {}", output.status)
        } else {
            format!("Command failed: {}", stderr)
        }))
    }
}

fn lookup(name: &str, vars: &HashMap<String, String>) -> Option<String> {
    vars.get(name)
        .cloned()
        .or_else(|| std::env::var(name).ok())
}

/// Substitute `${name}` from run variables, then the process environment.
/// Unknown names are left as written.
pub fn substitute_vars(text: &str, vars: &HashMap<String, String>) -> String {
    VAR_PATTERN
        .replace_all(text, |caps: &regex::Captures| {
            lookup(&caps[1], vars).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}
