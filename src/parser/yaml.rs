use super::types::{RecordedStep, RetryConfig, TestCase};
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Load test cases from a YAML file or a directory of YAML files
pub fn load_test_cases(path: &Path) -> Result<Vec<TestCase>> {
    let mut cases = Vec::new();
    for file in collect_suite_files(path) {
        cases.extend(parse_test_file(&file)?);
    }

    let mut seen = HashSet::new();
    for case in &cases {
        if !seen.insert(case.id.as_str()) {
            anyhow::bail!("Duplicate test case id: {}", case.id);
        }
    }

    Ok(cases)
}

fn collect_suite_files(path: &Path) -> Vec<PathBuf> {
    if !path.is_dir() {
        return vec![path.to_path_buf()];
    }

    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.path()
                .extension()
                .map_or(false, |ext| ext == "yaml" || ext == "yml")
        })
        .map(|e| e.path().to_path_buf())
        .collect();
    // WalkDir order is filesystem dependent
    files.sort();
    files
}

/// Parse a YAML suite file into test cases
pub fn parse_test_file(path: &Path) -> Result<Vec<TestCase>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;

    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("suite");

    parse_yaml_content(&content, stem)
        .with_context(|| format!("Failed to parse suite: {}", path.display()))
}

/// Parse YAML content. The document is either a single test case mapping
/// or a mapping with a `tests` sequence.
pub fn parse_yaml_content(content: &str, default_prefix: &str) -> Result<Vec<TestCase>> {
    let value: serde_yaml::Value =
        serde_yaml::from_str(content).context("Failed to parse YAML content")?;

    let serde_yaml::Value::Mapping(ref map) = value else {
        anyhow::bail!("Invalid suite format: expected a mapping");
    };

    match map.get(&serde_yaml::Value::String("tests".to_string())) {
        Some(serde_yaml::Value::Sequence(seq)) => seq
            .iter()
            .enumerate()
            .map(|(i, item)| parse_case_value(item, &format!("{}-{}", default_prefix, i + 1)))
            .collect(),
        Some(_) => anyhow::bail!("Invalid suite format: `tests` must be a sequence"),
        None => Ok(vec![parse_case_value(&value, default_prefix)?]),
    }
}

fn parse_case_value(value: &serde_yaml::Value, default_id: &str) -> Result<TestCase> {
    #[derive(serde::Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct RawCase {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        tags: Vec<String>,
        #[serde(default, alias = "timeoutMs")]
        timeout: Option<u64>,
        #[serde(default, alias = "retryConfig")]
        retry: Option<RetryConfig>,
        #[serde(default)]
        steps: Vec<serde_yaml::Value>,
    }

    let raw: RawCase =
        serde_yaml::from_value(value.clone()).context("Failed to parse test case")?;

    let id = raw.id.unwrap_or_else(|| default_id.to_string());
    let name = raw.name.unwrap_or_else(|| id.clone());

    let mut steps = Vec::with_capacity(raw.steps.len());
    for (index, step) in raw.steps.iter().enumerate() {
        let (step_type, value, label) = parse_step_value(step)
            .with_context(|| format!("Invalid step {} in test case '{}'", index, id))?;
        steps.push(RecordedStep {
            id: format!("{}-{}", id, index),
            step_type,
            index,
            label,
            value,
        });
    }

    Ok(TestCase {
        id,
        name,
        steps,
        tags: raw.tags,
        retry_config: raw.retry,
        timeout_ms: raw.timeout,
    })
}

/// Parse one step: `- pass` or `- wait: 200`. A mapping may carry an extra
/// `label` key next to the action key.
fn parse_step_value(
    value: &serde_yaml::Value,
) -> Result<(String, serde_json::Value, Option<String>)> {
    match value {
        serde_yaml::Value::String(s) => Ok((s.clone(), serde_json::Value::Null, None)),

        serde_yaml::Value::Mapping(map) => {
            let label_key = serde_yaml::Value::String("label".to_string());
            let label = map
                .get(&label_key)
                .and_then(|v| v.as_str())
                .map(|s| s.to_string());

            let mut actions = map.iter().filter(|(k, _)| **k != label_key);
            let (key, params) = match (actions.next(), actions.next()) {
                (Some(action), None) => action,
                _ => anyhow::bail!("Invalid step format: expected single key mapping"),
            };

            let step_type = key
                .as_str()
                .ok_or_else(|| anyhow::anyhow!("Step type must be a string"))?;
            let params = serde_json::to_value(params).context("Unsupported step parameters")?;

            Ok((step_type.to_string(), params, label))
        }

        _ => anyhow::bail!("Invalid step format: {:?}", value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_case() {
        let yaml = r#"
id: login
name: Login works
tags: [smoke, Auth]
timeout: 5000
steps:
  - shell: "echo ${user}"
  - wait: 200
  - pass
"#;

        let cases = parse_yaml_content(yaml, "login").unwrap();
        assert_eq!(cases.len(), 1);
        let case = &cases[0];
        assert_eq!(case.name, "Login works");
        assert_eq!(case.timeout_ms, Some(5000));
        assert_eq!(case.steps.len(), 3);
        assert_eq!(case.steps[1].step_type, "wait");
        assert_eq!(case.steps[1].value, serde_json::json!(200));
        assert_eq!(case.steps[2].id, "login-2");
        assert!(case.retry_config.is_none());
    }

    #[test]
    fn test_parse_suite_with_defaults() {
        let yaml = r#"
tests:
  - name: First
    retry:
      maxRetries: 2
      retryDelay: 50
    steps:
      - label: Check user
        assertVar:
          name: user
          equals: alice
  - id: second
    steps: [pass]
"#;

        let cases = parse_yaml_content(yaml, "checkout").unwrap();
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[0].id, "checkout-1");
        assert_eq!(cases[0].name, "First");
        assert_eq!(
            cases[0].retry_config,
            Some(RetryConfig {
                max_retries: 2,
                retry_delay_ms: 50
            })
        );
        assert_eq!(cases[0].steps[0].label.as_deref(), Some("Check user"));
        assert_eq!(cases[0].steps[0].step_type, "assertVar");
        assert_eq!(cases[1].name, "second");
    }

    #[test]
    fn test_rejects_multi_key_step() {
        let yaml = r#"
steps:
  - wait: 1
    shell: "true"
"#;
        assert!(parse_yaml_content(yaml, "bad").is_err());
    }
}
