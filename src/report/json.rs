use crate::runner::state::TestRunResult;
use anyhow::{Context, Result};
use std::path::Path;

/// Write a run result as pretty JSON
pub fn write_results(result: &TestRunResult, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(result)?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write results: {}", path.display()))?;
    Ok(())
}

pub fn read_results(path: &Path) -> Result<TestRunResult> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read results: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Invalid results file: {}", path.display()))
}

/// Print or save any serializable report
pub fn emit<T: serde::Serialize>(value: &T, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;

    if let Some(path) = output {
        std::fs::write(path, json)?;
        println!("JSON report saved to: {}", path.display());
    } else {
        println!("{}", json);
    }

    Ok(())
}
