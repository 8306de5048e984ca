pub mod context;
pub mod controller;
pub mod error;
pub mod events;
pub mod executor;
pub mod hooks;
pub mod queue;
pub mod scheduler;
pub mod state;

#[cfg(test)]
pub(crate) mod test_support;

use crate::parser::yaml::load_test_cases;
use crate::report::{json, junit};
use crate::utils::config::RunConfig;
use crate::utils::data::{load_data_rows, merge_row, DataRow};
use anyhow::Result;
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;

pub use controller::TestRunner;
pub use error::RunnerError;
pub use events::*;
pub use hooks::{NoopHooks, RunCallbacks, RunHooks};
pub use state::*;

/// What the `run` command asks for, beyond the runner options
#[derive(Debug, Clone)]
pub struct RunTestsOptions {
    pub path: PathBuf,
    pub config: RunConfig,
    /// CSV file: one run per row, row values layered over `config.variables`
    pub data: Option<PathBuf>,
    pub output: PathBuf,
    pub junit: bool,
}

/// Load the suites under `path` and run them, once per data row when a
/// data file is given. Returns whether every run passed.
pub async fn run_tests(runner: Arc<TestRunner>, options: &RunTestsOptions) -> Result<bool> {
    let cases = load_test_cases(&options.path)?;
    if cases.is_empty() {
        println!("{} No test cases found.", "ℹ".blue());
        return Ok(true);
    }

    let rows: Vec<Option<DataRow>> = match options.data {
        Some(ref data) => {
            let rows = load_data_rows(data)?;
            if rows.is_empty() {
                anyhow::bail!("Data file has no rows: {}", data.display());
            }
            rows.into_iter().map(Some).collect()
        }
        None => vec![None],
    };
    let iterated = rows.len() > 1;

    std::fs::create_dir_all(&options.output)?;

    let mut all_passed = true;
    for (i, row) in rows.iter().enumerate() {
        let config = config_for_row(&options.config, row.as_ref(), i, iterated);

        let listener = tokio::spawn(ConsoleEventListener::listen(runner.subscribe()));
        let result = match runner.run_all(&cases, Some(config)).await {
            Ok(result) => {
                let _ = listener.await;
                result
            }
            Err(e) => {
                listener.abort();
                return Err(e.into());
            }
        };

        let suffix = if iterated {
            format!("-{}", i + 1)
        } else {
            String::new()
        };
        let results_path = options.output.join(format!("results{}.json", suffix));
        json::write_results(&result, &results_path)?;
        println!("    Results saved to: {}", results_path.display());

        if options.junit {
            junit::write_report(&result, &options.output, &format!("junit{}.xml", suffix))?;
        }

        all_passed &= result.status == RunStatus::Passed;
        if result.status == RunStatus::Cancelled {
            log::info!("run cancelled, skipping remaining data rows");
            break;
        }
    }

    Ok(all_passed)
}

fn config_for_row(base: &RunConfig, row: Option<&DataRow>, index: usize, iterated: bool) -> RunConfig {
    let mut config = base.clone();
    let Some(row) = row else {
        return config;
    };

    config.variables = merge_row(&base.variables, row);
    config
        .metadata
        .insert("dataRow".to_string(), serde_json::json!(index));
    if iterated {
        config.run_id = uuid::Uuid::new_v4().to_string();
        config.name = Some(format!(
            "{} [{}]",
            base.name.as_deref().unwrap_or("run"),
            index + 1
        ));
    }
    config
}
