pub mod json;
pub mod junit;
pub mod summary;
pub mod types;

use anyhow::Result;
use std::path::Path;

pub use summary::{format_duration, generate_detailed_report, generate_summary_report};
pub use types::{DetailedReport, FailedTest, SummaryReport, TestDetail};

/// Generate report from a saved run result
pub fn generate_report(results_path: &Path, format: &str, output: Option<&Path>) -> Result<()> {
    let result = json::read_results(results_path)?;

    match format {
        "summary" => {
            let summary = generate_summary_report(&result);
            match output {
                Some(path) => json::emit(&summary, Some(path)),
                None => {
                    print!("{}", summary::render_summary(&summary));
                    Ok(())
                }
            }
        }
        "detailed" => {
            let report = generate_detailed_report(&result);
            match output {
                Some(path) => json::emit(&report, Some(path)),
                None => {
                    print!("{}", summary::render_detailed(&report));
                    Ok(())
                }
            }
        }
        "json" => json::emit(&result, output),
        "junit" => {
            let xml = junit::generate_junit_xml(&result)?;
            match output {
                Some(path) => {
                    std::fs::write(path, xml)?;
                    println!("JUnit report saved to: {}", path.display());
                }
                None => println!("{}", xml),
            }
            Ok(())
        }
        _ => anyhow::bail!("Unknown format: {}", format),
    }
}
