use super::types::{DetailedReport, FailedTest, SummaryReport, TestDetail};
use crate::runner::state::{RunStatus, StepStatus, TestRunResult, TestStatus};
use chrono::{DateTime, SecondsFormat, Utc};
use colored::Colorize;

pub fn generate_summary_report(result: &TestRunResult) -> SummaryReport {
    let pass_rate = if result.total_tests == 0 {
        100
    } else {
        (result.passed_tests as f64 / result.total_tests as f64 * 100.0).round() as u32
    };

    SummaryReport {
        run_id: result.run_id.clone(),
        name: result.name.clone(),
        status: result.status,
        total_tests: result.total_tests,
        passed_tests: result.passed_tests,
        failed_tests: result.failed_tests,
        skipped_tests: result.skipped_tests,
        pass_rate,
        duration_ms: result.duration_ms,
        duration: format_duration(result.duration_ms),
        failures: result
            .failures()
            .map(|r| FailedTest {
                id: r.test_case_id.clone(),
                name: r.test_case_name.clone(),
                error: r.error.clone(),
            })
            .collect(),
    }
}

pub fn generate_detailed_report(result: &TestRunResult) -> DetailedReport {
    let tests = result
        .results
        .iter()
        .map(|r| TestDetail {
            id: r.test_case_id.clone(),
            name: r.test_case_name.clone(),
            status: r.status,
            attempt: r.attempt,
            duration_ms: r.duration_ms,
            duration: format_duration(r.duration_ms),
            total_steps: r.steps.len(),
            passed_steps: r.count_steps(StepStatus::Passed),
            failed_steps: r.count_steps(StepStatus::Failed),
            skipped_steps: r.count_steps(StepStatus::Skipped),
            error: r.error.clone(),
            screenshots: r.screenshots.clone(),
            started_at: iso(r.start_time),
            finished_at: iso(r.end_time),
        })
        .collect();

    DetailedReport {
        summary: generate_summary_report(result),
        environment: result.environment.clone(),
        started_at: iso(result.start_time),
        finished_at: iso(result.end_time),
        tests,
    }
}

/// `350ms`, `2.5s`, `3m 5s`
pub fn format_duration(ms: u64) -> String {
    if ms < 1000 {
        format!("{}ms", ms)
    } else if ms < 60_000 {
        format!("{:.1}s", ms as f64 / 1000.0)
    } else {
        let secs = ms / 1000;
        format!("{}m {}s", secs / 60, secs % 60)
    }
}

fn iso(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Terminal rendering of a summary
pub fn render_summary(summary: &SummaryReport) -> String {
    let status = match summary.status {
        RunStatus::Passed => "PASSED".green().bold(),
        RunStatus::Failed => "FAILED".red().bold(),
        RunStatus::Cancelled => "CANCELLED".yellow().bold(),
    };

    let mut out = format!(
        "{} {} [{}]\n  Tests: {} total, {} passed, {} failed, {} skipped\n  Pass rate: {}%\n  Duration: {}\n",
        "■".blue().bold(),
        summary.name.as_deref().unwrap_or(&summary.run_id),
        status,
        summary.total_tests,
        summary.passed_tests.to_string().green(),
        summary.failed_tests.to_string().red(),
        summary.skipped_tests.to_string().yellow(),
        summary.pass_rate,
        summary.duration
    );

    if !summary.failures.is_empty() {
        out.push_str("  Failures:\n");
        for f in &summary.failures {
            out.push_str(&format!(
                "    {} {}: {}\n",
                "✗".red(),
                f.name,
                f.error.as_deref().unwrap_or("unknown error").dimmed()
            ));
        }
    }
    out
}

pub fn render_detailed(report: &DetailedReport) -> String {
    let mut out = render_summary(&report.summary);
    out.push_str(&format!(
        "  Started: {}\n  Finished: {}\n",
        report.started_at, report.finished_at
    ));
    for t in &report.tests {
        let icon = match t.status {
            TestStatus::Passed => "✓".green(),
            TestStatus::Failed | TestStatus::Error => "✗".red(),
            _ => "○".yellow(),
        };
        out.push_str(&format!(
            "  {} {} [{}] {} steps: {} passed, {} failed, {} skipped ({}, attempt {})\n",
            icon,
            t.name,
            t.status.as_str(),
            t.total_steps,
            t.passed_steps,
            t.failed_steps,
            t.skipped_steps,
            t.duration,
            t.attempt
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::state::{TestExecutionResult, TestRunResult};
    use chrono::TimeZone;
    use std::collections::HashMap;

    fn result_with(status: TestStatus, id: &str) -> TestExecutionResult {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        TestExecutionResult {
            test_case_id: id.to_string(),
            test_case_name: format!("Test {}", id),
            status,
            start_time: start,
            end_time: start + chrono::Duration::milliseconds(1500),
            duration_ms: 1500,
            attempt: 0,
            error: status.is_failure().then(|| "Element not found".to_string()),
            steps: Vec::new(),
            screenshots: Vec::new(),
        }
    }

    fn run_of(results: Vec<TestExecutionResult>) -> TestRunResult {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let passed = results.iter().filter(|r| r.status == TestStatus::Passed).count();
        let failed = results.iter().filter(|r| r.status.is_failure()).count();
        let skipped = results.iter().filter(|r| r.status.is_skipped()).count();
        TestRunResult {
            run_id: "run-1".to_string(),
            name: None,
            environment: Some("staging".to_string()),
            status: if failed > 0 {
                RunStatus::Failed
            } else {
                RunStatus::Passed
            },
            start_time: start,
            end_time: start + chrono::Duration::milliseconds(65_000),
            duration_ms: 65_000,
            total_tests: results.len(),
            passed_tests: passed,
            failed_tests: failed,
            skipped_tests: skipped,
            results,
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn test_pass_rate_rounds() {
        let run = run_of(vec![
            result_with(TestStatus::Passed, "a"),
            result_with(TestStatus::Passed, "b"),
            result_with(TestStatus::Failed, "c"),
        ]);
        let summary = generate_summary_report(&run);
        assert_eq!(summary.pass_rate, 67);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].name, "Test c");
        assert_eq!(summary.duration, "1m 5s");
    }

    #[test]
    fn test_empty_run_is_full_pass_rate() {
        let summary = generate_summary_report(&run_of(Vec::new()));
        assert_eq!(summary.pass_rate, 100);
        assert!(summary.failures.is_empty());
    }

    #[test]
    fn test_errors_count_as_failures() {
        let run = run_of(vec![
            result_with(TestStatus::Error, "a"),
            result_with(TestStatus::Skipped, "b"),
        ]);
        let summary = generate_summary_report(&run);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.pass_rate, 0);
    }

    #[test]
    fn test_detailed_report_iso_timestamps() {
        let run = run_of(vec![result_with(TestStatus::Passed, "a")]);
        let report = generate_detailed_report(&run);
        assert_eq!(report.started_at, "2024-01-01T12:00:00.000Z");
        assert_eq!(report.finished_at, "2024-01-01T12:01:05.000Z");
        assert_eq!(report.tests[0].finished_at, "2024-01-01T12:00:01.500Z");
        assert_eq!(report.tests[0].duration, "1.5s");
        assert_eq!(report.environment.as_deref(), Some("staging"));
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0ms");
        assert_eq!(format_duration(999), "999ms");
        assert_eq!(format_duration(2500), "2.5s");
        assert_eq!(format_duration(125_000), "2m 5s");
    }

    #[test]
    fn test_render_lists_failures() {
        colored::control::set_override(false);
        let run = run_of(vec![result_with(TestStatus::Failed, "c")]);
        let text = render_summary(&generate_summary_report(&run));
        assert!(text.contains("run-1 [FAILED]"));
        assert!(text.contains("Test c: Element not found"));
    }
}
