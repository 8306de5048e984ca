use crate::runner::state::{TestExecutionResult, TestRunResult, TestStatus};
use anyhow::Result;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Cursor;
use std::path::Path;

fn seconds(ms: u64) -> String {
    (ms as f64 / 1000.0).to_string()
}

/// Generate JUnit XML for a run
pub fn generate_junit_xml(result: &TestRunResult) -> Result<String> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let suite_name = result.name.as_deref().unwrap_or("replay-runner");
    let total = result.total_tests.to_string();
    let failures = result
        .results
        .iter()
        .filter(|r| r.status == TestStatus::Failed)
        .count()
        .to_string();
    let errors = result
        .results
        .iter()
        .filter(|r| r.status == TestStatus::Error)
        .count()
        .to_string();
    let skipped = result.skipped_tests.to_string();
    let time = seconds(result.duration_ms);

    // <testsuites>
    let mut suites_start = BytesStart::new("testsuites");
    suites_start.push_attribute(("name", suite_name));
    suites_start.push_attribute(("tests", total.as_str()));
    suites_start.push_attribute(("failures", failures.as_str()));
    suites_start.push_attribute(("errors", errors.as_str()));
    suites_start.push_attribute(("skipped", skipped.as_str()));
    suites_start.push_attribute(("time", time.as_str()));
    writer.write_event(Event::Start(suites_start))?;

    // One <testsuite> per run
    let timestamp = result.start_time.to_rfc3339();
    let mut suite_start = BytesStart::new("testsuite");
    suite_start.push_attribute(("name", suite_name));
    suite_start.push_attribute(("id", result.run_id.as_str()));
    suite_start.push_attribute(("tests", total.as_str()));
    suite_start.push_attribute(("failures", failures.as_str()));
    suite_start.push_attribute(("errors", errors.as_str()));
    suite_start.push_attribute(("skipped", skipped.as_str()));
    suite_start.push_attribute(("time", time.as_str()));
    suite_start.push_attribute(("timestamp", timestamp.as_str()));
    writer.write_event(Event::Start(suite_start))?;

    for test in &result.results {
        write_test_case(&mut writer, suite_name, test)?;
    }

    writer.write_event(Event::End(BytesEnd::new("testsuite")))?;
    writer.write_event(Event::End(BytesEnd::new("testsuites")))?;

    let bytes = writer.into_inner().into_inner();
    Ok(String::from_utf8(bytes)?)
}

fn write_test_case<W: std::io::Write>(
    writer: &mut Writer<W>,
    classname: &str,
    test: &TestExecutionResult,
) -> Result<()> {
    let mut case_start = BytesStart::new("testcase");
    case_start.push_attribute(("name", test.test_case_name.as_str()));
    case_start.push_attribute(("classname", classname));
    case_start.push_attribute(("time", seconds(test.duration_ms).as_str()));
    writer.write_event(Event::Start(case_start))?;

    let message = test.error.as_deref().unwrap_or("Unknown error");
    match test.status {
        TestStatus::Failed | TestStatus::Error => {
            let (tag, kind) = if test.status == TestStatus::Failed {
                ("failure", "StepFailure")
            } else {
                ("error", "ExecutionError")
            };
            let mut start = BytesStart::new(tag);
            start.push_attribute(("message", message));
            start.push_attribute(("type", kind));
            writer.write_event(Event::Start(start))?;
            writer.write_event(Event::Text(BytesText::new(message)))?;
            writer.write_event(Event::End(BytesEnd::new(tag)))?;
        }
        TestStatus::Skipped | TestStatus::Cancelled => {
            writer.write_event(Event::Empty(BytesStart::new("skipped")))?;
        }
        _ => {}
    }

    writer.write_event(Event::End(BytesEnd::new("testcase")))?;
    Ok(())
}

/// Write `junit.xml` into the output directory
pub fn write_report(result: &TestRunResult, output_dir: &Path, file_name: &str) -> Result<()> {
    let xml = generate_junit_xml(result)?;
    let path = output_dir.join(file_name);
    std::fs::write(&path, xml)?;
    println!("    Generated JUnit report: {}", path.display());
    Ok(())
}
