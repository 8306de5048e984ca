use super::state::{RunProgress, RunStatus, TestExecutionResult, TestStatus};
use tokio::sync::broadcast;

/// Run execution events for real-time updates
#[derive(Debug, Clone)]
pub enum TestEvent {
    // Run events
    RunStarted {
        run_id: String,
        name: Option<String>,
        total_tests: usize,
        max_concurrency: usize,
    },
    RunFinished {
        run_id: String,
        status: RunStatus,
        passed: usize,
        failed: usize,
        skipped: usize,
        duration_ms: u64,
    },

    // Test events
    TestStarted {
        test_id: String,
        name: String,
        attempt: u32,
        step_count: usize,
    },
    TestRetrying {
        test_id: String,
        name: String,
        attempt: u32,
        max_retries: u32,
        delay_ms: u64,
    },
    TestFinished {
        result: Box<TestExecutionResult>,
    },

    Progress(RunProgress),
}

/// Event emitter for broadcasting run events
#[derive(Clone)]
pub struct EventEmitter {
    sender: broadcast::Sender<TestEvent>,
}

impl EventEmitter {
    pub fn emit(&self, event: TestEvent) {
        // No subscribers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TestEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        let (sender, _) = broadcast::channel(256);
        Self { sender }
    }
}

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Console event listener for printing real-time updates.
/// Returns once the run it is following has finished.
pub struct ConsoleEventListener;

impl ConsoleEventListener {
    pub async fn listen(mut receiver: broadcast::Receiver<TestEvent>) {
        use colored::Colorize;
        use std::io::IsTerminal;

        let mut bar: Option<ProgressBar> = None;

        loop {
            let event = match receiver.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    log::debug!("console listener lagged, {} events dropped", missed);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };

            match event {
                TestEvent::RunStarted {
                    run_id,
                    name,
                    total_tests,
                    max_concurrency,
                } => {
                    println!(
                        "\n{} Run {} started: {} tests, concurrency {}",
                        "▶".green().bold(),
                        name.unwrap_or(run_id).cyan(),
                        total_tests,
                        max_concurrency
                    );

                    let pb = if std::io::stdout().is_terminal() {
                        ProgressBar::new(total_tests as u64)
                    } else {
                        // Piped output: no escape codes
                        ProgressBar::with_draw_target(
                            Some(total_tests as u64),
                            ProgressDrawTarget::hidden(),
                        )
                    };
                    if let Ok(style) = ProgressStyle::default_bar()
                        .template("  {bar:30.cyan/blue} {pos}/{len} {msg}")
                    {
                        pb.set_style(style);
                    }
                    bar = Some(pb);
                }

                TestEvent::TestStarted { name, attempt, .. } => {
                    if let Some(ref pb) = bar {
                        if attempt == 0 {
                            pb.set_message(name);
                        } else {
                            pb.set_message(format!("{} (attempt {})", name, attempt + 1));
                        }
                    }
                }

                TestEvent::TestRetrying {
                    name,
                    attempt,
                    max_retries,
                    delay_ms,
                    ..
                } => {
                    let line = format!(
                        "    {} {} {}",
                        "↻".yellow(),
                        name,
                        format!("retry {}/{} in {}ms", attempt, max_retries, delay_ms).yellow()
                    );
                    print_line(bar.as_ref(), line);
                }

                TestEvent::TestFinished { result } => {
                    let (icon, label) = match result.status {
                        TestStatus::Passed => ("✓".green(), "PASSED".green().bold()),
                        TestStatus::Failed => ("✗".red(), "FAILED".red().bold()),
                        TestStatus::Error => ("✗".red(), "ERROR".red().bold()),
                        TestStatus::Cancelled => ("○".yellow(), "CANCELLED".yellow().bold()),
                        _ => ("○".yellow(), "SKIPPED".yellow().bold()),
                    };
                    let mut line = format!(
                        "    {} {} [{}] ({}ms)",
                        icon, result.test_case_name, label, result.duration_ms
                    );
                    if let Some(ref error) = result.error {
                        line.push_str(&format!("\n        {}", error.dimmed()));
                    }
                    print_line(bar.as_ref(), line);
                }

                TestEvent::Progress(progress) => {
                    if let Some(ref pb) = bar {
                        pb.set_position(progress.completed as u64);
                    }
                }

                TestEvent::RunFinished {
                    status,
                    passed,
                    failed,
                    skipped,
                    duration_ms,
                    ..
                } => {
                    if let Some(pb) = bar.take() {
                        pb.finish_and_clear();
                    }
                    let status_str = match status {
                        RunStatus::Passed => "PASSED".green().bold(),
                        RunStatus::Failed => "FAILED".red().bold(),
                        RunStatus::Cancelled => "CANCELLED".yellow().bold(),
                    };
                    println!("\n{} Run finished [{}]", "■".blue().bold(), status_str);
                    println!(
                        "  {} passed, {} failed, {} skipped",
                        passed.to_string().green(),
                        failed.to_string().red(),
                        skipped.to_string().yellow()
                    );
                    println!("  Duration: {}ms", duration_ms);
                    break;
                }
            }
        }
    }
}

fn print_line(bar: Option<&ProgressBar>, line: String) {
    match bar {
        Some(pb) if !pb.is_hidden() => pb.println(line),
        _ => println!("{}", line),
    }
}
