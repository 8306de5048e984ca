use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;

use replay_runner::driver::ScriptedExecutor;
use replay_runner::runner::{self, RunTestsOptions, TestRunner};
use replay_runner::utils::{RunConfig, RunnerConfig};
use replay_runner::report;

#[derive(Parser)]
#[command(name = "replay-runner")]
#[command(version = "0.1.0")]
#[command(about = "Replay recorded test cases with retries and bounded concurrency", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run test file(s) or directory
    Run {
        /// Path to test file or directory
        path: PathBuf,

        /// Filter tests by tags (comma-separated)
        #[arg(short, long, value_delimiter = ',')]
        tags: Option<Vec<String>>,

        /// Maximum number of test cases running at once
        #[arg(short = 'j', long)]
        concurrency: Option<usize>,

        /// Retry failed tests up to N times
        #[arg(long)]
        retries: Option<u32>,

        /// Delay between retries (ms)
        #[arg(long)]
        retry_delay: Option<u64>,

        /// Per-test timeout (ms), 0 disables it
        #[arg(long)]
        timeout: Option<u64>,

        /// Skip remaining tests after the first failure
        #[arg(long, default_value = "false")]
        stop_on_first_failure: bool,

        /// CSV file, one run per row
        #[arg(long)]
        data: Option<PathBuf>,

        /// Run variable (key=value). Can be specified multiple times.
        #[arg(long = "var", value_parser = parse_key_value)]
        vars: Vec<(String, String)>,

        /// Runner options file (YAML)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Run name
        #[arg(long)]
        name: Option<String>,

        /// Environment label recorded in the results
        #[arg(long)]
        env: Option<String>,

        /// Base URL handed to step executors
        #[arg(long)]
        base_url: Option<String>,

        /// Output directory for results
        #[arg(short, long, default_value = "./output")]
        output: PathBuf,

        /// Also write a JUnit XML report
        #[arg(long, default_value = "false")]
        junit: bool,
    },

    /// Generate report from test results
    Report {
        /// Path to test results JSON
        results: PathBuf,

        /// Output format (summary, detailed, json, junit)
        #[arg(short, long, default_value = "summary")]
        format: String,

        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected key=value, got '{}'", s))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            path,
            tags,
            concurrency,
            retries,
            retry_delay,
            timeout,
            stop_on_first_failure,
            data,
            vars,
            config,
            name,
            env,
            base_url,
            output,
            junit,
        } => {
            // defaults <- config file <- flags
            let mut options = match config {
                Some(ref file) => RunnerConfig::load(file)?,
                None => RunnerConfig::default(),
            };
            if let Some(n) = concurrency {
                options.max_concurrency = n;
            }
            if let Some(n) = retries {
                options.retry_failed_tests = n > 0;
                options.max_retries = n;
            }
            if let Some(ms) = retry_delay {
                options.retry_delay_ms = ms;
            }
            if let Some(ms) = timeout {
                options.timeout_ms = ms;
            }
            if stop_on_first_failure {
                options.stop_on_first_failure = true;
            }

            println!(
                "{} Running tests from: {}",
                "▶".green().bold(),
                path.display()
            );
            println!(
                "  Concurrency: {}",
                options.concurrency().to_string().cyan()
            );
            if options.retry_failed_tests {
                println!(
                    "  Retries: {} ({}ms apart)",
                    options.max_retries.to_string().yellow(),
                    options.retry_delay_ms
                );
            }
            if let Some(ref tags_list) = tags {
                println!("  Tags: {}", tags_list.join(", ").yellow());
            }
            if let Some(ref file) = data {
                println!("  Data: {}", file.display().to_string().cyan());
            }
            println!("  Output: {}", output.display().to_string().cyan());

            let run_config = RunConfig {
                name,
                environment: env,
                base_url,
                tags: tags.unwrap_or_default(),
                variables: vars.into_iter().collect(),
                ..RunConfig::default()
            };

            let test_runner = Arc::new(TestRunner::new(Arc::new(ScriptedExecutor::new()), options));

            let cancel_handle = test_runner.clone();
            ctrlc::set_handler(move || {
                println!("\n{} Cancelling run...", "⏹".yellow());
                cancel_handle.cancel();
            })?;

            let passed = runner::run_tests(
                test_runner,
                &RunTestsOptions {
                    path,
                    config: run_config,
                    data,
                    output,
                    junit,
                },
            )
            .await?;

            if !passed {
                std::process::exit(1);
            }
        }

        Commands::Report {
            results,
            format,
            output,
        } => {
            report::generate_report(&results, &format, output.as_deref())?;
        }
    }

    Ok(())
}
