pub mod driver;
pub mod parser;
pub mod report;
pub mod runner;
pub mod utils;

// Re-export common items
pub use driver::{ScriptedExecutor, StepContext, StepExecutor};
pub use parser::{load_test_cases, RecordedStep, TestCase};
pub use report::generate_report;
pub use runner::{run_tests, RunnerError, TestRunner};
pub use utils::{RunConfig, RunnerConfig};
