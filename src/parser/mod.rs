pub mod types;
pub mod yaml;

pub use types::{RecordedStep, RetryConfig, TestCase};
pub use yaml::load_test_cases;
