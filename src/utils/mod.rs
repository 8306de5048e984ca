pub mod config;
pub mod data;

pub use config::{RunConfig, RunnerConfig};
