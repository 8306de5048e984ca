use thiserror::Error;

/// Errors that escape the runner's public API. Test and step failures
/// never do; they are captured in the results.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Runner is already executing tests")]
    AlreadyRunning,

    #[error("beforeAll hook failed: {0:#}")]
    BeforeAllHook(anyhow::Error),
}
