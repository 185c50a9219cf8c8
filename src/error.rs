//! Error types for the idle timer core.

/// Result type for idle timer operations.
pub type Result<T> = std::result::Result<T, IdleError>;

/// Errors raised while setting up an idle timer.
#[derive(Debug, thiserror::Error)]
pub enum IdleError {
    /// Mutually exclusive or out-of-range options.
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Deadlines are tokio tasks, so a runtime must be reachable at setup.
    #[error("No tokio runtime available to schedule deadlines")]
    NoRuntime,
}
