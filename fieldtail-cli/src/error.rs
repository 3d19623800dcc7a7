//! CLI-specific error types and exit code mapping

use fieldtail_core::error::FieldtailError;
use fieldtail_log_pipeline::LogPipelineError;

/// CLI-specific error type.
///
/// The `exit_code()` method maps errors to process exit codes.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading or validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// A subcommand-specific operation failed.
    #[error("{0}")]
    Command(String),

    /// The referenced rule or alert does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Rule, label or bundle input was rejected.
    #[error("invalid input: {0}")]
    Invalid(String),

    /// JSON (de)serialisation failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error (file read, stdout write, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapped domain error from fieldtail-core.
    #[error("{0}")]
    Core(#[from] FieldtailError),

    /// Storage or pipeline error.
    #[error("store error: {0}")]
    Store(String),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                          |
    /// |------|----------------------------------|
    /// | 0    | Success                          |
    /// | 1    | General / command error          |
    /// | 2    | Configuration error              |
    /// | 3    | Rule or alert not found          |
    /// | 4    | Invalid rule, label or bundle    |
    /// | 10   | IO error                         |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::NotFound(_) => 3,
            Self::Invalid(_) => 4,
            Self::Io(_) => 10,
            Self::Json(_) | Self::Command(_) | Self::Core(_) | Self::Store(_) => 1,
        }
    }
}

impl From<LogPipelineError> for CliError {
    fn from(e: LogPipelineError) -> Self {
        match e {
            LogPipelineError::RuleNotFound(_) | LogPipelineError::AlertNotFound(_) => {
                Self::NotFound(e.to_string())
            }
            LogPipelineError::RuleValidation { .. }
            | LogPipelineError::Import(_)
            | LogPipelineError::Config { .. } => Self::Invalid(e.to_string()),
            other => Self::Store(other.to_string()),
        }
    }
}
