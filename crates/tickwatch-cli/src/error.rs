use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] tickwatch_core::ValidationError),

    #[error(transparent)]
    Config(#[from] tickwatch_core::ConfigError),

    #[error("cannot parse price: {0}")]
    Parse(#[from] tickwatch_core::ParseError),

    #[error("strict mode failed: {failure_count} symbol(s) could not be checked")]
    StrictModeViolation { failure_count: usize },

    #[error(transparent)]
    Notify(#[from] tickwatch_core::NotifyError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) | Self::Config(_) | Self::Parse(_) => 2,
            Self::Serialization(_) => 4,
            Self::StrictModeViolation { .. } => 5,
            Self::Notify(_) => 6,
            Self::Io(_) => 10,
        }
    }
}
