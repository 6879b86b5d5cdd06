use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    /// Bad or missing caller input
    #[error("{0}")]
    Validation(String),
    #[error("unknown report '{0}'")]
    UnknownReport(String),
    /// A total left the decimal range
    #[error("total of '{0}' overflowed the decimal range")]
    Overflow(String),
    /// Query execution failed in the store
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl ReportError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

pub type ReportResult<T> = Result<T, ReportError>;
