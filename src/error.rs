use thiserror::Error;

/// Failures raised by the learning engine.
///
/// `PersistenceFailure` is the only recoverable kind: the in-memory session
/// has already advanced when it is reported, so callers may retry the write.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("no words left to select from")]
    EmptyPool,

    #[error("failed to persist: {0}")]
    PersistenceFailure(String),

    #[error("word not found: {0}")]
    NotFound(String),
}

impl EngineError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        EngineError::InvalidInput(msg.into())
    }

    pub fn is_recoverable(&self) -> bool {
        matches!(self, EngineError::PersistenceFailure(_))
    }
}

impl From<rusqlite::Error> for EngineError {
    fn from(e: rusqlite::Error) -> Self {
        EngineError::PersistenceFailure(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
