use serde::Serialize;

/// Engine-level error taxonomy. Every domain failure is returned as one of
/// these; nothing is panicked past the engine boundary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("insufficient capacity: requested {requested}, available {available}")]
    Conflict { requested: u32, available: u32 },

    #[error("internal error: {0}")]
    Internal(String),

    #[error("storage failure: {0}")]
    Storage(String),

    #[error("catalog gateway failure: {0}")]
    Catalog(String),
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Machine-readable error code, stable across message wording changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NotFound,
    InvalidState,
    Conflict,
    InternalError,
    StorageError,
    CatalogError,
}

impl EngineError {
    pub fn code(&self) -> ErrorCode {
        match self {
            EngineError::NotFound(_) => ErrorCode::NotFound,
            EngineError::InvalidState(_) => ErrorCode::InvalidState,
            EngineError::Conflict { .. } => ErrorCode::Conflict,
            EngineError::Internal(_) => ErrorCode::InternalError,
            EngineError::Storage(_) => ErrorCode::StorageError,
            EngineError::Catalog(_) => ErrorCode::CatalogError,
        }
    }

    /// HTTP-equivalent status for the uniform result envelope.
    pub fn http_status(&self) -> u16 {
        match self {
            EngineError::NotFound(_) => 404,
            EngineError::InvalidState(_) => 400,
            EngineError::Conflict { .. } => 409,
            EngineError::Internal(_) => 500,
            EngineError::Storage(_) => 500,
            EngineError::Catalog(_) => 500,
        }
    }

    /// Conflict is the only retryable outcome: the caller may try fewer
    /// units or a different resource.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Conflict { .. })
    }
}
