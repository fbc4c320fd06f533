use thiserror::Error;

/// Stable error categories surfaced by every Core operation.
///
/// Synchronous operations (`Certificate::Request`, `Backup::Validate`) propagate
/// this type directly to the caller. Detached workers never propagate it to the
/// operation's original caller (the worker has already returned the intent id) —
/// instead they record `kind()`/`to_string()` on the intent row's `error_message`
/// and publish a failure event, per the error propagation rules.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("driver unavailable: {0}")]
    DriverUnavailable(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("integrity violation: {0}")]
    IntegrityViolation(String),

    #[error("state conflict: {0}")]
    StateConflict(String),

    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Error kind discriminant, exposed for callers that branch on category
/// rather than matching the full error (e.g. translating to a status code
/// in a surrounding API layer, which is out of scope for this crate).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    InvalidInput,
    DriverUnavailable,
    Timeout,
    IntegrityViolation,
    StateConflict,
    LimitExceeded,
    Internal,
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::NotFound(_) => ErrorKind::NotFound,
            CoreError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            CoreError::InvalidInput(_) => ErrorKind::InvalidInput,
            CoreError::DriverUnavailable(_) => ErrorKind::DriverUnavailable,
            CoreError::Timeout(_) => ErrorKind::Timeout,
            CoreError::IntegrityViolation(_) => ErrorKind::IntegrityViolation,
            CoreError::StateConflict(_) => ErrorKind::StateConflict,
            CoreError::LimitExceeded(_) => ErrorKind::LimitExceeded,
            CoreError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        CoreError::NotFound(message.into())
    }

    pub fn already_exists(message: impl Into<String>) -> Self {
        CoreError::AlreadyExists(message.into())
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        CoreError::InvalidInput(message.into())
    }

    pub fn driver_unavailable(message: impl Into<String>) -> Self {
        CoreError::DriverUnavailable(message.into())
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        CoreError::Timeout(message.into())
    }

    pub fn integrity_violation(message: impl Into<String>) -> Self {
        CoreError::IntegrityViolation(message.into())
    }

    pub fn state_conflict(message: impl Into<String>) -> Self {
        CoreError::StateConflict(message.into())
    }

    pub fn limit_exceeded(message: impl Into<String>) -> Self {
        CoreError::LimitExceeded(message.into())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => CoreError::NotFound("row not found".to_string()),
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                CoreError::AlreadyExists(db_err.message().to_string())
            }
            other => CoreError::Internal(anyhow::anyhow!(other)),
        }
    }
}
