use service_core::error::AppError;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{ContextKind, InvalidContextKind, WindowError};

/// Failures raised by an [`AssignmentStore`](super::AssignmentStore).
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("A live assignment with the same user, role and context already exists")]
    Duplicate,

    #[error("Assignment not found")]
    NotFound,

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Corrupt assignment row: {0}")]
    CorruptRow(String),

    #[error("Store unavailable: {0}")]
    Unavailable(#[from] anyhow::Error),
}

impl StoreError {
    /// Map a sqlx error, turning unique violations into [`StoreError::Duplicate`].
    pub fn from_sqlx(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                StoreError::Duplicate
            }
            other => StoreError::Database(other),
        }
    }
}

#[derive(Error, Debug)]
pub enum AccessError {
    #[error("Invalid request: {0}")]
    InvalidRequest(#[from] validator::ValidationErrors),

    #[error(transparent)]
    InvalidDate(#[from] WindowError),

    #[error(transparent)]
    InvalidContextKind(#[from] InvalidContextKind),

    #[error("No validator registered for context kind '{0}'")]
    UnregisteredContextKind(ContextKind),

    #[error("Assignment already exists for this user, role and context")]
    DuplicateAssignment,

    #[error("Field '{0}' cannot be changed; delete the assignment and create a new one")]
    ImmutableField(&'static str),

    #[error("{kind} {context_id} not found")]
    ContextNotFound { kind: ContextKind, context_id: i64 },

    #[error("User {0} not found")]
    UserNotFound(i64),

    #[error("Assignment {0} not found")]
    AssignmentNotFound(Uuid),

    #[error("{entity} belongs to a different tenant")]
    WrongTenant { entity: String },

    #[error("Access resolution failed: {0}")]
    ResolutionFailed(anyhow::Error),

    #[error("Store error: {0}")]
    Store(StoreError),
}

impl AccessError {
    /// Infrastructure failures are the only retry-worthy errors.
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            AccessError::ResolutionFailed(_) | AccessError::Store(_)
        )
    }
}

impl From<StoreError> for AccessError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate => AccessError::DuplicateAssignment,
            other => AccessError::Store(other),
        }
    }
}

impl From<AccessError> for AppError {
    fn from(err: AccessError) -> Self {
        match err {
            AccessError::InvalidRequest(e) => AppError::ValidationError(e),
            e @ (AccessError::InvalidDate(_)
            | AccessError::InvalidContextKind(_)
            | AccessError::UnregisteredContextKind(_)) => {
                AppError::BadRequest(anyhow::anyhow!(e.to_string()))
            }
            e @ (AccessError::DuplicateAssignment | AccessError::ImmutableField(_)) => {
                AppError::Conflict(anyhow::anyhow!(e.to_string()))
            }
            e @ (AccessError::ContextNotFound { .. }
            | AccessError::UserNotFound(_)
            | AccessError::AssignmentNotFound(_)) => {
                AppError::NotFound(anyhow::anyhow!(e.to_string()))
            }
            e @ AccessError::WrongTenant { .. } => {
                AppError::Forbidden(anyhow::anyhow!(e.to_string()))
            }
            AccessError::ResolutionFailed(_) => AppError::ServiceUnavailable,
            AccessError::Store(e) => AppError::DatabaseError(anyhow::anyhow!(e)),
        }
    }
}
