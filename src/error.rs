//! Engine error taxonomy

use crate::types::DbId;
use serde::Serialize;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Analysis failed for transaction {transaction_id}: {reason}")]
    Analysis { transaction_id: DbId, reason: String },

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Stable error category reported to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    AnalysisFailure,
    Storage,
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Validation(_) => ErrorKind::Validation,
            EngineError::NotFound { .. } => ErrorKind::NotFound,
            EngineError::Conflict(_) => ErrorKind::Conflict,
            EngineError::Analysis { .. } => ErrorKind::AnalysisFailure,
            EngineError::Storage(_) => ErrorKind::Storage,
        }
    }

    pub(crate) fn not_found(entity: &'static str, id: DbId) -> Self {
        EngineError::NotFound { entity, id }
    }
}
