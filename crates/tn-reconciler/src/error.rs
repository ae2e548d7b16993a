use thiserror::Error;
use tn_types::error::{TnError, ValidationError};

#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error("slice {0:?} not found")]
    UnknownSlice(String),

    #[error("slice {0:?} already exists")]
    AlreadyExists(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("config store error: {0}")]
    Store(String),
}

impl From<ReconcilerError> for TnError {
    fn from(e: ReconcilerError) -> Self {
        match e {
            ReconcilerError::Validation(inner) => TnError::Validation(inner),
            ReconcilerError::UnknownSlice(id) => TnError::NotFound(format!("slice {id:?} not found")),
            ReconcilerError::AlreadyExists(id) => TnError::State(format!("slice {id:?} already exists")),
            ReconcilerError::Store(reason) => TnError::Command(reason),
        }
    }
}
