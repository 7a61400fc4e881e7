use crate::model::{Id, ResolutionPhase};

/// Failures of detection passes and resolution actions
#[derive(thiserror::Error, Debug)]
pub enum ArbitrationError {
    /// Rejected before any mutation, state untouched
    #[error("Precondition violated: {0}")]
    Precondition(String),

    #[error("Conflict {conflict_id} does not accept {phase} in status {status}")]
    PhaseNotAccepted {
        conflict_id: Id,
        phase: ResolutionPhase,
        status: String,
    },

    /// Caller payload cannot be interpreted, nothing is committed
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Data integrity violation: {0}")]
    DataIntegrity(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: Id },

    #[error(transparent)]
    Store(anyhow::Error),
}

impl ArbitrationError {
    pub fn not_found(kind: &'static str, id: impl Into<Id>) -> Self {
        ArbitrationError::NotFound { kind, id: id.into() }
    }
}

impl From<anyhow::Error> for ArbitrationError {
    /// Stores raise integrity problems through anyhow; recover them here
    fn from(error: anyhow::Error) -> Self {
        match error.downcast::<ArbitrationError>() {
            Ok(inner) => inner,
            Err(other) => ArbitrationError::Store(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, ArbitrationError>;
