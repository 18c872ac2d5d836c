use thiserror::Error;
use uuid::Uuid;

use crate::flow::FlowStage;

/// Typed, recoverable errors returned to callers. None of these are
/// process-fatal and the engine never retries on its own.
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("transition {action} not allowed from stage {from}")]
    InvalidStage { from: FlowStage, action: &'static str },

    #[error("chair {chair_id} does not belong to clinic {clinic_id}")]
    InvalidChair { chair_id: Uuid, clinic_id: Uuid },

    #[error("chair {chair_id} is held by another appointment")]
    ChairUnavailable { chair_id: Uuid },

    #[error("chair {chair_id} is occupied by a patient")]
    ChairOccupied { chair_id: Uuid },

    #[error("validation failed: {0}")]
    Validation(String),

    /// Partial failure during a multi-step transition. The transition has
    /// been rolled back; the half-applied state is never observable.
    #[error("internal transition failure: {0}")]
    Internal(String),
}

impl FlowError {
    pub fn flow_not_found(appointment_id: Uuid) -> Self {
        FlowError::NotFound {
            entity: "flow state",
            id: appointment_id,
        }
    }

    pub fn chair_not_found(chair_id: Uuid) -> Self {
        FlowError::NotFound {
            entity: "chair",
            id: chair_id,
        }
    }
}
