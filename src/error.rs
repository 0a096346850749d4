use thiserror::Error;

use crate::api::ApiError;
use crate::delivery::DeliveryError;

#[derive(Debug, Error)]
pub enum AutoprintError {
    #[error("Bearer token not found. Log in to SIDIM and try again.")]
    CredentialMissing,

    #[error("No completed appointments found on {date}")]
    NothingToDo { date: String },

    #[error("SIDIM API error: {0}")]
    Api(#[from] ApiError),

    #[error("Delivery error: {0}")]
    Delivery(#[from] DeliveryError),
}

impl AutoprintError {
    /// Batch preconditions end the run before any job is dispatched.
    pub fn is_batch_precondition(&self) -> bool {
        matches!(
            self,
            AutoprintError::CredentialMissing | AutoprintError::NothingToDo { .. }
        )
    }
}
