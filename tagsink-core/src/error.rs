//! Processing-error taxonomy and its mapping onto ack reason tags.

use tagsink_model::AckReason;
use thiserror::Error;

use crate::gateway::GatewayError;

/// Failure of [`crate::ScanProcessor::process`] for one scan event.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The event names a stage that does not exist in metadata.
    #[error("unknown stage")]
    UnknownStage,
    /// The event's device is missing, blank, or not a known reader.
    #[error("unknown device")]
    UnknownDevice,
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl ProcessError {
    /// The reason tag published in the negative acknowledgment.
    pub fn reason(&self) -> AckReason {
        match self {
            ProcessError::UnknownStage => AckReason::UnknownStage,
            ProcessError::UnknownDevice => AckReason::UnknownDevice,
            ProcessError::Gateway(GatewayError::Constraint(_)) => {
                AckReason::FkViolationOrConstraint
            }
            ProcessError::Gateway(GatewayError::Unavailable(_)) => {
                AckReason::DbUnavailable
            }
            ProcessError::Gateway(GatewayError::Other(_)) => {
                AckReason::ProcessingError
            }
        }
    }
}
