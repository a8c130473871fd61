//! Acknowledgment payloads published back to the broker.

use serde::{Deserialize, Serialize};

/// Reason tags carried by negative acknowledgments.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum AckReason {
    BadDatatype,
    MissingObject,
    InvalidCsn,
    UnknownDevice,
    UnknownStage,
    DbUnavailable,
    FkViolationOrConstraint,
    ProcessingError,
}

impl AckReason {
    /// The wire-level tag, also used in backlog file names.
    pub fn as_str(&self) -> &'static str {
        match self {
            AckReason::BadDatatype => "bad_datatype",
            AckReason::MissingObject => "missing_object",
            AckReason::InvalidCsn => "invalid_csn",
            AckReason::UnknownDevice => "unknown_device",
            AckReason::UnknownStage => "unknown_stage",
            AckReason::DbUnavailable => "db_unavailable",
            AckReason::FkViolationOrConstraint => "fk_violation_or_constraint",
            AckReason::ProcessingError => "processing_error",
        }
    }
}

impl std::fmt::Display for AckReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of processing one inbound message.
///
/// Serializes as `{"ok":true,"inserted":n}` or `{"ok":false,"reason":tag}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScanAck {
    Accepted { ok: bool, inserted: u32 },
    Rejected { ok: bool, reason: AckReason },
}

impl ScanAck {
    pub fn accepted(inserted: u32) -> Self {
        ScanAck::Accepted { ok: true, inserted }
    }

    pub fn rejected(reason: AckReason) -> Self {
        ScanAck::Rejected { ok: false, reason }
    }
}
