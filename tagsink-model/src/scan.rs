//! Inbound scan events and the wire payload they arrive in.
//!
//! The wire format is fixed by the reader firmware:
//!
//! ```json
//! {"DATATYPE":"SCAN","OBJECT":{"STAGE":"12","DEVICE":"R01","CSN":["AABBCCDD0A"]}}
//! ```
//!
//! Parsing is lenient about scalar types (readers have been observed sending
//! numeric stages) but strict about structure: a missing `OBJECT` or a
//! missing/non-array `CSN` rejects the whole message.

use serde_json::Value;
use thiserror::Error;

use crate::ack::AckReason;

/// The only `DATATYPE` this service ingests.
pub const SCAN_DATATYPE: &str = "SCAN";

/// One reported batch of tag observations from a device at a stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanEvent {
    pub kind: String,
    pub stage: Option<String>,
    pub device: Option<String>,
    pub machine: Option<String>,
    pub version: Option<String>,
    /// Tag identifiers (CSNs) in the order the reader reported them.
    pub tags: Vec<String>,
}

/// Structural rejection of an inbound payload, before any processing.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("unsupported DATATYPE")]
    BadDatatype,
    #[error("missing or null OBJECT")]
    MissingObject,
    #[error("missing or malformed OBJECT.CSN")]
    InvalidCsn,
    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl WireError {
    /// The reason tag published in the negative acknowledgment.
    pub fn reason(&self) -> AckReason {
        match self {
            WireError::BadDatatype => AckReason::BadDatatype,
            WireError::MissingObject => AckReason::MissingObject,
            WireError::InvalidCsn => AckReason::InvalidCsn,
            WireError::Malformed(_) => AckReason::ProcessingError,
        }
    }
}

/// Parses a raw inbound payload into a [`ScanEvent`].
///
/// Rejections map 1:1 onto negative-ack reasons; see [`WireError::reason`].
pub fn parse_scan(payload: &[u8]) -> Result<ScanEvent, WireError> {
    let root: Value = serde_json::from_slice(payload)?;

    let kind = match root.get("DATATYPE").and_then(coerce_string) {
        Some(k) if k.eq_ignore_ascii_case(SCAN_DATATYPE) => k,
        _ => return Err(WireError::BadDatatype),
    };

    let object = match root.get("OBJECT") {
        Some(obj) if obj.is_object() => obj,
        _ => return Err(WireError::MissingObject),
    };

    let tags = match object.get("CSN") {
        Some(Value::Array(items)) => {
            items.iter().filter_map(coerce_string).collect::<Vec<_>>()
        }
        _ => return Err(WireError::InvalidCsn),
    };

    Ok(ScanEvent {
        kind,
        stage: object.get("STAGE").and_then(coerce_string),
        device: object.get("DEVICE").and_then(coerce_string),
        machine: object.get("MACHINE").and_then(coerce_string),
        version: object.get("VERSION").and_then(coerce_string),
        tags,
    })
}

/// Scalar-to-string coercion matching what the readers actually send:
/// strings pass through, numbers and booleans stringify, everything else
/// (null, nested structures) is treated as absent.
fn coerce_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
