//! Domain types shared across the Tagsink workspace.
//!
//! This crate is intentionally free of I/O: it holds the scan event and
//! detection record types, the inbound wire payload parser, and the
//! acknowledgment payloads published back to the broker. Everything that
//! touches a socket or a database lives in `tagsink-core`.

pub mod ack;
pub mod detection;
pub mod scan;

pub use ack::{AckReason, ScanAck};
pub use detection::{rssi_from_tag, DetectionRecord};
pub use scan::{parse_scan, ScanEvent, WireError, SCAN_DATATYPE};
