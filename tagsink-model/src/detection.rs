//! Persisted detection records derived from scan events.

use chrono::{DateTime, Utc};

/// One persisted (reader, tag, location, signal, time) tuple.
///
/// Derived 1:N from a [`crate::ScanEvent`]: one record per tag identifier of
/// at least two characters. Immutable once built; the storage layer owns any
/// further bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectionRecord {
    pub reader_id: i64,
    pub location_id: Option<i64>,
    pub tag_id: String,
    /// Signal strength decoded from the tag id's trailing hex byte, when the
    /// decode succeeds.
    pub rssi: Option<i32>,
    pub machine: Option<String>,
    pub observed_at: DateTime<Utc>,
}

/// Decodes the signal strength a reader embeds in the trailing two
/// characters of a tag identifier, interpreted as a 2-digit hex byte.
///
/// Returns `None` for tags shorter than two characters or when the trailing
/// characters are not hex digits; a bad encode never fails the whole event.
pub fn rssi_from_tag(tag: &str) -> Option<i32> {
    let mut chars = tag.chars().rev();
    let low = chars.next()?;
    let high = chars.next()?;
    let value = (high.to_digit(16)? << 4) | low.to_digit(16)?;
    Some(value as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_trailing_hex_byte() {
        assert_eq!(rssi_from_tag("E2001234AB"), Some(0xAB));
        assert_eq!(rssi_from_tag("AABBCCDD0A"), Some(0x0A));
        assert_eq!(rssi_from_tag("00"), Some(0));
        assert_eq!(rssi_from_tag("ff"), Some(255));
    }

    #[test]
    fn non_hex_trailer_is_absent() {
        assert_eq!(rssi_from_tag("E20012ZZ"), None);
        assert_eq!(rssi_from_tag("ABCX"), None);
    }

    #[test]
    fn too_short_is_absent() {
        assert_eq!(rssi_from_tag(""), None);
        assert_eq!(rssi_from_tag("A"), None);
    }
}
