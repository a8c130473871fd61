//! The scan processing use case: raw event in, persisted detections out.

use std::sync::Arc;

use chrono::Utc;
use tagsink_model::{rssi_from_tag, DetectionRecord, ScanEvent};
use tracing::debug;

use crate::error::ProcessError;
use crate::gateway::{DetectionsGateway, MetadataGateway};

/// Pure validation + transformation: no I/O beyond the injected gateways.
pub struct ScanProcessor {
    metadata: Arc<dyn MetadataGateway>,
    detections: Arc<dyn DetectionsGateway>,
}

impl std::fmt::Debug for ScanProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanProcessor").finish_non_exhaustive()
    }
}

impl ScanProcessor {
    pub fn new(
        metadata: Arc<dyn MetadataGateway>,
        detections: Arc<dyn DetectionsGateway>,
    ) -> Self {
        Self { metadata, detections }
    }

    /// Validates the event and persists one detection per usable tag.
    ///
    /// Returns the number of detections persisted, which is zero when every
    /// tag id was shorter than two characters. Each detection is persisted
    /// independently, fail-fast: a save failure propagates without rolling
    /// back detections already written for the same event.
    pub async fn process(&self, scan: &ScanEvent) -> Result<u32, ProcessError> {
        let location_id = self.resolve_location(scan.stage.as_deref()).await?;

        let device = scan
            .device
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .ok_or(ProcessError::UnknownDevice)?;
        let reader_id = self
            .metadata
            .resolve_reader_id(device)
            .await?
            .ok_or(ProcessError::UnknownDevice)?;

        let mut inserted = 0u32;
        for tag in &scan.tags {
            if tag.chars().count() < 2 {
                debug!(tag = %tag, "skipping malformed tag id");
                continue;
            }
            let record = DetectionRecord {
                reader_id,
                location_id,
                tag_id: tag.clone(),
                rssi: rssi_from_tag(tag),
                machine: scan.machine.clone(),
                observed_at: Utc::now(),
            };
            self.detections.save(&record).await?;
            inserted += 1;
        }
        Ok(inserted)
    }

    /// A present stage must resolve against metadata; a stage carrying no
    /// numeric id at all resolves to no location (readers send free-form
    /// stage labels on some firmware).
    async fn resolve_location(
        &self,
        stage: Option<&str>,
    ) -> Result<Option<i64>, ProcessError> {
        let Some(stage) = stage else { return Ok(None) };
        let Some(id) = parse_numeric_id(stage) else { return Ok(None) };
        if !self.metadata.location_exists(id).await? {
            return Err(ProcessError::UnknownStage);
        }
        Ok(Some(id))
    }
}

/// Extracts the digits of a stage label and parses them as an id.
fn parse_numeric_id(s: &str) -> Option<i64> {
    let digits: String = s.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}
