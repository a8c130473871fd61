//! Inbound message dispatch: the single entry point every delivered
//! message goes through, live or replayed.

use std::sync::Arc;

use async_trait::async_trait;
use tagsink_model::{parse_scan, AckReason, ScanAck};
use tracing::{info, warn};

use crate::backlog::BacklogStore;
use crate::health::Availability;
use crate::processor::ScanProcessor;

/// Fire-and-forget acknowledgment channel.
///
/// Publish failures are the implementor's problem to log; they must never
/// surface to the dispatch path or re-trigger processing.
#[async_trait]
pub trait AckPublisher: Send + Sync {
    async fn publish_ack(&self, ack: ScanAck);
}

/// Dispatch pipeline for inbound scan messages.
///
/// Every message yields exactly one acknowledgment, positive or negative.
/// While the backend is down, messages are enqueued to the backlog instead
/// of processed, and negatively acknowledged as `db_unavailable`.
pub struct IngestPipeline {
    processor: Arc<ScanProcessor>,
    availability: Arc<Availability>,
    backlog: Arc<BacklogStore>,
    acks: Arc<dyn AckPublisher>,
}

impl std::fmt::Debug for IngestPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestPipeline").finish_non_exhaustive()
    }
}

impl IngestPipeline {
    pub fn new(
        processor: Arc<ScanProcessor>,
        availability: Arc<Availability>,
        backlog: Arc<BacklogStore>,
        acks: Arc<dyn AckPublisher>,
    ) -> Self {
        Self { processor, availability, backlog, acks }
    }

    /// Handles one delivered message end to end. Never panics on bad input;
    /// the transport's dispatch task must survive anything a reader sends.
    pub async fn handle_message(&self, topic: &str, payload: &[u8]) {
        let scan = match parse_scan(payload) {
            Ok(scan) => scan,
            Err(err) => {
                // Structural rejections are final: no backlog, no retry.
                warn!(topic, error = %err, "rejecting inbound message");
                self.nack(err.reason()).await;
                return;
            }
        };

        if !self.availability.is_available() {
            warn!(topic, "database unavailable; backlogging message");
            if self.backlog.is_enabled() {
                // A failed enqueue is already logged by the store; the
                // message is then dropped with the nack below.
                let _ = self
                    .backlog
                    .enqueue(payload, AckReason::DbUnavailable.as_str());
            }
            self.nack(AckReason::DbUnavailable).await;
            return;
        }

        match self.processor.process(&scan).await {
            Ok(inserted) => {
                info!(topic, inserted, "scan processed");
                self.acks.publish_ack(ScanAck::accepted(inserted)).await;
            }
            Err(err) => {
                warn!(topic, error = %err, "scan processing failed");
                let reason = err.reason();
                // The availability flag lags the probe interval; an outage
                // surfacing mid-process still queues the entry for replay.
                if reason == AckReason::DbUnavailable && self.backlog.is_enabled()
                {
                    let _ = self.backlog.enqueue(payload, reason.as_str());
                }
                self.nack(reason).await;
            }
        }
    }

    async fn nack(&self, reason: AckReason) {
        self.acks.publish_ack(ScanAck::rejected(reason)).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use tagsink_config::BacklogConfig;
    use tempfile::TempDir;

    use super::*;
    use crate::gateway::{
        GatewayError, MockDetectionsGateway, MockMetadataGateway,
    };
    use crate::health::BackendAvailability;

    const VALID: &[u8] =
        br#"{"DATATYPE":"SCAN","OBJECT":{"STAGE":"12","DEVICE":"R01","CSN":["AABBCCDD0A"]}}"#;

    #[derive(Default)]
    struct RecordingAcks(Mutex<Vec<ScanAck>>);

    #[async_trait]
    impl AckPublisher for RecordingAcks {
        async fn publish_ack(&self, ack: ScanAck) {
            self.0.lock().unwrap().push(ack);
        }
    }

    struct Fixture {
        _dir: TempDir,
        backlog_dir: std::path::PathBuf,
        availability: Arc<Availability>,
        acks: Arc<RecordingAcks>,
        pipeline: IngestPipeline,
    }

    impl Fixture {
        fn new(
            metadata: MockMetadataGateway,
            detections: MockDetectionsGateway,
        ) -> Self {
            let dir = TempDir::new().unwrap();
            let backlog_dir = dir.path().to_path_buf();
            let store = Arc::new(BacklogStore::new(&BacklogConfig {
                enabled: true,
                dir: backlog_dir.clone(),
                ..BacklogConfig::default()
            }));
            let availability = Arc::new(Availability::default());
            availability.set(BackendAvailability::Available);
            let acks = Arc::new(RecordingAcks::default());
            let pipeline = IngestPipeline::new(
                Arc::new(ScanProcessor::new(
                    Arc::new(metadata),
                    Arc::new(detections),
                )),
                availability.clone(),
                store,
                acks.clone(),
            );
            Self { _dir: dir, backlog_dir, availability, acks, pipeline }
        }

        fn acks(&self) -> Vec<ScanAck> {
            self.acks.0.lock().unwrap().clone()
        }

        fn backlog_entries(&self) -> Vec<std::path::PathBuf> {
            let mut entries: Vec<_> = std::fs::read_dir(&self.backlog_dir)
                .unwrap()
                .flatten()
                .map(|e| e.path())
                .collect();
            entries.sort();
            entries
        }
    }

    #[tokio::test]
    async fn valid_message_is_persisted_and_positively_acked() {
        let mut metadata = MockMetadataGateway::new();
        metadata.expect_location_exists().returning(|_| Ok(true));
        metadata.expect_resolve_reader_id().returning(|_| Ok(Some(5)));
        let mut detections = MockDetectionsGateway::new();
        detections
            .expect_save()
            .times(1)
            .withf(|r| r.reader_id == 5 && r.rssi == Some(0x0A))
            .returning(|_| Ok(()));

        let fixture = Fixture::new(metadata, detections);
        fixture.pipeline.handle_message("tagsink/scan", VALID).await;

        assert_eq!(fixture.acks(), vec![ScanAck::accepted(1)]);
        assert!(fixture.backlog_entries().is_empty());
    }

    #[tokio::test]
    async fn backend_down_backlogs_and_nacks() {
        let fixture = Fixture::new(
            MockMetadataGateway::new(),
            MockDetectionsGateway::new(),
        );
        fixture.availability.set(BackendAvailability::Unavailable);

        fixture.pipeline.handle_message("tagsink/scan", VALID).await;

        assert_eq!(
            fixture.acks(),
            vec![ScanAck::rejected(AckReason::DbUnavailable)]
        );
        let entries = fixture.backlog_entries();
        assert_eq!(entries.len(), 1);
        let name = entries[0].file_name().unwrap().to_str().unwrap();
        assert!(name.contains("_db_unavailable_"));
        assert_eq!(std::fs::read(&entries[0]).unwrap(), VALID);
    }

    #[tokio::test]
    async fn outage_surfacing_mid_process_backlogs_and_nacks() {
        let mut metadata = MockMetadataGateway::new();
        metadata.expect_location_exists().returning(|_| Ok(true));
        metadata.expect_resolve_reader_id().returning(|_| Ok(Some(5)));
        let mut detections = MockDetectionsGateway::new();
        detections.expect_save().returning(|_| {
            Err(GatewayError::Unavailable("pool timed out".to_string()))
        });

        let fixture = Fixture::new(metadata, detections);
        fixture.pipeline.handle_message("tagsink/scan", VALID).await;

        assert_eq!(
            fixture.acks(),
            vec![ScanAck::rejected(AckReason::DbUnavailable)]
        );
        let entries = fixture.backlog_entries();
        assert_eq!(entries.len(), 1);
        let name = entries[0].file_name().unwrap().to_str().unwrap();
        assert!(name.contains("_db_unavailable_"));
        assert_eq!(std::fs::read(&entries[0]).unwrap(), VALID);
    }

    #[tokio::test]
    async fn validation_failures_nack_without_backlogging() {
        let mut metadata = MockMetadataGateway::new();
        metadata.expect_location_exists().returning(|_| Ok(true));
        metadata.expect_resolve_reader_id().returning(|_| Ok(None));

        let fixture =
            Fixture::new(metadata, MockDetectionsGateway::new());
        fixture.pipeline.handle_message("tagsink/scan", VALID).await;

        assert_eq!(
            fixture.acks(),
            vec![ScanAck::rejected(AckReason::UnknownDevice)]
        );
        assert!(fixture.backlog_entries().is_empty());
    }

    #[tokio::test]
    async fn wire_rejections_map_to_their_reasons() {
        let cases: [(&[u8], AckReason); 4] = [
            (
                br#"{"DATATYPE":"OTHER","OBJECT":{"CSN":[]}}"#,
                AckReason::BadDatatype,
            ),
            (br#"{"DATATYPE":"SCAN"}"#, AckReason::MissingObject),
            (
                br#"{"DATATYPE":"SCAN","OBJECT":{"CSN":"x"}}"#,
                AckReason::InvalidCsn,
            ),
            (b"{not json", AckReason::ProcessingError),
        ];
        for (payload, reason) in cases {
            let fixture = Fixture::new(
                MockMetadataGateway::new(),
                MockDetectionsGateway::new(),
            );
            fixture.pipeline.handle_message("tagsink/scan", payload).await;
            assert_eq!(fixture.acks(), vec![ScanAck::rejected(reason)]);
            assert!(fixture.backlog_entries().is_empty());
        }
    }

    #[tokio::test]
    async fn constraint_violation_nacks_and_is_not_retried() {
        let mut metadata = MockMetadataGateway::new();
        metadata.expect_location_exists().returning(|_| Ok(true));
        metadata.expect_resolve_reader_id().returning(|_| Ok(Some(5)));
        let mut detections = MockDetectionsGateway::new();
        detections.expect_save().returning(|_| {
            Err(GatewayError::Constraint("fk".to_string()))
        });

        let fixture = Fixture::new(metadata, detections);
        fixture.pipeline.handle_message("tagsink/scan", VALID).await;

        assert_eq!(
            fixture.acks(),
            vec![ScanAck::rejected(AckReason::FkViolationOrConstraint)]
        );
        assert!(fixture.backlog_entries().is_empty());
    }
}
