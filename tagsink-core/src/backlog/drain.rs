//! Scheduled replay of backlog entries once the database is back.

use std::sync::Arc;
use std::time::Duration;

use tagsink_model::parse_scan;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::backlog::BacklogStore;
use crate::health::Availability;
use crate::processor::ScanProcessor;

/// Drains the backlog oldest-first, batch by batch, only while the backend
/// is available.
pub struct BacklogDrainer {
    store: Arc<BacklogStore>,
    availability: Arc<Availability>,
    processor: Arc<ScanProcessor>,
    interval: Duration,
    batch_size: usize,
}

impl std::fmt::Debug for BacklogDrainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BacklogDrainer")
            .field("interval", &self.interval)
            .field("batch_size", &self.batch_size)
            .finish_non_exhaustive()
    }
}

impl BacklogDrainer {
    pub fn new(
        store: Arc<BacklogStore>,
        availability: Arc<Availability>,
        processor: Arc<ScanProcessor>,
        interval: Duration,
        batch_size: usize,
    ) -> Self {
        Self { store, availability, processor, interval, batch_size }
    }

    /// Drain loop; runs until the shutdown signal flips.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(
            tokio::time::MissedTickBehavior::Delay,
        );
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.drain_once().await;
                }
                _ = shutdown.changed() => {
                    debug!("backlog drainer stopping");
                    return;
                }
            }
        }
    }

    /// One drain cycle. Returns the number of entries removed (replayed or
    /// discarded as malformed).
    ///
    /// Availability is checked fresh every cycle: the backend can come and
    /// go between ticks. A failing replay leaves its file untouched, same
    /// ordering key, and never blocks the rest of the batch.
    pub async fn drain_once(&self) -> usize {
        if !self.store.is_enabled() || !self.availability.is_available() {
            return 0;
        }

        let entries = self.store.list_oldest_first(self.batch_size);
        let mut removed = 0;
        for path in entries {
            let payload = match self.store.read(&path) {
                Ok(payload) => payload,
                Err(err) => {
                    warn!(
                        entry = %path.display(),
                        error = %err,
                        "could not read backlog entry; leaving for retry"
                    );
                    continue;
                }
            };

            let scan = match parse_scan(&payload) {
                Ok(scan) => scan,
                Err(err) => {
                    // Malformed input will never become valid; drop it.
                    warn!(
                        entry = %path.display(),
                        error = %err,
                        "discarding malformed backlog entry"
                    );
                    self.store.delete(&path);
                    removed += 1;
                    continue;
                }
            };

            match self.processor.process(&scan).await {
                Ok(inserted) => {
                    info!(
                        entry = %path.display(),
                        inserted,
                        "backlog entry replayed"
                    );
                    self.store.delete(&path);
                    removed += 1;
                }
                Err(err) => {
                    warn!(
                        entry = %path.display(),
                        error = %err,
                        "backlog replay failed; leaving entry for retry"
                    );
                }
            }
        }
        removed
    }
}
