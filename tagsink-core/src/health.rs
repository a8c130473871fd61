//! Database availability probing and one-shot deferred migrations.
//!
//! The probe owns the availability flag; everything else reads it without
//! blocking. Schema migrations are deferred until the database is first
//! seen alive, so the service starts cleanly against a dead backend.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use sqlx::migrate::Migrator;
use sqlx::MySqlPool;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

static MIGRATOR: Migrator = sqlx::migrate!();

/// What the last probe learned about the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BackendAvailability {
    Unknown = 0,
    Available = 1,
    Unavailable = 2,
}

impl BackendAvailability {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => BackendAvailability::Available,
            2 => BackendAvailability::Unavailable,
            _ => BackendAvailability::Unknown,
        }
    }
}

/// Lock-free availability flag shared between the probe and its readers.
#[derive(Debug)]
pub struct Availability(AtomicU8);

impl Default for Availability {
    fn default() -> Self {
        Self(AtomicU8::new(BackendAvailability::Unknown as u8))
    }
}

impl Availability {
    pub fn get(&self) -> BackendAvailability {
        BackendAvailability::from_u8(self.0.load(Ordering::Acquire))
    }

    pub fn is_available(&self) -> bool {
        self.get() == BackendAvailability::Available
    }

    /// Stores the new state, returning the previous one.
    pub fn set(&self, next: BackendAvailability) -> BackendAvailability {
        BackendAvailability::from_u8(self.0.swap(next as u8, Ordering::AcqRel))
    }
}

/// Periodic `SELECT 1` probe plus lazy migration trigger.
#[derive(Debug)]
pub struct DbHealthMonitor {
    pool: MySqlPool,
    availability: Arc<Availability>,
    interval: Duration,
    migrated: AtomicBool,
}

impl DbHealthMonitor {
    pub fn new(
        pool: MySqlPool,
        availability: Arc<Availability>,
        interval: Duration,
    ) -> Self {
        Self {
            pool,
            availability,
            interval,
            migrated: AtomicBool::new(false),
        }
    }

    /// Probe loop; runs until the shutdown signal flips.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(
            tokio::time::MissedTickBehavior::Delay,
        );
        loop {
            tokio::select! {
                _ = ticker.tick() => self.probe_once().await,
                _ = shutdown.changed() => {
                    debug!("health monitor stopping");
                    return;
                }
            }
        }
    }

    /// One probe cycle: liveness check, flip bookkeeping, lazy migration.
    ///
    /// State changes are logged only on an actual flip; a backend that stays
    /// down logs at debug so a long outage does not flood the logs.
    pub async fn probe_once(&self) {
        let outcome = sqlx::query("SELECT 1").execute(&self.pool).await;
        let next = match &outcome {
            Ok(_) => BackendAvailability::Available,
            Err(_) => BackendAvailability::Unavailable,
        };
        let prev = self.availability.set(next);

        match (prev, next) {
            (
                BackendAvailability::Available,
                BackendAvailability::Unavailable,
            ) => {
                if let Err(err) = outcome {
                    warn!(error = %err, "database became unavailable");
                }
            }
            (_, BackendAvailability::Unavailable) => {
                if let Err(err) = outcome {
                    debug!(error = %err, "database still unavailable");
                }
            }
            (
                BackendAvailability::Unknown
                | BackendAvailability::Unavailable,
                BackendAvailability::Available,
            ) => {
                info!("database is now available");
                self.migrate_once().await;
            }
            _ => {}
        }
    }

    /// Runs migrations at most once. The flag is claimed with a CAS so two
    /// overlapping transitions cannot both migrate, and it is released again
    /// if the run fails so the next availability transition retries.
    async fn migrate_once(&self) {
        if self
            .migrated
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        info!("running deferred schema migrations");
        match MIGRATOR.run(&self.pool).await {
            Ok(()) => info!("schema migrations completed"),
            Err(err) => {
                error!(error = %err, "schema migration failed; will retry on next availability transition");
                self.migrated.store(false, Ordering::Release);
            }
        }
    }
}
