//! # Tagsink Server
//!
//! Ingests RFID scan reports from an MQTT broker, persists derived
//! detections to MariaDB/MySQL, and acknowledges each message back over
//! MQTT. The broker and the database fail independently; a disk-backed
//! backlog keeps accepted work safe while the database is down.
//!
//! Wiring only lives here: every moving part is built in `tagsink-core`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tagsink_config::ConfigLoader;
use tagsink_core::backlog::{BacklogDrainer, BacklogStore};
use tagsink_core::health::{Availability, DbHealthMonitor};
use tagsink_core::ingest::IngestPipeline;
use tagsink_core::mqtt::{
    self, ConnectionManager, ConnectionStateCell, MqttAckPublisher,
};
use tagsink_core::{db, ScanProcessor};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// CLI entry point; flags override the environment-derived configuration.
#[derive(Parser, Debug)]
#[command(name = "tagsink")]
#[command(about = "MQTT scan ingestion into MariaDB with a disk-backed backlog")]
struct Cli {
    /// MQTT broker host (overrides MQTT_BROKER_HOST)
    #[arg(long)]
    broker_host: Option<String>,

    /// MQTT broker port (overrides MQTT_BROKER_PORT)
    #[arg(long)]
    broker_port: Option<u16>,

    /// Database connection URL (overrides DATABASE_URL)
    #[arg(long)]
    database_url: Option<String>,

    /// Backlog directory (overrides BACKLOG_DIR)
    #[arg(long)]
    backlog_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    if let Some(url) = &cli.database_url {
        // The loader treats DATABASE_URL as required; feed the override in
        // before it looks.
        std::env::set_var("DATABASE_URL", url);
    }
    let load = ConfigLoader::from_env().context("loading configuration")?;
    for warning in &load.warnings {
        warn!("{warning}");
    }
    let mut config = load.config;
    if let Some(host) = cli.broker_host {
        config.mqtt.broker_host = host;
    }
    if let Some(port) = cli.broker_port {
        config.mqtt.broker_port = port;
    }
    if let Some(dir) = cli.backlog_dir {
        config.backlog.dir = dir;
    }

    // Lazy pool: the process must come up and start backlogging even when
    // the database is down.
    let pool =
        db::connect_lazy(&config.database).context("building database pool")?;
    let metadata = Arc::new(db::MySqlMetadataGateway::new(pool.clone()));
    let detections = Arc::new(db::MySqlDetectionsGateway::new(pool.clone()));
    let processor = Arc::new(ScanProcessor::new(metadata, detections));

    let availability = Arc::new(Availability::default());
    let backlog = Arc::new(BacklogStore::new(&config.backlog));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let monitor = Arc::new(DbHealthMonitor::new(
        pool,
        availability.clone(),
        config.database.health_interval(),
    ));
    let health_task = tokio::spawn(monitor.run(shutdown_rx.clone()));

    let drainer = Arc::new(BacklogDrainer::new(
        backlog.clone(),
        availability.clone(),
        processor.clone(),
        config.backlog.drain_interval(),
        config.backlog.batch_size,
    ));
    let drain_task = tokio::spawn(drainer.run(shutdown_rx.clone()));

    let (client, event_loop) = mqtt::client(&config.mqtt);
    let acks = Arc::new(MqttAckPublisher::new(
        client.clone(),
        config.mqtt.ack_topic.clone(),
        config.mqtt.qos,
    ));
    let ingest = Arc::new(IngestPipeline::new(
        processor,
        availability,
        backlog,
        acks,
    ));
    let state = Arc::new(ConnectionStateCell::default());
    let manager = ConnectionManager::new(
        client,
        event_loop,
        config.mqtt.clone(),
        state.clone(),
        ingest,
    );
    let mqtt_task = tokio::spawn(manager.run(shutdown_rx));

    info!(
        scan_topic = %config.mqtt.scan_topic,
        backlog_dir = %config.backlog.dir.display(),
        "tagsink started"
    );

    tokio::signal::ctrl_c().await.context("waiting for shutdown signal")?;
    info!(connection = ?state.get(), "shutdown requested");
    let _ = shutdown_tx.send(true);
    if tokio::time::timeout(SHUTDOWN_GRACE, async {
        let _ = mqtt_task.await;
        let _ = health_task.await;
        let _ = drain_task.await;
    })
    .await
    .is_err()
    {
        warn!("shutdown grace period expired; exiting anyway");
    }
    info!("tagsink stopped");
    Ok(())
}
