pub mod capi;
pub mod config;
pub mod eventlog;
pub mod graph;
pub mod relay;
pub mod rest;
pub mod scripts;
pub mod storage;
pub mod verification;

use std::sync::Arc;

use config::CapifyConfig;
use eventlog::DeliveryLog;
use graph::EventSink;
use storage::Storage;

/// Shared application state passed to every route handler.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<CapifyConfig>,
    pub storage: Arc<Storage>,
    /// Append-only record of every relay attempt.
    pub delivery_log: Arc<DeliveryLog>,
    /// Where built events go. Production wires in the Graph API client;
    /// tests inject a recording stub.
    pub sink: Arc<dyn EventSink>,
    /// Client for domain verification fetches.
    pub http: reqwest::Client,
    pub started_at: std::time::Instant,
}

impl AppContext {
    /// Wire up the production context: SQLite storage, delivery log, and
    /// the real Graph API sink.
    pub async fn new(config: CapifyConfig) -> anyhow::Result<Self> {
        let storage = Arc::new(
            Storage::new_with_slow_query(
                &config.data_dir,
                config.observability.slow_query_threshold_ms,
            )
            .await?,
        );
        let delivery_log = Arc::new(DeliveryLog::new(&config.data_dir));
        let sink: Arc<dyn EventSink> =
            Arc::new(graph::GraphClient::new(config.meta.graph_base_url.clone()));

        Ok(Self {
            config: Arc::new(config),
            storage,
            delivery_log,
            sink,
            http: reqwest::Client::new(),
            started_at: std::time::Instant::now(),
        })
    }
}
