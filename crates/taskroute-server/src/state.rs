//! Shared application state.

use std::sync::Arc;

use parking_lot::Mutex;
use taskroute_core::{Result, TaskRouteConfig};
use taskroute_ingest::{IngestEvent, Ingester, LocalContentStore, Notifier, QueueNotifier, WebhookNotifier};
use taskroute_router::{BackendCatalog, DecisionEngine};
use taskroute_runtime::{Orchestrator, SimulatedExecutor};
use taskroute_store::SqliteStore;
use tokio::sync::mpsc;
use tracing::info;

pub struct AppState {
    pub config: TaskRouteConfig,
    pub store: SqliteStore,
    pub content: LocalContentStore,
    pub notifier: Box<dyn Notifier>,
    pub orchestrator: Orchestrator,
    /// Present only when ingestion events are delivered in-process.
    ingest_rx: Mutex<Option<mpsc::UnboundedReceiver<IngestEvent>>>,
}

impl AppState {
    pub fn new(config: TaskRouteConfig, store: SqliteStore, catalog: BackendCatalog) -> Result<Self> {
        let content = LocalContentStore::new(&config.data_paths.uploads)?;

        let (notifier, ingest_rx): (Box<dyn Notifier>, _) = match &config.webhook_url {
            Some(url) => {
                info!("Ingestion events go to webhook {}", url);
                (Box::new(WebhookNotifier::new(url.clone())), None)
            }
            None => {
                info!("Ingestion events are resumed in-process");
                let (notifier, rx) = QueueNotifier::new();
                (Box::new(notifier), Some(rx))
            }
        };

        let executor = Arc::new(SimulatedExecutor::new(config.jitter_ms));
        let orchestrator = Orchestrator::new(DecisionEngine::new(catalog), executor, config.max_attempts);

        Ok(Self {
            config,
            store,
            content,
            notifier,
            orchestrator,
            ingest_rx: Mutex::new(ingest_rx),
        })
    }

    pub fn ingester(&self) -> Ingester<'_> {
        Ingester::new(&self.store, &self.content, self.notifier.as_ref())
    }

    /// Take the ingestion receiver (can only be called once, by the worker).
    pub fn take_ingest_rx(&self) -> Option<mpsc::UnboundedReceiver<IngestEvent>> {
        self.ingest_rx.lock().take()
    }
}
