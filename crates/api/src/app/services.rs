use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use tokio::sync::broadcast;
use tokio_stream::{StreamExt, wrappers::BroadcastStream};

use stockledger_events::{Event, EventEnvelope, InMemoryEventBus};
use stockledger_infra::{
    FileProductCatalog, InMemoryMovementStore, InMemoryProductCatalog, InventoryLedger,
    JournalMovementStore, LedgerConfig, LedgerError, LedgerEvent, MovementStore, ProductCatalog,
};

pub type ApiStore = Arc<dyn MovementStore>;
pub type ApiCatalog = Arc<dyn ProductCatalog>;
pub type ApiBus = Arc<InMemoryEventBus<EventEnvelope<LedgerEvent>>>;
pub type ApiLedger = InventoryLedger<ApiStore, ApiCatalog, ApiBus>;

const REALTIME_CAPACITY: usize = 256;

pub struct AppServices {
    pub ledger: ApiLedger,
    realtime_tx: broadcast::Sender<EventEnvelope<LedgerEvent>>,
}

/// Open the movement log named by the configuration (journal file or in-memory).
pub fn open_store(config: &LedgerConfig) -> Result<ApiStore, LedgerError> {
    match &config.journal_path {
        Some(path) => Ok(Arc::new(JournalMovementStore::open(path)?)),
        None => {
            tracing::warn!("no journal configured; movements are kept in memory only");
            Ok(Arc::new(InMemoryMovementStore::new()))
        }
    }
}

/// Open the product catalog named by the configuration (JSON file or in-memory).
pub fn open_catalog(config: &LedgerConfig) -> Result<ApiCatalog, LedgerError> {
    match &config.catalog_path {
        Some(path) => {
            let catalog = FileProductCatalog::open(path)
                .map_err(|e| LedgerError::Store(e.into()))?;
            Ok(Arc::new(catalog))
        }
        None => {
            if config.journal_path.is_some() {
                tracing::warn!("journal configured without a catalog file; products must be re-registered after restart");
            }
            Ok(Arc::new(InMemoryProductCatalog::new()))
        }
    }
}

pub fn build_services(config: LedgerConfig) -> Result<AppServices, LedgerError> {
    let store = open_store(&config)?;
    let catalog = open_catalog(&config)?;
    build_services_with(store, catalog, config)
}

/// Wire a ledger over the given log and catalog, plus the bus → realtime relay.
pub fn build_services_with(
    store: ApiStore,
    catalog: ApiCatalog,
    config: LedgerConfig,
) -> Result<AppServices, LedgerError> {
    let bus: ApiBus = Arc::new(InMemoryEventBus::new());
    let ledger = InventoryLedger::open(store, catalog, bus, config)?;

    let (realtime_tx, _realtime_rx) = broadcast::channel(REALTIME_CAPACITY);

    // Background subscriber: bus -> alert log + realtime channel. Ends when the
    // ledger (and with it the bus) is dropped.
    let sub = ledger.subscribe();
    let tx = realtime_tx.clone();
    let spawned = std::thread::Builder::new()
        .name("ledger-events".into())
        .spawn(move || {
            while let Ok(envelope) = sub.recv() {
                match envelope.payload() {
                    LedgerEvent::AlertRaised(alert) => tracing::warn!(
                        sku = %alert.sku,
                        quantity = alert.quantity_at_trigger,
                        threshold = alert.threshold,
                        "low stock"
                    ),
                    LedgerEvent::AlertResolved(alert) => {
                        tracing::info!(sku = %alert.sku, "low stock resolved")
                    }
                    LedgerEvent::MovementRecorded(_) => {}
                }
                // Lossy; no backpressure on the commit path.
                let _ = tx.send(envelope);
            }
        });
    if let Err(e) = spawned {
        tracing::warn!("event relay not started: {e}");
    }

    Ok(AppServices {
        ledger,
        realtime_tx,
    })
}

impl AppServices {
    /// Server-sent events for every ledger event published after subscription.
    pub fn sse_stream(&self) -> Sse<impl tokio_stream::Stream<Item = Result<SseEvent, Infallible>> + use<>> {
        let rx = self.realtime_tx.subscribe();
        let stream = BroadcastStream::new(rx).filter_map(|msg| match msg {
            Ok(envelope) => {
                let data = serde_json::to_string(&envelope).unwrap_or_else(|_| "{}".to_string());
                Some(Ok(SseEvent::default()
                    .event(envelope.payload().event_type())
                    .id(envelope.event_id().to_string())
                    .data(data)))
            }
            // Lagged receivers skip ahead.
            Err(_) => None,
        });

        Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
    }
}
