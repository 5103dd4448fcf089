use std::{convert::Infallible, sync::Arc, time::Duration};

use anyhow::Context;
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use tokio::sync::broadcast;
use tokio_stream::{StreamExt, wrappers::BroadcastStream};

use agrosupply_auth::{InMemoryUserDirectory, UserDirectory};
use agrosupply_events::{EventBus, InMemoryEventBus};
use agrosupply_infra::config::{AppConfig, DatabaseConfig};
use agrosupply_infra::fulfillment::{Fulfillment, FulfillmentConfig, FulfillmentEnvelope};
use agrosupply_infra::store::{InMemoryStorage, PostgresStorage, Storage};

pub type AppFulfillment = Fulfillment<
    Arc<dyn Storage>,
    Arc<dyn UserDirectory>,
    Arc<InMemoryEventBus<FulfillmentEnvelope>>,
>;

/// Everything a request handler needs.
pub struct AppServices {
    fulfillment: AppFulfillment,
    directory: Arc<dyn UserDirectory>,
    realtime_tx: broadcast::Sender<FulfillmentEnvelope>,
}

impl AppServices {
    pub fn fulfillment(&self) -> &AppFulfillment {
        &self.fulfillment
    }

    pub fn directory(&self) -> Arc<dyn UserDirectory> {
        self.directory.clone()
    }

    pub fn realtime_tx(&self) -> &broadcast::Sender<FulfillmentEnvelope> {
        &self.realtime_tx
    }
}

/// Build services from configuration: pick the store, seed the directory,
/// start the audit subscriber.
pub async fn build_services(config: &AppConfig) -> anyhow::Result<AppServices> {
    let storage: Arc<dyn Storage> = match &config.database {
        DatabaseConfig::InMemory => {
            tracing::warn!("DATABASE_URL not set; using in-memory store (data is lost on exit)");
            Arc::new(InMemoryStorage::new())
        }
        DatabaseConfig::Postgres {
            url,
            max_connections,
        } => {
            let pg = PostgresStorage::connect(url, *max_connections)
                .await
                .context("failed to connect to postgres")?;
            Arc::new(pg)
        }
    };

    if config.users.is_empty() {
        tracing::warn!("AGRO_USERS is empty; every request will be rejected");
    }
    let directory = Arc::new(InMemoryUserDirectory::with_entries(config.users.clone()));

    wire(storage, directory, config.fulfillment)
}

/// Assemble services around an already-built store and directory.
pub fn wire(
    storage: Arc<dyn Storage>,
    directory: Arc<dyn UserDirectory>,
    config: FulfillmentConfig,
) -> anyhow::Result<AppServices> {
    let bus: Arc<InMemoryEventBus<FulfillmentEnvelope>> = Arc::new(InMemoryEventBus::new());

    // Realtime channel (SSE): lossy broadcast.
    let (realtime_tx, _realtime_rx) = broadcast::channel::<FulfillmentEnvelope>(256);

    // Background subscriber: bus -> audit log + realtime. Exits when the bus is dropped.
    {
        let sub = bus.subscribe();
        let realtime_tx = realtime_tx.clone();
        std::thread::Builder::new()
            .name("fulfillment-audit".into())
            .spawn(move || {
                while let Ok(env) = sub.recv() {
                    tracing::info!(
                        event_id = %env.event_id(),
                        event_type = env.event_type(),
                        subject_type = env.subject_type(),
                        subject_id = env.subject_id(),
                        "fulfillment event"
                    );
                    // Lossy; no backpressure on the core.
                    let _ = realtime_tx.send(env);
                }
            })
            .context("failed to start audit subscriber")?;
    }

    let fulfillment = Fulfillment::new(storage, directory.clone(), bus, config);
    Ok(AppServices {
        fulfillment,
        directory,
        realtime_tx,
    })
}

pub fn event_stream(
    services: &AppServices,
) -> Sse<impl tokio_stream::Stream<Item = Result<SseEvent, Infallible>> + use<>> {
    let rx = services.realtime_tx().subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|msg| match msg {
        Ok(env) => {
            let data = serde_json::to_string(env.payload()).unwrap_or_else(|_| "{}".to_string());
            Some(Ok(SseEvent::default()
                .id(env.event_id().to_string())
                .event(env.event_type())
                .data(data)))
        }
        // Lagged receivers skip what they missed.
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
