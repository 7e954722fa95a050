use axum::{routing::get, Router};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracker_core::config::TrackerConfig;
use tracker_inventory::{InventoryStore, RecordKind};
use tracker_sync::{Broadcaster, SubscriberRegistry};

/// Central shared state — passed as Arc<AppState> to all Axum handlers.
pub struct AppState {
    pub config: TrackerConfig,
    /// Live sync subscribers, one per open `/api/sync` stream.
    pub registry: Arc<SubscriberRegistry>,
    pub broadcaster: Broadcaster,
    pub inventory: InventoryStore,
    /// Cancelled on shutdown; every sync stream holds a child token.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(config: TrackerConfig, inventory: InventoryStore, shutdown: CancellationToken) -> Self {
        let registry = Arc::new(SubscriberRegistry::new(config.sync.mailbox_capacity));
        Self {
            config,
            broadcaster: Broadcaster::new(Arc::clone(&registry)),
            registry,
            inventory,
            shutdown,
        }
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    let api = RecordKind::ALL
        .into_iter()
        .fold(Router::new(), |api, kind| {
            api.merge(crate::http::inventory::routes(kind))
        })
        .merge(crate::http::inventory::mod_routes())
        .route("/sync", get(crate::http::sync::sync_handler));

    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .nest("/api", api)
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
