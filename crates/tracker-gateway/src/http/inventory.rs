//! CRUD endpoints for users, locations, products and samples.
//!
//! Routes (per kind, under `/api`):
//!   GET    /{plural}              list
//!   POST   /{singular}            create
//!   GET    /{singular}/{id}       fetch
//!   POST   /{singular}/{id}       upsert
//!   DELETE /{singular}/{id}       delete
//!
//! Sample mods:
//!   GET    /sample/{id}/mods                    list  -> {"mods": [...]}
//!   POST   /sample/{id}/mods                    add   {"name": "..."}
//!   DELETE /sample/{id}/mods/{mod_id}           remove
//!   POST   /sample/{id}/mods/{mod_id}/remove    remove (form-friendly alias)
//!
//! Every successful mutation announces `<plural>_updated` on the sync hub;
//! mod changes count as `samples_updated`.
//! Error: `{"error": "..."}`

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::warn;
use tracker_inventory::{InventoryError, ModInput, Record, RecordInput, RecordKind, SampleMod};
use tracker_sync::DomainEvent;

use crate::app::AppState;

#[derive(Serialize)]
pub struct ApiError {
    pub error: String,
}

type ApiResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

fn api_error(err: InventoryError) -> (StatusCode, Json<ApiError>) {
    let status = match &err {
        InventoryError::NotFound { .. } => StatusCode::NOT_FOUND,
        InventoryError::InvalidId { .. } | InventoryError::MissingField { .. } => {
            StatusCode::BAD_REQUEST
        }
        InventoryError::Database(_) | InventoryError::Serialization(_) => {
            warn!(error = %err, "inventory operation failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (
        status,
        Json(ApiError {
            error: err.to_string(),
        }),
    )
}

/// Change announced after a successful mutation of `kind`.
pub fn change_event(kind: RecordKind) -> DomainEvent {
    match kind {
        RecordKind::User => DomainEvent::UsersUpdated,
        RecordKind::Location => DomainEvent::LocationsUpdated,
        RecordKind::Product => DomainEvent::ProductsUpdated,
        RecordKind::Sample => DomainEvent::SamplesUpdated,
    }
}

/// Routes for one resource kind.
pub fn routes(kind: RecordKind) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            &format!("/{}", kind.plural()),
            get(move |State(state): State<Arc<AppState>>| list_records(state, kind)),
        )
        .route(
            &format!("/{}", kind.as_str()),
            post(
                move |State(state): State<Arc<AppState>>, Json(input): Json<RecordInput>| {
                    create_record(state, kind, input)
                },
            ),
        )
        .route(
            &format!("/{}/{{id}}", kind.as_str()),
            get(
                move |State(state): State<Arc<AppState>>, Path(id): Path<String>| {
                    get_record(state, kind, id)
                },
            )
            .post(
                move |State(state): State<Arc<AppState>>,
                      Path(id): Path<String>,
                      Json(input): Json<RecordInput>| {
                    upsert_record(state, kind, id, input)
                },
            )
            .delete(
                move |State(state): State<Arc<AppState>>, Path(id): Path<String>| {
                    delete_record(state, kind, id)
                },
            ),
        )
}

/// Mod history routes hanging off `/sample/{id}`.
pub fn mod_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/sample/{id}/mods", get(list_mods).post(add_mod))
        .route("/sample/{id}/mods/{mod_id}", delete(remove_mod))
        .route("/sample/{id}/mods/{mod_id}/remove", post(remove_mod))
}

async fn list_records(state: Arc<AppState>, kind: RecordKind) -> ApiResult<Json<Vec<Record>>> {
    state.inventory.list(kind).map(Json).map_err(api_error)
}

async fn get_record(state: Arc<AppState>, kind: RecordKind, id: String) -> ApiResult<Json<Record>> {
    match state.inventory.get(kind, &id).map_err(api_error)? {
        Some(record) => Ok(Json(record)),
        None => Err(api_error(InventoryError::NotFound {
            kind: kind.as_str(),
            id,
        })),
    }
}

async fn create_record(
    state: Arc<AppState>,
    kind: RecordKind,
    input: RecordInput,
) -> ApiResult<Json<Record>> {
    let record = state.inventory.create(kind, input).map_err(api_error)?;
    let response = Json(record);
    state.broadcaster.notify(change_event(kind));
    Ok(response)
}

async fn upsert_record(
    state: Arc<AppState>,
    kind: RecordKind,
    id: String,
    input: RecordInput,
) -> ApiResult<Json<Record>> {
    let record = state.inventory.upsert(kind, &id, input).map_err(api_error)?;
    let response = Json(record);
    state.broadcaster.notify(change_event(kind));
    Ok(response)
}

async fn delete_record(state: Arc<AppState>, kind: RecordKind, id: String) -> ApiResult<Json<Value>> {
    state.inventory.delete(kind, &id).map_err(api_error)?;
    let response = Json(json!({ "status": "deleted" }));
    state.broadcaster.notify(change_event(kind));
    Ok(response)
}

async fn list_mods(
    State(state): State<Arc<AppState>>,
    Path(sample_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let mods = state.inventory.list_mods(&sample_id).map_err(api_error)?;
    Ok(Json(json!({ "mods": mods })))
}

async fn add_mod(
    State(state): State<Arc<AppState>>,
    Path(sample_id): Path<String>,
    Json(input): Json<ModInput>,
) -> ApiResult<Json<SampleMod>> {
    let added = state.inventory.add_mod(&sample_id, input).map_err(api_error)?;
    let response = Json(added);
    state.broadcaster.notify(DomainEvent::SamplesUpdated);
    Ok(response)
}

async fn remove_mod(
    State(state): State<Arc<AppState>>,
    Path((sample_id, mod_id)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    state
        .inventory
        .remove_mod(&sample_id, &mod_id)
        .map_err(api_error)?;
    let response = Json(json!({ "status": "removed" }));
    state.broadcaster.notify(DomainEvent::SamplesUpdated);
    Ok(response)
}
