use crate::handlers;
use crate::state::AppState;
use axum::{
    Router,
    routing::{delete, get, post},
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/vehicles/:vehicle/entry", post(handlers::submit_entry))
        .route(
            "/vehicles/:vehicle/rows/:index/delete",
            post(handlers::submit_delete_row),
        )
        .route("/global/update", post(handlers::submit_global_update))
        .route("/api/vehicles", get(handlers::list_vehicles))
        .route("/api/vehicles/:vehicle", get(handlers::get_ledger))
        .route("/api/vehicles/:vehicle/entries", post(handlers::create_entry))
        .route("/api/vehicles/:vehicle/rows/:index", delete(handlers::delete_row))
        .route("/api/vehicles/:vehicle/import", post(handlers::import_ledger))
        .route("/api/vehicles/:vehicle/export", get(handlers::export_ledger))
        .route("/api/global", get(handlers::get_global))
        .route("/api/global/update", post(handlers::update_global))
        .route("/api/global/export", get(handlers::export_global))
        .with_state(state)
}
