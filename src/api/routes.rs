use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::api::handlers;
use crate::store::Store;

pub fn create_router<S: Store + 'static>() -> Router<Arc<S>> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Detection passes
        .route("/conflicts/detect/pots", post(handlers::detect_pot_conflicts::<S>))
        .route("/conflicts/detect/slots", post(handlers::detect_slot_conflicts::<S>))
        // Single conflicts
        .route("/conflicts", get(handlers::list_conflicts::<S>))
        .route("/conflicts/:conflict_id", get(handlers::get_conflict::<S>))
        .route(
            "/conflicts/:conflict_id/renunciation",
            post(handlers::submit_renunciation::<S>),
        )
        .route(
            "/conflicts/:conflict_id/fee-decision",
            post(handlers::submit_fee_decision::<S>),
        )
        .route("/conflicts/:conflict_id/bids", post(handlers::submit_bids::<S>))
        // Conflict groups
        .route("/groups", get(handlers::list_groups::<S>))
        .route("/groups/:group_id", get(handlers::get_group::<S>))
        .route(
            "/groups/:group_id/renunciation",
            post(handlers::submit_group_renunciation::<S>),
        )
        .route(
            "/groups/:group_id/fee-decision",
            post(handlers::submit_group_fee_decision::<S>),
        )
        .route("/groups/:group_id/bids", post(handlers::submit_group_bids::<S>))
        .route("/groups/:group_id/reset", post(handlers::reset_group::<S>))
        .route(
            "/groups/:group_id/neighbor-pots",
            get(handlers::get_neighbor_pots::<S>),
        )
        .route(
            "/groups/:group_id/alternative-slots",
            get(handlers::get_alternative_slots::<S>),
        )
        // Requests
        .route("/requests/:request_id", get(handlers::get_request::<S>))
}
