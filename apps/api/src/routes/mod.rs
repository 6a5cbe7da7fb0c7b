pub mod health;

use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::cancellations::handlers as cancellations;
use crate::state::AppState;
use crate::subscriptions::handlers as subscriptions;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Cancellation flow
        .route(
            "/api/cancellations/start",
            post(cancellations::handle_start),
        )
        .route(
            "/api/cancellations/state",
            get(cancellations::handle_state),
        )
        .route("/api/cancellations/step", post(cancellations::handle_step))
        .route(
            "/api/cancellations/:id",
            patch(cancellations::handle_update),
        )
        .route(
            "/api/cancellations/downsell",
            post(cancellations::handle_downsell),
        )
        .route(
            "/api/cancellations/found-job/complete",
            post(cancellations::handle_found_job_complete),
        )
        .route(
            "/api/cancellations/complete",
            post(cancellations::handle_complete),
        )
        .route(
            "/api/cancellations/reset",
            post(cancellations::handle_reset),
        )
        .route(
            "/api/cancellations/analytics",
            get(cancellations::handle_analytics),
        )
        // Subscriptions
        .route(
            "/api/subscriptions/status",
            get(subscriptions::handle_status),
        )
        .route(
            "/api/subscriptions/renew",
            post(subscriptions::handle_renew),
        )
        .with_state(state)
}
