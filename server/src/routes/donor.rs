use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::donor_handlers::{donor_snapshot, donor_stats, payment_complete, refresh_donor};

pub fn donor_routes() -> Router {
    Router::new()
        .route("/donor/snapshot", get(donor_snapshot))
        .route("/donor/stats", get(donor_stats))
        .route("/donor/refresh", post(refresh_donor))
        .route("/payments/complete", post(payment_complete))
}
