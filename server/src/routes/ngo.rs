use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::ngo_handlers::{ngo_snapshot, refresh_ngo};

pub fn ngo_routes() -> Router {
    Router::new()
        .route("/ngo/{ngoId}/snapshot", get(ngo_snapshot))
        .route("/ngo/{ngoId}/refresh", post(refresh_ngo))
}
