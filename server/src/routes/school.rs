use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::school_handlers::{refresh_school, school_snapshot, school_stats};

pub fn school_routes() -> Router {
    Router::new()
        .route("/school/{schoolId}/snapshot", get(school_snapshot))
        .route("/school/{schoolId}/stats", get(school_stats))
        .route("/school/{schoolId}/refresh", post(refresh_school))
}
