use axum::{routing::get, Router};

use crate::handlers::job_handler::poll_job;

pub fn job_routes() -> Router {
    Router::new().route("/jobs/{jobId}", get(poll_job))
}
