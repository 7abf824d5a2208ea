//! HTTP front for the BrightAid role stores.
//!
//! Refreshes run as background jobs: `POST .../refresh` answers 202 with a
//! job id and `GET /api/jobs/{jobId}` reports how it went.

pub mod handlers;
pub mod routes;
pub mod state;

use axum::{
    http::{header, HeaderValue, Method},
    Extension, Router,
};
use tower_http::cors::CorsLayer;
use tracing::warn;

use routes::{donor::donor_routes, jobs::job_routes, ngo::ngo_routes, school::school_routes};
use state::AppState;

/// Builds the router. `client_url` is the browser origin allowed by CORS.
pub fn app(state: AppState, client_url: Option<&str>) -> Router {
    let api = Router::new()
        .merge(donor_routes())
        .merge(ngo_routes())
        .merge(school_routes())
        .merge(job_routes());

    let app = Router::new()
        .nest("/api", api)
        .layer(Extension(state));

    match client_url.map(str::parse::<HeaderValue>) {
        Some(Ok(origin)) => app.layer(
            CorsLayer::new()
                .allow_origin(origin)
                .allow_methods([Method::POST, Method::GET, Method::OPTIONS])
                .allow_headers([header::CONTENT_TYPE])
                .allow_credentials(true),
        ),
        Some(Err(e)) => {
            warn!(error = %e, "CLIENT_URL is not a valid origin, CORS disabled");
            app
        }
        None => app,
    }
}
