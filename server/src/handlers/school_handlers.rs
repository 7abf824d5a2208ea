use axum::{extract::Path, http::StatusCode, response::IntoResponse, Extension, Json};
use brightaid_client::store::SchoolSnapshot;
use serde_json::json;
use tracing::warn;

use super::job_handler::spawn_refresh;
use crate::state::AppState;

/// A school that was never refreshed has an empty snapshot.
pub async fn school_snapshot(
    Extension(state): Extension<AppState>,
    Path(school_id): Path<i64>,
) -> impl IntoResponse {
    let snapshot = state
        .find_school(school_id)
        .map(|store| store.snapshot())
        .unwrap_or_else(SchoolSnapshot::default);
    Json(snapshot)
}

/// Cached summary plus live fund statistics. 404 until the school has been
/// refreshed.
pub async fn school_stats(
    Extension(state): Extension<AppState>,
    Path(school_id): Path<i64>,
) -> impl IntoResponse {
    let Some(store) = state.find_school(school_id) else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "School not loaded, refresh it first" })),
        );
    };
    let fund_stats = match store.fund_stats(school_id).await {
        Ok(stats) => Some(stats),
        Err(e) => {
            warn!(school_id, error = %e, "fund stats unavailable");
            None
        }
    };
    let utilization = fund_stats.as_ref().map(|s| s.utilization_percent());
    (
        StatusCode::OK,
        Json(json!({
            "summary": store.summary(),
            "fundStats": fund_stats,
            "utilizationPercent": utilization,
        })),
    )
}

pub async fn refresh_school(
    Extension(state): Extension<AppState>,
    Path(school_id): Path<i64>,
) -> impl IntoResponse {
    let store = state.school_store(school_id);
    spawn_refresh(&state, "school", async move { store.refresh(school_id).await })
}
