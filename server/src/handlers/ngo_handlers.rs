use axum::{extract::Path, response::IntoResponse, Extension, Json};
use brightaid_client::store::NgoSnapshot;

use super::job_handler::spawn_refresh;
use crate::state::AppState;

/// An NGO that was never refreshed has an empty snapshot.
pub async fn ngo_snapshot(
    Extension(state): Extension<AppState>,
    Path(ngo_id): Path<i64>,
) -> impl IntoResponse {
    let snapshot = state
        .find_ngo(ngo_id)
        .map(|store| store.snapshot())
        .unwrap_or_else(NgoSnapshot::default);
    Json(snapshot)
}

pub async fn refresh_ngo(
    Extension(state): Extension<AppState>,
    Path(ngo_id): Path<i64>,
) -> impl IntoResponse {
    let store = state.ngo_store(ngo_id);
    spawn_refresh(&state, "ngo", async move { store.refresh(ngo_id).await })
}
