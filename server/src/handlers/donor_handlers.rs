use axum::{extract::Query, response::IntoResponse, Extension, Json};
use brightaid_client::store::{PaymentMessage, PaymentNotice};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::job_handler::spawn_refresh;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshParams {
    /// Overrides the stored user.
    pub user_id: Option<String>,
}

pub async fn donor_snapshot(Extension(state): Extension<AppState>) -> impl IntoResponse {
    Json(state.donor.snapshot())
}

pub async fn donor_stats(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let snapshot = state.donor.snapshot();
    Json(json!({
        "summary": state.donor.summary(),
        "backendStats": snapshot.stats,
        "uniqueSchoolsCount": snapshot.unique_schools_count,
        "loading": state.donor.loading(),
    }))
}

/// POST /api/donor/refresh
pub async fn refresh_donor(
    Extension(state): Extension<AppState>,
    Query(params): Query<RefreshParams>,
) -> impl IntoResponse {
    let store = state.donor.clone();
    spawn_refresh(&state, "donor", async move {
        store.refresh(params.user_id.as_deref()).await
    })
}

#[derive(Serialize)]
pub struct PaymentResponse {
    pub title: &'static str,
    #[serde(flatten)]
    pub notice: PaymentNotice,
}

/// POST /api/payments/complete
///
/// Receives the payment window's completion message. A valid payment
/// refreshes the donor before answering.
pub async fn payment_complete(
    Extension(state): Extension<AppState>,
    Json(message): Json<PaymentMessage>,
) -> impl IntoResponse {
    let notice = state.donor.handle_payment_message(&message).await;
    Json(PaymentResponse {
        title: notice.title(),
        notice,
    })
}
