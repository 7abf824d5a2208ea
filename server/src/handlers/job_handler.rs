use std::future::Future;

use axum::{extract::Path, http::StatusCode, response::IntoResponse, Extension, Json};
use brightaid_client::RefreshOutcome;
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::state::{AppState, JobStatus};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobCreated {
    pub job_id: Uuid,
}

#[derive(Serialize)]
pub struct JobPollResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<RefreshOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&JobStatus> for JobPollResponse {
    fn from(status: &JobStatus) -> Self {
        match status {
            JobStatus::Pending => JobPollResponse {
                status: "pending",
                outcome: None,
                error: None,
            },
            JobStatus::Done { outcome } => JobPollResponse {
                status: "done",
                outcome: Some(*outcome),
                error: None,
            },
            JobStatus::Failed { error } => JobPollResponse {
                status: "failed",
                outcome: None,
                error: Some(error.clone()),
            },
        }
    }
}

/// Records a pending job, runs `refresh` in the background and answers
/// 202 with the job id right away.
pub fn spawn_refresh<F>(state: &AppState, what: &'static str, refresh: F) -> impl IntoResponse
where
    F: Future<Output = RefreshOutcome> + Send + 'static,
{
    let job_id = state.start_job();

    let state = state.clone();
    tokio::spawn(async move {
        // Run in its own task so a panic marks the job failed.
        let status = match tokio::spawn(refresh).await {
            Ok(outcome) => {
                info!(%job_id, what, ?outcome, "refresh job finished");
                JobStatus::Done { outcome }
            }
            Err(e) => {
                warn!(%job_id, what, error = %e, "refresh job failed");
                JobStatus::Failed {
                    error: format!("refresh task failed: {e}"),
                }
            }
        };
        state.set_job(job_id, status);
    });

    (StatusCode::ACCEPTED, Json(JobCreated { job_id }))
}

/// GET /api/jobs/{jobId}
///
/// A finished job is forgotten once this has reported it.
pub async fn poll_job(
    Extension(state): Extension<AppState>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    match state.take_job_status(&id) {
        Some(status) => {
            let resp = JobPollResponse::from(&status);
            (StatusCode::OK, Json(json!(resp)))
        }
        None => (StatusCode::NOT_FOUND, Json(json!({ "error": "Job not found" }))),
    }
}
