use std::time::Duration;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use brightaid_client::{ApiClient, ClientConfig, IdentityStorage};
use serde_json::{json, Value};
use server::{app, state::AppState};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn state_for(backend: &MockServer) -> AppState {
    let config = ClientConfig::default().with_base_url(format!("{}/api", backend.uri()));
    let api = ApiClient::new(&config).unwrap();
    AppState::new(api, IdentityStorage::in_memory())
}

fn router_for(backend: &MockServer, client_url: Option<&str>) -> Router {
    app(state_for(backend), client_url)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn post(uri: &str) -> Request<Body> {
    Request::post(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Polls the job until it leaves `pending`.
async fn wait_for_job(app: &Router, job_id: &str) -> Value {
    for _ in 0..100 {
        let (status, body) = send(app, get(&format!("/api/jobs/{job_id}"))).await;
        assert_eq!(status, StatusCode::OK);
        if body["status"] != "pending" {
            return body;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("job {job_id} never finished");
}

async fn mount_get(server: &MockServer, route: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path(format!("/api/{route}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn school_refresh_runs_as_job_and_fills_snapshot() {
    let backend = MockServer::start().await;
    mount_get(&backend, "schools/4", json!({ "schoolId": 4, "schoolName": "Hope" })).await;
    mount_get(&backend, "schools/4/total-funds-received", json!(1200)).await;
    mount_get(
        &backend,
        "students",
        json!([{ "studentId": 1, "schoolId": 4 }, { "studentId": 2, "schoolId": 5 }]),
    )
    .await;
    mount_get(&backend, "school-projects", json!([{ "projectId": 3, "schoolId": 4 }])).await;
    mount_get(&backend, "donations/school/4", json!([{ "donationId": 8, "amount": 50 }])).await;

    let app = router_for(&backend, None);
    let (status, created) = send(&app, post("/api/school/4/refresh")).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let job_id = created["jobId"].as_str().unwrap().to_string();

    let job = wait_for_job(&app, &job_id).await;
    assert_eq!(job["status"], "done");
    assert_eq!(job["outcome"], "refreshed");
    assert!(job.get("error").is_none());

    let (status, snapshot) = send(&app, get("/api/school/4/snapshot")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(snapshot["students"].as_array().unwrap().len(), 1);
    assert_eq!(snapshot["school"]["totalFundsReceived"], 1200.0);
    assert_eq!(snapshot["error"], Value::Null);

    let (_, stats) = send(&app, get("/api/school/4/stats")).await;
    assert_eq!(stats["summary"]["totalStudents"], 1);
    assert_eq!(stats["fundStats"], Value::Null);
}

#[tokio::test]
async fn reads_never_create_stores() {
    let backend = MockServer::start().await;
    let state = state_for(&backend);
    let app = app(state.clone(), None);

    for id in 0..50 {
        let (status, snapshot) = send(&app, get(&format!("/api/school/{id}/snapshot"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(snapshot["students"], json!([]));
        send(&app, get(&format!("/api/ngo/{id}/snapshot"))).await;
        let (status, _) = send(&app, get(&format!("/api/school/{id}/stats"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
    assert!(state.schools.is_empty());
    assert!(state.ngos.is_empty());
    assert!(backend.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn finished_job_is_forgotten_after_report() {
    let backend = MockServer::start().await;
    let state = state_for(&backend);
    let app = app(state.clone(), None);

    let (_, created) = send(&app, post("/api/school/2/refresh")).await;
    let job_id = created["jobId"].as_str().unwrap().to_string();
    let job = wait_for_job(&app, &job_id).await;
    assert_eq!(job["status"], "done");

    let (status, _) = send(&app, get(&format!("/api/jobs/{job_id}"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(state.jobs.is_empty());
    assert_eq!(state.schools.len(), 1);
}

#[tokio::test]
async fn unknown_job_is_not_found() {
    let backend = MockServer::start().await;
    let app = router_for(&backend, None);
    let (status, body) = send(
        &app,
        get("/api/jobs/00000000-0000-4000-8000-000000000000"),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Job not found");
}

#[tokio::test]
async fn donor_refresh_without_identity_reports_outcome() {
    let backend = MockServer::start().await;
    let app = router_for(&backend, None);

    let (status, created) = send(&app, post("/api/donor/refresh")).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let job = wait_for_job(&app, created["jobId"].as_str().unwrap()).await;
    assert_eq!(job["outcome"], "no_identity");

    let (_, snapshot) = send(&app, get("/api/donor/snapshot")).await;
    assert_eq!(snapshot["donations"], json!([]));
    assert_eq!(snapshot["uniqueSchoolsCount"], 0);
}

#[tokio::test]
async fn donor_refresh_accepts_user_override() {
    let backend = MockServer::start().await;
    mount_get(&backend, "donors/user/u5", json!({ "donorId": 5 })).await;
    mount_get(&backend, "donations/donor/5", json!([{ "amount": 70 }, { "amount": "30" }])).await;

    let app = router_for(&backend, None);
    let (_, created) = send(&app, post("/api/donor/refresh?userId=u5")).await;
    let job = wait_for_job(&app, created["jobId"].as_str().unwrap()).await;
    assert_eq!(job["outcome"], "refreshed");

    let (_, stats) = send(&app, get("/api/donor/stats")).await;
    assert_eq!(stats["summary"]["totalDonated"], 100.0);
    assert_eq!(stats["loading"], false);
}

#[tokio::test]
async fn ngo_snapshot_uses_starter_gamification_after_failed_refresh() {
    let backend = MockServer::start().await;
    let app = router_for(&backend, None);

    let (_, empty) = send(&app, get("/api/ngo/6/snapshot")).await;
    assert_eq!(empty["gamification"], Value::Null);

    let (_, created) = send(&app, post("/api/ngo/6/refresh")).await;
    wait_for_job(&app, created["jobId"].as_str().unwrap()).await;

    let (_, snapshot) = send(&app, get("/api/ngo/6/snapshot")).await;
    assert_eq!(snapshot["gamification"]["pointsToNextLevel"], 100);
    assert_eq!(snapshot["gamification"]["badgesEarned"], "[\"New NGO\"]");
    assert!(snapshot["error"].is_string());
}

#[tokio::test]
async fn payment_messages_map_to_notices() {
    let backend = MockServer::start().await;
    let app = router_for(&backend, None);

    let (status, failed) = send(
        &app,
        post_json(
            "/api/payments/complete",
            json!({ "type": "PAYMENT_COMPLETE", "status": "FAILED", "transactionId": "T1" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(failed, json!({ "title": "Payment Failed", "notice": "failed" }));

    let (_, success) = send(
        &app,
        post_json(
            "/api/payments/complete",
            json!({ "type": "PAYMENT_COMPLETE", "status": "VALID" }),
        ),
    )
    .await;
    assert_eq!(success["title"], "Payment Successful!");
    assert_eq!(success["notice"], "success");
    assert_eq!(success["refresh"], "no_identity");
}

#[tokio::test]
async fn cors_allows_configured_origin() {
    let backend = MockServer::start().await;
    let app = router_for(&backend, Some("http://localhost:5173"));
    let request = Request::get("/api/donor/snapshot")
        .header(header::ORIGIN, "http://localhost:5173")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://localhost:5173"
    );
}
