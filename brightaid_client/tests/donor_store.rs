mod common;

use std::time::Duration;

use brightaid_client::store::{PaymentMessage, PaymentNotice};
use brightaid_client::{DonorStore, IdentityStorage, ProjectFilter, RefreshOutcome};
use common::{api_for, logged_in, mount_get};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_donor_profile(server: &MockServer) {
    mount_get(server, "donors/user/u1", json!({ "donorId": 7, "donorName": "Rahim" })).await;
}

async fn mount_donor_lists(server: &MockServer, donations: serde_json::Value) {
    mount_get(server, "donations/donor/7", donations).await;
    mount_get(
        server,
        "school-projects",
        json!([
            { "projectId": 1, "status": "ACTIVE", "projectTitle": "Library" },
            { "projectId": 2, "status": "ACTIVE", "projectTitle": "Roof" },
            { "projectId": 3, "status": "COMPLETED" }
        ]),
    )
    .await;
    mount_get(server, "schools", json!([{ "schoolId": 4, "schoolName": "Hope" }])).await;
    mount_get(server, "students/sponsored/donor/7", json!([])).await;
    mount_get(server, "students/high-risk-for-sponsorship", json!([{ "studentId": 9 }])).await;
    mount_get(
        server,
        "donor-gamifications/donor/7",
        json!({ "donorId": 7, "totalPoints": 120, "schoolsSupported": 2 }),
    )
    .await;
    mount_get(server, "donor-gamifications/donor/7/unique-schools", json!(2)).await;
    mount_get(server, "donor-gamifications/donor/7/stats", json!({ "totalDonated": 100 })).await;
}

#[tokio::test]
async fn refresh_fills_snapshot_for_stored_user() {
    let server = MockServer::start().await;
    mount_donor_profile(&server).await;
    mount_donor_lists(&server, json!([{ "donationId": 1, "projectId": 1, "amount": 100 }])).await;

    let store = DonorStore::new(api_for(&server), logged_in("u1", Some(7)));
    assert_eq!(store.refresh(None).await, RefreshOutcome::Refreshed);

    let snapshot = store.snapshot();
    assert_eq!(snapshot.donor.and_then(|d| d.donor_id), Some(7));
    assert_eq!(snapshot.donations.len(), 1);
    assert_eq!(snapshot.projects.len(), 3);
    assert_eq!(snapshot.unique_schools_count, 2);
    assert_eq!(snapshot.high_risk_students.len(), 1);

    let summary = store.summary();
    assert_eq!(summary.total_donated, 100.0);
    assert_eq!(summary.unique_schools, 2);
    assert_eq!(summary.active_projects, 2);

    let available: Vec<_> = store
        .available_projects()
        .into_iter()
        .filter_map(|p| p.project_id)
        .collect();
    assert_eq!(available, vec![2, 3]);
}

#[tokio::test]
async fn concurrent_refreshes_issue_one_batch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/donors/user/u1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "donorId": 7 }))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;
    mount_donor_lists(&server, json!([])).await;

    let store = DonorStore::new(api_for(&server), logged_in("u1", Some(7)));
    let (first, second) = tokio::join!(store.refresh(None), store.refresh(None));

    let mut outcomes = [first, second];
    outcomes.sort_by_key(|o| *o != RefreshOutcome::Refreshed);
    assert_eq!(
        outcomes,
        [RefreshOutcome::Refreshed, RefreshOutcome::AlreadyInFlight]
    );
    assert!(!store.loading());
}

#[tokio::test]
async fn failed_fetches_degrade_to_defaults() {
    let server = MockServer::start().await;
    mount_donor_profile(&server).await;
    mount_get(&server, "donations/donor/7", json!([{ "amount": 40 }])).await;
    Mock::given(method("GET"))
        .and(path("/api/schools"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let store = DonorStore::new(api_for(&server), logged_in("u1", None));
    assert_eq!(store.refresh(None).await, RefreshOutcome::Refreshed);

    let snapshot = store.snapshot();
    assert_eq!(snapshot.donations.len(), 1);
    assert!(snapshot.schools.is_empty());
    assert!(snapshot.projects.is_empty());
    assert!(snapshot.gamification.is_none());
    assert!(snapshot.stats.is_none());
    assert_eq!(snapshot.unique_schools_count, 0);
    assert_eq!(store.summary().unique_schools, 0);
}

#[tokio::test]
async fn refresh_without_identity_fetches_nothing() {
    let server = MockServer::start().await;
    let store = DonorStore::new(api_for(&server), IdentityStorage::in_memory());
    assert_eq!(store.refresh(None).await, RefreshOutcome::NoIdentity);
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn user_without_donor_profile_stops_after_lookup() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/donors/user/u2"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let store = DonorStore::new(api_for(&server), IdentityStorage::in_memory());
    assert_eq!(store.refresh(Some("u2")).await, RefreshOutcome::NoProfile);
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn valid_payment_refreshes_totals() {
    let server = MockServer::start().await;
    mount_donor_profile(&server).await;
    mount_donor_lists(&server, json!([{ "donationId": 1, "amount": 100 }])).await;

    let store = DonorStore::new(api_for(&server), logged_in("u1", Some(7)));
    store.refresh(None).await;
    assert_eq!(store.summary().total_donated, 100.0);

    server.reset().await;
    mount_donor_profile(&server).await;
    mount_donor_lists(
        &server,
        json!([{ "donationId": 1, "amount": 100 }, { "donationId": 2, "amount": "250" }]),
    )
    .await;

    let notice = store
        .handle_payment_message(&PaymentMessage::complete("VALID", Some("TX-9")))
        .await;
    assert_eq!(
        notice,
        PaymentNotice::Success {
            refresh: RefreshOutcome::Refreshed
        }
    );
    assert_eq!(store.summary().total_donated, 350.0);
}

#[tokio::test]
async fn failed_and_foreign_payment_messages_do_not_refresh() {
    let server = MockServer::start().await;
    let store = DonorStore::new(api_for(&server), logged_in("u1", Some(7)));

    let failed = store
        .handle_payment_message(&PaymentMessage::complete("FAILED", None))
        .await;
    assert_eq!(failed, PaymentNotice::Failed);
    assert_eq!(failed.title(), "Payment Failed");

    let cancelled = store
        .handle_payment_message(&PaymentMessage::complete("CANCELLED", None))
        .await;
    assert_eq!(cancelled, PaymentNotice::Cancelled);

    let foreign: PaymentMessage =
        serde_json::from_value(json!({ "type": "RESIZE", "status": "VALID" })).unwrap();
    assert_eq!(store.handle_payment_message(&foreign).await, PaymentNotice::Ignored);

    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn project_types_fall_back_to_builtin_list() {
    let server = MockServer::start().await;
    let store = DonorStore::new(api_for(&server), IdentityStorage::in_memory());
    let types = store.fetch_project_types().await;
    assert_eq!(types.len(), 7);
    assert_eq!(types[0], "Infrastructure");

    mount_get(&server, "school-projects/type-names", json!(["Water", "Sanitation"])).await;
    assert_eq!(store.fetch_project_types().await, vec!["Water", "Sanitation"]);
}

#[tokio::test]
async fn filter_sends_only_meaningful_parameters() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/school-projects/filter"))
        .and(query_param("search", "roof"))
        .and(query_param("funding", "low"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "projectId": 2 }])))
        .mount(&server)
        .await;

    let store = DonorStore::new(api_for(&server), IdentityStorage::in_memory());
    let filter = ProjectFilter {
        search: Some("roof".into()),
        project_type: Some("all".into()),
        funding: Some("low".into()),
    };
    let projects = store.fetch_filtered_projects(&filter).await;
    assert_eq!(projects.len(), 1);

    let requests = server.received_requests().await.unwrap();
    assert!(!requests[0].url.query().unwrap_or_default().contains("type="));
}

#[tokio::test]
async fn created_donation_is_returned_and_triggers_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/donations"))
        .and(body_partial_json(json!({ "donorId": 7, "amount": 75 })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "donationId": 11, "amount": 75 })),
        )
        .expect(1)
        .mount(&server)
        .await;
    mount_donor_profile(&server).await;
    mount_donor_lists(&server, json!([{ "donationId": 11, "amount": 75 }])).await;

    let store = DonorStore::new(api_for(&server), logged_in("u1", Some(7)));
    let created = store
        .create_donation(&json!({ "donorId": 7, "amount": 75 }))
        .await
        .unwrap();
    assert_eq!(created.donation_id, Some(11));

    let requests = server.received_requests().await.unwrap();
    assert!(requests.iter().any(|r| r.url.path() == "/api/donors/user/u1"));
    assert!(requests.iter().any(|r| r.url.path() == "/api/donations/donor/7"));
    assert_eq!(store.summary().total_donated, 75.0);
}

#[tokio::test]
async fn failed_donation_returns_none_without_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/donations"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let store = DonorStore::new(api_for(&server), logged_in("u1", Some(7)));
    let created = store.create_donation(&json!({ "amount": 75 })).await;
    assert!(created.is_none());
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
    assert!(store.snapshot().donor.is_none());
}

#[tokio::test]
async fn initialize_loads_public_lists_only() {
    let server = MockServer::start().await;
    mount_get(&server, "school-projects", json!([{ "projectId": 1 }, { "projectId": 2 }])).await;
    mount_get(&server, "schools", json!([{ "schoolId": 4 }])).await;
    mount_get(
        &server,
        "donations",
        json!([{ "donationId": 1, "amount": 10 }, { "donationId": 2, "amount": 20 }, { "donationId": 3 }]),
    )
    .await;

    let store = DonorStore::new(api_for(&server), IdentityStorage::in_memory());
    store.initialize().await;

    let snapshot = store.snapshot();
    assert_eq!(snapshot.projects.len(), 2);
    assert_eq!(snapshot.schools.len(), 1);
    assert_eq!(snapshot.donations.len(), 3);
    assert!(snapshot.gamification.is_none());
    assert!(snapshot.donor.is_none());

    let paths: Vec<String> = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|r| r.url.path().to_string())
        .collect();
    assert_eq!(paths.len(), 3);
    assert!(paths.contains(&"/api/donations".to_string()));
}
