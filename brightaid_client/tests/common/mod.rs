#![allow(dead_code)]

use brightaid_client::identity::Login;
use brightaid_client::{ApiClient, ClientConfig, IdentityStorage};
use serde_json::Value;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub fn api_for(server: &MockServer) -> ApiClient {
    let config = ClientConfig::default().with_base_url(format!("{}/api", server.uri()));
    ApiClient::new(&config).unwrap()
}

pub fn logged_in(user_id: &str, donor_id: Option<i64>) -> IdentityStorage {
    let identity = IdentityStorage::in_memory();
    identity
        .remember_login(&Login {
            user_id: user_id.to_string(),
            user_type: "DONOR".to_string(),
            donor_id,
            ngo_id: None,
            token: None,
            ttl: chrono::Duration::hours(1),
        })
        .unwrap();
    identity
}

pub async fn mount_get(server: &MockServer, route: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path(format!("/api/{route}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}
