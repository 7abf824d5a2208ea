use std::env;

use brightaid_client::{ApiClient, ClientConfig, IdentityStorage};
use server::{app, state::AppState};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_BIND: &str = "127.0.0.1:3000";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ClientConfig::from_env();
    let api = ApiClient::new(&config)?;
    let identity = IdentityStorage::file(config.storage_path.clone());
    let state = AppState::new(api, identity);

    let client_url = env::var("CLIENT_URL").ok();
    let app = app(state, client_url.as_deref());

    let bind = env::var("BRIGHTAID_BIND").unwrap_or_else(|_| DEFAULT_BIND.to_string());
    let listener = TcpListener::bind(&bind).await?;
    info!(%bind, backend = %config.base_url, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}
